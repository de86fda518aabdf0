//! Application state shared across handlers.

use disparo_core::Config;
use disparo_engine::DispatchEngine;
use sqlx::PgPool;

pub struct AppState {
    pub config: Config,
    pub engine: DispatchEngine,
    pub pool: PgPool,
}
