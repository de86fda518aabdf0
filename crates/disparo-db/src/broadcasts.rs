//! Broadcast repository
//!
//! Single-row inserts of assembled broadcast records. The table is the
//! downstream delivery worker's queue, so only `ready` records ever land
//! here; attachments and filters are stored as JSONB snapshots.

use async_trait::async_trait;
use disparo_core::BroadcastRecord;
use disparo_engine::BroadcastStore;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct BroadcastRepository {
    pool: PgPool,
}

impl BroadcastRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BroadcastStore for BroadcastRepository {
    #[tracing::instrument(
        skip(self, record),
        fields(db.table = "broadcasts", db.operation = "insert")
    )]
    async fn insert_broadcast(&self, record: &BroadcastRecord) -> anyhow::Result<Uuid> {
        let id = Uuid::new_v4();
        let attachments = serde_json::to_value(&record.attachments)?;
        let filters = serde_json::to_value(&record.filters)?;
        let status = serde_json::to_value(record.status)?
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| anyhow::anyhow!("Broadcast status did not serialize to a string"))?;

        sqlx::query(
            r#"
            INSERT INTO broadcasts (
                id, company_uid, company_name, created_by, message,
                attachments, filters, resolved_audience_size, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(id)
        .bind(record.company.uid)
        .bind(&record.company.name)
        .bind(&record.created_by)
        .bind(&record.message)
        .bind(attachments)
        .bind(filters)
        .bind(record.resolved_audience_size as i64)
        .bind(status)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            broadcast_id = %id,
            company_uid = %record.company.uid,
            "Broadcast record inserted"
        );

        Ok(id)
    }
}
