//! Voter repository
//!
//! Read-only audience counting over the `voters` table. The SQL predicates
//! must agree with `FilterSet::matches`: a constrained dimension becomes an
//! `= ANY($n)` clause, an unconstrained one binds NULL and the clause
//! collapses to true.

use async_trait::async_trait;
use disparo_core::{FilterDimension, FilterSet};
use disparo_engine::AudienceSource;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct VoterRepository {
    pool: PgPool,
}

impl VoterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn dimension_values(filters: &FilterSet, dimension: FilterDimension) -> Option<Vec<String>> {
        filters
            .values(dimension)
            .map(|values| values.iter().cloned().collect())
    }
}

#[async_trait]
impl AudienceSource for VoterRepository {
    #[tracing::instrument(skip(self, filters), fields(db.table = "voters", db.operation = "count"))]
    async fn count_recipients(
        &self,
        company_uid: Uuid,
        filters: &FilterSet,
    ) -> anyhow::Result<u64> {
        let cities = Self::dimension_values(filters, FilterDimension::City);
        let neighborhoods = Self::dimension_values(filters, FilterDimension::Neighborhood);
        let categories = Self::dimension_values(filters, FilterDimension::Category);
        let genders = Self::dimension_values(filters, FilterDimension::Gender);

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM voters
            WHERE company_uid = $1
              AND ($2::text[] IS NULL OR city = ANY($2))
              AND ($3::text[] IS NULL OR neighborhood = ANY($3))
              AND ($4::text[] IS NULL OR category = ANY($4))
              AND ($5::text[] IS NULL OR gender = ANY($5))
            "#,
        )
        .bind(company_uid)
        .bind(&cities)
        .bind(&neighborhoods)
        .bind(&categories)
        .bind(&genders)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    #[tracing::instrument(skip(self), fields(db.table = "voters", db.operation = "distinct"))]
    async fn distinct_values(
        &self,
        company_uid: Uuid,
        dimension: FilterDimension,
    ) -> anyhow::Result<Vec<String>> {
        // Column names come from this whitelist, never from caller input.
        let column = match dimension {
            FilterDimension::City => "city",
            FilterDimension::Neighborhood => "neighborhood",
            FilterDimension::Category => "category",
            FilterDimension::Gender => "gender",
        };

        let values: Vec<String> = sqlx::query_scalar(&format!(
            r#"
            SELECT DISTINCT {column}
            FROM voters
            WHERE company_uid = $1 AND {column} IS NOT NULL AND {column} <> ''
            ORDER BY {column}
            "#,
        ))
        .bind(company_uid)
        .fetch_all(&self.pool)
        .await?;

        Ok(values)
    }
}
