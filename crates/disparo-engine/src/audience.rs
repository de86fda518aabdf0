//! Audience resolution
//!
//! Counts recipients matching a filter set, scoped to one company. The count
//! is a point-in-time snapshot; the engine records it once and never
//! recomputes it for the same submission.

use std::sync::Arc;

use async_trait::async_trait;
use disparo_core::{DispatchError, FilterDimension, FilterSet};
use uuid::Uuid;

/// Source of recipient counts and selectable filter values, usually backed
/// by the voter table.
#[async_trait]
pub trait AudienceSource: Send + Sync {
    async fn count_recipients(
        &self,
        company_uid: Uuid,
        filters: &FilterSet,
    ) -> anyhow::Result<u64>;

    /// Distinct non-empty values present for one dimension within the
    /// company's universe; populates the caller's filter selectors.
    async fn distinct_values(
        &self,
        company_uid: Uuid,
        dimension: FilterDimension,
    ) -> anyhow::Result<Vec<String>>;
}

/// Selectable values per filter dimension for one company.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub cities: Vec<String>,
    pub neighborhoods: Vec<String>,
    pub categories: Vec<String>,
    pub genders: Vec<String>,
}

/// Resolves a filter set to a recipient count for one company.
pub struct AudienceResolver {
    source: Arc<dyn AudienceSource>,
}

impl AudienceResolver {
    pub fn new(source: Arc<dyn AudienceSource>) -> Self {
        Self { source }
    }

    /// Count recipients matching `filters` within the company's universe.
    ///
    /// An unrestricted filter set counts the whole universe. Zero is a valid
    /// result and is reported as such, not as an error.
    pub async fn resolve(
        &self,
        company_uid: Uuid,
        filters: &FilterSet,
    ) -> Result<u64, DispatchError> {
        let count = self
            .source
            .count_recipients(company_uid, filters)
            .await
            .map_err(|e| DispatchError::Audience(format!("Audience count failed: {}", e)))?;

        tracing::debug!(
            company_uid = %company_uid,
            filter_groups = filters.len(),
            recipients = count,
            "Audience resolved"
        );

        Ok(count)
    }

    /// Distinct values for every dimension, for the filter selector UI.
    pub async fn filter_options(&self, company_uid: Uuid) -> Result<FilterOptions, DispatchError> {
        Ok(FilterOptions {
            cities: self.distinct(company_uid, FilterDimension::City).await?,
            neighborhoods: self
                .distinct(company_uid, FilterDimension::Neighborhood)
                .await?,
            categories: self.distinct(company_uid, FilterDimension::Category).await?,
            genders: self.distinct(company_uid, FilterDimension::Gender).await?,
        })
    }

    async fn distinct(
        &self,
        company_uid: Uuid,
        dimension: FilterDimension,
    ) -> Result<Vec<String>, DispatchError> {
        self.source
            .distinct_values(company_uid, dimension)
            .await
            .map_err(|e| DispatchError::Audience(format!("Filter options query failed: {}", e)))
    }
}
