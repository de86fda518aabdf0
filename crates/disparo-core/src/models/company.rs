use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sanitize::sanitize;

/// Tenant identity for one submission.
///
/// Every resolver and assembler call takes the scope explicitly; nothing in
/// the engine reads ambient session state. Filters, counts, and storage
/// buckets are all derived from this value, so it is the isolation boundary
/// against cross-tenant leakage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyScope {
    pub uid: Uuid,
    pub name: String,
}

impl CompanyScope {
    pub fn new(uid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uid,
            name: name.into(),
        }
    }

    /// Storage bucket derived from the company name, or `None` when the name
    /// sanitizes to nothing (unresolved tenant identity).
    pub fn bucket(&self) -> Option<String> {
        let bucket = sanitize(&self.name);
        if bucket.is_empty() {
            None
        } else {
            Some(bucket)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_is_sanitized_company_name() {
        let scope = CompanyScope::new(Uuid::new_v4(), "Gabinete São Pedro");
        assert_eq!(scope.bucket().unwrap(), "gabinete_sao_pedro");
    }

    #[test]
    fn empty_name_yields_no_bucket() {
        let scope = CompanyScope::new(Uuid::new_v4(), "  !!! ");
        assert!(scope.bucket().is_none());
    }
}
