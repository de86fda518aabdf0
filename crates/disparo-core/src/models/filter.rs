use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Sentinel filter value meaning "no constraint on this dimension".
pub const ALL_SENTINEL: &str = "all";

/// Audience filter dimension.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FilterDimension {
    City,
    Neighborhood,
    Category,
    Gender,
}

/// One dimension/value pair narrowing the recipient count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriterion {
    pub dimension: FilterDimension,
    pub value: String,
}

impl FilterCriterion {
    pub fn new(dimension: FilterDimension, value: impl Into<String>) -> Self {
        Self {
            dimension,
            value: value.into(),
        }
    }
}

/// Normalized set of audience filters.
///
/// Criteria are grouped by dimension. Within a dimension values are
/// OR-combined; across dimensions groups are AND-combined. A dimension with
/// no criteria, or one containing the `all` sentinel, imposes no constraint.
/// The internal ordered-map representation makes the set independent of the
/// order criteria were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet {
    groups: BTreeMap<FilterDimension, BTreeSet<String>>,
}

impl FilterSet {
    /// Build a normalized filter set. Empty values are dropped; any group
    /// containing the `all` sentinel (case-insensitive) is removed entirely.
    pub fn new(criteria: impl IntoIterator<Item = FilterCriterion>) -> Self {
        let mut groups: BTreeMap<FilterDimension, BTreeSet<String>> = BTreeMap::new();
        let mut unrestricted: BTreeSet<FilterDimension> = BTreeSet::new();

        for criterion in criteria {
            let value = criterion.value.trim();
            if value.is_empty() {
                continue;
            }
            if value.eq_ignore_ascii_case(ALL_SENTINEL) {
                unrestricted.insert(criterion.dimension);
                continue;
            }
            groups
                .entry(criterion.dimension)
                .or_default()
                .insert(value.to_string());
        }

        for dimension in unrestricted {
            groups.remove(&dimension);
        }

        Self { groups }
    }

    /// True when no dimension is constrained.
    pub fn is_unrestricted(&self) -> bool {
        self.groups.is_empty()
    }

    /// Constrained values for one dimension, if any.
    pub fn values(&self, dimension: FilterDimension) -> Option<&BTreeSet<String>> {
        self.groups.get(&dimension)
    }

    /// Iterate over constrained dimensions and their value groups.
    pub fn iter(&self) -> impl Iterator<Item = (FilterDimension, &BTreeSet<String>)> {
        self.groups.iter().map(|(d, v)| (*d, v))
    }

    /// Total number of criteria across all dimensions.
    pub fn len(&self) -> usize {
        self.groups.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Canonical combination semantics: match-any within a dimension,
    /// match-all across dimensions. Backends translating the set to a query
    /// must agree with this predicate.
    pub fn matches(
        &self,
        city: Option<&str>,
        neighborhood: Option<&str>,
        category: Option<&str>,
        gender: Option<&str>,
    ) -> bool {
        let field = |dimension: FilterDimension| match dimension {
            FilterDimension::City => city,
            FilterDimension::Neighborhood => neighborhood,
            FilterDimension::Category => category,
            FilterDimension::Gender => gender,
        };

        self.groups.iter().all(|(dimension, values)| {
            field(*dimension).is_some_and(|v| values.contains(v))
        })
    }
}

impl FromIterator<FilterCriterion> for FilterSet {
    fn from_iter<I: IntoIterator<Item = FilterCriterion>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use FilterDimension::*;

    fn c(dimension: FilterDimension, value: &str) -> FilterCriterion {
        FilterCriterion::new(dimension, value)
    }

    #[test]
    fn order_invariant() {
        let a = FilterSet::new([c(City, "Natal"), c(Category, "B"), c(City, "Recife")]);
        let b = FilterSet::new([c(Category, "B"), c(City, "Recife"), c(City, "Natal")]);
        assert_eq!(a, b);
    }

    #[test]
    fn all_sentinel_removes_dimension() {
        let set = FilterSet::new([c(City, "Natal"), c(City, "all"), c(Gender, "F")]);
        assert!(set.values(City).is_none());
        assert_eq!(set.values(Gender).unwrap().len(), 1);
    }

    #[test]
    fn empty_set_is_unrestricted_and_matches_everything() {
        let set = FilterSet::new([]);
        assert!(set.is_unrestricted());
        assert!(set.matches(None, None, None, None));
        assert!(set.matches(Some("Natal"), None, Some("A"), Some("M")));
    }

    #[test]
    fn or_within_dimension_and_across_dimensions() {
        let set = FilterSet::new([
            c(City, "Natal"),
            c(City, "Recife"),
            c(Category, "B"),
        ]);
        // Either city works, but category B is mandatory.
        assert!(set.matches(Some("Natal"), None, Some("B"), None));
        assert!(set.matches(Some("Recife"), None, Some("B"), None));
        assert!(!set.matches(Some("Natal"), None, Some("A"), None));
        assert!(!set.matches(Some("Fortaleza"), None, Some("B"), None));
        // Missing field on a constrained dimension cannot match.
        assert!(!set.matches(None, None, Some("B"), None));
    }

    #[test]
    fn all_sentinel_matches_a_superset() {
        let population = [
            (Some("Natal"), Some("Centro"), Some("A"), Some("F")),
            (Some("Natal"), Some("Alecrim"), Some("B"), Some("M")),
            (Some("Recife"), Some("Boa Vista"), Some("A"), Some("F")),
            (None, None, Some("A"), None),
        ];

        let count = |set: &FilterSet| {
            population
                .iter()
                .filter(|(ci, n, ca, g)| set.matches(*ci, *n, *ca, *g))
                .count()
        };

        let specific = FilterSet::new([c(Category, "A"), c(City, "Natal")]);
        let relaxed = FilterSet::new([c(Category, "A"), c(City, "all")]);
        assert!(count(&relaxed) >= count(&specific));
        assert_eq!(count(&specific), 1);
        assert_eq!(count(&relaxed), 3);
    }

    #[test]
    fn blank_values_dropped() {
        let set = FilterSet::new([c(City, "  "), c(Gender, "")]);
        assert!(set.is_unrestricted());
    }
}
