//! Search filters

use crate::{Resource, StreamResult};
use pkgdeck_types::{ResourceKind, ResourceState};

/// Criteria a backend search call answers.
///
/// Every field is optional; an empty filter matches everything a backend
/// is willing to show (backends typically hide [`ResourceKind::Technical`]
/// entries unless the filter asks for upgradeables).
#[derive(Debug, Clone, Default)]
pub struct Filters {
    /// Substring matched case-insensitively against name and comment.
    pub search: Option<String>,
    /// State constraint, see `filter_minimum_state`.
    pub state: Option<ResourceState>,
    /// When true (the usual case), `state` is a lower bound rather than an
    /// exact match: asking for `Installed` also yields `Upgradeable`.
    pub filter_minimum_state: bool,
    /// Restrict to one repository/origin.
    pub origin: Option<String>,
    /// Restrict to addons extending this appstream id.
    pub extends: Option<String>,
    /// Restrict to one kind of resource.
    pub kind: Option<ResourceKind>,
}

impl Filters {
    /// Filter for everything currently upgradeable.
    #[must_use]
    pub fn upgradeable() -> Self {
        Self {
            state: Some(ResourceState::Upgradeable),
            filter_minimum_state: false,
            ..Self::default()
        }
    }

    /// Filter matching a search term.
    #[must_use]
    pub fn search_term(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
            filter_minimum_state: true,
            ..Self::default()
        }
    }

    /// Whether `resource` satisfies every constraint in this filter.
    #[must_use]
    pub fn matches(&self, resource: &Resource) -> bool {
        if let Some(extends) = &self.extends {
            if !resource.extends().iter().any(|e| e == extends) {
                return false;
            }
        }

        if let Some(origin) = &self.origin {
            if resource.origin() != origin {
                return false;
            }
        }

        if let Some(state) = self.state {
            let actual = resource.state();
            let ok = if self.filter_minimum_state {
                actual >= state
            } else {
                actual == state
            };
            if !ok {
                return false;
            }
        }

        if let Some(kind) = self.kind {
            if resource.kind() != kind {
                return false;
            }
        }

        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            let matches = resource.display_name().to_lowercase().contains(&term)
                || resource.comment().to_lowercase().contains(&term);
            if !matches {
                return false;
            }
        }

        true
    }

    /// Drop results a sloppy backend let through. Backends are expected to
    /// pre-filter; this is the safety net the aggregation layer applies.
    pub fn retain_matching(&self, results: &mut Vec<StreamResult>) {
        results.retain(|result| self.matches(&result.resource));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(name: &str, state: ResourceState) -> Resource {
        Resource::builder("dummy", name)
            .comment("a fine painting tool")
            .state(state)
            .build()
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = Filters::default();
        assert!(filter.matches(&resource("krita", ResourceState::None)));
    }

    #[test]
    fn minimum_state_is_a_lower_bound() {
        let filter = Filters {
            state: Some(ResourceState::Installed),
            filter_minimum_state: true,
            ..Filters::default()
        };
        assert!(filter.matches(&resource("a", ResourceState::Installed)));
        assert!(filter.matches(&resource("b", ResourceState::Upgradeable)));
        assert!(!filter.matches(&resource("c", ResourceState::None)));
    }

    #[test]
    fn exact_state_filter() {
        let filter = Filters::upgradeable();
        assert!(filter.matches(&resource("a", ResourceState::Upgradeable)));
        assert!(!filter.matches(&resource("b", ResourceState::Installed)));
    }

    #[test]
    fn search_matches_name_and_comment_case_insensitively() {
        let filter = Filters::search_term("KRITA");
        assert!(filter.matches(&resource("krita", ResourceState::None)));

        let filter = Filters::search_term("painting");
        assert!(filter.matches(&resource("krita", ResourceState::None)));

        let filter = Filters::search_term("spreadsheet");
        assert!(!filter.matches(&resource("krita", ResourceState::None)));
    }

    #[test]
    fn retain_matching_drops_mismatches() {
        let filter = Filters::upgradeable();
        let mut results = vec![
            StreamResult::new(resource("a", ResourceState::Upgradeable)),
            StreamResult::new(resource("b", ResourceState::None)),
        ];
        filter.retain_matching(&mut results);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].resource.package_name(), "a");
    }
}
