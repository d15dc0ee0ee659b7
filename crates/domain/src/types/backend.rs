//! Backend variants and per-process capability state

use serde::{Deserialize, Serialize};

use crate::impl_domain_enum_conversions;

/// The three incompatible API surfaces a tenant may expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// JSON API with camelCase fields; the only writable surface
    Modern,
    /// Legacy resource API with snake_case fields
    Classic,
    /// Saved server-side searches whose columns use display names
    AdvancedSearch,
}

impl_domain_enum_conversions!(BackendKind {
    Modern => "modern",
    Classic => "classic",
    AdvancedSearch => "advanced_search",
});

impl BackendKind {
    /// Detection order
    pub const ALL: [BackendKind; 3] = [Self::Modern, Self::Classic, Self::AdvancedSearch];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Modern => "modern",
            Self::Classic => "classic",
            Self::AdvancedSearch => "advanced_search",
        }
    }

    /// Whether mutating operations can be served by this backend
    pub fn supports_mutations(self) -> bool {
        matches!(self, Self::Modern)
    }

    /// Circuit breaker key for `operation` against this backend
    pub fn operation_key(self, operation: &str) -> String {
        format!("{}.{operation}", self.as_str())
    }
}

/// Tri-state result of probing a backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Not probed yet
    #[default]
    Unknown,
    Available,
    Unavailable,
}

impl_domain_enum_conversions!(Availability {
    Unknown => "unknown",
    Available => "available",
    Unavailable => "unavailable",
});

impl Availability {
    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    pub fn is_available(self) -> bool {
        matches!(self, Self::Available)
    }
}

impl From<bool> for Availability {
    fn from(available: bool) -> Self {
        if available {
            Self::Available
        } else {
            Self::Unavailable
        }
    }
}

/// A saved server-side search usable as a read-only fallback dataset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SavedSearch {
    pub id: String,
    pub name: String,
}

impl SavedSearch {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }

    /// Whether any word of the name equals `keyword`, ignoring case.
    ///
    /// Matching whole words keeps "all" from matching "Small Fleet".
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        self.name
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| !word.is_empty() && word.eq_ignore_ascii_case(keyword))
    }
}

/// Point-in-time view of backend detection state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    pub modern: Availability,
    pub classic: Availability,
    pub advanced_search: Availability,
    /// Backend currently serving reads, once resolved
    pub active: Option<BackendKind>,
    /// Saved search chosen as the fallback dataset
    pub saved_search: Option<SavedSearch>,
    /// Whether a fresh copy of the fallback dataset is cached
    pub dataset_cached: bool,
}

impl CapabilitySnapshot {
    pub fn availability(&self, kind: BackendKind) -> Availability {
        match kind {
            BackendKind::Modern => self.modern,
            BackendKind::Classic => self.classic,
            BackendKind::AdvancedSearch => self.advanced_search,
        }
    }

    pub fn can_mutate(&self) -> bool {
        self.modern.is_available()
    }
}
