//! News domain model.
//!
//! # Responsibility
//! - Define news sets, feed definitions and per-set configurations.
//! - Express the predefined/user-defined split as closed sum types.
//!
//! # Invariants
//! - Every entity is identified by a stable UUID assigned at construction.
//! - A configuration's definition variant always matches its own variant.
//! - Entities never persist themselves; only the store writes them.

pub mod configuration;
pub mod definition;
pub mod news_set;

/// Set of role names granted to the requesting user.
pub type RoleSet = std::collections::BTreeSet<String>;

/// Discriminant shared by definitions and configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    /// System-curated feed, optionally granted by default roles.
    Predefined,
    /// Feed authored by an end user.
    UserDefined,
}

impl DefinitionKind {
    pub(crate) fn as_db(self) -> &'static str {
        match self {
            Self::Predefined => "predefined",
            Self::UserDefined => "user_defined",
        }
    }

    pub(crate) fn from_db(value: &str) -> Option<Self> {
        match value {
            "predefined" => Some(Self::Predefined),
            "user_defined" => Some(Self::UserDefined),
            _ => None,
        }
    }
}
