//! Feed definition model.
//!
//! A definition describes a feed source independent of any user. Only
//! predefined definitions carry default roles.

use super::{DefinitionKind, RoleSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub type DefinitionId = Uuid;

/// System-provided feed definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredefinedNewsDefinition {
    pub id: DefinitionId,
    pub name: String,
    /// Adapter used to fetch the feed, e.g. `rss`.
    pub class_name: String,
    /// Adapter parameters such as the feed URL.
    pub parameters: BTreeMap<String, String>,
    /// Roles that surface this definition automatically.
    pub default_roles: RoleSet,
}

impl PredefinedNewsDefinition {
    pub fn new(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            class_name: class_name.into(),
            parameters: BTreeMap::new(),
            default_roles: RoleSet::new(),
        }
    }

    /// Builder-style helper for granting default roles.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Returns whether any of `roles` grants this definition by default.
    pub fn granted_by(&self, roles: &RoleSet) -> bool {
        !self.default_roles.is_disjoint(roles)
    }
}

/// Feed definition authored by an end user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDefinedNewsDefinition {
    pub id: DefinitionId,
    pub name: String,
    pub class_name: String,
    pub parameters: BTreeMap<String, String>,
}

impl UserDefinedNewsDefinition {
    pub fn new(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            class_name: class_name.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// Any feed definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NewsDefinition {
    Predefined(PredefinedNewsDefinition),
    UserDefined(UserDefinedNewsDefinition),
}

impl NewsDefinition {
    pub fn id(&self) -> DefinitionId {
        match self {
            Self::Predefined(def) => def.id,
            Self::UserDefined(def) => def.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Predefined(def) => &def.name,
            Self::UserDefined(def) => &def.name,
        }
    }

    pub fn class_name(&self) -> &str {
        match self {
            Self::Predefined(def) => &def.class_name,
            Self::UserDefined(def) => &def.class_name,
        }
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        match self {
            Self::Predefined(def) => &def.parameters,
            Self::UserDefined(def) => &def.parameters,
        }
    }

    pub fn kind(&self) -> DefinitionKind {
        match self {
            Self::Predefined(_) => DefinitionKind::Predefined,
            Self::UserDefined(_) => DefinitionKind::UserDefined,
        }
    }

    pub fn as_predefined(&self) -> Option<&PredefinedNewsDefinition> {
        match self {
            Self::Predefined(def) => Some(def),
            Self::UserDefined(_) => None,
        }
    }

    pub fn as_user_defined(&self) -> Option<&UserDefinedNewsDefinition> {
        match self {
            Self::Predefined(_) => None,
            Self::UserDefined(def) => Some(def),
        }
    }
}

impl From<PredefinedNewsDefinition> for NewsDefinition {
    fn from(value: PredefinedNewsDefinition) -> Self {
        Self::Predefined(value)
    }
}

impl From<UserDefinedNewsDefinition> for NewsDefinition {
    fn from(value: UserDefinedNewsDefinition) -> Self {
        Self::UserDefined(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{NewsDefinition, PredefinedNewsDefinition, UserDefinedNewsDefinition};
    use crate::model::{DefinitionKind, RoleSet};

    #[test]
    fn default_roles_are_deduplicated() {
        let def = PredefinedNewsDefinition::new("Campus", "rss").with_roles([
            "student", "staff", "student",
        ]);
        assert_eq!(def.default_roles.len(), 2);
    }

    #[test]
    fn granted_by_requires_overlap() {
        let def = PredefinedNewsDefinition::new("Campus", "rss").with_roles(["student"]);
        let staff: RoleSet = ["staff".to_string()].into();
        let both: RoleSet = ["staff".to_string(), "student".to_string()].into();
        assert!(!def.granted_by(&staff));
        assert!(def.granted_by(&both));
        assert!(!def.granted_by(&RoleSet::new()));
    }

    #[test]
    fn discriminant_follows_variant() {
        let predefined = NewsDefinition::from(PredefinedNewsDefinition::new("A", "rss"));
        let user = NewsDefinition::from(UserDefinedNewsDefinition::new("B", "rss"));
        assert_eq!(predefined.kind(), DefinitionKind::Predefined);
        assert_eq!(user.kind(), DefinitionKind::UserDefined);
        assert!(predefined.as_predefined().is_some());
        assert!(user.as_predefined().is_none());
    }
}
