//! Per-set feed configuration model.
//!
//! # Invariants
//! - A configuration always belongs to exactly one set (`set_id`).
//! - `Configuration<D>` fixes the definition variant at the type level, so a
//!   predefined configuration can only wrap a predefined definition.

use super::definition::{DefinitionId, PredefinedNewsDefinition, UserDefinedNewsDefinition};
use super::news_set::SetId;
use super::DefinitionKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub type ConfigurationId = Uuid;

/// Implemented by the definition types a configuration may wrap.
pub trait DefinitionVariant {
    const KIND: DefinitionKind;

    fn definition_id(&self) -> DefinitionId;
    fn definition_name(&self) -> &str;
}

impl DefinitionVariant for PredefinedNewsDefinition {
    const KIND: DefinitionKind = DefinitionKind::Predefined;

    fn definition_id(&self) -> DefinitionId {
        self.id
    }

    fn definition_name(&self) -> &str {
        &self.name
    }
}

impl DefinitionVariant for UserDefinedNewsDefinition {
    const KIND: DefinitionKind = DefinitionKind::UserDefined;

    fn definition_id(&self) -> DefinitionId {
        self.id
    }

    fn definition_name(&self) -> &str {
        &self.name
    }
}

/// One set's inclusion of one definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration<D> {
    pub id: ConfigurationId,
    /// Owning set.
    pub set_id: SetId,
    pub definition: D,
    /// External subscription key, independent of set ownership.
    pub subscribe_id: Option<String>,
    /// Whether the feed shows up in the rendered list.
    pub displayed: bool,
    /// Whether the feed participates in visibility-restricted listings.
    pub visible_only: bool,
    /// Per-user overrides layered on top of the definition parameters.
    pub preferences: BTreeMap<String, String>,
}

pub type PredefinedNewsConfiguration = Configuration<PredefinedNewsDefinition>;
pub type UserDefinedNewsConfiguration = Configuration<UserDefinedNewsDefinition>;

impl<D: DefinitionVariant> Configuration<D> {
    /// Creates a displayed, visible configuration for `definition` in `set_id`.
    pub fn new(set_id: SetId, definition: D) -> Self {
        Self {
            id: Uuid::new_v4(),
            set_id,
            definition,
            subscribe_id: None,
            displayed: true,
            visible_only: true,
            preferences: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> DefinitionKind {
        D::KIND
    }
}

/// Any configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NewsConfiguration {
    Predefined(PredefinedNewsConfiguration),
    UserDefined(UserDefinedNewsConfiguration),
}

macro_rules! common_field {
    ($self:ident, $field:ident) => {
        match $self {
            Self::Predefined(config) => &config.$field,
            Self::UserDefined(config) => &config.$field,
        }
    };
}

impl NewsConfiguration {
    pub fn id(&self) -> ConfigurationId {
        *common_field!(self, id)
    }

    pub fn set_id(&self) -> SetId {
        *common_field!(self, set_id)
    }

    pub fn kind(&self) -> DefinitionKind {
        match self {
            Self::Predefined(_) => DefinitionKind::Predefined,
            Self::UserDefined(_) => DefinitionKind::UserDefined,
        }
    }

    pub fn definition_id(&self) -> DefinitionId {
        match self {
            Self::Predefined(config) => config.definition.definition_id(),
            Self::UserDefined(config) => config.definition.definition_id(),
        }
    }

    pub fn definition_name(&self) -> &str {
        match self {
            Self::Predefined(config) => config.definition.definition_name(),
            Self::UserDefined(config) => config.definition.definition_name(),
        }
    }

    pub fn subscribe_id(&self) -> Option<&str> {
        common_field!(self, subscribe_id).as_deref()
    }

    pub fn displayed(&self) -> bool {
        *common_field!(self, displayed)
    }

    pub fn visible_only(&self) -> bool {
        *common_field!(self, visible_only)
    }

    pub fn preferences(&self) -> &BTreeMap<String, String> {
        common_field!(self, preferences)
    }

    pub fn as_predefined(&self) -> Option<&PredefinedNewsConfiguration> {
        match self {
            Self::Predefined(config) => Some(config),
            Self::UserDefined(_) => None,
        }
    }

    pub fn as_user_defined(&self) -> Option<&UserDefinedNewsConfiguration> {
        match self {
            Self::Predefined(_) => None,
            Self::UserDefined(config) => Some(config),
        }
    }
}

impl From<PredefinedNewsConfiguration> for NewsConfiguration {
    fn from(value: PredefinedNewsConfiguration) -> Self {
        Self::Predefined(value)
    }
}

impl From<UserDefinedNewsConfiguration> for NewsConfiguration {
    fn from(value: UserDefinedNewsConfiguration) -> Self {
        Self::UserDefined(value)
    }
}
