//! News set aggregate root.

use super::configuration::{Configuration, NewsConfiguration};
use super::definition::{DefinitionId, PredefinedNewsDefinition};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type SetId = Uuid;

/// A user's named collection of feed configurations.
///
/// # Invariants
/// - Every configuration in `configurations` has `set_id == self.id`.
/// - Mutations stay in memory until the store writes the set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsSet {
    pub id: SetId,
    /// Owner identifier from the calling service.
    pub user_id: String,
    pub name: String,
    pub configurations: Vec<NewsConfiguration>,
}

impl NewsSet {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            name: name.into(),
            configurations: Vec::new(),
        }
    }

    /// Adds a configuration, re-homing it onto this set.
    pub fn add_configuration(&mut self, configuration: impl Into<NewsConfiguration>) {
        let mut configuration = configuration.into();
        match &mut configuration {
            NewsConfiguration::Predefined(config) => config.set_id = self.id,
            NewsConfiguration::UserDefined(config) => config.set_id = self.id,
        }
        self.configurations.push(configuration);
    }

    /// Creates and adds a default predefined configuration for `definition`.
    pub fn add_predefined(&mut self, definition: PredefinedNewsDefinition) {
        let configuration = Configuration::new(self.id, definition);
        self.configurations.push(configuration.into());
    }

    /// Returns whether any configuration in memory references `definition_id`.
    pub fn references(&self, definition_id: DefinitionId) -> bool {
        self.configurations
            .iter()
            .any(|config| config.definition_id() == definition_id)
    }
}
