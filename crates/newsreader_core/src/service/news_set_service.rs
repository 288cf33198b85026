//! News set use-case service.
//!
//! # Responsibility
//! - Resolve a user's named set, creating and initializing it on first use.
//! - Provide opt-in, user feed and display toggle flows on top of the store.
//!
//! # Invariants
//! - Set names are trimmed and must not be blank.
//! - Every resolution re-applies role defaults, so newly granted roles
//!   surface their feeds on the next visit.

use crate::model::configuration::{
    Configuration, ConfigurationId, NewsConfiguration, PredefinedNewsConfiguration,
    UserDefinedNewsConfiguration,
};
use crate::model::definition::{DefinitionId, NewsDefinition, UserDefinedNewsDefinition};
use crate::model::news_set::{NewsSet, SetId};
use crate::model::RoleSet;
use crate::repo::error::StoreError;
use crate::repo::news_store::NewsStore;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from news set service operations.
#[derive(Debug)]
pub enum NewsSetServiceError {
    /// Set name is blank after trim.
    InvalidSetName,
    SetNotFound(SetId),
    DefinitionNotFound(DefinitionId),
    ConfigurationNotFound(ConfigurationId),
    /// The definition is already part of the set.
    AlreadySubscribed(DefinitionId),
    /// Store-level failure.
    Store(StoreError),
}

impl Display for NewsSetServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSetName => write!(f, "news set name must not be blank"),
            Self::SetNotFound(id) => write!(f, "news set not found: {id}"),
            Self::DefinitionNotFound(id) => write!(f, "news definition not found: {id}"),
            Self::ConfigurationNotFound(id) => write!(f, "news configuration not found: {id}"),
            Self::AlreadySubscribed(id) => {
                write!(f, "news definition already in set: {id}")
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NewsSetServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for NewsSetServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Service facade over a news store implementation.
pub struct NewsSetService<S: NewsStore> {
    store: S,
}

impl<S: NewsStore> NewsSetService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the underlying store for direct gateway calls.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads the user's set named `set_name`, creating it when missing, and
    /// applies role defaults.
    pub fn resolve_set(
        &self,
        user_id: &str,
        set_name: &str,
        roles: &RoleSet,
    ) -> Result<NewsSet, NewsSetServiceError> {
        let set_name = set_name.trim();
        if set_name.is_empty() {
            return Err(NewsSetServiceError::InvalidSetName);
        }

        let mut set = match self.store.get_set_by_name(user_id, set_name)? {
            Some(set) => set,
            None => {
                info!("event=news_set_create module=news_set_service status=start");
                NewsSet::new(user_id, set_name)
            }
        };

        self.store.initialize_set(&mut set, roles)?;
        Ok(set)
    }

    /// Opts the set into a predefined definition, e.g. one listed as hidden.
    pub fn subscribe_predefined(
        &self,
        set_id: SetId,
        definition_id: DefinitionId,
    ) -> Result<PredefinedNewsConfiguration, NewsSetServiceError> {
        let set = self
            .store
            .get_set(set_id)?
            .ok_or(NewsSetServiceError::SetNotFound(set_id))?;
        if set.references(definition_id) {
            return Err(NewsSetServiceError::AlreadySubscribed(definition_id));
        }

        let definition = self
            .store
            .get_predefined_definition(definition_id)?
            .ok_or(NewsSetServiceError::DefinitionNotFound(definition_id))?;
        let configuration = Configuration::new(set_id, definition);
        self.store
            .store_configuration(&NewsConfiguration::from(configuration.clone()))?;
        Ok(configuration)
    }

    /// Stores a user-authored definition and adds it to the set.
    pub fn add_user_feed(
        &self,
        set_id: SetId,
        definition: UserDefinedNewsDefinition,
    ) -> Result<UserDefinedNewsConfiguration, NewsSetServiceError> {
        if self.store.get_set(set_id)?.is_none() {
            return Err(NewsSetServiceError::SetNotFound(set_id));
        }

        self.store
            .store_definition(&NewsDefinition::from(definition.clone()))?;
        let configuration = Configuration::new(set_id, definition);
        self.store
            .store_configuration(&NewsConfiguration::from(configuration.clone()))?;
        Ok(configuration)
    }

    /// Shows or hides one configuration in the rendered feed list.
    pub fn set_displayed(
        &self,
        configuration_id: ConfigurationId,
        displayed: bool,
    ) -> Result<NewsConfiguration, NewsSetServiceError> {
        let reference = self.store.get_configuration(configuration_id);
        let mut configuration = match reference.load(&self.store) {
            Ok(configuration) => configuration,
            Err(StoreError::NotFound { .. }) => {
                return Err(NewsSetServiceError::ConfigurationNotFound(configuration_id));
            }
            Err(err) => return Err(err.into()),
        };

        match &mut configuration {
            NewsConfiguration::Predefined(config) => config.displayed = displayed,
            NewsConfiguration::UserDefined(config) => config.displayed = displayed,
        }
        self.store.store_configuration(&configuration)?;
        Ok(configuration)
    }
}
