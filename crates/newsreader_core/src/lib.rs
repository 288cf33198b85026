//! Persistence and initialization layer for personal news sets.
//!
//! Users own news sets. A set holds configurations, and each configuration
//! wraps a predefined or user-defined feed definition. This crate stores
//! those entities in SQLite and decides which predefined feeds a user's roles
//! add by default.

pub mod config;
pub mod db;
pub mod initializer;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, StoreConfig};
pub use initializer::DefinitionPartition;
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::configuration::{
    Configuration, ConfigurationId, NewsConfiguration, PredefinedNewsConfiguration,
    UserDefinedNewsConfiguration,
};
pub use model::definition::{
    DefinitionId, NewsDefinition, PredefinedNewsDefinition, UserDefinedNewsDefinition,
};
pub use model::news_set::{NewsSet, SetId};
pub use model::{DefinitionKind, RoleSet};
pub use repo::error::{EntityKind, StoreError, StoreResult};
pub use repo::news_store::{ConfigurationRef, NewsStore, SqliteNewsStore};
pub use service::news_set_service::{NewsSetService, NewsSetServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
