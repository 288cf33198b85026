//! News store gateway contract and SQLite implementation.
//!
//! # Responsibility
//! - Expose every news set/definition/configuration operation to callers.
//! - Run each operation as one scoped transaction that commits or rolls back
//!   before the call returns.
//!
//! # Invariants
//! - Transactions are never held across separate store calls.
//! - Deleting a predefined definition removes every configuration that
//!   references it, in every set, within the same transaction.
//! - List operations return an empty `Vec` when nothing matches.

use crate::db::migrations::{current_user_version, latest_version};
use crate::initializer::{self, DefinitionPartition};
use crate::model::configuration::{
    ConfigurationId, NewsConfiguration, PredefinedNewsConfiguration, UserDefinedNewsConfiguration,
};
use crate::model::definition::{DefinitionId, NewsDefinition, PredefinedNewsDefinition};
use crate::model::news_set::{NewsSet, SetId};
use crate::model::{DefinitionKind, RoleSet};
use crate::repo::error::{EntityKind, StoreError, StoreResult, WriteResultExt};
use crate::repo::query::{BoundQuery, Predicate, SelectQuery};
use crate::repo::rows::{
    self, CONFIGURATION_ORDER, CONFIGURATION_SELECT_SQL, DEFINITION_SELECT_SQL, SET_SELECT_SQL,
};
use log::{debug, error, info};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Instant;

const REQUIRED_TABLES: &[&str] = &[
    "news_sets",
    "news_definitions",
    "definition_roles",
    "definition_parameters",
    "news_configurations",
    "configuration_preferences",
];

/// Deferred handle to a configuration row.
///
/// Obtaining the handle never touches storage; `load` fails with
/// `StoreError::NotFound` when the row does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigurationRef {
    id: ConfigurationId,
}

impl ConfigurationRef {
    pub fn id(&self) -> ConfigurationId {
        self.id
    }

    pub fn load<S: NewsStore + ?Sized>(&self, store: &S) -> StoreResult<NewsConfiguration> {
        store
            .find_configuration(self.id)?
            .ok_or_else(|| StoreError::NotFound {
                entity: EntityKind::Configuration,
                id: self.id.to_string(),
            })
    }
}

/// Persistence gateway for news sets, definitions and configurations.
pub trait NewsStore {
    /// Inserts or updates a definition keyed by its id.
    fn store_definition(&self, definition: &NewsDefinition) -> StoreResult<DefinitionId>;
    /// Inserts or updates a configuration keyed by its id.
    fn store_configuration(
        &self,
        configuration: &NewsConfiguration,
    ) -> StoreResult<ConfigurationId>;
    /// Inserts or updates a set and every configuration it holds.
    fn store_set(&self, set: &NewsSet) -> StoreResult<SetId>;

    /// Displayed configurations carrying `subscribe_id`.
    fn list_configurations_by_subscriber(
        &self,
        subscribe_id: &str,
    ) -> StoreResult<Vec<NewsConfiguration>>;
    /// User-defined configurations of a set, ordered by definition name.
    fn list_user_defined_configurations(
        &self,
        set_id: SetId,
        visible_only: bool,
    ) -> StoreResult<Vec<UserDefinedNewsConfiguration>>;
    /// Predefined configurations of a set, ordered by definition name.
    fn list_predefined_configurations(
        &self,
        set_id: SetId,
        visible_only: bool,
    ) -> StoreResult<Vec<PredefinedNewsConfiguration>>;
    /// Configurations in any set that reference `definition_id`.
    fn list_configurations_for_definition(
        &self,
        definition_id: DefinitionId,
    ) -> StoreResult<Vec<NewsConfiguration>>;
    /// Every predefined definition, ordered by name.
    fn list_all_predefined_definitions(&self) -> StoreResult<Vec<PredefinedNewsDefinition>>;
    /// Predefined definitions neither present in the set nor granted by `roles`.
    fn get_hidden_predefined_definitions(
        &self,
        set_id: SetId,
        roles: &RoleSet,
    ) -> StoreResult<Vec<PredefinedNewsDefinition>>;
    /// Splits every predefined definition into present/default/hidden groups.
    fn partition_predefined_definitions(
        &self,
        set_id: SetId,
        roles: &RoleSet,
    ) -> StoreResult<DefinitionPartition>;
    /// Adds default configurations to `set` in memory. Does not persist.
    fn init_news(&self, set: &mut NewsSet, roles: &RoleSet) -> StoreResult<usize>;
    /// Runs `init_news` and stores the set in one transaction.
    ///
    /// Only the set row and configurations without a stored row are written;
    /// stored configurations keep their committed state.
    fn initialize_set(&self, set: &mut NewsSet, roles: &RoleSet) -> StoreResult<usize>;

    fn get_predefined_definition(
        &self,
        id: DefinitionId,
    ) -> StoreResult<Option<PredefinedNewsDefinition>>;
    fn get_predefined_definition_by_name(
        &self,
        name: &str,
    ) -> StoreResult<Option<PredefinedNewsDefinition>>;
    fn get_definition(&self, id: DefinitionId) -> StoreResult<Option<NewsDefinition>>;
    /// Returns a deferred reference; see `ConfigurationRef::load`.
    fn get_configuration(&self, id: ConfigurationId) -> ConfigurationRef;
    fn find_configuration(&self, id: ConfigurationId) -> StoreResult<Option<NewsConfiguration>>;

    /// Removes exactly one configuration row.
    fn delete_configuration(&self, configuration: &NewsConfiguration) -> StoreResult<()>;
    /// Removes a predefined definition and all configurations referencing it.
    fn delete_definition(&self, definition: &PredefinedNewsDefinition) -> StoreResult<()>;
    /// Removes a set together with the configurations it owns.
    fn delete_set(&self, set: &NewsSet) -> StoreResult<()>;

    /// Distinct default roles across all predefined definitions, sorted.
    fn list_distinct_roles(&self) -> StoreResult<Vec<String>>;

    fn get_set(&self, id: SetId) -> StoreResult<Option<NewsSet>>;
    /// Sets owned by `user_id`, ordered by name.
    fn get_sets_for_user(&self, user_id: &str) -> StoreResult<Vec<NewsSet>>;
    fn get_set_by_name(&self, user_id: &str, set_name: &str) -> StoreResult<Option<NewsSet>>;
}

/// SQLite-backed news store.
pub struct SqliteNewsStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNewsStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_news_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn read<T, F>(&self, operation: &'static str, body: F) -> StoreResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StoreResult<T>,
    {
        self.run(operation, TransactionBehavior::Deferred, body)
    }

    fn write<T, F>(&self, operation: &'static str, body: F) -> StoreResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StoreResult<T>,
    {
        self.run(operation, TransactionBehavior::Immediate, body)
    }

    fn run<T, F>(
        &self,
        operation: &'static str,
        behavior: TransactionBehavior,
        body: F,
    ) -> StoreResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StoreResult<T>,
    {
        let started_at = Instant::now();
        let is_write = matches!(behavior, TransactionBehavior::Immediate);

        let result = Transaction::new_unchecked(self.conn, behavior)
            .map_err(StoreError::from)
            .and_then(|tx| {
                let value = body(&tx)?;
                tx.commit()?;
                Ok(value)
            });

        match &result {
            Ok(_) if is_write => info!(
                "event={} module=news_store status=ok duration_ms={}",
                operation,
                started_at.elapsed().as_millis()
            ),
            Ok(_) => debug!(
                "event={} module=news_store status=ok duration_ms={}",
                operation,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event={} module=news_store status=error duration_ms={} error_code={} error={}",
                operation,
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }
        result
    }
}

impl NewsStore for SqliteNewsStore<'_> {
    fn store_definition(&self, definition: &NewsDefinition) -> StoreResult<DefinitionId> {
        self.write("store_definition", |tx| {
            rows::write_definition(tx, definition)?;
            Ok(definition.id())
        })
    }

    fn store_configuration(
        &self,
        configuration: &NewsConfiguration,
    ) -> StoreResult<ConfigurationId> {
        self.write("store_configuration", |tx| {
            rows::write_configuration(tx, configuration)?;
            Ok(configuration.id())
        })
    }

    fn store_set(&self, set: &NewsSet) -> StoreResult<SetId> {
        self.write("store_set", |tx| {
            rows::write_set(tx, set)?;
            Ok(set.id)
        })
    }

    fn list_configurations_by_subscriber(
        &self,
        subscribe_id: &str,
    ) -> StoreResult<Vec<NewsConfiguration>> {
        let query = SelectQuery::select(CONFIGURATION_SELECT_SQL)
            .filter(Predicate::SubscribeId(subscribe_id.to_string()))
            .filter(Predicate::Displayed)
            .build();
        self.read("list_configurations_by_subscriber", |tx| {
            rows::query_configurations(tx, &query)
        })
    }

    fn list_user_defined_configurations(
        &self,
        set_id: SetId,
        visible_only: bool,
    ) -> StoreResult<Vec<UserDefinedNewsConfiguration>> {
        let query = set_configuration_query(set_id, DefinitionKind::UserDefined, visible_only);
        let configurations = self.read("list_user_defined_configurations", |tx| {
            rows::query_configurations(tx, &query)
        })?;

        configurations
            .into_iter()
            .map(|configuration| match configuration {
                NewsConfiguration::UserDefined(config) => Ok(config),
                other => Err(unexpected_variant(&other)),
            })
            .collect()
    }

    fn list_predefined_configurations(
        &self,
        set_id: SetId,
        visible_only: bool,
    ) -> StoreResult<Vec<PredefinedNewsConfiguration>> {
        let query = set_configuration_query(set_id, DefinitionKind::Predefined, visible_only);
        let configurations = self.read("list_predefined_configurations", |tx| {
            rows::query_configurations(tx, &query)
        })?;

        configurations
            .into_iter()
            .map(|configuration| match configuration {
                NewsConfiguration::Predefined(config) => Ok(config),
                other => Err(unexpected_variant(&other)),
            })
            .collect()
    }

    fn list_configurations_for_definition(
        &self,
        definition_id: DefinitionId,
    ) -> StoreResult<Vec<NewsConfiguration>> {
        let query = SelectQuery::select(CONFIGURATION_SELECT_SQL)
            .filter(Predicate::ConfigurationDefinition(definition_id))
            .order_by("c.set_id ASC, c.id ASC")
            .build();
        self.read("list_configurations_for_definition", |tx| {
            rows::query_configurations(tx, &query)
        })
    }

    fn list_all_predefined_definitions(&self) -> StoreResult<Vec<PredefinedNewsDefinition>> {
        let query = SelectQuery::select(DEFINITION_SELECT_SQL)
            .filter(Predicate::DefinitionKind(DefinitionKind::Predefined))
            .order_by("d.name ASC")
            .build();
        self.read("list_all_predefined_definitions", |tx| {
            rows::query_predefined_definitions(tx, &query)
        })
    }

    fn get_hidden_predefined_definitions(
        &self,
        set_id: SetId,
        roles: &RoleSet,
    ) -> StoreResult<Vec<PredefinedNewsDefinition>> {
        let query = SelectQuery::select(DEFINITION_SELECT_SQL)
            .filter(Predicate::DefinitionKind(DefinitionKind::Predefined))
            .filter(Predicate::DefinitionNotInSet(set_id))
            .filter(Predicate::NoDefaultRole(roles.clone()))
            .order_by("d.name ASC")
            .build();
        self.read("get_hidden_predefined_definitions", |tx| {
            rows::query_predefined_definitions(tx, &query)
        })
    }

    fn partition_predefined_definitions(
        &self,
        set_id: SetId,
        roles: &RoleSet,
    ) -> StoreResult<DefinitionPartition> {
        let query = SelectQuery::select(DEFINITION_SELECT_SQL)
            .filter(Predicate::DefinitionKind(DefinitionKind::Predefined))
            .order_by("d.name ASC")
            .build();
        self.read("partition_predefined_definitions", |tx| {
            let present = rows::present_definition_ids(tx, set_id)?;
            let definitions = rows::query_predefined_definitions(tx, &query)?;
            Ok(initializer::partition(&present, definitions, roles))
        })
    }

    fn init_news(&self, set: &mut NewsSet, roles: &RoleSet) -> StoreResult<usize> {
        if roles.is_empty() {
            debug!(
                "event=init_news module=news_store status=skipped reason=no_roles set_id={}",
                set.id
            );
            return Ok(0);
        }

        let candidates = self.read("init_news", |tx| default_candidates(tx, set.id, roles))?;
        let added = initializer::apply_defaults(set, candidates, roles);
        info!(
            "event=init_news module=news_store status=ok set_id={} added={}",
            set.id, added
        );
        Ok(added)
    }

    fn initialize_set(&self, set: &mut NewsSet, roles: &RoleSet) -> StoreResult<usize> {
        let set_id = set.id;
        let before = set.configurations.len();
        let mut working = set.clone();

        let added = self.write("initialize_set", |tx| {
            let added = if roles.is_empty() {
                0
            } else {
                let candidates = default_candidates(tx, working.id, roles)?;
                initializer::apply_defaults(&mut working, candidates, roles)
            };
            rows::write_set_additions(tx, &working)?;
            Ok(added)
        })?;

        // Only publish the in-memory additions once they are committed.
        *set = working;
        debug_assert_eq!(set.configurations.len(), before + added);
        info!(
            "event=initialize_set module=news_store status=ok set_id={} added={}",
            set_id, added
        );
        Ok(added)
    }

    fn get_predefined_definition(
        &self,
        id: DefinitionId,
    ) -> StoreResult<Option<PredefinedNewsDefinition>> {
        let query = SelectQuery::select(DEFINITION_SELECT_SQL)
            .filter(Predicate::DefinitionKind(DefinitionKind::Predefined))
            .filter(Predicate::DefinitionId(id))
            .build();
        let found = self.read("get_predefined_definition", |tx| {
            rows::query_predefined_definitions(tx, &query)
        })?;
        Ok(found.into_iter().next())
    }

    fn get_predefined_definition_by_name(
        &self,
        name: &str,
    ) -> StoreResult<Option<PredefinedNewsDefinition>> {
        let query = SelectQuery::select(DEFINITION_SELECT_SQL)
            .filter(Predicate::DefinitionKind(DefinitionKind::Predefined))
            .filter(Predicate::DefinitionName(name.to_string()))
            .build();
        let found = self.read("get_predefined_definition_by_name", |tx| {
            rows::query_predefined_definitions(tx, &query)
        })?;
        Ok(found.into_iter().next())
    }

    fn get_definition(&self, id: DefinitionId) -> StoreResult<Option<NewsDefinition>> {
        self.read("get_definition", |tx| rows::load_definition(tx, id))
    }

    fn get_configuration(&self, id: ConfigurationId) -> ConfigurationRef {
        ConfigurationRef { id }
    }

    fn find_configuration(&self, id: ConfigurationId) -> StoreResult<Option<NewsConfiguration>> {
        self.read("find_configuration", |tx| rows::load_configuration(tx, id))
    }

    fn delete_configuration(&self, configuration: &NewsConfiguration) -> StoreResult<()> {
        let id = configuration.id();
        self.write("delete_configuration", |tx| {
            let changed = tx
                .execute(
                    "DELETE FROM news_configurations WHERE id = ?1;",
                    [id.to_string()],
                )
                .for_entity(EntityKind::Configuration)?;
            if changed == 0 {
                return Err(StoreError::NotFound {
                    entity: EntityKind::Configuration,
                    id: id.to_string(),
                });
            }
            Ok(())
        })
    }

    fn delete_definition(&self, definition: &PredefinedNewsDefinition) -> StoreResult<()> {
        let id = definition.id;
        let removed = self.write("delete_definition", |tx| {
            let removed = tx
                .execute(
                    "DELETE FROM news_configurations
                     WHERE definition_id = ?1
                       AND kind = 'predefined';",
                    [id.to_string()],
                )
                .for_entity(EntityKind::Configuration)?;

            let changed = tx
                .execute(
                    "DELETE FROM news_definitions
                     WHERE id = ?1
                       AND kind = 'predefined';",
                    [id.to_string()],
                )
                .for_entity(EntityKind::Definition)?;
            if changed == 0 {
                return Err(StoreError::NotFound {
                    entity: EntityKind::Definition,
                    id: id.to_string(),
                });
            }

            Ok(removed)
        })?;

        info!(
            "event=delete_definition_cascade module=news_store status=ok definition_id={} configurations_removed={}",
            id, removed
        );
        Ok(())
    }

    fn delete_set(&self, set: &NewsSet) -> StoreResult<()> {
        let id = set.id;
        self.write("delete_set", |tx| {
            tx.execute(
                "DELETE FROM news_configurations WHERE set_id = ?1;",
                [id.to_string()],
            )
            .for_entity(EntityKind::Configuration)?;

            let changed = tx
                .execute("DELETE FROM news_sets WHERE id = ?1;", [id.to_string()])
                .for_entity(EntityKind::Set)?;
            if changed == 0 {
                return Err(StoreError::NotFound {
                    entity: EntityKind::Set,
                    id: id.to_string(),
                });
            }
            Ok(())
        })
    }

    fn list_distinct_roles(&self) -> StoreResult<Vec<String>> {
        self.read("list_distinct_roles", |tx| {
            let mut stmt = tx.prepare(
                "SELECT DISTINCT r.role
                 FROM definition_roles AS r
                 INNER JOIN news_definitions AS d ON d.id = r.definition_id
                 WHERE d.kind = 'predefined'
                 ORDER BY r.role ASC;",
            )?;
            let mut result = stmt.query([])?;
            let mut roles: Vec<String> = Vec::new();
            while let Some(row) = result.next()? {
                roles.push(row.get(0)?);
            }
            Ok(roles)
        })
    }

    fn get_set(&self, id: SetId) -> StoreResult<Option<NewsSet>> {
        let query = SelectQuery::select(SET_SELECT_SQL)
            .filter(Predicate::SetId(id))
            .build();
        let found = self.read("get_set", |tx| rows::query_sets(tx, &query))?;
        Ok(found.into_iter().next())
    }

    fn get_sets_for_user(&self, user_id: &str) -> StoreResult<Vec<NewsSet>> {
        let query = SelectQuery::select(SET_SELECT_SQL)
            .filter(Predicate::SetOwner(user_id.to_string()))
            .order_by("s.name ASC")
            .build();
        self.read("get_sets_for_user", |tx| rows::query_sets(tx, &query))
    }

    fn get_set_by_name(&self, user_id: &str, set_name: &str) -> StoreResult<Option<NewsSet>> {
        let query = SelectQuery::select(SET_SELECT_SQL)
            .filter(Predicate::SetOwner(user_id.to_string()))
            .filter(Predicate::SetName(set_name.to_string()))
            .build();
        let found = self.read("get_set_by_name", |tx| rows::query_sets(tx, &query))?;
        Ok(found.into_iter().next())
    }
}

fn set_configuration_query(
    set_id: SetId,
    kind: DefinitionKind,
    visible_only: bool,
) -> BoundQuery {
    SelectQuery::select(CONFIGURATION_SELECT_SQL)
        .filter(Predicate::ConfigurationInSet(set_id))
        .filter(Predicate::ConfigurationKind(kind))
        .filter_if(visible_only, Predicate::VisibleOnly)
        .order_by(CONFIGURATION_ORDER)
        .build()
}

/// Predefined definitions granted by `roles` and not yet persisted in the set.
fn default_candidates(
    conn: &Connection,
    set_id: SetId,
    roles: &RoleSet,
) -> StoreResult<Vec<PredefinedNewsDefinition>> {
    let query = SelectQuery::select(DEFINITION_SELECT_SQL)
        .filter(Predicate::DefinitionKind(DefinitionKind::Predefined))
        .filter(Predicate::DefinitionNotInSet(set_id))
        .filter(Predicate::AnyDefaultRole(roles.clone()))
        .order_by("d.name ASC")
        .build();
    rows::query_predefined_definitions(conn, &query)
}

fn unexpected_variant(configuration: &NewsConfiguration) -> StoreError {
    StoreError::InvalidData(format!(
        "configuration `{}` has unexpected kind `{}`",
        configuration.id(),
        configuration.kind().as_db()
    ))
}

fn ensure_news_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(StoreError::MissingRequiredTable(*table));
        }
    }

    Ok(())
}
