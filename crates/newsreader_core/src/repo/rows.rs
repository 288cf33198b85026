//! Row mapping between SQLite tables and the news domain model.
//!
//! Every helper takes a plain `&Connection` so it runs unchanged inside the
//! caller's transaction.

use crate::model::configuration::{
    Configuration, ConfigurationId, DefinitionVariant, NewsConfiguration,
};
use crate::model::definition::{
    DefinitionId, NewsDefinition, PredefinedNewsDefinition, UserDefinedNewsDefinition,
};
use crate::model::news_set::{NewsSet, SetId};
use crate::model::{DefinitionKind, RoleSet};
use crate::repo::error::{EntityKind, StoreError, StoreResult, WriteResultExt};
use crate::repo::query::{BoundQuery, Predicate, SelectQuery};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

pub(crate) const DEFINITION_SELECT_SQL: &str = "SELECT
    d.id,
    d.kind,
    d.name,
    d.class_name
FROM news_definitions AS d";

pub(crate) const CONFIGURATION_SELECT_SQL: &str = "SELECT
    c.id,
    c.kind,
    c.set_id,
    c.definition_id,
    c.subscribe_id,
    c.displayed,
    c.visible_only
FROM news_configurations AS c
INNER JOIN news_definitions AS d ON d.id = c.definition_id";

pub(crate) const SET_SELECT_SQL: &str = "SELECT
    s.id,
    s.user_id,
    s.name
FROM news_sets AS s";

pub(crate) const CONFIGURATION_ORDER: &str = "d.name ASC, c.id ASC";

struct DefinitionRow {
    id: DefinitionId,
    kind: DefinitionKind,
    name: String,
    class_name: String,
}

struct ConfigurationRow {
    id: ConfigurationId,
    kind: DefinitionKind,
    set_id: SetId,
    definition_id: DefinitionId,
    subscribe_id: Option<String>,
    displayed: bool,
    visible_only: bool,
}

pub(crate) fn query_definitions(
    conn: &Connection,
    query: &BoundQuery,
) -> StoreResult<Vec<NewsDefinition>> {
    let mut stmt = conn.prepare(&query.sql)?;
    let mut rows = stmt.query(params_from_iter(query.params.iter()))?;
    let mut base_rows = Vec::new();
    while let Some(row) = rows.next()? {
        base_rows.push(parse_definition_row(row)?);
    }

    base_rows
        .into_iter()
        .map(|row| hydrate_definition(conn, row))
        .collect()
}

pub(crate) fn query_predefined_definitions(
    conn: &Connection,
    query: &BoundQuery,
) -> StoreResult<Vec<PredefinedNewsDefinition>> {
    query_definitions(conn, query)?
        .into_iter()
        .map(|definition| match definition {
            NewsDefinition::Predefined(def) => Ok(def),
            NewsDefinition::UserDefined(def) => Err(StoreError::InvalidData(format!(
                "expected predefined definition, got user-defined `{}`",
                def.id
            ))),
        })
        .collect()
}

pub(crate) fn load_definition(
    conn: &Connection,
    id: DefinitionId,
) -> StoreResult<Option<NewsDefinition>> {
    let query = SelectQuery::select(DEFINITION_SELECT_SQL)
        .filter(Predicate::DefinitionId(id))
        .build();
    Ok(query_definitions(conn, &query)?.into_iter().next())
}

pub(crate) fn definition_kind(
    conn: &Connection,
    id: DefinitionId,
) -> StoreResult<Option<DefinitionKind>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT kind FROM news_definitions WHERE id = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    value
        .map(|text| parse_kind(&text, "news_definitions.kind"))
        .transpose()
}

pub(crate) fn write_definition(conn: &Connection, definition: &NewsDefinition) -> StoreResult<()> {
    let id = definition.id();
    let kind = definition.kind();
    if let Some(existing) = definition_kind(conn, id)? {
        if existing != kind {
            return Err(StoreError::ConstraintViolation {
                entity: EntityKind::Definition,
                field: "kind".to_string(),
            });
        }
    }

    conn.execute(
        "INSERT INTO news_definitions (id, kind, name, class_name)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (id) DO UPDATE SET
            name = excluded.name,
            class_name = excluded.class_name;",
        params![
            id.to_string(),
            kind.as_db(),
            definition.name(),
            definition.class_name(),
        ],
    )
    .for_entity(EntityKind::Definition)?;

    conn.execute(
        "DELETE FROM definition_parameters WHERE definition_id = ?1;",
        [id.to_string()],
    )?;
    for (name, value) in definition.parameters() {
        conn.execute(
            "INSERT INTO definition_parameters (definition_id, name, value) VALUES (?1, ?2, ?3);",
            params![id.to_string(), name, value],
        )
        .for_entity(EntityKind::Definition)?;
    }

    conn.execute(
        "DELETE FROM definition_roles WHERE definition_id = ?1;",
        [id.to_string()],
    )?;
    if let NewsDefinition::Predefined(def) = definition {
        for role in &def.default_roles {
            conn.execute(
                "INSERT INTO definition_roles (definition_id, role) VALUES (?1, ?2);",
                params![id.to_string(), role],
            )
            .for_entity(EntityKind::Definition)?;
        }
    }

    Ok(())
}

fn parse_definition_row(row: &Row<'_>) -> StoreResult<DefinitionRow> {
    Ok(DefinitionRow {
        id: parse_uuid(&row.get::<_, String>("id")?, "news_definitions.id")?,
        kind: parse_kind(&row.get::<_, String>("kind")?, "news_definitions.kind")?,
        name: row.get("name")?,
        class_name: row.get("class_name")?,
    })
}

fn hydrate_definition(conn: &Connection, row: DefinitionRow) -> StoreResult<NewsDefinition> {
    let parameters = load_string_map(
        conn,
        "SELECT name, value FROM definition_parameters WHERE definition_id = ?1 ORDER BY name;",
        row.id,
    )?;

    Ok(match row.kind {
        DefinitionKind::Predefined => NewsDefinition::Predefined(PredefinedNewsDefinition {
            id: row.id,
            name: row.name,
            class_name: row.class_name,
            parameters,
            default_roles: load_roles(conn, row.id)?,
        }),
        DefinitionKind::UserDefined => NewsDefinition::UserDefined(UserDefinedNewsDefinition {
            id: row.id,
            name: row.name,
            class_name: row.class_name,
            parameters,
        }),
    })
}

fn load_roles(conn: &Connection, id: DefinitionId) -> StoreResult<RoleSet> {
    let mut stmt =
        conn.prepare("SELECT role FROM definition_roles WHERE definition_id = ?1 ORDER BY role;")?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut roles = RoleSet::new();
    while let Some(row) = rows.next()? {
        roles.insert(row.get(0)?);
    }
    Ok(roles)
}

pub(crate) fn query_configurations(
    conn: &Connection,
    query: &BoundQuery,
) -> StoreResult<Vec<NewsConfiguration>> {
    let mut stmt = conn.prepare(&query.sql)?;
    let mut rows = stmt.query(params_from_iter(query.params.iter()))?;
    let mut base_rows = Vec::new();
    while let Some(row) = rows.next()? {
        base_rows.push(parse_configuration_row(row)?);
    }

    let mut definitions: HashMap<DefinitionId, NewsDefinition> = HashMap::new();
    let mut configurations = Vec::with_capacity(base_rows.len());
    for row in base_rows {
        let definition = match definitions.get(&row.definition_id) {
            Some(definition) => definition.clone(),
            None => {
                let loaded = load_definition(conn, row.definition_id)?.ok_or_else(|| {
                    StoreError::InvalidData(format!(
                        "configuration `{}` references missing definition `{}`",
                        row.id, row.definition_id
                    ))
                })?;
                definitions.insert(row.definition_id, loaded.clone());
                loaded
            }
        };
        configurations.push(hydrate_configuration(conn, row, definition)?);
    }

    Ok(configurations)
}

pub(crate) fn load_configuration(
    conn: &Connection,
    id: ConfigurationId,
) -> StoreResult<Option<NewsConfiguration>> {
    let query = SelectQuery::select(CONFIGURATION_SELECT_SQL)
        .filter(Predicate::ConfigurationId(id))
        .build();
    Ok(query_configurations(conn, &query)?.into_iter().next())
}

pub(crate) fn load_set_configurations(
    conn: &Connection,
    set_id: SetId,
) -> StoreResult<Vec<NewsConfiguration>> {
    let query = SelectQuery::select(CONFIGURATION_SELECT_SQL)
        .filter(Predicate::ConfigurationInSet(set_id))
        .order_by(CONFIGURATION_ORDER)
        .build();
    query_configurations(conn, &query)
}

/// Ids of every definition referenced by a persisted configuration of the set.
pub(crate) fn present_definition_ids(
    conn: &Connection,
    set_id: SetId,
) -> StoreResult<BTreeSet<DefinitionId>> {
    let mut stmt =
        conn.prepare("SELECT DISTINCT definition_id FROM news_configurations WHERE set_id = ?1;")?;
    let mut rows = stmt.query([set_id.to_string()])?;
    let mut ids = BTreeSet::new();
    while let Some(row) = rows.next()? {
        let text: String = row.get(0)?;
        ids.insert(parse_uuid(&text, "news_configurations.definition_id")?);
    }
    Ok(ids)
}

pub(crate) fn write_configuration(
    conn: &Connection,
    configuration: &NewsConfiguration,
) -> StoreResult<()> {
    let id = configuration.id();
    let definition_id = configuration.definition_id();
    match definition_kind(conn, definition_id)? {
        None => {
            return Err(StoreError::ReferentialViolation {
                entity: EntityKind::Configuration,
                detail: format!("definition `{definition_id}` does not exist"),
            });
        }
        Some(kind) if kind != configuration.kind() => {
            return Err(StoreError::ConstraintViolation {
                entity: EntityKind::Configuration,
                field: "definition_id".to_string(),
            });
        }
        Some(_) => {}
    }

    conn.execute(
        "INSERT INTO news_configurations (
            id,
            kind,
            set_id,
            definition_id,
            subscribe_id,
            displayed,
            visible_only
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (id) DO UPDATE SET
            kind = excluded.kind,
            set_id = excluded.set_id,
            definition_id = excluded.definition_id,
            subscribe_id = excluded.subscribe_id,
            displayed = excluded.displayed,
            visible_only = excluded.visible_only;",
        params![
            id.to_string(),
            configuration.kind().as_db(),
            configuration.set_id().to_string(),
            definition_id.to_string(),
            configuration.subscribe_id(),
            bool_to_int(configuration.displayed()),
            bool_to_int(configuration.visible_only()),
        ],
    )
    .for_entity(EntityKind::Configuration)?;

    conn.execute(
        "DELETE FROM configuration_preferences WHERE configuration_id = ?1;",
        [id.to_string()],
    )?;
    for (name, value) in configuration.preferences() {
        conn.execute(
            "INSERT INTO configuration_preferences (configuration_id, name, value)
             VALUES (?1, ?2, ?3);",
            params![id.to_string(), name, value],
        )
        .for_entity(EntityKind::Configuration)?;
    }

    Ok(())
}

fn parse_configuration_row(row: &Row<'_>) -> StoreResult<ConfigurationRow> {
    Ok(ConfigurationRow {
        id: parse_uuid(&row.get::<_, String>("id")?, "news_configurations.id")?,
        kind: parse_kind(&row.get::<_, String>("kind")?, "news_configurations.kind")?,
        set_id: parse_uuid(&row.get::<_, String>("set_id")?, "news_configurations.set_id")?,
        definition_id: parse_uuid(
            &row.get::<_, String>("definition_id")?,
            "news_configurations.definition_id",
        )?,
        subscribe_id: row.get("subscribe_id")?,
        displayed: parse_flag(row.get("displayed")?, "news_configurations.displayed")?,
        visible_only: parse_flag(row.get("visible_only")?, "news_configurations.visible_only")?,
    })
}

fn hydrate_configuration(
    conn: &Connection,
    row: ConfigurationRow,
    definition: NewsDefinition,
) -> StoreResult<NewsConfiguration> {
    let preferences = load_string_map(
        conn,
        "SELECT name, value FROM configuration_preferences
         WHERE configuration_id = ?1 ORDER BY name;",
        row.id,
    )?;

    match (row.kind, definition) {
        (DefinitionKind::Predefined, NewsDefinition::Predefined(def)) => {
            Ok(assemble(row, def, preferences).into())
        }
        (DefinitionKind::UserDefined, NewsDefinition::UserDefined(def)) => {
            Ok(assemble(row, def, preferences).into())
        }
        (kind, definition) => Err(StoreError::InvalidData(format!(
            "configuration `{}` of kind `{}` wraps definition `{}` of kind `{}`",
            row.id,
            kind.as_db(),
            definition.id(),
            definition.kind().as_db()
        ))),
    }
}

fn assemble<D: DefinitionVariant>(
    row: ConfigurationRow,
    definition: D,
    preferences: BTreeMap<String, String>,
) -> Configuration<D> {
    Configuration {
        id: row.id,
        set_id: row.set_id,
        definition,
        subscribe_id: row.subscribe_id,
        displayed: row.displayed,
        visible_only: row.visible_only,
        preferences,
    }
}

pub(crate) fn query_sets(conn: &Connection, query: &BoundQuery) -> StoreResult<Vec<NewsSet>> {
    let mut stmt = conn.prepare(&query.sql)?;
    let mut rows = stmt.query(params_from_iter(query.params.iter()))?;
    let mut sets = Vec::new();
    while let Some(row) = rows.next()? {
        sets.push(NewsSet {
            id: parse_uuid(&row.get::<_, String>("id")?, "news_sets.id")?,
            user_id: row.get("user_id")?,
            name: row.get("name")?,
            configurations: Vec::new(),
        });
    }

    for set in &mut sets {
        set.configurations = load_set_configurations(conn, set.id)?;
    }
    Ok(sets)
}

pub(crate) fn write_set_row(conn: &Connection, set: &NewsSet) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO news_sets (id, user_id, name)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (id) DO UPDATE SET
            user_id = excluded.user_id,
            name = excluded.name;",
        params![set.id.to_string(), set.user_id, set.name],
    )
    .for_entity(EntityKind::Set)?;
    Ok(())
}

/// Writes the set row and every configuration it holds in memory.
pub(crate) fn write_set(conn: &Connection, set: &NewsSet) -> StoreResult<()> {
    write_set_row(conn, set)?;
    for configuration in &set.configurations {
        ensure_owned_by(set, configuration)?;
        write_configuration(conn, configuration)?;
    }
    Ok(())
}

/// Writes the set row and only the configurations that have no row yet.
///
/// Stored configurations are left as they are, so changes committed since
/// `set` was loaded survive.
pub(crate) fn write_set_additions(conn: &Connection, set: &NewsSet) -> StoreResult<usize> {
    write_set_row(conn, set)?;
    let mut written = 0;
    for configuration in &set.configurations {
        ensure_owned_by(set, configuration)?;
        if configuration_exists(conn, configuration.id())? {
            continue;
        }
        write_configuration(conn, configuration)?;
        written += 1;
    }
    Ok(written)
}

fn ensure_owned_by(set: &NewsSet, configuration: &NewsConfiguration) -> StoreResult<()> {
    if configuration.set_id() != set.id {
        return Err(StoreError::ConstraintViolation {
            entity: EntityKind::Configuration,
            field: "set_id".to_string(),
        });
    }
    Ok(())
}

fn configuration_exists(conn: &Connection, id: ConfigurationId) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM news_configurations WHERE id = ?1);",
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn load_string_map(
    conn: &Connection,
    sql: &str,
    owner: Uuid,
) -> StoreResult<BTreeMap<String, String>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([owner.to_string()])?;
    let mut values = BTreeMap::new();
    while let Some(row) = rows.next()? {
        values.insert(row.get(0)?, row.get(1)?);
    }
    Ok(values)
}

fn parse_uuid(value: &str, column: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn parse_kind(value: &str, column: &str) -> StoreResult<DefinitionKind> {
    DefinitionKind::from_db(value)
        .ok_or_else(|| StoreError::InvalidData(format!("invalid kind `{value}` in {column}")))
}

fn parse_flag(value: i64, column: &str) -> StoreResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StoreError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
