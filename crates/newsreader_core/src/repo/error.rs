//! Store error taxonomy and SQLite failure classification.
//!
//! # Invariants
//! - Lookup misses surface as `Ok(None)`, never as `NotFound`, except for
//!   deferred references and writes that target a missing row.
//! - Engine failures are classified, never swallowed.

use crate::db::DbError;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::ffi;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

static CONSTRAINT_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:UNIQUE|NOT NULL|CHECK) constraint failed: ([A-Za-z0-9_.]+(?:, [A-Za-z0-9_.]+)*)")
        .expect("valid constraint regex")
});

pub type StoreResult<T> = Result<T, StoreError>;

/// Entity family an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Set,
    Definition,
    Configuration,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Set => "news set",
            Self::Definition => "news definition",
            Self::Configuration => "news configuration",
        };
        f.write_str(label)
    }
}

/// Error returned by every news store operation.
#[derive(Debug)]
pub enum StoreError {
    /// A deferred reference or targeted write found no row.
    NotFound { entity: EntityKind, id: String },
    /// A foreign key rejected the write or delete.
    ReferentialViolation { entity: EntityKind, detail: String },
    /// A uniqueness, required-field or check constraint failed.
    ConstraintViolation { entity: EntityKind, field: String },
    /// Storage is unreachable, locked or cannot commit.
    Connectivity(DbError),
    /// Any other storage failure.
    Db(DbError),
    /// Persisted data cannot be mapped onto the domain model.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::ReferentialViolation { entity, detail } => {
                write!(f, "{entity} violates a reference: {detail}")
            }
            Self::ConstraintViolation { entity, field } => {
                write!(f, "{entity} violates constraint on `{field}`")
            }
            Self::Connectivity(err) => write!(f, "storage unavailable: {err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted news data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "news store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "news store requires table `{table}`")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Connectivity(err) | Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) if is_connectivity(&err) => Self::Connectivity(DbError::Sqlite(err)),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::from(DbError::Sqlite(value))
    }
}

impl StoreError {
    /// Short stable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::ReferentialViolation { .. } => "referential_violation",
            Self::ConstraintViolation { .. } => "constraint_violation",
            Self::Connectivity(_) => "connectivity",
            Self::Db(_) => "db_error",
            Self::InvalidData(_) => "invalid_data",
            Self::UninitializedConnection { .. } => "uninitialized_connection",
            Self::MissingRequiredTable(_) => "missing_table",
        }
    }
}

/// Classifies a SQLite failure raised while writing `entity`.
pub(crate) fn classify(entity: EntityKind, err: rusqlite::Error) -> StoreError {
    let extended_code = match &err {
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation => {
            failure.extended_code
        }
        _ => return StoreError::from(err),
    };

    let message = match &err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => message.clone(),
        _ => String::new(),
    };

    if extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
        let detail = if message.is_empty() {
            "FOREIGN KEY constraint failed".to_string()
        } else {
            message
        };
        return StoreError::ReferentialViolation { entity, detail };
    }

    let field = CONSTRAINT_FIELD_RE
        .captures(&message)
        .and_then(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .unwrap_or_else(|| "unknown".to_string());
    StoreError::ConstraintViolation { entity, field }
}

/// Extension for mapping write failures onto an entity.
pub(crate) trait WriteResultExt<T> {
    fn for_entity(self, entity: EntityKind) -> StoreResult<T>;
}

impl<T> WriteResultExt<T> for rusqlite::Result<T> {
    fn for_entity(self, entity: EntityKind) -> StoreResult<T> {
        self.map_err(|err| classify(entity, err))
    }
}

fn is_connectivity(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => matches!(
            failure.code,
            ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::SystemIoFailure
                | ErrorCode::ReadOnly
        ),
        _ => false,
    }
}
