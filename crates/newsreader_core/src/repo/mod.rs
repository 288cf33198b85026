//! Persistence gateway for news sets, definitions and configurations.
//!
//! # Responsibility
//! - Define the store contract consumed by calling services.
//! - Isolate SQLite query details behind typed predicates and row mappers.
//!
//! # Invariants
//! - Every store operation is one transaction; nothing leaks across calls.
//! - Store APIs return typed errors; single-row lookups return `Option`.

pub mod error;
pub mod news_store;
pub mod query;
mod rows;
