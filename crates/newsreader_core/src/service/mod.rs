//! News use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into user-facing flows.
//! - Keep calling layers decoupled from storage details.

pub mod news_set_service;
