//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open the configured news store and print a short health summary.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `newsreader_cli [config.json]`. Without an argument an in-memory
//! store is opened.

use log::error;
use newsreader_core::db::migrations::current_user_version;
use newsreader_core::db::open_db_with_config;
use newsreader_core::{init_logging_from_config, NewsStore, SqliteNewsStore, StoreConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_run module=cli status=error error={message}");
            eprintln!("newsreader_cli error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .map_err(|err| format!("failed to read `{path}`: {err}"))?;
            StoreConfig::from_json_str(&raw).map_err(|err| err.to_string())?
        }
        None => StoreConfig::default(),
    };
    init_logging_from_config(&config)?;

    let conn = open_db_with_config(&config).map_err(|err| err.to_string())?;
    let store = SqliteNewsStore::try_new(&conn).map_err(|err| err.to_string())?;
    let schema_version = current_user_version(&conn).map_err(|err| err.to_string())?;
    let roles = store.list_distinct_roles().map_err(|err| err.to_string())?;
    let definitions = store
        .list_all_predefined_definitions()
        .map_err(|err| err.to_string())?;

    println!("newsreader_core version={}", newsreader_core::core_version());
    println!("schema_version={schema_version}");
    println!("predefined_definitions={}", definitions.len());
    println!("roles={}", roles.join(","));
    Ok(())
}
