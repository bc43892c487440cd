//! `gate session ...` subcommands.

use anyhow::{bail, Result};
use std::path::Path;

use crate::config::Config;
use crate::export::ExportFormat;
use crate::session::SessionStore;

pub fn run_create(config: &Config, name: Option<&str>) -> Result<()> {
    let mut store = SessionStore::open(&config.session.dir)?;
    let id = store.create(name)?;
    if store.list().contains(&id) {
        bail!("Session already exists: {}", id);
    }
    if !store.save() {
        bail!("Failed to save session '{}'", id);
    }
    println!("{}", id);
    Ok(())
}

pub fn run_list(config: &Config) -> Result<()> {
    let store = SessionStore::open(&config.session.dir)?;
    let ids = store.list();
    if ids.is_empty() {
        println!("No sessions.");
        return Ok(());
    }
    for id in ids {
        println!("{}", id);
    }
    Ok(())
}

pub fn run_show(config: &Config, id: &str) -> Result<()> {
    let mut store = SessionStore::open(&config.session.dir)?;
    if !store.load(id) {
        bail!("Session not found: {}", id);
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&store.get_session_summary())?
    );
    Ok(())
}

pub fn run_delete(config: &Config, id: &str) -> Result<()> {
    let mut store = SessionStore::open(&config.session.dir)?;
    if !store.delete(id) {
        bail!("Session not found: {}", id);
    }
    println!("Deleted session '{}'.", id);
    Ok(())
}

pub fn run_export(config: &Config, id: &str, format: ExportFormat, output: &Path) -> Result<()> {
    let mut store = SessionStore::open(&config.session.dir)?;
    if !store.export(id, output, format) {
        bail!("Failed to export session '{}'", id);
    }
    println!("Exported session '{}' to {}", id, output.display());
    Ok(())
}
