//! Actor identity management.
//!
//! Actor resolution order:
//! 1) CLI --actor (explicit)
//! 2) DAYPLAN_ACTOR environment variable
//! 3) Persisted value in .dayplan/actor
//! 4) Config default (actor.default)

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::storage::DATA_DIR;

pub const ACTOR_ENV: &str = "DAYPLAN_ACTOR";

const ACTOR_FILENAME: &str = "actor";

/// Where a resolved actor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorSource {
    Flag,
    Env,
    Persisted,
    Config,
}

/// Resolve the current actor from flag, environment, persisted value and config.
pub fn resolve_actor(root: &Path, cli_actor: Option<&str>, config: &Config) -> Result<String> {
    resolve_actor_with_source(root, cli_actor, config).map(|(actor, _)| actor)
}

pub fn resolve_actor_with_source(
    root: &Path,
    cli_actor: Option<&str>,
    config: &Config,
) -> Result<(String, ActorSource)> {
    if let Some(actor) = non_empty(cli_actor) {
        return Ok((actor.to_string(), ActorSource::Flag));
    }

    if let Ok(env_actor) = std::env::var(ACTOR_ENV) {
        if let Some(actor) = non_empty(Some(env_actor.as_str())) {
            return Ok((actor.to_string(), ActorSource::Env));
        }
    }

    if let Some(actor) = load_persisted_actor(root)? {
        return Ok((actor, ActorSource::Persisted));
    }

    Ok((config.actor.default.clone(), ActorSource::Config))
}

/// Persist the actor identity in `.dayplan/actor`.
pub fn persist_actor(root: &Path, actor: &str) -> Result<String> {
    let actor = non_empty(Some(actor))
        .ok_or_else(|| Error::InvalidArgument("actor name cannot be empty".to_string()))?;

    std::fs::create_dir_all(root.join(DATA_DIR))?;
    std::fs::write(actor_path(root), format!("{actor}\n"))?;
    Ok(actor.to_string())
}

/// Load the actor identity from `.dayplan/actor`, if present.
pub fn load_persisted_actor(root: &Path) -> Result<Option<String>> {
    let path = actor_path(root);
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(path)?;
    Ok(non_empty(Some(raw.as_str())).map(str::to_string))
}

fn actor_path(root: &Path) -> PathBuf {
    root.join(DATA_DIR).join(ACTOR_FILENAME)
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.map(str::trim).filter(|value| !value.is_empty())
}
