//! dayplan actor command implementations.

use serde::Serialize;

use crate::actor::{self, ActorSource};
use crate::cli::session::GlobalOptions;
use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};

#[derive(Serialize)]
struct ActorReport {
    actor: String,
    source: ActorSource,
}

pub fn run_set(global: GlobalOptions, name: String) -> Result<()> {
    let root = global.root()?;
    let actor = actor::persist_actor(&root, &name)?;

    let report = ActorReport {
        actor: actor.clone(),
        source: ActorSource::Persisted,
    };

    let mut human = HumanOutput::new("Actor set");
    human.push_summary("actor", actor);
    emit_success(global.output(), "actor set", &report, Some(&human))
}

pub fn run_show(global: GlobalOptions) -> Result<()> {
    let root = global.root()?;
    let config = Config::load_from_root(&root)?;
    let (actor, source) =
        actor::resolve_actor_with_source(&root, global.actor.as_deref(), &config)?;

    let mut human = HumanOutput::new("Actor");
    human.push_summary("actor", actor.clone());
    human.push_summary(
        "source",
        match source {
            ActorSource::Flag => "--actor / DAYPLAN_ACTOR flag",
            ActorSource::Env => "DAYPLAN_ACTOR",
            ActorSource::Persisted => ".dayplan/actor",
            ActorSource::Config => ".dayplan.toml actor.default",
        },
    );

    emit_success(
        global.output(),
        "actor show",
        &ActorReport { actor, source },
        Some(&human),
    )
}
