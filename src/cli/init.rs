//! dayplan init command implementation
//!
//! Creates the `.dayplan/` data directory, an empty snapshot, a default
//! `.dayplan.toml` and the actor's default list.

use std::path::{Path, PathBuf};

use crate::cli::session::{GlobalOptions, Session};
use crate::config::{Config, CONFIG_FILE};
use crate::error::Result;
use crate::events::ChangeKind;
use crate::output::{short_id, HumanOutput};
use crate::model::TaskList;

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct InitReport {
    root: PathBuf,
    created: InitCreated,
    default_list: TaskList,
    actor: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct InitCreated {
    config: bool,
    data_dir: bool,
}

pub fn run(global: GlobalOptions) -> Result<()> {
    let root = global.root()?;
    std::fs::create_dir_all(&root)?;
    let created_config = ensure_config(&root)?;

    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let init = session.store.init(&actor)?;

    let mut event_warning = None;
    if init.created {
        event_warning = session.emit(
            ChangeKind::ListCreated,
            Some(&init.default_list.id),
            &init.default_list,
        );
    }

    let report = InitReport {
        root: root.clone(),
        created: InitCreated {
            config: created_config,
            data_dir: init.created,
        },
        default_list: init.default_list.clone(),
        actor,
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(CONFIG_FILE);
    }
    if init.created {
        created_items.push(".dayplan/");
    }

    let header = if created_items.is_empty() {
        "dayplan init: nothing to do".to_string()
    } else {
        "dayplan init: initialized planner".to_string()
    };

    let mut human = HumanOutput::new(header);
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("root", root.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    human.push_summary(
        "default list",
        format!(
            "{} {} ({})",
            init.default_list.emoji,
            init.default_list.name,
            short_id(&init.default_list.id)
        ),
    );
    human.push_next_step("dayplan actor set <name>");
    human.push_next_step("dayplan task add \"<name>\" --date today");

    session.finish("init", &report, human)
}

fn ensure_config(root: &Path) -> Result<bool> {
    let path = Config::path_for(root);
    if path.exists() {
        return Ok(false);
    }
    Config::default().save(&path)?;
    Ok(true)
}
