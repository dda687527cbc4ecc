//! dayplan suggest, stats and log command implementations.

use std::collections::HashMap;

use serde::Serialize;

use crate::activity::{format_entry, ActivityFilter};
use crate::analytics::{format_minutes, format_rate};
use crate::cli::session::{parse_optional_when, GlobalOptions, Session};
use crate::error::{Error, Result};
use crate::model::{ActivityAction, EntityRef};
use crate::output::{format_task_line, short_id, HumanOutput};
use crate::view::local_today;

pub struct LogOptions {
    pub task: Option<String>,
    pub list: Option<String>,
    pub label: Option<String>,
    pub action: Option<String>,
    pub by: Option<String>,
    pub since: Option<String>,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SuggestOutput {
    total: usize,
    suggestions: Vec<crate::suggest::ScoredTask>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogOutput {
    total: usize,
    entries: Vec<crate::model::ActivityLogEntry>,
}

pub fn run_suggest(global: GlobalOptions, count: Option<usize>) -> Result<()> {
    let session = Session::open(&global)?;
    let count = count.unwrap_or(session.store.config().suggest.count);
    let suggestions = session
        .store
        .suggest(&session.actor, count, local_today())?;

    let mut human = HumanOutput::new("Suggested next");
    human.push_summary("Total", suggestions.len().to_string());
    for (rank, scored) in suggestions.iter().enumerate() {
        human.push_detail(format!(
            "{}. {} [score {}]",
            rank + 1,
            format_task_line(&scored.task),
            scored.score
        ));
    }
    if suggestions.is_empty() {
        human.push_next_step("dayplan task add \"<name>\" --priority high");
    }

    let output = SuggestOutput {
        total: suggestions.len(),
        suggestions,
    };
    session.finish("suggest", &output, human)
}

pub fn run_stats(global: GlobalOptions) -> Result<()> {
    let session = Session::open(&global)?;
    let snapshot = session.store.analytics(&session.actor)?;

    let mut human = HumanOutput::new(format!(
        "Productivity (last {} days)",
        snapshot.window_days
    ));
    let summary = &snapshot.summary;
    human.push_summary("Total tasks", summary.total_tasks.to_string());
    human.push_summary("Completed", summary.completed_tasks.to_string());
    human.push_summary("Active", summary.active_tasks.to_string());
    human.push_summary("Completion rate", format_rate(summary.completion_rate));

    let completed_in_window: usize = snapshot
        .productivity_trend
        .iter()
        .map(|bucket| bucket.completed)
        .sum();
    let created_in_window: usize = snapshot
        .productivity_trend
        .iter()
        .map(|bucket| bucket.created)
        .sum();
    human.push_summary(
        "In window",
        format!("{created_in_window} created, {completed_in_window} completed"),
    );

    for group in &snapshot.tasks_by_list {
        human.push_detail(format!("list {}: {} tasks", group.name, group.count));
    }
    for group in &snapshot.tasks_by_label {
        human.push_detail(format!("label {}: {} tasks", group.name, group.count));
    }
    for spent in &snapshot.time_spent_by_list {
        human.push_detail(format!(
            "time in {}: {}",
            spent.name,
            format_minutes(spent.minutes)
        ));
    }

    session.finish("stats", &snapshot, human)
}

pub fn run_log(global: GlobalOptions, options: LogOptions) -> Result<()> {
    let session = Session::open(&global)?;
    let actor = session.actor.clone();

    let entity = if let Some(task) = options.task.as_deref() {
        // Deleted tasks only live on in the log; match their raw id.
        let id = match session.store.resolve_task_id(task, &actor) {
            Ok(id) => id,
            Err(Error::NotFound { .. }) => task.to_string(),
            Err(err) => return Err(err),
        };
        Some(EntityRef::Task(id))
    } else if let Some(list) = options.list {
        Some(EntityRef::List(list))
    } else {
        options.label.map(EntityRef::Label)
    };
    let filter = ActivityFilter {
        entity,
        actor: options.by,
        action: options.action.as_deref().map(parse_action).transpose()?,
        since: parse_optional_when("since", options.since.as_deref())?,
        until: None,
        offset: options.offset,
    };

    let entries = session.store.activity(&filter, Some(options.limit))?;

    let mut human = HumanOutput::new("Activity");
    human.push_summary("Total", entries.len().to_string());
    let mut per_action: HashMap<ActivityAction, usize> = HashMap::new();
    for entry in &entries {
        *per_action.entry(entry.action).or_default() += 1;
        human.push_detail(format_entry(entry));
    }
    let mut counts: Vec<(ActivityAction, usize)> = per_action.into_iter().collect();
    counts.sort_by_key(|(action, _)| action.as_str());
    if !counts.is_empty() {
        let joined: Vec<String> = counts
            .iter()
            .map(|(action, count)| format!("{action}={count}"))
            .collect();
        human.push_summary("Actions", joined.join(", "));
    }
    if let Some(EntityRef::Task(id)) = &filter.entity {
        human.push_summary("Task", short_id(id).to_string());
    }
    if options.limit > 0 && entries.len() == options.limit {
        human.push_next_step(format!(
            "dayplan log --offset {} --limit {}",
            filter.offset + options.limit,
            options.limit
        ));
    }

    let output = LogOutput {
        total: entries.len(),
        entries,
    };
    session.finish("log", &output, human)
}

fn parse_action(raw: &str) -> Result<ActivityAction> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "created" => Ok(ActivityAction::Created),
        "updated" => Ok(ActivityAction::Updated),
        "completed" => Ok(ActivityAction::Completed),
        "deleted" => Ok(ActivityAction::Deleted),
        "moved" => Ok(ActivityAction::Moved),
        other => Err(Error::InvalidArgument(format!(
            "unknown action '{other}' (expected created|updated|completed|deleted|moved)"
        ))),
    }
}
