//! Per-invocation command context.
//!
//! A [`Session`] owns the store, the resolved actor, the optional change
//! event sink and the activity dispatcher. Activity is queued while the
//! command runs and flushed when the session finishes or drops.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Days, Local, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use tokio::runtime::Runtime;

use crate::activity::{ActivityDispatcher, ActivityLogger, JsonlActivitySink};
use crate::actor;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{emit_change, ChangeKind, EventDestination, EventSink};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::Storage;
use crate::store::PlannerStore;

/// Flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub root: Option<PathBuf>,
    pub actor: Option<String>,
    pub events: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

impl GlobalOptions {
    pub fn root(&self) -> Result<PathBuf> {
        match &self.root {
            Some(path) => Ok(path.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    pub fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }
}

pub(crate) struct Session {
    pub store: PlannerStore,
    pub actor: String,
    events: Option<EventSink>,
    output: OutputOptions,
    dispatcher: Option<ActivityDispatcher>,
    runtime: Runtime,
}

impl Session {
    pub fn open(global: &GlobalOptions) -> Result<Self> {
        let root = global.root()?;
        let config = Config::load_from_root(&root)?;
        let actor = actor::resolve_actor(&root, global.actor.as_deref(), &config)?;

        let destination = EventDestination::parse(
            global
                .events
                .as_deref()
                .or(config.events.destination.as_deref()),
        );
        let events = destination.as_ref().map(|dest| dest.open()).transpose()?;
        let events_to_stdout = matches!(destination, Some(EventDestination::Stdout));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let storage = Storage::new(root);
        let dispatcher = {
            let _guard = runtime.enter();
            ActivityDispatcher::spawn(Arc::new(JsonlActivitySink::new(storage.clone())))
        };
        let logger = ActivityLogger::new(Arc::new(dispatcher.sink()));
        let store = PlannerStore::new(storage, config, logger);

        Ok(Self {
            store,
            actor,
            events,
            output: OutputOptions {
                json: global.json && !events_to_stdout,
                quiet: global.quiet || events_to_stdout,
            },
            dispatcher: Some(dispatcher),
            runtime,
        })
    }

    /// Emit a change event; a failure comes back as a warning line.
    pub fn emit<T: Serialize>(
        &mut self,
        kind: ChangeKind,
        list_id: Option<&str>,
        data: T,
    ) -> Option<String> {
        emit_change(&mut self.events, kind, Some(&self.actor), list_id, data)
    }

    /// Flush queued activity, then print the command result.
    pub fn finish<T: Serialize>(
        mut self,
        command: &str,
        data: &T,
        mut human: HumanOutput,
    ) -> Result<()> {
        if let Some(warning) = self.close_activity() {
            human.push_warning(warning);
        }
        emit_success(self.output, command, data, Some(&human))
    }

    fn close_activity(&mut self) -> Option<String> {
        let dispatcher = self.dispatcher.take()?;
        match self.runtime.block_on(dispatcher.close()) {
            Ok(stats) if stats.failed == 0 => None,
            Ok(stats) => Some(format!(
                "{} of {} activity entries were not written",
                stats.failed, stats.attempted
            )),
            Err(err) => Some(format!("activity log flush failed: {err}")),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(warning) = self.close_activity() {
            tracing::warn!(warning = %warning, "activity flushed on drop");
        }
    }
}

/// Parse a point in time given on the command line.
///
/// Accepts `today`, `tomorrow`, `yesterday`, `+Nd`, `YYYY-MM-DD` (local
/// midnight) and RFC 3339 timestamps.
pub(crate) fn parse_when(label: &str, raw: &str) -> Result<DateTime<Utc>> {
    let value = raw.trim();
    let today = Local::now().date_naive();
    let invalid = || {
        Error::InvalidArgument(format!(
            "invalid {label} '{value}' (expected today, tomorrow, +Nd, YYYY-MM-DD or RFC 3339)"
        ))
    };

    let day = match value.to_ascii_lowercase().as_str() {
        "today" => Some(today),
        "tomorrow" => today.checked_add_days(Days::new(1)),
        "yesterday" => today.checked_sub_days(Days::new(1)),
        other => match other.strip_prefix('+').and_then(|rest| rest.strip_suffix('d')) {
            Some(count) => {
                let count: u64 = count.parse().map_err(|_| invalid())?;
                today.checked_add_days(Days::new(count))
            }
            None => NaiveDate::parse_from_str(value, "%Y-%m-%d").ok(),
        },
    };

    if let Some(day) = day {
        return local_midnight(day).ok_or_else(invalid);
    }

    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| invalid())
}

pub(crate) fn parse_optional_when(label: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|value| parse_when(label, value)).transpose()
}

fn local_midnight(day: NaiveDate) -> Option<DateTime<Utc>> {
    let naive = day.and_hms_opt(0, 0, 0)?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}
