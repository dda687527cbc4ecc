//! Field-level activity logging.
//!
//! Entries go out through an [`ActivitySink`]. Logging is best-effort: a sink
//! failure is reported with `tracing::warn!` and never reaches the caller of
//! the mutation being logged.
//!
//! Stores activity under `.dayplan/activity.jsonl`.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use ulid::Ulid;

use crate::error::{Error, Result};
use crate::lock::{FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::model::{ActivityAction, ActivityLogEntry, EntityRef};
use crate::storage::Storage;

/// Destination for activity entries.
pub trait ActivitySink: Send + Sync {
    fn create_activity_log(&self, entry: &ActivityLogEntry) -> Result<()>;
}

fn new_entry(entity: EntityRef, action: ActivityAction, actor: Option<&str>) -> ActivityLogEntry {
    ActivityLogEntry {
        id: Ulid::new().to_string(),
        entity,
        action,
        field: None,
        old_value: None,
        new_value: None,
        user_id: actor.map(str::to_string),
        created_at: Utc::now(),
    }
}

/// Text form of a logged value. Strings stay raw and null is absent.
pub fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

#[derive(Clone)]
pub struct ActivityLogger {
    sink: Arc<dyn ActivitySink>,
}

impl fmt::Debug for ActivityLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityLogger").finish_non_exhaustive()
    }
}

impl ActivityLogger {
    pub fn new(sink: Arc<dyn ActivitySink>) -> Self {
        Self { sink }
    }

    /// One `updated` entry per key of `updates` whose value differs from `old`.
    ///
    /// Values are compared structurally after serialization; a key missing
    /// from `old` compares as null.
    pub fn log_update<T: Serialize>(
        &self,
        entity: EntityRef,
        updates: &Map<String, Value>,
        old: &T,
        actor: Option<&str>,
    ) -> Vec<ActivityLogEntry> {
        let old = match serde_json::to_value(old) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(err) => {
                tracing::warn!(entity = %entity, error = %err, "activity diff skipped");
                return Vec::new();
            }
        };

        let mut entries = Vec::new();
        for (field, new_value) in updates {
            let old_value = old.get(field).unwrap_or(&Value::Null);
            if old_value == new_value {
                continue;
            }
            let mut entry = new_entry(entity.clone(), ActivityAction::Updated, actor);
            entry.field = Some(field.clone());
            entry.old_value = stringify(old_value);
            entry.new_value = stringify(new_value);
            self.record(&entry);
            entries.push(entry);
        }
        entries
    }

    /// Diff a serializable patch against the entity it is about to touch.
    pub fn log_patch<P: Serialize, T: Serialize>(
        &self,
        entity: EntityRef,
        patch: &P,
        old: &T,
        actor: Option<&str>,
    ) -> Vec<ActivityLogEntry> {
        match serde_json::to_value(patch) {
            Ok(Value::Object(updates)) => self.log_update(entity, &updates, old, actor),
            Ok(_) => Vec::new(),
            Err(err) => {
                tracing::warn!(entity = %entity, error = %err, "activity diff skipped");
                Vec::new()
            }
        }
    }

    /// A field-less entry for `created`, `deleted` and `completed`.
    pub fn log_lifecycle(
        &self,
        entity: EntityRef,
        action: ActivityAction,
        actor: Option<&str>,
    ) -> ActivityLogEntry {
        let entry = new_entry(entity, action, actor);
        self.record(&entry);
        entry
    }

    pub fn log_completion(&self, task_id: &str, actor: Option<&str>) -> ActivityLogEntry {
        self.log_lifecycle(
            EntityRef::Task(task_id.to_string()),
            ActivityAction::Completed,
            actor,
        )
    }

    pub fn log_move(
        &self,
        task_id: &str,
        from_list: &str,
        to_list: &str,
        actor: Option<&str>,
    ) -> ActivityLogEntry {
        let mut entry = new_entry(
            EntityRef::Task(task_id.to_string()),
            ActivityAction::Moved,
            actor,
        );
        entry.field = Some("listId".to_string());
        entry.old_value = Some(from_list.to_string());
        entry.new_value = Some(to_list.to_string());
        self.record(&entry);
        entry
    }

    fn record(&self, entry: &ActivityLogEntry) {
        if let Err(err) = self.sink.create_activity_log(entry) {
            tracing::warn!(
                entry = %entry.id,
                entity = %entry.entity,
                action = %entry.action,
                error = %err,
                "failed to write activity entry"
            );
        }
    }
}

// =============================================================================
// Sinks
// =============================================================================

/// Keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<ActivityLogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ActivityLogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ActivitySink for MemorySink {
    fn create_activity_log(&self, entry: &ActivityLogEntry) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| Error::OperationFailed("activity memory sink poisoned".to_string()))?
            .push(entry.clone());
        Ok(())
    }
}

/// Appends entries to `activity.jsonl` under its lock.
#[derive(Debug, Clone)]
pub struct JsonlActivitySink {
    storage: Storage,
}

impl JsonlActivitySink {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn read_all(&self) -> Result<Vec<ActivityLogEntry>> {
        let path = self.storage.activity_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let _lock = FileLock::for_data_file(&path, DEFAULT_LOCK_TIMEOUT_MS)?;
        self.storage.read_jsonl(&path)
    }

    /// Matching entries, newest first, skipping `filter.offset` before `limit`.
    pub fn read_filtered(
        &self,
        filter: &ActivityFilter,
        limit: Option<usize>,
    ) -> Result<Vec<ActivityLogEntry>> {
        let mut entries = self.read_all()?;
        entries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(entries
            .into_iter()
            .filter(|entry| filter.matches(entry))
            .skip(filter.offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }
}

impl ActivitySink for JsonlActivitySink {
    fn create_activity_log(&self, entry: &ActivityLogEntry) -> Result<()> {
        let path = self.storage.activity_file();
        let _lock = FileLock::for_data_file(&path, DEFAULT_LOCK_TIMEOUT_MS)?;
        self.storage.append_jsonl(&path, entry)
    }
}

// =============================================================================
// Async dispatch
// =============================================================================

enum Message {
    Entry(ActivityLogEntry),
    Close,
}

/// Outcome counts of a dispatcher's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub attempted: usize,
    pub failed: usize,
}

/// Queues entries for a worker task that owns the real sink.
///
/// Writes through [`ActivityDispatcher::sink`] never wait on the real sink.
/// [`ActivityDispatcher::close`] resolves once every entry queued before it
/// has had its single write attempt.
pub struct ActivityDispatcher {
    sender: mpsc::UnboundedSender<Message>,
    worker: JoinHandle<DispatchStats>,
}

impl fmt::Debug for ActivityDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityDispatcher")
            .field("closed", &self.sender.is_closed())
            .finish_non_exhaustive()
    }
}

impl ActivityDispatcher {
    /// Start the worker. Must be called from within a tokio runtime.
    pub fn spawn(sink: Arc<dyn ActivitySink>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(drain(sink, receiver));
        Self { sender, worker }
    }

    /// A sink handle that feeds this dispatcher.
    pub fn sink(&self) -> QueuedSink {
        QueuedSink {
            sender: self.sender.clone(),
        }
    }

    pub async fn close(self) -> Result<DispatchStats> {
        // The worker may already be gone if every sender was dropped.
        let _ = self.sender.send(Message::Close);
        self.worker
            .await
            .map_err(|err| Error::Dispatch(format!("activity worker failed: {err}")))
    }
}

async fn drain(
    sink: Arc<dyn ActivitySink>,
    mut receiver: mpsc::UnboundedReceiver<Message>,
) -> DispatchStats {
    let mut stats = DispatchStats::default();
    while let Some(message) = receiver.recv().await {
        let entry = match message {
            Message::Entry(entry) => entry,
            Message::Close => break,
        };
        stats.attempted += 1;

        let id = entry.id.clone();
        let sink = Arc::clone(&sink);
        let outcome =
            tokio::task::spawn_blocking(move || sink.create_activity_log(&entry)).await;
        let error = match outcome {
            Ok(Ok(())) => continue,
            Ok(Err(err)) => err.to_string(),
            Err(err) => err.to_string(),
        };
        stats.failed += 1;
        tracing::warn!(entry = %id, error = %error, "queued activity write failed");
    }
    tracing::debug!(
        attempted = stats.attempted,
        failed = stats.failed,
        "activity dispatcher drained"
    );
    stats
}

/// Sink that hands entries to an [`ActivityDispatcher`].
#[derive(Clone)]
pub struct QueuedSink {
    sender: mpsc::UnboundedSender<Message>,
}

impl fmt::Debug for QueuedSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedSink").finish_non_exhaustive()
    }
}

impl ActivitySink for QueuedSink {
    fn create_activity_log(&self, entry: &ActivityLogEntry) -> Result<()> {
        self.sender
            .send(Message::Entry(entry.clone()))
            .map_err(|_| Error::Dispatch("activity dispatcher is closed".to_string()))
    }
}

// =============================================================================
// Querying
// =============================================================================

/// Filter for selecting activity entries
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub entity: Option<EntityRef>,
    pub actor: Option<String>,
    pub action: Option<ActivityAction>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Matching entries to skip, counted newest first.
    pub offset: usize,
}

impl ActivityFilter {
    pub fn matches(&self, entry: &ActivityLogEntry) -> bool {
        if let Some(entity) = &self.entity {
            if &entry.entity != entity {
                return false;
            }
        }

        if let Some(actor) = &self.actor {
            if entry.user_id.as_deref() != Some(actor.as_str()) {
                return false;
            }
        }

        if let Some(action) = self.action {
            if entry.action != action {
                return false;
            }
        }

        if let Some(since) = &self.since {
            if &entry.created_at < since {
                return false;
            }
        }

        if let Some(until) = &self.until {
            if &entry.created_at > until {
                return false;
            }
        }

        true
    }
}

/// One human-readable line per entry
pub fn format_entry(entry: &ActivityLogEntry) -> String {
    let ts = entry.created_at.format("%Y-%m-%d %H:%M:%S");
    let actor = entry.user_id.as_deref().unwrap_or("-");
    let mut line = format!("{ts} {} {} by {actor}", entry.action, entry.entity);
    if let Some(field) = &entry.field {
        let old = entry.old_value.as_deref().unwrap_or("∅");
        let new = entry.new_value.as_deref().unwrap_or("∅");
        line.push_str(&format!(" {field}: {old} -> {new}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, Task, TaskPatch};
    use serde_json::json;

    struct FailingSink;

    impl ActivitySink for FailingSink {
        fn create_activity_log(&self, _entry: &ActivityLogEntry) -> Result<()> {
            Err(Error::OperationFailed("store offline".to_string()))
        }
    }

    fn logger() -> (ActivityLogger, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (ActivityLogger::new(sink.clone()), sink)
    }

    #[test]
    fn stringify_keeps_strings_raw() {
        assert_eq!(stringify(&json!("high")), Some("high".to_string()));
        assert_eq!(stringify(&json!(null)), None);
        assert_eq!(stringify(&json!(3)), Some("3".to_string()));
        assert_eq!(stringify(&json!(["a", "b"])), Some("[\"a\",\"b\"]".to_string()));
    }

    #[test]
    fn identical_updates_log_nothing() {
        let (logger, sink) = logger();
        let task = Task::new("inbox", "Same");
        let patch = TaskPatch {
            name: Some("Same".to_string()),
            priority: Some(Priority::None),
            ..TaskPatch::default()
        };
        let entries = logger.log_patch(EntityRef::Task(task.id.clone()), &patch, &task, None);
        assert!(entries.is_empty());
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn cleared_field_has_no_new_value() {
        let (logger, sink) = logger();
        let mut task = Task::new("inbox", "Notes");
        task.description = Some("draft".to_string());
        let updates = json!({ "description": null });
        let updates = updates.as_object().unwrap();

        let entries = logger.log_update(EntityRef::Task(task.id.clone()), updates, &task, Some("me"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].old_value.as_deref(), Some("draft"));
        assert!(entries[0].new_value.is_none());
        assert_eq!(sink.entries().len(), 1);
    }

    #[test]
    fn sink_failure_is_swallowed() {
        let logger = ActivityLogger::new(Arc::new(FailingSink));
        let entry = logger.log_lifecycle(
            EntityRef::List("list-1".to_string()),
            ActivityAction::Deleted,
            Some("me"),
        );
        assert_eq!(entry.action, ActivityAction::Deleted);
        assert!(entry.field.is_none());
    }

    #[test]
    fn move_entry_records_both_lists() {
        let (logger, _sink) = logger();
        let entry = logger.log_move("task-1", "inbox", "work", Some("me"));
        assert_eq!(entry.action, ActivityAction::Moved);
        assert_eq!(entry.field.as_deref(), Some("listId"));
        assert_eq!(entry.old_value.as_deref(), Some("inbox"));
        assert_eq!(entry.new_value.as_deref(), Some("work"));
    }

    #[test]
    fn filter_matches_entity_and_action() {
        let (logger, _sink) = logger();
        let entry = logger.log_completion("task-1", Some("me"));

        let mut filter = ActivityFilter {
            entity: Some(EntityRef::Task("task-1".to_string())),
            ..ActivityFilter::default()
        };
        assert!(filter.matches(&entry));
        filter.action = Some(ActivityAction::Deleted);
        assert!(!filter.matches(&entry));
        filter.action = None;
        filter.actor = Some("someone-else".to_string());
        assert!(!filter.matches(&entry));
    }

    #[test]
    fn format_entry_shows_field_change() {
        let (logger, _sink) = logger();
        let entry = logger.log_move("task-1", "inbox", "work", Some("me"));
        let line = format_entry(&entry);
        assert!(line.contains("moved task:task-1 by me"));
        assert!(line.contains("listId: inbox -> work"));
    }

    #[tokio::test]
    async fn close_drains_queued_entries() {
        let memory = Arc::new(MemorySink::new());
        let dispatcher = ActivityDispatcher::spawn(memory.clone());
        let logger = ActivityLogger::new(Arc::new(dispatcher.sink()));

        for idx in 0..5 {
            logger.log_lifecycle(
                EntityRef::Task(format!("task-{idx}")),
                ActivityAction::Created,
                None,
            );
        }

        let stats = dispatcher.close().await.unwrap();
        assert_eq!(stats, DispatchStats { attempted: 5, failed: 0 });
        assert_eq!(memory.entries().len(), 5);
    }

    #[tokio::test]
    async fn close_reports_failed_writes() {
        let dispatcher = ActivityDispatcher::spawn(Arc::new(FailingSink));
        let logger = ActivityLogger::new(Arc::new(dispatcher.sink()));
        logger.log_completion("task-1", None);

        let stats = dispatcher.close().await.unwrap();
        assert_eq!(stats, DispatchStats { attempted: 1, failed: 1 });
    }
}
