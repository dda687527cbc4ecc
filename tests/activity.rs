use std::sync::Arc;

use chrono::{Duration, Utc};
use dayplan::activity::{
    stringify, ActivityDispatcher, ActivityFilter, ActivityLogger, ActivitySink,
    JsonlActivitySink, MemorySink,
};
use dayplan::model::{ActivityAction, ActivityLogEntry, EntityRef, Priority, Task};
use dayplan::storage::Storage;
use dayplan::{Error, Result};
use serde_json::{json, Map, Value};
use tempfile::TempDir;

struct FailingSink;

impl ActivitySink for FailingSink {
    fn create_activity_log(&self, _entry: &ActivityLogEntry) -> Result<()> {
        Err(Error::OperationFailed("sink offline".to_string()))
    }
}

fn updates(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn sample_task() -> Task {
    let mut task = Task::new("inbox", "Draft proposal");
    task.priority = Priority::Medium;
    task.labels = vec!["a".to_string(), "b".to_string()];
    task
}

#[test]
fn identical_updates_log_nothing() {
    let sink = Arc::new(MemorySink::new());
    let logger = ActivityLogger::new(sink.clone());
    let task = sample_task();

    let entries = logger.log_update(
        EntityRef::Task(task.id.clone()),
        &updates(json!({
            "name": "Draft proposal",
            "priority": "medium",
            "labels": ["a", "b"],
            "description": null,
        })),
        &task,
        Some("alice"),
    );
    assert!(entries.is_empty());
    assert!(sink.entries().is_empty());
}

#[test]
fn one_changed_field_logs_one_entry() {
    let sink = Arc::new(MemorySink::new());
    let logger = ActivityLogger::new(sink.clone());
    let task = sample_task();

    let entries = logger.log_update(
        EntityRef::Task(task.id.clone()),
        &updates(json!({"name": "Draft proposal", "priority": "high"})),
        &task,
        Some("alice"),
    );
    assert_eq!(entries.len(), 1);
    let entry = &sink.entries()[0];
    assert_eq!(entry.action, ActivityAction::Updated);
    assert_eq!(entry.field.as_deref(), Some("priority"));
    assert_eq!(entry.old_value.as_deref(), Some("medium"));
    assert_eq!(entry.new_value.as_deref(), Some("high"));
    assert_eq!(entry.user_id.as_deref(), Some("alice"));
}

#[test]
fn values_are_stringified_by_shape() {
    let sink = Arc::new(MemorySink::new());
    let logger = ActivityLogger::new(sink.clone());
    let task = sample_task();

    logger.log_update(
        EntityRef::Task(task.id.clone()),
        &updates(json!({
            "description": "now described",
            "labels": ["a"],
            "order": 4,
        })),
        &task,
        None,
    );

    let entries = sink.entries();
    assert_eq!(entries.len(), 3);
    let by_field = |field: &str| {
        entries
            .iter()
            .find(|entry| entry.field.as_deref() == Some(field))
            .cloned()
            .unwrap()
    };
    let description = by_field("description");
    assert_eq!(description.old_value, None);
    assert_eq!(description.new_value.as_deref(), Some("now described"));
    let labels = by_field("labels");
    assert_eq!(labels.old_value.as_deref(), Some(r#"["a","b"]"#));
    assert_eq!(labels.new_value.as_deref(), Some(r#"["a"]"#));
    assert_eq!(by_field("order").new_value.as_deref(), Some("4"));

    assert_eq!(stringify(&Value::Null), None);
    assert_eq!(stringify(&json!(true)).as_deref(), Some("true"));
}

#[test]
fn sink_failures_are_swallowed() {
    let logger = ActivityLogger::new(Arc::new(FailingSink));
    let entry = logger.log_lifecycle(
        EntityRef::List("inbox".to_string()),
        ActivityAction::Created,
        Some("alice"),
    );
    assert_eq!(entry.action, ActivityAction::Created);
    assert!(entry.field.is_none());
}

#[test]
fn jsonl_sink_filters_newest_first() {
    let dir = TempDir::new().unwrap();
    let sink = JsonlActivitySink::new(Storage::new(dir.path()));
    let logger = ActivityLogger::new(Arc::new(sink.clone()));

    logger.log_lifecycle(
        EntityRef::Task("t1".to_string()),
        ActivityAction::Created,
        Some("alice"),
    );
    std::thread::sleep(std::time::Duration::from_millis(2));
    logger.log_completion("t1", Some("alice"));
    logger.log_move("t2", "inbox", "work", Some("bob"));

    assert_eq!(sink.read_all().unwrap().len(), 3);

    let for_t1 = ActivityFilter {
        entity: Some(EntityRef::Task("t1".to_string())),
        ..ActivityFilter::default()
    };
    let entries = sink.read_filtered(&for_t1, None).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, ActivityAction::Completed);
    assert_eq!(entries[1].action, ActivityAction::Created);

    let by_bob = ActivityFilter {
        actor: Some("bob".to_string()),
        ..ActivityFilter::default()
    };
    let entries = sink.read_filtered(&by_bob, None).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].field.as_deref(), Some("listId"));

    let future = ActivityFilter {
        since: Some(Utc::now() + Duration::hours(1)),
        ..ActivityFilter::default()
    };
    assert!(sink.read_filtered(&future, None).unwrap().is_empty());
    assert_eq!(
        sink.read_filtered(&ActivityFilter::default(), Some(1))
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn offset_pages_past_newest_entries() {
    let dir = TempDir::new().unwrap();
    let sink = JsonlActivitySink::new(Storage::new(dir.path()));
    let logger = ActivityLogger::new(Arc::new(sink.clone()));

    logger.log_lifecycle(
        EntityRef::Task("t1".to_string()),
        ActivityAction::Created,
        Some("alice"),
    );
    std::thread::sleep(std::time::Duration::from_millis(2));
    logger.log_update(
        EntityRef::Task("t1".to_string()),
        &updates(json!({"name": "Renamed"})),
        &sample_task(),
        Some("alice"),
    );
    std::thread::sleep(std::time::Duration::from_millis(2));
    logger.log_completion("t1", Some("alice"));
    logger.log_lifecycle(
        EntityRef::Task("t2".to_string()),
        ActivityAction::Created,
        Some("alice"),
    );

    let page = |offset: usize, limit: usize| -> Vec<ActivityAction> {
        let filter = ActivityFilter {
            entity: Some(EntityRef::Task("t1".to_string())),
            offset,
            ..ActivityFilter::default()
        };
        sink.read_filtered(&filter, Some(limit))
            .unwrap()
            .into_iter()
            .map(|entry| entry.action)
            .collect()
    };

    assert_eq!(page(0, 2), vec![ActivityAction::Completed, ActivityAction::Updated]);
    assert_eq!(page(2, 2), vec![ActivityAction::Created]);
    assert_eq!(page(1, 1), vec![ActivityAction::Updated]);
    assert!(page(3, 2).is_empty());
}

#[tokio::test]
async fn dispatcher_close_waits_for_every_write() {
    let memory = Arc::new(MemorySink::new());
    let dispatcher = ActivityDispatcher::spawn(memory.clone());
    let logger = ActivityLogger::new(Arc::new(dispatcher.sink()));

    for idx in 0..25 {
        logger.log_lifecycle(
            EntityRef::Task(format!("task-{idx}")),
            ActivityAction::Created,
            None,
        );
    }

    let stats = dispatcher.close().await.unwrap();
    assert_eq!(stats.attempted, 25);
    assert_eq!(stats.failed, 0);
    assert_eq!(memory.entries().len(), 25);
}

#[tokio::test]
async fn dispatcher_counts_failed_writes() {
    let dispatcher = ActivityDispatcher::spawn(Arc::new(FailingSink));
    let logger = ActivityLogger::new(Arc::new(dispatcher.sink()));
    logger.log_completion("t1", None);
    logger.log_completion("t2", None);

    let stats = dispatcher.close().await.unwrap();
    assert_eq!(stats.attempted, 2);
    assert_eq!(stats.failed, 2);
}
