mod support;

use std::fs;

use dayplan::activity::{ActivityLogger, MemorySink};
use dayplan::config::Config;
use dayplan::model::{ActivityAction, EntityRef, Priority, TaskDraft, TaskPatch, TaskTemplate};
use dayplan::storage::Storage;
use dayplan::store::PlannerStore;
use dayplan::Error;
use std::sync::Arc;
use support::{TestPlanner, ACTOR};

#[test]
fn task_without_list_lands_in_default_list() {
    let planner = TestPlanner::new();
    let store = &planner.store;

    let task = store
        .create_task(&TaskDraft::named("  Write report  "), ACTOR)
        .unwrap();
    let inbox = store.default_list(ACTOR).unwrap();

    assert_eq!(task.name, "Write report");
    assert_eq!(task.list_id, inbox.id);
    assert!(inbox.is_default);
    assert_eq!(inbox.name, "Inbox");
    assert_eq!(store.lists(ACTOR).unwrap().len(), 1);
}

#[test]
fn each_actor_gets_its_own_default_list() {
    let planner = TestPlanner::new();
    let store = &planner.store;

    let mine = store.default_list(ACTOR).unwrap();
    let theirs = store.default_list("bob").unwrap();
    assert_ne!(mine.id, theirs.id);

    let task = store.create_task(&TaskDraft::named("Bob's"), "bob").unwrap();
    assert_eq!(task.list_id, theirs.id);
    assert!(matches!(
        store.get_task(&task.id, ACTOR),
        Err(Error::NotFound { kind: "task", .. })
    ));
}

#[test]
fn new_tasks_append_to_list_order() {
    let planner = TestPlanner::new();
    let store = &planner.store;

    let first = store.create_task(&TaskDraft::named("one"), ACTOR).unwrap();
    let second = store.create_task(&TaskDraft::named("two"), ACTOR).unwrap();
    assert_eq!(first.order, 0);
    assert_eq!(second.order, 1);
}

#[test]
fn default_list_cannot_be_deleted() {
    let planner = TestPlanner::new();
    let inbox = planner.store.default_list(ACTOR).unwrap();

    let err = planner.store.delete_list(&inbox.id, ACTOR).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(planner.store.lists(ACTOR).unwrap().len(), 1);
}

#[test]
fn deleting_a_list_cascades_to_tasks_and_children() {
    let planner = TestPlanner::new();
    let store = &planner.store;

    let work = store.create_list("Work", None, None, ACTOR).unwrap();
    let mut draft = TaskDraft::named("Ship release");
    draft.list_id = Some(work.id.clone());
    let task = store.create_task(&draft, ACTOR).unwrap();
    store.add_subtask(&task.id, "Tag build", ACTOR).unwrap();
    let notes = planner.dir.path().join("notes.txt");
    fs::write(&notes, "changelog").unwrap();
    store.add_attachment(&task.id, &notes, ACTOR).unwrap();
    let keep = store.create_task(&TaskDraft::named("Stay"), ACTOR).unwrap();

    let mut template = TaskTemplate::new("Weekly sync");
    template.list_id = Some(work.id.clone());
    let template = store.create_template(template, ACTOR).unwrap();

    let deletion = store.delete_list(&work.id, ACTOR).unwrap();
    assert_eq!(deletion.tasks_removed, vec![task.id.clone()]);

    let state = store.storage().load_state().unwrap();
    assert_eq!(state.tasks.len(), 1);
    assert_eq!(state.tasks[0].id, keep.id);
    assert!(state.subtasks.is_empty());
    assert!(state.attachments.is_empty());
    let template = state
        .templates
        .iter()
        .find(|candidate| candidate.id == template.id)
        .unwrap();
    assert_eq!(template.list_id, None);

    assert_eq!(
        planner.actions_for(&task.id).last(),
        Some(&ActivityAction::Deleted)
    );
    assert!(planner.sink.entries().iter().any(|entry| {
        entry.entity == EntityRef::List(work.id.clone()) && entry.action == ActivityAction::Deleted
    }));
}

#[test]
fn deleting_a_task_removes_its_subtasks_and_attachments() {
    let planner = TestPlanner::new();
    let store = &planner.store;

    let task = store.create_task(&TaskDraft::named("Plan trip"), ACTOR).unwrap();
    store.add_subtask(&task.id, "Book flights", ACTOR).unwrap();
    store.add_subtask(&task.id, "Book hotel", ACTOR).unwrap();
    let itinerary = planner.dir.path().join("itinerary.pdf");
    fs::write(&itinerary, b"%PDF").unwrap();
    let attachment = store.add_attachment(&task.id, &itinerary, ACTOR).unwrap();
    assert_eq!(attachment.mime_type, "application/pdf");
    assert_eq!(attachment.file_size, 4);

    let deletion = store.delete_task(&task.id, ACTOR).unwrap();
    assert_eq!(deletion.subtasks_removed, 2);
    assert_eq!(deletion.attachments_removed, 1);

    let state = store.storage().load_state().unwrap();
    assert!(state.tasks.is_empty());
    assert!(state.subtasks.is_empty());
    assert!(state.attachments.is_empty());
}

#[test]
fn deleting_a_label_strips_it_from_tasks() {
    let planner = TestPlanner::new();
    let store = &planner.store;

    let urgent = store.create_label("urgent", None, None, ACTOR).unwrap();
    let home = store.create_label("home", None, None, ACTOR).unwrap();
    let mut draft = TaskDraft::named("Fix sink");
    draft.labels = vec![urgent.id.clone(), home.id.clone()];
    let task = store.create_task(&draft, ACTOR).unwrap();
    assert_eq!(task.labels.len(), 2);

    let deletion = store.delete_label(&urgent.id, ACTOR).unwrap();
    assert_eq!(deletion.tasks_updated, 1);

    let details = store.get_task(&task.id, ACTOR).unwrap();
    assert_eq!(details.task.labels, vec![home.id.clone()]);
    assert_eq!(details.labels.len(), 1);
}

#[test]
fn unknown_label_on_create_is_rejected() {
    let planner = TestPlanner::new();
    let mut draft = TaskDraft::named("Tagged");
    draft.labels = vec!["no-such-label".to_string()];

    let err = planner.store.create_task(&draft, ACTOR).unwrap_err();
    assert!(matches!(err, Error::NotFound { kind: "label", .. }));
    assert!(planner.store.tasks(ACTOR).unwrap().is_empty());
}

#[test]
fn unlabel_rejects_empty_short_and_ambiguous_ids() {
    let planner = TestPlanner::new();
    let store = &planner.store;

    let first = store.create_label("first", None, None, ACTOR).unwrap();
    let second = store.create_label("second", None, None, ACTOR).unwrap();
    let mut draft = TaskDraft::named("Tagged twice");
    draft.labels = vec![first.id.clone(), second.id.clone()];
    let task = store.create_task(&draft, ACTOR).unwrap();

    Storage::new(planner.dir.path())
        .update_state(|state| {
            for label in &mut state.labels {
                if label.id == first.id {
                    label.id = "abcd-0001".to_string();
                } else if label.id == second.id {
                    label.id = "abcd-0002".to_string();
                }
            }
            for task in &mut state.tasks {
                task.labels = vec!["abcd-0001".to_string(), "abcd-0002".to_string()];
            }
            Ok(())
        })
        .unwrap();

    let err = store.unlabel_task(&task.id, "", ACTOR).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    let err = store.unlabel_task(&task.id, "a", ACTOR).unwrap_err();
    assert!(matches!(err, Error::NotFound { kind: "label", .. }));
    let err = store.unlabel_task(&task.id, "abcd", ACTOR).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(message) if message.contains("ambiguous")));
    assert_eq!(store.get_task(&task.id, ACTOR).unwrap().task.labels.len(), 2);

    let updated = store.unlabel_task(&task.id, "abcd-0002", ACTOR).unwrap();
    assert_eq!(updated.labels, vec!["abcd-0001".to_string()]);
}

#[test]
fn completing_logs_completed_and_reopening_logs_a_diff() {
    let planner = TestPlanner::new();
    let store = &planner.store;
    let task = store.create_task(&TaskDraft::named("Water plants"), ACTOR).unwrap();

    let done = store.set_completed(&task.id, true, ACTOR).unwrap();
    assert!(done.completed);
    assert!(done.completed_at.is_some());
    assert_eq!(
        planner.actions_for(&task.id),
        vec![ActivityAction::Created, ActivityAction::Completed]
    );

    let reopened = store.toggle_task(&task.id, ACTOR).unwrap();
    assert!(!reopened.completed);
    assert!(reopened.completed_at.is_none());

    let last = planner.task_entries(&task.id).pop().unwrap();
    assert_eq!(last.action, ActivityAction::Updated);
    assert_eq!(last.field.as_deref(), Some("completed"));
    assert_eq!(last.old_value.as_deref(), Some("true"));
    assert_eq!(last.new_value.as_deref(), Some("false"));
}

#[test]
fn moving_logs_a_single_moved_entry() {
    let planner = TestPlanner::new();
    let store = &planner.store;
    let inbox = store.default_list(ACTOR).unwrap();
    let work = store.create_list("Work", Some("#10B981"), Some("💼"), ACTOR).unwrap();
    let task = store.create_task(&TaskDraft::named("Email Sam"), ACTOR).unwrap();

    let moved = store.move_task(&task.id, &work.id, ACTOR).unwrap();
    assert_eq!(moved.list_id, work.id);

    let entries = planner.task_entries(&task.id);
    assert_eq!(entries.len(), 2);
    let entry = &entries[1];
    assert_eq!(entry.action, ActivityAction::Moved);
    assert_eq!(entry.field.as_deref(), Some("listId"));
    assert_eq!(entry.old_value.as_deref(), Some(inbox.id.as_str()));
    assert_eq!(entry.new_value.as_deref(), Some(work.id.as_str()));
}

#[test]
fn unchanged_patch_logs_nothing() {
    let planner = TestPlanner::new();
    let store = &planner.store;
    let task = store.create_task(&TaskDraft::named("Read book"), ACTOR).unwrap();

    let patch = TaskPatch {
        name: Some(" Read book ".to_string()),
        priority: Some(Priority::None),
        ..TaskPatch::default()
    };
    store.update_task(&task.id, &patch, ACTOR).unwrap();

    assert_eq!(planner.actions_for(&task.id), vec![ActivityAction::Created]);
}

#[test]
fn one_changed_field_logs_one_entry() {
    let planner = TestPlanner::new();
    let store = &planner.store;
    let task = store.create_task(&TaskDraft::named("Read book"), ACTOR).unwrap();

    let patch = TaskPatch {
        name: Some("Read book".to_string()),
        priority: Some(Priority::High),
        ..TaskPatch::default()
    };
    let updated = store.update_task(&task.id, &patch, ACTOR).unwrap();
    assert_eq!(updated.priority, Priority::High);

    let entries = planner.task_entries(&task.id);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].field.as_deref(), Some("priority"));
    assert_eq!(entries[1].old_value.as_deref(), Some("none"));
    assert_eq!(entries[1].new_value.as_deref(), Some("high"));
    assert_eq!(entries[1].user_id.as_deref(), Some(ACTOR));
}

#[test]
fn subtask_changes_log_on_the_parent_task() {
    let planner = TestPlanner::new();
    let store = &planner.store;
    let task = store.create_task(&TaskDraft::named("Move house"), ACTOR).unwrap();

    let subtask = store.add_subtask(&task.id, "Pack books", ACTOR).unwrap();
    store.toggle_subtask(&subtask.id, ACTOR).unwrap();

    let entries = planner.task_entries(&task.id);
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1].field.as_deref(), Some("subtasks"));
    assert_eq!(entries[1].old_value.as_deref(), Some("[]"));
    assert_eq!(entries[1].new_value.as_deref(), Some(r#"["[ ] Pack books"]"#));
    assert_eq!(entries[2].new_value.as_deref(), Some(r#"["[x] Pack books"]"#));

    let details = store.get_task(&task.id, ACTOR).unwrap();
    assert!(details.subtasks[0].completed);
}

#[test]
fn blank_subtask_name_is_rejected() {
    let planner = TestPlanner::new();
    let task = planner
        .store
        .create_task(&TaskDraft::named("Errands"), ACTOR)
        .unwrap();
    assert!(matches!(
        planner.store.add_subtask(&task.id, "   ", ACTOR),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn tasks_resolve_by_unique_prefix() {
    let planner = TestPlanner::new();
    let store = &planner.store;
    let task = store.create_task(&TaskDraft::named("Prefix me"), ACTOR).unwrap();

    let details = store.get_task(&task.id[..8], ACTOR).unwrap();
    assert_eq!(details.task.id, task.id);
    assert_eq!(store.resolve_task_id(&task.id[..8], ACTOR).unwrap(), task.id);
    assert!(store.get_task(&task.id[..2], ACTOR).is_err());
}

#[test]
fn template_instantiation_seeds_a_task() {
    let planner = TestPlanner::new();
    let store = &planner.store;
    let work = store.create_list("Work", None, None, ACTOR).unwrap();

    let mut template = TaskTemplate::new("Weekly report");
    template.description = Some("Numbers for the week".to_string());
    template.priority = Priority::High;
    template.estimate = Some("00:45".to_string());
    template.list_id = Some(work.id.clone());
    let template = store.create_template(template, ACTOR).unwrap();

    let task = store
        .instantiate_template(&template.id, None, None, ACTOR)
        .unwrap();
    assert_eq!(task.name, "Weekly report");
    assert_eq!(task.list_id, work.id);
    assert_eq!(task.priority, Priority::High);
    assert_eq!(task.estimate.as_deref(), Some("00:45"));
    assert_eq!(task.description.as_deref(), Some("Numbers for the week"));

    let inbox = store.default_list(ACTOR).unwrap();
    let renamed = store
        .instantiate_template(&template.id, Some("Q3 report"), Some(&inbox.id), ACTOR)
        .unwrap();
    assert_eq!(renamed.name, "Q3 report");
    assert_eq!(renamed.list_id, inbox.id);
}

#[test]
fn invalid_template_estimate_is_rejected() {
    let planner = TestPlanner::new();
    let mut template = TaskTemplate::new("Bad estimate");
    template.estimate = Some("soon".to_string());

    assert!(matches!(
        planner.store.create_template(template, ACTOR),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn uninitialized_root_reports_not_initialized() {
    let dir = tempfile::TempDir::new().unwrap();
    let logger = ActivityLogger::new(Arc::new(MemorySink::new()));
    let store = PlannerStore::open(dir.path(), logger).unwrap();

    assert!(matches!(
        store.tasks(ACTOR),
        Err(Error::NotInitialized(_))
    ));
}

#[test]
fn open_applies_root_config() {
    let dir = tempfile::TempDir::new().unwrap();
    fs::write(
        Config::path_for(dir.path()),
        "[lists]\ndefault_name = \"Backlog\"\n",
    )
    .unwrap();
    let logger = ActivityLogger::new(Arc::new(MemorySink::new()));
    let store = PlannerStore::open(dir.path(), logger).unwrap();

    let report = store.init(ACTOR).unwrap();
    assert!(report.created);
    assert_eq!(report.default_list.name, "Backlog");
}
