//! File-backed planner store.
//!
//! Every mutation is a locked read-modify-write of `planner.json`. Activity
//! is logged after the snapshot is written, through the store's
//! [`ActivityLogger`].

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::activity::{ActivityFilter, ActivityLogger, JsonlActivitySink};
use crate::analytics::{self, AnalyticsSnapshot};
use crate::config::{Config, ListsConfig};
use crate::error::{Error, Result};
use crate::model::{
    new_id, ActivityAction, ActivityLogEntry, Attachment, EntityRef, Label, LabelPatch,
    ListPatch, Subtask, SubtaskPatch, Task, TaskDraft, TaskList, TaskPatch, TaskTemplate,
    TemplatePatch,
};
use crate::storage::{PlannerState, Storage};
use crate::suggest::{self, ScoredTask};
use crate::view::{self, ViewState};

pub const DEFAULT_LIST_COLOR: &str = "#3B82F6";
pub const DEFAULT_LIST_EMOJI: &str = "📋";
pub const DEFAULT_LABEL_COLOR: &str = "#8B5CF6";
pub const DEFAULT_LABEL_ICON: &str = "🏷️";

const MIN_PREFIX_LEN: usize = 4;

/// A task with its children and resolved labels.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetails {
    pub task: Task,
    pub list: Option<TaskList>,
    pub labels: Vec<Label>,
    pub subtasks: Vec<Subtask>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitReport {
    pub created: bool,
    pub default_list: TaskList,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDeletion {
    pub task: Task,
    pub subtasks_removed: usize,
    pub attachments_removed: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDeletion {
    pub list: TaskList,
    pub tasks_removed: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelDeletion {
    pub label: Label,
    pub tasks_updated: usize,
}

#[derive(Debug)]
pub struct PlannerStore {
    storage: Storage,
    config: Config,
    logger: ActivityLogger,
}

impl PlannerStore {
    pub fn new(storage: Storage, config: Config, logger: ActivityLogger) -> Self {
        Self {
            storage,
            config,
            logger,
        }
    }

    /// Store for `root` with its `.dayplan.toml` applied.
    pub fn open(root: &Path, logger: ActivityLogger) -> Result<Self> {
        let config = Config::load_from_root(root)?;
        Ok(Self::new(Storage::new(root), config, logger))
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn logger(&self) -> &ActivityLogger {
        &self.logger
    }

    /// Create the data directory and the actor's default list.
    pub fn init(&self, actor: &str) -> Result<InitReport> {
        let created = self.storage.init()?;
        let (default_list, list_created) = self.storage.update_state(|state| {
            let (idx, list_created) = ensure_default_list(state, actor, &self.config.lists);
            Ok((state.lists[idx].clone(), list_created))
        })?;
        if list_created {
            self.logger.log_lifecycle(
                EntityRef::List(default_list.id.clone()),
                ActivityAction::Created,
                Some(actor),
            );
        }
        tracing::debug!(root = %self.storage.root().display(), created, "planner initialized");
        Ok(InitReport {
            created,
            default_list,
        })
    }

    // =========================================================================
    // Lists
    // =========================================================================

    /// Lists visible to `actor`, default first, then by name.
    pub fn lists(&self, actor: &str) -> Result<Vec<TaskList>> {
        let state = self.storage.load_state()?;
        let mut lists: Vec<TaskList> = state
            .lists
            .into_iter()
            .filter(|list| owned_by(&list.user_id, actor))
            .collect();
        lists.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        Ok(lists)
    }

    /// The actor's default list, created on first use.
    pub fn default_list(&self, actor: &str) -> Result<TaskList> {
        let (list, created) = self.storage.update_state(|state| {
            let (idx, created) = ensure_default_list(state, actor, &self.config.lists);
            Ok((state.lists[idx].clone(), created))
        })?;
        if created {
            self.logger.log_lifecycle(
                EntityRef::List(list.id.clone()),
                ActivityAction::Created,
                Some(actor),
            );
        }
        Ok(list)
    }

    pub fn create_list(
        &self,
        name: &str,
        color: Option<&str>,
        emoji: Option<&str>,
        actor: &str,
    ) -> Result<TaskList> {
        let mut list = TaskList::new(
            name.trim(),
            color.unwrap_or(DEFAULT_LIST_COLOR),
            emoji.unwrap_or(DEFAULT_LIST_EMOJI),
        );
        list.user_id = Some(actor.to_string());
        list.validate()?;

        self.storage.update_state(|state| {
            state.lists.push(list.clone());
            Ok(())
        })?;

        tracing::debug!(list = %list.id, name = %list.name, "list created");
        self.logger.log_lifecycle(
            EntityRef::List(list.id.clone()),
            ActivityAction::Created,
            Some(actor),
        );
        Ok(list)
    }

    pub fn update_list(&self, id: &str, patch: &ListPatch, actor: &str) -> Result<TaskList> {
        let mut patch = patch.clone();
        patch.name = patch.name.map(|name| name.trim().to_string());

        let (before, after) = self.storage.update_state(|state| {
            let idx = resolve_index(&state.lists, "list", id, |list| {
                (list.id.as_str(), owned_by(&list.user_id, actor))
            })?;
            let before = state.lists[idx].clone();
            let mut after = before.clone();
            patch.apply(&mut after, Utc::now());
            after.validate()?;
            state.lists[idx] = after.clone();
            Ok((before, after))
        })?;

        tracing::debug!(list = %after.id, "list updated");
        self.logger
            .log_patch(EntityRef::List(after.id.clone()), &patch, &before, Some(actor));
        Ok(after)
    }

    /// Delete a list and every task in it. The default list is kept.
    pub fn delete_list(&self, id: &str, actor: &str) -> Result<ListDeletion> {
        let deletion = self.storage.update_state(|state| {
            let idx = resolve_index(&state.lists, "list", id, |list| {
                (list.id.as_str(), owned_by(&list.user_id, actor))
            })?;
            if state.lists[idx].is_default {
                return Err(Error::InvalidArgument(format!(
                    "list '{}' is the default list and cannot be deleted",
                    state.lists[idx].name
                )));
            }
            let list = state.lists.remove(idx);
            let tasks_removed: Vec<String> = state
                .tasks
                .iter()
                .filter(|task| task.list_id == list.id)
                .map(|task| task.id.clone())
                .collect();
            for task_id in &tasks_removed {
                remove_task_children(state, task_id);
            }
            state.tasks.retain(|task| task.list_id != list.id);
            state.templates.iter_mut().for_each(|template| {
                if template.list_id.as_deref() == Some(list.id.as_str()) {
                    template.list_id = None;
                }
            });
            Ok(ListDeletion {
                list,
                tasks_removed,
            })
        })?;

        tracing::debug!(
            list = %deletion.list.id,
            tasks = deletion.tasks_removed.len(),
            "list deleted"
        );
        for task_id in &deletion.tasks_removed {
            self.logger.log_lifecycle(
                EntityRef::Task(task_id.clone()),
                ActivityAction::Deleted,
                Some(actor),
            );
        }
        self.logger.log_lifecycle(
            EntityRef::List(deletion.list.id.clone()),
            ActivityAction::Deleted,
            Some(actor),
        );
        Ok(deletion)
    }

    // =========================================================================
    // Labels
    // =========================================================================

    pub fn labels(&self, actor: &str) -> Result<Vec<Label>> {
        let state = self.storage.load_state()?;
        let mut labels: Vec<Label> = state
            .labels
            .into_iter()
            .filter(|label| owned_by(&label.user_id, actor))
            .collect();
        labels.sort_by_key(|label| label.name.to_lowercase());
        Ok(labels)
    }

    pub fn create_label(
        &self,
        name: &str,
        color: Option<&str>,
        icon: Option<&str>,
        actor: &str,
    ) -> Result<Label> {
        let mut label = Label::new(
            name.trim(),
            color.unwrap_or(DEFAULT_LABEL_COLOR),
            icon.unwrap_or(DEFAULT_LABEL_ICON),
        );
        label.user_id = Some(actor.to_string());
        label.validate()?;

        self.storage.update_state(|state| {
            state.labels.push(label.clone());
            Ok(())
        })?;

        tracing::debug!(label = %label.id, name = %label.name, "label created");
        self.logger.log_lifecycle(
            EntityRef::Label(label.id.clone()),
            ActivityAction::Created,
            Some(actor),
        );
        Ok(label)
    }

    pub fn update_label(&self, id: &str, patch: &LabelPatch, actor: &str) -> Result<Label> {
        let mut patch = patch.clone();
        patch.name = patch.name.map(|name| name.trim().to_string());

        let (before, after) = self.storage.update_state(|state| {
            let idx = resolve_index(&state.labels, "label", id, |label| {
                (label.id.as_str(), owned_by(&label.user_id, actor))
            })?;
            let before = state.labels[idx].clone();
            let mut after = before.clone();
            patch.apply(&mut after, Utc::now());
            after.validate()?;
            state.labels[idx] = after.clone();
            Ok((before, after))
        })?;

        tracing::debug!(label = %after.id, "label updated");
        self.logger
            .log_patch(EntityRef::Label(after.id.clone()), &patch, &before, Some(actor));
        Ok(after)
    }

    /// Delete a label and drop it from every task carrying it.
    pub fn delete_label(&self, id: &str, actor: &str) -> Result<LabelDeletion> {
        let now = Utc::now();
        let deletion = self.storage.update_state(|state| {
            let idx = resolve_index(&state.labels, "label", id, |label| {
                (label.id.as_str(), owned_by(&label.user_id, actor))
            })?;
            let label = state.labels.remove(idx);
            let mut tasks_updated = 0;
            for task in &mut state.tasks {
                if task.remove_label(&label.id) {
                    task.updated_at = now;
                    tasks_updated += 1;
                }
            }
            Ok(LabelDeletion {
                label,
                tasks_updated,
            })
        })?;

        tracing::debug!(label = %deletion.label.id, tasks = deletion.tasks_updated, "label deleted");
        self.logger.log_lifecycle(
            EntityRef::Label(deletion.label.id.clone()),
            ActivityAction::Deleted,
            Some(actor),
        );
        Ok(deletion)
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    /// All tasks visible to `actor`, in storage order.
    pub fn tasks(&self, actor: &str) -> Result<Vec<Task>> {
        let state = self.storage.load_state()?;
        Ok(state
            .tasks
            .into_iter()
            .filter(|task| owned_by(&task.user_id, actor))
            .collect())
    }

    pub fn get_task(&self, id: &str, actor: &str) -> Result<TaskDetails> {
        let state = self.storage.load_state()?;
        let idx = resolve_task(&state, id, actor)?;
        let task = state.tasks[idx].clone();

        let list = state.lists.iter().find(|list| list.id == task.list_id).cloned();
        let labels = state
            .labels
            .iter()
            .filter(|label| task.has_label(&label.id))
            .cloned()
            .collect();
        let mut subtasks: Vec<Subtask> = state
            .subtasks
            .iter()
            .filter(|subtask| subtask.task_id == task.id)
            .cloned()
            .collect();
        subtasks.sort_by_key(|subtask| subtask.order);
        let attachments = state
            .attachments
            .iter()
            .filter(|attachment| attachment.task_id == task.id)
            .cloned()
            .collect();

        Ok(TaskDetails {
            task,
            list,
            labels,
            subtasks,
            attachments,
        })
    }

    /// Create a task. Without a list it lands in the actor's default list.
    pub fn create_task(&self, draft: &TaskDraft, actor: &str) -> Result<Task> {
        let (task, default_created) = self.storage.update_state(|state| {
            let mut default_created = None;
            let list_id = match draft.list_id.as_deref() {
                Some(list_id) => {
                    let idx = resolve_list(state, list_id, actor)?;
                    state.lists[idx].id.clone()
                }
                None => {
                    let (idx, created) = ensure_default_list(state, actor, &self.config.lists);
                    if created {
                        default_created = Some(state.lists[idx].id.clone());
                    }
                    state.lists[idx].id.clone()
                }
            };
            let labels = resolve_labels(state, &draft.labels, actor)?;

            let mut task = Task::new(list_id, draft.name.trim());
            task.user_id = Some(actor.to_string());
            task.description = draft.description.clone();
            task.date = draft.date;
            task.deadline = draft.deadline;
            task.reminders = draft.reminders.clone();
            task.estimate = draft.estimate.clone();
            task.priority = draft.priority;
            task.recurring = draft.recurring;
            task.recurring_end_date = draft.recurring_end_date;
            task.labels = labels;
            task.order = next_task_order(state, &task.list_id);
            task.validate()?;

            state.tasks.push(task.clone());
            Ok((task, default_created))
        })?;

        if let Some(list_id) = default_created {
            self.logger
                .log_lifecycle(EntityRef::List(list_id), ActivityAction::Created, Some(actor));
        }
        tracing::debug!(task = %task.id, list = %task.list_id, "task created");
        self.logger.log_lifecycle(
            EntityRef::Task(task.id.clone()),
            ActivityAction::Created,
            Some(actor),
        );
        Ok(task)
    }

    /// Apply a partial update and log one entry per changed field.
    ///
    /// Completing a task logs `completed` and changing its list logs `moved`
    /// instead of plain field updates.
    pub fn update_task(&self, id: &str, patch: &TaskPatch, actor: &str) -> Result<Task> {
        let now = Utc::now();
        let mut patch = patch.clone();
        patch.name = patch.name.map(|name| name.trim().to_string());

        let (before, after) = self.storage.update_state(|state| {
            let idx = resolve_task(state, id, actor)?;
            if let Some(list_id) = patch.list_id.as_deref() {
                let list_idx = resolve_list(state, list_id, actor)?;
                patch.list_id = Some(state.lists[list_idx].id.clone());
            }
            if let Some(labels) = patch.labels.as_ref() {
                patch.labels = Some(resolve_labels(state, labels, actor)?);
            }

            let before = state.tasks[idx].clone();
            let mut after = before.clone();
            if after.apply(&patch, now) {
                after.validate()?;
                state.tasks[idx] = after.clone();
            }
            Ok((before, after))
        })?;

        if before != after {
            tracing::debug!(task = %after.id, "task updated");
        }
        self.log_task_patch(&before, &after, &patch, actor);
        Ok(after)
    }

    pub fn set_completed(&self, id: &str, completed: bool, actor: &str) -> Result<Task> {
        let patch = TaskPatch {
            completed: Some(completed),
            ..TaskPatch::default()
        };
        self.update_task(id, &patch, actor)
    }

    pub fn toggle_task(&self, id: &str, actor: &str) -> Result<Task> {
        let current = self.get_task(id, actor)?.task;
        self.set_completed(&current.id, !current.completed, actor)
    }

    pub fn move_task(&self, id: &str, list_id: &str, actor: &str) -> Result<Task> {
        let patch = TaskPatch {
            list_id: Some(list_id.to_string()),
            ..TaskPatch::default()
        };
        self.update_task(id, &patch, actor)
    }

    pub fn label_task(&self, id: &str, label_id: &str, actor: &str) -> Result<Task> {
        let task = self.get_task(id, actor)?.task;
        let mut labels = task.labels.clone();
        labels.push(label_id.to_string());
        let patch = TaskPatch {
            labels: Some(labels),
            ..TaskPatch::default()
        };
        self.update_task(&task.id, &patch, actor)
    }

    pub fn unlabel_task(&self, id: &str, label_id: &str, actor: &str) -> Result<Task> {
        let details = self.get_task(id, actor)?;
        let idx = resolve_index(&details.labels, "label", label_id, |label| {
            (label.id.as_str(), true)
        })?;
        let label = &details.labels[idx];
        let labels: Vec<String> = details
            .task
            .labels
            .iter()
            .filter(|id| **id != label.id)
            .cloned()
            .collect();
        let patch = TaskPatch {
            labels: Some(labels),
            ..TaskPatch::default()
        };
        self.update_task(&details.task.id, &patch, actor)
    }

    /// Delete a task with its subtasks and attachments.
    pub fn delete_task(&self, id: &str, actor: &str) -> Result<TaskDeletion> {
        let deletion = self.storage.update_state(|state| {
            let idx = resolve_task(state, id, actor)?;
            let task = state.tasks.remove(idx);
            let (subtasks_removed, attachments_removed) = remove_task_children(state, &task.id);
            Ok(TaskDeletion {
                task,
                subtasks_removed,
                attachments_removed,
            })
        })?;

        tracing::debug!(
            task = %deletion.task.id,
            subtasks = deletion.subtasks_removed,
            attachments = deletion.attachments_removed,
            "task deleted"
        );
        self.logger.log_lifecycle(
            EntityRef::Task(deletion.task.id.clone()),
            ActivityAction::Deleted,
            Some(actor),
        );
        Ok(deletion)
    }

    fn log_task_patch(&self, before: &Task, after: &Task, patch: &TaskPatch, actor: &str) {
        let mut updates: Map<String, Value> = match serde_json::to_value(patch) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(err) => {
                tracing::warn!(task = %before.id, error = %err, "activity diff skipped");
                return;
            }
        };

        if before.list_id != after.list_id {
            updates.remove("listId");
            self.logger
                .log_move(&after.id, &before.list_id, &after.list_id, Some(actor));
        }
        if !before.completed && after.completed {
            updates.remove("completed");
            self.logger.log_completion(&after.id, Some(actor));
        }

        self.logger
            .log_update(EntityRef::Task(after.id.clone()), &updates, before, Some(actor));
    }

    // =========================================================================
    // Subtasks
    // =========================================================================

    pub fn add_subtask(&self, task_id: &str, name: &str, actor: &str) -> Result<Subtask> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "subtask name cannot be empty".to_string(),
            ));
        }

        let (subtask, before, after) = self.storage.update_state(|state| {
            let idx = resolve_task(state, task_id, actor)?;
            let task_id = state.tasks[idx].id.clone();
            let before = subtask_summary(state, &task_id);
            let order = state
                .subtasks
                .iter()
                .filter(|subtask| subtask.task_id == task_id)
                .map(|subtask| subtask.order + 1)
                .max()
                .unwrap_or(0);
            let subtask = Subtask::new(task_id.clone(), name, order);
            state.subtasks.push(subtask.clone());
            touch_task(state, idx);
            let after = subtask_summary(state, &task_id);
            Ok((subtask, before, after))
        })?;

        tracing::debug!(task = %subtask.task_id, subtask = %subtask.id, "subtask added");
        self.log_children(&subtask.task_id, "subtasks", before, after, actor);
        Ok(subtask)
    }

    pub fn update_subtask(&self, id: &str, patch: &SubtaskPatch, actor: &str) -> Result<Subtask> {
        if let Some(name) = patch.name.as_deref() {
            if name.trim().is_empty() {
                return Err(Error::InvalidArgument(
                    "subtask name cannot be empty".to_string(),
                ));
            }
        }

        let (subtask, before, after) = self.storage.update_state(|state| {
            let idx = resolve_subtask(state, id, actor)?;
            let task_id = state.subtasks[idx].task_id.clone();
            let before = subtask_summary(state, &task_id);

            let subtask = &mut state.subtasks[idx];
            if let Some(name) = patch.name.as_deref() {
                subtask.name = name.trim().to_string();
            }
            if let Some(completed) = patch.completed {
                subtask.completed = completed;
            }
            if let Some(order) = patch.order {
                subtask.order = order;
            }
            subtask.updated_at = Utc::now();
            let subtask = subtask.clone();

            if let Some(task_idx) = state.tasks.iter().position(|task| task.id == task_id) {
                touch_task(state, task_idx);
            }
            let after = subtask_summary(state, &task_id);
            Ok((subtask, before, after))
        })?;

        self.log_children(&subtask.task_id, "subtasks", before, after, actor);
        Ok(subtask)
    }

    pub fn toggle_subtask(&self, id: &str, actor: &str) -> Result<Subtask> {
        let state = self.storage.load_state()?;
        let idx = resolve_subtask(&state, id, actor)?;
        let subtask = &state.subtasks[idx];
        let patch = SubtaskPatch {
            completed: Some(!subtask.completed),
            ..SubtaskPatch::default()
        };
        self.update_subtask(&subtask.id, &patch, actor)
    }

    pub fn delete_subtask(&self, id: &str, actor: &str) -> Result<Subtask> {
        let (subtask, before, after) = self.storage.update_state(|state| {
            let idx = resolve_subtask(state, id, actor)?;
            let task_id = state.subtasks[idx].task_id.clone();
            let before = subtask_summary(state, &task_id);
            let subtask = state.subtasks.remove(idx);
            if let Some(task_idx) = state.tasks.iter().position(|task| task.id == task_id) {
                touch_task(state, task_idx);
            }
            let after = subtask_summary(state, &task_id);
            Ok((subtask, before, after))
        })?;

        tracing::debug!(task = %subtask.task_id, subtask = %subtask.id, "subtask deleted");
        self.log_children(&subtask.task_id, "subtasks", before, after, actor);
        Ok(subtask)
    }

    // =========================================================================
    // Attachments
    // =========================================================================

    /// Record a file on disk as an attachment of a task.
    pub fn add_attachment(&self, task_id: &str, file: &Path, actor: &str) -> Result<Attachment> {
        let metadata = std::fs::metadata(file)?;
        if !metadata.is_file() {
            return Err(Error::InvalidArgument(format!(
                "not a regular file: {}",
                file.display()
            )));
        }
        let filename = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::InvalidArgument(format!("attachment has no file name: {}", file.display()))
            })?;
        let file_path = std::fs::canonicalize(file)?;

        let (attachment, before, after) = self.storage.update_state(|state| {
            let idx = resolve_task(state, task_id, actor)?;
            let task_id = state.tasks[idx].id.clone();
            let before = attachment_summary(state, &task_id);
            let attachment = Attachment {
                id: new_id(),
                task_id: task_id.clone(),
                filename: filename.clone(),
                file_path: file_path.display().to_string(),
                file_size: metadata.len(),
                mime_type: mime_type_for(&filename).to_string(),
                created_at: Utc::now(),
            };
            state.attachments.push(attachment.clone());
            touch_task(state, idx);
            let after = attachment_summary(state, &task_id);
            Ok((attachment, before, after))
        })?;

        tracing::debug!(task = %attachment.task_id, attachment = %attachment.id, "attachment added");
        self.log_children(&attachment.task_id, "attachments", before, after, actor);
        Ok(attachment)
    }

    pub fn delete_attachment(&self, id: &str, actor: &str) -> Result<Attachment> {
        let (attachment, before, after) = self.storage.update_state(|state| {
            let idx = resolve_index(&state.attachments, "attachment", id, |attachment| {
                let visible = state
                    .tasks
                    .iter()
                    .any(|task| task.id == attachment.task_id && owned_by(&task.user_id, actor));
                (attachment.id.as_str(), visible)
            })?;
            let task_id = state.attachments[idx].task_id.clone();
            let before = attachment_summary(state, &task_id);
            let attachment = state.attachments.remove(idx);
            if let Some(task_idx) = state.tasks.iter().position(|task| task.id == task_id) {
                touch_task(state, task_idx);
            }
            let after = attachment_summary(state, &task_id);
            Ok((attachment, before, after))
        })?;

        self.log_children(&attachment.task_id, "attachments", before, after, actor);
        Ok(attachment)
    }

    fn log_children(&self, task_id: &str, field: &str, before: Value, after: Value, actor: &str) {
        let mut old = Map::new();
        old.insert(field.to_string(), before);
        let mut updates = Map::new();
        updates.insert(field.to_string(), after);
        self.logger.log_update(
            EntityRef::Task(task_id.to_string()),
            &updates,
            &Value::Object(old),
            Some(actor),
        );
    }

    // =========================================================================
    // Templates
    // =========================================================================

    pub fn templates(&self, actor: &str) -> Result<Vec<TaskTemplate>> {
        let state = self.storage.load_state()?;
        let mut templates: Vec<TaskTemplate> = state
            .templates
            .into_iter()
            .filter(|template| owned_by(&template.user_id, actor))
            .collect();
        templates.sort_by_key(|template| template.name.to_lowercase());
        Ok(templates)
    }

    pub fn create_template(&self, template: TaskTemplate, actor: &str) -> Result<TaskTemplate> {
        let mut template = template;
        template.name = template.name.trim().to_string();
        template.user_id = Some(actor.to_string());
        template.validate()?;

        let template = self.storage.update_state(|state| {
            if let Some(list_id) = template.list_id.as_deref() {
                let idx = resolve_list(state, list_id, actor)?;
                template.list_id = Some(state.lists[idx].id.clone());
            }
            state.templates.push(template.clone());
            Ok(template)
        })?;

        tracing::debug!(template = %template.id, name = %template.name, "template created");
        Ok(template)
    }

    pub fn update_template(
        &self,
        id: &str,
        patch: &TemplatePatch,
        actor: &str,
    ) -> Result<TaskTemplate> {
        self.storage.update_state(|state| {
            let idx = resolve_index(&state.templates, "template", id, |template| {
                (template.id.as_str(), owned_by(&template.user_id, actor))
            })?;
            let mut patch = patch.clone();
            if let Some(Some(list_id)) = patch.list_id.as_ref() {
                let list_idx = resolve_list(state, list_id, actor)?;
                patch.list_id = Some(Some(state.lists[list_idx].id.clone()));
            }
            let mut template = state.templates[idx].clone();
            patch.apply(&mut template, Utc::now());
            template.validate()?;
            state.templates[idx] = template.clone();
            Ok(template)
        })
    }

    pub fn delete_template(&self, id: &str, actor: &str) -> Result<TaskTemplate> {
        self.storage.update_state(|state| {
            let idx = resolve_index(&state.templates, "template", id, |template| {
                (template.id.as_str(), owned_by(&template.user_id, actor))
            })?;
            Ok(state.templates.remove(idx))
        })
    }

    /// Create a task seeded from a template.
    pub fn instantiate_template(
        &self,
        id: &str,
        name: Option<&str>,
        list_id: Option<&str>,
        actor: &str,
    ) -> Result<Task> {
        let state = self.storage.load_state()?;
        let idx = resolve_index(&state.templates, "template", id, |template| {
            (template.id.as_str(), owned_by(&template.user_id, actor))
        })?;
        let mut draft = state.templates[idx].instantiate(name);
        if let Some(list_id) = list_id {
            draft.list_id = Some(list_id.to_string());
        }
        self.create_task(&draft, actor)
    }

    // =========================================================================
    // Views and reports
    // =========================================================================

    /// Ordered tasks visible under `state` on `today`.
    pub fn view(&self, actor: &str, state: &ViewState, today: NaiveDate) -> Result<Vec<Task>> {
        let tasks = self.tasks(actor)?;
        let search = self.config.search.build();
        Ok(view::select_visible_tasks(&tasks, state, today, &search))
    }

    pub fn suggest(&self, actor: &str, count: usize, today: NaiveDate) -> Result<Vec<ScoredTask>> {
        let tasks = self.tasks(actor)?;
        Ok(suggest::suggest_top_scored(&tasks, count, today))
    }

    pub fn analytics(&self, actor: &str) -> Result<AnalyticsSnapshot> {
        self.analytics_at(actor, Utc::now())
    }

    pub fn analytics_at(&self, actor: &str, now: DateTime<Utc>) -> Result<AnalyticsSnapshot> {
        let state = self.storage.load_state()?;
        Ok(analytics::compute_snapshot(
            actor,
            &state.tasks,
            &state.lists,
            &state.labels,
            now,
            self.config.analytics.window_days,
        ))
    }

    /// Logged activity, newest first.
    pub fn activity(
        &self,
        filter: &ActivityFilter,
        limit: Option<usize>,
    ) -> Result<Vec<ActivityLogEntry>> {
        JsonlActivitySink::new(self.storage.clone()).read_filtered(filter, limit)
    }

    /// Full task id for a possibly abbreviated one.
    pub fn resolve_task_id(&self, id: &str, actor: &str) -> Result<String> {
        let state = self.storage.load_state()?;
        let idx = resolve_task(&state, id, actor)?;
        Ok(state.tasks[idx].id.clone())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Unowned records are shared by every actor.
fn owned_by(owner: &Option<String>, actor: &str) -> bool {
    owner.as_deref().map_or(true, |owner| owner == actor)
}

/// Find an item by exact id or unique id prefix among the visible ones.
fn resolve_index<T, F>(items: &[T], kind: &'static str, id: &str, key: F) -> Result<usize>
where
    F: Fn(&T) -> (&str, bool),
{
    let id = id.trim();
    if id.is_empty() {
        return Err(Error::InvalidArgument(format!("{kind} id cannot be empty")));
    }

    let visible: Vec<(usize, &str)> = items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            let (item_id, shown) = key(item);
            shown.then_some((idx, item_id))
        })
        .collect();

    if let Some((idx, _)) = visible.iter().find(|(_, item_id)| *item_id == id) {
        return Ok(*idx);
    }
    if id.len() < MIN_PREFIX_LEN {
        return Err(Error::not_found(kind, id));
    }

    let matches: Vec<usize> = visible
        .iter()
        .filter(|(_, item_id)| item_id.starts_with(id))
        .map(|(idx, _)| *idx)
        .collect();
    match matches.as_slice() {
        [idx] => Ok(*idx),
        [] => Err(Error::not_found(kind, id)),
        _ => Err(Error::InvalidArgument(format!(
            "{kind} id '{id}' is ambiguous ({} matches)",
            matches.len()
        ))),
    }
}

fn resolve_task(state: &PlannerState, id: &str, actor: &str) -> Result<usize> {
    resolve_index(&state.tasks, "task", id, |task| {
        (task.id.as_str(), owned_by(&task.user_id, actor))
    })
}

fn resolve_list(state: &PlannerState, id: &str, actor: &str) -> Result<usize> {
    resolve_index(&state.lists, "list", id, |list| {
        (list.id.as_str(), owned_by(&list.user_id, actor))
    })
}

fn resolve_subtask(state: &PlannerState, id: &str, actor: &str) -> Result<usize> {
    resolve_index(&state.subtasks, "subtask", id, |subtask| {
        let visible = state
            .tasks
            .iter()
            .any(|task| task.id == subtask.task_id && owned_by(&task.user_id, actor));
        (subtask.id.as_str(), visible)
    })
}

/// Full, sorted, unique label ids; every one must exist.
fn resolve_labels(state: &PlannerState, ids: &[String], actor: &str) -> Result<Vec<String>> {
    let mut labels = Vec::with_capacity(ids.len());
    for id in ids {
        let idx = resolve_index(&state.labels, "label", id, |label| {
            (label.id.as_str(), owned_by(&label.user_id, actor))
        })?;
        labels.push(state.labels[idx].id.clone());
    }
    labels.sort();
    labels.dedup();
    Ok(labels)
}

/// Index of the actor's default list, creating it when missing.
fn ensure_default_list(state: &mut PlannerState, actor: &str, lists: &ListsConfig) -> (usize, bool) {
    if let Some(idx) = state
        .lists
        .iter()
        .position(|list| list.is_default && owned_by(&list.user_id, actor))
    {
        return (idx, false);
    }

    let mut list = TaskList::new(
        lists.default_name.clone(),
        lists.default_color.clone(),
        lists.default_emoji.clone(),
    );
    list.is_default = true;
    list.user_id = Some(actor.to_string());
    state.lists.push(list);
    (state.lists.len() - 1, true)
}

fn next_task_order(state: &PlannerState, list_id: &str) -> i64 {
    state
        .tasks
        .iter()
        .filter(|task| task.list_id == list_id)
        .map(|task| task.order + 1)
        .max()
        .unwrap_or(0)
}

fn remove_task_children(state: &mut PlannerState, task_id: &str) -> (usize, usize) {
    let subtasks_before = state.subtasks.len();
    state.subtasks.retain(|subtask| subtask.task_id != task_id);
    let attachments_before = state.attachments.len();
    state.attachments.retain(|attachment| attachment.task_id != task_id);
    (
        subtasks_before - state.subtasks.len(),
        attachments_before - state.attachments.len(),
    )
}

fn touch_task(state: &mut PlannerState, idx: usize) {
    state.tasks[idx].updated_at = Utc::now();
}

fn subtask_summary(state: &PlannerState, task_id: &str) -> Value {
    let mut subtasks: Vec<&Subtask> = state
        .subtasks
        .iter()
        .filter(|subtask| subtask.task_id == task_id)
        .collect();
    subtasks.sort_by_key(|subtask| subtask.order);
    Value::Array(
        subtasks
            .into_iter()
            .map(|subtask| {
                let mark = if subtask.completed { "x" } else { " " };
                Value::String(format!("[{mark}] {}", subtask.name))
            })
            .collect(),
    )
}

fn attachment_summary(state: &PlannerState, task_id: &str) -> Value {
    Value::Array(
        state
            .attachments
            .iter()
            .filter(|attachment| attachment.task_id == task_id)
            .map(|attachment| Value::String(attachment.filename.clone()))
            .collect(),
    )
}

fn mime_type_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item {
        id: &'static str,
        visible: bool,
    }

    fn items() -> Vec<Item> {
        vec![
            Item { id: "abcd1111", visible: true },
            Item { id: "abcd2222", visible: true },
            Item { id: "ffff0000", visible: false },
        ]
    }

    fn key(item: &Item) -> (&str, bool) {
        (item.id, item.visible)
    }

    #[test]
    fn resolves_exact_and_unique_prefix() {
        let items = items();
        assert_eq!(resolve_index(&items, "task", "abcd2222", key).unwrap(), 1);
        assert_eq!(resolve_index(&items, "task", "abcd1", key).unwrap(), 0);
    }

    #[test]
    fn ambiguous_short_and_hidden_ids_fail() {
        let items = items();
        assert!(matches!(
            resolve_index(&items, "task", "abcd", key),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            resolve_index(&items, "task", "abc", key),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            resolve_index(&items, "task", "ffff0000", key),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn unowned_records_are_shared() {
        assert!(owned_by(&None, "me"));
        assert!(owned_by(&Some("me".to_string()), "me"));
        assert!(!owned_by(&Some("you".to_string()), "me"));
    }

    #[test]
    fn mime_types_follow_extension() {
        assert_eq!(mime_type_for("notes.MD"), "text/markdown");
        assert_eq!(mime_type_for("photo.jpeg"), "image/jpeg");
        assert_eq!(mime_type_for("README"), "application/octet-stream");
    }
}
