//! Record shapes shared by every planner component.
//!
//! All records serialize with camelCase field names so they can be handed to
//! JSON consumers as-is.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

const NAME_MAX_LEN: usize = 255;
const LIST_NAME_MAX_LEN: usize = 100;
const LABEL_NAME_MAX_LEN: usize = 50;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
    #[default]
    None,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::High,
        Priority::Medium,
        Priority::Low,
        Priority::None,
    ];

    /// Sort rank: high sorts first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
            Priority::None => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::None => "none",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        Priority::ALL
            .into_iter()
            .find(|priority| priority.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "unknown priority '{trimmed}' (expected high|medium|low|none)"
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecurringType {
    Daily,
    Weekly,
    Weekday,
    Monthly,
    Yearly,
    Custom,
}

impl RecurringType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecurringType::Daily => "daily",
            RecurringType::Weekly => "weekly",
            RecurringType::Weekday => "weekday",
            RecurringType::Monthly => "monthly",
            RecurringType::Yearly => "yearly",
            RecurringType::Custom => "custom",
        }
    }
}

impl FromStr for RecurringType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(RecurringType::Daily),
            "weekly" => Ok(RecurringType::Weekly),
            "weekday" => Ok(RecurringType::Weekday),
            "monthly" => Ok(RecurringType::Monthly),
            "yearly" => Ok(RecurringType::Yearly),
            "custom" => Ok(RecurringType::Custom),
            other => Err(Error::InvalidArgument(format!(
                "unknown recurrence '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Created,
    Updated,
    Completed,
    Deleted,
    Moved,
}

impl ActivityAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityAction::Created => "created",
            ActivityAction::Updated => "updated",
            ActivityAction::Completed => "completed",
            ActivityAction::Deleted => "deleted",
            ActivityAction::Moved => "moved",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A schedulable unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub list_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminders: Vec<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_time: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring: Option<RecurringType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub order: i64,
    /// Label ids, kept sorted and unique.
    #[serde(default)]
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(list_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            list_id: list_id.into(),
            user_id: None,
            name: name.into(),
            description: None,
            date: None,
            deadline: None,
            reminders: Vec::new(),
            estimate: None,
            actual_time: None,
            priority: Priority::None,
            completed: false,
            completed_at: None,
            recurring: None,
            recurring_end_date: None,
            order: 0,
            labels: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the task completed or open, keeping `completed_at` in step.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        if self.completed == completed {
            return;
        }
        self.completed = completed;
        self.completed_at = completed.then_some(now);
        self.updated_at = now;
    }

    pub fn has_label(&self, label_id: &str) -> bool {
        self.labels.iter().any(|id| id == label_id)
    }

    pub fn add_label(&mut self, label_id: &str) -> bool {
        if self.has_label(label_id) {
            return false;
        }
        self.labels.push(label_id.to_string());
        self.labels.sort();
        true
    }

    pub fn remove_label(&mut self, label_id: &str) -> bool {
        let before = self.labels.len();
        self.labels.retain(|id| id != label_id);
        before != self.labels.len()
    }

    /// Apply a partial update. Returns true if any field changed.
    pub fn apply(&mut self, patch: &TaskPatch, now: DateTime<Utc>) -> bool {
        let before = self.clone();
        if let Some(list_id) = &patch.list_id {
            self.list_id = list_id.clone();
        }
        if let Some(name) = &patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(deadline) = patch.deadline {
            self.deadline = deadline;
        }
        if let Some(reminders) = &patch.reminders {
            self.reminders = reminders.clone();
        }
        if let Some(estimate) = &patch.estimate {
            self.estimate = estimate.clone();
        }
        if let Some(actual_time) = &patch.actual_time {
            self.actual_time = actual_time.clone();
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(recurring) = patch.recurring {
            self.recurring = recurring;
        }
        if let Some(end) = patch.recurring_end_date {
            self.recurring_end_date = end;
        }
        if let Some(order) = patch.order {
            self.order = order;
        }
        if let Some(labels) = &patch.labels {
            let mut labels = labels.clone();
            labels.sort();
            labels.dedup();
            self.labels = labels;
        }
        if let Some(completed) = patch.completed {
            self.set_completed(completed, now);
        }

        let changed = *self != before;
        if changed {
            self.updated_at = now;
        }
        changed
    }

    pub fn validate(&self) -> Result<()> {
        validate_name("task", &self.name, NAME_MAX_LEN)?;
        if self.list_id.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "task list id cannot be empty".to_string(),
            ));
        }
        if self.completed != self.completed_at.is_some() {
            return Err(Error::InvalidArgument(format!(
                "task {}: completedAt must be set iff the task is completed",
                self.id
            )));
        }
        for (field, value) in [
            ("estimate", self.estimate.as_deref()),
            ("actualTime", self.actual_time.as_deref()),
        ] {
            if let Some(value) = value {
                if !is_time_text(value) {
                    return Err(Error::InvalidArgument(format!(
                        "{field} must look like HH:mm or HH:mm:ss, got '{value}'"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Creation input for a task. Unset fields take task defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub name: String,
    #[serde(default)]
    pub list_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminders: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub estimate: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub recurring: Option<RecurringType>,
    #[serde(default)]
    pub recurring_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl TaskDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Partial update for a task.
///
/// `None` leaves a field alone. For nullable fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub description: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub date: Option<Option<DateTime<Utc>>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub deadline: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminders: Option<Vec<DateTime<Utc>>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub estimate: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub actual_time: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub recurring: Option<Option<RecurringType>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub recurring_end_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }
}

fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskList {
    pub id: String,
    pub name: String,
    pub color: String,
    pub emoji: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskList {
    pub fn new(name: impl Into<String>, color: impl Into<String>, emoji: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            color: color.into(),
            emoji: emoji.into(),
            is_default: false,
            user_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_name("list", &self.name, LIST_NAME_MAX_LEN)?;
        validate_color(&self.color)?;
        if self.emoji.trim().is_empty() {
            return Err(Error::InvalidArgument("list emoji cannot be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

impl ListPatch {
    pub fn apply(&self, list: &mut TaskList, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            list.name = name.trim().to_string();
        }
        if let Some(color) = &self.color {
            list.color = color.clone();
        }
        if let Some(emoji) = &self.emoji {
            list.emoji = emoji.clone();
        }
        list.updated_at = now;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,
    pub name: String,
    pub color: String,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Label {
    pub fn new(name: impl Into<String>, color: impl Into<String>, icon: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            color: color.into(),
            icon: icon.into(),
            user_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_name("label", &self.name, LABEL_NAME_MAX_LEN)?;
        validate_color(&self.color)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl LabelPatch {
    pub fn apply(&self, label: &mut Label, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            label.name = name.trim().to_string();
        }
        if let Some(color) = &self.color {
            label.color = color.clone();
        }
        if let Some(icon) = &self.icon {
            label.icon = icon.clone();
        }
        label.updated_at = now;
    }
}

/// A checklist item owned by one task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub task_id: String,
    pub name: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subtask {
    pub fn new(task_id: impl Into<String>, name: impl Into<String>, order: i64) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            task_id: task_id.into(),
            name: name.into(),
            completed: false,
            order,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub task_id: String,
    pub filename: String,
    pub file_path: String,
    pub file_size: u64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

/// A reusable seed for new tasks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            description: None,
            priority: Priority::None,
            estimate: None,
            list_id: None,
            user_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a task draft from this template. `name` overrides the template name.
    pub fn instantiate(&self, name: Option<&str>) -> TaskDraft {
        let name = name
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(&self.name);
        TaskDraft {
            name: name.to_string(),
            list_id: self.list_id.clone(),
            description: self.description.clone(),
            estimate: self.estimate.clone(),
            priority: self.priority,
            ..TaskDraft::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_name("template", &self.name, NAME_MAX_LEN)?;
        if let Some(estimate) = self.estimate.as_deref() {
            if !is_time_text(estimate) {
                return Err(Error::InvalidArgument(format!(
                    "estimate must look like HH:mm or HH:mm:ss, got '{estimate}'"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub estimate: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub list_id: Option<Option<String>>,
}

impl TemplatePatch {
    pub fn apply(&self, template: &mut TaskTemplate, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            template.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            template.description = description.clone();
        }
        if let Some(priority) = self.priority {
            template.priority = priority;
        }
        if let Some(estimate) = &self.estimate {
            template.estimate = estimate.clone();
        }
        if let Some(list_id) = &self.list_id {
            template.list_id = list_id.clone();
        }
        template.updated_at = now;
    }
}

/// The one entity an activity entry points at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EntityRef {
    #[serde(rename = "taskId")]
    Task(String),
    #[serde(rename = "listId")]
    List(String),
    #[serde(rename = "labelId")]
    Label(String),
}

impl EntityRef {
    pub fn id(&self) -> &str {
        match self {
            EntityRef::Task(id) | EntityRef::List(id) | EntityRef::Label(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EntityRef::Task(_) => "task",
            EntityRef::List(_) => "list",
            EntityRef::Label(_) => "label",
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// Append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub id: String,
    #[serde(flatten)]
    pub entity: EntityRef,
    pub action: ActivityAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Accepts `HH:mm` or `HH:mm:ss` style text (digits separated by colons).
pub fn is_time_text(value: &str) -> bool {
    let parts: Vec<&str> = value.trim().split(':').collect();
    (parts.len() == 2 || parts.len() == 3)
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.chars().all(|ch| ch.is_ascii_digit()))
}

pub fn validate_color(color: &str) -> Result<()> {
    let hex = color.strip_prefix('#').unwrap_or("");
    let valid = (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|ch| ch.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "invalid color '{color}' (expected #RGB or #RRGGBB)"
        )))
    }
}

fn validate_name(kind: &str, name: &str, max_len: usize) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument(format!("{kind} name cannot be empty")));
    }
    if trimmed.chars().count() > max_len {
        return Err(Error::InvalidArgument(format!(
            "{kind} name exceeds {max_len} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_parses_case_insensitive() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!(" none ".parse::<Priority>().unwrap(), Priority::None);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn set_completed_keeps_completed_at_in_step() {
        let mut task = Task::new("list", "Write report");
        let now = Utc::now();
        task.set_completed(true, now);
        assert!(task.completed);
        assert_eq!(task.completed_at, Some(now));
        task.validate().expect("valid");

        task.set_completed(false, now);
        assert!(!task.completed);
        assert!(task.completed_at.is_none());
        task.validate().expect("valid");
    }

    #[test]
    fn apply_reports_no_change_for_identical_values() {
        let mut task = Task::new("list", "Same");
        let updated_at = task.updated_at;
        let patch = TaskPatch {
            name: Some("Same".to_string()),
            priority: Some(Priority::None),
            ..TaskPatch::default()
        };
        assert!(!task.apply(&patch, Utc::now()));
        assert_eq!(task.updated_at, updated_at);
    }

    #[test]
    fn patch_null_clears_nullable_field() {
        let patch: TaskPatch =
            serde_json::from_str(r#"{"description": null, "priority": "high"}"#).unwrap();
        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.priority, Some(Priority::High));
        assert!(patch.date.is_none());

        let mut task = Task::new("list", "Clear me");
        task.description = Some("old".to_string());
        assert!(task.apply(&patch, Utc::now()));
        assert!(task.description.is_none());
        assert_eq!(task.priority, Priority::High);
    }

    #[test]
    fn validate_rejects_blank_name_and_bad_time() {
        let task = Task::new("list", "   ");
        assert!(matches!(task.validate(), Err(Error::InvalidArgument(_))));

        let mut task = Task::new("list", "Timed");
        task.actual_time = Some("1h30".to_string());
        assert!(task.validate().is_err());
        task.actual_time = Some("01:30:00".to_string());
        task.validate().expect("valid");
    }

    #[test]
    fn activity_entry_flattens_entity_ref() {
        let entry = ActivityLogEntry {
            id: "01ABC".to_string(),
            entity: EntityRef::Label("label-1".to_string()),
            action: ActivityAction::Deleted,
            field: None,
            old_value: None,
            new_value: None,
            user_id: Some("me".to_string()),
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["labelId"], "label-1");
        assert!(value.get("taskId").is_none());
        assert_eq!(value["action"], "deleted");

        let back: ActivityLogEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back.entity, EntityRef::Label("label-1".to_string()));
    }

    #[test]
    fn template_instantiates_draft() {
        let mut template = TaskTemplate::new("Weekly review");
        template.priority = Priority::Medium;
        template.estimate = Some("00:45".to_string());
        template.list_id = Some("work".to_string());

        let draft = template.instantiate(None);
        assert_eq!(draft.name, "Weekly review");
        assert_eq!(draft.priority, Priority::Medium);
        assert_eq!(draft.list_id.as_deref(), Some("work"));

        let draft = template.instantiate(Some("Review W12"));
        assert_eq!(draft.name, "Review W12");
    }

    #[test]
    fn colors_are_validated() {
        assert!(validate_color("#fff").is_ok());
        assert!(validate_color("#3B82F6").is_ok());
        assert!(validate_color("3B82F6").is_err());
        assert!(validate_color("#12345").is_err());
    }
}
