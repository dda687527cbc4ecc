//! dayplan task, subtask and attach command implementations.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::session::{parse_optional_when, parse_when, GlobalOptions, Session};
use crate::error::Result;
use crate::events::ChangeKind;
use crate::model::{Priority, RecurringType, SubtaskPatch, Task, TaskDraft, TaskPatch};
use crate::output::{format_task_line, short_id, HumanOutput};
use crate::store::TaskDetails;
use crate::view::{local_today, ViewKind, ViewState};

pub struct AddOptions {
    pub name: String,
    pub list: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub deadline: Option<String>,
    pub priority: Option<Priority>,
    pub estimate: Option<String>,
    pub recurring: Option<RecurringType>,
    pub recurring_end: Option<String>,
    pub labels: Vec<String>,
    pub reminders: Vec<String>,
}

pub struct ListOptions {
    pub view: Option<ViewKind>,
    pub list: Option<String>,
    pub search: Option<String>,
    pub hide_completed: bool,
    pub show_completed: bool,
}

/// A nullable field edit: leave alone, set, or clear.
pub enum Clearable<T> {
    Keep,
    Set(T),
    Clear,
}

impl<T> Clearable<T> {
    pub fn from_flags(value: Option<T>, clear: bool) -> Self {
        match (value, clear) {
            (Some(value), _) => Clearable::Set(value),
            (None, true) => Clearable::Clear,
            (None, false) => Clearable::Keep,
        }
    }

    fn try_into_patch<U>(self, f: impl FnOnce(T) -> Result<U>) -> Result<Option<Option<U>>> {
        Ok(match self {
            Clearable::Keep => None,
            Clearable::Set(value) => Some(Some(f(value)?)),
            Clearable::Clear => Some(None),
        })
    }
}

pub struct EditOptions {
    pub id: String,
    pub name: Option<String>,
    pub description: Clearable<String>,
    pub date: Clearable<String>,
    pub deadline: Clearable<String>,
    pub priority: Option<Priority>,
    pub estimate: Clearable<String>,
    pub actual_time: Clearable<String>,
    pub recurring: Clearable<RecurringType>,
    pub order: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskListOutput {
    view: ViewState,
    title: String,
    total: usize,
    tasks: Vec<Task>,
}

pub fn run_add(global: GlobalOptions, options: AddOptions) -> Result<()> {
    let mut session = Session::open(&global)?;

    let reminders = options
        .reminders
        .iter()
        .map(|raw| parse_when("reminder", raw))
        .collect::<Result<Vec<_>>>()?;
    let draft = TaskDraft {
        name: options.name,
        list_id: options.list,
        description: options.description,
        date: parse_optional_when("date", options.date.as_deref())?,
        deadline: parse_optional_when("deadline", options.deadline.as_deref())?,
        reminders,
        estimate: options.estimate,
        priority: options.priority.unwrap_or_default(),
        recurring: options.recurring,
        recurring_end_date: parse_optional_when(
            "recurring end",
            options.recurring_end.as_deref(),
        )?,
        labels: options.labels,
    };

    let actor = session.actor.clone();
    let task = session.store.create_task(&draft, &actor)?;
    let event_warning = session.emit(ChangeKind::TaskCreated, Some(&task.list_id), &task);

    let mut human = HumanOutput::new("Task created");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    push_task_summary(&mut human, &task);
    human.push_next_step(format!("dayplan task show {}", short_id(&task.id)));

    session.finish("task add", &task, human)
}

pub fn run_list(global: GlobalOptions, options: ListOptions) -> Result<()> {
    let session = Session::open(&global)?;
    let defaults = &session.store.config().view;

    let show_completed = if options.hide_completed {
        false
    } else if options.show_completed {
        true
    } else {
        defaults.show_completed
    };
    let list_id = match options.list.as_deref() {
        Some(list) => Some(resolve_list_id(&session, list)?),
        None => None,
    };
    let state = ViewState {
        selected_view: options.view.unwrap_or(defaults.default),
        selected_list_id: list_id,
        search_query: options.search.unwrap_or_default(),
        show_completed,
    };

    let tasks = session.store.view(&session.actor, &state, local_today())?;
    let lists = session.store.lists(&session.actor)?;
    let title = state.title(&lists);

    let mut human = HumanOutput::new(title.clone());
    human.push_summary("Total", tasks.len().to_string());
    if !state.search_query.trim().is_empty() {
        human.push_summary("Search", state.search_query.clone());
    }
    for task in &tasks {
        human.push_detail(format_task_line(task));
    }
    if tasks.is_empty() {
        human.push_next_step("dayplan task add \"<name>\" --date today");
    }

    let output = TaskListOutput {
        view: state,
        title,
        total: tasks.len(),
        tasks,
    };
    session.finish("task ls", &output, human)
}

pub fn run_show(global: GlobalOptions, id: String) -> Result<()> {
    let session = Session::open(&global)?;
    let details = session.store.get_task(&id, &session.actor)?;

    let mut human = HumanOutput::new(details.task.name.clone());
    push_details(&mut human, &details);
    session.finish("task show", &details, human)
}

pub fn run_edit(global: GlobalOptions, options: EditOptions) -> Result<()> {
    let mut session = Session::open(&global)?;

    let patch = TaskPatch {
        name: options.name,
        description: options.description.try_into_patch(Ok)?,
        date: options
            .date
            .try_into_patch(|raw| parse_when("date", &raw))?,
        deadline: options
            .deadline
            .try_into_patch(|raw| parse_when("deadline", &raw))?,
        priority: options.priority,
        estimate: options.estimate.try_into_patch(Ok)?,
        actual_time: options.actual_time.try_into_patch(Ok)?,
        recurring: options.recurring.try_into_patch(Ok)?,
        order: options.order,
        ..TaskPatch::default()
    };
    if patch.is_empty() {
        return Err(crate::error::Error::InvalidArgument(
            "nothing to edit (pass at least one field flag)".to_string(),
        ));
    }

    let actor = session.actor.clone();
    let task = session.store.update_task(&options.id, &patch, &actor)?;
    let event_warning = session.emit(ChangeKind::TaskUpdated, Some(&task.list_id), &task);

    let mut human = HumanOutput::new("Task updated");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    push_task_summary(&mut human, &task);
    session.finish("task edit", &task, human)
}

/// `Some(state)` sets completion, `None` toggles it.
pub fn run_set_completed(global: GlobalOptions, id: String, completed: Option<bool>) -> Result<()> {
    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let task = match completed {
        Some(completed) => session.store.set_completed(&id, completed, &actor)?,
        None => session.store.toggle_task(&id, &actor)?,
    };

    let (kind, header, command) = match (completed, task.completed) {
        (Some(true), _) => (ChangeKind::TaskCompleted, "Task completed", "task done"),
        (Some(false), _) => (ChangeKind::TaskReopened, "Task reopened", "task reopen"),
        (None, true) => (ChangeKind::TaskCompleted, "Task completed", "task toggle"),
        (None, false) => (ChangeKind::TaskReopened, "Task reopened", "task toggle"),
    };
    let event_warning = session.emit(kind, Some(&task.list_id), &task);

    let mut human = HumanOutput::new(header);
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    push_task_summary(&mut human, &task);
    if task.completed {
        human.push_next_step("dayplan suggest");
    }
    session.finish(command, &task, human)
}

pub fn run_move(global: GlobalOptions, id: String, list: String) -> Result<()> {
    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let before = session.store.get_task(&id, &actor)?.task;
    let task = session.store.move_task(&before.id, &list, &actor)?;

    let event_warning = session.emit(
        ChangeKind::TaskMoved,
        Some(&task.list_id),
        serde_json::json!({ "task": &task, "fromListId": &before.list_id }),
    );

    let mut human = HumanOutput::new("Task moved");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("ID", task.id.clone());
    human.push_summary("From", before.list_id.clone());
    human.push_summary("To", task.list_id.clone());
    session.finish("task move", &task, human)
}

pub fn run_delete(global: GlobalOptions, id: String) -> Result<()> {
    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let deletion = session.store.delete_task(&id, &actor)?;
    let event_warning = session.emit(
        ChangeKind::TaskDeleted,
        Some(&deletion.task.list_id),
        &deletion,
    );

    let mut human = HumanOutput::new("Task deleted");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("ID", deletion.task.id.clone());
    human.push_summary("Name", deletion.task.name.clone());
    if deletion.subtasks_removed > 0 {
        human.push_summary("Subtasks removed", deletion.subtasks_removed.to_string());
    }
    if deletion.attachments_removed > 0 {
        human.push_summary("Attachments removed", deletion.attachments_removed.to_string());
    }
    session.finish("task rm", &deletion, human)
}

pub fn run_label(global: GlobalOptions, id: String, label: String, attach: bool) -> Result<()> {
    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let task = if attach {
        session.store.label_task(&id, &label, &actor)?
    } else {
        session.store.unlabel_task(&id, &label, &actor)?
    };
    let event_warning = session.emit(ChangeKind::TaskUpdated, Some(&task.list_id), &task);

    let mut human = HumanOutput::new(if attach { "Label attached" } else { "Label detached" });
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    push_task_summary(&mut human, &task);
    session.finish(
        if attach { "task label" } else { "task unlabel" },
        &task,
        human,
    )
}

// =============================================================================
// Subtasks
// =============================================================================

pub fn run_subtask_add(global: GlobalOptions, task: String, name: String) -> Result<()> {
    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let subtask = session.store.add_subtask(&task, &name, &actor)?;
    finish_subtask(session, "subtask add", "Subtask added", subtask)
}

pub fn run_subtask_toggle(global: GlobalOptions, id: String) -> Result<()> {
    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let subtask = session.store.toggle_subtask(&id, &actor)?;
    let header = if subtask.completed {
        "Subtask done"
    } else {
        "Subtask reopened"
    };
    finish_subtask(session, "subtask done", header, subtask)
}

pub fn run_subtask_edit(
    global: GlobalOptions,
    id: String,
    name: Option<String>,
    order: Option<i64>,
) -> Result<()> {
    if name.is_none() && order.is_none() {
        return Err(crate::error::Error::InvalidArgument(
            "nothing to edit (pass --name or --order)".to_string(),
        ));
    }
    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let patch = SubtaskPatch {
        name,
        order,
        ..SubtaskPatch::default()
    };
    let subtask = session.store.update_subtask(&id, &patch, &actor)?;
    finish_subtask(session, "subtask edit", "Subtask updated", subtask)
}

pub fn run_subtask_delete(global: GlobalOptions, id: String) -> Result<()> {
    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let subtask = session.store.delete_subtask(&id, &actor)?;
    finish_subtask(session, "subtask rm", "Subtask deleted", subtask)
}

fn finish_subtask(
    mut session: Session,
    command: &str,
    header: &str,
    subtask: crate::model::Subtask,
) -> Result<()> {
    let event_warning = session.emit(ChangeKind::SubtaskChanged, None, &subtask);

    let mut human = HumanOutput::new(header);
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("ID", subtask.id.clone());
    human.push_summary("Task", subtask.task_id.clone());
    human.push_summary("Name", subtask.name.clone());
    human.push_summary("Done", subtask.completed.to_string());
    session.finish(command, &subtask, human)
}

// =============================================================================
// Attachments
// =============================================================================

pub fn run_attach_add(global: GlobalOptions, task: String, path: PathBuf) -> Result<()> {
    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let attachment = session.store.add_attachment(&task, &path, &actor)?;
    let event_warning = session.emit(ChangeKind::AttachmentChanged, None, &attachment);

    let mut human = HumanOutput::new("Attachment added");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("ID", attachment.id.clone());
    human.push_summary("File", attachment.filename.clone());
    human.push_summary("Type", attachment.mime_type.clone());
    human.push_summary("Size", format!("{} bytes", attachment.file_size));
    session.finish("attach add", &attachment, human)
}

pub fn run_attach_delete(global: GlobalOptions, id: String) -> Result<()> {
    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let attachment = session.store.delete_attachment(&id, &actor)?;
    let event_warning = session.emit(ChangeKind::AttachmentChanged, None, &attachment);

    let mut human = HumanOutput::new("Attachment removed");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("ID", attachment.id.clone());
    human.push_summary("File", attachment.filename.clone());
    session.finish("attach rm", &attachment, human)
}

// =============================================================================
// Helpers
// =============================================================================

fn resolve_list_id(session: &Session, list: &str) -> Result<String> {
    let lists = session.store.lists(&session.actor)?;
    lists
        .iter()
        .find(|candidate| candidate.id == list)
        .or_else(|| {
            let mut matches = lists.iter().filter(|candidate| {
                candidate.id.starts_with(list) || candidate.name.eq_ignore_ascii_case(list)
            });
            let first = matches.next()?;
            matches.next().is_none().then_some(first)
        })
        .map(|found| found.id.clone())
        .ok_or_else(|| crate::error::Error::not_found("list", list))
}

fn push_task_summary(human: &mut HumanOutput, task: &Task) {
    human.push_summary("ID", task.id.clone());
    human.push_summary("Name", task.name.clone());
    human.push_summary("List", task.list_id.clone());
    human.push_summary("Priority", task.priority.to_string());
    human.push_summary("Completed", task.completed.to_string());
    if let Some(date) = task.date {
        human.push_summary("Date", crate::view::local_day(date).to_string());
    }
    if let Some(deadline) = task.deadline {
        human.push_summary("Deadline", crate::view::local_day(deadline).to_string());
    }
}

fn push_details(human: &mut HumanOutput, details: &TaskDetails) {
    let task = &details.task;
    push_task_summary(human, task);
    if let Some(list) = &details.list {
        human.push_summary("List name", format!("{} {}", list.emoji, list.name));
    }
    if let Some(description) = &task.description {
        human.push_summary("Description", description.clone());
    }
    if let Some(estimate) = &task.estimate {
        human.push_summary("Estimate", estimate.clone());
    }
    if let Some(actual) = &task.actual_time {
        human.push_summary("Actual time", actual.clone());
    }
    if let Some(recurring) = task.recurring {
        human.push_summary("Repeats", recurring.as_str());
    }
    if !details.labels.is_empty() {
        let names: Vec<String> = details
            .labels
            .iter()
            .map(|label| format!("{} {}", label.icon, label.name))
            .collect();
        human.push_summary("Labels", names.join(", "));
    }
    for subtask in &details.subtasks {
        let mark = if subtask.completed { "x" } else { " " };
        human.push_detail(format!("[{mark}] {} ({})", subtask.name, short_id(&subtask.id)));
    }
    for attachment in &details.attachments {
        human.push_detail(format!(
            "📎 {} {} bytes ({})",
            attachment.filename,
            attachment.file_size,
            short_id(&attachment.id)
        ));
    }
}
