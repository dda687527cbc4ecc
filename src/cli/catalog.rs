//! dayplan list, label and template command implementations.

use serde::Serialize;

use crate::cli::session::{GlobalOptions, Session};
use crate::error::{Error, Result};
use crate::events::ChangeKind;
use crate::model::{Label, LabelPatch, ListPatch, Priority, TaskList, TaskTemplate, TemplatePatch};
use crate::output::{format_task_line, short_id, HumanOutput};

pub struct TemplateOptions {
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub estimate: Option<String>,
    pub list: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Collection<T: Serialize> {
    total: usize,
    items: Vec<T>,
}

impl<T: Serialize> Collection<T> {
    fn new(items: Vec<T>) -> Self {
        Self {
            total: items.len(),
            items,
        }
    }
}

// =============================================================================
// Lists
// =============================================================================

pub fn run_list_add(
    global: GlobalOptions,
    name: String,
    color: Option<String>,
    emoji: Option<String>,
) -> Result<()> {
    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let list = session
        .store
        .create_list(&name, color.as_deref(), emoji.as_deref(), &actor)?;
    let event_warning = session.emit(ChangeKind::ListCreated, Some(&list.id), &list);

    let mut human = HumanOutput::new("List created");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    push_list_summary(&mut human, &list);
    human.push_next_step(format!(
        "dayplan task add \"<name>\" --list {}",
        short_id(&list.id)
    ));
    session.finish("list add", &list, human)
}

pub fn run_list_ls(global: GlobalOptions) -> Result<()> {
    let session = Session::open(&global)?;
    let lists = session.store.lists(&session.actor)?;
    let tasks = session.store.tasks(&session.actor)?;

    let mut human = HumanOutput::new("Lists");
    human.push_summary("Total", lists.len().to_string());
    for list in &lists {
        let open = tasks
            .iter()
            .filter(|task| task.list_id == list.id && !task.completed)
            .count();
        let default = if list.is_default { " (default)" } else { "" };
        human.push_detail(format!(
            "{} {}{default} {open} open ({})",
            list.emoji,
            list.name,
            short_id(&list.id)
        ));
    }

    session.finish("list ls", &Collection::new(lists), human)
}

pub fn run_list_edit(
    global: GlobalOptions,
    id: String,
    name: Option<String>,
    color: Option<String>,
    emoji: Option<String>,
) -> Result<()> {
    let patch = ListPatch { name, color, emoji };
    if patch == ListPatch::default() {
        return Err(Error::InvalidArgument(
            "nothing to edit (pass --name, --color or --emoji)".to_string(),
        ));
    }

    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let list = session.store.update_list(&id, &patch, &actor)?;
    let event_warning = session.emit(ChangeKind::ListUpdated, Some(&list.id), &list);

    let mut human = HumanOutput::new("List updated");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    push_list_summary(&mut human, &list);
    session.finish("list edit", &list, human)
}

pub fn run_list_delete(global: GlobalOptions, id: String) -> Result<()> {
    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let deletion = session.store.delete_list(&id, &actor)?;
    let event_warning = session.emit(
        ChangeKind::ListDeleted,
        Some(&deletion.list.id),
        &deletion,
    );

    let mut human = HumanOutput::new("List deleted");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("ID", deletion.list.id.clone());
    human.push_summary("Name", deletion.list.name.clone());
    human.push_summary("Tasks removed", deletion.tasks_removed.len().to_string());
    session.finish("list rm", &deletion, human)
}

fn push_list_summary(human: &mut HumanOutput, list: &TaskList) {
    human.push_summary("ID", list.id.clone());
    human.push_summary("Name", format!("{} {}", list.emoji, list.name));
    human.push_summary("Color", list.color.clone());
    if list.is_default {
        human.push_summary("Default", "true");
    }
}

// =============================================================================
// Labels
// =============================================================================

pub fn run_label_add(
    global: GlobalOptions,
    name: String,
    color: Option<String>,
    icon: Option<String>,
) -> Result<()> {
    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let label = session
        .store
        .create_label(&name, color.as_deref(), icon.as_deref(), &actor)?;
    let event_warning = session.emit(ChangeKind::LabelCreated, None, &label);

    let mut human = HumanOutput::new("Label created");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    push_label_summary(&mut human, &label);
    human.push_next_step(format!("dayplan task label <task> {}", short_id(&label.id)));
    session.finish("label add", &label, human)
}

pub fn run_label_ls(global: GlobalOptions) -> Result<()> {
    let session = Session::open(&global)?;
    let labels = session.store.labels(&session.actor)?;
    let tasks = session.store.tasks(&session.actor)?;

    let mut human = HumanOutput::new("Labels");
    human.push_summary("Total", labels.len().to_string());
    for label in &labels {
        let tagged = tasks.iter().filter(|task| task.has_label(&label.id)).count();
        human.push_detail(format!(
            "{} {} {tagged} tasks ({})",
            label.icon,
            label.name,
            short_id(&label.id)
        ));
    }

    session.finish("label ls", &Collection::new(labels), human)
}

pub fn run_label_edit(
    global: GlobalOptions,
    id: String,
    name: Option<String>,
    color: Option<String>,
    icon: Option<String>,
) -> Result<()> {
    let patch = LabelPatch { name, color, icon };
    if patch == LabelPatch::default() {
        return Err(Error::InvalidArgument(
            "nothing to edit (pass --name, --color or --icon)".to_string(),
        ));
    }

    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let label = session.store.update_label(&id, &patch, &actor)?;
    let event_warning = session.emit(ChangeKind::LabelUpdated, None, &label);

    let mut human = HumanOutput::new("Label updated");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    push_label_summary(&mut human, &label);
    session.finish("label edit", &label, human)
}

pub fn run_label_delete(global: GlobalOptions, id: String) -> Result<()> {
    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let deletion = session.store.delete_label(&id, &actor)?;
    let event_warning = session.emit(ChangeKind::LabelDeleted, None, &deletion);

    let mut human = HumanOutput::new("Label deleted");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("ID", deletion.label.id.clone());
    human.push_summary("Name", deletion.label.name.clone());
    human.push_summary("Tasks updated", deletion.tasks_updated.to_string());
    session.finish("label rm", &deletion, human)
}

fn push_label_summary(human: &mut HumanOutput, label: &Label) {
    human.push_summary("ID", label.id.clone());
    human.push_summary("Name", format!("{} {}", label.icon, label.name));
    human.push_summary("Color", label.color.clone());
}

// =============================================================================
// Templates
// =============================================================================

pub fn run_template_add(global: GlobalOptions, options: TemplateOptions) -> Result<()> {
    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();

    let mut template = TaskTemplate::new(options.name.unwrap_or_default());
    template.description = options.description;
    template.priority = options.priority.unwrap_or_default();
    template.estimate = options.estimate;
    template.list_id = options.list;

    let template = session.store.create_template(template, &actor)?;
    let event_warning = session.emit(
        ChangeKind::TemplateChanged,
        template.list_id.as_deref(),
        &template,
    );

    let mut human = HumanOutput::new("Template created");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    push_template_summary(&mut human, &template);
    human.push_next_step(format!("dayplan template use {}", short_id(&template.id)));
    session.finish("template add", &template, human)
}

pub fn run_template_ls(global: GlobalOptions) -> Result<()> {
    let session = Session::open(&global)?;
    let templates = session.store.templates(&session.actor)?;

    let mut human = HumanOutput::new("Templates");
    human.push_summary("Total", templates.len().to_string());
    for template in &templates {
        let mut line = format!("{} !{}", template.name, template.priority);
        if let Some(estimate) = &template.estimate {
            line.push_str(&format!(" ~{estimate}"));
        }
        line.push_str(&format!(" ({})", short_id(&template.id)));
        human.push_detail(line);
    }

    session.finish("template ls", &Collection::new(templates), human)
}

pub fn run_template_edit(global: GlobalOptions, id: String, options: TemplateOptions) -> Result<()> {
    let patch = TemplatePatch {
        name: options.name,
        description: options.description.map(Some),
        priority: options.priority,
        estimate: options.estimate.map(Some),
        list_id: options.list.map(Some),
    };
    if patch == TemplatePatch::default() {
        return Err(Error::InvalidArgument(
            "nothing to edit (pass at least one field flag)".to_string(),
        ));
    }

    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let template = session.store.update_template(&id, &patch, &actor)?;
    let event_warning = session.emit(
        ChangeKind::TemplateChanged,
        template.list_id.as_deref(),
        &template,
    );

    let mut human = HumanOutput::new("Template updated");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    push_template_summary(&mut human, &template);
    session.finish("template edit", &template, human)
}

pub fn run_template_use(
    global: GlobalOptions,
    id: String,
    name: Option<String>,
    list: Option<String>,
) -> Result<()> {
    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let task = session
        .store
        .instantiate_template(&id, name.as_deref(), list.as_deref(), &actor)?;
    let event_warning = session.emit(ChangeKind::TaskCreated, Some(&task.list_id), &task);

    let mut human = HumanOutput::new("Task created from template");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_detail(format_task_line(&task));
    session.finish("template use", &task, human)
}

pub fn run_template_delete(global: GlobalOptions, id: String) -> Result<()> {
    let mut session = Session::open(&global)?;
    let actor = session.actor.clone();
    let template = session.store.delete_template(&id, &actor)?;
    let event_warning = session.emit(
        ChangeKind::TemplateChanged,
        template.list_id.as_deref(),
        &template,
    );

    let mut human = HumanOutput::new("Template deleted");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("ID", template.id.clone());
    human.push_summary("Name", template.name.clone());
    session.finish("template rm", &template, human)
}

fn push_template_summary(human: &mut HumanOutput, template: &TaskTemplate) {
    human.push_summary("ID", template.id.clone());
    human.push_summary("Name", template.name.clone());
    human.push_summary("Priority", template.priority.to_string());
    if let Some(estimate) = &template.estimate {
        human.push_summary("Estimate", estimate.clone());
    }
    if let Some(list_id) = &template.list_id {
        human.push_summary("List", list_id.clone());
    }
}
