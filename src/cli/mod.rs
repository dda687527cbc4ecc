//! Command-line interface for dayplan
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::model::{Priority, RecurringType};
use crate::view::ViewKind;

mod actor;
mod catalog;
mod init;
mod report;
mod session;
mod task;

pub use session::GlobalOptions;

/// dayplan - personal task planner
///
/// Lists, labels, tasks with subtasks and attachments, smart views,
/// "what next" suggestions and productivity analytics.
#[derive(Parser, Debug)]
#[command(name = "dayplan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Planner root directory (defaults to current directory)
    #[arg(long, global = true, env = "DAYPLAN_ROOT")]
    pub root: Option<PathBuf>,

    /// Actor identity recorded on entities and activity
    #[arg(long, global = true, env = "DAYPLAN_ACTOR")]
    pub actor: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit change events as JSON lines ("-" for stdout, or a file path)
    #[arg(long, global = true)]
    pub events: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a planner in the root directory
    Init,

    /// Task management
    #[command(subcommand)]
    Task(TaskCommands),

    /// Subtask checklist management
    #[command(subcommand)]
    Subtask(SubtaskCommands),

    /// File attachments on tasks
    #[command(subcommand)]
    Attach(AttachCommands),

    /// List management
    #[command(subcommand)]
    List(ListCommands),

    /// Label management
    #[command(subcommand)]
    Label(LabelCommands),

    /// Task templates
    #[command(subcommand)]
    Template(TemplateCommands),

    /// Set or show actor identity
    #[command(subcommand)]
    Actor(ActorCommands),

    /// Suggest what to work on next
    Suggest {
        /// Number of suggestions (defaults to suggest.count)
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Productivity analytics
    Stats,

    /// Show the activity log, newest first
    Log {
        /// Only entries for this task
        #[arg(long, conflicts_with_all = ["list", "label"])]
        task: Option<String>,

        /// Only entries for this list
        #[arg(long, conflicts_with = "label")]
        list: Option<String>,

        /// Only entries for this label
        #[arg(long)]
        label: Option<String>,

        /// Only this action: created, updated, completed, deleted, moved
        #[arg(long)]
        action: Option<String>,

        /// Only entries recorded by this actor
        #[arg(long)]
        by: Option<String>,

        /// Only entries at or after this time (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        since: Option<String>,

        /// Skip this many matching entries (newest first)
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Maximum number of entries
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task
    Add {
        /// Task name
        name: String,

        /// Target list (defaults to the default list)
        #[arg(long)]
        list: Option<String>,

        /// Free-form description
        #[arg(short, long)]
        description: Option<String>,

        /// Scheduled day (today, tomorrow, +3d, YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        date: Option<String>,

        /// Deadline (same formats as --date)
        #[arg(long)]
        deadline: Option<String>,

        /// Priority: high, medium, low, none
        #[arg(short, long)]
        priority: Option<Priority>,

        /// Estimated effort as HH:mm
        #[arg(long)]
        estimate: Option<String>,

        /// Recurrence: daily, weekly, weekday, monthly, yearly, custom
        #[arg(long)]
        recurring: Option<RecurringType>,

        /// Last day of the recurrence
        #[arg(long, requires = "recurring")]
        recurring_end: Option<String>,

        /// Label to attach (repeatable)
        #[arg(long = "label")]
        labels: Vec<String>,

        /// Reminder time (repeatable)
        #[arg(long = "reminder")]
        reminders: Vec<String>,
    },

    /// List tasks through a view
    Ls {
        /// View: today, next7days, upcoming, all (defaults to view.default)
        #[arg(long)]
        view: Option<ViewKind>,

        /// Restrict to one list (overrides --view)
        #[arg(long)]
        list: Option<String>,

        /// Fuzzy search over name and description
        #[arg(short, long)]
        search: Option<String>,

        /// Hide completed tasks
        #[arg(long, conflicts_with = "show_completed")]
        hide_completed: bool,

        /// Show completed tasks
        #[arg(long)]
        show_completed: bool,
    },

    /// Show task details
    Show {
        /// Task ID (or unique prefix)
        id: String,
    },

    /// Edit task fields
    Edit {
        /// Task ID (or unique prefix)
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(short, long, conflicts_with = "clear_description")]
        description: Option<String>,

        #[arg(long)]
        clear_description: bool,

        #[arg(long, conflicts_with = "clear_date")]
        date: Option<String>,

        #[arg(long)]
        clear_date: bool,

        #[arg(long, conflicts_with = "clear_deadline")]
        deadline: Option<String>,

        #[arg(long)]
        clear_deadline: bool,

        #[arg(short, long)]
        priority: Option<Priority>,

        #[arg(long, conflicts_with = "clear_estimate")]
        estimate: Option<String>,

        #[arg(long)]
        clear_estimate: bool,

        /// Time actually spent as mm:ss or hh:mm:ss
        #[arg(long, conflicts_with = "clear_actual_time")]
        actual_time: Option<String>,

        #[arg(long)]
        clear_actual_time: bool,

        #[arg(long, conflicts_with = "clear_recurring")]
        recurring: Option<RecurringType>,

        #[arg(long)]
        clear_recurring: bool,

        /// Position within the list
        #[arg(long)]
        order: Option<i64>,
    },

    /// Mark a task completed
    Done {
        /// Task ID (or unique prefix)
        id: String,
    },

    /// Mark a completed task open again
    Reopen {
        /// Task ID (or unique prefix)
        id: String,
    },

    /// Flip a task between completed and open
    Toggle {
        /// Task ID (or unique prefix)
        id: String,
    },

    /// Move a task to another list
    Move {
        /// Task ID (or unique prefix)
        id: String,

        /// Destination list ID
        list: String,
    },

    /// Delete a task with its subtasks and attachments
    Rm {
        /// Task ID (or unique prefix)
        id: String,
    },

    /// Attach a label to a task
    Label {
        /// Task ID (or unique prefix)
        id: String,

        /// Label ID (or unique prefix)
        label: String,
    },

    /// Detach a label from a task
    Unlabel {
        /// Task ID (or unique prefix)
        id: String,

        /// Label ID (or unique prefix)
        label: String,
    },
}

/// Subtask subcommands
#[derive(Subcommand, Debug)]
pub enum SubtaskCommands {
    /// Add a checklist item to a task
    Add {
        /// Parent task ID
        task: String,

        /// Subtask name
        name: String,
    },

    /// Toggle a subtask between done and open
    Done {
        /// Subtask ID (or unique prefix)
        id: String,
    },

    /// Rename or reorder a subtask
    Edit {
        /// Subtask ID (or unique prefix)
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        order: Option<i64>,
    },

    /// Delete a subtask
    Rm {
        /// Subtask ID (or unique prefix)
        id: String,
    },
}

/// Attachment subcommands
#[derive(Subcommand, Debug)]
pub enum AttachCommands {
    /// Attach a file to a task
    Add {
        /// Task ID (or unique prefix)
        task: String,

        /// File to attach
        path: PathBuf,
    },

    /// Remove an attachment record
    Rm {
        /// Attachment ID (or unique prefix)
        id: String,
    },
}

/// List subcommands
#[derive(Subcommand, Debug)]
pub enum ListCommands {
    /// Create a list
    Add {
        name: String,

        /// Hex color (#RGB or #RRGGBB)
        #[arg(long)]
        color: Option<String>,

        #[arg(long)]
        emoji: Option<String>,
    },

    /// Show lists, default first
    Ls,

    /// Edit a list
    Edit {
        /// List ID (or unique prefix)
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        color: Option<String>,

        #[arg(long)]
        emoji: Option<String>,
    },

    /// Delete a list and every task in it
    Rm {
        /// List ID (or unique prefix)
        id: String,
    },
}

/// Label subcommands
#[derive(Subcommand, Debug)]
pub enum LabelCommands {
    /// Create a label
    Add {
        name: String,

        /// Hex color (#RGB or #RRGGBB)
        #[arg(long)]
        color: Option<String>,

        #[arg(long)]
        icon: Option<String>,
    },

    /// Show labels
    Ls,

    /// Edit a label
    Edit {
        /// Label ID (or unique prefix)
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        color: Option<String>,

        #[arg(long)]
        icon: Option<String>,
    },

    /// Delete a label and remove it from tasks
    Rm {
        /// Label ID (or unique prefix)
        id: String,
    },
}

/// Template subcommands
#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// Create a template
    Add {
        name: String,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        priority: Option<Priority>,

        #[arg(long)]
        estimate: Option<String>,

        /// List new tasks land in
        #[arg(long)]
        list: Option<String>,
    },

    /// Show templates
    Ls,

    /// Edit a template
    Edit {
        /// Template ID (or unique prefix)
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        priority: Option<Priority>,

        #[arg(long)]
        estimate: Option<String>,

        #[arg(long)]
        list: Option<String>,
    },

    /// Create a task from a template
    Use {
        /// Template ID (or unique prefix)
        id: String,

        /// Task name (defaults to the template name)
        #[arg(long)]
        name: Option<String>,

        /// Target list (overrides the template list)
        #[arg(long)]
        list: Option<String>,
    },

    /// Delete a template
    Rm {
        /// Template ID (or unique prefix)
        id: String,
    },
}

/// Actor subcommands
#[derive(Subcommand, Debug)]
pub enum ActorCommands {
    /// Persist the actor identity for this planner
    Set {
        name: String,
    },

    /// Show the resolved actor identity
    Show,
}

impl Cli {
    fn global(&self) -> GlobalOptions {
        GlobalOptions {
            root: self.root.clone(),
            actor: self.actor.clone(),
            events: self.events.clone(),
            json: self.json,
            quiet: self.quiet,
        }
    }

    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let global = self.global();
        match self.command {
            Commands::Init => init::run(global),
            Commands::Task(cmd) => match cmd {
                TaskCommands::Add {
                    name,
                    list,
                    description,
                    date,
                    deadline,
                    priority,
                    estimate,
                    recurring,
                    recurring_end,
                    labels,
                    reminders,
                } => task::run_add(
                    global,
                    task::AddOptions {
                        name,
                        list,
                        description,
                        date,
                        deadline,
                        priority,
                        estimate,
                        recurring,
                        recurring_end,
                        labels,
                        reminders,
                    },
                ),
                TaskCommands::Ls {
                    view,
                    list,
                    search,
                    hide_completed,
                    show_completed,
                } => task::run_list(
                    global,
                    task::ListOptions {
                        view,
                        list,
                        search,
                        hide_completed,
                        show_completed,
                    },
                ),
                TaskCommands::Show { id } => task::run_show(global, id),
                TaskCommands::Edit {
                    id,
                    name,
                    description,
                    clear_description,
                    date,
                    clear_date,
                    deadline,
                    clear_deadline,
                    priority,
                    estimate,
                    clear_estimate,
                    actual_time,
                    clear_actual_time,
                    recurring,
                    clear_recurring,
                    order,
                } => task::run_edit(
                    global,
                    task::EditOptions {
                        id,
                        name,
                        description: task::Clearable::from_flags(description, clear_description),
                        date: task::Clearable::from_flags(date, clear_date),
                        deadline: task::Clearable::from_flags(deadline, clear_deadline),
                        priority,
                        estimate: task::Clearable::from_flags(estimate, clear_estimate),
                        actual_time: task::Clearable::from_flags(actual_time, clear_actual_time),
                        recurring: task::Clearable::from_flags(recurring, clear_recurring),
                        order,
                    },
                ),
                TaskCommands::Done { id } => task::run_set_completed(global, id, Some(true)),
                TaskCommands::Reopen { id } => task::run_set_completed(global, id, Some(false)),
                TaskCommands::Toggle { id } => task::run_set_completed(global, id, None),
                TaskCommands::Move { id, list } => task::run_move(global, id, list),
                TaskCommands::Rm { id } => task::run_delete(global, id),
                TaskCommands::Label { id, label } => task::run_label(global, id, label, true),
                TaskCommands::Unlabel { id, label } => task::run_label(global, id, label, false),
            },
            Commands::Subtask(cmd) => match cmd {
                SubtaskCommands::Add { task, name } => task::run_subtask_add(global, task, name),
                SubtaskCommands::Done { id } => task::run_subtask_toggle(global, id),
                SubtaskCommands::Edit { id, name, order } => {
                    task::run_subtask_edit(global, id, name, order)
                }
                SubtaskCommands::Rm { id } => task::run_subtask_delete(global, id),
            },
            Commands::Attach(cmd) => match cmd {
                AttachCommands::Add { task, path } => task::run_attach_add(global, task, path),
                AttachCommands::Rm { id } => task::run_attach_delete(global, id),
            },
            Commands::List(cmd) => match cmd {
                ListCommands::Add { name, color, emoji } => {
                    catalog::run_list_add(global, name, color, emoji)
                }
                ListCommands::Ls => catalog::run_list_ls(global),
                ListCommands::Edit {
                    id,
                    name,
                    color,
                    emoji,
                } => catalog::run_list_edit(global, id, name, color, emoji),
                ListCommands::Rm { id } => catalog::run_list_delete(global, id),
            },
            Commands::Label(cmd) => match cmd {
                LabelCommands::Add { name, color, icon } => {
                    catalog::run_label_add(global, name, color, icon)
                }
                LabelCommands::Ls => catalog::run_label_ls(global),
                LabelCommands::Edit {
                    id,
                    name,
                    color,
                    icon,
                } => catalog::run_label_edit(global, id, name, color, icon),
                LabelCommands::Rm { id } => catalog::run_label_delete(global, id),
            },
            Commands::Template(cmd) => match cmd {
                TemplateCommands::Add {
                    name,
                    description,
                    priority,
                    estimate,
                    list,
                } => catalog::run_template_add(
                    global,
                    catalog::TemplateOptions {
                        name: Some(name),
                        description,
                        priority,
                        estimate,
                        list,
                    },
                ),
                TemplateCommands::Ls => catalog::run_template_ls(global),
                TemplateCommands::Edit {
                    id,
                    name,
                    description,
                    priority,
                    estimate,
                    list,
                } => catalog::run_template_edit(
                    global,
                    id,
                    catalog::TemplateOptions {
                        name,
                        description,
                        priority,
                        estimate,
                        list,
                    },
                ),
                TemplateCommands::Use { id, name, list } => {
                    catalog::run_template_use(global, id, name, list)
                }
                TemplateCommands::Rm { id } => catalog::run_template_delete(global, id),
            },
            Commands::Actor(cmd) => match cmd {
                ActorCommands::Set { name } => actor::run_set(global, name),
                ActorCommands::Show => actor::run_show(global),
            },
            Commands::Suggest { count } => report::run_suggest(global, count),
            Commands::Stats => report::run_stats(global),
            Commands::Log {
                task,
                list,
                label,
                action,
                by,
                since,
                offset,
                limit,
            } => report::run_log(
                global,
                report::LogOptions {
                    task,
                    list,
                    label,
                    action,
                    by,
                    since,
                    offset,
                    limit,
                },
            ),
        }
    }
}
