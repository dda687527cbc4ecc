//! Shared output formatting for dayplan commands.
//!
//! Every command answers either with a JSON envelope (`--json`) or with a
//! short human report built from a [`HumanOutput`].

use std::fmt;

use serde::Serialize;

use crate::error::{Error, JsonError, Result};
use crate::model::{Priority, Task};
use crate::view::local_day;

pub const SCHEMA_VERSION: &str = "dayplan.v1";

/// Commands whose first positional argument is a subcommand.
const GROUPED_COMMANDS: [&str; 6] = ["task", "subtask", "attach", "list", "label", "template"];

/// Global flags that consume the next argument.
const VALUE_FLAGS: [&str; 3] = ["--root", "--actor", "--events"];

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Human report: a header, `key: value` summary lines and titled sections.
#[derive(Debug, Clone, Default)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            ..Self::default()
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }
}

impl fmt::Display for HumanOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header)?;

        if !self.summary.is_empty() {
            f.write_str("\n\nSummary:")?;
            for (key, value) in &self.summary {
                if value.is_empty() {
                    write!(f, "\n- {key}")?;
                } else {
                    write!(f, "\n- {key}: {value}")?;
                }
            }
        }

        let sections = [
            ("Details", &self.details),
            ("Warnings", &self.warnings),
            ("Next steps", &self.next_steps),
        ];
        for (title, items) in sections {
            if items.is_empty() {
                continue;
            }
            write!(f, "\n\n{title}:")?;
            for item in items {
                write!(f, "\n- {item}")?;
            }
        }
        Ok(())
    }
}

/// Wire shape shared by success and error answers.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    next_steps: Vec<String>,
}

fn print_json<T: Serialize>(envelope: &Envelope<'_, T>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(envelope)?);
    Ok(())
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let (warnings, next_steps) = human
            .map(|human| (human.warnings.clone(), human.next_steps.clone()))
            .unwrap_or_default();
        return print_json(&Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data: Some(data),
            error: None,
            warnings,
            next_steps,
        });
    }

    match human {
        Some(human) if !options.quiet => println!("{human}"),
        _ => {}
    }
    Ok(())
}

/// JSON errors go to stdout beside the success envelopes; human errors go to stderr.
pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let hint = error_hint(err);
    if json {
        return print_json(&Envelope::<()> {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            data: None,
            error: Some(JsonError::from(err)),
            warnings: Vec::new(),
            next_steps: hint.map(str::to_string).into_iter().collect(),
        });
    }

    eprintln!("error: {err}");
    if let Some(hint) = hint {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

fn error_hint(err: &Error) -> Option<&'static str> {
    let hint = match err {
        Error::NotInitialized(_) => "dayplan init",
        Error::InvalidConfig(_) => "fix .dayplan.toml then retry",
        Error::NotFound { kind: "task", .. } => "dayplan task ls --view all",
        Error::NotFound { kind: "list", .. } => "dayplan list ls",
        Error::NotFound { kind: "label", .. } => "dayplan label ls",
        Error::NotFound { kind: "template", .. } => "dayplan template ls",
        Error::LockFailed(_) => "retry once the other dayplan process finishes",
        _ => return None,
    };
    Some(hint)
}

/// First eight characters of an id, for human output.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// One-line task rendering: `[x] name !high due 2024-05-01 (id)`.
pub fn format_task_line(task: &Task) -> String {
    let mark = if task.completed { "x" } else { " " };
    let mut line = format!("[{mark}] {}", task.name);
    if task.priority != Priority::None {
        line.push_str(&format!(" !{}", task.priority));
    }
    if let Some(date) = task.date {
        line.push_str(&format!(" on {}", local_day(date)));
    }
    if let Some(deadline) = task.deadline {
        line.push_str(&format!(" due {}", local_day(deadline)));
    }
    line.push_str(&format!(" ({})", short_id(&task.id)));
    line
}

/// Command label for error envelopes, read from the raw process arguments
/// so it is available even when parsing fails.
pub fn command_name_from_args() -> String {
    command_name(std::env::args().skip(1))
}

fn command_name(args: impl IntoIterator<Item = String>) -> String {
    let mut args = args.into_iter();
    let mut positional: Vec<String> = Vec::new();
    while let Some(arg) = args.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            args.next();
        } else if !arg.starts_with('-') {
            positional.push(arg);
            if positional.len() == 2 {
                break;
            }
        }
    }

    match positional.as_slice() {
        [] => "dayplan".to_string(),
        [group, sub] if GROUPED_COMMANDS.contains(&group.as_str()) => format!("{group} {sub}"),
        [command, ..] => command.clone(),
    }
}
