//! Task view selection: scope, time window, visibility, search and ordering.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Task, TaskList};
use crate::search::FuzzySearch;

const NEXT_DAYS_SPAN: u64 = 7;

/// Time-window selector. Names match case-insensitively and unknown names
/// behave like [`ViewKind::All`], whether parsed or deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    #[default]
    Today,
    Next7Days,
    Upcoming,
    All,
}

impl ViewKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewKind::Today => "today",
            ViewKind::Next7Days => "next7days",
            ViewKind::Upcoming => "upcoming",
            ViewKind::All => "all",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ViewKind::Today => "Today",
            ViewKind::Next7Days => "Next 7 Days",
            ViewKind::Upcoming => "Upcoming",
            ViewKind::All => "All Tasks",
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewKind {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value.trim().to_ascii_lowercase().as_str() {
            "today" => ViewKind::Today,
            "next7days" => ViewKind::Next7Days,
            "upcoming" => ViewKind::Upcoming,
            _ => ViewKind::All,
        })
    }
}

impl<'de> Deserialize<'de> for ViewKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(name.parse().unwrap_or_else(|never: Infallible| match never {}))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    #[serde(default)]
    pub selected_list_id: Option<String>,
    #[serde(default)]
    pub selected_view: ViewKind,
    #[serde(default)]
    pub search_query: String,
    #[serde(default)]
    pub show_completed: bool,
}

impl ViewState {
    pub fn for_view(view: ViewKind) -> Self {
        Self {
            selected_view: view,
            show_completed: true,
            ..Self::default()
        }
    }

    pub fn for_list(list_id: impl Into<String>) -> Self {
        Self {
            selected_list_id: Some(list_id.into()),
            selected_view: ViewKind::All,
            show_completed: true,
            ..Self::default()
        }
    }

    /// Header for the current scope; lists take precedence over views.
    pub fn title(&self, lists: &[TaskList]) -> String {
        match self.selected_list_id.as_deref() {
            Some(list_id) => lists
                .iter()
                .find(|list| list.id == list_id)
                .map(|list| list.name.clone())
                .unwrap_or_else(|| "List Tasks".to_string()),
            None => self.selected_view.title().to_string(),
        }
    }
}

/// Calendar day of a timestamp in local time.
pub fn local_day(timestamp: DateTime<Utc>) -> NaiveDate {
    timestamp.with_timezone(&Local).date_naive()
}

pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Pipeline with its search backend bound.
#[derive(Debug, Default)]
pub struct ViewPipeline {
    search: FuzzySearch,
}

impl ViewPipeline {
    pub fn new(search: FuzzySearch) -> Self {
        Self { search }
    }

    pub fn select(&self, tasks: &[Task], state: &ViewState) -> Vec<Task> {
        self.select_at(tasks, state, local_today())
    }

    pub fn select_at(&self, tasks: &[Task], state: &ViewState, today: NaiveDate) -> Vec<Task> {
        select_visible_tasks(tasks, state, today, &self.search)
    }
}

/// Produce the ordered subset of `tasks` visible under `state`.
pub fn select_visible_tasks(
    tasks: &[Task],
    state: &ViewState,
    today: NaiveDate,
    search: &FuzzySearch,
) -> Vec<Task> {
    let mut visible: Vec<&Task> = match state.selected_list_id.as_deref() {
        Some(list_id) => tasks.iter().filter(|task| task.list_id == list_id).collect(),
        None => tasks
            .iter()
            .filter(|task| in_time_window(task, state.selected_view, today))
            .collect(),
    };

    if !state.show_completed {
        visible.retain(|task| !task.completed);
    }

    let query = state.search_query.trim();
    if !query.is_empty() {
        visible = search.search(visible, query, |task| {
            let mut keys = vec![task.name.as_str()];
            if let Some(description) = task.description.as_deref() {
                keys.push(description);
            }
            keys
        });
    }

    visible.sort_by(|left, right| compare_tasks(left, right));
    visible.into_iter().cloned().collect()
}

fn in_time_window(task: &Task, view: ViewKind, today: NaiveDate) -> bool {
    if view == ViewKind::All {
        return true;
    }
    let Some(day) = task.date.map(local_day) else {
        return false;
    };
    match view {
        ViewKind::Today => day == today,
        ViewKind::Next7Days => {
            let end = today
                .checked_add_days(Days::new(NEXT_DAYS_SPAN))
                .unwrap_or(NaiveDate::MAX);
            day >= today && day <= end
        }
        ViewKind::Upcoming => day >= today,
        ViewKind::All => true,
    }
}

/// Display order: open first, dated before undated, earlier date, higher
/// priority, newer creation.
pub fn compare_tasks(left: &Task, right: &Task) -> Ordering {
    left.completed
        .cmp(&right.completed)
        .then_with(|| match (left.date, right.date) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| left.priority.rank().cmp(&right.priority.rank()))
        .then_with(|| right.created_at.cmp(&left.created_at))
}

pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(compare_tasks);
}
