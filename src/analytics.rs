use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;

use crate::model::{Label, Task, TaskList};
use crate::view::local_day;

pub const DEFAULT_WINDOW_DAYS: u32 = 30;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub active_tasks: usize,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrendBucket {
    pub date: NaiveDate,
    pub completed: usize,
    pub created: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupCount {
    pub id: String,
    pub name: String,
    pub count: usize,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimeSpent {
    pub id: String,
    pub name: String,
    pub minutes: u64,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub generated_at: DateTime<Utc>,
    pub window_days: u32,
    pub summary: Summary,
    pub productivity_trend: Vec<TrendBucket>,
    pub tasks_by_list: Vec<GroupCount>,
    pub tasks_by_label: Vec<GroupCount>,
    pub time_spent_by_list: Vec<TimeSpent>,
}

/// Aggregate one user's planner data. Read-only over its inputs.
///
/// Records with no owner are treated as belonging to every user.
pub fn compute_snapshot(
    user: &str,
    tasks: &[Task],
    lists: &[TaskList],
    labels: &[Label],
    now: DateTime<Utc>,
    window_days: u32,
) -> AnalyticsSnapshot {
    let owned = |owner: Option<&str>| owner.map_or(true, |owner| owner == user);
    let tasks: Vec<&Task> = tasks
        .iter()
        .filter(|task| owned(task.user_id.as_deref()))
        .collect();
    let lists: Vec<&TaskList> = lists
        .iter()
        .filter(|list| owned(list.user_id.as_deref()))
        .collect();
    let labels: Vec<&Label> = labels
        .iter()
        .filter(|label| owned(label.user_id.as_deref()))
        .collect();

    let window_days = window_days.max(1);
    AnalyticsSnapshot {
        generated_at: now,
        window_days,
        summary: summarize(&tasks),
        productivity_trend: productivity_trend(&tasks, local_day(now), window_days),
        tasks_by_list: tasks_by_list(&tasks, &lists),
        tasks_by_label: tasks_by_label(&tasks, &labels),
        time_spent_by_list: time_spent_by_list(&tasks, &lists),
    }
}

fn summarize(tasks: &[&Task]) -> Summary {
    let total_tasks = tasks.len();
    let completed_tasks = tasks.iter().filter(|task| task.completed).count();
    Summary {
        total_tasks,
        completed_tasks,
        active_tasks: total_tasks - completed_tasks,
        completion_rate: ratio_pct(completed_tasks as f64, total_tasks as f64),
    }
}

fn productivity_trend(tasks: &[&Task], today: NaiveDate, window_days: u32) -> Vec<TrendBucket> {
    let first = today
        .checked_sub_days(Days::new(u64::from(window_days - 1)))
        .unwrap_or(NaiveDate::MIN);

    let mut buckets: BTreeMap<NaiveDate, TrendBucket> = first
        .iter_days()
        .take_while(|day| *day <= today)
        .map(|date| {
            (
                date,
                TrendBucket {
                    date,
                    completed: 0,
                    created: 0,
                },
            )
        })
        .collect();

    for task in tasks {
        if let Some(bucket) = buckets.get_mut(&local_day(task.created_at)) {
            bucket.created += 1;
        }
        if !task.completed {
            continue;
        }
        if let Some(bucket) = task
            .completed_at
            .and_then(|completed_at| buckets.get_mut(&local_day(completed_at)))
        {
            bucket.completed += 1;
        }
    }

    buckets.into_values().collect()
}

fn tasks_by_list(tasks: &[&Task], lists: &[&TaskList]) -> Vec<GroupCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for task in tasks {
        *counts.entry(task.list_id.as_str()).or_insert(0) += 1;
    }

    lists
        .iter()
        .filter_map(|list| {
            let count = counts.get(list.id.as_str()).copied().unwrap_or(0);
            (count > 0).then(|| GroupCount {
                id: list.id.clone(),
                name: list.name.clone(),
                count,
                color: list.color.clone(),
            })
        })
        .collect()
}

fn tasks_by_label(tasks: &[&Task], labels: &[&Label]) -> Vec<GroupCount> {
    labels
        .iter()
        .filter_map(|label| {
            let count = tasks.iter().filter(|task| task.has_label(&label.id)).count();
            (count > 0).then(|| GroupCount {
                id: label.id.clone(),
                name: label.name.clone(),
                count,
                color: label.color.clone(),
            })
        })
        .collect()
}

fn time_spent_by_list(tasks: &[&Task], lists: &[&TaskList]) -> Vec<TimeSpent> {
    let mut minutes: HashMap<&str, u64> = HashMap::new();
    for task in tasks {
        let spent = task.actual_time.as_deref().map_or(0, parse_time_minutes);
        *minutes.entry(task.list_id.as_str()).or_insert(0) += spent;
    }

    lists
        .iter()
        .filter_map(|list| {
            let total = minutes.get(list.id.as_str()).copied().unwrap_or(0);
            (total > 0).then(|| TimeSpent {
                id: list.id.clone(),
                name: list.name.clone(),
                minutes: total,
                color: list.color.clone(),
            })
        })
        .collect()
}

/// Whole minutes in a tracked-time string.
///
/// `mm:ss` and `hh:mm:ss` are accepted; anything else counts as zero.
pub fn parse_time_minutes(value: &str) -> u64 {
    let parts: Option<Vec<u64>> = value
        .trim()
        .split(':')
        .map(|part| part.parse::<u64>().ok())
        .collect();
    let seconds = match parts.as_deref() {
        Some([minutes, seconds]) => minutes.saturating_mul(60).saturating_add(*seconds),
        Some([hours, minutes, seconds]) => hours
            .saturating_mul(3600)
            .saturating_add(minutes.saturating_mul(60))
            .saturating_add(*seconds),
        _ => 0,
    };
    seconds / 60
}

pub fn format_minutes(minutes: u64) -> String {
    match (minutes / 60, minutes % 60) {
        (0, rest) => format!("{rest}m"),
        (hours, 0) => format!("{hours}h"),
        (hours, rest) => format!("{hours}h {rest}m"),
    }
}

/// Percentage for human output, one decimal place.
pub fn format_rate(rate: f64) -> String {
    format!("{rate:.1}%")
}

/// Unrounded percentage; zero when there is nothing to divide by.
fn ratio_pct(numerator: f64, denominator: f64) -> f64 {
    if denominator <= f64::EPSILON {
        0.0
    } else {
        (numerator / denominator) * 100.0
    }
}
