//! Heuristic "what next" ranking over open tasks.

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{Priority, Task};
use crate::view::local_day;

pub const DEFAULT_SUGGESTION_COUNT: usize = 3;

const OVERDUE_BONUS: i64 = 200;
const DUE_TODAY_BONUS: i64 = 150;
const DUE_SOON_BONUS: i64 = 80;
const DUE_THIS_WEEK_BONUS: i64 = 40;
const SCHEDULED_BONUS: i64 = 50;
const RECURRING_BONUS: i64 = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredTask {
    pub score: i64,
    pub task: Task,
}

fn priority_points(priority: Priority) -> i64 {
    match priority {
        Priority::High => 100,
        Priority::Medium => 50,
        Priority::Low => 20,
        Priority::None => 0,
    }
}

fn deadline_points(days_left: i64) -> i64 {
    match days_left {
        d if d < 0 => OVERDUE_BONUS,
        0 => DUE_TODAY_BONUS,
        1..=3 => DUE_SOON_BONUS,
        4..=7 => DUE_THIS_WEEK_BONUS,
        _ => 0,
    }
}

/// Urgency score; higher means more pressing.
pub fn score_task(task: &Task, today: NaiveDate) -> i64 {
    let mut score = priority_points(task.priority);

    if let Some(deadline) = task.deadline {
        let days_left = (local_day(deadline) - today).num_days();
        score += deadline_points(days_left);
    }

    if let Some(date) = task.date {
        if local_day(date) <= today {
            score += SCHEDULED_BONUS;
        }
    }

    if task.recurring.is_some() {
        score += RECURRING_BONUS;
    }

    score
}

/// Open tasks ranked by score, at most `n`. Equal scores keep input order.
pub fn suggest_top_scored(tasks: &[Task], n: usize, today: NaiveDate) -> Vec<ScoredTask> {
    let mut scored: Vec<ScoredTask> = tasks
        .iter()
        .filter(|task| !task.completed)
        .map(|task| ScoredTask {
            score: score_task(task, today),
            task: task.clone(),
        })
        .collect();

    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(n);
    scored
}

pub fn suggest_top(tasks: &[Task], n: usize, today: NaiveDate) -> Vec<Task> {
    suggest_top_scored(tasks, n, today)
        .into_iter()
        .map(|scored| scored.task)
        .collect()
}
