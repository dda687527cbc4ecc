mod support;

use chrono::Duration;
use dayplan::analytics::{compute_snapshot, parse_time_minutes, DEFAULT_WINDOW_DAYS};
use dayplan::model::{Label, Task, TaskDraft, TaskList};
use support::{day, noon, TestPlanner, ACTOR};

fn lists() -> Vec<TaskList> {
    let mut work = TaskList::new("Work", "#10B981", "💼");
    work.id = "work".to_string();
    let mut home = TaskList::new("Home", "#F59E0B", "🏠");
    home.id = "home".to_string();
    let mut empty = TaskList::new("Empty", "#6B7280", "📭");
    empty.id = "empty".to_string();
    vec![work, home, empty]
}

fn task_in(list: &str, name: &str) -> Task {
    let mut task = Task::new(list, name);
    task.created_at = noon(day(2024, 4, 1));
    task
}

#[test]
fn zero_tasks_give_zero_rate_and_empty_breakdowns() {
    let now = noon(day(2024, 4, 30));
    let snapshot = compute_snapshot(ACTOR, &[], &lists(), &[], now, DEFAULT_WINDOW_DAYS);

    assert_eq!(snapshot.summary.total_tasks, 0);
    assert_eq!(snapshot.summary.completion_rate, 0.0);
    assert!(!snapshot.summary.completion_rate.is_nan());
    assert!(snapshot.tasks_by_list.is_empty());
    assert!(snapshot.tasks_by_label.is_empty());
    assert!(snapshot.time_spent_by_list.is_empty());
    assert_eq!(snapshot.productivity_trend.len(), 30);
    assert!(snapshot
        .productivity_trend
        .iter()
        .all(|bucket| bucket.completed == 0 && bucket.created == 0));
}

#[test]
fn summary_and_groupings() {
    let now = noon(day(2024, 4, 30));
    let mut urgent = Label::new("urgent", "#EF4444", "🔥");
    urgent.id = "urgent".to_string();

    let mut done = task_in("work", "ship");
    done.completed = true;
    done.completed_at = Some(noon(day(2024, 4, 29)));
    done.labels = vec!["urgent".to_string()];
    let open = task_in("work", "review");
    let chores = task_in("home", "laundry");

    let snapshot = compute_snapshot(
        ACTOR,
        &[done, open, chores],
        &lists(),
        &[urgent],
        now,
        DEFAULT_WINDOW_DAYS,
    );

    assert_eq!(snapshot.summary.total_tasks, 3);
    assert_eq!(snapshot.summary.completed_tasks, 1);
    assert_eq!(snapshot.summary.active_tasks, 2);
    assert_eq!(snapshot.summary.completion_rate, 1.0 / 3.0 * 100.0);

    let by_list: Vec<(&str, usize)> = snapshot
        .tasks_by_list
        .iter()
        .map(|group| (group.name.as_str(), group.count))
        .collect();
    assert_eq!(by_list, vec![("Work", 2), ("Home", 1)]);
    assert_eq!(snapshot.tasks_by_label.len(), 1);
    assert_eq!(snapshot.tasks_by_label[0].count, 1);

    let created = snapshot
        .productivity_trend
        .iter()
        .find(|bucket| bucket.date == day(2024, 4, 1))
        .unwrap();
    assert_eq!(created.created, 3);
    let completed = snapshot.productivity_trend.last().unwrap();
    assert_eq!(completed.date, day(2024, 4, 30));
    let yesterday = &snapshot.productivity_trend[snapshot.productivity_trend.len() - 2];
    assert_eq!(yesterday.completed, 1);
}

#[test]
fn two_and_three_part_times_differ() {
    assert_eq!(parse_time_minutes("01:30"), 1);
    assert_eq!(parse_time_minutes("01:30:00"), 90);

    let now = noon(day(2024, 4, 30));
    let mut short = task_in("work", "short");
    short.actual_time = Some("01:30".to_string());
    let mut long = task_in("home", "long");
    long.actual_time = Some("01:30:00".to_string());
    let mut garbage = task_in("home", "garbage");
    garbage.actual_time = Some("an hour".to_string());

    let snapshot = compute_snapshot(
        ACTOR,
        &[short, long, garbage],
        &lists(),
        &[],
        now,
        DEFAULT_WINDOW_DAYS,
    );
    let spent: Vec<(&str, u64)> = snapshot
        .time_spent_by_list
        .iter()
        .map(|entry| (entry.id.as_str(), entry.minutes))
        .collect();
    assert_eq!(spent, vec![("work", 1), ("home", 90)]);
}

#[test]
fn other_users_are_excluded() {
    let now = noon(day(2024, 4, 30));
    let mut mine = task_in("work", "mine");
    mine.user_id = Some(ACTOR.to_string());
    let mut theirs = task_in("work", "theirs");
    theirs.user_id = Some("bob".to_string());
    let shared = task_in("work", "shared");

    let snapshot = compute_snapshot(
        ACTOR,
        &[mine, theirs, shared],
        &lists(),
        &[],
        now,
        DEFAULT_WINDOW_DAYS,
    );
    assert_eq!(snapshot.summary.total_tasks, 2);
}

#[test]
fn window_length_is_configurable() {
    let now = noon(day(2024, 4, 30));
    let snapshot = compute_snapshot(ACTOR, &[], &[], &[], now, 7);
    assert_eq!(snapshot.window_days, 7);
    assert_eq!(snapshot.productivity_trend.len(), 7);
    assert_eq!(snapshot.productivity_trend[0].date, day(2024, 4, 30) - Duration::days(6));
}

#[test]
fn store_analytics_reads_the_snapshot() {
    let planner = TestPlanner::new();
    let store = &planner.store;
    let task = store.create_task(&TaskDraft::named("Measure"), ACTOR).unwrap();
    store.set_completed(&task.id, true, ACTOR).unwrap();
    store.create_task(&TaskDraft::named("Open"), ACTOR).unwrap();

    let snapshot = store.analytics(ACTOR).unwrap();
    assert_eq!(snapshot.summary.total_tasks, 2);
    assert_eq!(snapshot.summary.completion_rate, 50.0);
    assert_eq!(snapshot.tasks_by_list.len(), 1);
    assert_eq!(snapshot.tasks_by_list[0].name, "Inbox");

    let today = snapshot.productivity_trend.last().unwrap();
    assert_eq!(today.created, 2);
    assert_eq!(today.completed, 1);
}
