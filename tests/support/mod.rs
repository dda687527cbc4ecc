#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use dayplan::activity::{ActivityLogger, MemorySink};
use dayplan::config::Config;
use dayplan::model::{ActivityAction, ActivityLogEntry, EntityRef, Task};
use dayplan::storage::Storage;
use dayplan::store::PlannerStore;
use tempfile::TempDir;

pub const ACTOR: &str = "alice";

/// Initialized planner in a scratch root, logging into memory.
pub struct TestPlanner {
    pub dir: TempDir,
    pub store: PlannerStore,
    pub sink: Arc<MemorySink>,
}

impl TestPlanner {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let sink = Arc::new(MemorySink::new());
        let logger = ActivityLogger::new(sink.clone());
        let store = PlannerStore::new(Storage::new(dir.path()), config, logger);
        store.init(ACTOR).expect("init planner");
        Self { dir, store, sink }
    }

    pub fn task_entries(&self, task_id: &str) -> Vec<ActivityLogEntry> {
        self.sink
            .entries()
            .into_iter()
            .filter(|entry| entry.entity == EntityRef::Task(task_id.to_string()))
            .collect()
    }

    pub fn actions_for(&self, task_id: &str) -> Vec<ActivityAction> {
        self.task_entries(task_id)
            .into_iter()
            .map(|entry| entry.action)
            .collect()
    }
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("date")
}

/// Local noon of `date`, so day arithmetic never crosses a timezone edge.
pub fn noon(date: NaiveDate) -> DateTime<Utc> {
    Local
        .from_local_datetime(&date.and_hms_opt(12, 0, 0).expect("time"))
        .earliest()
        .expect("local time")
        .with_timezone(&Utc)
}

pub fn task_on(name: &str, date: Option<NaiveDate>) -> Task {
    let mut task = Task::new("inbox", name);
    task.date = date.map(noon);
    task
}

pub fn names(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|task| task.name.as_str()).collect()
}
