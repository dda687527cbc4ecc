//! dayplan - personal task planner library
//!
//! This library provides the core of the dayplan CLI: the planner's entity
//! model, the view pipeline that decides which tasks a screen shows, the
//! suggestion scorer, the analytics aggregator and a diff-based activity log.
//!
//! # Core Concepts
//!
//! - **Tasks** live in **lists**, carry **labels**, and own **subtasks** and
//!   **attachments**
//! - **Views** (today, next 7 days, upcoming, all) filter, search and order tasks
//! - **Suggestions** rank open tasks by priority and urgency
//! - **Activity**: every mutation is logged field by field
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.dayplan.toml`
//! - `error`: Error types and result aliases
//! - `model`: Entity records, patches and validation
//! - `search`: Fuzzy string matching behind a similarity trait
//! - `view`: View selection, search and sort pipeline
//! - `suggest`: Priority suggestion scorer
//! - `analytics`: Productivity aggregates
//! - `activity`: Diff-based activity logger, sinks and async dispatch
//! - `store`: File-backed planner store with cascades and ownership
//! - `storage`: File storage and directory management
//! - `lock`: File locking and atomic operations for concurrency safety
//! - `events`: JSONL change events for external consumers
//! - `actor`: Actor identity resolution
//! - `output`: Shared JSON and human output

pub mod activity;
pub mod actor;
pub mod analytics;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod lock;
pub mod model;
pub mod output;
pub mod search;
pub mod storage;
pub mod store;
pub mod suggest;
pub mod view;

pub use error::{Error, Result};
