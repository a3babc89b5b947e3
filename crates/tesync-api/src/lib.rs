//! ThousandEyes API collaborator for tesync.
//!
//! Fetches account groups, tests and agents from the v7 API. Pagination,
//! auth and per-account-group failure isolation live here, so the core only
//! ever sees complete, sorted data.

pub mod client;
pub mod config;
pub mod error;
pub mod fakes;
pub mod models;
pub mod source;

pub use client::ThousandEyesClient;
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use fakes::FakeMonitoringSource;
pub use models::LabeledAgent;
pub use source::{collect_agents, collect_label_index, collect_tests, MonitoringSource};
