//! In-memory [`MonitoringSource`] for tests and offline runs.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tesync_core::{AccountGroup, RemoteTest};

use crate::error::{ApiError, ApiResult};
use crate::models::LabeledAgent;
use crate::source::MonitoringSource;

/// Canned data keyed by account group id. Groups marked failing answer
/// every request with a 500.
#[derive(Debug, Default)]
pub struct FakeMonitoringSource {
    groups: Vec<AccountGroup>,
    tests: BTreeMap<String, Vec<RemoteTest>>,
    agents: BTreeMap<String, Vec<LabeledAgent>>,
    failing: BTreeSet<String>,
}

impl FakeMonitoringSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, group: AccountGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_tests(mut self, account_group_id: &str, tests: Vec<RemoteTest>) -> Self {
        self.tests.insert(account_group_id.to_string(), tests);
        self
    }

    pub fn with_agents(mut self, account_group_id: &str, agents: Vec<LabeledAgent>) -> Self {
        self.agents.insert(account_group_id.to_string(), agents);
        self
    }

    pub fn failing(mut self, account_group_id: &str) -> Self {
        self.failing.insert(account_group_id.to_string());
        self
    }

    fn check(&self, group: &AccountGroup) -> ApiResult<()> {
        if self.failing.contains(&group.id) {
            return Err(ApiError::Status {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MonitoringSource for FakeMonitoringSource {
    async fn account_groups(&self) -> ApiResult<Vec<AccountGroup>> {
        let mut groups = self.groups.clone();
        groups.sort();
        Ok(groups)
    }

    async fn tests(&self, group: &AccountGroup) -> ApiResult<Vec<RemoteTest>> {
        self.check(group)?;
        Ok(self.tests.get(&group.id).cloned().unwrap_or_default())
    }

    async fn agents(&self, group: &AccountGroup) -> ApiResult<Vec<LabeledAgent>> {
        self.check(group)?;
        Ok(self.agents.get(&group.id).cloned().unwrap_or_default())
    }
}
