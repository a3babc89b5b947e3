//! The monitoring data source and the per-account-group fan-out over it.
//!
//! Fetches for different account groups run concurrently. A group whose
//! fetch fails is logged and contributes nothing; results are returned in
//! account-group order whatever order the requests complete in.

use async_trait::async_trait;
use futures::future::join_all;
use tesync_core::{AccountGroup, AgentLabelIndex, RemoteTest};
use tracing::{info, warn};

use crate::error::ApiResult;
use crate::models::LabeledAgent;

/// Read-only access to account groups, tests and agents.
#[async_trait]
pub trait MonitoringSource: Send + Sync {
    async fn account_groups(&self) -> ApiResult<Vec<AccountGroup>>;

    async fn tests(&self, group: &AccountGroup) -> ApiResult<Vec<RemoteTest>>;

    async fn agents(&self, group: &AccountGroup) -> ApiResult<Vec<LabeledAgent>>;
}

fn sorted(groups: &[AccountGroup]) -> Vec<AccountGroup> {
    let mut groups = groups.to_vec();
    groups.sort();
    groups
}

/// Remote tests per account group, input to the import plan.
pub async fn collect_tests(
    source: &dyn MonitoringSource,
    groups: &[AccountGroup],
) -> Vec<(AccountGroup, Vec<RemoteTest>)> {
    let groups = sorted(groups);
    let results = join_all(groups.iter().map(|g| source.tests(g))).await;

    let mut collected = Vec::new();
    for (group, result) in groups.into_iter().zip(results) {
        match result {
            Ok(tests) => collected.push((group, tests)),
            Err(err) => warn!(
                event = "account_group.failed",
                account_group = %group.name,
                error = %err,
                "failed to retrieve tests"
            ),
        }
    }
    let total: usize = collected.iter().map(|(_, t)| t.len()).sum();
    info!(event = "tests.fetched", account_groups = collected.len(), tests = total);
    collected
}

/// Label bindings `(label, account group id) -> agents` for `groups`.
pub async fn collect_label_index(
    source: &dyn MonitoringSource,
    groups: &[AccountGroup],
) -> AgentLabelIndex {
    let groups = sorted(groups);
    let results = join_all(groups.iter().map(|g| source.agents(g))).await;

    let mut index = AgentLabelIndex::new();
    for (group, result) in groups.iter().zip(results) {
        match result {
            Ok(agents) => {
                for labeled in agents {
                    for label in &labeled.labels {
                        index.add_agent(label, &group.id, labeled.agent.clone());
                    }
                }
            }
            Err(err) => warn!(
                event = "account_group.failed",
                account_group = %group.name,
                error = %err,
                "failed to retrieve agents"
            ),
        }
    }
    index
}

/// Every agent per account group, for listings.
pub async fn collect_agents(
    source: &dyn MonitoringSource,
    groups: &[AccountGroup],
) -> Vec<(AccountGroup, Vec<LabeledAgent>)> {
    let groups = sorted(groups);
    let results = join_all(groups.iter().map(|g| source.agents(g))).await;

    groups
        .into_iter()
        .zip(results)
        .filter_map(|(group, result)| match result {
            Ok(agents) => Some((group, agents)),
            Err(err) => {
                warn!(
                    event = "account_group.failed",
                    account_group = %group.name,
                    error = %err,
                    "failed to retrieve agents"
                );
                None
            }
        })
        .collect()
}
