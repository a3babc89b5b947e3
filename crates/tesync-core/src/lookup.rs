//! Read-only lookups the reconciliation engine consults.
//!
//! Both are supplied by a collaborator (the API client, or an offline
//! snapshot file) and treated as authoritative for the run. The in-memory
//! indexes here implement the traits and double as test fakes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{AccountGroup, Agent};

/// Account group name -> remote id.
pub trait AccountGroupLookup {
    fn account_group_id(&self, name: &str) -> Option<&str>;
}

/// `(label, account group id)` -> agents carrying that label.
pub trait AgentLabelLookup {
    fn agents_for_label(&self, label: &str, account_group_id: &str) -> Option<&[Agent]>;
}

/// Account groups keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountGroupIndex {
    groups: BTreeMap<String, AccountGroup>,
}

impl AccountGroupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, group: AccountGroup) {
        self.groups.insert(group.name.clone(), group);
    }

    pub fn get(&self, name: &str) -> Option<&AccountGroup> {
        self.groups.get(name)
    }

    /// Groups in name order.
    pub fn groups(&self) -> impl Iterator<Item = &AccountGroup> {
        self.groups.values()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Keep only the named groups. Names that do not exist are returned.
    pub fn retain_named<'a>(&mut self, names: &'a [String]) -> Vec<&'a str> {
        let missing = names
            .iter()
            .filter(|n| !self.groups.contains_key(n.as_str()))
            .map(String::as_str)
            .collect();
        self.groups.retain(|name, _| names.iter().any(|n| n == name));
        missing
    }
}

impl FromIterator<AccountGroup> for AccountGroupIndex {
    fn from_iter<I: IntoIterator<Item = AccountGroup>>(iter: I) -> Self {
        let mut index = Self::new();
        for group in iter {
            index.insert(group);
        }
        index
    }
}

impl AccountGroupLookup for AccountGroupIndex {
    fn account_group_id(&self, name: &str) -> Option<&str> {
        self.groups.get(name).map(|g| g.id.as_str())
    }
}

/// One label binding, as stored in snapshot files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelBinding {
    pub label: String,
    pub account_group_id: String,
    pub agents: Vec<Agent>,
}

/// Agents keyed by `(label, account group id)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<LabelBinding>", into = "Vec<LabelBinding>")]
pub struct AgentLabelIndex {
    bindings: BTreeMap<(String, String), Vec<Agent>>,
}

impl AgentLabelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one agent under a label, ignoring duplicates by agent id.
    pub fn add_agent(&mut self, label: &str, account_group_id: &str, agent: Agent) {
        let agents = self
            .bindings
            .entry((label.to_string(), account_group_id.to_string()))
            .or_default();
        if !agents.iter().any(|a| a.id == agent.id) {
            agents.push(agent);
        }
    }

    pub fn insert(&mut self, label: &str, account_group_id: &str, agents: Vec<Agent>) {
        self.bindings
            .insert((label.to_string(), account_group_id.to_string()), agents);
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl AgentLabelLookup for AgentLabelIndex {
    fn agents_for_label(&self, label: &str, account_group_id: &str) -> Option<&[Agent]> {
        self.bindings
            .get(&(label.to_string(), account_group_id.to_string()))
            .map(Vec::as_slice)
    }
}

impl From<Vec<LabelBinding>> for AgentLabelIndex {
    fn from(bindings: Vec<LabelBinding>) -> Self {
        let mut index = Self::new();
        for binding in bindings {
            index.insert(&binding.label, &binding.account_group_id, binding.agents);
        }
        index
    }
}

impl From<AgentLabelIndex> for Vec<LabelBinding> {
    fn from(index: AgentLabelIndex) -> Self {
        index
            .bindings
            .into_iter()
            .map(|((label, account_group_id), agents)| LabelBinding {
                label,
                account_group_id,
                agents,
            })
            .collect()
    }
}

/// Offline snapshot of both lookups, e.g. captured from a previous run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupSnapshot {
    #[serde(default)]
    pub account_groups: Vec<AccountGroup>,
    #[serde(default)]
    pub label_bindings: AgentLabelIndex,
}

impl LookupSnapshot {
    pub fn account_group_index(&self) -> AccountGroupIndex {
        self.account_groups.iter().cloned().collect()
    }
}
