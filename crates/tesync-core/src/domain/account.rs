//! Account groups, agents and agent-label bindings.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Separator between label name and account group in an agents label.
pub const AGENTS_LABEL_SEPARATOR: &str = "-->";

/// A ThousandEyes account group (remote tenant).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountGroup {
    pub name: String,
    pub id: String,
}

impl AccountGroup {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// A monitoring agent as returned by the agents endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    #[serde(alias = "agentId", deserialize_with = "crate::domain::string_or_number")]
    pub id: String,
    #[serde(default, alias = "agentName", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Agent {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            agent_type: None,
            location: None,
        }
    }
}

/// Parsed form of `"<label> --> <account group>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentsLabel {
    pub label: String,
    pub account_group: String,
}

impl AgentsLabel {
    /// `Ok(None)` for a blank label; an error when the separator or either
    /// side is missing.
    pub fn parse(raw: &str) -> Result<Option<Self>, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let malformed = || ValidationError::MalformedAgentsLabel(raw.to_string());
        let (label, account_group) = trimmed
            .split_once(AGENTS_LABEL_SEPARATOR)
            .ok_or_else(malformed)?;
        let (label, account_group) = (label.trim(), account_group.trim());
        if label.is_empty() || account_group.is_empty() {
            return Err(malformed());
        }
        Ok(Some(Self {
            label: label.to_string(),
            account_group: account_group.to_string(),
        }))
    }
}
