//! Wire shapes of the v7 endpoints tesync reads.

use serde::Deserialize;
use tesync_core::{AccountGroup, Agent};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccountGroupsPage {
    #[serde(default)]
    pub account_groups: Vec<AccountGroupRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccountGroupRecord {
    pub account_group_name: String,
    #[serde(deserialize_with = "id_text")]
    pub aid: String,
    #[serde(default)]
    pub organization_name: Option<String>,
}

impl From<AccountGroupRecord> for AccountGroup {
    fn from(record: AccountGroupRecord) -> Self {
        AccountGroup::new(record.account_group_name, record.aid)
    }
}

/// A page of a paginated listing. The item key differs per endpoint.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct Page<T> {
    #[serde(default, alias = "tests", alias = "agents")]
    pub items: Vec<T>,
    #[serde(default, rename = "_links")]
    pub links: Option<Links>,
}

impl<T> Page<T> {
    pub fn next_href(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|l| l.next.as_ref())
            .map(|n| n.href.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Links {
    #[serde(default)]
    pub next: Option<Link>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Link {
    pub href: String,
}

/// An agent together with the names of the labels attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LabeledAgent {
    #[serde(flatten)]
    pub agent: Agent,
    #[serde(default, deserialize_with = "label_names")]
    pub labels: Vec<String>,
}

impl LabeledAgent {
    pub fn new(agent: Agent, labels: &[&str]) -> Self {
        Self {
            agent,
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }
}

fn id_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected id, found {other}"
        ))),
    }
}

/// Labels arrive as `[{"name": "EU-Agents", ...}]`.
fn label_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct LabelRef {
        name: String,
    }
    let labels = Option::<Vec<LabelRef>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(labels.into_iter().map(|l| l.name).collect())
}
