//! Domain model for tesync.
//!
//! - `TestKind`: supported monitor kinds and their resource types
//! - `TestDefinition`: one desired test, as produced by the template/API reader
//! - `AccountGroup`, `Agent`, `AgentsLabel`: account scoping and agent assignment
//! - `RemoteTest`: a test as listed by the API, input to the import workflow

pub mod account;
pub mod remote;
pub mod test_definition;
pub mod test_kind;

pub use account::{AccountGroup, Agent, AgentsLabel, AGENTS_LABEL_SEPARATOR};
pub use remote::RemoteTest;
pub use test_definition::{json_to_attr, snake_case, TestDefinition, BOOKKEEPING_FIELDS};
pub use test_kind::TestKind;

use serde::{Deserialize, Deserializer};

/// Accept ids sent either as JSON strings or numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}
