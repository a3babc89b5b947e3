//! Desired test definitions and their Terraform attribute mapping.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use super::{Agent, TestKind};
use crate::document::{AttrValue, Attributes};

/// Record fields that steer reconciliation and never become attributes.
pub const BOOKKEEPING_FIELDS: [&str; 8] = [
    "testName",
    "type",
    "accountGroupName",
    "agentsLabel",
    "agents",
    "testId",
    "update",
    "delete",
];

/// One test as the desired state describes it.
#[derive(Debug, Clone, PartialEq)]
pub struct TestDefinition {
    pub test_name: String,
    pub test_type: TestKind,
    pub account_group_name: Option<String>,
    /// `"<label> --> <account group>"`, blank when agents are left alone.
    pub agents_label: Option<String>,
    /// Filled by the reconciliation engine from the label binding.
    pub agents: Option<Vec<Agent>>,
    /// Remote id, when known; only used to break identifier collisions.
    pub test_id: Option<String>,
    pub update: bool,
    pub delete: bool,
    /// Type-specific fields in input order, camelCase keys.
    pub payload: Map<String, Value>,
}

impl TestDefinition {
    pub fn new(test_name: impl Into<String>, test_type: TestKind) -> Self {
        Self {
            test_name: test_name.into(),
            test_type,
            account_group_name: None,
            agents_label: None,
            agents: None,
            test_id: None,
            update: false,
            delete: false,
            payload: Map::new(),
        }
    }

    pub fn resource_kind(&self) -> &'static str {
        self.test_type.resource_kind()
    }

    /// `agents_label` with surrounding whitespace removed; `None` when blank.
    pub fn agents_label(&self) -> Option<&str> {
        self.agents_label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }

    /// Terraform attributes for this test: `test_name`, then every non-null
    /// payload field in order with snake_case keys.
    pub fn to_attribute_map(&self) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert("test_name".to_string(), AttrValue::string(&self.test_name));
        for (key, value) in &self.payload {
            if BOOKKEEPING_FIELDS.contains(&key.as_str()) {
                continue;
            }
            let Some(name) = attribute_name(key) else {
                warn!(test = %self.test_name, field = %key, "dropping field whose name is not a valid attribute name");
                continue;
            };
            if let Some(attr) = json_to_attr(value) {
                attributes.insert(name, attr);
            } else if !value.is_null() {
                warn!(test = %self.test_name, field = %key, "dropping field with unsupported shape");
            }
        }
        attributes
    }
}

/// `httpInterval` -> `http_interval`; an underscore goes before every
/// uppercase letter except a leading one.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn attribute_name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("static pattern"))
}

/// snake_case form of a payload key, or `None` when that is not a valid
/// attribute name.
pub fn attribute_name(key: &str) -> Option<String> {
    let name = snake_case(key);
    attribute_name_pattern().is_match(&name).then_some(name)
}

/// Convert a JSON payload value into an attribute value.
///
/// Objects and arrays of objects become nested blocks; `null`, nested arrays
/// and mixed arrays have no attribute form.
pub fn json_to_attr(value: &Value) -> Option<AttrValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(AttrValue::Bool(*b)),
        Value::Number(n) => Some(AttrValue::Number(n.clone())),
        Value::String(s) => Some(AttrValue::String(s.clone())),
        Value::Object(map) => Some(AttrValue::Blocks(vec![object_to_attributes(map)])),
        Value::Array(items) if items.iter().all(Value::is_object) && !items.is_empty() => {
            let blocks = items
                .iter()
                .filter_map(Value::as_object)
                .map(object_to_attributes)
                .collect();
            Some(AttrValue::Blocks(blocks))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Array(_) | Value::Object(_) => None,
                scalar => json_to_attr(scalar),
            })
            .collect::<Option<Vec<_>>>()
            .map(AttrValue::List),
    }
}

fn object_to_attributes(map: &Map<String, Value>) -> Attributes {
    let mut attributes = Attributes::new();
    for (key, value) in map {
        let Some(name) = attribute_name(key) else {
            warn!(field = %key, "dropping nested field whose name is not a valid attribute name");
            continue;
        };
        if let Some(attr) = json_to_attr(value) {
            attributes.insert(name, attr);
        }
    }
    attributes
}
