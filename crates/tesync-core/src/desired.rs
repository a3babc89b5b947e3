//! Builds the core's view of desired state from collaborator records.
//!
//! Two inputs are supported:
//! - validated template/API records (JSON objects) for the reconcile workflow
//! - remote test listings per account group for the import workflow
//!
//! Malformed records are skipped and reported, never fatal.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::domain::{AccountGroup, AgentsLabel, RemoteTest, TestDefinition, TestKind};
use crate::error::ValidationError;
use crate::identifier::IdentifierRegistry;
use crate::obs;

/// Fallback prefix for provider aliases.
pub const ALIAS_PREFIX: &str = "account";

/// Fallback prefix for resource names.
pub const RESOURCE_PREFIX: &str = "test";

/// A record that was left out, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub reference: String,
    pub reason: String,
}

impl SkippedRecord {
    pub fn new(reference: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        let skipped = Self {
            reference: reference.into(),
            reason: reason.to_string(),
        };
        obs::emit_definition_skipped(&skipped.reference, &skipped.reason);
        skipped
    }
}

/// Desired tests plus the account groups they touch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredState {
    pub definitions: Vec<TestDefinition>,
    pub account_groups: BTreeSet<String>,
    pub skipped: Vec<SkippedRecord>,
}

impl DesiredState {
    /// Definitions in processing order: owning account group, then test
    /// name, then test id. Identifier assignment depends on this order.
    pub fn ordered(&self) -> Vec<&TestDefinition> {
        let mut ordered: Vec<_> = self.definitions.iter().collect();
        ordered.sort_by(|a, b| compare_definitions(a, b));
        ordered
    }
}

/// Account group a definition belongs to for ordering purposes: the
/// label's group when a valid label applies, else `accountGroupName`.
pub fn owning_account_group(def: &TestDefinition) -> Option<String> {
    if def.test_type.carries_agents() {
        if let Ok(Some(label)) = AgentsLabel::parse(def.agents_label().unwrap_or("")) {
            return Some(label.account_group);
        }
    }
    def.account_group_name
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
}

fn compare_definitions(a: &TestDefinition, b: &TestDefinition) -> Ordering {
    let group = |d: &TestDefinition| owning_account_group(d).unwrap_or_default();
    group(a)
        .cmp(&group(b))
        .then_with(|| a.test_name.cmp(&b.test_name))
        .then_with(|| a.test_id.cmp(&b.test_id))
}

/// One `import` binding for the bootstrap workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    pub resource_type: String,
    pub resource_name: String,
    pub test_id: String,
    pub test_name: String,
}

/// All bindings for one account group, under the alias of its provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountImport {
    pub alias: String,
    pub account_group: AccountGroup,
    pub bindings: Vec<ImportBinding>,
}

/// Input of the import block generator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportPlan {
    pub accounts: Vec<AccountImport>,
    pub skipped: Vec<SkippedRecord>,
}

impl ImportPlan {
    pub fn binding_count(&self) -> usize {
        self.accounts.iter().map(|a| a.bindings.len()).sum()
    }
}

/// Accumulates desired definitions from collaborator records.
#[derive(Debug, Default)]
pub struct DesiredStateBuilder {
    state: DesiredState,
}

impl DesiredStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a desired state from a batch of records in one go.
    pub fn from_records(records: &[Value]) -> DesiredState {
        let mut builder = Self::new();
        for (position, record) in records.iter().enumerate() {
            builder.add_record(position, record);
        }
        builder.build()
    }

    /// Validate and add one record; invalid records are recorded as skipped.
    /// `position` identifies the record in messages.
    pub fn add_record(&mut self, position: usize, record: &Value) {
        match definition_from_record(record) {
            Ok(def) => self.add_definition(def),
            Err(err) => {
                let reference = record
                    .get("testName")
                    .and_then(Value::as_str)
                    .map(|name| format!("record {position} ({name})"))
                    .unwrap_or_else(|| format!("record {position}"));
                self.state.skipped.push(SkippedRecord::new(reference, err));
            }
        }
    }

    pub fn add_definition(&mut self, def: TestDefinition) {
        if let Some(group) = def
            .account_group_name
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
        {
            self.state.account_groups.insert(group.to_string());
        }
        if let Ok(Some(label)) = AgentsLabel::parse(def.agents_label.as_deref().unwrap_or("")) {
            self.state.account_groups.insert(label.account_group);
        }
        self.state.definitions.push(def);
    }

    /// Ask for a provider for `name` even if no definition references it.
    pub fn add_account_group(&mut self, name: impl Into<String>) {
        self.state.account_groups.insert(name.into());
    }

    pub fn build(self) -> DesiredState {
        self.state
    }

    /// Turn remote test listings into import bindings.
    ///
    /// Foreign (shared / saved-event) tests are dropped silently; tests with
    /// incomplete metadata or an unknown type are skipped with a warning.
    /// Aliases and resource names are assigned in the same stable order the
    /// reconcile workflow uses.
    pub fn import_plan(groups: Vec<(AccountGroup, Vec<RemoteTest>)>) -> ImportPlan {
        let mut groups = groups;
        groups.sort_by(|(a, _), (b, _)| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        let mut aliases = IdentifierRegistry::new(ALIAS_PREFIX);
        let mut names = IdentifierRegistry::new(RESOURCE_PREFIX);
        let mut plan = ImportPlan::default();

        for (group, tests) in groups {
            let alias = aliases.claim(&group.name, Some(&group.id));
            let mut accepted = Vec::new();
            for test in tests.into_iter().filter(|t| !t.is_foreign()) {
                match validate_remote(&test) {
                    Ok(found) => accepted.push(found),
                    Err(err) => {
                        let reference = format!(
                            "{} / {}",
                            group.name,
                            test.test_name.as_deref().unwrap_or("<unnamed>")
                        );
                        plan.skipped.push(SkippedRecord::new(reference, err));
                    }
                }
            }
            accepted.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

            let bindings = accepted
                .into_iter()
                .map(|(test_id, test_name, kind)| ImportBinding {
                    resource_type: kind.resource_kind().to_string(),
                    resource_name: names.claim(&test_name, Some(&test_id)),
                    test_id,
                    test_name,
                })
                .collect();

            plan.accounts.push(AccountImport {
                alias,
                account_group: group,
                bindings,
            });
        }
        plan
    }
}

fn validate_remote(test: &RemoteTest) -> Result<(String, String, TestKind), ValidationError> {
    let missing = |field: &str| ValidationError::MissingField {
        field: field.to_string(),
    };
    let test_type = non_blank(test.test_type.as_deref()).ok_or_else(|| missing("type"))?;
    let test_id = non_blank(test.test_id.as_deref()).ok_or_else(|| missing("testId"))?;
    let test_name = non_blank(test.test_name.as_deref()).ok_or_else(|| missing("testName"))?;
    let kind = test_type.parse::<TestKind>()?;
    Ok((test_id.to_string(), test_name.to_string(), kind))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn text_field(map: &Map<String, Value>, field: &str) -> Option<String> {
    match map.get(field)? {
        Value::String(s) => non_blank(Some(s)).map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Template checkboxes arrive as booleans, numbers or words.
fn flag_field(map: &Map<String, Value>, field: &str) -> bool {
    match map.get(field) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "y" | "x" | "1"
        ),
        _ => false,
    }
}

/// Validate one template/API record into a [`TestDefinition`].
pub fn definition_from_record(record: &Value) -> Result<TestDefinition, ValidationError> {
    let map = record.as_object().ok_or(ValidationError::NotAnObject)?;
    let missing = |field: &str| ValidationError::MissingField {
        field: field.to_string(),
    };

    let test_name = text_field(map, "testName").ok_or_else(|| missing("testName"))?;
    let test_type = text_field(map, "type")
        .ok_or_else(|| missing("type"))?
        .parse::<TestKind>()?;

    let agents_label = text_field(map, "agentsLabel");
    if let Some(label) = &agents_label {
        AgentsLabel::parse(label)?;
    }

    let payload = map
        .iter()
        .filter(|(k, _)| !crate::domain::BOOKKEEPING_FIELDS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(TestDefinition {
        test_name,
        test_type,
        account_group_name: text_field(map, "accountGroupName"),
        agents_label,
        agents: None,
        test_id: text_field(map, "testId"),
        update: flag_field(map, "update"),
        delete: flag_field(map, "delete"),
        payload,
    })
}
