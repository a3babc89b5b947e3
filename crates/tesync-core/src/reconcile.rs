//! Reconciliation engine: merges desired test definitions into an existing
//! configuration document.
//!
//! The whole run happens in memory. A fatal condition (delete of an absent
//! resource) returns an error before the caller has anything to write, so
//! the target file stays untouched.

use std::collections::BTreeMap;

use serde_json::Number;

use crate::desired::{owning_account_group, DesiredState, SkippedRecord, ALIAS_PREFIX, RESOURCE_PREFIX};
use crate::document::{
    provider_reference, AttrValue, Attributes, ConfigDocument, ManagedProvider, ResourceKey,
    AGENTS_ATTRIBUTE, PROVIDER_ATTRIBUTE,
};
use crate::domain::{Agent, AgentsLabel, TestDefinition};
use crate::error::{Result, SyncError, ValidationError};
use crate::identifier::IdentifierRegistry;
use crate::lookup::{AccountGroupLookup, AgentLabelLookup};
use crate::obs;

/// What one reconcile run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// Aliases of providers added this run.
    pub providers_created: Vec<String>,
    pub updated: Vec<ResourceKey>,
    pub deleted: Vec<ResourceKey>,
    /// Definitions with neither flag set.
    pub unchanged: usize,
    pub skipped: Vec<SkippedRecord>,
}

impl ReconcileReport {
    pub fn has_changes(&self) -> bool {
        !(self.providers_created.is_empty() && self.updated.is_empty() && self.deleted.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub document: ConfigDocument,
    pub report: ReconcileReport,
}

/// Assigns provider aliases to account groups, reusing declared providers.
struct ProviderAliases {
    registry: IdentifierRegistry,
    by_group: BTreeMap<String, String>,
}

impl ProviderAliases {
    fn seeded_from(document: &ConfigDocument) -> Self {
        let mut registry = IdentifierRegistry::new(ALIAS_PREFIX);
        for alias in document.providers.keys() {
            registry.reserve(alias.clone());
        }
        Self {
            registry,
            by_group: BTreeMap::new(),
        }
    }

    fn resolve(
        &mut self,
        group_name: &str,
        account_groups: &dyn AccountGroupLookup,
        document: &mut ConfigDocument,
        report: &mut ReconcileReport,
    ) -> std::result::Result<String, ValidationError> {
        if let Some(alias) = self.by_group.get(group_name) {
            return Ok(alias.clone());
        }
        let id = account_groups
            .account_group_id(group_name)
            .ok_or_else(|| ValidationError::UnknownAccountGroup(group_name.to_string()))?;

        let alias = match document.provider_for_account_group(id) {
            Some(existing) => existing.alias.clone(),
            None => {
                let alias = self.registry.claim(group_name, Some(id));
                document.add_provider(ManagedProvider::new(&alias, id));
                obs::emit_provider_created(&alias, id);
                report.providers_created.push(alias.clone());
                alias
            }
        };
        self.by_group.insert(group_name.to_string(), alias.clone());
        Ok(alias)
    }
}

/// Merges desired state into a document using two read-only lookups.
pub struct ReconciliationEngine<'a> {
    account_groups: &'a dyn AccountGroupLookup,
    agent_labels: &'a dyn AgentLabelLookup,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(
        account_groups: &'a dyn AccountGroupLookup,
        agent_labels: &'a dyn AgentLabelLookup,
    ) -> Self {
        Self {
            account_groups,
            agent_labels,
        }
    }

    /// Apply every desired definition to `document`.
    ///
    /// Definitions are visited in [`DesiredState::ordered`] order so that
    /// generated names do not depend on input order. Every valid definition
    /// claims its resource name, including ones that change nothing.
    ///
    /// # Errors
    ///
    /// [`SyncError::ResourceNotFound`] when a delete targets a resource the
    /// document does not contain.
    pub fn reconcile(
        &self,
        document: ConfigDocument,
        desired: &DesiredState,
    ) -> Result<ReconcileOutcome> {
        let mut document = document;
        let mut report = ReconcileReport {
            skipped: desired.skipped.clone(),
            ..ReconcileReport::default()
        };
        obs::emit_reconcile_started(desired.definitions.len(), desired.account_groups.len());

        let mut aliases = ProviderAliases::seeded_from(&document);
        for group in &desired.account_groups {
            if let Err(err) = aliases.resolve(group, self.account_groups, &mut document, &mut report) {
                report
                    .skipped
                    .push(SkippedRecord::new(format!("account group {group}"), err));
            }
        }

        let mut names = IdentifierRegistry::new(RESOURCE_PREFIX);
        let ordered = desired.ordered();
        let total = ordered.len();

        for (index, def) in ordered.into_iter().enumerate() {
            let name = names.claim(&def.test_name, def.test_id.as_deref());
            let key = ResourceKey::new(def.resource_kind(), name);
            let address = key.to_string();

            let action = if def.delete {
                document
                    .remove_resource(&key)
                    .ok_or_else(|| SyncError::ResourceNotFound {
                        resource_type: key.resource_type.clone(),
                        resource_name: key.name.clone(),
                    })?;
                report.deleted.push(key);
                "delete"
            } else if def.update {
                match self.update_attributes(def, &key, &mut aliases, &mut document, &mut report) {
                    Ok(attributes) => {
                        document.upsert_resource(key.clone(), attributes);
                        report.updated.push(key);
                        "update"
                    }
                    Err(err) => {
                        report.skipped.push(SkippedRecord::new(&address, err));
                        "skip"
                    }
                }
            } else {
                report.unchanged += 1;
                "unchanged"
            };
            obs::emit_definition_processed(index + 1, total, &address, action);
        }

        for (key, alias) in document.dangling_provider_refs() {
            obs::emit_dangling_provider(&key.to_string(), &alias);
        }

        Ok(ReconcileOutcome { document, report })
    }

    /// Attributes an update writes: provider first, then the payload, then
    /// `agents` when a label applies.
    fn update_attributes(
        &self,
        def: &TestDefinition,
        key: &ResourceKey,
        aliases: &mut ProviderAliases,
        document: &mut ConfigDocument,
        report: &mut ReconcileReport,
    ) -> std::result::Result<Attributes, ValidationError> {
        let resolved = self.resolve_agents(def)?;

        let alias = match owning_account_group(&resolved) {
            Some(group) => aliases.resolve(&group, self.account_groups, document, report)?,
            // No group named anywhere: stay on the provider the resource already uses.
            None => document
                .resource(key)
                .and_then(|r| r.provider_alias())
                .filter(|alias| document.provider(alias).is_some())
                .map(str::to_string)
                .ok_or_else(|| ValidationError::MissingField {
                    field: "accountGroupName".to_string(),
                })?,
        };

        let mut attributes = Attributes::new();
        attributes.insert(
            PROVIDER_ATTRIBUTE.to_string(),
            AttrValue::reference(provider_reference(&alias)),
        );
        attributes.extend(resolved.to_attribute_map());
        if let Some(agents) = &resolved.agents {
            attributes.insert(AGENTS_ATTRIBUTE.to_string(), agents_attribute(agents));
        }
        Ok(attributes)
    }

    /// A copy of `def` with `agents` filled from its label binding. Left
    /// unset for a blank label and for kinds that carry no agents.
    fn resolve_agents(&self, def: &TestDefinition) -> std::result::Result<TestDefinition, ValidationError> {
        let mut resolved = def.clone();
        resolved.agents = None;
        if !def.test_type.carries_agents() {
            return Ok(resolved);
        }
        let Some(label) = AgentsLabel::parse(def.agents_label().unwrap_or(""))? else {
            return Ok(resolved);
        };
        let id = self
            .account_groups
            .account_group_id(&label.account_group)
            .ok_or_else(|| ValidationError::UnknownAccountGroup(label.account_group.clone()))?;
        let agents = self
            .agent_labels
            .agents_for_label(&label.label, id)
            .map(<[Agent]>::to_vec)
            .unwrap_or_default();
        resolved.agents = Some(agents);
        Ok(resolved)
    }
}

/// One `agents { agent_id = N }` block per agent.
fn agents_attribute(agents: &[Agent]) -> AttrValue {
    let blocks = agents
        .iter()
        .map(|agent| {
            let id = match agent.id.parse::<i64>() {
                Ok(n) => AttrValue::Number(Number::from(n)),
                Err(_) => AttrValue::string(&agent.id),
            };
            let mut block = Attributes::new();
            block.insert("agent_id".to_string(), id);
            block
        })
        .collect();
    AttrValue::Blocks(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desired::DesiredStateBuilder;
    use crate::document::{parse_document, render_document};
    use crate::domain::{AccountGroup, TestKind};
    use crate::lookup::{AccountGroupIndex, AgentLabelIndex};
    use serde_json::json;

    fn lookups() -> (AccountGroupIndex, AgentLabelIndex) {
        let groups: AccountGroupIndex = [
            AccountGroup::new("Prod", "555"),
            AccountGroup::new("Lab", "42"),
        ]
        .into_iter()
        .collect();
        let mut labels = AgentLabelIndex::new();
        labels.add_agent("EU-Agents", "555", Agent::new("9"));
        (groups, labels)
    }

    fn checkout(update: bool) -> TestDefinition {
        let mut def = TestDefinition::new("Checkout", TestKind::HttpServer);
        def.agents_label = Some("EU-Agents --> Prod".to_string());
        def.update = update;
        def
    }

    fn state(defs: Vec<TestDefinition>) -> DesiredState {
        let mut builder = DesiredStateBuilder::new();
        for def in defs {
            builder.add_definition(def);
        }
        builder.build()
    }

    #[test]
    fn creates_provider_and_resource_from_label() {
        let (groups, labels) = lookups();
        let engine = ReconciliationEngine::new(&groups, &labels);

        let outcome = engine
            .reconcile(ConfigDocument::new(), &state(vec![checkout(true)]))
            .unwrap();

        let provider = outcome.document.provider("prod").unwrap();
        assert_eq!(provider.account_group_id, "555");
        let resource = outcome
            .document
            .resource(&ResourceKey::new("thousandeyes_http_server", "checkout"))
            .unwrap();
        assert_eq!(resource.provider_alias(), Some("prod"));
        assert_eq!(
            resource.attributes[AGENTS_ATTRIBUTE],
            AttrValue::Blocks(vec![[("agent_id".to_string(), AttrValue::Number(9.into()))]
                .into_iter()
                .collect()])
        );
        assert_eq!(outcome.report.providers_created, ["prod"]);
    }

    #[test]
    fn blank_label_preserves_existing_agents() {
        let (groups, labels) = lookups();
        let engine = ReconciliationEngine::new(&groups, &labels);
        let existing = parse_document(
            r#"
provider "thousandeyes" {
  alias            = "prod"
  token            = var.token
  account_group_id = "555"
}

resource "thousandeyes_http_server" "checkout" {
  provider  = thousandeyes.prod
  test_name = "Checkout"
  interval  = 60
  agents {
    agent_id = 9
  }
}
"#,
        )
        .unwrap();

        let mut def = TestDefinition::new("Checkout", TestKind::HttpServer);
        def.update = true;
        def.agents_label = Some("  ".to_string());
        def.payload.insert("interval".to_string(), json!(120));

        let outcome = engine.reconcile(existing, &state(vec![def])).unwrap();
        let resource = outcome
            .document
            .resource(&ResourceKey::new("thousandeyes_http_server", "checkout"))
            .unwrap();
        assert_eq!(resource.attributes["interval"], AttrValue::Number(120.into()));
        assert!(matches!(
            &resource.attributes[AGENTS_ATTRIBUTE],
            AttrValue::Blocks(blocks) if blocks.len() == 1
        ));
        assert_eq!(resource.provider_alias(), Some("prod"));
        assert!(outcome.report.providers_created.is_empty());
    }

    #[test]
    fn label_without_binding_clears_agents() {
        let (groups, labels) = lookups();
        let engine = ReconciliationEngine::new(&groups, &labels);
        let mut def = checkout(true);
        def.agents_label = Some("US-Agents --> Prod".to_string());

        let outcome = engine.reconcile(ConfigDocument::new(), &state(vec![def])).unwrap();
        let text = render_document(&outcome.document);
        assert!(!text.contains("agents {"));
    }

    #[test]
    fn delete_of_absent_resource_is_fatal() {
        let (groups, labels) = lookups();
        let engine = ReconciliationEngine::new(&groups, &labels);
        let mut def = checkout(false);
        def.delete = true;

        let err = engine
            .reconcile(ConfigDocument::new(), &state(vec![def]))
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::ResourceNotFound { ref resource_name, .. } if resource_name == "checkout"
        ));
    }

    #[test]
    fn delete_wins_over_update() {
        let (groups, labels) = lookups();
        let engine = ReconciliationEngine::new(&groups, &labels);
        let first = engine
            .reconcile(ConfigDocument::new(), &state(vec![checkout(true)]))
            .unwrap();

        let mut def = checkout(true);
        def.delete = true;
        let second = engine.reconcile(first.document, &state(vec![def])).unwrap();
        assert!(second.document.resources.is_empty());
        assert_eq!(second.report.deleted.len(), 1);
        // providers are never removed
        assert!(second.document.provider("prod").is_some());
    }

    #[test]
    fn unflagged_definitions_are_noops_but_claim_names() {
        let (groups, labels) = lookups();
        let engine = ReconciliationEngine::new(&groups, &labels);
        let mut idle = checkout(false);
        idle.test_id = Some("1".to_string());
        let mut active = checkout(true);
        active.test_id = Some("2".to_string());

        let outcome = engine
            .reconcile(ConfigDocument::new(), &state(vec![active, idle]))
            .unwrap();
        assert_eq!(outcome.report.unchanged, 1);
        assert_eq!(
            outcome.report.updated,
            [ResourceKey::new("thousandeyes_http_server", "checkout_2")]
        );
    }

    #[test]
    fn bgp_uses_account_group_name_and_skips_agents() {
        let (groups, labels) = lookups();
        let engine = ReconciliationEngine::new(&groups, &labels);
        let mut def = TestDefinition::new("Core Routes", TestKind::Bgp);
        def.account_group_name = Some("Lab".to_string());
        def.agents_label = Some("EU-Agents --> Prod".to_string());
        def.update = true;

        let outcome = engine.reconcile(ConfigDocument::new(), &state(vec![def])).unwrap();
        let resource = outcome
            .document
            .resource(&ResourceKey::new("thousandeyes_bgp", "core_routes"))
            .unwrap();
        assert_eq!(resource.provider_alias(), Some("lab"));
        assert!(!resource.attributes.contains_key(AGENTS_ATTRIBUTE));
    }

    #[test]
    fn unknown_account_group_skips_definition() {
        let (groups, labels) = lookups();
        let engine = ReconciliationEngine::new(&groups, &labels);
        let mut def = checkout(true);
        def.agents_label = Some("EU-Agents --> Staging".to_string());

        let outcome = engine.reconcile(ConfigDocument::new(), &state(vec![def])).unwrap();
        assert!(outcome.document.resources.is_empty());
        // once for the group, once for the definition
        assert_eq!(outcome.report.skipped.len(), 2);
        assert!(!outcome.report.has_changes());
    }

    #[test]
    fn existing_provider_for_group_is_reused() {
        let (groups, labels) = lookups();
        let engine = ReconciliationEngine::new(&groups, &labels);
        let mut existing = ConfigDocument::new();
        existing.add_provider(ManagedProvider::new("production", "555"));

        let outcome = engine
            .reconcile(existing, &state(vec![checkout(true)]))
            .unwrap();
        assert_eq!(outcome.document.providers.len(), 1);
        let resource = outcome.document.resources.values().next().unwrap();
        assert_eq!(resource.provider_alias(), Some("production"));
    }

    #[test]
    fn new_alias_avoids_existing_aliases() {
        let (groups, labels) = lookups();
        let engine = ReconciliationEngine::new(&groups, &labels);
        let mut existing = ConfigDocument::new();
        existing.add_provider(ManagedProvider::new("prod", "999"));

        let outcome = engine
            .reconcile(existing, &state(vec![checkout(true)]))
            .unwrap();
        assert_eq!(outcome.report.providers_created, ["prod_555"]);
    }
}
