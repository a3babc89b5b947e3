//! In-memory model of a Terraform configuration file managed by tesync.
//!
//! Only the shapes tesync itself produces are modelled: `provider
//! "thousandeyes"` blocks keyed by alias and `resource` blocks keyed by
//! `(type, name)`. Both maps keep file order so a rewrite stays diff-friendly.

pub mod parser;
pub mod serializer;

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use parser::parse_document;
pub use serializer::{render_block, render_document, render_provider};

/// Provider name used for every managed provider block.
pub const PROVIDER_NAME: &str = "thousandeyes";

/// Variable holding the API token, referenced by every provider block.
pub const TOKEN_VARIABLE: &str = "token";

/// Attribute holding the provider reference inside a resource block.
pub const PROVIDER_ATTRIBUTE: &str = "provider";

/// Attribute holding agent sub-blocks inside a resource block.
pub const AGENTS_ATTRIBUTE: &str = "agents";

/// Ordered attribute map of a block body.
pub type Attributes = IndexMap<String, AttrValue>;

/// Value of a single attribute in a block body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
    String(String),
    Bool(bool),
    Number(serde_json::Number),
    /// Bare symbolic expression such as `thousandeyes.prod` or `var.token`.
    Reference(String),
    /// Quoted string with interpolation, stored exactly as written.
    Template(String),
    List(Vec<AttrValue>),
    /// Repeated nested blocks (`agents { ... }`), one map per block.
    Blocks(Vec<Attributes>),
}

impl AttrValue {
    pub fn string(value: impl Into<String>) -> Self {
        AttrValue::String(value.into())
    }

    pub fn reference(value: impl Into<String>) -> Self {
        AttrValue::Reference(value.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) | AttrValue::Reference(s) | AttrValue::Template(s) => Some(s),
            _ => None,
        }
    }

    /// Text of a scalar the way Terraform would coerce it to a string.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            AttrValue::String(s) | AttrValue::Reference(s) | AttrValue::Template(s) => {
                Some(s.clone())
            }
            AttrValue::Number(n) => Some(n.to_string()),
            AttrValue::Bool(b) => Some(b.to_string()),
            AttrValue::List(_) | AttrValue::Blocks(_) => None,
        }
    }
}

/// Address of a resource block: `resource "<resource_type>" "<name>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub resource_type: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// A `provider "thousandeyes"` block bound to one account group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedProvider {
    pub alias: String,
    pub account_group_id: String,
    pub token: AttrValue,
    /// Any other attributes found in an existing block, kept in order.
    #[serde(default)]
    pub extra: Attributes,
}

impl ManagedProvider {
    pub fn new(alias: impl Into<String>, account_group_id: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            account_group_id: account_group_id.into(),
            token: AttrValue::reference(format!("var.{TOKEN_VARIABLE}")),
            extra: Attributes::new(),
        }
    }

    /// Expression resources use to select this provider.
    pub fn reference(&self) -> String {
        provider_reference(&self.alias)
    }
}

/// `thousandeyes.<alias>`
pub fn provider_reference(alias: &str) -> String {
    format!("{PROVIDER_NAME}.{alias}")
}

/// A `resource` block owned by tesync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedResource {
    pub key: ResourceKey,
    pub attributes: Attributes,
}

impl ManagedResource {
    pub fn new(key: ResourceKey) -> Self {
        Self {
            key,
            attributes: Attributes::new(),
        }
    }

    /// Alias of the provider this resource is bound to, if any.
    pub fn provider_alias(&self) -> Option<&str> {
        let reference = self.attributes.get(PROVIDER_ATTRIBUTE)?.as_str()?;
        let reference = reference
            .strip_prefix("${")
            .and_then(|r| r.strip_suffix('}'))
            .unwrap_or(reference);
        reference
            .strip_prefix(PROVIDER_NAME)
            .and_then(|rest| rest.strip_prefix('.'))
    }

    pub fn set_provider_alias(&mut self, alias: &str) {
        self.attributes.insert(
            PROVIDER_ATTRIBUTE.to_string(),
            AttrValue::reference(provider_reference(alias)),
        );
    }

    /// Overlay `incoming` onto the current attributes. Keys absent from
    /// `incoming` keep their value; existing keys keep their position.
    pub fn merge(&mut self, incoming: Attributes) {
        for (key, value) in incoming {
            self.attributes.insert(key, value);
        }
    }
}

/// Providers and resources read from, and written back to, one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub providers: IndexMap<String, ManagedProvider>,
    pub resources: IndexMap<ResourceKey, ManagedResource>,
}

impl ConfigDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty() && self.resources.is_empty()
    }

    pub fn provider(&self, alias: &str) -> Option<&ManagedProvider> {
        self.providers.get(alias)
    }

    /// First provider bound to `account_group_id`, in file order.
    pub fn provider_for_account_group(&self, account_group_id: &str) -> Option<&ManagedProvider> {
        self.providers
            .values()
            .find(|p| p.account_group_id == account_group_id)
    }

    /// Insert a provider unless its alias is already declared.
    /// Returns `true` when the provider was added.
    pub fn add_provider(&mut self, provider: ManagedProvider) -> bool {
        if self.providers.contains_key(&provider.alias) {
            return false;
        }
        self.providers.insert(provider.alias.clone(), provider);
        true
    }

    pub fn resource(&self, key: &ResourceKey) -> Option<&ManagedResource> {
        self.resources.get(key)
    }

    /// Merge `attributes` into the resource at `key`, creating it if needed.
    pub fn upsert_resource(&mut self, key: ResourceKey, attributes: Attributes) -> &ManagedResource {
        let resource = self
            .resources
            .entry(key.clone())
            .or_insert_with(|| ManagedResource::new(key));
        resource.merge(attributes);
        resource
    }

    /// Remove a resource, keeping the order of the others.
    pub fn remove_resource(&mut self, key: &ResourceKey) -> Option<ManagedResource> {
        self.resources.shift_remove(key)
    }

    /// Resources whose provider alias is not declared in this document.
    pub fn dangling_provider_refs(&self) -> Vec<(ResourceKey, String)> {
        self.resources
            .values()
            .filter_map(|r| {
                let alias = r.provider_alias()?;
                (!self.providers.contains_key(alias))
                    .then(|| (r.key.clone(), alias.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> ResourceKey {
        ResourceKey::new("thousandeyes_http_server", name)
    }

    #[test]
    fn provider_alias_reads_bare_and_interpolated_refs() {
        let mut resource = ManagedResource::new(key("a"));
        resource.set_provider_alias("prod");
        assert_eq!(resource.provider_alias(), Some("prod"));

        resource.attributes.insert(
            PROVIDER_ATTRIBUTE.to_string(),
            AttrValue::string("${thousandeyes.lab}"),
        );
        assert_eq!(resource.provider_alias(), Some("lab"));
    }

    #[test]
    fn merge_keeps_untouched_keys_and_positions() {
        let mut resource = ManagedResource::new(key("a"));
        resource.attributes.insert("url".into(), AttrValue::string("https://a"));
        resource.attributes.insert("interval".into(), AttrValue::Number(60.into()));

        let mut incoming = Attributes::new();
        incoming.insert("interval".into(), AttrValue::Number(120.into()));
        incoming.insert("enabled".into(), AttrValue::Bool(true));
        resource.merge(incoming);

        let keys: Vec<_> = resource.attributes.keys().cloned().collect();
        assert_eq!(keys, ["url", "interval", "enabled"]);
        assert_eq!(
            resource.attributes["interval"],
            AttrValue::Number(120.into())
        );
    }

    #[test]
    fn add_provider_is_first_wins() {
        let mut doc = ConfigDocument::new();
        assert!(doc.add_provider(ManagedProvider::new("prod", "555")));
        assert!(!doc.add_provider(ManagedProvider::new("prod", "999")));
        assert_eq!(doc.provider("prod").unwrap().account_group_id, "555");
        assert_eq!(
            doc.provider_for_account_group("555").map(|p| p.alias.as_str()),
            Some("prod")
        );
    }

    #[test]
    fn remove_resource_preserves_order() {
        let mut doc = ConfigDocument::new();
        for name in ["a", "b", "c"] {
            doc.upsert_resource(key(name), Attributes::new());
        }
        assert!(doc.remove_resource(&key("b")).is_some());
        let names: Vec<_> = doc.resources.keys().map(|k| k.name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn dangling_refs_are_reported() {
        let mut doc = ConfigDocument::new();
        doc.add_provider(ManagedProvider::new("prod", "555"));
        let mut attrs = Attributes::new();
        attrs.insert(
            PROVIDER_ATTRIBUTE.into(),
            AttrValue::reference(provider_reference("lab")),
        );
        doc.upsert_resource(key("a"), attrs);

        assert_eq!(
            doc.dangling_provider_refs(),
            vec![(key("a"), "lab".to_string())]
        );
    }
}
