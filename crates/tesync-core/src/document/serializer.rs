//! Writer for the HCL subset tesync manages.
//!
//! Rendering rules: booleans and numbers are bare, strings are quoted and
//! escaped, templates are re-quoted verbatim, references
//! (`thousandeyes.prod`) are bare, and nested blocks
//! are written as repeated sub-blocks at any depth. Fields inside a
//! resource's own `agents` sub-blocks are always bare.

use std::fmt::Write as _;

use super::{
    AttrValue, Attributes, ConfigDocument, ManagedProvider, ManagedResource, AGENTS_ATTRIBUTE,
    PROVIDER_NAME,
};

const INDENT: &str = "  ";

/// Quote a string literal, escaping quotes, backslashes and template openers.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(c);
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn render_value(value: &AttrValue) -> String {
    match value {
        AttrValue::String(s) => quote(s),
        AttrValue::Bool(b) => b.to_string(),
        AttrValue::Number(n) => n.to_string(),
        AttrValue::Reference(r) => r.clone(),
        AttrValue::Template(raw) => format!("\"{raw}\""),
        AttrValue::List(items) => {
            let rendered: Vec<_> = items.iter().map(render_value).collect();
            format!("[{}]", rendered.join(", "))
        }
        AttrValue::Blocks(blocks) => {
            // Only reachable for blocks nested inside a list.
            let rendered: Vec<_> = blocks
                .iter()
                .map(|fields| {
                    let inner: Vec<_> = fields
                        .iter()
                        .map(|(k, v)| format!("{k} = {}", render_value(v)))
                        .collect();
                    format!("{{ {} }}", inner.join(", "))
                })
                .collect();
            format!("[{}]", rendered.join(", "))
        }
    }
}

fn render_bare(value: &AttrValue) -> String {
    match value {
        AttrValue::String(s) => s.clone(),
        other => render_value(other),
    }
}

fn render_body(out: &mut String, attributes: &Attributes, depth: usize) {
    let pad = INDENT.repeat(depth);
    for (name, value) in attributes {
        match value {
            AttrValue::Blocks(blocks) => {
                let bare = depth == 1 && name == AGENTS_ATTRIBUTE;
                for fields in blocks {
                    let _ = writeln!(out, "{pad}{name} {{");
                    if bare {
                        let inner_pad = INDENT.repeat(depth + 1);
                        for (k, v) in fields {
                            let _ = writeln!(out, "{inner_pad}{k} = {}", render_bare(v));
                        }
                    } else {
                        render_body(out, fields, depth + 1);
                    }
                    let _ = writeln!(out, "{pad}}}");
                }
            }
            other => {
                let _ = writeln!(out, "{pad}{name} = {}", render_value(other));
            }
        }
    }
}

/// Render `<keyword> "<label>"... { ... }` followed by a blank line.
pub fn render_block(keyword: &str, labels: &[&str], attributes: &Attributes) -> String {
    let mut out = String::from(keyword);
    for label in labels {
        out.push(' ');
        out.push_str(&quote(label));
    }
    out.push_str(" {\n");
    render_body(&mut out, attributes, 1);
    out.push_str("}\n\n");
    out
}

/// Render one `provider "thousandeyes"` block, followed by a blank line.
pub fn render_provider(provider: &ManagedProvider) -> String {
    let mut attributes = Attributes::new();
    attributes.insert("alias".to_string(), AttrValue::string(&provider.alias));
    attributes.insert("token".to_string(), provider.token.clone());
    attributes.insert(
        "account_group_id".to_string(),
        AttrValue::string(&provider.account_group_id),
    );
    for (k, v) in &provider.extra {
        attributes.insert(k.clone(), v.clone());
    }

    render_block("provider", &[PROVIDER_NAME], &attributes)
}

/// Render one `resource` block, followed by a blank line.
pub fn render_resource(resource: &ManagedResource) -> String {
    render_block(
        "resource",
        &[resource.key.resource_type.as_str(), resource.key.name.as_str()],
        &resource.attributes,
    )
}

/// Render a whole document: providers first, then resources, in map order.
pub fn render_document(doc: &ConfigDocument) -> String {
    let mut out = String::new();
    for provider in doc.providers.values() {
        out.push_str(&render_provider(provider));
    }
    for resource in doc.resources.values() {
        out.push_str(&render_resource(resource));
    }
    out
}
