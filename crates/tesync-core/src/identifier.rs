//! Terraform identifier normalisation.
//!
//! Every identifier tesync emits (provider aliases, resource names) goes
//! through [`normalize`]. The function is pure; [`IdentifierRegistry`] wraps
//! it for callers that need uniqueness across a batch.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

fn disallowed_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s-]").expect("static pattern"))
}

fn separator_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s-]+").expect("static pattern"))
}

/// Lowercase, drop punctuation, collapse whitespace/hyphen runs into `_`
/// and trim underscores. May return an empty string.
fn sanitize(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let stripped = disallowed_chars().replace_all(&lowered, "");
    let joined = separator_runs().replace_all(&stripped, "_");
    joined.trim_matches('_').to_string()
}

fn with_digit_prefix(candidate: String, fallback_prefix: &str) -> String {
    match candidate.chars().next() {
        Some(c) if c.is_numeric() => format!("{fallback_prefix}_{candidate}"),
        _ => candidate,
    }
}

/// Normalise `raw` into a Terraform-friendly identifier.
///
/// * Empty input, or input that sanitises to nothing, becomes `fallback_prefix`.
/// * Identifiers starting with a digit get `fallback_prefix_` prepended.
/// * With `seen`, the result is guaranteed not to be in it: first
///   `base_<hint>` is tried (when a usable hint is given), then `base_2`,
///   `base_3`, ...
///
/// `seen` is never mutated; insert the returned value before the next call.
pub fn normalize(
    raw: &str,
    fallback_prefix: &str,
    seen: Option<&BTreeSet<String>>,
    unique_hint: Option<&str>,
) -> String {
    let sanitized = sanitize(raw);
    let base = if sanitized.is_empty() {
        fallback_prefix.to_string()
    } else {
        sanitized
    };
    let base = with_digit_prefix(base, fallback_prefix);

    let Some(seen) = seen else {
        return base;
    };

    let mut candidate = base.clone();
    if seen.contains(&candidate) {
        if let Some(hint) = unique_hint.map(sanitize).filter(|h| !h.is_empty()) {
            let hinted = with_digit_prefix(format!("{candidate}_{hint}"), fallback_prefix);
            if !seen.contains(&hinted) {
                candidate = hinted;
            }
        }
    }

    let mut suffix = 2u32;
    while seen.contains(&candidate) {
        candidate = with_digit_prefix(format!("{base}_{suffix}"), fallback_prefix);
        suffix += 1;
    }

    candidate
}

/// Accumulates identifiers handed out during one batch.
#[derive(Debug, Clone, Default)]
pub struct IdentifierRegistry {
    fallback_prefix: String,
    seen: BTreeSet<String>,
}

impl IdentifierRegistry {
    pub fn new(fallback_prefix: impl Into<String>) -> Self {
        Self {
            fallback_prefix: fallback_prefix.into(),
            seen: BTreeSet::new(),
        }
    }

    /// Mark an identifier as taken without normalising it.
    pub fn reserve(&mut self, identifier: impl Into<String>) {
        self.seen.insert(identifier.into());
    }

    /// Normalise `raw`, make it unique within this registry and claim it.
    pub fn claim(&mut self, raw: &str, unique_hint: Option<&str>) -> String {
        let identifier = normalize(raw, &self.fallback_prefix, Some(&self.seen), unique_hint);
        self.seen.insert(identifier.clone());
        identifier
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.seen.contains(identifier)
    }
}
