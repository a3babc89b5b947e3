//! Structured observability hooks for sync runs.
//!
//! Every helper logs with a stable `event` field so runs can be followed in
//! JSON log output (`--json`), e.g. `event=definition.processed`.

use std::path::Path;

use tracing::{info, warn};

/// RAII guard entering a span tagged with the workflow name for a run.
///
/// ```ignore
/// let _span = RunSpan::enter("reconcile");
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(workflow: &str) -> Self {
        let span = tracing::info_span!("tesync.run", workflow = %workflow);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_reconcile_started(definitions: usize, account_groups: usize) {
    info!(
        event = "reconcile.started",
        definitions = definitions,
        account_groups = account_groups,
    );
}

/// Progress for one definition: `position` is 1-based.
pub fn emit_definition_processed(position: usize, total: usize, address: &str, action: &str) {
    info!(
        event = "definition.processed",
        position = position,
        total = total,
        address = %address,
        action = %action,
    );
}

pub fn emit_definition_skipped(reference: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "definition.skipped", reference = %reference, reason = %reason);
}

pub fn emit_provider_created(alias: &str, account_group_id: &str) {
    info!(
        event = "provider.created",
        alias = %alias,
        account_group_id = %account_group_id,
    );
}

pub fn emit_dangling_provider(address: &str, alias: &str) {
    warn!(event = "provider.dangling", address = %address, alias = %alias);
}

pub fn emit_document_written(path: &Path, providers: usize, resources: usize) {
    info!(
        event = "document.written",
        path = %path.display(),
        providers = providers,
        resources = resources,
    );
}

pub fn emit_import_generated(account_groups: usize, imports: usize) {
    info!(
        event = "import.generated",
        account_groups = account_groups,
        imports = imports,
    );
}

/// Warning level: a fatal condition stopped the run before any write.
pub fn emit_run_aborted(error: &dyn std::fmt::Display) {
    warn!(event = "run.aborted", error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_do_not_panic_without_subscriber() {
        let _span = RunSpan::enter("reconcile");
        emit_reconcile_started(3, 1);
        emit_definition_processed(1, 3, "thousandeyes_api.a", "update");
        emit_definition_skipped("api/a", &"missing name");
        emit_provider_created("prod", "555");
        emit_dangling_provider("thousandeyes_api.a", "lab");
        emit_document_written(Path::new("main.tf"), 1, 2);
        emit_import_generated(1, 4);
        emit_run_aborted(&"boom");
    }
}
