//! Bootstrap workflow: `import` blocks that adopt existing remote tests.
//!
//! Output is appended to three files in the project directory and is not
//! deduplicated against earlier runs; running twice yields every block
//! twice.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::desired::ImportPlan;
use crate::document::serializer::quote;
use crate::document::{
    provider_reference, render_block, render_provider, AttrValue, Attributes, ManagedProvider,
    PROVIDER_ATTRIBUTE, PROVIDER_NAME, TOKEN_VARIABLE,
};
use crate::error::{Result, SyncError};
use crate::obs;
use crate::store::append_atomic;

pub const VARIABLES_FILE: &str = "variables.tf";
pub const PROVIDERS_FILE: &str = "providers.tf";
pub const IMPORTS_FILE: &str = "imports.tf";

/// Registry source of the provider plugin.
pub const PROVIDER_SOURCE: &str = "thousandeyes/thousandeyes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Write the API token as the variable's default value.
    pub inline_token: bool,
    /// Version constraint for `required_providers`; block omitted when unset.
    pub provider_version: Option<String>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            inline_token: true,
            provider_version: None,
        }
    }
}

/// Paths the generator appended to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFiles {
    pub variables: PathBuf,
    pub providers: PathBuf,
    pub imports: PathBuf,
}

pub struct ImportBlockGenerator {
    token: Option<String>,
    options: ImportOptions,
}

impl ImportBlockGenerator {
    pub fn new(token: Option<String>, options: ImportOptions) -> Self {
        Self { token, options }
    }

    pub fn render_variables(&self) -> String {
        let mut attributes = Attributes::new();
        attributes.insert(
            "description".to_string(),
            AttrValue::string("ThousandEyes API token"),
        );
        attributes.insert("type".to_string(), AttrValue::reference("string"));
        attributes.insert("sensitive".to_string(), AttrValue::Bool(true));
        if self.options.inline_token {
            if let Some(token) = &self.token {
                attributes.insert("default".to_string(), AttrValue::string(token));
            }
        }
        render_block("variable", &[TOKEN_VARIABLE], &attributes)
    }

    /// `required_providers` (when a version is pinned) plus one provider per
    /// account group.
    pub fn render_providers(&self, plan: &ImportPlan) -> String {
        let mut out = String::new();
        if let Some(version) = &self.options.provider_version {
            out.push_str("terraform {\n  required_providers {\n");
            out.push_str(&format!("    {PROVIDER_NAME} = {{\n"));
            out.push_str(&format!("      source  = {}\n", quote(PROVIDER_SOURCE)));
            out.push_str(&format!("      version = {}\n", quote(version)));
            out.push_str("    }\n  }\n}\n\n");
        }
        for account in &plan.accounts {
            let provider = ManagedProvider::new(&account.alias, &account.account_group.id);
            out.push_str(&render_provider(&provider));
        }
        out
    }

    pub fn render_imports(&self, plan: &ImportPlan) -> String {
        let mut out = String::new();
        for account in &plan.accounts {
            for binding in &account.bindings {
                let mut attributes = Attributes::new();
                attributes.insert(
                    PROVIDER_ATTRIBUTE.to_string(),
                    AttrValue::reference(provider_reference(&account.alias)),
                );
                attributes.insert(
                    "to".to_string(),
                    AttrValue::reference(format!(
                        "{}.{}",
                        binding.resource_type, binding.resource_name
                    )),
                );
                attributes.insert("id".to_string(), AttrValue::string(&binding.test_id));
                out.push_str(&render_block("import", &[], &attributes));
            }
        }
        out
    }

    /// Append variable, provider and import blocks under `project_dir`.
    ///
    /// Each file is replaced atomically, but the three appends are not one
    /// transaction. When a later append fails the error is
    /// [`SyncError::ImportIncomplete`] and names the files already written.
    pub fn write(&self, project_dir: &Path, plan: &ImportPlan) -> Result<GeneratedFiles> {
        if self.options.inline_token && self.token.is_some() {
            warn!(
                file = VARIABLES_FILE,
                "API token written as a plain-text variable default; keep this file out of version control"
            );
        }

        let files = GeneratedFiles {
            variables: project_dir.join(VARIABLES_FILE),
            providers: project_dir.join(PROVIDERS_FILE),
            imports: project_dir.join(IMPORTS_FILE),
        };
        let rendered = [
            (&files.variables, self.render_variables()),
            (&files.providers, self.render_providers(plan)),
            (&files.imports, self.render_imports(plan)),
        ];
        let mut appended: Vec<PathBuf> = Vec::new();
        for (path, text) in rendered {
            if let Err(err) = append_atomic(path, &text) {
                if appended.is_empty() {
                    return Err(err);
                }
                warn!(failed = %path.display(), appended = appended.len(), "import files partly written");
                return Err(SyncError::ImportIncomplete {
                    failed: path.clone(),
                    appended,
                    source: Box::new(err),
                });
            }
            appended.push(path.clone());
        }

        obs::emit_import_generated(plan.accounts.len(), plan.binding_count());
        Ok(files)
    }
}
