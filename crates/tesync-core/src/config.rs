//! Run configuration read from the environment.

use std::path::PathBuf;

/// Settings shared by both workflows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// API bearer token; also the default of the generated token variable.
    pub api_token: Option<String>,
    /// Only account groups of this organisation are considered.
    pub org_name: Option<String>,
    /// Directory receiving generated files.
    pub project_path: PathBuf,
    /// Provider version pinned in `required_providers`.
    pub provider_version: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            api_token: env_first(&["TE_API_TOKEN", "API_TOKEN"]),
            org_name: env_first(&["TE_ORG_NAME", "ORG_NAME"]),
            project_path: env_first(&["TERRAFORM_PROJECT_PATH"])
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            provider_version: env_first(&["TE_TF_VERSION"]),
        }
    }
}

impl SyncConfig {
    /// Read from environment variables
    ///
    /// Reads:
    /// - TE_API_TOKEN (fallback API_TOKEN)
    /// - TE_ORG_NAME (fallback ORG_NAME)
    /// - TERRAFORM_PROJECT_PATH (optional, default: ".")
    /// - TE_TF_VERSION (optional)
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.api_token = Some(token.to_string());
        self
    }

    pub fn with_org(mut self, org: &str) -> Self {
        self.org_name = Some(org.to_string());
        self
    }

    pub fn with_project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_path = path.into();
        self
    }

    pub fn with_provider_version(mut self, version: &str) -> Self {
        self.provider_version = Some(version.to_string());
        self
    }
}

/// First non-blank value among `names`.
fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}
