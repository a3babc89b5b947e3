//! Connection settings for the API client.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.thousandeyes.com/v7/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL, ending in `/`; endpoint paths are joined onto it.
    pub base_url: String,
    pub token: Option<String>,
    /// Only account groups of this organisation are returned.
    pub org_name: Option<String>,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: std::env::var("TE_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            token: env_first(&["TE_API_TOKEN", "API_TOKEN"]),
            org_name: env_first(&["TE_ORG_NAME", "ORG_NAME"]),
            user_agent: format!("tesync/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ApiConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Config for a specific endpoint with nothing read from the environment.
    pub fn new(base_url: &str) -> Self {
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        ApiConfig {
            base_url,
            token: None,
            org_name: None,
            user_agent: format!("tesync/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn with_org(mut self, org: &str) -> Self {
        self.org_name = Some(org.to_string());
        self
    }
}

fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalises_trailing_slash() {
        let config = ApiConfig::new("http://localhost:8080/v7").with_token("t");
        assert_eq!(config.base_url, "http://localhost:8080/v7/");
        assert_eq!(config.token.as_deref(), Some("t"));
        assert_eq!(config.org_name, None);
    }
}
