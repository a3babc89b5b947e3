//! HTTP client for the ThousandEyes v7 API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Url;
use serde::de::DeserializeOwned;
use tesync_core::{AccountGroup, RemoteTest};
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{AccountGroupsPage, LabeledAgent, Page};
use crate::source::MonitoringSource;

/// Agent types that can carry labels used for test assignment.
const AGENT_TYPES: &str = "enterprise,enterprise-cluster";

/// Upper bound on pages followed for one listing.
const MAX_PAGES: usize = 1000;

pub struct ThousandEyesClient {
    config: ApiConfig,
    base: Url,
    http: reqwest::Client,
}

impl ThousandEyesClient {
    pub fn new(config: ApiConfig) -> ApiResult<Self> {
        let token = config.token.as_deref().ok_or(ApiError::MissingToken)?;
        let base =
            Url::parse(&config.base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ApiError::Http("token is not a valid header value".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { config, base, http })
    }

    /// Client from environment variables
    pub fn from_env() -> ApiResult<Self> {
        Self::new(ApiConfig::from_env())
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> ApiResult<T> {
        debug!(url = %url, "GET");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Every item of a listing, following `_links.next.href`.
    async fn get_all<T: DeserializeOwned>(&self, first: Url) -> ApiResult<Vec<T>> {
        let mut items = Vec::new();
        let mut url = first;
        for _ in 0..MAX_PAGES {
            let page: Page<T> = self.get_json(url.clone()).await?;
            let next = match page.next_href() {
                Some(href) => Some(
                    url.join(href)
                        .map_err(|e| ApiError::InvalidUrl(e.to_string()))?,
                ),
                None => None,
            };
            items.extend(page.items);
            match next {
                Some(next) if next != url => url = next,
                _ => return Ok(items),
            }
        }
        Err(ApiError::Http(format!(
            "pagination did not finish after {MAX_PAGES} pages"
        )))
    }
}

#[async_trait]
impl MonitoringSource for ThousandEyesClient {
    /// Account groups of the configured organisation, sorted by name.
    async fn account_groups(&self) -> ApiResult<Vec<AccountGroup>> {
        let page: AccountGroupsPage = self.get_json(self.endpoint("account-groups")?).await?;
        let org = self.config.org_name.as_deref();
        let mut groups: Vec<AccountGroup> = page
            .account_groups
            .into_iter()
            .filter(|g| org.is_none() || g.organization_name.as_deref() == org)
            .map(AccountGroup::from)
            .collect();
        groups.sort();
        Ok(groups)
    }

    async fn tests(&self, group: &AccountGroup) -> ApiResult<Vec<RemoteTest>> {
        let mut url = self.endpoint("tests")?;
        url.query_pairs_mut().append_pair("aid", &group.id);
        let tests: Vec<RemoteTest> = self.get_all(url).await?;
        debug!(account_group = %group.name, tests = tests.len(), "fetched tests");
        Ok(tests)
    }

    async fn agents(&self, group: &AccountGroup) -> ApiResult<Vec<LabeledAgent>> {
        let mut url = self.endpoint("agents")?;
        url.query_pairs_mut()
            .append_pair("aid", &group.id)
            .append_pair("agentTypes", AGENT_TYPES);
        let agents: Vec<LabeledAgent> = self.get_all(url).await?;
        debug!(account_group = %group.name, agents = agents.len(), "fetched agents");
        Ok(agents)
    }
}
