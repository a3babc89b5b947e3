//! ThousandEyesClient against a stubbed v7 API.

use serde_json::json;
use tesync_api::{
    collect_label_index, collect_tests, ApiConfig, ApiError, MonitoringSource, ThousandEyesClient,
};
use tesync_core::{AccountGroup, AgentLabelLookup};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ThousandEyesClient {
    let config = ApiConfig::new(&format!("{}/v7", server.uri()))
        .with_token("secret")
        .with_org("Acme");
    ThousandEyesClient::new(config).unwrap()
}

#[tokio::test]
async fn account_groups_are_filtered_by_org_and_sorted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v7/account-groups"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accountGroups": [
                {"accountGroupName": "Prod", "aid": 555, "organizationName": "Acme"},
                {"accountGroupName": "Other", "aid": "7", "organizationName": "Elsewhere"},
                {"accountGroupName": "Lab", "aid": "42", "organizationName": "Acme"}
            ]
        })))
        .mount(&server)
        .await;

    let groups = client(&server).account_groups().await.unwrap();
    assert_eq!(
        groups,
        vec![AccountGroup::new("Lab", "42"), AccountGroup::new("Prod", "555")]
    );
}

#[tokio::test]
async fn tests_follow_next_links() {
    let server = MockServer::start().await;
    let next = format!("{}/v7/tests?aid=555&cursor=p2", server.uri());
    Mock::given(method("GET"))
        .and(path("/v7/tests"))
        .and(query_param("cursor", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tests": [{"testId": 2, "testName": "Second", "type": "api"}]
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v7/tests"))
        .and(query_param("aid", "555"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tests": [{"testId": 1, "testName": "First", "type": "http-server"}],
            "_links": {"next": {"href": next}}
        })))
        .with_priority(2)
        .mount(&server)
        .await;

    let tests = client(&server)
        .tests(&AccountGroup::new("Prod", "555"))
        .await
        .unwrap();
    let ids: Vec<_> = tests.iter().filter_map(|t| t.test_id.as_deref()).collect();
    assert_eq!(ids, ["1", "2"]);
}

#[tokio::test]
async fn error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v7/tests"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let err = client(&server)
        .tests(&AccountGroup::new("Prod", "555"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 403, ref body } if body == "forbidden"));
}

#[tokio::test]
async fn failing_group_does_not_block_others() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v7/tests"))
        .and(query_param("aid", "42"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v7/tests"))
        .and(query_param("aid", "555"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tests": [{"testId": 1, "testName": "Checkout", "type": "http-server"}]
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let groups = [AccountGroup::new("Prod", "555"), AccountGroup::new("Lab", "42")];
    let collected = collect_tests(&client, &groups).await;
    assert_eq!(collected.len(), 1);
    assert_eq!(collected[0].0.id, "555");
}

#[tokio::test]
async fn agent_labels_become_bindings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v7/agents"))
        .and(query_param("aid", "555"))
        .and(query_param("agentTypes", "enterprise,enterprise-cluster"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "agents": [
                {"agentId": "9", "agentName": "fra-1", "labels": [{"name": "EU-Agents"}]},
                {"agentId": "11", "agentName": "nyc-1", "labels": [{"name": "US-Agents"}]}
            ]
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let index = collect_label_index(&client, &[AccountGroup::new("Prod", "555")]).await;
    let eu = index.agents_for_label("EU-Agents", "555").unwrap();
    assert_eq!(eu.len(), 1);
    assert_eq!(eu[0].id, "9");
}

#[test]
fn missing_token_is_rejected() {
    let err = ThousandEyesClient::new(ApiConfig::new("http://localhost/v7")).err();
    assert!(matches!(err, Some(ApiError::MissingToken)));
}
