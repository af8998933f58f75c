use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use page_recall::collector::{CollectOutcome, Collector};
use page_recall::config::{MemoryProvider, PluginState};
use page_recall::crawlers::StaticPage;
use page_recall::host::{HostMessage, HostMessaging, LocalHost, SkipReason};
use page_recall::memory::{HashEmbedder, MemoryAdapterFactory};

const PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <title>Quarterly report</title>
  <meta name="description" content="Numbers for Q3">
  <meta name="author" content="Finance">
</head>
<body>
  <nav>Home | Reports</nav>
  <article>
    <h1>Quarterly report</h1>
    <p>Revenue grew in every region this quarter, led by strong subscription renewals.</p>
    <p>Questions go to finance@example.com or call 13812345678 before Friday.</p>
  </article>
  <footer>Copyright</footer>
</body>
</html>"#;

fn state_for(server: &MockServer) -> PluginState {
    let mut state = PluginState::default();
    state.current_config.blacklist = vec!["*.internal.corp".to_string(), "/admin".to_string()];
    state.memory_config.endpoint = server.uri();
    state.memory_config.api_key = Some("token".to_string());
    state
}

#[tokio::test]
async fn test_page_flows_through_to_mem0() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/memories"))
        .and(body_partial_json(json!({
            "memories": [{
                "metadata": {
                    "url": "https://reports.example.com/q3",
                    "title": "Quarterly report",
                    "domain": "reports.example.com",
                    "pageMetadata": { "description": "Numbers for Q3", "author": "Finance" }
                }
            }]
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let host = Arc::new(LocalHost::new());
    let mut messages = host.on_message();
    let collector = Collector::from_state(state_for(&server), host.clone()).unwrap();
    collector.connect().await.unwrap();

    let page = StaticPage::new("https://reports.example.com/q3", PAGE);
    let CollectOutcome::Saved(record) = collector.collect(&page).await.unwrap() else {
        panic!("page should have been stored");
    };

    assert!(record.content.contains("Revenue grew"));
    assert!(!record.content.contains("Home | Reports"));
    assert!(!record.content.contains("finance@example.com"));
    assert!(!record.content.contains("13812345678"));
    assert_eq!(record.content.matches("[FILTERED]").count(), 2);

    let requests = server.received_requests().await.unwrap();
    let body = requests
        .iter()
        .find(|r| r.url.path() == "/v1/memories")
        .map(|r| String::from_utf8_lossy(&r.body).to_string())
        .unwrap();
    assert!(!body.contains("finance@example.com"));

    assert!(matches!(
        messages.recv().await.unwrap(),
        HostMessage::PageSaved { .. }
    ));
    assert_eq!(collector.stats().await.total_pages_scraped, 1);
}

#[tokio::test]
async fn test_blacklisted_pages_never_reach_storage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let collector = Collector::from_state(state_for(&server), Arc::new(LocalHost::new())).unwrap();
    collector.connect().await.unwrap();

    for url in ["https://wiki.internal.corp/page", "https://example.com/admin/users"] {
        let outcome = collector.collect(&StaticPage::new(url, PAGE)).await.unwrap();
        assert!(matches!(
            outcome,
            CollectOutcome::Skipped(SkipReason::Blacklisted { .. })
        ));
    }
    assert_eq!(collector.stats().await.total_pages_scraped, 0);
}

#[tokio::test]
async fn test_backend_outage_surfaces_qualified_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/memories"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let collector = Collector::from_state(state_for(&server), Arc::new(LocalHost::new())).unwrap();
    collector.connect().await.unwrap();

    let err = collector
        .collect(&StaticPage::new("https://reports.example.com/q3", PAGE))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("save failed: "));
    assert!(err.to_string().contains("maintenance"));
    assert_eq!(collector.stats().await.errors, 1);
}

#[tokio::test]
async fn test_vector_store_with_injected_embedder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/browser-context"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"vector_count": 0})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/browser-context/upsert"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = MemoryAdapterFactory::default_config(MemoryProvider::VectorDb);
    config.endpoint = server.uri();
    config.options.insert("provider".to_string(), json!("chroma"));

    let adapter = MemoryAdapterFactory::create_vector_adapter_with_embedder(
        &config,
        Arc::new(HashEmbedder::new(16)),
    )
    .unwrap();

    let state = PluginState {
        memory_config: config,
        ..PluginState::default()
    };
    let collector = Collector::new(state, adapter, Arc::new(LocalHost::new()));
    collector.connect().await.unwrap();

    let outcome = collector
        .collect(&StaticPage::new("https://reports.example.com/q3", PAGE))
        .await
        .unwrap();
    assert!(matches!(outcome, CollectOutcome::Saved(_)));

    let requests = server.received_requests().await.unwrap();
    let upsert = requests
        .iter()
        .find(|r| r.url.path().ends_with("/upsert"))
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&upsert.body).unwrap();
    assert_eq!(body["points"][0]["vector"].as_array().unwrap().len(), 16);
    assert!(
        body["points"][0]["metadata"]["content"]
            .as_str()
            .unwrap()
            .contains("Revenue grew")
    );
}

#[tokio::test]
async fn test_search_defaults_to_ten_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/memories/search"))
        .and(query_param("query", "quarterly"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "memories": [{
                "content": "Revenue grew",
                "metadata": { "url": "https://reports.example.com/q3", "title": "Quarterly report" }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/memories/search"))
        .and(query_param("limit", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "memories": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let collector = Collector::from_state(state_for(&server), Arc::new(LocalHost::new())).unwrap();
    collector.connect().await.unwrap();

    let pages = collector.search("quarterly", None).await.unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].url, "https://reports.example.com/q3");

    assert!(collector.search("quarterly", Some(3)).await.unwrap().is_empty());
}
