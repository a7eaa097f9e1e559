//! `check` flow against a mock site.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use poe_price_watch::{PricePipeline, ScrapeError, ScrapeSession, SessionConfig, Target};
use poe_price_watch_bot::check_targets;
use poe_price_watch_bot::config::{SiteConfig, BASE_URL_VAR};

const POE_PATH: &str = "/game/path-of-exile/currency.html";
const POE2_PATH: &str = "/game/path-of-exile-2-currency/currency.html";

async fn mock_site() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><meta name="csrf-token" content="tok"></head><body></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ajax/change-currency"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": 0, "currency": "EUR"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(POE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h4>  12.3 EUR  </h4>"))
        .mount(&server)
        .await;
    server
}

fn pipeline_for(site: &SiteConfig) -> PricePipeline {
    PricePipeline::new(Arc::new(ScrapeSession::new(site.session_config()).unwrap()))
}

fn site_for(server: &MockServer) -> SiteConfig {
    let uri = server.uri();
    SiteConfig::from_lookup(move |name| (name == BASE_URL_VAR).then(|| uri.clone())).unwrap()
}

#[tokio::test]
async fn test_check_reports_each_target() {
    let server = mock_site().await;
    Mock::given(method("GET"))
        .and(path(POE2_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let site = site_for(&server);
    let pipeline = pipeline_for(&site);

    let results = check_targets(&pipeline, &site.targets()).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0.label, "Path of Exile");
    assert_eq!(results[0].1.as_deref().unwrap(), "12.3 EUR");
    assert_eq!(results[1].0.label, "Path of Exile 2");
    assert!(matches!(results[1].1, Err(ScrapeError::Network { .. })));
}

#[tokio::test]
async fn test_check_with_unreachable_site() {
    // Nothing listens on port 9 locally; every target fails at the landing page.
    let session = ScrapeSession::new(SessionConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        timeout: Duration::from_secs(2),
        ..SessionConfig::default()
    })
    .unwrap();
    let pipeline = PricePipeline::new(Arc::new(session));
    let targets = [Target::new("Path of Exile", format!("http://127.0.0.1:9{POE_PATH}"))];

    let results = check_targets(&pipeline, &targets).await;
    assert!(results[0].1.is_err());
}
