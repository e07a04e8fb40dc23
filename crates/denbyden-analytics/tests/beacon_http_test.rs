use denbyden_analytics::beacon::{BeaconPayload, BeaconTransport, HttpBeacon};
use denbyden_analytics::event::ScrollThreshold;
use denbyden_analytics::store::MemoryStore;
use denbyden_analytics::{AnalyticsConfig, AnalyticsEvent, AnalyticsPipeline, EventPayload, PageType};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

async fn wait_for_requests(server: &MockServer, expected: usize) -> Vec<Request> {
    for _ in 0..100 {
        let received = server.received_requests().await.unwrap_or_default();
        if received.len() >= expected {
            return received;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    server.received_requests().await.unwrap_or_default()
}

#[tokio::test]
async fn test_unload_posts_pending_events() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/analytics"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = Url::parse(&format!("{}/api/analytics", server.uri())).unwrap();
    let store = MemoryStore::new();
    let pipeline = AnalyticsPipeline::builder(Arc::new(store.clone()))
        .with_beacon(Arc::new(HttpBeacon::new(endpoint)))
        .build();

    pipeline
        .track_event(AnalyticsEvent::new(
            PageType::Home,
            EventPayload::scroll_depth(ScrollThreshold::Half),
        ))
        .await;
    pipeline.on_before_unload().await;

    let received = wait_for_requests(&server, 1).await;
    assert_eq!(received.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event_type"], "scroll_depth");
    assert_eq!(events[0]["page_type"], "home");

    // The normal flush path runs as well.
    assert_eq!(store.events().len(), 1);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_silent() {
    let beacon = HttpBeacon::new(Url::parse("http://127.0.0.1:9/api/analytics").unwrap());
    let payload = BeaconPayload { events: vec![serde_json::json!({"event_type": "page_dwell"})] };

    beacon.send(payload);
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[test]
fn test_send_outside_runtime_is_dropped() {
    let beacon = HttpBeacon::new(Url::parse("http://localhost/api/analytics").unwrap());
    beacon.send(BeaconPayload { events: vec![] });
}

#[test]
fn test_beacon_from_config() {
    let unset = AnalyticsConfig::default();
    assert!(HttpBeacon::from_config(&unset).unwrap().is_none());

    let configured = AnalyticsConfig {
        beacon_url: Some("https://denbyden.example/api/analytics".into()),
        ..Default::default()
    };
    let beacon = HttpBeacon::from_config(&configured).unwrap().unwrap();
    assert_eq!(beacon.endpoint().path(), "/api/analytics");

    let invalid = AnalyticsConfig {
        beacon_url: Some("not a url".into()),
        ..Default::default()
    };
    assert!(HttpBeacon::from_config(&invalid).is_err());
}
