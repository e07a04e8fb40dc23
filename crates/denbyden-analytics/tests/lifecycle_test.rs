use denbyden_analytics::beacon::{BeaconPayload, BeaconTransport};
use denbyden_analytics::event::ScrollThreshold;
use denbyden_analytics::page::{Page, Visibility};
use denbyden_analytics::store::MemoryStore;
use denbyden_analytics::{AnalyticsEvent, AnalyticsPipeline, EventPayload, PageType};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct RecordingBeacon {
    sent: Arc<Mutex<Vec<BeaconPayload>>>,
}

impl BeaconTransport for RecordingBeacon {
    fn send(&self, payload: BeaconPayload) {
        self.sent.lock().unwrap().push(payload);
    }
}

fn setup() -> (MemoryStore, RecordingBeacon, AnalyticsPipeline) {
    let store = MemoryStore::new();
    let beacon = RecordingBeacon::default();
    let pipeline = AnalyticsPipeline::builder(Arc::new(store.clone()))
        .with_page(Page::new("/"))
        .with_beacon(Arc::new(beacon.clone()))
        .build();
    (store, beacon, pipeline)
}

fn scroll(threshold: ScrollThreshold) -> AnalyticsEvent {
    AnalyticsEvent::new(PageType::Home, EventPayload::scroll_depth(threshold))
}

#[tokio::test]
async fn test_unload_beacons_queue_then_flushes() {
    let (store, beacon, pipeline) = setup();
    pipeline.track_event(scroll(ScrollThreshold::Quarter)).await;
    pipeline.track_event(scroll(ScrollThreshold::Half)).await;

    let outcome = pipeline.on_before_unload().await;

    let sent = beacon.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].len(), 2);
    assert_eq!(sent[0].events[0]["event_type"], "scroll_depth");
    assert_eq!(sent[0].events[0]["event_category"], "interaction");
    assert_eq!(sent[0].events[1]["scroll_depth"], 50);
    assert!(sent[0].events[0]["user_id"].as_str().unwrap().starts_with("user_"));

    assert_eq!(outcome.written.primary_rows, 2);
    assert_eq!(store.events().len(), 2);
    assert_eq!(pipeline.queue_len(), 0);
}

#[tokio::test]
async fn test_unload_with_failing_store_still_beacons() {
    let (store, beacon, pipeline) = setup();
    store.fail_next_primary_inserts(1);
    pipeline.track_event(scroll(ScrollThreshold::Full)).await;

    let outcome = pipeline.on_before_unload().await;

    assert_eq!(beacon.sent.lock().unwrap().len(), 1);
    assert_eq!(outcome.requeued, 1);
    assert_eq!(pipeline.queue_len(), 1);
}

#[tokio::test]
async fn test_unload_with_empty_queue_does_nothing() {
    let (store, beacon, pipeline) = setup();

    assert!(pipeline.on_before_unload().await.is_noop());
    assert!(beacon.sent.lock().unwrap().is_empty());
    assert_eq!(store.primary_insert_calls(), 0);
}

#[tokio::test]
async fn test_hidden_page_flushes_without_beacon() {
    let (store, beacon, pipeline) = setup();
    pipeline.track_event(scroll(ScrollThreshold::Quarter)).await;

    let visible = pipeline.on_visibility_change(Visibility::Visible).await;
    assert!(visible.is_noop());
    assert_eq!(pipeline.queue_len(), 1);

    let hidden = pipeline.on_visibility_change(Visibility::Hidden).await;
    assert_eq!(hidden.written.primary_rows, 1);
    assert_eq!(store.events().len(), 1);
    assert!(beacon.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_hidden_page_with_empty_queue_skips_store() {
    let (store, _beacon, pipeline) = setup();

    pipeline.on_visibility_change(Visibility::Hidden).await;

    assert_eq!(store.primary_insert_calls(), 0);
}
