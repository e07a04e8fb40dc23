use chrono::{Duration, TimeZone, Utc};
use denbyden_analytics::clock::ManualClock;
use denbyden_analytics::event::{
    ClickType, EventPayload, InteractionValue, PageType, ScrollThreshold, ViewportPosition,
};
use denbyden_analytics::identity::{self, IdentityResolver, KeyValueStorage, MemoryStorage};
use denbyden_analytics::page::{Page, Visibility};
use denbyden_analytics::producers::{
    AddToCart, EmailSubmit, FilterSelect, GiftWrappingToggle, IntersectionEntry, PageDwell,
    ProductClick, ProductDetailView, ProductExposure, ProductRef, ScrollDepth, ScrollMetrics,
    SectionExpand,
};
use denbyden_analytics::store::{DetailRow, DetailTable, MemoryStore};
use denbyden_analytics::{AnalyticsPipeline, EventType};
use std::sync::{Arc, Mutex};

fn setup() -> (MemoryStore, AnalyticsPipeline) {
    let store = MemoryStore::new();
    let pipeline = AnalyticsPipeline::builder(Arc::new(store.clone()))
        .with_page(Page::new("/shop"))
        .build();
    (store, pipeline)
}

fn mug() -> ProductRef {
    ProductRef::new("p-1", "cozy-mug")
}

fn visible(ratio: f64, top: f64) -> IntersectionEntry {
    IntersectionEntry {
        intersection_ratio: ratio,
        bounding_top: top,
        viewport_height: 800.0,
    }
}

#[tokio::test]
async fn test_exposure_fires_once_despite_visibility_toggling() {
    let (_store, pipeline) = setup();
    let mut exposure = ProductExposure::new(&pipeline, mug(), 4, "grid", PageType::Shop);

    assert!(!exposure.observe(visible(0.2, 100.0)).await);
    assert!(exposure.observe(visible(0.6, 100.0)).await);
    assert!(!exposure.observe(visible(0.0, 100.0)).await);
    assert!(!exposure.observe(visible(1.0, 100.0)).await);

    assert!(exposure.has_fired());
    assert!(!exposure.is_observing());

    let pending = pipeline.pending_events();
    assert_eq!(pending.len(), 1);
    let EventPayload::ProductExposure(fired) = &pending[0].payload else {
        panic!("expected a product exposure, got {:?}", pending[0].payload);
    };
    assert_eq!(fired.position, 4);
    assert_eq!(fired.list_type, "grid");
    assert_eq!(fired.exposure_count, 1);
    assert_eq!(fired.viewport_position, Some(ViewportPosition::AboveFold));
}

#[tokio::test]
async fn test_exposure_below_fold_and_disabled() {
    let (_store, pipeline) = setup();

    let mut lower = ProductExposure::new(&pipeline, mug(), 9, "grid", PageType::Shop)
        .with_category("Mugs");
    assert!(lower.observe(visible(0.5, 600.0)).await);

    let mut disabled =
        ProductExposure::new(&pipeline, mug(), 1, "grid", PageType::Shop).enabled(false);
    assert!(!disabled.observe(visible(1.0, 0.0)).await);

    let mut unmounted = ProductExposure::new(&pipeline, mug(), 2, "grid", PageType::Shop);
    unmounted.disconnect();
    assert!(!unmounted.observe(visible(1.0, 0.0)).await);

    let pending = pipeline.pending_events();
    assert_eq!(pending.len(), 1);
    let EventPayload::ProductExposure(fired) = &pending[0].payload else {
        panic!("expected a product exposure");
    };
    assert_eq!(fired.viewport_position, Some(ViewportPosition::BelowFold));
    assert_eq!(fired.category.as_deref(), Some("Mugs"));
}

#[tokio::test]
async fn test_scroll_depth_fires_each_milestone_once() {
    let (_store, pipeline) = setup();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let mut depth = ScrollDepth::mount(&pipeline, PageType::Home)
        .on_depth_reached(move |t| sink.lock().unwrap().push(t.percent()));

    let at = |top: f64| ScrollMetrics {
        scroll_top: top,
        client_height: 400.0,
        scroll_height: 1000.0,
    };

    assert_eq!(
        depth.on_scroll(at(200.0)).await,
        vec![ScrollThreshold::Quarter, ScrollThreshold::Half]
    );
    assert!(depth.on_scroll(at(0.0)).await.is_empty());
    assert!(depth.on_scroll(at(200.0)).await.is_empty());
    assert_eq!(
        depth.on_scroll(at(600.0)).await,
        vec![ScrollThreshold::ThreeQuarters, ScrollThreshold::Full]
    );

    assert_eq!(*seen.lock().unwrap(), vec![25, 50, 75, 100]);
    let depths: Vec<_> = pipeline
        .pending_events()
        .iter()
        .map(|e| match &e.payload {
            EventPayload::ScrollDepth(s) => s.scroll_depth.percent(),
            other => panic!("unexpected payload {other:?}"),
        })
        .collect();
    assert_eq!(depths, vec![25, 50, 75, 100]);
}

#[tokio::test]
async fn test_scroll_depth_on_unscrollable_page() {
    let (_store, pipeline) = setup();
    let mut depth = ScrollDepth::mount(&pipeline, PageType::Home);

    let fired = depth
        .on_scroll(ScrollMetrics {
            scroll_top: 0.0,
            client_height: 0.0,
            scroll_height: 0.0,
        })
        .await;

    assert!(fired.is_empty());
    assert_eq!(depth.reached().count(), 0);
}

fn clocked_pipeline(clock: &ManualClock) -> AnalyticsPipeline {
    AnalyticsPipeline::builder(Arc::new(MemoryStore::new()))
        .with_clock(Arc::new(clock.clone()))
        .build()
}

#[tokio::test]
async fn test_short_visit_reports_bounce_once() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 11, 3, 12, 0, 0).unwrap());
    let pipeline = clocked_pipeline(&clock);
    let mut dwell = PageDwell::mount(&pipeline, PageType::ProductDetail, Some("p-1".into()));

    clock.advance(Duration::milliseconds(2900));
    assert!(!dwell.on_visibility_change(Visibility::Visible).await);
    assert!(dwell.on_visibility_change(Visibility::Hidden).await);
    assert!(!dwell.on_before_unload().await);
    assert!(!dwell.unmount().await);

    let pending = pipeline.pending_events();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].event_type(), EventType::PageBounce);
    let EventPayload::PageBounce(dwell) = &pending[0].payload else {
        panic!("expected a bounce");
    };
    assert_eq!(dwell.dwell_time_seconds, 2);
    assert!(dwell.is_bounce);
    assert_eq!(dwell.product_id.as_deref(), Some("p-1"));
}

#[tokio::test]
async fn test_long_visit_reports_dwell_on_unmount() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 11, 3, 12, 0, 0).unwrap());
    let pipeline = clocked_pipeline(&clock);
    let dwell = PageDwell::mount(&pipeline, PageType::Category, None);

    clock.advance(Duration::seconds(3));
    assert_eq!(dwell.elapsed_seconds(), 3);
    assert!(dwell.unmount().await);

    let pending = pipeline.pending_events();
    assert_eq!(pending[0].event_type(), EventType::PageDwell);
    let EventPayload::PageDwell(dwell) = &pending[0].payload else {
        panic!("expected a dwell");
    };
    assert_eq!(dwell.dwell_time_seconds, 3);
    assert!(!dwell.is_bounce);
}

#[tokio::test]
async fn test_product_click_records_source_page() {
    let (store, pipeline) = setup();
    pipeline
        .page()
        .navigate("/product/cozy-mug", Some("https://denbyden.example/shop?sort=new".into()));

    ProductClick::new(&pipeline, mug(), 2, ClickType::CardClick, PageType::Shop)
        .track()
        .await;

    let clicks = store.details_in(DetailTable::ProductClicks);
    let DetailRow::Click(row) = &clicks[0] else {
        panic!("expected a click row");
    };
    assert_eq!(row.source_page, "/shop");
    assert_eq!(row.click_type, ClickType::CardClick);
    assert_eq!(row.position, 2);
}

#[tokio::test]
async fn test_add_to_cart_computes_total_and_skips_invalid_lines() {
    let (store, pipeline) = setup();

    AddToCart::new(&pipeline, mug(), 2, 24.5)
        .page_type(PageType::ProductDetail)
        .variant("large")
        .gift_wrapping(true)
        .track()
        .await;
    AddToCart::new(&pipeline, mug(), 0, 24.5).track().await;

    let carts = store.details_in(DetailTable::CartActions);
    assert_eq!(carts.len(), 1);
    let DetailRow::CartAction(row) = &carts[0] else {
        panic!("expected a cart row");
    };
    assert_eq!(row.quantity, 2);
    assert_eq!(row.total_price, 49.0);
    assert_eq!(row.variant.as_deref(), Some("large"));
    assert!(row.gift_wrapping);
    assert_eq!(store.events()[0].page_type, PageType::ProductDetail);
}

#[tokio::test]
async fn test_email_submit_reports_new_user_until_subscribed() {
    let store = MemoryStore::new();
    let durable: Arc<dyn KeyValueStorage> = Arc::new(MemoryStorage::new());
    let identity = IdentityResolver::new(Some(durable.clone()), Some(Arc::new(MemoryStorage::new())));
    let pipeline = AnalyticsPipeline::builder(Arc::new(store.clone()))
        .with_identity(identity)
        .build();
    let signup = EmailSubmit::new(&pipeline, PageType::Home);

    signup.track("first@example.com").await;
    identity::mark_subscribed(durable.as_ref()).unwrap();
    signup.track("again@example.com").await;

    let rows: Vec<_> = store
        .details_in(DetailTable::EmailCaptures)
        .into_iter()
        .map(|r| match r {
            DetailRow::EmailCapture(row) => row,
            other => panic!("unexpected row {other:?}"),
        })
        .collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].is_new_user);
    assert!(!rows[1].is_new_user);
    assert_eq!(rows[0].source_page, "home");
    assert_eq!(rows[0].user_id, pipeline.identity().user_id());
}

#[tokio::test]
async fn test_detail_view_fires_when_product_changes() {
    let (store, pipeline) = setup();
    let mut view = ProductDetailView::new(&pipeline);

    assert!(view.show(mug()).await);
    assert!(!view.show(mug()).await);
    assert!(view.show(ProductRef::new("p-2", "wool-throw")).await);

    let exposures = store.details_in(DetailTable::ProductExposures);
    assert_eq!(exposures.len(), 2);
    let DetailRow::Exposure(row) = &exposures[1] else {
        panic!("expected an exposure row");
    };
    assert_eq!(row.product_slug, "wool-throw");
    assert_eq!(row.list_type, "detail");
    assert_eq!(row.position, 0);
}

#[tokio::test]
async fn test_interaction_producers_carry_their_data() {
    let (store, pipeline) = setup();

    SectionExpand::new(&pipeline, "p-1").track("Care instructions").await;
    GiftWrappingToggle::new(&pipeline, "p-1").track(true).await;
    FilterSelect::new(&pipeline, PageType::Shop)
        .track("color", "sage", 14)
        .await;
    pipeline.shutdown().await;

    let rows: Vec<_> = store
        .details_in(DetailTable::PageInteractions)
        .into_iter()
        .map(|r| match r {
            DetailRow::Interaction(row) => row,
            other => panic!("unexpected row {other:?}"),
        })
        .collect();
    let types: Vec<_> = rows.iter().map(|r| r.interaction_type.as_str()).collect();
    assert_eq!(types, vec!["section_expand", "gift_wrapping_select", "filter_select"]);

    assert_eq!(
        rows[0].interaction_data.get("section_name"),
        Some(&InteractionValue::Text("Care instructions".into()))
    );
    assert_eq!(
        rows[1].interaction_data.get("gift_wrapping"),
        Some(&InteractionValue::Bool(true))
    );
    assert_eq!(
        rows[2].interaction_data.get("result_count"),
        Some(&InteractionValue::Int(14))
    );
    assert_eq!(rows[2].product_id, None);
}
