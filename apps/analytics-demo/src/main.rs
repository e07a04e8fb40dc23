use denbyden_analytics::beacon::HttpBeacon;
use denbyden_analytics::event::{ClickType, PageType};
use denbyden_analytics::identity::{FileStorage, IdentityResolver, MemoryStorage};
use denbyden_analytics::page::{Page, Visibility};
use denbyden_analytics::producers::{
    AddToCart, EmailSubmit, GiftWrappingToggle, ImageSwipe, IntersectionEntry, PageDwell,
    ProductClick, ProductDetailView, ProductExposure, ProductRef, ScrollDepth, ScrollMetrics,
};
use denbyden_analytics::store::{DetailTable, SqliteStore};
use denbyden_analytics::{AnalyticsConfig, AnalyticsPipeline};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 1. Configuration and backends
    let config = AnalyticsConfig::from_env()?;
    let store = Arc::new(SqliteStore::new(&config.database_url).await?);
    let identity = IdentityResolver::new(
        Some(Arc::new(FileStorage::open(".denbyden/visitor.json")?)),
        Some(Arc::new(MemoryStorage::new())),
    );
    let page = Page::new("/");

    let mut builder = AnalyticsPipeline::builder(store.clone())
        .with_config(config.clone())
        .with_identity(identity)
        .with_page(page.clone());
    if let Some(beacon) = HttpBeacon::from_config(&config)? {
        info!(endpoint = %beacon.endpoint(), "Beacon enabled");
        builder = builder.with_beacon(Arc::new(beacon));
    }
    let pipeline = builder.build();
    info!(
        user_id = %pipeline.identity().user_id(),
        new_user = pipeline.is_new_user(),
        "Visitor session started"
    );

    // 2. Home page: a product grid scrolls into view
    let home_dwell = PageDwell::mount(&pipeline, PageType::Home, None);
    let mut scroll = ScrollDepth::mount(&pipeline, PageType::Home);
    let products = [
        ProductRef::new("p-1", "cozy-mug"),
        ProductRef::new("p-2", "wool-throw"),
        ProductRef::new("p-3", "linen-apron"),
    ];
    for (position, product) in products.iter().enumerate() {
        let position = position as u32;
        let mut exposure =
            ProductExposure::new(&pipeline, product.clone(), position, "featured", PageType::Home);
        exposure
            .observe(IntersectionEntry {
                intersection_ratio: 0.8,
                bounding_top: 200.0 + 300.0 * f64::from(position),
                viewport_height: 800.0,
            })
            .await;
    }
    scroll
        .on_scroll(ScrollMetrics {
            scroll_top: 900.0,
            client_height: 800.0,
            scroll_height: 2400.0,
        })
        .await;

    EmailSubmit::new(&pipeline, PageType::Home)
        .track("guest@example.com")
        .await;
    ProductClick::new(&pipeline, products[1].clone(), 1, ClickType::CardClick, PageType::Home)
        .track()
        .await;
    home_dwell.unmount().await;

    // 3. Product page
    page.navigate("/product/wool-throw", Some("https://denbyden.example/".into()));
    let mut detail = ProductDetailView::new(&pipeline);
    detail.show(products[1].clone()).await;

    let swipe = ImageSwipe::new(&pipeline, "p-2", 5);
    for index in 1..4 {
        swipe.track(index).await;
    }
    GiftWrappingToggle::new(&pipeline, "p-2").track(true).await;
    AddToCart::new(&pipeline, products[1].clone(), 1, 89.0)
        .page_type(PageType::ProductDetail)
        .gift_wrapping(true)
        .track()
        .await;

    // 4. Tab hidden, then closed
    pipeline.on_visibility_change(Visibility::Hidden).await;
    pipeline.on_before_unload().await;
    pipeline.shutdown().await;

    // 5. Summary
    info!(events = store.count_events().await?, "Event log");
    for table in DetailTable::ALL {
        info!(table = %table, rows = store.count_details(table).await?, "Detail table");
    }
    for event in store.recent_events(5).await? {
        info!(
            id = %event.id,
            event_type = %event.event_type,
            page_url = %event.page_url,
            "Recent event"
        );
    }

    Ok(())
}
