use super::ProductRef;
use crate::event::{AnalyticsEvent, EventPayload, PageType, ProductExposure as Exposure, ViewportPosition};
use crate::pipeline::AnalyticsPipeline;

/// Fraction of the element that must be visible before an exposure counts.
pub const EXPOSURE_VISIBILITY_THRESHOLD: f64 = 0.5;

/// One observation of an element against the viewport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntersectionEntry {
    /// Visible fraction of the element, 0.0 to 1.0.
    pub intersection_ratio: f64,
    /// Distance from the viewport top to the element's top edge.
    pub bounding_top: f64,
    pub viewport_height: f64,
}

impl IntersectionEntry {
    pub fn is_intersecting(&self, threshold: f64) -> bool {
        self.intersection_ratio > 0.0 && self.intersection_ratio >= threshold
    }

    pub fn viewport_position(&self) -> ViewportPosition {
        if self.bounding_top < self.viewport_height * 0.5 {
            ViewportPosition::AboveFold
        } else {
            ViewportPosition::BelowFold
        }
    }
}

/// Fires a `product_exposure` the first time a listed product becomes visible, then
/// stops observing for good.
pub struct ProductExposure {
    pipeline: AnalyticsPipeline,
    product: ProductRef,
    position: u32,
    list_type: String,
    page_type: PageType,
    category: Option<String>,
    observing: bool,
    fired: bool,
}

impl ProductExposure {
    pub fn new(
        pipeline: &AnalyticsPipeline,
        product: ProductRef,
        position: u32,
        list_type: impl Into<String>,
        page_type: PageType,
    ) -> Self {
        Self {
            pipeline: pipeline.clone(),
            product,
            position,
            list_type: list_type.into(),
            page_type,
            category: None,
            observing: true,
            fired: false,
        }
    }

    /// A disabled tracker never observes and never fires.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.observing = enabled && !self.fired;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Feeds one intersection observation. Returns whether an exposure was tracked.
    pub async fn observe(&mut self, entry: IntersectionEntry) -> bool {
        if !self.observing || self.fired || !entry.is_intersecting(EXPOSURE_VISIBILITY_THRESHOLD) {
            return false;
        }
        self.fired = true;
        self.observing = false;

        let event = self.event(entry.viewport_position());
        self.pipeline.track_event(event).await;
        true
    }

    /// Stops observing, e.g. when the element unmounts.
    pub fn disconnect(&mut self) {
        self.observing = false;
    }

    fn event(&self, viewport_position: ViewportPosition) -> AnalyticsEvent {
        AnalyticsEvent::new(
            self.page_type,
            EventPayload::ProductExposure(Exposure {
                product_id: self.product.id.clone(),
                product_slug: self.product.slug.clone(),
                position: self.position,
                list_type: self.list_type.clone(),
                viewport_position: Some(viewport_position),
                exposure_count: 1,
                category: self.category.clone(),
            }),
        )
    }
}
