use super::ProductRef;
use crate::error::EventError;
use crate::event::{
    AnalyticsEvent, CartAction, CartActionType, ClickType, EmailSubmit as EmailSubmitted,
    EventPayload, PageType, ProductClick as ProductClicked,
    ProductDetailView as ProductDetailViewed,
};
use crate::pipeline::AnalyticsPipeline;

pub struct ProductClick {
    pipeline: AnalyticsPipeline,
    product: ProductRef,
    position: u32,
    click_type: ClickType,
    page_type: PageType,
}

impl ProductClick {
    pub fn new(
        pipeline: &AnalyticsPipeline,
        product: ProductRef,
        position: u32,
        click_type: ClickType,
        page_type: PageType,
    ) -> Self {
        Self {
            pipeline: pipeline.clone(),
            product,
            position,
            click_type,
            page_type,
        }
    }

    pub fn event(&self) -> AnalyticsEvent {
        AnalyticsEvent::new(
            self.page_type,
            EventPayload::ProductClick(ProductClicked {
                product_id: self.product.id.clone(),
                product_slug: self.product.slug.clone(),
                position: self.position,
                click_type: self.click_type,
                source_page: self.pipeline.source_page(),
            }),
        )
    }

    pub async fn track(&self) {
        self.pipeline.track_event(self.event()).await;
    }
}

/// Add-to-cart with the total computed from unit price and quantity.
pub struct AddToCart {
    pipeline: AnalyticsPipeline,
    product: ProductRef,
    quantity: u32,
    unit_price: f64,
    page_type: PageType,
    variant: Option<String>,
    gift_wrapping: bool,
    position: Option<u32>,
}

impl AddToCart {
    pub fn new(pipeline: &AnalyticsPipeline, product: ProductRef, quantity: u32, unit_price: f64) -> Self {
        Self {
            pipeline: pipeline.clone(),
            product,
            quantity,
            unit_price,
            page_type: PageType::Home,
            variant: None,
            gift_wrapping: false,
            position: None,
        }
    }

    pub fn page_type(mut self, page_type: PageType) -> Self {
        self.page_type = page_type;
        self
    }

    pub fn variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn gift_wrapping(mut self, gift_wrapping: bool) -> Self {
        self.gift_wrapping = gift_wrapping;
        self
    }

    pub fn position(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }

    pub fn event(&self) -> Result<AnalyticsEvent, EventError> {
        let mut action = CartAction::new(
            self.product.id.clone(),
            self.product.slug.clone(),
            self.quantity,
            CartActionType::Add,
            self.unit_price * f64::from(self.quantity),
        )?;
        action.variant = self.variant.clone().filter(|v| !v.is_empty());
        action.gift_wrapping = self.gift_wrapping;
        action.position = self.position;
        Ok(AnalyticsEvent::new(self.page_type, EventPayload::AddToCart(action)))
    }

    /// Tracks the add. An invalid cart line is logged and skipped.
    pub async fn track(&self) {
        match self.event() {
            Ok(event) => self.pipeline.track_event(event).await,
            Err(e) => {
                tracing::warn!(product_id = %self.product.id, error = %e, "Skipping invalid add_to_cart event")
            }
        }
    }
}

pub struct EmailSubmit {
    pipeline: AnalyticsPipeline,
    page_type: PageType,
}

impl EmailSubmit {
    pub fn new(pipeline: &AnalyticsPipeline, page_type: PageType) -> Self {
        Self {
            pipeline: pipeline.clone(),
            page_type,
        }
    }

    pub fn event(&self, email: impl Into<String>) -> AnalyticsEvent {
        AnalyticsEvent::new(
            self.page_type,
            EventPayload::EmailSubmit(EmailSubmitted {
                email: email.into(),
                source_page: self.page_type.as_str().to_string(),
                is_new_user: self.pipeline.is_new_user(),
            }),
        )
    }

    pub async fn track(&self, email: impl Into<String>) {
        self.pipeline.track_event(self.event(email)).await;
    }
}

/// Fires `product_detail_view` whenever the detail page shows a different product.
pub struct ProductDetailView {
    pipeline: AnalyticsPipeline,
    current: Option<ProductRef>,
}

impl ProductDetailView {
    pub fn new(pipeline: &AnalyticsPipeline) -> Self {
        Self {
            pipeline: pipeline.clone(),
            current: None,
        }
    }

    /// Shows `product`. Returns whether a view was tracked.
    pub async fn show(&mut self, product: ProductRef) -> bool {
        if self.current.as_ref() == Some(&product) {
            return false;
        }
        let event = AnalyticsEvent::new(
            PageType::ProductDetail,
            EventPayload::ProductDetailView(ProductDetailViewed {
                product_id: product.id.clone(),
                product_slug: product.slug.clone(),
                source_page: self.pipeline.source_page(),
            }),
        );
        self.current = Some(product);
        self.pipeline.track_event(event).await;
        true
    }
}

pub struct ImageSwipe {
    pipeline: AnalyticsPipeline,
    product_id: String,
    total_images: u32,
}

impl ImageSwipe {
    pub fn new(pipeline: &AnalyticsPipeline, product_id: impl Into<String>, total_images: u32) -> Self {
        Self {
            pipeline: pipeline.clone(),
            product_id: product_id.into(),
            total_images,
        }
    }

    pub async fn track(&self, image_index: u32) {
        let payload = EventPayload::image_swipe(self.product_id.clone(), image_index, self.total_images);
        self.pipeline
            .track_event(AnalyticsEvent::new(PageType::ProductDetail, payload))
            .await;
    }
}

pub struct SectionExpand {
    pipeline: AnalyticsPipeline,
    product_id: String,
}

impl SectionExpand {
    pub fn new(pipeline: &AnalyticsPipeline, product_id: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.clone(),
            product_id: product_id.into(),
        }
    }

    pub async fn track(&self, section_name: impl Into<String>) {
        let payload = EventPayload::section_expand(self.product_id.clone(), section_name);
        self.pipeline
            .track_event(AnalyticsEvent::new(PageType::ProductDetail, payload))
            .await;
    }
}

pub struct GiftWrappingToggle {
    pipeline: AnalyticsPipeline,
    product_id: String,
}

impl GiftWrappingToggle {
    pub fn new(pipeline: &AnalyticsPipeline, product_id: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.clone(),
            product_id: product_id.into(),
        }
    }

    pub async fn track(&self, gift_wrapping: bool) {
        let payload = EventPayload::gift_wrapping_toggle(self.product_id.clone(), gift_wrapping);
        self.pipeline
            .track_event(AnalyticsEvent::new(PageType::ProductDetail, payload))
            .await;
    }
}

pub struct FilterSelect {
    pipeline: AnalyticsPipeline,
    page_type: PageType,
}

impl FilterSelect {
    pub fn new(pipeline: &AnalyticsPipeline, page_type: PageType) -> Self {
        Self {
            pipeline: pipeline.clone(),
            page_type,
        }
    }

    pub async fn track(
        &self,
        filter_type: impl Into<String>,
        filter_value: impl Into<String>,
        result_count: u32,
    ) {
        let payload = EventPayload::filter_select(filter_type, filter_value, result_count);
        self.pipeline
            .track_event(AnalyticsEvent::new(self.page_type, payload))
            .await;
    }
}
