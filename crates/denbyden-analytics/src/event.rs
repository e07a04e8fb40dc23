//! # Event Model
//!
//! Every storefront interaction is recorded as an [`AnalyticsEvent`]: a small set of
//! base fields shared by all events plus an [`EventPayload`] whose variant is selected
//! by `event_type`.
//!
//! ## Delivery
//! High-value events (cart, lead, click, detail view) are delivered immediately; the
//! rest are queued and flushed in batches. See [`EventType::is_immediate`].

use crate::error::EventError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Dwell times strictly below this many seconds count as a bounce.
pub const BOUNCE_THRESHOLD_SECS: u64 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ProductExposure,
    ProductClick,
    AddToCart,
    EmailSubmit,
    PageDwell,
    PageBounce,
    ProductDetailView,
    ImageSwipe,
    SectionExpand,
    GiftWrappingToggle,
    ScrollDepth,
    FilterSelect,
}

impl EventType {
    pub const ALL: [EventType; 12] = [
        EventType::ProductExposure,
        EventType::ProductClick,
        EventType::AddToCart,
        EventType::EmailSubmit,
        EventType::PageDwell,
        EventType::PageBounce,
        EventType::ProductDetailView,
        EventType::ImageSwipe,
        EventType::SectionExpand,
        EventType::GiftWrappingToggle,
        EventType::ScrollDepth,
        EventType::FilterSelect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ProductExposure => "product_exposure",
            EventType::ProductClick => "product_click",
            EventType::AddToCart => "add_to_cart",
            EventType::EmailSubmit => "email_submit",
            EventType::PageDwell => "page_dwell",
            EventType::PageBounce => "page_bounce",
            EventType::ProductDetailView => "product_detail_view",
            EventType::ImageSwipe => "image_swipe",
            EventType::SectionExpand => "section_expand",
            EventType::GiftWrappingToggle => "gift_wrapping_toggle",
            EventType::ScrollDepth => "scroll_depth",
            EventType::FilterSelect => "filter_select",
        }
    }

    /// The category implied by this event type.
    pub fn category(&self) -> EventCategory {
        match self {
            EventType::ProductExposure | EventType::ProductDetailView => EventCategory::Exposure,
            EventType::ProductClick => EventCategory::Click,
            EventType::AddToCart => EventCategory::Conversion,
            EventType::EmailSubmit => EventCategory::Lead,
            EventType::PageDwell
            | EventType::PageBounce
            | EventType::ImageSwipe
            | EventType::SectionExpand
            | EventType::GiftWrappingToggle
            | EventType::ScrollDepth
            | EventType::FilterSelect => EventCategory::Interaction,
        }
    }

    /// Whether events of this type bypass the batch queue and are flushed on arrival.
    pub fn is_immediate(&self) -> bool {
        matches!(
            self,
            EventType::AddToCart
                | EventType::EmailSubmit
                | EventType::ProductClick
                | EventType::ProductDetailView
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Exposure,
    Click,
    Conversion,
    Interaction,
    Lead,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Exposure => "exposure",
            EventCategory::Click => "click",
            EventCategory::Conversion => "conversion",
            EventCategory::Interaction => "interaction",
            EventCategory::Lead => "lead",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Home,
    ProductDetail,
    Shop,
    Category,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Home => "home",
            PageType::ProductDetail => "product_detail",
            PageType::Shop => "shop",
            PageType::Category => "category",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewportPosition {
    AboveFold,
    BelowFold,
}

impl ViewportPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewportPosition::AboveFold => "above_fold",
            ViewportPosition::BelowFold => "below_fold",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickType {
    CardClick,
    AddToCartButton,
    BuyNowButton,
}

impl ClickType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClickType::CardClick => "card_click",
            ClickType::AddToCartButton => "add_to_cart_button",
            ClickType::BuyNowButton => "buy_now_button",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartActionType {
    Add,
    Update,
    Remove,
}

impl CartActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CartActionType::Add => "add",
            CartActionType::Update => "update",
            CartActionType::Remove => "remove",
        }
    }
}

/// Scroll depth milestones, in percent of the document height.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ScrollThreshold {
    Quarter,
    Half,
    ThreeQuarters,
    Full,
}

impl ScrollThreshold {
    pub const ALL: [ScrollThreshold; 4] = [
        ScrollThreshold::Quarter,
        ScrollThreshold::Half,
        ScrollThreshold::ThreeQuarters,
        ScrollThreshold::Full,
    ];

    pub fn percent(&self) -> u8 {
        match self {
            ScrollThreshold::Quarter => 25,
            ScrollThreshold::Half => 50,
            ScrollThreshold::ThreeQuarters => 75,
            ScrollThreshold::Full => 100,
        }
    }
}

impl From<ScrollThreshold> for u8 {
    fn from(threshold: ScrollThreshold) -> Self {
        threshold.percent()
    }
}

impl TryFrom<u8> for ScrollThreshold {
    type Error = EventError;

    fn try_from(percent: u8) -> Result<Self, Self::Error> {
        ScrollThreshold::ALL
            .into_iter()
            .find(|t| t.percent() == percent)
            .ok_or(EventError::InvalidScrollDepth(percent))
    }
}

/// A scalar stored in an interaction's free-form data map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InteractionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for InteractionValue {
    fn from(v: bool) -> Self {
        InteractionValue::Bool(v)
    }
}

impl From<i64> for InteractionValue {
    fn from(v: i64) -> Self {
        InteractionValue::Int(v)
    }
}

impl From<u32> for InteractionValue {
    fn from(v: u32) -> Self {
        InteractionValue::Int(i64::from(v))
    }
}

impl From<f64> for InteractionValue {
    fn from(v: f64) -> Self {
        InteractionValue::Float(v)
    }
}

impl From<&str> for InteractionValue {
    fn from(v: &str) -> Self {
        InteractionValue::Text(v.to_string())
    }
}

impl From<String> for InteractionValue {
    fn from(v: String) -> Self {
        InteractionValue::Text(v)
    }
}

pub type InteractionData = BTreeMap<String, InteractionValue>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductExposure {
    pub product_id: String,
    pub product_slug: String,
    pub position: u32,
    pub list_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport_position: Option<ViewportPosition>,
    #[serde(default = "default_exposure_count")]
    pub exposure_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

fn default_exposure_count() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductDetailView {
    pub product_id: String,
    pub product_slug: String,
    pub source_page: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductClick {
    pub product_id: String,
    pub product_slug: String,
    pub position: u32,
    pub click_type: ClickType,
    pub source_page: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartAction {
    pub product_id: String,
    pub product_slug: String,
    pub quantity: u32,
    pub action_type: CartActionType,
    pub variant: Option<String>,
    pub gift_wrapping: bool,
    pub total_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

impl CartAction {
    /// Builds a cart action, rejecting zero quantities and negative or non-finite totals.
    pub fn new(
        product_id: impl Into<String>,
        product_slug: impl Into<String>,
        quantity: u32,
        action_type: CartActionType,
        total_price: f64,
    ) -> Result<Self, EventError> {
        let action = Self {
            product_id: product_id.into(),
            product_slug: product_slug.into(),
            quantity,
            action_type,
            variant: None,
            gift_wrapping: false,
            total_price,
            position: None,
        };
        action.validate()?;
        Ok(action)
    }

    pub fn validate(&self) -> Result<(), EventError> {
        if self.quantity == 0 {
            return Err(EventError::ZeroQuantity);
        }
        if !self.total_price.is_finite() || self.total_price < 0.0 {
            return Err(EventError::InvalidPrice(self.total_price));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmailSubmit {
    pub email: String,
    pub source_page: String,
    pub is_new_user: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DwellTime {
    pub dwell_time_seconds: u64,
    pub is_bounce: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default)]
    pub interaction_data: InteractionData,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScrollDepth {
    pub scroll_depth: ScrollThreshold,
    #[serde(default)]
    pub interaction_data: InteractionData,
}

/// Variant-specific fields, discriminated by `event_type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventPayload {
    ProductExposure(ProductExposure),
    ProductDetailView(ProductDetailView),
    ProductClick(ProductClick),
    AddToCart(CartAction),
    EmailSubmit(EmailSubmit),
    PageDwell(DwellTime),
    PageBounce(DwellTime),
    ImageSwipe(Interaction),
    SectionExpand(Interaction),
    GiftWrappingToggle(Interaction),
    ScrollDepth(ScrollDepth),
    FilterSelect(Interaction),
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::ProductExposure(_) => EventType::ProductExposure,
            EventPayload::ProductDetailView(_) => EventType::ProductDetailView,
            EventPayload::ProductClick(_) => EventType::ProductClick,
            EventPayload::AddToCart(_) => EventType::AddToCart,
            EventPayload::EmailSubmit(_) => EventType::EmailSubmit,
            EventPayload::PageDwell(_) => EventType::PageDwell,
            EventPayload::PageBounce(_) => EventType::PageBounce,
            EventPayload::ImageSwipe(_) => EventType::ImageSwipe,
            EventPayload::SectionExpand(_) => EventType::SectionExpand,
            EventPayload::GiftWrappingToggle(_) => EventType::GiftWrappingToggle,
            EventPayload::ScrollDepth(_) => EventType::ScrollDepth,
            EventPayload::FilterSelect(_) => EventType::FilterSelect,
        }
    }

    /// Classifies a dwell measurement as a `page_bounce` or a `page_dwell`.
    pub fn dwell(dwell_time_seconds: u64, product_id: Option<String>) -> Self {
        let is_bounce = dwell_time_seconds < BOUNCE_THRESHOLD_SECS;
        let dwell = DwellTime {
            dwell_time_seconds,
            is_bounce,
            product_id,
        };
        if is_bounce {
            EventPayload::PageBounce(dwell)
        } else {
            EventPayload::PageDwell(dwell)
        }
    }

    pub fn image_swipe(product_id: impl Into<String>, image_index: u32, total_images: u32) -> Self {
        EventPayload::ImageSwipe(Interaction {
            product_id: Some(product_id.into()),
            interaction_data: data([
                ("image_index", image_index.into()),
                ("total_images", total_images.into()),
            ]),
        })
    }

    pub fn section_expand(product_id: impl Into<String>, section_name: impl Into<String>) -> Self {
        EventPayload::SectionExpand(Interaction {
            product_id: Some(product_id.into()),
            interaction_data: data([
                ("section_name", InteractionValue::Text(section_name.into())),
                ("section_type", "collapsible".into()),
            ]),
        })
    }

    pub fn gift_wrapping_toggle(product_id: impl Into<String>, gift_wrapping: bool) -> Self {
        EventPayload::GiftWrappingToggle(Interaction {
            product_id: Some(product_id.into()),
            interaction_data: data([("gift_wrapping", gift_wrapping.into())]),
        })
    }

    pub fn scroll_depth(threshold: ScrollThreshold) -> Self {
        EventPayload::ScrollDepth(ScrollDepth {
            scroll_depth: threshold,
            interaction_data: InteractionData::new(),
        })
    }

    pub fn filter_select(
        filter_type: impl Into<String>,
        filter_value: impl Into<String>,
        result_count: u32,
    ) -> Self {
        EventPayload::FilterSelect(Interaction {
            product_id: None,
            interaction_data: data([
                ("filter_type", InteractionValue::Text(filter_type.into())),
                ("filter_value", InteractionValue::Text(filter_value.into())),
                ("result_count", result_count.into()),
            ]),
        })
    }

    /// Re-derives fields that follow from other fields and rejects invalid values.
    ///
    /// Payloads built with struct literals or deserialized from JSON skip the
    /// constructors; the pipeline runs every event through here before queueing it.
    pub fn normalized(self) -> Result<Self, EventError> {
        match self {
            EventPayload::PageDwell(d) | EventPayload::PageBounce(d) => {
                Ok(EventPayload::dwell(d.dwell_time_seconds, d.product_id))
            }
            EventPayload::AddToCart(action) => {
                action.validate()?;
                Ok(EventPayload::AddToCart(action))
            }
            other => Ok(other),
        }
    }

    /// The `interaction_type` tag recorded for interaction events, `None` for the rest.
    pub fn interaction_type(&self) -> Option<&'static str> {
        match self {
            EventPayload::ImageSwipe(_) => Some("image_swipe"),
            EventPayload::SectionExpand(_) => Some("section_expand"),
            EventPayload::GiftWrappingToggle(_) => Some("gift_wrapping_select"),
            EventPayload::ScrollDepth(_) => Some("scroll_depth"),
            EventPayload::FilterSelect(_) => Some("filter_select"),
            _ => None,
        }
    }
}

fn data<const N: usize>(entries: [(&str, InteractionValue); N]) -> InteractionData {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// A single recorded interaction.
///
/// Delivery metadata (`page_url`, `user_id`, `session_id`, `timestamp`) may be left
/// empty by producers; the pipeline fills it in during enrichment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub page_type: PageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl AnalyticsEvent {
    pub fn new(page_type: PageType, payload: EventPayload) -> Self {
        Self {
            page_type,
            page_url: None,
            user_id: None,
            session_id: None,
            timestamp: None,
            payload,
        }
    }

    pub fn with_page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = Some(page_url.into());
        self
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    pub fn category(&self) -> EventCategory {
        self.event_type().category()
    }

    pub fn normalized(mut self) -> Result<Self, EventError> {
        self.payload = self.payload.normalized()?;
        Ok(self)
    }

    /// Serializes the event with its implied `event_category` alongside `event_type`.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        let mut value = serde_json::to_value(self)?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "event_category".to_string(),
                serde_json::Value::String(self.category().as_str().to_string()),
            );
        }
        Ok(value)
    }
}
