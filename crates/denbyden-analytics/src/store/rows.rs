use crate::event::{
    CartActionType, ClickType, EventCategory, EventType, InteractionData, PageType,
    ScrollThreshold, ViewportPosition,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier generated by the store for a primary event row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The projection of an event written to the primary event log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrimaryEventRow {
    pub event_type: EventType,
    pub event_category: EventCategory,
    pub page_type: PageType,
    pub page_url: String,
    pub user_id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DetailTable {
    ProductExposures,
    ProductClicks,
    CartActions,
    EmailCaptures,
    PageDwellTime,
    PageInteractions,
}

impl DetailTable {
    pub const ALL: [DetailTable; 6] = [
        DetailTable::ProductExposures,
        DetailTable::ProductClicks,
        DetailTable::CartActions,
        DetailTable::EmailCaptures,
        DetailTable::PageDwellTime,
        DetailTable::PageInteractions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetailTable::ProductExposures => "product_exposures",
            DetailTable::ProductClicks => "product_clicks",
            DetailTable::CartActions => "cart_actions",
            DetailTable::EmailCaptures => "email_captures",
            DetailTable::PageDwellTime => "page_dwell_time",
            DetailTable::PageInteractions => "page_interactions",
        }
    }
}

impl fmt::Display for DetailTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExposureRow {
    pub event_id: EventId,
    pub product_id: String,
    pub product_slug: String,
    pub position: u32,
    pub exposure_count: u32,
    pub list_type: String,
    pub viewport_position: Option<ViewportPosition>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClickRow {
    pub event_id: EventId,
    pub product_id: String,
    pub product_slug: String,
    pub position: u32,
    pub click_type: ClickType,
    pub source_page: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartActionRow {
    pub event_id: EventId,
    pub product_id: String,
    pub product_slug: String,
    pub quantity: u32,
    pub action_type: CartActionType,
    pub variant: Option<String>,
    pub gift_wrapping: bool,
    pub total_price: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmailCaptureRow {
    pub event_id: EventId,
    pub email: String,
    pub source_page: String,
    pub is_new_user: bool,
    pub user_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DwellRow {
    pub event_id: EventId,
    pub page_type: PageType,
    pub page_url: String,
    pub product_id: Option<String>,
    pub dwell_time_seconds: u64,
    pub is_bounce: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionRow {
    pub event_id: EventId,
    pub interaction_type: String,
    pub product_id: Option<String>,
    pub interaction_data: InteractionData,
    pub scroll_depth: Option<ScrollThreshold>,
}

/// A type-specific row keyed by the primary event's id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DetailRow {
    Exposure(ExposureRow),
    Click(ClickRow),
    CartAction(CartActionRow),
    EmailCapture(EmailCaptureRow),
    Dwell(DwellRow),
    Interaction(InteractionRow),
}

impl DetailRow {
    pub fn table(&self) -> DetailTable {
        match self {
            DetailRow::Exposure(_) => DetailTable::ProductExposures,
            DetailRow::Click(_) => DetailTable::ProductClicks,
            DetailRow::CartAction(_) => DetailTable::CartActions,
            DetailRow::EmailCapture(_) => DetailTable::EmailCaptures,
            DetailRow::Dwell(_) => DetailTable::PageDwellTime,
            DetailRow::Interaction(_) => DetailTable::PageInteractions,
        }
    }

    pub fn event_id(&self) -> EventId {
        match self {
            DetailRow::Exposure(r) => r.event_id,
            DetailRow::Click(r) => r.event_id,
            DetailRow::CartAction(r) => r.event_id,
            DetailRow::EmailCapture(r) => r.event_id,
            DetailRow::Dwell(r) => r.event_id,
            DetailRow::Interaction(r) => r.event_id,
        }
    }
}
