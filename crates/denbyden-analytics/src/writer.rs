//! # Fan-out Writer
//!
//! Persists a batch of enriched events in two phases:
//! 1. All primary rows go to the event log in one call. Failure here fails the batch.
//! 2. Each event then gets a detail row keyed by its generated id. Detail failures are
//!    logged and skipped; the event log stays authoritative.

use crate::clock::Clock;
use crate::event::{AnalyticsEvent, EventPayload};
use crate::identity::IdentityResolver;
use crate::store::{
    CartActionRow, ClickRow, DetailRow, DwellRow, EmailCaptureRow, EventId, EventStore,
    ExposureRow, InteractionRow, PrimaryEventRow,
};
use anyhow::Context;
use std::sync::Arc;
use tracing::{debug, warn};

/// List type recorded for detail-page views written to the exposure table.
pub const DETAIL_LIST_TYPE: &str = "detail";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub primary_rows: usize,
    pub detail_rows: usize,
    pub detail_failures: usize,
    /// Events the store returned no id for; they have no detail row.
    pub missing_ids: usize,
}

#[derive(Clone)]
pub struct FanoutWriter {
    store: Arc<dyn EventStore>,
    identity: IdentityResolver,
    clock: Arc<dyn Clock>,
}

impl FanoutWriter {
    pub fn new(store: Arc<dyn EventStore>, identity: IdentityResolver, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            identity,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Writes `events` in order. Returns `Err` only when the primary insert fails.
    pub async fn write(&self, events: &[AnalyticsEvent]) -> anyhow::Result<WriteReport> {
        let rows: Vec<PrimaryEventRow> = events.iter().map(|e| self.primary_row(e)).collect();
        let ids = self
            .store
            .insert_events(&rows)
            .await
            .context("Primary event insert failed")?;

        let mut report = WriteReport {
            primary_rows: rows.len(),
            missing_ids: events.len().saturating_sub(ids.len()),
            ..Default::default()
        };
        if report.missing_ids > 0 {
            warn!(
                missing = report.missing_ids,
                "Event store returned fewer ids than rows; skipping their details"
            );
        }

        for (event, id) in events.iter().zip(ids) {
            let row = self.detail_row(id, event);
            match self.store.insert_detail(&row).await {
                Ok(()) => report.detail_rows += 1,
                Err(e) => {
                    report.detail_failures += 1;
                    warn!(
                        event_type = %event.event_type(),
                        table = %row.table(),
                        event_id = %id,
                        error = %e,
                        "Failed to insert event detail"
                    );
                }
            }
        }

        debug!(
            primary = report.primary_rows,
            details = report.detail_rows,
            failures = report.detail_failures,
            "Wrote analytics batch"
        );
        Ok(report)
    }

    /// Projects an event onto the event log, resolving any identity still missing.
    pub fn primary_row(&self, event: &AnalyticsEvent) -> PrimaryEventRow {
        let event_type = event.event_type();
        PrimaryEventRow {
            event_type,
            event_category: event_type.category(),
            page_type: event.page_type,
            page_url: event.page_url.clone().unwrap_or_default(),
            user_id: non_empty(&event.user_id).unwrap_or_else(|| self.identity.user_id()),
            session_id: non_empty(&event.session_id)
                .unwrap_or_else(|| self.identity.session_id()),
            timestamp: event.timestamp.unwrap_or_else(|| self.clock.now()),
        }
    }

    pub fn detail_row(&self, event_id: EventId, event: &AnalyticsEvent) -> DetailRow {
        match &event.payload {
            EventPayload::ProductExposure(e) => DetailRow::Exposure(ExposureRow {
                event_id,
                product_id: e.product_id.clone(),
                product_slug: e.product_slug.clone(),
                position: e.position,
                exposure_count: e.exposure_count,
                list_type: e.list_type.clone(),
                viewport_position: e.viewport_position,
            }),
            EventPayload::ProductDetailView(e) => DetailRow::Exposure(ExposureRow {
                event_id,
                product_id: e.product_id.clone(),
                product_slug: e.product_slug.clone(),
                position: 0,
                exposure_count: 1,
                list_type: DETAIL_LIST_TYPE.to_string(),
                viewport_position: None,
            }),
            EventPayload::ProductClick(e) => DetailRow::Click(ClickRow {
                event_id,
                product_id: e.product_id.clone(),
                product_slug: e.product_slug.clone(),
                position: e.position,
                click_type: e.click_type,
                source_page: e.source_page.clone(),
            }),
            EventPayload::AddToCart(e) => DetailRow::CartAction(CartActionRow {
                event_id,
                product_id: e.product_id.clone(),
                product_slug: e.product_slug.clone(),
                quantity: e.quantity,
                action_type: e.action_type,
                variant: e.variant.clone().filter(|v| !v.is_empty()),
                gift_wrapping: e.gift_wrapping,
                total_price: e.total_price,
            }),
            EventPayload::EmailSubmit(e) => DetailRow::EmailCapture(EmailCaptureRow {
                event_id,
                email: e.email.clone(),
                source_page: e.source_page.clone(),
                is_new_user: e.is_new_user,
                user_id: self.identity.user_id(),
            }),
            EventPayload::PageDwell(d) | EventPayload::PageBounce(d) => DetailRow::Dwell(DwellRow {
                event_id,
                page_type: event.page_type,
                page_url: event.page_url.clone().unwrap_or_default(),
                product_id: d.product_id.clone(),
                dwell_time_seconds: d.dwell_time_seconds,
                is_bounce: d.is_bounce,
            }),
            EventPayload::ImageSwipe(i)
            | EventPayload::SectionExpand(i)
            | EventPayload::GiftWrappingToggle(i)
            | EventPayload::FilterSelect(i) => DetailRow::Interaction(InteractionRow {
                event_id,
                interaction_type: interaction_type(&event.payload),
                product_id: i.product_id.clone(),
                interaction_data: i.interaction_data.clone(),
                scroll_depth: None,
            }),
            EventPayload::ScrollDepth(s) => DetailRow::Interaction(InteractionRow {
                event_id,
                interaction_type: interaction_type(&event.payload),
                product_id: None,
                interaction_data: s.interaction_data.clone(),
                scroll_depth: Some(s.scroll_depth),
            }),
        }
    }
}

fn interaction_type(payload: &EventPayload) -> String {
    payload
        .interaction_type()
        .unwrap_or_else(|| payload.event_type().as_str())
        .to_string()
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}
