use crate::event::{AnalyticsEvent, EventPayload, PageType};
use crate::page::Visibility;
use crate::pipeline::AnalyticsPipeline;
use chrono::{DateTime, Utc};

/// Measures how long a page stayed mounted and reports it once as `page_dwell` or
/// `page_bounce`, whichever of unload, hide or unmount happens first.
pub struct PageDwell {
    pipeline: AnalyticsPipeline,
    page_type: PageType,
    product_id: Option<String>,
    mounted_at: DateTime<Utc>,
    fired: bool,
}

impl PageDwell {
    pub fn mount(pipeline: &AnalyticsPipeline, page_type: PageType, product_id: Option<String>) -> Self {
        Self {
            pipeline: pipeline.clone(),
            page_type,
            product_id,
            mounted_at: pipeline.clock().now(),
            fired: false,
        }
    }

    /// Whole seconds since mount, rounded down.
    pub fn elapsed_seconds(&self) -> u64 {
        let elapsed = self.pipeline.clock().now() - self.mounted_at;
        u64::try_from(elapsed.num_seconds()).unwrap_or(0)
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub async fn on_before_unload(&mut self) -> bool {
        self.fire().await
    }

    pub async fn on_visibility_change(&mut self, visibility: Visibility) -> bool {
        if visibility != Visibility::Hidden {
            return false;
        }
        self.fire().await
    }

    pub async fn unmount(mut self) -> bool {
        self.fire().await
    }

    async fn fire(&mut self) -> bool {
        if self.fired {
            return false;
        }
        self.fired = true;

        let payload = EventPayload::dwell(self.elapsed_seconds(), self.product_id.clone());
        self.pipeline
            .track_event(AnalyticsEvent::new(self.page_type, payload))
            .await;
        true
    }
}
