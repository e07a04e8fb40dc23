use crate::event::{AnalyticsEvent, EventPayload, PageType, ScrollThreshold};
use crate::pipeline::AnalyticsPipeline;
use std::collections::BTreeSet;

/// Document scroll state at the moment of a scroll signal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub client_height: f64,
    pub scroll_height: f64,
}

impl ScrollMetrics {
    /// Percentage of the document seen so far, rounded down.
    pub fn percentage(&self) -> u32 {
        if self.scroll_height <= 0.0 {
            return 0;
        }
        let pct = ((self.scroll_top + self.client_height) / self.scroll_height * 100.0).floor();
        pct.max(0.0) as u32
    }
}

type DepthCallback = Box<dyn Fn(ScrollThreshold) + Send + Sync>;

/// Fires one `scroll_depth` event per milestone (25/50/75/100) per mount.
pub struct ScrollDepth {
    pipeline: AnalyticsPipeline,
    page_type: PageType,
    reached: BTreeSet<ScrollThreshold>,
    on_depth_reached: Option<DepthCallback>,
}

impl ScrollDepth {
    pub fn mount(pipeline: &AnalyticsPipeline, page_type: PageType) -> Self {
        Self {
            pipeline: pipeline.clone(),
            page_type,
            reached: BTreeSet::new(),
            on_depth_reached: None,
        }
    }

    pub fn on_depth_reached(mut self, callback: impl Fn(ScrollThreshold) + Send + Sync + 'static) -> Self {
        self.on_depth_reached = Some(Box::new(callback));
        self
    }

    pub fn reached(&self) -> impl Iterator<Item = ScrollThreshold> + '_ {
        self.reached.iter().copied()
    }

    /// Tracks every milestone newly passed. Returns the milestones fired by this call.
    pub async fn on_scroll(&mut self, metrics: ScrollMetrics) -> Vec<ScrollThreshold> {
        let pct = metrics.percentage();
        let mut fired = Vec::new();

        for threshold in ScrollThreshold::ALL {
            if pct < u32::from(threshold.percent()) || !self.reached.insert(threshold) {
                continue;
            }
            let event = AnalyticsEvent::new(self.page_type, EventPayload::scroll_depth(threshold));
            self.pipeline.track_event(event).await;
            if let Some(callback) = &self.on_depth_reached {
                callback(threshold);
            }
            fired.push(threshold);
        }
        fired
    }
}
