//! # Analytics Pipeline
//!
//! The single entry point for producers. [`AnalyticsPipeline::track_event`] enriches an
//! event with identity, location and time, then either flushes it immediately or
//! queues it for the batch timer.
//!
//! ## Queue
//! A FIFO owned by the pipeline. A flush takes everything currently queued; if the
//! event log rejects the batch, the batch goes back to the front of the queue.
//!
//! ## Batch timer
//! Started lazily by the first batched event. Every `batch_interval` it flushes if the
//! queue has reached `batch_size`. It runs until [`AnalyticsPipeline::stop`] or until
//! the last pipeline handle is dropped.

use crate::beacon::{BeaconPayload, BeaconTransport, NoopBeacon};
use crate::clock::{Clock, SystemClock};
use crate::config::AnalyticsConfig;
use crate::event::AnalyticsEvent;
use crate::identity::{self, IdentityResolver};
use crate::page::{Page, Visibility};
use crate::store::EventStore;
use crate::writer::{FanoutWriter, WriteReport};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, warn};

#[derive(Debug)]
struct QueuedEvent {
    event: AnalyticsEvent,
    /// Failed primary inserts this event has been part of.
    attempts: u32,
}

/// What a single flush did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    pub written: WriteReport,
    /// Events put back on the queue after a failed primary insert.
    pub requeued: usize,
    /// Events discarded after exhausting `max_requeue_attempts`.
    pub dropped: usize,
}

impl FlushOutcome {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

struct Inner {
    config: AnalyticsConfig,
    writer: FanoutWriter,
    identity: IdentityResolver,
    page: Page,
    clock: Arc<dyn Clock>,
    beacon: Arc<dyn BeaconTransport>,
    queue: Mutex<VecDeque<QueuedEvent>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.abort();
        }
    }
}

/// Cheaply cloneable handle to a shared pipeline.
#[derive(Clone)]
pub struct AnalyticsPipeline {
    inner: Arc<Inner>,
}

pub struct PipelineBuilder {
    store: Arc<dyn EventStore>,
    config: AnalyticsConfig,
    identity: Option<IdentityResolver>,
    page: Option<Page>,
    clock: Option<Arc<dyn Clock>>,
    beacon: Option<Arc<dyn BeaconTransport>>,
}

impl PipelineBuilder {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            config: AnalyticsConfig::default(),
            identity: None,
            page: None,
            clock: None,
            beacon: None,
        }
    }

    pub fn with_config(mut self, config: AnalyticsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_identity(mut self, identity: IdentityResolver) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_beacon(mut self, beacon: Arc<dyn BeaconTransport>) -> Self {
        self.beacon = Some(beacon);
        self
    }

    pub fn build(self) -> AnalyticsPipeline {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let identity = self
            .identity
            .unwrap_or_else(|| IdentityResolver::in_memory().with_clock(clock.clone()));
        let writer = FanoutWriter::new(self.store, identity.clone(), clock.clone());

        AnalyticsPipeline {
            inner: Arc::new(Inner {
                config: self.config,
                writer,
                identity,
                page: self.page.unwrap_or_default(),
                clock,
                beacon: self.beacon.unwrap_or_else(|| Arc::new(NoopBeacon)),
                queue: Mutex::new(VecDeque::new()),
                timer: Mutex::new(None),
            }),
        }
    }
}

impl AnalyticsPipeline {
    pub fn builder(store: Arc<dyn EventStore>) -> PipelineBuilder {
        PipelineBuilder::new(store)
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.inner.config
    }

    pub fn identity(&self) -> &IdentityResolver {
        &self.inner.identity
    }

    pub fn page(&self) -> &Page {
        &self.inner.page
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.inner.clock.clone()
    }

    /// The referrer's path, or `"direct"`.
    pub fn source_page(&self) -> String {
        self.inner.page.source_page()
    }

    pub fn is_new_user(&self) -> bool {
        identity::is_new_user(self.inner.identity.durable())
    }

    /// Records an event. Never fails: delivery problems are logged, not returned.
    ///
    /// Dwell payloads are reclassified from their duration; invalid cart lines are
    /// logged and dropped.
    pub async fn track_event(&self, event: AnalyticsEvent) {
        let event_type = event.event_type();
        let event = match event.normalized() {
            Ok(event) => event,
            Err(e) => {
                warn!(event_type = %event_type, error = %e, "Dropping invalid analytics event");
                return;
            }
        };
        let enriched = self.enrich(&event);
        let event_type = enriched.event_type();
        self.enqueue(enriched);

        if event_type.is_immediate() {
            debug!(event_type = %event_type, "Delivering analytics event immediately");
            self.flush().await;
        } else {
            self.start_batch_timer();
        }
    }

    /// Returns a copy of `event` with identity, page url and timestamp filled in
    /// wherever the caller left them empty.
    pub fn enrich(&self, event: &AnalyticsEvent) -> AnalyticsEvent {
        let mut enriched = event.clone();
        fill_if_empty(&mut enriched.user_id, || self.inner.identity.user_id());
        fill_if_empty(&mut enriched.session_id, || self.inner.identity.session_id());
        fill_if_empty(&mut enriched.page_url, || self.inner.page.path());
        if enriched.timestamp.is_none() {
            enriched.timestamp = Some(self.inner.clock.now());
        }
        enriched
    }

    fn enqueue(&self, event: AnalyticsEvent) {
        self.inner
            .queue
            .lock()
            .push_back(QueuedEvent { event, attempts: 0 });
    }

    pub fn queue_len(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Snapshot of the queued events, oldest first.
    pub fn pending_events(&self) -> Vec<AnalyticsEvent> {
        self.inner
            .queue
            .lock()
            .iter()
            .map(|q| q.event.clone())
            .collect()
    }

    /// Starts the batch timer unless it is already running. Outside a Tokio runtime
    /// the timer is not started and queued events wait for an explicit flush.
    pub fn start_batch_timer(&self) {
        let mut timer = self.inner.timer.lock();
        if timer.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime; analytics batch timer not started");
            return;
        };

        let period = self.inner.config.batch_interval().max(Duration::from_millis(1));
        let batch_size = self.inner.config.batch_size;
        let pipeline = Arc::downgrade(&self.inner);
        *timer = Some(runtime.spawn(batch_timer(pipeline, period, batch_size)));
        debug!(?period, batch_size, "Started analytics batch timer");
    }

    pub fn is_timer_running(&self) -> bool {
        self.inner
            .timer
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Stops the batch timer. Queued events stay queued.
    pub fn stop(&self) {
        if let Some(handle) = self.inner.timer.lock().take() {
            handle.abort();
            debug!("Stopped analytics batch timer");
        }
    }

    /// Stops the timer and flushes whatever is left.
    pub async fn shutdown(&self) -> FlushOutcome {
        self.stop();
        self.flush().await
    }

    /// Takes every queued event and writes it to the store.
    #[tracing::instrument(skip(self))]
    pub async fn flush(&self) -> FlushOutcome {
        let batch: Vec<QueuedEvent> = self.inner.queue.lock().drain(..).collect();
        if batch.is_empty() {
            return FlushOutcome::default();
        }

        let events: Vec<AnalyticsEvent> = batch.iter().map(|q| q.event.clone()).collect();
        match self.inner.writer.write(&events).await {
            Ok(written) => FlushOutcome {
                written,
                ..Default::default()
            },
            Err(e) => {
                error!(events = batch.len(), error = %e, "Failed to flush analytics batch");
                self.requeue(batch)
            }
        }
    }

    /// Puts a failed batch back at the front of the queue, ahead of anything that
    /// arrived while it was in flight.
    fn requeue(&self, batch: Vec<QueuedEvent>) -> FlushOutcome {
        let limit = self.inner.config.max_requeue_attempts;
        let mut retained = Vec::with_capacity(batch.len());
        let mut dropped = 0;
        for mut queued in batch {
            queued.attempts += 1;
            if limit.is_some_and(|max| queued.attempts > max) {
                dropped += 1;
            } else {
                retained.push(queued);
            }
        }
        if dropped > 0 {
            warn!(dropped, "Dropping analytics events after repeated flush failures");
        }

        let requeued = retained.len();
        let mut queue = self.inner.queue.lock();
        for queued in retained.into_iter().rev() {
            queue.push_front(queued);
        }
        FlushOutcome {
            requeued,
            dropped,
            ..Default::default()
        }
    }

    /// Page is being torn down: beacon the queue, then attempt a normal flush.
    ///
    /// The two paths may both deliver the same events.
    pub async fn on_before_unload(&self) -> FlushOutcome {
        let pending = self.pending_events();
        if pending.is_empty() {
            return FlushOutcome::default();
        }

        match BeaconPayload::from_events(&pending) {
            Ok(payload) => self.inner.beacon.send(payload),
            Err(e) => warn!(error = %e, "Failed to encode beacon payload"),
        }
        self.flush().await
    }

    pub async fn on_visibility_change(&self, visibility: Visibility) -> FlushOutcome {
        if visibility == Visibility::Hidden && self.queue_len() > 0 {
            return self.flush().await;
        }
        FlushOutcome::default()
    }
}

async fn batch_timer(weak: Weak<Inner>, period: Duration, batch_size: usize) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        let Some(inner) = weak.upgrade() else {
            break;
        };
        let pipeline = AnalyticsPipeline { inner };
        if pipeline.queue_len() >= batch_size {
            pipeline.flush().await;
        }
    }
}

fn fill_if_empty(slot: &mut Option<String>, resolve: impl FnOnce() -> String) {
    if slot.as_deref().is_none_or(str::is_empty) {
        *slot = Some(resolve());
    }
}
