//! # DenbyDen Analytics
//!
//! Behavioral analytics for the DenbyDen storefront: typed interaction events, an
//! in-memory queue with immediate and batched delivery, and a fan-out writer that
//! persists each event to a primary log plus a type-specific detail table.
//!
//! ```rust,no_run
//! use denbyden_analytics::producers::{ProductClick, ProductRef};
//! use denbyden_analytics::event::{ClickType, PageType};
//! use denbyden_analytics::{AnalyticsPipeline, store::MemoryStore};
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let pipeline = AnalyticsPipeline::builder(Arc::new(MemoryStore::new())).build();
//! let click = ProductClick::new(
//!     &pipeline,
//!     ProductRef::new("p-1", "cozy-mug"),
//!     3,
//!     ClickType::CardClick,
//!     PageType::Shop,
//! );
//! click.track().await;
//! pipeline.shutdown().await;
//! # }
//! ```

pub mod beacon;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod page;
pub mod pipeline;
pub mod producers;
pub mod store;
pub mod writer;

pub use config::AnalyticsConfig;
pub use error::{ConfigError, EventError};
pub use event::{AnalyticsEvent, EventCategory, EventPayload, EventType, PageType};
pub use pipeline::{AnalyticsPipeline, FlushOutcome, PipelineBuilder};
pub use store::EventStore;
