//! # Event Store
//!
//! The backend the pipeline persists to. A flush writes one primary row per event to
//! the event log, receives the generated ids back in call order, then writes one
//! detail row per event into a type-specific table keyed by that id.

pub mod memory;
pub mod rows;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;
pub use rows::*;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use async_trait::async_trait;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Inserts primary event rows and returns their generated ids in the same order.
    async fn insert_events(&self, rows: &[PrimaryEventRow]) -> anyhow::Result<Vec<EventId>>;

    /// Inserts a single detail row into the table selected by its variant.
    async fn insert_detail(&self, row: &DetailRow) -> anyhow::Result<()>;
}

/// Discards everything. No ids are returned, so no detail rows are attempted.
#[derive(Debug, Clone, Default)]
pub struct NoopStore;

#[async_trait]
impl EventStore for NoopStore {
    async fn insert_events(&self, _rows: &[PrimaryEventRow]) -> anyhow::Result<Vec<EventId>> {
        Ok(vec![])
    }

    async fn insert_detail(&self, _row: &DetailRow) -> anyhow::Result<()> {
        Ok(())
    }
}
