use super::{DetailRow, DetailTable, EventId, EventStore, PrimaryEventRow};
use anyhow::bail;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MemoryState {
    events: Vec<(EventId, PrimaryEventRow)>,
    details: Vec<DetailRow>,
    last_id: i64,
    primary_calls: usize,
    failing_primary: u32,
    failing_tables: HashSet<DetailTable>,
    id_limit: Option<usize>,
}

/// In-process event store, for tests and local development.
///
/// Failures can be injected per call (primary log) or per table (details).
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` primary inserts fail without writing anything.
    pub fn fail_next_primary_inserts(&self, n: u32) {
        self.state.lock().failing_primary = n;
    }

    pub fn fail_detail_table(&self, table: DetailTable) {
        self.state.lock().failing_tables.insert(table);
    }

    pub fn heal_detail_table(&self, table: DetailTable) {
        self.state.lock().failing_tables.remove(&table);
    }

    /// Returns at most `n` generated ids per primary insert, like a backend that
    /// truncates its `RETURNING` set.
    pub fn limit_returned_ids(&self, n: usize) {
        self.state.lock().id_limit = Some(n);
    }

    pub fn events(&self) -> Vec<PrimaryEventRow> {
        self.state
            .lock()
            .events
            .iter()
            .map(|(_, row)| row.clone())
            .collect()
    }

    pub fn event_ids(&self) -> Vec<EventId> {
        self.state.lock().events.iter().map(|(id, _)| *id).collect()
    }

    pub fn details(&self) -> Vec<DetailRow> {
        self.state.lock().details.clone()
    }

    pub fn details_in(&self, table: DetailTable) -> Vec<DetailRow> {
        self.state
            .lock()
            .details
            .iter()
            .filter(|row| row.table() == table)
            .cloned()
            .collect()
    }

    pub fn primary_insert_calls(&self) -> usize {
        self.state.lock().primary_calls
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert_events(&self, rows: &[PrimaryEventRow]) -> anyhow::Result<Vec<EventId>> {
        let mut state = self.state.lock();
        state.primary_calls += 1;
        if state.failing_primary > 0 {
            state.failing_primary -= 1;
            bail!("event log unavailable");
        }

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            state.last_id += 1;
            let id = EventId(state.last_id);
            state.events.push((id, row.clone()));
            ids.push(id);
        }
        if let Some(limit) = state.id_limit {
            ids.truncate(limit);
        }
        Ok(ids)
    }

    async fn insert_detail(&self, row: &DetailRow) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        if state.failing_tables.contains(&row.table()) {
            bail!("{} unavailable", row.table());
        }
        state.details.push(row.clone());
        Ok(())
    }
}
