use super::{DetailRow, DetailTable, EventId, EventStore, PrimaryEventRow};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type TEXT NOT NULL,
    event_category TEXT NOT NULL,
    page_type TEXT NOT NULL,
    page_url TEXT NOT NULL,
    user_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    timestamp DATETIME NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id);
CREATE TABLE IF NOT EXISTS product_exposures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id INTEGER NOT NULL,
    product_id TEXT NOT NULL,
    product_slug TEXT NOT NULL,
    position INTEGER NOT NULL,
    exposure_count INTEGER NOT NULL DEFAULT 1,
    list_type TEXT NOT NULL,
    viewport_position TEXT,
    FOREIGN KEY(event_id) REFERENCES events(id)
);
CREATE TABLE IF NOT EXISTS product_clicks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id INTEGER NOT NULL,
    product_id TEXT NOT NULL,
    product_slug TEXT NOT NULL,
    position INTEGER NOT NULL,
    click_type TEXT NOT NULL,
    source_page TEXT NOT NULL,
    FOREIGN KEY(event_id) REFERENCES events(id)
);
CREATE TABLE IF NOT EXISTS cart_actions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id INTEGER NOT NULL,
    product_id TEXT NOT NULL,
    product_slug TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    action_type TEXT NOT NULL, -- 'add', 'update' or 'remove'
    variant TEXT,
    gift_wrapping BOOLEAN NOT NULL DEFAULT 0,
    total_price REAL NOT NULL,
    FOREIGN KEY(event_id) REFERENCES events(id)
);
CREATE TABLE IF NOT EXISTS email_captures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id INTEGER NOT NULL,
    email TEXT NOT NULL,
    source_page TEXT NOT NULL,
    is_new_user BOOLEAN NOT NULL,
    user_id TEXT NOT NULL,
    FOREIGN KEY(event_id) REFERENCES events(id)
);
CREATE TABLE IF NOT EXISTS page_dwell_time (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id INTEGER NOT NULL,
    page_type TEXT NOT NULL,
    page_url TEXT NOT NULL,
    product_id TEXT,
    dwell_time_seconds INTEGER NOT NULL,
    is_bounce BOOLEAN NOT NULL,
    FOREIGN KEY(event_id) REFERENCES events(id)
);
CREATE TABLE IF NOT EXISTS page_interactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id INTEGER NOT NULL,
    interaction_type TEXT NOT NULL,
    product_id TEXT,
    interaction_data TEXT NOT NULL DEFAULT '{}', -- JSON object
    scroll_depth INTEGER,
    FOREIGN KEY(event_id) REFERENCES events(id)
);
"#;

/// A primary event row as read back from the log.
#[derive(Clone, Debug, Serialize)]
pub struct StoredEvent {
    pub id: EventId,
    pub event_type: String,
    pub event_category: String,
    pub page_type: String,
    pub page_url: String,
    pub user_id: String,
    pub session_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// SQLite-backed event log and detail tables.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn new(db_url: &str) -> Result<Self> {
        let connection_options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to an in-memory database gets its own empty database.
        let pool_options = if db_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(connection_options)
            .await
            .with_context(|| format!("Failed to open analytics store at {db_url}"))?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn count_events(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM events")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    pub async fn count_details(&self, table: DetailTable) -> Result<i64> {
        // Table names come from a closed enum, never from input.
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", table.as_str()))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    pub async fn recent_events(&self, limit: i64) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, event_category, page_type, page_url, user_id, session_id, timestamp
            FROM events
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(StoredEvent {
                id: EventId(row.try_get("id")?),
                event_type: row.try_get("event_type")?,
                event_category: row.try_get("event_category")?,
                page_type: row.try_get("page_type")?,
                page_url: row.try_get("page_url")?,
                user_id: row.try_get("user_id")?,
                session_id: row.try_get("session_id")?,
                timestamp: row.try_get("timestamp")?,
            });
        }
        Ok(events)
    }

    /// The `interaction_data` JSON stored for an event, if it has an interaction row.
    pub async fn interaction_data(&self, event_id: EventId) -> Result<Option<serde_json::Value>> {
        let row = sqlx::query("SELECT interaction_data FROM page_interactions WHERE event_id = ?")
            .bind(event_id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let raw: String = row.try_get("interaction_data")?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn insert_events(&self, rows: &[PrimaryEventRow]) -> Result<Vec<EventId>> {
        if rows.is_empty() {
            return Ok(vec![]);
        }

        // One transaction: either the whole batch lands in the log or none of it does.
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let result = sqlx::query(
                r#"
                INSERT INTO events (event_type, event_category, page_type, page_url, user_id, session_id, timestamp)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(row.event_type.as_str())
            .bind(row.event_category.as_str())
            .bind(row.page_type.as_str())
            .bind(&row.page_url)
            .bind(&row.user_id)
            .bind(&row.session_id)
            .bind(row.timestamp)
            .execute(&mut *tx)
            .await?;
            ids.push(EventId(result.last_insert_rowid()));
        }
        tx.commit().await?;
        Ok(ids)
    }

    async fn insert_detail(&self, row: &DetailRow) -> Result<()> {
        match row {
            DetailRow::Exposure(r) => {
                sqlx::query(
                    r#"
                    INSERT INTO product_exposures
                        (event_id, product_id, product_slug, position, exposure_count, list_type, viewport_position)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(r.event_id.0)
                .bind(&r.product_id)
                .bind(&r.product_slug)
                .bind(i64::from(r.position))
                .bind(i64::from(r.exposure_count))
                .bind(&r.list_type)
                .bind(r.viewport_position.map(|v| v.as_str()))
                .execute(&self.pool)
                .await?;
            }
            DetailRow::Click(r) => {
                sqlx::query(
                    r#"
                    INSERT INTO product_clicks
                        (event_id, product_id, product_slug, position, click_type, source_page)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(r.event_id.0)
                .bind(&r.product_id)
                .bind(&r.product_slug)
                .bind(i64::from(r.position))
                .bind(r.click_type.as_str())
                .bind(&r.source_page)
                .execute(&self.pool)
                .await?;
            }
            DetailRow::CartAction(r) => {
                sqlx::query(
                    r#"
                    INSERT INTO cart_actions
                        (event_id, product_id, product_slug, quantity, action_type, variant, gift_wrapping, total_price)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(r.event_id.0)
                .bind(&r.product_id)
                .bind(&r.product_slug)
                .bind(i64::from(r.quantity))
                .bind(r.action_type.as_str())
                .bind(r.variant.as_deref())
                .bind(r.gift_wrapping)
                .bind(r.total_price)
                .execute(&self.pool)
                .await?;
            }
            DetailRow::EmailCapture(r) => {
                sqlx::query(
                    r#"
                    INSERT INTO email_captures (event_id, email, source_page, is_new_user, user_id)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(r.event_id.0)
                .bind(&r.email)
                .bind(&r.source_page)
                .bind(r.is_new_user)
                .bind(&r.user_id)
                .execute(&self.pool)
                .await?;
            }
            DetailRow::Dwell(r) => {
                sqlx::query(
                    r#"
                    INSERT INTO page_dwell_time
                        (event_id, page_type, page_url, product_id, dwell_time_seconds, is_bounce)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(r.event_id.0)
                .bind(r.page_type.as_str())
                .bind(&r.page_url)
                .bind(r.product_id.as_deref())
                .bind(i64::try_from(r.dwell_time_seconds).unwrap_or(i64::MAX))
                .bind(r.is_bounce)
                .execute(&self.pool)
                .await?;
            }
            DetailRow::Interaction(r) => {
                let data = serde_json::to_string(&r.interaction_data)
                    .context("Failed to encode interaction data")?;
                sqlx::query(
                    r#"
                    INSERT INTO page_interactions
                        (event_id, interaction_type, product_id, interaction_data, scroll_depth)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(r.event_id.0)
                .bind(&r.interaction_type)
                .bind(r.product_id.as_deref())
                .bind(data)
                .bind(r.scroll_depth.map(|d| i64::from(d.percent())))
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }
}
