//! # Identity
//!
//! Visitors are identified by two strings:
//! - `user_id`, kept in durable storage and stable across sessions.
//! - `session_id`, kept in session-scoped storage and cleared with the session.
//!
//! Both are created lazily on first read. When a host has no storage substrate
//! (e.g. a server-side render pass) both resolve to the empty string.

use crate::clock::{Clock, SystemClock};
use anyhow::{Context, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const USER_ID_KEY: &str = "analytics_user_id";
pub const SESSION_ID_KEY: &str = "analytics_session_id";
/// Set in durable storage once the visitor has subscribed to the newsletter.
pub const SUBSCRIBED_KEY: &str = "hasSubscribed";

const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A string key/value store, the native analogue of browser local/session storage.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Process-lifetime storage. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

/// Durable storage backed by a JSON object on disk.
///
/// The whole file is rewritten on every mutation; it only ever holds a handful of keys.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = std::fs::read(&path)
                .with_context(|| format!("Failed to read storage file {}", path.display()))?;
            serde_json::from_slice(&raw)
                .with_context(|| format!("Corrupt storage file {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create storage directory {}", parent.display())
                })?;
            }
        }
        let raw = serde_json::to_vec_pretty(entries)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("Failed to write storage file {}", self.path.display()))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.remove(key);
        self.persist(&entries)
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.clear();
        self.persist(&entries)
    }
}

/// Resolves (and lazily creates) the visitor's user and session identifiers.
#[derive(Clone)]
pub struct IdentityResolver {
    durable: Option<Arc<dyn KeyValueStorage>>,
    session: Option<Arc<dyn KeyValueStorage>>,
    clock: Arc<dyn Clock>,
}

impl IdentityResolver {
    pub fn new(
        durable: Option<Arc<dyn KeyValueStorage>>,
        session: Option<Arc<dyn KeyValueStorage>>,
    ) -> Self {
        Self {
            durable,
            session,
            clock: Arc::new(SystemClock),
        }
    }

    /// A resolver with no storage substrate; every identity resolves to `""`.
    pub fn detached() -> Self {
        Self::new(None, None)
    }

    /// Process-local storage for both substrates.
    pub fn in_memory() -> Self {
        Self::new(
            Some(Arc::new(MemoryStorage::new())),
            Some(Arc::new(MemoryStorage::new())),
        )
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn durable(&self) -> Option<&dyn KeyValueStorage> {
        self.durable.as_deref()
    }

    pub fn session(&self) -> Option<&dyn KeyValueStorage> {
        self.session.as_deref()
    }

    pub fn user_id(&self) -> String {
        self.resolve(self.durable.as_deref(), USER_ID_KEY, "user")
    }

    pub fn session_id(&self) -> String {
        self.resolve(self.session.as_deref(), SESSION_ID_KEY, "session")
    }

    fn resolve(&self, storage: Option<&dyn KeyValueStorage>, key: &str, prefix: &str) -> String {
        let Some(storage) = storage else {
            return String::new();
        };
        if let Some(existing) = storage.get(key).filter(|v| !v.is_empty()) {
            return existing;
        }

        let id = generate_id(prefix, self.clock.now().timestamp_millis());
        if let Err(e) = storage.set(key, &id) {
            // The id is still usable for this process; it just won't survive a restart.
            tracing::warn!(key, error = %e, "Failed to persist analytics identity");
        }
        tracing::debug!(key, id = %id, "Created analytics identity");
        id
    }
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("durable", &self.durable.is_some())
            .field("session", &self.session.is_some())
            .finish()
    }
}

/// Builds `<prefix>_<epoch-millis>_<9 base36 chars>`.
pub fn generate_id(prefix: &str, epoch_millis: i64) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{prefix}_{epoch_millis}_{suffix}")
}

/// True until the visitor has subscribed. Hosts without durable storage are always new,
/// and an empty flag counts as unset.
pub fn is_new_user(durable: Option<&dyn KeyValueStorage>) -> bool {
    durable.is_none_or(|storage| storage.get(SUBSCRIBED_KEY).is_none_or(|v| v.is_empty()))
}

pub fn mark_subscribed(durable: &dyn KeyValueStorage) -> Result<()> {
    durable.set(SUBSCRIBED_KEY, "true")
}
