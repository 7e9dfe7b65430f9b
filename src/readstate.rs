use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rows;
use crate::view::{HostView, PageMode, NEW_COMMENT_CLASS};

/// Key the read-state blob is persisted under.
pub const READ_STATE_KEY: &str = "read-comments";

/// Read records expire three days after the first visit.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3 * 24 * 60 * 60);

/// Durable key-value persistence, as the host provides it. Writes are
/// last-writer-wins across processes; the data is advisory.
pub trait BlobStore {
    fn get_blob(&self, key: &str) -> Result<Option<String>>;
    fn set_blob(&self, key: &str, value: &str) -> Result<()>;
}

impl<T: BlobStore + ?Sized> BlobStore for &T {
    fn get_blob(&self, key: &str) -> Result<Option<String>> {
        (**self).get_blob(key)
    }

    fn set_blob(&self, key: &str, value: &str) -> Result<()> {
        (**self).set_blob(key, value)
    }
}

/// Per tree-root record of seen comment ids. `expiry` is a millisecond
/// timestamp assigned on first visit and kept on later ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRecord {
    pub expiry: i64,
    pub seen: BTreeSet<String>,
}

/// Persisted mapping from tree-root id to seen-comment record. Lazily
/// loaded on first access, purged of expired entries before any read or
/// write, and written back after each mutation.
pub struct ReadStateStore<S> {
    store: S,
    ttl_ms: i64,
    records: Option<HashMap<String, ReadRecord>>,
}

impl<S: BlobStore> ReadStateStore<S> {
    pub fn new(store: S) -> Self {
        Self::with_ttl(store, DEFAULT_TTL)
    }

    pub fn with_ttl(store: S, ttl: Duration) -> Self {
        ReadStateStore {
            store,
            ttl_ms: ttl.as_millis() as i64,
            records: None,
        }
    }

    /// The subset of `current_ids` not yet seen for `root_id`. A first
    /// visit has no new comments by definition: everything becomes the
    /// baseline.
    pub fn unseen_since(&mut self, root_id: &str, current_ids: &[String]) -> Result<Vec<String>> {
        self.unseen_since_at(root_id, current_ids, Utc::now())
    }

    pub fn unseen_since_at(
        &mut self,
        root_id: &str,
        current_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let records = self.load_at(now)?;
        Ok(match records.get(root_id) {
            None => Vec::new(),
            Some(record) => current_ids
                .iter()
                .filter(|id| !record.seen.contains(*id))
                .cloned()
                .collect(),
        })
    }

    /// Merge `current_ids` into the seen set for `root_id` and persist. Call
    /// `unseen_since` first; this erases the "new since last visit" signal.
    pub fn record_visit(&mut self, root_id: &str, current_ids: &[String]) -> Result<()> {
        self.record_visit_at(root_id, current_ids, Utc::now())
    }

    pub fn record_visit_at(
        &mut self,
        root_id: &str,
        current_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let expiry = now.timestamp_millis() + self.ttl_ms;
        let records = self.load_at(now)?;
        let record = records
            .entry(root_id.to_string())
            .or_insert_with(|| ReadRecord {
                expiry,
                seen: BTreeSet::new(),
            });
        record.seen.extend(current_ids.iter().cloned());
        self.persist()
    }

    /// Drop every expired record and persist. Returns how many were removed.
    pub fn prune(&mut self) -> Result<usize> {
        self.prune_at(Utc::now())
    }

    pub fn prune_at(&mut self, now: DateTime<Utc>) -> Result<usize> {
        // Count against what is durably stored, not the in-memory cache.
        self.records = None;
        let raw = self.store.get_blob(READ_STATE_KEY)?;
        let stored = raw
            .as_deref()
            .and_then(|data| serde_json::from_str::<HashMap<String, ReadRecord>>(data).ok())
            .map(|records| records.len())
            .unwrap_or(0);
        let kept = self.load_at(now)?.len();
        self.persist()?;
        Ok(stored.saturating_sub(kept))
    }

    fn load_at(&mut self, now: DateTime<Utc>) -> Result<&mut HashMap<String, ReadRecord>> {
        if self.records.is_none() {
            let raw = self
                .store
                .get_blob(READ_STATE_KEY)
                .context("read-state: load blob")?;
            // A malformed blob is treated as an empty store, never an error.
            let records: HashMap<String, ReadRecord> = raw
                .as_deref()
                .and_then(|data| serde_json::from_str(data).ok())
                .unwrap_or_default();
            self.records = Some(records);
        }
        let records = self.records.as_mut().unwrap();
        let cutoff = now.timestamp_millis();
        records.retain(|_, record| record.expiry >= cutoff);
        Ok(records)
    }

    fn persist(&self) -> Result<()> {
        let records = self.records.as_ref().expect("records loaded");
        let data = serde_json::to_string(records).context("read-state: serialize blob")?;
        self.store
            .set_blob(READ_STATE_KEY, &data)
            .context("read-state: persist blob")
    }
}

/// Highlight the rows of `view` whose comments are unseen since the last
/// visit to `root_id`, then record the visit. Returns how many rows were
/// highlighted.
pub fn highlight_unseen<V: HostView, S: BlobStore>(
    view: &mut V,
    store: &mut ReadStateStore<S>,
    root_id: &str,
) -> Result<usize> {
    let rows = rows::current_rows(view, PageMode::Tree);
    let current_ids: Vec<String> = rows.iter().filter_map(|row| row.id.clone()).collect();

    let unseen = store.unseen_since(root_id, &current_ids)?;
    let mut marked = 0;
    for row in &rows {
        let Some(id) = &row.id else { continue };
        if !unseen.contains(id) {
            continue;
        }
        if let Some(indent) = view.indent_region(row.node) {
            view.add_class(indent, NEW_COMMENT_CLASS);
            marked += 1;
        }
    }

    store.record_visit(root_id, &current_ids)?;
    Ok(marked)
}
