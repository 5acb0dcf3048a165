//! Per-contact favorites, pins, notes and last-touched stamps that live on
//! the client only.

use std::collections::{BTreeMap, HashSet};
use std::mem;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::db::Database;
use crate::model::{format_iso, ContactId};

/// Key of the single persisted record in the key/value table.
pub const META_KEY: &str = "contactMeta";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Metadata {
    pub favorites: Vec<ContactId>,
    pub pinned: Vec<ContactId>,
    pub notes: BTreeMap<String, String>,
    pub last_touched: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaEntry {
    pub favorite: bool,
    pub pinned: bool,
    pub note: String,
    pub last_touched: Option<String>,
}

impl Metadata {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn is_favorite(&self, id: &ContactId) -> bool {
        self.favorites.contains(id)
    }

    pub fn is_pinned(&self, id: &ContactId) -> bool {
        self.pinned.contains(id)
    }

    pub fn note(&self, id: &ContactId) -> Option<&str> {
        self.notes.get(id.as_str()).map(String::as_str)
    }

    pub fn last_touched(&self, id: &ContactId) -> Option<&str> {
        self.last_touched.get(id.as_str()).map(String::as_str)
    }

    pub fn entry(&self, id: &ContactId) -> Option<MetaEntry> {
        let entry = MetaEntry {
            favorite: self.is_favorite(id),
            pinned: self.is_pinned(id),
            note: self.note(id).unwrap_or_default().to_string(),
            last_touched: self.last_touched(id).map(str::to_string),
        };
        let empty = !entry.favorite
            && !entry.pinned
            && !self.notes.contains_key(id.as_str())
            && entry.last_touched.is_none();
        (!empty).then_some(entry)
    }

    #[must_use]
    pub fn toggle_favorite(mut self, id: &ContactId, now: OffsetDateTime) -> Self {
        toggle_front(&mut self.favorites, id);
        self.touched(id, now)
    }

    #[must_use]
    pub fn toggle_pinned(mut self, id: &ContactId, now: OffsetDateTime) -> Self {
        toggle_front(&mut self.pinned, id);
        self.touched(id, now)
    }

    /// Replace the note verbatim.
    #[must_use]
    pub fn with_note(mut self, id: &ContactId, text: impl Into<String>, now: OffsetDateTime) -> Self {
        self.notes.insert(id.to_string(), text.into());
        self.touched(id, now)
    }

    #[must_use]
    pub fn touched(mut self, id: &ContactId, now: OffsetDateTime) -> Self {
        self.last_touched.insert(id.to_string(), format_iso(now));
        self
    }

    #[must_use]
    pub fn forget(mut self, id: &ContactId) -> Self {
        self.favorites.retain(|f| f != id);
        self.pinned.retain(|p| p != id);
        self.notes.remove(id.as_str());
        self.last_touched.remove(id.as_str());
        self
    }

    /// Keep only entries whose id is in `current`.
    #[must_use]
    pub fn reconciled(mut self, current: &HashSet<ContactId>) -> Self {
        self.favorites.retain(|id| current.contains(id));
        self.pinned.retain(|id| current.contains(id));
        self.notes
            .retain(|id, _| current.contains(&ContactId::from(id.as_str())));
        self.last_touched
            .retain(|id, _| current.contains(&ContactId::from(id.as_str())));
        self
    }
}

// Removing when present, otherwise inserting at the front.
fn toggle_front(list: &mut Vec<ContactId>, id: &ContactId) {
    if list.contains(id) {
        list.retain(|item| item != id);
    } else {
        list.insert(0, id.clone());
    }
}

/// The metadata record bound to its durable copy. Every mutation is written
/// back before it returns.
pub struct MetaStore {
    db: Database,
    state: Metadata,
}

impl MetaStore {
    /// Load the persisted record. Missing or corrupt data gives empty defaults.
    pub fn load(db: Database) -> Self {
        let state = match db.get_value(META_KEY) {
            Ok(Some(raw)) => Metadata::from_json(&raw).unwrap_or_else(|err| {
                warn!("discarding corrupt contact metadata: {}", err);
                Metadata::default()
            }),
            Ok(None) => Metadata::default(),
            Err(err) => {
                warn!("failed to read contact metadata: {:#}", err);
                Metadata::default()
            }
        };
        Self { db, state }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.state
    }

    pub fn persist(&self) -> Result<()> {
        let raw = self
            .state
            .to_json()
            .context("failed to serialize contact metadata")?;
        self.db.put_value(META_KEY, &raw)?;
        debug!(bytes = raw.len(), "persisted contact metadata");
        Ok(())
    }

    fn apply(&mut self, change: impl FnOnce(Metadata) -> Metadata) -> Result<()> {
        let current = mem::take(&mut self.state);
        self.state = change(current);
        self.persist()
    }

    pub fn toggle_favorite(&mut self, id: &ContactId) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        self.apply(|meta| meta.toggle_favorite(id, now))
    }

    pub fn toggle_pinned(&mut self, id: &ContactId) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        self.apply(|meta| meta.toggle_pinned(id, now))
    }

    pub fn set_note(&mut self, id: &ContactId, text: &str) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        self.apply(|meta| meta.with_note(id, text, now))
    }

    pub fn touch(&mut self, id: &ContactId) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        self.apply(|meta| meta.touched(id, now))
    }

    pub fn forget(&mut self, id: &ContactId) -> Result<()> {
        self.apply(|meta| meta.forget(id))
    }

    pub fn forget_all(&mut self, ids: &[ContactId]) -> Result<()> {
        self.apply(|meta| ids.iter().fold(meta, |meta, id| meta.forget(id)))
    }

    pub fn reconcile(&mut self, current: &HashSet<ContactId>) -> Result<()> {
        self.apply(|meta| meta.reconciled(current))
    }
}
