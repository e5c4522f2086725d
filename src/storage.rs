//! Persistent store, one per library.
//!
//! Layout under the shared data root:
//!
//! ```text
//! <data_root>/<md5(abs library path)>/
//!     config.json
//!     Audio/  Video/  Subtitles/
//! ```
//!
//! The configuration document is written once. Collections are created on
//! first open, together with their indexes, and only ever reopened after.

mod collection;
mod config;
mod index;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

pub use collection::Collection;
pub use config::{CONFIG_FILE, StoreConfig, StoreOptions};

use crate::entity::{Discovered, Kind, Record};
use crate::error::{Error, Result};

/// Field paths indexed in every collection.
pub const INDEX_PATHS: [&str; 3] = ["abs_path", "abs_dir", "abs_base"];

/// Directory name of the store for `library_root`: lowercase hex MD5 of the path.
pub fn store_dir_name(library_root: &Path) -> String {
    format!(
        "{:x}",
        md5::compute(library_root.to_string_lossy().as_bytes())
    )
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StoreState {
    Open,
    Scrubbing,
    Closed,
}

/// Per-kind record counts: what was in the store when it was opened, and
/// what the most recent scan found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counts {
    loaded: BTreeMap<Kind, usize>,
    scanned: BTreeMap<Kind, usize>,
}

impl Counts {
    pub fn loaded(&self, kind: Kind) -> usize {
        self.loaded.get(&kind).copied().unwrap_or(0)
    }

    pub fn scanned(&self, kind: Kind) -> usize {
        self.scanned.get(&kind).copied().unwrap_or(0)
    }

    pub(crate) fn record_scanned(&mut self, kind: Kind) {
        *self.scanned.entry(kind).or_default() += 1;
    }

    pub(crate) fn reset_scanned(&mut self) {
        self.scanned.clear();
    }

    pub fn loaded_summary(&self) -> String {
        summarize(&self.loaded)
    }

    pub fn scanned_summary(&self) -> String {
        summarize(&self.scanned)
    }
}

/// "12 audio, 4 video"; kinds with no records are left out.
fn summarize(counts: &BTreeMap<Kind, usize>) -> String {
    let parts: Vec<String> = Kind::ALL
        .iter()
        .filter_map(|kind| match counts.get(kind) {
            Some(&n) if n > 0 => Some(format!("{n} {}", kind.noun())),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        "nothing".to_string()
    } else {
        parts.join(", ")
    }
}

struct Collections {
    audio: Collection,
    video: Collection,
    subtitles: Collection,
}

impl Collections {
    fn open(dir: &Path, config: StoreConfig) -> Result<Self> {
        Ok(Self {
            audio: open_or_create(dir, Kind::Audio, config)?,
            video: open_or_create(dir, Kind::Video, config)?,
            subtitles: open_or_create(dir, Kind::Subtitles, config)?,
        })
    }

    fn get(&self, kind: Kind) -> &Collection {
        match kind {
            Kind::Audio => &self.audio,
            Kind::Video => &self.video,
            Kind::Subtitles => &self.subtitles,
        }
    }

    fn get_mut(&mut self, kind: Kind) -> &mut Collection {
        match kind {
            Kind::Audio => &mut self.audio,
            Kind::Video => &mut self.video,
            Kind::Subtitles => &mut self.subtitles,
        }
    }
}

fn open_or_create(dir: &Path, kind: Kind, config: StoreConfig) -> Result<Collection> {
    let name = kind.collection_name();
    let path = dir.join(name);
    // a directory left without indexes or data by an interrupted create is
    // created again; data without indexes is refused by `open`
    if Collection::is_installed(&path) || Collection::has_data(&path) {
        Collection::open(&path, name, config)
    } else {
        Collection::create(&path, name, &INDEX_PATHS, config)
    }
}

pub struct Store {
    dir: PathBuf,
    config: StoreConfig,
    first_appearance: DateTime<Utc>,
    collections: Collections,
    counts: Counts,
    state: StoreState,
}

impl Store {
    /// Open the store of `library_root` under `data_root`, creating it if absent.
    ///
    /// Sizing options in `options` are written on creation and must match the
    /// persisted configuration otherwise.
    pub fn open(data_root: &Path, library_root: &Path, options: &StoreOptions) -> Result<Self> {
        let dir = data_root.join(store_dir_name(library_root));
        if !dir.is_dir() {
            info!(store = %dir.display(), library = %library_root.display(), "creating store");
            fs::create_dir_all(&dir).map_err(|source| Error::StoreOpen {
                path: dir.clone(),
                source,
            })?;
        }

        let file = config::reconcile(&dir, options)?;
        let collections = Collections::open(&dir, file.sizing)?;

        let mut counts = Counts::default();
        for kind in Kind::ALL {
            counts.loaded.insert(kind, collections.get(kind).len());
        }
        debug!(store = %dir.display(), loaded = %counts.loaded_summary(), "opened store");

        Ok(Self {
            dir,
            config: file.sizing,
            first_appearance: file.first_appearance,
            collections,
            counts,
            state: StoreState::Open,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn first_appearance(&self) -> DateTime<Utc> {
        self.first_appearance
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn counts(&self) -> &Counts {
        &self.counts
    }

    pub(crate) fn counts_mut(&mut self) -> &mut Counts {
        &mut self.counts
    }

    /// Fails with [`Error::StoreClosed`] unless the store is open.
    pub fn ensure_open(&self) -> Result<()> {
        match self.state {
            StoreState::Open => Ok(()),
            StoreState::Scrubbing | StoreState::Closed => Err(Error::StoreClosed(self.dir.clone())),
        }
    }

    pub fn collection(&self, kind: Kind) -> Result<&Collection> {
        self.ensure_open()?;
        Ok(self.collections.get(kind))
    }

    fn collection_mut(&mut self, kind: Kind) -> Result<&mut Collection> {
        self.ensure_open()?;
        Ok(self.collections.get_mut(kind))
    }

    pub fn insert(&mut self, kind: Kind, record: Record) -> Result<u64> {
        self.collection_mut(kind)?.insert(record)
    }

    pub fn update(&mut self, kind: Kind, id: u64, record: Record) -> Result<()> {
        self.collection_mut(kind)?.update(id, record)
    }

    pub fn get(&self, kind: Kind, id: u64) -> Result<Option<&Record>> {
        Ok(self.collection(kind)?.get(id))
    }

    pub fn lookup(&self, kind: Kind, index: &str, value: &str) -> Result<Vec<u64>> {
        Ok(self.collection(kind)?.lookup(index, value))
    }

    /// The record stored for `abs_path`, if any.
    pub fn find_by_path(&self, kind: Kind, abs_path: &Path) -> Result<Option<(u64, &Record)>> {
        let collection = self.collection(kind)?;
        let key = abs_path.to_string_lossy();
        Ok(collection
            .lookup("abs_path", &key)
            .into_iter()
            .next()
            .and_then(|id| collection.get(id).map(|doc| (id, doc))))
    }

    /// Write `record` keyed by its `abs_path`: update in place when the path
    /// is already stored, insert otherwise. Last write wins.
    pub fn put(&mut self, kind: Kind, record: Record) -> Result<u64> {
        let existing = match record.get("abs_path").and_then(Value::as_str) {
            Some(path) => self.lookup(kind, "abs_path", path)?.into_iter().next(),
            None => None,
        };
        match existing {
            Some(id) => {
                self.update(kind, id, record)?;
                Ok(id)
            }
            None => self.insert(kind, record),
        }
    }

    /// Inflate the entity stored for `abs_path`.
    pub fn load(&self, kind: Kind, abs_path: &Path) -> Result<Option<Discovered>> {
        match self.find_by_path(kind, abs_path)? {
            Some((_, record)) => Discovered::from_map(kind, record.clone()).map(Some),
            None => Ok(None),
        }
    }

    /// Compact every collection, then reacquire all collection handles.
    pub fn scrub(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.state = StoreState::Scrubbing;
        let result = self.scrub_collections();
        self.state = StoreState::Open;
        result
    }

    fn scrub_collections(&mut self) -> Result<()> {
        let mut result = Ok(());
        for kind in Kind::ALL {
            let collection = self.collections.get_mut(kind);
            if collection.waste() == 0 {
                debug!(collection = kind.collection_name(), "nothing to reclaim");
            }
            if let Err(e) = collection.compact() {
                result = Err(e);
                break;
            }
        }
        // compaction swaps data files underneath the open handles
        self.collections = Collections::open(&self.dir, self.config)?;
        result
    }

    pub fn close(&mut self) {
        if self.state != StoreState::Closed {
            debug!(store = %self.dir.display(), "closing store");
        }
        self.state = StoreState::Closed;
    }

    /// Total lines across collections that a scrub would reclaim.
    pub fn waste(&self) -> usize {
        Kind::ALL
            .iter()
            .map(|kind| self.collections.get(*kind).waste())
            .sum()
    }

    pub(crate) fn warn_if_fragmented(&self) {
        let waste = self.waste();
        if waste > 0 {
            warn!(store = %self.dir.display(), waste, "store holds stale or malformed records; scrub to reclaim");
        }
    }
}

#[cfg(test)]
mod tests;
