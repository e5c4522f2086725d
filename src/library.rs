//! A library binds a root directory to its scanner and its store.
//!
//! At most one scan per library runs at a time; a second request fails fast
//! with [`Error::Busy`]. Discoveries flow to the consumer returned by
//! [`Library::subscribe`] through a bounded queue, so a slow consumer slows
//! the scan down instead of buffering without limit.

mod display;
mod model;
mod scan;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

pub use display::display_from_fields;
pub use model::{Discovery, ScanReport};

use crate::config::{LibrarySettings, Settings};
use crate::entity::{
    Discovered, Entity, Kind, Record, Recordable, Subtitles, Support, VideoMedia,
};
use crate::error::{Error, Result};
use crate::storage::{Counts, Store};

use scan::{Scanner, relative_to};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Held for the duration of one scan; releases the gate on drop.
struct ScanGuard<'a>(&'a AtomicBool);

impl<'a> ScanGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Keep the stored record but take every filesystem-derived field from `fresh`.
fn refresh(mut stored: Record, fresh: &Record) -> Record {
    for key in Entity::FILESYSTEM_FIELDS {
        if let Some(value) = fresh.get(key) {
            stored.insert(key.to_string(), value.clone());
        }
    }
    stored
}

/// Base names a video may carry for a subtitle: `Movie.en.srt` belongs to
/// `Movie.en.*` or `Movie.*`.
fn video_bases(subtitle: &Subtitles) -> Vec<PathBuf> {
    let base = &subtitle.entity.abs_base;
    let mut bases = vec![base.clone()];
    if base.extension().is_some() {
        bases.push(base.with_extension(""));
    }
    bases
}

pub struct Library {
    root: PathBuf,
    rel_root: PathBuf,
    cwd: PathBuf,
    settings: LibrarySettings,
    store: Mutex<Store>,
    scanning: AtomicBool,
    scanned: AtomicBool,
    events: Mutex<Option<SyncSender<Discovery>>>,
}

impl Library {
    /// Open the library rooted at `root`, with its store under `data_root`.
    pub fn open(root: &Path, data_root: &Path, settings: &Settings) -> Result<Self> {
        let cwd = env::current_dir().map_err(Error::WorkingDir)?;
        let cwd = fs::canonicalize(&cwd).unwrap_or(cwd);

        let invalid = |reason: String| Error::InvalidRoot {
            path: root.to_path_buf(),
            reason,
        };
        let metadata = fs::metadata(root).map_err(|e| invalid(e.to_string()))?;
        if !metadata.is_dir() {
            return Err(invalid("not a directory".to_string()));
        }
        let root = fs::canonicalize(root).map_err(|e| invalid(e.to_string()))?;

        let mut store = Store::open(data_root, &root, &settings.storage.store_options())?;
        if settings.storage.scrub_on_open {
            store.scrub()?;
        } else {
            store.warn_if_fragmented();
        }
        info!(
            library = %root.display(),
            store = %store.dir().display(),
            loaded = %store.counts().loaded_summary(),
            "opened library"
        );

        Ok(Self {
            rel_root: relative_to(&root, &cwd),
            root,
            cwd,
            settings: settings.library.clone(),
            store: Mutex::new(store),
            scanning: AtomicBool::new(false),
            scanned: AtomicBool::new(false),
            events: Mutex::new(None),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root relative to the working directory the library was opened from.
    pub fn rel_root(&self) -> &Path {
        &self.rel_root
    }

    pub fn max_depth(&self) -> usize {
        self.settings.max_depth
    }

    pub fn store_dir(&self) -> PathBuf {
        lock(&self.store).dir().to_path_buf()
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    /// Start a new discovery queue; any previous receiver stops getting events.
    pub fn subscribe(&self) -> Receiver<Discovery> {
        let (tx, rx) = mpsc::sync_channel(self.settings.event_buffer);
        *lock(&self.events) = Some(tx);
        rx
    }

    /// Drop the discovery queue; the current receiver sees the end of the stream
    /// once a running scan finishes.
    pub fn close_events(&self) {
        lock(&self.events).take();
    }

    /// Run `f` against the store, e.g. for lookups.
    pub fn with_store<R>(&self, f: impl FnOnce(&Store) -> R) -> R {
        f(&lock(&self.store))
    }

    pub fn counts(&self) -> Counts {
        lock(&self.store).counts().clone()
    }

    /// "12 audio, 4 video" for the last scan, or for what was stored before any scan.
    pub fn summary(&self) -> String {
        let store = lock(&self.store);
        if self.scanned.load(Ordering::Acquire) {
            store.counts().scanned_summary()
        } else {
            store.counts().loaded_summary()
        }
    }

    /// The stored entity for `abs_path`.
    pub fn load(&self, kind: Kind, abs_path: &Path) -> Result<Option<Discovered>> {
        lock(&self.store).load(kind, abs_path)
    }

    /// Store an edited entity under its `abs_path`. Returns the record id.
    pub fn save(&self, item: &Discovered) -> Result<u64> {
        let record = item.to_record()?;
        lock(&self.store).put(item.kind(), record)
    }

    pub fn scrub(&self) -> Result<()> {
        lock(&self.store).scrub()
    }

    pub fn close(&self) {
        lock(&self.store).close();
    }

    /// Run a scan on its own thread.
    pub fn spawn_scan(self: &Arc<Self>) -> JoinHandle<Result<ScanReport>> {
        let library = Arc::clone(self);
        thread::spawn(move || library.scan())
    }

    /// Walk the root, store every classified file and announce each discovery.
    ///
    /// Fails immediately with [`Error::Busy`] while another scan of this
    /// library is running, and with [`Error::StoreClosed`] once the library
    /// was closed. Blocks whenever the discovery queue is full.
    pub fn scan(&self) -> Result<ScanReport> {
        let _guard =
            ScanGuard::try_acquire(&self.scanning).ok_or_else(|| Error::Busy(self.root.clone()))?;
        {
            let mut store = lock(&self.store);
            store.ensure_open()?;
            store.counts_mut().reset_scanned();
        }
        info!(library = %self.root.display(), max_depth = self.settings.max_depth, "scan started");
        self.scanned.store(true, Ordering::Release);

        let mut sender = lock(&self.events).clone();
        let mut failures = Vec::new();
        let mut subtitles = Vec::new();

        let scanner = Scanner::new(&self.root, &self.cwd, &self.settings);
        let mut report = scanner.walk(|discovery| {
            let discovery = match discovery {
                Discovery::Found(item) => match self.persist(&item) {
                    Ok(stored) => Discovery::Found(stored),
                    Err(e) => {
                        warn!(path = %item.entity().abs_path.display(), "cannot store: {e}");
                        failures.push(e);
                        Discovery::Found(item)
                    }
                },
                other => other,
            };
            if let Discovery::Found(Discovered::Support(Support::Subtitles(s))) = &discovery {
                subtitles.push(s.clone());
            }
            if let Some(tx) = &sender {
                if tx.send(discovery).is_err() {
                    debug!(library = %self.root.display(), "discovery consumer went away");
                    sender = None;
                }
            }
        })?;
        report.issues.append(&mut failures);

        if self.settings.link_subtitles {
            for mut subtitle in subtitles {
                if let Err(e) = self.link_to_videos(&mut subtitle) {
                    warn!(path = %subtitle.entity.abs_path.display(), "cannot link subtitles: {e}");
                    report.issues.push(e);
                }
            }
        }

        info!(
            library = %self.root.display(),
            found = %self.summary(),
            directories = report.directories,
            ignored = report.ignored,
            issues = report.issues.len(),
            "scan finished"
        );
        Ok(report)
    }

    /// Write a scanned entity, keeping user-edited fields of a stored copy.
    /// Returns the entity as it now stands in the store.
    fn persist(&self, item: &Discovered) -> Result<Discovered> {
        let kind = item.kind();
        let fresh = item.to_record()?;
        let mut store = lock(&self.store);
        store.counts_mut().record_scanned(kind);
        let record = match store.find_by_path(kind, &item.entity().abs_path)? {
            Some((_, stored)) => refresh(stored.clone(), &fresh),
            None => fresh,
        };
        store.put(kind, record.clone())?;
        drop(store);
        Discovered::from_map(kind, record)
    }

    /// Attach `subtitle` to every stored video sharing its base name.
    fn link_to_videos(&self, subtitle: &mut Subtitles) -> Result<usize> {
        let mut videos = Vec::new();
        {
            let store = lock(&self.store);
            for base in video_bases(subtitle) {
                for id in store.lookup(Kind::Video, "abs_base", &base.to_string_lossy())? {
                    if let Some(record) = store.get(Kind::Video, id)? {
                        videos.push(VideoMedia::from_map(record.clone())?);
                    }
                }
            }
        }

        let mut added = 0;
        for mut video in videos {
            let preferred = video.selected_subtitle.is_none();
            if self.add_subtitles(&mut video, subtitle, preferred, true)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Associate `subtitle` with `video`.
    ///
    /// Returns whether the subtitle was new to the video. With `persist`, both
    /// records are rewritten; a failure on either is returned as is, without
    /// undoing the other write.
    pub fn add_subtitles(
        &self,
        video: &mut VideoMedia,
        subtitle: &mut Subtitles,
        make_preferred: bool,
        persist: bool,
    ) -> Result<bool> {
        let added = video.link_subtitles(subtitle, make_preferred);
        if persist {
            let video_record = video.to_record()?;
            let subtitle_record = subtitle.to_record()?;
            let mut store = lock(&self.store);
            store.put(Kind::Video, video_record)?;
            store.put(Kind::Subtitles, subtitle_record)?;
        }
        debug!(
            video = %video.entity.abs_path.display(),
            subtitle = %subtitle.entity.abs_path.display(),
            added,
            make_preferred,
            "associated subtitles"
        );
        Ok(added)
    }
}

#[cfg(test)]
mod tests;
