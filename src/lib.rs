//! Index directory trees of media and subtitle files into a persistent,
//! queryable store.
//!
//! A [`Library`] ties a root directory to a [`Store`] kept under a data root.
//! Scanning walks the root, classifies files by extension, stores what it
//! finds and announces each discovery on a bounded queue.

pub mod classify;
pub mod config;
pub mod entity;
pub mod error;
pub mod library;
pub mod runtime;
pub mod storage;

pub use config::Settings;
pub use entity::{Discovered, Kind};
pub use error::{Error, Result};
pub use library::{Discovery, Library, ScanReport};
pub use storage::Store;
