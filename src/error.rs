//! Crate-wide error type.
//!
//! Every failure carries a stable numeric code, a short description and a
//! free-text detail (its `Display` output) so that front-ends can render it
//! without matching on variants.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// One caller-supplied sizing option that disagrees with what a store persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMismatch {
    pub option: &'static str,
    pub persisted: u64,
    pub requested: u64,
}

impl fmt::Display for ConfigMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (persisted {}, requested {})",
            self.option, self.persisted, self.requested
        )
    }
}

fn join_mismatches(conflicts: &[ConfigMismatch]) -> String {
    conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid library root {}: {reason}", .path.display())]
    InvalidRoot { path: PathBuf, reason: String },

    #[error("cannot access working directory: {0}")]
    WorkingDir(#[source] io::Error),

    #[error("library {} is busy: a scan is already running", .0.display())]
    Busy(PathBuf),

    #[error("cannot stat {}: {source}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read directory {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("depth limit {limit} reached, not descending into {}", .path.display())]
    DepthLimit { path: PathBuf, limit: usize },

    #[error("unsupported file {} ({file_type})", .path.display())]
    UnsupportedFile {
        path: PathBuf,
        file_type: &'static str,
    },

    #[error("cannot open store {}: {source}", .path.display())]
    StoreOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot create collection {name}: {source}")]
    CollectionCreate {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot install indexes on collection {collection}: {source}")]
    IndexInstall {
        collection: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot read collection {collection}: {source}")]
    Read {
        collection: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot write collection {collection}: {source}")]
    Write {
        collection: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot scrub collection {collection}: {source}")]
    Scrub {
        collection: String,
        #[source]
        source: io::Error,
    },

    #[error("record of {size} bytes exceeds the {limit} byte limit of collection {collection}")]
    RecordTooLarge {
        collection: String,
        size: usize,
        limit: u64,
    },

    #[error("collection {collection} has no record {id}")]
    MissingRecord { collection: String, id: u64 },

    #[error("store {} is closed", .0.display())]
    StoreClosed(PathBuf),

    #[error("{type_name} {op} failed: {source}")]
    DataFormat {
        type_name: &'static str,
        op: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("record holds a {found} where a {expected} was expected")]
    KindMismatch {
        expected: &'static str,
        found: String,
    },

    #[error(
        "incompatible storage options for existing store {}: {}",
        .path.display(),
        join_mismatches(.conflicts)
    )]
    ConfigConflict {
        path: PathBuf,
        conflicts: Vec<ConfigMismatch>,
    },

    #[error("invalid storage configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Stable numeric code, grouped by hundreds.
    pub fn code(&self) -> u16 {
        match self {
            Error::InvalidRoot { .. } => 100,
            Error::WorkingDir(_) => 101,
            Error::Busy(_) => 102,
            Error::Stat { .. } => 200,
            Error::ReadDir { .. } => 201,
            Error::DepthLimit { .. } => 202,
            Error::UnsupportedFile { .. } => 203,
            Error::StoreOpen { .. } => 300,
            Error::CollectionCreate { .. } => 301,
            Error::IndexInstall { .. } => 302,
            Error::Read { .. } => 303,
            Error::Write { .. } => 304,
            Error::Scrub { .. } => 305,
            Error::RecordTooLarge { .. } => 306,
            Error::MissingRecord { .. } => 307,
            Error::StoreClosed(_) => 308,
            Error::DataFormat { .. } => 400,
            Error::KindMismatch { .. } => 401,
            Error::ConfigConflict { .. } => 500,
            Error::InvalidConfig(_) => 501,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Error::InvalidRoot { .. } => "invalid library root",
            Error::WorkingDir(_) => "working directory unavailable",
            Error::Busy(_) => "library busy",
            Error::Stat { .. } => "stat failed",
            Error::ReadDir { .. } => "directory unreadable",
            Error::DepthLimit { .. } => "depth limit exceeded",
            Error::UnsupportedFile { .. } => "unsupported file",
            Error::StoreOpen { .. } => "store unavailable",
            Error::CollectionCreate { .. } => "collection creation failed",
            Error::IndexInstall { .. } => "index installation failed",
            Error::Read { .. } => "read failed",
            Error::Write { .. } => "write failed",
            Error::Scrub { .. } => "scrub failed",
            Error::RecordTooLarge { .. } => "record too large",
            Error::MissingRecord { .. } => "record not found",
            Error::StoreClosed(_) => "store closed",
            Error::DataFormat { .. } => "data format error",
            Error::KindMismatch { .. } => "record kind mismatch",
            Error::ConfigConflict { .. } => "configuration conflict",
            Error::InvalidConfig(_) => "invalid configuration",
        }
    }

    pub fn detail(&self) -> String {
        self.to_string()
    }

    /// Conditions that only skip part of a walk rather than failing it.
    pub fn is_walk_condition(&self) -> bool {
        matches!(
            self,
            Error::DepthLimit { .. } | Error::UnsupportedFile { .. }
        )
    }
}
