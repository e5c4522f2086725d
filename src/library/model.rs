use std::path::{Path, PathBuf};

use crate::entity::Discovered;
use crate::error::Error;

/// Message sent to a library's consumer for every discovered entry, in
/// traversal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// A directory below the library root.
    Directory(PathBuf),
    /// A classified file, as stored.
    Found(Discovered),
}

/// Outcome of a completed walk.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub directories: usize,
    /// Files classified as media or support.
    pub files: usize,
    /// Regular files with an extension no table knows.
    pub ignored: usize,
    /// Non-fatal conditions met along the way, in the order they happened.
    pub issues: Vec<Error>,
}

impl ScanReport {
    /// Directories whose contents were skipped because of the depth limit.
    pub fn depth_limited(&self) -> Vec<&Path> {
        self.issues
            .iter()
            .filter_map(|e| match e {
                Error::DepthLimit { path, .. } => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }

    /// Links, devices, pipes and sockets that were rejected.
    pub fn unsupported(&self) -> Vec<&Path> {
        self.issues
            .iter()
            .filter_map(|e| match e {
                Error::UnsupportedFile { path, .. } => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }
}
