use std::fs::Metadata;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::record::{Record, Recordable};
use super::{Class, Kind};

/// Filesystem facts shared by every discovered file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Entity {
    pub abs_path: PathBuf,
    /// Directory containing `abs_path`.
    pub abs_dir: PathBuf,
    /// `abs_path` without its final extension.
    pub abs_base: PathBuf,
    /// Path relative to the invocation directory (or absolute when outside it).
    pub rel_path: PathBuf,
    pub size: u64,
    pub mode: u32,
    pub modified: DateTime<Utc>,
    pub extension: String,
    pub encoding: String,
}

impl Entity {
    /// Record keys derived from the filesystem; a rescan refreshes exactly these.
    pub const FILESYSTEM_FIELDS: [&'static str; 9] = [
        "abs_path",
        "abs_dir",
        "abs_base",
        "rel_path",
        "size",
        "mode",
        "modified",
        "extension",
        "encoding",
    ];

    pub fn new(abs_path: PathBuf, rel_path: PathBuf, metadata: &Metadata, encoding: &str) -> Self {
        let abs_dir = abs_path.parent().map(Path::to_path_buf).unwrap_or_default();
        let abs_base = abs_path.with_extension("");
        let extension = abs_path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        Self {
            abs_dir,
            abs_base,
            rel_path,
            size: metadata.len(),
            mode: mode_bits(metadata),
            modified: metadata.modified().map(DateTime::<Utc>::from).unwrap_or_default(),
            extension,
            encoding: encoding.to_string(),
            abs_path,
        }
    }

    pub fn file_stem(&self) -> &str {
        self.abs_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }
}

#[cfg(unix)]
fn mode_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn mode_bits(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() { 0o444 } else { 0o644 }
}

/// User-facing description of a playable file. Every field here is editable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaInfo {
    /// Display name shown in listings.
    pub name: String,
    /// Program used to play the file.
    pub command: String,
    pub title: String,
    pub description: String,
    pub release_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioMedia {
    #[serde(flatten)]
    pub entity: Entity,
    #[serde(flatten)]
    pub info: MediaInfo,
    pub album: String,
    pub track: u32,
}

impl Recordable for AudioMedia {
    const KIND: Kind = Kind::Audio;
    const TYPE_NAME: &'static str = "AudioMedia";
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoMedia {
    #[serde(flatten)]
    pub entity: Entity,
    #[serde(flatten)]
    pub info: MediaInfo,
    /// Absolute paths of every subtitle known to belong to this video.
    pub subtitles: Vec<PathBuf>,
    pub selected_subtitle: Option<PathBuf>,
}

impl VideoMedia {
    /// Associate `subtitles` with this video in memory, on both sides.
    ///
    /// Returns `false` when the subtitle path was already known. The preferred
    /// selection is updated whenever `make_preferred` is set.
    pub fn link_subtitles(&mut self, subtitles: &mut Subtitles, make_preferred: bool) -> bool {
        let path = &subtitles.entity.abs_path;
        let added = if self.subtitles.contains(path) {
            false
        } else {
            self.subtitles.push(path.clone());
            true
        };
        if make_preferred {
            self.selected_subtitle = Some(path.clone());
        }
        if !subtitles.videos.contains(&self.entity.abs_path) {
            subtitles.videos.push(self.entity.abs_path.clone());
        }
        added
    }
}

impl Recordable for VideoMedia {
    const KIND: Kind = Kind::Video;
    const TYPE_NAME: &'static str = "VideoMedia";
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Subtitles {
    #[serde(flatten)]
    pub entity: Entity,
    /// Absolute paths of the videos referencing this file.
    pub videos: Vec<PathBuf>,
}

impl Recordable for Subtitles {
    const KIND: Kind = Kind::Subtitles;
    const TYPE_NAME: &'static str = "Subtitles";
}

/// A playable file; the variant is fixed by its [`Kind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Media {
    Audio(AudioMedia),
    Video(VideoMedia),
}

impl Media {
    pub fn kind(&self) -> Kind {
        match self {
            Media::Audio(_) => Kind::Audio,
            Media::Video(_) => Kind::Video,
        }
    }

    pub fn entity(&self) -> &Entity {
        match self {
            Media::Audio(a) => &a.entity,
            Media::Video(v) => &v.entity,
        }
    }

    pub fn info(&self) -> &MediaInfo {
        match self {
            Media::Audio(a) => &a.info,
            Media::Video(v) => &v.info,
        }
    }

    pub fn info_mut(&mut self) -> &mut MediaInfo {
        match self {
            Media::Audio(a) => &mut a.info,
            Media::Video(v) => &mut v.info,
        }
    }
}

/// An auxiliary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Support {
    Subtitles(Subtitles),
}

impl Support {
    pub fn kind(&self) -> Kind {
        match self {
            Support::Subtitles(_) => Kind::Subtitles,
        }
    }

    pub fn entity(&self) -> &Entity {
        match self {
            Support::Subtitles(s) => &s.entity,
        }
    }
}

/// Any classified file, as produced by a scan or read back from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovered {
    Media(Media),
    Support(Support),
}

impl Discovered {
    pub fn kind(&self) -> Kind {
        match self {
            Discovered::Media(m) => m.kind(),
            Discovered::Support(s) => s.kind(),
        }
    }

    pub fn class(&self) -> Class {
        self.kind().class()
    }

    pub fn entity(&self) -> &Entity {
        match self {
            Discovered::Media(m) => m.entity(),
            Discovered::Support(s) => s.entity(),
        }
    }

    pub fn to_record(&self) -> Result<Record> {
        match self {
            Discovered::Media(Media::Audio(a)) => a.to_record(),
            Discovered::Media(Media::Video(v)) => v.to_record(),
            Discovered::Support(Support::Subtitles(s)) => s.to_record(),
        }
    }

    /// Inflate a record of the given kind into its concrete type.
    pub fn from_map(kind: Kind, record: Record) -> Result<Self> {
        Ok(match kind {
            Kind::Audio => Discovered::Media(Media::Audio(AudioMedia::from_map(record)?)),
            Kind::Video => Discovered::Media(Media::Video(VideoMedia::from_map(record)?)),
            Kind::Subtitles => {
                Discovered::Support(Support::Subtitles(Subtitles::from_map(record)?))
            }
        })
    }
}

impl From<AudioMedia> for Discovered {
    fn from(value: AudioMedia) -> Self {
        Discovered::Media(Media::Audio(value))
    }
}

impl From<VideoMedia> for Discovered {
    fn from(value: VideoMedia) -> Self {
        Discovered::Media(Media::Video(value))
    }
}

impl From<Subtitles> for Discovered {
    fn from(value: Subtitles) -> Self {
        Discovered::Support(Support::Subtitles(value))
    }
}
