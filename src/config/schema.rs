use std::path::PathBuf;

use serde::Deserialize;

use crate::storage::StoreOptions;

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/mediashelf/config.toml` or `~/.config/mediashelf/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `MEDIASHELF__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub library: LibrarySettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// Maximum directory depth below a library root. 0 means unlimited.
    pub max_depth: usize,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
    /// Read title/album/track tags from audio files.
    pub read_tags: bool,
    /// Associate subtitles with same-named videos after each scan.
    pub link_subtitles: bool,
    /// Discovery events buffered before a scan waits for its consumer.
    /// 0 hands every event over directly.
    pub event_buffer: usize,

    /// Which fields to use to build a media's display name and its ordering.
    ///
    /// Example: ["track", "title"] -> "3 - Title"
    pub display_fields: Vec<DisplayField>,
    /// Separator used to join `display_fields`.
    pub display_separator: String,

    /// Playback command stored on newly discovered audio.
    pub audio_command: String,
    /// Playback command stored on newly discovered video.
    pub video_command: String,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            max_depth: 0,
            include_hidden: false,
            read_tags: true,
            link_subtitles: true,
            event_buffer: 64,
            display_fields: vec![DisplayField::Title],
            display_separator: " - ".to_string(),
            audio_command: "mpv --no-video".to_string(),
            video_command: "mpv".to_string(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayField {
    /// Tag title, or the file stem when untagged.
    Title,
    Album,
    #[serde(alias = "track-number", alias = "track_number")]
    Track,
    #[serde(alias = "file-name", alias = "file_name")]
    Filename,
    Path,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding one store per library. Defaults to
    /// `$XDG_DATA_HOME/mediashelf` or `~/.local/share/mediashelf`.
    pub data_root: Option<PathBuf>,
    /// Scrub every collection when a library is opened.
    pub scrub_on_open: bool,

    // Sizing options. Left unset they are not checked against an existing
    // store; set, they must match what the store was created with.
    pub max_record_size: Option<u64>,
    pub collection_growth: Option<u64>,
    pub bucket_capacity: Option<u64>,
    pub hash_growth: Option<u64>,
    pub hash_bits: Option<u64>,
    pub initial_buckets: Option<u64>,
}

impl StorageSettings {
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            max_record_size: self.max_record_size,
            collection_growth: self.collection_growth,
            bucket_capacity: self.bucket_capacity,
            hash_growth: self.hash_growth,
            hash_bits: self.hash_bits,
            initial_buckets: self.initial_buckets,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter directive; `RUST_LOG` takes precedence when set.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
