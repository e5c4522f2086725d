use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level entity class: playable media or auxiliary support files.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Class {
    Media,
    Support,
}

/// The specific type of an entity within its class.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    Audio,
    Video,
    Subtitles,
}

impl Kind {
    pub const ALL: [Kind; 3] = [Kind::Audio, Kind::Video, Kind::Subtitles];

    pub fn class(self) -> Class {
        match self {
            Kind::Audio | Kind::Video => Class::Media,
            Kind::Subtitles => Class::Support,
        }
    }

    /// Name of the collection holding records of this kind.
    pub fn collection_name(self) -> &'static str {
        match self {
            Kind::Audio => "Audio",
            Kind::Video => "Video",
            Kind::Subtitles => "Subtitles",
        }
    }

    /// Lowercase noun used in summaries ("12 audio, 4 video").
    pub fn noun(self) -> &'static str {
        match self {
            Kind::Audio => "audio",
            Kind::Video => "video",
            Kind::Subtitles => "subtitles",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection_name())
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Class::Media => f.write_str("Media"),
            Class::Support => f.write_str("Support"),
        }
    }
}
