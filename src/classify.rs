//! Extension-based content classification.
//!
//! Static, read-only tables map an encoding name to the file-name extensions
//! that carry it. Lookups are case-insensitive exact matches; anything not in
//! a table is unknown and left to the scanner's policy.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use crate::entity::Kind;

type Table = &'static [(&'static str, &'static [&'static str])];

const AUDIO: Table = &[
    ("AAC", &["aac"]),
    ("AIFF", &["aif", "aiff", "aifc"]),
    ("FLAC", &["flac"]),
    ("Monkey's Audio", &["ape"]),
    ("MP3", &["mp3"]),
    ("MPEG-4 Audio", &["m4a", "m4b"]),
    ("Ogg Vorbis", &["ogg", "oga"]),
    ("Opus", &["opus"]),
    ("WAV", &["wav"]),
    ("WavPack", &["wv"]),
    ("Windows Media Audio", &["wma"]),
];

const VIDEO: Table = &[
    ("3GPP", &["3gp", "3g2"]),
    ("AVI", &["avi"]),
    ("Flash Video", &["flv"]),
    ("Matroska", &["mkv", "mk3d"]),
    ("MPEG", &["mpg", "mpeg"]),
    ("MPEG-4", &["mp4", "m4v"]),
    ("MPEG Transport Stream", &["ts", "m2ts", "mts"]),
    ("Ogg Video", &["ogv"]),
    ("QuickTime", &["mov", "qt"]),
    ("WebM", &["webm"]),
    ("Windows Media Video", &["wmv"]),
];

const SUBTITLES: Table = &[
    ("Advanced SubStation Alpha", &["ass"]),
    ("MicroDVD", &["sub"]),
    ("SAMI", &["smi", "sami"]),
    ("SubRip", &["srt"]),
    ("SubStation Alpha", &["ssa"]),
    ("TTML", &["ttml", "dfxp"]),
    ("VobSub", &["idx"]),
    ("WebVTT", &["vtt"]),
];

/// Result of a successful lookup.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: Kind,
    pub encoding: &'static str,
}

static MEDIA: LazyLock<HashMap<&'static str, Classification>> =
    LazyLock::new(|| build(&[(Kind::Audio, AUDIO), (Kind::Video, VIDEO)]));

static SUPPORT: LazyLock<HashMap<&'static str, Classification>> =
    LazyLock::new(|| build(&[(Kind::Subtitles, SUBTITLES)]));

fn build(tables: &[(Kind, Table)]) -> HashMap<&'static str, Classification> {
    let mut map = HashMap::new();
    for &(kind, table) in tables {
        for &(encoding, extensions) in table {
            for ext in extensions {
                map.insert(*ext, Classification { kind, encoding });
            }
        }
    }
    map
}

fn normalize(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Classify a playable file by extension (with or without the leading dot).
pub fn classify_media(extension: &str) -> Option<Classification> {
    MEDIA.get(normalize(extension).as_str()).copied()
}

/// Classify an auxiliary file by extension (with or without the leading dot).
pub fn classify_support(extension: &str) -> Option<Classification> {
    SUPPORT.get(normalize(extension).as_str()).copied()
}

/// Media first, then support.
pub fn classify(extension: &str) -> Option<Classification> {
    classify_media(extension).or_else(|| classify_support(extension))
}

/// Extension of `path` as written on disk, without the dot.
pub fn extension_of(path: &Path) -> Option<&str> {
    path.extension().and_then(|s| s.to_str()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_audio_extension_classifies_as_audio_in_any_case() {
        for &(encoding, extensions) in AUDIO {
            for ext in extensions {
                let lower = classify_media(ext).unwrap();
                assert_eq!(lower.kind, Kind::Audio);
                assert_eq!(lower.encoding, encoding);
                assert_eq!(classify_media(&ext.to_ascii_uppercase()), Some(lower));
                assert_eq!(classify_media(&format!(".{ext}")), Some(lower));
            }
        }
    }

    #[test]
    fn well_known_extensions() {
        let mp3 = classify_media(".MP3").unwrap();
        assert_eq!(mp3, classify_media(".mp3").unwrap());
        assert_eq!(mp3.encoding, "MP3");
        assert_eq!(classify_media("flac").unwrap().encoding, "FLAC");
        assert_eq!(classify_media("wav").unwrap().encoding, "WAV");

        let mkv = classify_media(".mkv").unwrap();
        assert_eq!(mkv.kind, Kind::Video);
        assert_eq!(mkv.encoding, "Matroska");

        let srt = classify_support(".srt").unwrap();
        assert_eq!(srt.kind, Kind::Subtitles);
        assert_eq!(srt.encoding, "SubRip");
    }

    #[test]
    fn unknown_extensions_are_unknown_to_both_tables() {
        assert_eq!(classify_media(".xyz123"), None);
        assert_eq!(classify_support(".xyz123"), None);
        assert_eq!(classify(""), None);
        // no partial matches
        assert_eq!(classify_media("mp"), None);
        assert_eq!(classify_media("mp34"), None);
    }

    #[test]
    fn tables_do_not_cross_classes() {
        assert_eq!(classify_media("srt"), None);
        assert_eq!(classify_support("mkv"), None);
        assert_eq!(classify("srt").unwrap().kind, Kind::Subtitles);
    }

    #[test]
    fn extension_of_skips_dotfiles_and_bare_names() {
        assert_eq!(extension_of(Path::new("/m/a.Flac")), Some("Flac"));
        assert_eq!(extension_of(Path::new("/m/README")), None);
        assert_eq!(extension_of(Path::new("/m/.hidden")), None);
    }
}
