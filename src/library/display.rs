use std::path::Path;

use crate::config::DisplayField;

/// Build a display name for a media file according to the provided `fields` and separator.
///
/// This composes metadata fields (title, album, track, filename, path) in the
/// configured order and falls back to `title` when no parts were produced.
pub fn display_from_fields(
    path: &Path,
    title: &str,
    album: Option<&str>,
    track: Option<u32>,
    fields: &[DisplayField],
    sep: &str,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    for f in fields {
        match f {
            DisplayField::Title => {
                if !title.trim().is_empty() {
                    parts.push(title.trim().to_string());
                }
            }
            DisplayField::Album => {
                if let Some(a) = album.map(str::trim).filter(|s| !s.is_empty()) {
                    parts.push(a.to_string());
                }
            }
            DisplayField::Track => {
                if let Some(n) = track.filter(|n| *n > 0) {
                    parts.push(n.to_string());
                }
            }
            DisplayField::Filename => {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if !stem.trim().is_empty() {
                        parts.push(stem.to_string());
                    }
                }
            }
            DisplayField::Path => {
                parts.push(path.display().to_string());
            }
        }
    }

    if parts.is_empty() {
        title.to_string()
    } else {
        parts.join(sep)
    }
}
