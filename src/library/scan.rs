use std::fs::{self, FileType};
use std::io;
use std::path::{Path, PathBuf};

use lofty::prelude::{Accessor, TaggedFileExt};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::classify::{classify, extension_of};
use crate::config::LibrarySettings;
use crate::entity::{AudioMedia, Discovered, Entity, Kind, MediaInfo, Subtitles, VideoMedia};
use crate::error::{Error, Result};

use super::display::display_from_fields;
use super::model::{Discovery, ScanReport};

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Unreadable directories count as non-empty.
fn has_entries(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(true)
}

/// Path of `path` relative to `cwd`, or `path` itself when it lies elsewhere.
pub(crate) fn relative_to(path: &Path, cwd: &Path) -> PathBuf {
    path.strip_prefix(cwd)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

fn describe(file_type: &FileType) -> &'static str {
    if file_type.is_symlink() {
        return "symbolic link";
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if file_type.is_block_device() {
            return "block device";
        }
        if file_type.is_char_device() {
            return "character device";
        }
        if file_type.is_fifo() {
            return "named pipe";
        }
        if file_type.is_socket() {
            return "socket";
        }
    }
    "special file"
}

#[derive(Default)]
struct Tags {
    title: Option<String>,
    album: Option<String>,
    track: Option<u32>,
}

fn non_empty(s: Option<std::borrow::Cow<'_, str>>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn read_tags(path: &Path) -> Option<Tags> {
    let tagged = match lofty::read_from_path(path) {
        Ok(tagged) => tagged,
        Err(e) => {
            debug!("no readable tags in {}: {}", path.display(), e);
            return None;
        }
    };
    let tag = tagged.primary_tag().or_else(|| tagged.first_tag())?;
    Some(Tags {
        title: non_empty(tag.title()),
        album: non_empty(tag.album()),
        track: tag.track(),
    })
}

/// Depth-first walk of one library root.
///
/// Runs synchronously on the calling thread and hands every discovery to
/// `visit` in traversal order.
pub(crate) struct Scanner<'a> {
    root: &'a Path,
    cwd: &'a Path,
    settings: &'a LibrarySettings,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(root: &'a Path, cwd: &'a Path, settings: &'a LibrarySettings) -> Self {
        Self {
            root,
            cwd,
            settings,
        }
    }

    /// Walk the root. Only failing to read the root itself is returned as an
    /// error; everything below it is recorded in the report and skipped.
    pub(crate) fn walk<F>(&self, mut visit: F) -> Result<ScanReport>
    where
        F: FnMut(Discovery),
    {
        let mut report = ScanReport::default();

        fs::read_dir(self.root).map_err(|source| Error::ReadDir {
            path: self.root.to_path_buf(),
            source,
        })?;

        let mut entries = WalkDir::new(self.root).follow_links(false).into_iter();
        while let Some(next) = entries.next() {
            let entry = match next {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.to_path_buf());
                    let at_root = path == self.root;
                    let error = Error::ReadDir {
                        path,
                        source: io::Error::from(err),
                    };
                    if at_root {
                        return Err(error);
                    }
                    warn!("{error}");
                    report.issues.push(error);
                    continue;
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let path = entry.path();
            let file_type = entry.file_type();

            if !self.settings.include_hidden && is_hidden(path) {
                if file_type.is_dir() {
                    entries.skip_current_dir();
                }
                continue;
            }

            if file_type.is_dir() {
                report.directories += 1;
                visit(Discovery::Directory(path.to_path_buf()));

                let limit = self.settings.max_depth;
                if limit > 0 && entry.depth() >= limit {
                    entries.skip_current_dir();
                    // only report a limit that actually hid something
                    if has_entries(path) {
                        let condition = Error::DepthLimit {
                            path: path.to_path_buf(),
                            limit,
                        };
                        debug!("{condition}");
                        report.issues.push(condition);
                    }
                }
            } else if file_type.is_file() {
                match self.classify_file(&entry) {
                    Ok(Some(found)) => {
                        report.files += 1;
                        visit(Discovery::Found(found));
                    }
                    Ok(None) => {
                        report.ignored += 1;
                        debug!("ignoring unclassified file {}", path.display());
                    }
                    Err(e) => {
                        warn!("{e}");
                        report.issues.push(e);
                    }
                }
            } else {
                let condition = Error::UnsupportedFile {
                    path: path.to_path_buf(),
                    file_type: describe(&file_type),
                };
                warn!("{condition}");
                report.issues.push(condition);
            }
        }

        Ok(report)
    }

    fn classify_file(&self, entry: &DirEntry) -> Result<Option<Discovered>> {
        let path = entry.path();
        let Some(class) = extension_of(path).and_then(classify) else {
            return Ok(None);
        };

        let metadata = entry.metadata().map_err(|err| Error::Stat {
            path: path.to_path_buf(),
            source: io::Error::from(err),
        })?;
        let entity = Entity::new(
            path.to_path_buf(),
            relative_to(path, self.cwd),
            &metadata,
            class.encoding,
        );

        Ok(Some(self.build(class.kind, entity)))
    }

    fn build(&self, kind: Kind, entity: Entity) -> Discovered {
        let settings = self.settings;
        match kind {
            Kind::Audio => {
                let tags = if settings.read_tags {
                    read_tags(&entity.abs_path).unwrap_or_default()
                } else {
                    Tags::default()
                };
                let title = tags
                    .title
                    .unwrap_or_else(|| entity.file_stem().to_string());
                let album = tags.album.unwrap_or_default();
                let name = display_from_fields(
                    &entity.abs_path,
                    &title,
                    Some(album.as_str()),
                    tags.track,
                    &settings.display_fields,
                    &settings.display_separator,
                );
                AudioMedia {
                    info: MediaInfo {
                        name,
                        command: settings.audio_command.clone(),
                        title,
                        ..MediaInfo::default()
                    },
                    album,
                    track: tags.track.unwrap_or(0),
                    entity,
                }
                .into()
            }
            Kind::Video => {
                let title = entity.file_stem().to_string();
                let name = display_from_fields(
                    &entity.abs_path,
                    &title,
                    None,
                    None,
                    &settings.display_fields,
                    &settings.display_separator,
                );
                VideoMedia {
                    info: MediaInfo {
                        name,
                        command: settings.video_command.clone(),
                        title,
                        ..MediaInfo::default()
                    },
                    entity,
                    ..VideoMedia::default()
                }
                .into()
            }
            Kind::Subtitles => Subtitles {
                entity,
                videos: Vec::new(),
            }
            .into(),
        }
    }
}
