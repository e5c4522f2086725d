use super::*;
use crate::config::DisplayField;
use crate::entity::Media;
use std::fs;
use std::time::{Duration, Instant};
use tempfile::{TempDir, tempdir};

fn settings() -> Settings {
    let mut s = Settings::default();
    s.library.read_tags = false;
    s
}

struct Fixture {
    root: TempDir,
    data: TempDir,
}

impl Fixture {
    fn new(files: &[&str]) -> Self {
        let root = tempdir().unwrap();
        for f in files {
            let path = root.path().join(f);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, b"x").unwrap();
        }
        Self {
            root,
            data: tempdir().unwrap(),
        }
    }

    fn open(&self, settings: &Settings) -> Library {
        Library::open(self.root.path(), self.data.path(), settings).unwrap()
    }

    fn path(&self, rel: &str) -> PathBuf {
        fs::canonicalize(self.root.path()).unwrap().join(rel)
    }
}

fn video(library: &Library, path: &Path) -> VideoMedia {
    match library.load(Kind::Video, path).unwrap() {
        Some(Discovered::Media(Media::Video(v))) => v,
        other => panic!("expected stored video at {}, got {other:?}", path.display()),
    }
}

fn subtitles(library: &Library, path: &Path) -> Subtitles {
    match library.load(Kind::Subtitles, path).unwrap() {
        Some(Discovered::Support(Support::Subtitles(s))) => s,
        other => panic!("expected stored subtitles at {}, got {other:?}", path.display()),
    }
}

#[test]
fn open_rejects_missing_or_non_directory_roots() {
    let fx = Fixture::new(&["song.mp3"]);

    let err = Library::open(&fx.path("missing"), fx.data.path(), &settings())
        .err()
        .unwrap();
    assert!(matches!(err, Error::InvalidRoot { .. }));
    assert_eq!(err.code(), 100);

    let err = Library::open(&fx.path("song.mp3"), fx.data.path(), &settings())
        .err()
        .unwrap();
    assert!(matches!(err, Error::InvalidRoot { ref reason, .. } if reason == "not a directory"));
}

#[test]
fn same_root_maps_to_the_same_store() {
    let fx = Fixture::new(&[]);
    let first = fx.open(&settings());
    let dir = first.store_dir();
    first.close();
    drop(first);

    let nested = fx.root.path().join(".");
    let second = Library::open(&nested, fx.data.path(), &settings()).unwrap();
    assert_eq!(second.store_dir(), dir);
    assert_eq!(second.root(), fs::canonicalize(fx.root.path()).unwrap());
    assert!(dir.starts_with(fx.data.path()));
}

#[test]
fn scan_stores_and_announces_discoveries() {
    let fx = Fixture::new(&["a/song.mp3", "a/film.mkv", "notes.txt"]);
    let library = fx.open(&settings());
    let rx = library.subscribe();

    let report = library.scan().unwrap();
    assert_eq!(report.files, 2);
    assert_eq!(report.ignored, 1);
    assert_eq!(report.directories, 1);

    let events: Vec<Discovery> = rx.try_iter().collect();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], Discovery::Directory(fx.path("a")));

    let song = library.load(Kind::Audio, &fx.path("a/song.mp3")).unwrap();
    assert!(events.contains(&Discovery::Found(song.unwrap())));
    assert_eq!(library.summary(), "1 audio, 1 video");
    assert!(!library.is_scanning());
}

#[test]
fn summary_reports_loaded_counts_until_a_scan_runs() {
    let fx = Fixture::new(&["one.flac", "two.flac", "clip.mp4"]);
    let library = fx.open(&settings());
    assert_eq!(library.summary(), "nothing");
    library.scan().unwrap();
    assert_eq!(library.summary(), "2 audio, 1 video");
    library.close();
    drop(library);

    let reopened = fx.open(&settings());
    assert_eq!(reopened.summary(), "2 audio, 1 video");
    assert_eq!(reopened.counts().loaded(Kind::Audio), 2);
    assert_eq!(reopened.counts().scanned(Kind::Audio), 0);
}

#[test]
fn second_scan_while_one_runs_is_busy() {
    let fx = Fixture::new(&["a.mp3", "b.mp3", "c.mp3"]);
    let mut s = settings();
    s.library.event_buffer = 0;
    let library = Arc::new(fx.open(&s));
    let rx = library.subscribe();

    let handle = library.spawn_scan();
    let deadline = Instant::now() + Duration::from_secs(10);
    // nobody is receiving yet, so the scan is parked on its first event
    while !library.is_scanning() {
        assert!(Instant::now() < deadline, "scan never started");
        std::thread::sleep(Duration::from_millis(5));
    }

    let err = library.scan().unwrap_err();
    assert!(matches!(err, Error::Busy(_)));
    assert_eq!(err.code(), 102);

    let mut received = 0;
    while !handle.is_finished() {
        if rx.recv_timeout(Duration::from_millis(20)).is_ok() {
            received += 1;
        }
    }
    received += rx.try_iter().count();
    let report = handle.join().unwrap().unwrap();
    assert_eq!(report.files, 3);
    assert_eq!(received, 3);

    assert!(!library.is_scanning());
    // with the receiver gone the scan stops announcing but still completes
    drop(rx);
    assert!(library.scan().is_ok());
}

#[test]
fn scan_without_a_consumer_still_stores_everything() {
    let fx = Fixture::new(&["a.mp3", "b.mkv"]);
    let library = fx.open(&settings());
    let rx = library.subscribe();
    drop(rx);

    let report = library.scan().unwrap();
    assert_eq!(report.files, 2);
    assert!(library.load(Kind::Video, &fx.path("b.mkv")).unwrap().is_some());
}

#[test]
fn add_subtitles_is_idempotent() {
    let fx = Fixture::new(&["Movie.mkv", "Movie.srt"]);
    let mut s = settings();
    s.library.link_subtitles = false;
    let library = fx.open(&s);
    library.scan().unwrap();

    let mut v = video(&library, &fx.path("Movie.mkv"));
    let mut sub = subtitles(&library, &fx.path("Movie.srt"));
    assert!(v.subtitles.is_empty());

    assert!(library.add_subtitles(&mut v, &mut sub, true, true).unwrap());
    assert!(!library.add_subtitles(&mut v, &mut sub, false, true).unwrap());
    assert_eq!(v.subtitles, vec![fx.path("Movie.srt")]);

    let stored = video(&library, &fx.path("Movie.mkv"));
    assert_eq!(stored.subtitles, vec![fx.path("Movie.srt")]);
    assert_eq!(stored.selected_subtitle, Some(fx.path("Movie.srt")));
    let stored = subtitles(&library, &fx.path("Movie.srt"));
    assert_eq!(stored.videos, vec![fx.path("Movie.mkv")]);
}

#[test]
fn add_subtitles_without_persist_leaves_the_store_alone() {
    let fx = Fixture::new(&["Movie.mkv", "Movie.srt"]);
    let mut s = settings();
    s.library.link_subtitles = false;
    let library = fx.open(&s);
    library.scan().unwrap();

    let mut v = video(&library, &fx.path("Movie.mkv"));
    let mut sub = subtitles(&library, &fx.path("Movie.srt"));
    assert!(library.add_subtitles(&mut v, &mut sub, false, false).unwrap());
    assert_eq!(v.selected_subtitle, None);
    assert!(video(&library, &fx.path("Movie.mkv")).subtitles.is_empty());
}

#[test]
fn scan_links_subtitles_to_same_named_videos() {
    let fx = Fixture::new(&[
        "films/Movie.mkv",
        "films/Movie.srt",
        "films/Movie.en.srt",
        "films/Other.srt",
    ]);
    let library = fx.open(&settings());
    let report = library.scan().unwrap();
    assert!(report.issues.is_empty());

    let v = video(&library, &fx.path("films/Movie.mkv"));
    let mut linked = v.subtitles.clone();
    linked.sort();
    assert_eq!(
        linked,
        vec![fx.path("films/Movie.en.srt"), fx.path("films/Movie.srt")]
    );
    let selected = v.selected_subtitle.unwrap();
    assert!(linked.contains(&selected));

    let en = subtitles(&library, &fx.path("films/Movie.en.srt"));
    assert_eq!(en.videos, vec![fx.path("films/Movie.mkv")]);
    let other = subtitles(&library, &fx.path("films/Other.srt"));
    assert!(other.videos.is_empty());

    // a rescan keeps the links and the chosen subtitle
    library.scan().unwrap();
    let again = video(&library, &fx.path("films/Movie.mkv"));
    assert_eq!(again.subtitles.len(), 2);
    assert_eq!(again.selected_subtitle, Some(selected));
}

#[test]
fn rescan_refreshes_file_fields_and_keeps_edits() {
    let fx = Fixture::new(&["song.ogg"]);
    let library = fx.open(&settings());
    library.scan().unwrap();

    let path = fx.path("song.ogg");
    let mut song = library.load(Kind::Audio, &path).unwrap().unwrap();
    if let Discovered::Media(media) = &mut song {
        media.info_mut().title = "Edited".to_string();
        media.info_mut().description = "kept".to_string();
    }
    library.save(&song).unwrap();

    fs::write(&path, b"a longer body").unwrap();
    library.scan().unwrap();

    let Some(Discovered::Media(Media::Audio(audio))) = library.load(Kind::Audio, &path).unwrap()
    else {
        panic!("song vanished");
    };
    assert_eq!(audio.info.title, "Edited");
    assert_eq!(audio.info.description, "kept");
    assert_eq!(audio.entity.size, 13);
    assert_eq!(library.counts().scanned(Kind::Audio), 1);
    assert_eq!(
        library.with_store(|s| s.collection(Kind::Audio).map(|c| c.len()).unwrap()),
        1
    );
}

#[test]
fn display_names_follow_the_configured_fields() {
    let fx = Fixture::new(&["Show.webm"]);
    let mut s = settings();
    s.library.display_fields = vec![DisplayField::Filename, DisplayField::Album];
    s.library.video_command = "vlc".to_string();
    let library = fx.open(&s);
    library.scan().unwrap();

    let v = video(&library, &fx.path("Show.webm"));
    assert_eq!(v.info.name, "Show");
    assert_eq!(v.info.command, "vlc");
}

#[test]
fn depth_limit_applies_to_library_scans() {
    let fx = Fixture::new(&["top.mp3", "a/mid.mp3", "a/b/deep.mp3"]);
    let mut s = settings();
    s.library.max_depth = 1;
    let library = fx.open(&s);
    assert_eq!(library.max_depth(), 1);

    let report = library.scan().unwrap();
    assert_eq!(report.files, 1);
    assert_eq!(report.depth_limited(), vec![fx.path("a").as_path()]);
    assert!(library.load(Kind::Audio, &fx.path("a/mid.mp3")).unwrap().is_none());
}

#[test]
fn closed_library_refuses_to_scan() {
    let fx = Fixture::new(&["a.mp3", "b.mp3"]);
    let library = fx.open(&settings());
    let rx = library.subscribe();
    library.close();

    let err = library.scan().unwrap_err();
    assert!(matches!(err, Error::StoreClosed(_)));
    assert_eq!(err.code(), 308);
    assert!(rx.try_iter().next().is_none());
    assert!(!library.is_scanning());
    assert_eq!(library.summary(), "nothing");
    assert!(matches!(
        library.load(Kind::Audio, &fx.path("a.mp3")),
        Err(Error::StoreClosed(_))
    ));
}

#[test]
fn display_from_fields_joins_present_parts() {
    let p = Path::new("/tmp/Song.mp3");
    let fields = [DisplayField::Track, DisplayField::Album, DisplayField::Title];
    assert_eq!(
        display_from_fields(p, "Song", Some("  Album  "), Some(3), &fields, " - "),
        "3 - Album - Song"
    );
    assert_eq!(
        display_from_fields(p, "Song", None, Some(0), &fields, " - "),
        "Song"
    );
    assert_eq!(
        display_from_fields(p, "", None, None, &[DisplayField::Album], "/"),
        ""
    );
    assert_eq!(
        display_from_fields(p, "Song", None, None, &[DisplayField::Filename, DisplayField::Path], " | "),
        "Song | /tmp/Song.mp3"
    );
}
