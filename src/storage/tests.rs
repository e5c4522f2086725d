use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use tempfile::tempdir;

use super::*;
use crate::entity::{AudioMedia, Entity, Recordable};

fn audio_record(path: &str) -> Record {
    let abs_path = PathBuf::from(path);
    AudioMedia {
        entity: Entity {
            abs_dir: abs_path.parent().unwrap().to_path_buf(),
            abs_base: abs_path.with_extension(""),
            abs_path,
            encoding: "MP3".into(),
            ..Entity::default()
        },
        ..AudioMedia::default()
    }
    .to_record()
    .unwrap()
}

#[test]
fn store_dir_name_is_a_deterministic_md5_of_the_path() {
    let a = store_dir_name(Path::new("/home/me/Music"));
    assert_eq!(a, store_dir_name(Path::new("/home/me/Music")));
    assert_ne!(a, store_dir_name(Path::new("/home/me/Videos")));
    assert_eq!(a.len(), 32);
    assert!(a.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    assert_eq!(store_dir_name(Path::new("")), "d41d8cd98f00b204e9800998ecf8427e");
}

#[test]
fn open_creates_configuration_and_collections() {
    let data = tempdir().unwrap();
    let store = Store::open(data.path(), Path::new("/lib"), &StoreOptions::default()).unwrap();

    let dir = data.path().join(store_dir_name(Path::new("/lib")));
    assert_eq!(store.dir(), dir);
    assert!(dir.join(CONFIG_FILE).is_file());
    for kind in Kind::ALL {
        assert!(dir.join(kind.collection_name()).is_dir());
        assert_eq!(store.collection(kind).unwrap().index_paths(), INDEX_PATHS.to_vec());
    }
    assert_eq!(*store.config(), StoreConfig::default());
    assert_eq!(store.state(), StoreState::Open);
}

#[test]
fn configuration_is_written_once() {
    let data = tempdir().unwrap();
    let options = StoreOptions {
        collection_growth: Some(4096),
        ..StoreOptions::default()
    };
    let first = Store::open(data.path(), Path::new("/lib"), &options).unwrap();
    let config_path = first.dir().join(CONFIG_FILE);
    let written = fs::read(&config_path).unwrap();
    let appeared = first.first_appearance();
    drop(first);

    let again = Store::open(data.path(), Path::new("/lib"), &StoreOptions::default()).unwrap();
    assert_eq!(again.config().collection_growth, 4096);
    assert_eq!(again.first_appearance(), appeared);
    assert_eq!(fs::read(&config_path).unwrap(), written);
}

#[test]
fn conflicting_options_on_an_existing_store_are_fatal() {
    let data = tempdir().unwrap();
    drop(Store::open(data.path(), Path::new("/lib"), &StoreOptions::default()).unwrap());

    let options = StoreOptions {
        collection_growth: Some(1024),
        hash_bits: Some(StoreConfig::default().hash_bits),
        ..StoreOptions::default()
    };
    let err = match Store::open(data.path(), Path::new("/lib"), &options) {
        Err(e) => e,
        Ok(_) => panic!("expected a configuration conflict"),
    };
    match &err {
        Error::ConfigConflict { conflicts, .. } => {
            assert_eq!(conflicts.len(), 1);
            assert_eq!(conflicts[0].option, "collection_growth");
            assert_eq!(conflicts[0].requested, 1024);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.detail().contains("collection_growth"));
    assert!(!err.detail().contains("hash_bits"));
}

#[test]
fn matching_options_on_an_existing_store_are_accepted() {
    let data = tempdir().unwrap();
    let options = StoreOptions {
        collection_growth: Some(8192),
        ..StoreOptions::default()
    };
    drop(Store::open(data.path(), Path::new("/lib"), &options).unwrap());
    let store = Store::open(data.path(), Path::new("/lib"), &options).unwrap();
    assert_eq!(store.config().collection_growth, 8192);
}

#[test]
fn invalid_sizing_is_rejected_before_anything_is_written() {
    let data = tempdir().unwrap();
    let options = StoreOptions {
        hash_bits: Some(40),
        ..StoreOptions::default()
    };
    let err = Store::open(data.path(), Path::new("/lib"), &options).err().unwrap();
    assert!(matches!(err, Error::InvalidConfig(_)));
    let dir = data.path().join(store_dir_name(Path::new("/lib")));
    assert!(!dir.join(CONFIG_FILE).exists());
}

#[test]
fn put_upserts_by_absolute_path() {
    let data = tempdir().unwrap();
    let mut store = Store::open(data.path(), Path::new("/lib"), &StoreOptions::default()).unwrap();

    let id = store.put(Kind::Audio, audio_record("/lib/a.mp3")).unwrap();
    let mut changed = audio_record("/lib/a.mp3");
    changed.insert("album".into(), json!("Changed"));
    assert_eq!(store.put(Kind::Audio, changed).unwrap(), id);
    store.put(Kind::Audio, audio_record("/lib/b.mp3")).unwrap();

    assert_eq!(store.collection(Kind::Audio).unwrap().len(), 2);
    let (found, record) = store
        .find_by_path(Kind::Audio, Path::new("/lib/a.mp3"))
        .unwrap()
        .unwrap();
    assert_eq!(found, id);
    assert_eq!(record["album"], json!("Changed"));
    assert_eq!(store.lookup(Kind::Audio, "abs_dir", "/lib").unwrap().len(), 2);
    assert!(store.find_by_path(Kind::Video, Path::new("/lib/a.mp3")).unwrap().is_none());

    match store.load(Kind::Audio, Path::new("/lib/b.mp3")).unwrap() {
        Some(Discovered::Media(m)) => assert_eq!(m.entity().encoding, "MP3"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn counts_reflect_records_found_on_open() {
    let data = tempdir().unwrap();
    let mut store = Store::open(data.path(), Path::new("/lib"), &StoreOptions::default()).unwrap();
    store.put(Kind::Audio, audio_record("/lib/a.mp3")).unwrap();
    store.put(Kind::Audio, audio_record("/lib/b.mp3")).unwrap();
    drop(store);

    let mut store = Store::open(data.path(), Path::new("/lib"), &StoreOptions::default()).unwrap();
    assert_eq!(store.counts().loaded(Kind::Audio), 2);
    assert_eq!(store.counts().loaded(Kind::Video), 0);
    assert_eq!(store.counts().loaded_summary(), "2 audio");

    store.counts_mut().record_scanned(Kind::Video);
    store.counts_mut().record_scanned(Kind::Audio);
    assert_eq!(store.counts().scanned_summary(), "1 audio, 1 video");
    store.counts_mut().reset_scanned();
    assert_eq!(store.counts().scanned_summary(), "nothing");
}

#[test]
fn scrub_reclaims_superseded_lines_and_reacquires_handles() {
    let data = tempdir().unwrap();
    let mut store = Store::open(data.path(), Path::new("/lib"), &StoreOptions::default()).unwrap();
    for _ in 0..3 {
        store.put(Kind::Audio, audio_record("/lib/a.mp3")).unwrap();
    }
    assert_eq!(store.waste(), 2);

    store.scrub().unwrap();
    assert_eq!(store.state(), StoreState::Open);
    assert_eq!(store.waste(), 0);

    // fresh handles keep working after the data files were swapped
    store.put(Kind::Audio, audio_record("/lib/c.mp3")).unwrap();
    drop(store);
    let store = Store::open(data.path(), Path::new("/lib"), &StoreOptions::default()).unwrap();
    assert_eq!(store.collection(Kind::Audio).unwrap().len(), 2);
}

#[test]
fn closed_store_rejects_access() {
    let data = tempdir().unwrap();
    let mut store = Store::open(data.path(), Path::new("/lib"), &StoreOptions::default()).unwrap();
    store.close();
    assert_eq!(store.state(), StoreState::Closed);
    assert!(matches!(
        store.put(Kind::Audio, audio_record("/lib/a.mp3")),
        Err(Error::StoreClosed(_))
    ));
    assert!(matches!(store.scrub(), Err(Error::StoreClosed(_))));
}

#[test]
fn store_with_a_collection_missing_its_indexes_refuses_to_open() {
    let data = tempdir().unwrap();
    let mut store = Store::open(data.path(), Path::new("/lib"), &StoreOptions::default()).unwrap();
    store.put(Kind::Audio, audio_record("/lib/a.mp3")).unwrap();
    let audio = store.dir().join("Audio");
    drop(store);
    fs::remove_file(audio.join("indexes.json")).unwrap();

    let err = Store::open(data.path(), Path::new("/lib"), &StoreOptions::default())
        .err()
        .unwrap();
    assert!(matches!(err, Error::IndexInstall { ref collection, .. } if collection == "Audio"));
    // nothing was put back behind the caller's back
    assert!(!audio.join("indexes.json").exists());
}

#[test]
fn interrupted_collection_create_is_completed_on_open() {
    let data = tempdir().unwrap();
    let store = Store::open(data.path(), Path::new("/lib"), &StoreOptions::default()).unwrap();
    let video = store.dir().join("Video");
    drop(store);
    fs::remove_dir_all(&video).unwrap();
    fs::create_dir_all(&video).unwrap();

    let mut store = Store::open(data.path(), Path::new("/lib"), &StoreOptions::default()).unwrap();
    let mut record = audio_record("/lib/a.mkv");
    record.insert("kind".into(), json!("Video"));
    let id = store.put(Kind::Video, record.clone()).unwrap();
    assert_eq!(store.put(Kind::Video, record).unwrap(), id);
    assert_eq!(store.collection(Kind::Video).unwrap().len(), 1);
    assert_eq!(
        store.collection(Kind::Video).unwrap().index_paths(),
        INDEX_PATHS.to_vec()
    );
}
