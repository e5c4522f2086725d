//! Directory-backed record collection.
//!
//! A collection directory holds an append-only `data.jsonl` (one
//! `{"id": .., "doc": {..}}` line per write, last write wins) and the index
//! definitions installed when the collection was created. Records and indexes
//! are rebuilt in memory on open.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::StoreConfig;
use super::index::HashIndex;
use crate::entity::Record;
use crate::error::{Error, Result};

const DATA_FILE: &str = "data.jsonl";
const INDEX_FILE: &str = "indexes.json";

#[derive(Serialize)]
struct LineRef<'a> {
    id: u64,
    doc: &'a Record,
}

#[derive(Deserialize)]
struct Line {
    id: u64,
    doc: Record,
}

pub struct Collection {
    name: String,
    dir: PathBuf,
    config: StoreConfig,
    docs: BTreeMap<u64, Record>,
    indexes: Vec<HashIndex>,
    next_id: u64,
    superseded: usize,
    corrupt: usize,
    writer: BufWriter<File>,
}

impl Collection {
    /// Whether `dir` holds a collection whose indexes were installed.
    pub fn is_installed(dir: &Path) -> bool {
        dir.join(INDEX_FILE).is_file()
    }

    /// Whether `dir` holds a data file, installed or not.
    pub fn has_data(dir: &Path) -> bool {
        dir.join(DATA_FILE).exists()
    }

    /// Create the collection directory and install `index_paths`.
    ///
    /// Index definitions are only ever written here, and before the data file,
    /// so a data file never exists without them.
    pub fn create(
        dir: &Path,
        name: &str,
        index_paths: &[&str],
        config: StoreConfig,
    ) -> Result<Self> {
        let create_err = |source| Error::CollectionCreate {
            name: name.to_string(),
            source,
        };
        let install_err = |source| Error::IndexInstall {
            collection: name.to_string(),
            source,
        };
        fs::create_dir_all(dir).map_err(create_err)?;

        let defs = serde_json::to_vec_pretty(index_paths).map_err(|source| Error::DataFormat {
            type_name: "IndexDefinitions",
            op: "marshal",
            source,
        })?;
        let path = dir.join(INDEX_FILE);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, defs)
            .and_then(|()| fs::rename(&tmp, &path))
            .map_err(install_err)?;

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(DATA_FILE))
            .map_err(create_err)?;
        info!(collection = name, indexes = ?index_paths, "created collection");

        Self::open(dir, name, config)
    }

    /// Open an existing collection. Its index set is taken as persisted; a
    /// collection without index definitions is refused.
    pub fn open(dir: &Path, name: &str, config: StoreConfig) -> Result<Self> {
        let read_err = |source| Error::Read {
            collection: name.to_string(),
            source,
        };
        let index_paths: Vec<String> = match fs::read(dir.join(INDEX_FILE)) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| Error::DataFormat {
                type_name: "IndexDefinitions",
                op: "unmarshal",
                source,
            })?,
            Err(source) if source.kind() == ErrorKind::NotFound => {
                return Err(Error::IndexInstall {
                    collection: name.to_string(),
                    source,
                });
            }
            Err(source) => return Err(read_err(source)),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(DATA_FILE))
            .map_err(read_err)?;

        let mut collection = Self {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            config,
            docs: BTreeMap::new(),
            indexes: index_paths
                .iter()
                .map(|p| HashIndex::new(p, &config))
                .collect(),
            next_id: 1,
            superseded: 0,
            corrupt: 0,
            writer: BufWriter::with_capacity(buffer_size(&config), file),
        };
        collection.load()?;
        debug!(
            collection = name,
            records = collection.docs.len(),
            superseded = collection.superseded,
            corrupt = collection.corrupt,
            "opened collection"
        );
        Ok(collection)
    }

    fn data_path(&self) -> PathBuf {
        self.dir.join(DATA_FILE)
    }

    fn load(&mut self) -> Result<()> {
        let path = self.data_path();
        let file = File::open(&path).map_err(|source| self.read_err(source))?;
        let reader = BufReader::with_capacity(buffer_size(&self.config), file);

        for (line_num, line) in reader.split(b'\n').enumerate() {
            let line = line.map_err(|source| self.read_err(source))?;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<Line>(&line) {
                Ok(Line { id, doc }) => match id.checked_add(1) {
                    Some(next) => {
                        self.next_id = self.next_id.max(next);
                        self.replace(id, doc);
                    }
                    None => {
                        self.corrupt += 1;
                        warn!(
                            "{}:{}: skipping record with out-of-range id {}",
                            path.display(),
                            line_num + 1,
                            id
                        );
                    }
                },
                Err(e) => {
                    self.corrupt += 1;
                    warn!(
                        "{}:{}: skipping malformed record: {}",
                        path.display(),
                        line_num + 1,
                        e
                    );
                }
            }
        }
        Ok(())
    }

    fn read_err(&self, source: io::Error) -> Error {
        Error::Read {
            collection: self.name.clone(),
            source,
        }
    }

    fn write_err(&self, source: io::Error) -> Error {
        Error::Write {
            collection: self.name.clone(),
            source,
        }
    }

    /// Put `doc` in memory under `id`, keeping indexes in step.
    fn replace(&mut self, id: u64, doc: Record) {
        if let Some(old) = self.docs.remove(&id) {
            self.superseded += 1;
            for index in &mut self.indexes {
                index.remove(&old, id);
            }
        }
        for index in &mut self.indexes {
            index.insert(&doc, id);
        }
        self.docs.insert(id, doc);
    }

    fn append(&mut self, id: u64, doc: &Record) -> Result<()> {
        let line = serde_json::to_vec(&LineRef { id, doc }).map_err(|source| Error::DataFormat {
            type_name: "Record",
            op: "marshal",
            source,
        })?;
        if line.len() as u64 > self.config.max_record_size {
            return Err(Error::RecordTooLarge {
                collection: self.name.clone(),
                size: line.len(),
                limit: self.config.max_record_size,
            });
        }
        self.writer
            .write_all(&line)
            .and_then(|()| self.writer.write_all(b"\n"))
            .and_then(|()| self.writer.flush())
            .map_err(|source| self.write_err(source))
    }

    pub fn insert(&mut self, doc: Record) -> Result<u64> {
        let id = self.next_id;
        let next = id
            .checked_add(1)
            .ok_or_else(|| self.write_err(io::Error::other("record ids exhausted")))?;
        self.append(id, &doc)?;
        self.next_id = next;
        self.replace(id, doc);
        Ok(id)
    }

    pub fn update(&mut self, id: u64, doc: Record) -> Result<()> {
        if !self.docs.contains_key(&id) {
            return Err(Error::MissingRecord {
                collection: self.name.clone(),
                id,
            });
        }
        self.append(id, &doc)?;
        self.replace(id, doc);
        Ok(())
    }

    pub fn get(&self, id: u64) -> Option<&Record> {
        self.docs.get(&id)
    }

    /// Ids of records whose `index` field equals `value`. Unknown indexes match nothing.
    pub fn lookup(&self, index: &str, value: &str) -> Vec<u64> {
        match self.indexes.iter().find(|i| i.path() == index) {
            Some(i) => i.get(value),
            None => {
                debug!(collection = %self.name, index, "lookup on an index that is not installed");
                Vec::new()
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &Record)> {
        self.docs.iter().map(|(id, doc)| (*id, doc))
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn index_paths(&self) -> Vec<&str> {
        self.indexes.iter().map(HashIndex::path).collect()
    }

    /// Lines on disk that no longer hold a live record.
    pub fn waste(&self) -> usize {
        self.superseded + self.corrupt
    }

    /// Rewrite the data file with only the live records.
    ///
    /// The data file is replaced, so this handle must not be used afterwards;
    /// reopen the collection instead.
    pub fn compact(&mut self) -> Result<()> {
        let scrub_err = |source| Error::Scrub {
            collection: self.name.clone(),
            source,
        };
        self.writer.flush().map_err(scrub_err)?;

        let path = self.data_path();
        let tmp = path.with_extension("jsonl.scrub");
        let file = File::create(&tmp).map_err(scrub_err)?;
        let mut out = BufWriter::with_capacity(buffer_size(&self.config), file);
        for (id, doc) in &self.docs {
            let line =
                serde_json::to_vec(&LineRef { id: *id, doc }).map_err(|source| Error::DataFormat {
                    type_name: "Record",
                    op: "marshal",
                    source,
                })?;
            out.write_all(&line)
                .and_then(|()| out.write_all(b"\n"))
                .map_err(scrub_err)?;
        }
        let file = out
            .into_inner()
            .map_err(|e| scrub_err(e.into_error()))?;
        file.sync_all().map_err(scrub_err)?;
        fs::rename(&tmp, &path).map_err(scrub_err)?;

        info!(
            collection = %self.name,
            records = self.docs.len(),
            reclaimed = self.waste(),
            "scrubbed collection"
        );
        Ok(())
    }
}

fn buffer_size(config: &StoreConfig) -> usize {
    usize::try_from(config.collection_growth)
        .unwrap_or(usize::MAX)
        .clamp(512, 64 * 1024 * 1024)
}
