use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigMismatch, Error, Result};

pub const CONFIG_FILE: &str = "config.json";

/// Sizing parameters of a store. Written once when the store is created and
/// never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Largest serialized record a collection accepts, in bytes.
    pub max_record_size: u64,
    /// Buffer size used when reading and rewriting collection data files.
    pub collection_growth: u64,
    /// Entries a hash bucket holds before the index table grows.
    pub bucket_capacity: u64,
    /// Buckets added to an index table each time it grows.
    pub hash_growth: u64,
    /// Significant bits of a key hash; caps the table at `2^hash_bits` buckets.
    pub hash_bits: u64,
    pub initial_buckets: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_record_size: 2 * 1024 * 1024,
            collection_growth: 64 * 1024,
            bucket_capacity: 16,
            hash_growth: 64,
            hash_bits: 16,
            initial_buckets: 256,
        }
    }
}

impl StoreConfig {
    fn fields(&self) -> [(&'static str, u64); 6] {
        [
            ("max_record_size", self.max_record_size),
            ("collection_growth", self.collection_growth),
            ("bucket_capacity", self.bucket_capacity),
            ("hash_growth", self.hash_growth),
            ("hash_bits", self.hash_bits),
            ("initial_buckets", self.initial_buckets),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.fields() {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{name} must be >= 1")));
            }
        }
        if self.hash_bits > 32 {
            return Err(Error::InvalidConfig(format!(
                "hash_bits must be between 1 and 32, got {}",
                self.hash_bits
            )));
        }
        Ok(())
    }
}

/// Sizing options supplied by a caller. `None` means "not supplied".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    pub max_record_size: Option<u64>,
    pub collection_growth: Option<u64>,
    pub bucket_capacity: Option<u64>,
    pub hash_growth: Option<u64>,
    pub hash_bits: Option<u64>,
    pub initial_buckets: Option<u64>,
}

impl StoreOptions {
    fn fields(&self) -> [(&'static str, Option<u64>); 6] {
        [
            ("max_record_size", self.max_record_size),
            ("collection_growth", self.collection_growth),
            ("bucket_capacity", self.bucket_capacity),
            ("hash_growth", self.hash_growth),
            ("hash_bits", self.hash_bits),
            ("initial_buckets", self.initial_buckets),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_none())
    }

    /// Overlay the supplied options on `base`.
    pub fn apply(&self, base: StoreConfig) -> StoreConfig {
        StoreConfig {
            max_record_size: self.max_record_size.unwrap_or(base.max_record_size),
            collection_growth: self.collection_growth.unwrap_or(base.collection_growth),
            bucket_capacity: self.bucket_capacity.unwrap_or(base.bucket_capacity),
            hash_growth: self.hash_growth.unwrap_or(base.hash_growth),
            hash_bits: self.hash_bits.unwrap_or(base.hash_bits),
            initial_buckets: self.initial_buckets.unwrap_or(base.initial_buckets),
        }
    }

    /// Every supplied option whose value differs from `persisted`.
    pub fn mismatches(&self, persisted: &StoreConfig) -> Vec<ConfigMismatch> {
        self.fields()
            .into_iter()
            .zip(persisted.fields())
            .filter_map(|((option, requested), (_, persisted))| match requested {
                Some(requested) if requested != persisted => Some(ConfigMismatch {
                    option,
                    persisted,
                    requested,
                }),
                _ => None,
            })
            .collect()
    }
}

/// On-disk configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(flatten)]
    pub sizing: StoreConfig,
    /// When the store was first created.
    pub first_appearance: DateTime<Utc>,
}

/// Load the configuration of the store at `dir`, writing it first if absent.
///
/// Supplied options must agree with an existing document field by field.
pub fn reconcile(dir: &Path, options: &StoreOptions) -> Result<ConfigFile> {
    let path = dir.join(CONFIG_FILE);
    match fs::read(&path) {
        Ok(bytes) => {
            let file: ConfigFile =
                serde_json::from_slice(&bytes).map_err(|source| Error::DataFormat {
                    type_name: "StoreConfig",
                    op: "unmarshal",
                    source,
                })?;
            let conflicts = options.mismatches(&file.sizing);
            if !conflicts.is_empty() {
                return Err(Error::ConfigConflict {
                    path: dir.to_path_buf(),
                    conflicts,
                });
            }
            if !options.is_empty() {
                debug!(store = %dir.display(), "supplied storage options match the persisted configuration");
            }
            Ok(file)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let sizing = options.apply(StoreConfig::default());
            sizing.validate()?;
            let file = ConfigFile {
                sizing,
                first_appearance: Utc::now(),
            };
            write_config(&path, &file)?;
            info!(store = %dir.display(), ?sizing, "wrote store configuration");
            Ok(file)
        }
        Err(source) => Err(Error::StoreOpen { path, source }),
    }
}

fn write_config(path: &Path, file: &ConfigFile) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(file).map_err(|source| Error::DataFormat {
        type_name: "StoreConfig",
        op: "marshal",
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)
        .and_then(|()| fs::rename(&tmp, path))
        .map_err(|source| Error::StoreOpen {
            path: path.to_path_buf(),
            source,
        })
}
