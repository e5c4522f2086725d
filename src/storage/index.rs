//! Bucketed hash index over one record field.

use std::hash::{DefaultHasher, Hash, Hasher};

use serde_json::Value;

use super::config::StoreConfig;
use crate::entity::Record;

pub(super) struct HashIndex {
    path: String,
    bits: u32,
    bucket_capacity: usize,
    growth: usize,
    buckets: Vec<Vec<(String, u64)>>,
}

impl HashIndex {
    pub(super) fn new(path: &str, config: &StoreConfig) -> Self {
        let bits = config.hash_bits.min(32) as u32;
        let initial = (config.initial_buckets as usize).clamp(1, max_buckets(bits));
        Self {
            path: path.to_string(),
            bits,
            bucket_capacity: config.bucket_capacity.max(1) as usize,
            growth: config.hash_growth.max(1) as usize,
            buckets: vec![Vec::new(); initial],
        }
    }

    pub(super) fn path(&self) -> &str {
        &self.path
    }

    pub(super) fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn slot(&self, key: &str) -> usize {
        slot_for(key, self.bits, self.buckets.len())
    }

    pub(super) fn insert(&mut self, record: &Record, id: u64) {
        let Some(key) = key_of(record, &self.path) else {
            return;
        };
        let slot = self.slot(&key);
        self.buckets[slot].push((key, id));
        if self.buckets[slot].len() > self.bucket_capacity
            && self.buckets.len() < max_buckets(self.bits)
        {
            self.grow();
        }
    }

    pub(super) fn remove(&mut self, record: &Record, id: u64) {
        let Some(key) = key_of(record, &self.path) else {
            return;
        };
        let slot = self.slot(&key);
        self.buckets[slot].retain(|(k, i)| !(*i == id && *k == key));
    }

    pub(super) fn get(&self, key: &str) -> Vec<u64> {
        self.buckets[self.slot(key)]
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, id)| *id)
            .collect()
    }

    fn grow(&mut self) {
        let len = (self.buckets.len() + self.growth).min(max_buckets(self.bits));
        let entries: Vec<(String, u64)> = self.buckets.drain(..).flatten().collect();
        self.buckets = vec![Vec::new(); len];
        for (key, id) in entries {
            let slot = slot_for(&key, self.bits, len);
            self.buckets[slot].push((key, id));
        }
    }
}

fn max_buckets(bits: u32) -> usize {
    1usize << bits.min(usize::BITS - 1)
}

fn slot_for(key: &str, bits: u32, buckets: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
    ((hasher.finish() & mask) % buckets as u64) as usize
}

/// The indexable value of `path` in `record`, if it holds a scalar.
pub(super) fn key_of(record: &Record, path: &str) -> Option<String> {
    match record.get(path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
