//! The directory-role index, keyed by raw 20-byte descriptor id digests,
//! grounded on `rend_cache_v2_dir` (a `digestmap_t`) in `rendcache.c`.

use std::collections::HashMap;

use tracing::warn;

use crate::config::{DESC_ID_LEN, DESC_ID_LEN_BASE32};
use crate::entry::CacheEntry;
use crate::error::DirLookupResult;

/// Decodes a 32-character base32 descriptor id into its 20 raw bytes.
///
/// Returns `None` for anything that doesn't decode to exactly
/// [`DESC_ID_LEN`] bytes, matching `base32_decode`'s failure contract in
/// `rend_cache_lookup_v2_desc_as_dir`.
pub fn decode_desc_id(desc_id_base32: &str) -> Option<[u8; DESC_ID_LEN]> {
    if desc_id_base32.len() != DESC_ID_LEN_BASE32 {
        return None;
    }
    let decoded = base32::decode(base32::Alphabet::RFC4648 { padding: false }, desc_id_base32)?;
    decoded.try_into().ok()
}

/// Encodes a raw 20-byte descriptor id as lowercase base32, for log lines.
pub fn encode_desc_id(desc_id: &[u8; DESC_ID_LEN]) -> String {
    base32::encode(base32::Alphabet::RFC4648 { padding: false }, desc_id).to_ascii_lowercase()
}

/// Map from raw 20-byte descriptor id to [`CacheEntry`].
#[derive(Debug, Default)]
pub struct DirectoryIndex {
    map: HashMap<[u8; DESC_ID_LEN], CacheEntry>,
}

impl DirectoryIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a base32-encoded descriptor id.
    ///
    /// On `Found`, the caller (the engine) is responsible for updating
    /// `last_served` — this method only reads, since `last_served` being
    /// written requires `&mut self`. Use [`Self::lookup_and_serve`] for the
    /// read-path that also performs the write, as §4.D specifies.
    pub fn get(&self, desc_id: &[u8; DESC_ID_LEN]) -> Option<&CacheEntry> {
        self.map.get(desc_id)
    }

    /// The read-path lookup specified in §4.D: decodes `desc_id_base32`,
    /// and on a hit, stamps `last_served = now` before returning the
    /// encoded bytes. This is the sole write done by a read path.
    pub fn lookup_and_serve(&mut self, desc_id_base32: &str, now: i64) -> DirLookupResult {
        let desc_id = match decode_desc_id(desc_id_base32) {
            Some(id) => id,
            None => {
                warn!(
                    desc_id = %desc_id_base32,
                    "rejecting v2 rendezvous descriptor request: descriptor id contains illegal characters"
                );
                return DirLookupResult::Malformed;
            }
        };

        match self.map.get_mut(&desc_id) {
            Some(entry) => {
                entry.mark_served(now);
                DirLookupResult::Found(entry.encoded().to_vec())
            }
            None => DirLookupResult::WellFormedButMissing,
        }
    }

    /// Returns a mutable reference to the entry at `desc_id`, if any.
    pub fn get_mut(&mut self, desc_id: &[u8; DESC_ID_LEN]) -> Option<&mut CacheEntry> {
        self.map.get_mut(desc_id)
    }

    /// Inserts or overwrites the entry at `desc_id`.
    pub fn insert(&mut self, desc_id: [u8; DESC_ID_LEN], entry: CacheEntry) {
        self.map.insert(desc_id, entry);
    }

    /// Removes and returns every entry, leaving the index empty.
    pub fn drain_all(&mut self) -> Vec<CacheEntry> {
        self.map.drain().map(|(_, v)| v).collect()
    }

    /// Removes every entry for which `predicate(desc_id, entry)` returns
    /// `true`, returning the removed `(desc_id, entry)` pairs. This is the
    /// primitive the escalating sweep in [`crate::sweeper`] is built on: it
    /// must be able to re-run with a different predicate each pass without
    /// re-evicting what a previous pass already swept.
    pub fn retain_and_collect_removed(
        &mut self,
        mut predicate: impl FnMut(&[u8; DESC_ID_LEN], &CacheEntry) -> bool,
    ) -> Vec<([u8; DESC_ID_LEN], CacheEntry)> {
        let mut removed = Vec::new();
        self.map.retain(|key, entry| {
            if predicate(key, entry) {
                let placeholder = CacheEntry::new(Vec::new(), entry.parsed().clone(), 0);
                let evicted = std::mem::replace(entry, placeholder);
                removed.push((*key, evicted));
                false
            } else {
                true
            }
        });
        removed
    }

    /// Number of entries currently cached.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// `true` if the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ParsedDescriptor;

    fn entry(timestamp: i64) -> CacheEntry {
        CacheEntry::new(
            b"descriptor bytes".to_vec(),
            ParsedDescriptor {
                public_key: vec![7],
                timestamp,
                version: 2,
                intro_nodes: Vec::new(),
            },
            0,
        )
    }

    fn desc_id(byte: u8) -> [u8; DESC_ID_LEN] {
        [byte; DESC_ID_LEN]
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let id = desc_id(42);
        let encoded = encode_desc_id(&id);
        assert_eq!(encoded.len(), DESC_ID_LEN_BASE32);
        assert_eq!(decode_desc_id(&encoded), Some(id));
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert_eq!(decode_desc_id("tooshort"), None);
    }

    #[test]
    fn test_decode_rejects_illegal_characters() {
        let bogus = "!".repeat(DESC_ID_LEN_BASE32);
        assert_eq!(decode_desc_id(&bogus), None);
    }

    #[test]
    fn test_lookup_and_serve_malformed() {
        let mut idx = DirectoryIndex::new();
        assert_eq!(
            idx.lookup_and_serve("not valid base32!!", 100),
            DirLookupResult::Malformed
        );
    }

    #[test]
    fn test_lookup_and_serve_well_formed_but_missing() {
        let mut idx = DirectoryIndex::new();
        let encoded = encode_desc_id(&desc_id(1));
        assert_eq!(
            idx.lookup_and_serve(&encoded, 100),
            DirLookupResult::WellFormedButMissing
        );
    }

    #[test]
    fn test_lookup_and_serve_found_updates_last_served() {
        let mut idx = DirectoryIndex::new();
        let id = desc_id(9);
        idx.insert(id, entry(1));
        let encoded = encode_desc_id(&id);
        let result = idx.lookup_and_serve(&encoded, 12345);
        assert_eq!(result, DirLookupResult::Found(b"descriptor bytes".to_vec()));
        assert_eq!(idx.get(&id).unwrap().last_served(), 12345);
    }

    #[test]
    fn test_retain_and_collect_removed() {
        let mut idx = DirectoryIndex::new();
        idx.insert(desc_id(1), entry(10));
        idx.insert(desc_id(2), entry(200));
        let removed = idx.retain_and_collect_removed(|_, e| e.parsed().timestamp < 50);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].0, desc_id(1));
        assert_eq!(idx.len(), 1);
    }
}
