//! The client-role index, keyed by `"<version><service_id>"`, grounded on
//! `rend_cache` (a `strmap_t`, case-insensitive) and `rend_valid_service_id`
//! in `rendcache.c`.

use std::collections::HashMap;

use tracing::warn;

use crate::config::SERVICE_ID_LEN_BASE32;
use crate::entry::CacheEntry;
use crate::error::LookupResult;

/// Returns `true` if `query` is a syntactically valid service id: exactly
/// [`SERVICE_ID_LEN_BASE32`] characters from the alphabet `[a-z2-7]`,
/// case-insensitive.
pub fn is_valid_service_id(query: &str) -> bool {
    query.len() == SERVICE_ID_LEN_BASE32
        && query.chars().all(|c| {
            let c = c.to_ascii_lowercase();
            c.is_ascii_digit() && ('2'..='7').contains(&c) || c.is_ascii_lowercase()
        })
}

/// Builds the case-folded index key `"<version><service_id>"`. Callers
/// always use version `2` per the spec (version 0 never probes the index).
fn index_key(service_id: &str) -> String {
    format!("2{service_id}").to_ascii_lowercase()
}

/// Map from `"<version><service_id>"` (case-insensitive) to [`CacheEntry`].
#[derive(Debug, Default)]
pub struct ClientIndex {
    map: HashMap<String, CacheEntry>,
}

impl ClientIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up `query` under `version`.
    ///
    /// Version `0` is deprecated: logs a warning and returns `NotFound`
    /// without probing the index. Version `2` (and any other value,
    /// treated as the default) probes the index case-insensitively.
    pub fn lookup(&self, query: &str, version: i32) -> LookupResult<'_> {
        if !is_valid_service_id(query) {
            return LookupResult::InvalidQuery;
        }

        if version == 0 {
            warn!("cache lookup of a v0 rendezvous descriptor is deprecated");
            return LookupResult::NotFound;
        }

        match self.map.get(&index_key(query)) {
            Some(entry) => LookupResult::Found(entry),
            None => LookupResult::NotFound,
        }
    }

    /// Returns the entry stored for `service_id` under version 2, if any,
    /// regardless of how it got there. Used by the engine after a
    /// successful `store_as_client` to hand the caller a live reference.
    pub fn get(&self, service_id: &str) -> Option<&CacheEntry> {
        self.map.get(&index_key(service_id))
    }

    /// Returns a mutable reference to the entry stored for `service_id`
    /// under version 2, if any.
    pub fn get_mut(&mut self, service_id: &str) -> Option<&mut CacheEntry> {
        self.map.get_mut(&index_key(service_id))
    }

    /// Inserts or overwrites the entry for `service_id` under version 2.
    pub fn insert(&mut self, service_id: &str, entry: CacheEntry) {
        self.map.insert(index_key(service_id), entry);
    }

    /// Removes and returns every entry, leaving the index empty. Used by
    /// `purge` and `free_all`; callers are responsible for debiting the
    /// accountant for each returned entry.
    pub fn drain_all(&mut self) -> Vec<CacheEntry> {
        self.map.drain().map(|(_, v)| v).collect()
    }

    /// Removes every entry for which `predicate` returns `true`, returning
    /// the removed entries. Used by the age-only sweep.
    pub fn retain_and_collect_removed(
        &mut self,
        mut predicate: impl FnMut(&CacheEntry) -> bool,
    ) -> Vec<CacheEntry> {
        let mut removed = Vec::new();
        self.map.retain(|_, entry| {
            if predicate(entry) {
                true
            } else {
                let placeholder = CacheEntry::new(Vec::new(), entry.parsed().clone(), 0);
                removed.push(std::mem::replace(entry, placeholder));
                false
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
            b"desc".to_vec(),
            ParsedDescriptor {
                public_key: vec![9],
                timestamp,
                version: 2,
                intro_nodes: Vec::new(),
            },
            0,
        )
    }

    #[test]
    fn test_valid_service_id_accepts_lowercase_base32() {
        assert!(is_valid_service_id("abcdefghijklmnop"));
    }

    #[test]
    fn test_valid_service_id_accepts_uppercase() {
        assert!(is_valid_service_id("ABCDEFGHIJKLMNOP"));
    }

    #[test]
    fn test_valid_service_id_rejects_wrong_length() {
        assert!(!is_valid_service_id("short"));
    }

    #[test]
    fn test_valid_service_id_rejects_bad_alphabet() {
        assert!(!is_valid_service_id("!!bad!!query!!xx"));
    }

    #[test]
    fn test_valid_service_id_rejects_digits_outside_2_7() {
        // '0','1','8','9' are not part of the base32 alphabet used here.
        assert!(!is_valid_service_id("abcdefghijklmno1"));
    }

    #[test]
    fn test_lookup_empty_cache_not_found() {
        let idx = ClientIndex::new();
        assert_eq!(
            idx.lookup("aaaaaaaaaaaaaaaa", 2),
            LookupResult::NotFound
        );
    }

    #[test]
    fn test_lookup_invalid_query() {
        let idx = ClientIndex::new();
        assert_eq!(
            idx.lookup("!!bad!!query!!xx", 2),
            LookupResult::InvalidQuery
        );
    }

    #[test]
    fn test_lookup_version_zero_never_touches_index() {
        let mut idx = ClientIndex::new();
        idx.insert("aaaaaaaaaaaaaaaa", entry(1));
        assert_eq!(idx.lookup("aaaaaaaaaaaaaaaa", 0), LookupResult::NotFound);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut idx = ClientIndex::new();
        idx.insert("abcdefghijklmnop", entry(5));
        let lower = idx.lookup("abcdefghijklmnop", 2);
        let upper = idx.lookup("ABCDEFGHIJKLMNOP", 2);
        match (lower, upper) {
            (LookupResult::Found(a), LookupResult::Found(b)) => {
                assert_eq!(a.parsed().timestamp, b.parsed().timestamp);
            }
            other => panic!("expected both lookups to find the entry, got {:?}", other),
        }
    }

    #[test]
    fn test_drain_all_empties_index() {
        let mut idx = ClientIndex::new();
        idx.insert("aaaaaaaaaaaaaaaa", entry(1));
        idx.insert("bbbbbbbbbbbbbbbb", entry(2));
        let drained = idx.drain_all();
        assert_eq!(drained.len(), 2);
        assert!(idx.is_empty());
    }

    #[test]
    fn test_retain_and_collect_removed_only_removes_matching() {
        let mut idx = ClientIndex::new();
        idx.insert("aaaaaaaaaaaaaaaa", entry(1));
        idx.insert("bbbbbbbbbbbbbbbb", entry(100));
        let removed = idx.retain_and_collect_removed(|e| e.parsed().timestamp >= 50);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].parsed().timestamp, 1);
        assert_eq!(idx.len(), 1);
    }
}
