//! The cached value object, grounded on `rend_cache_entry_t` and
//! `rend_cache_entry_allocation` in `rendcache.c`.

use crate::descriptor::ParsedDescriptor;

/// One cached descriptor: its exact wire bytes plus the parsed structure,
/// and the bookkeeping the sweeper needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The exact bytes as received, used when re-serving to peers. Does
    /// not include any trailing terminator.
    encoded: Vec<u8>,

    /// The structured representation.
    parsed: ParsedDescriptor,

    /// Wall-clock time this entry was last handed out to a requester.
    /// Back-dated by [`crate::config::UPLOAD_DAMP`] seconds on first
    /// insertion to damp upload-flooding attacks.
    last_served: i64,
}

impl CacheEntry {
    /// Creates a new entry. `last_served` is the caller's responsibility —
    /// admission back-dates it, lookups overwrite it.
    pub fn new(encoded: Vec<u8>, parsed: ParsedDescriptor, last_served: i64) -> Self {
        Self {
            encoded,
            parsed,
            last_served,
        }
    }

    /// The exact encoded bytes as received.
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    /// Length in bytes of [`Self::encoded`].
    pub fn len(&self) -> usize {
        self.encoded.len()
    }

    /// `true` if [`Self::encoded`] is empty. A reachable entry should never
    /// be empty in practice, but this mirrors the `len == 0` check other
    /// index methods perform defensively.
    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }

    /// The parsed descriptor.
    pub fn parsed(&self) -> &ParsedDescriptor {
        &self.parsed
    }

    /// Time this entry was last served to a requester.
    pub fn last_served(&self) -> i64 {
        self.last_served
    }

    /// Records that this entry was just served, at time `now`.
    pub fn mark_served(&mut self, now: i64) {
        self.last_served = now;
    }

    /// Replaces this entry's payload in place, as the engine does for an
    /// already-occupied slot: the caller is expected to have already
    /// debited the accountant for the old charge before calling this, and
    /// to credit it for the new charge ([`Self::charge`]) afterward.
    pub fn replace(&mut self, encoded: Vec<u8>, parsed: ParsedDescriptor) {
        self.encoded = encoded;
        self.parsed = parsed;
    }

    /// The coarse byte charge this entry contributes to the accountant:
    /// `sizeof(Entry) + entry.len + sizeof(ParsedDescriptor)`. Deliberately
    /// excludes the introduction-node list and key storage — see
    /// `rend_cache_entry_allocation`'s own comment ("This doesn't count
    /// intro_nodes or key size").
    pub fn charge(&self) -> u64 {
        (std::mem::size_of::<CacheEntry>() as u64)
            + (self.encoded.len() as u64)
            + (std::mem::size_of::<ParsedDescriptor>() as u64)
    }
}
