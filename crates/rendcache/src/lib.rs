//! In-memory cache for hidden service rendezvous descriptors: a
//! store-and-forward point for the directory role, and a fetched-descriptor
//! cache for the client role.
//!
//! Ported from Tor's `rendcache.c`. The wire-format parser, cryptographic
//! primitives, hash-ring predicates, clock, and statistics sink are
//! injected as trait objects (see [`parser`]) rather than hardcoded, so the
//! cache can be exercised without a real routing process.

pub mod accountant;
pub mod client_index;
pub mod config;
pub mod descriptor;
pub mod directory_index;
pub mod engine;
pub mod entry;
pub mod error;
pub mod parser;
pub mod sweeper;

use accountant::Accountant;
use client_index::ClientIndex;
use config::RendCacheConfig;
use descriptor::ClientQuery;
use directory_index::DirectoryIndex;
use entry::CacheEntry;
use error::{DirLookupResult, LookupResult, StoreStatus};
use parser::{Clock, CryptoProvider, DescriptorParser, HashRing, NullStatsSink, StatsSink};

/// The cache itself: both indexes, the accountant, configuration, and the
/// injected collaborators.
///
/// Every mutating operation takes `&mut self`, including [`Self::lookup_by_desc_id`]
/// (which writes `last_served`); this struct performs no internal
/// synchronization and does not implement `Sync` — a multi-threaded host is
/// expected to wrap it in a single reader/writer lock.
pub struct RendCache<P, C, R, K, S = NullStatsSink>
where
    P: DescriptorParser,
    C: CryptoProvider,
    R: HashRing,
    K: Clock,
    S: StatsSink,
{
    config: RendCacheConfig,
    client: ClientIndex,
    directory: DirectoryIndex,
    accountant: Accountant,
    parser: P,
    crypto: C,
    ring: R,
    clock: K,
    stats: S,
}

impl<P, C, R, K> RendCache<P, C, R, K, NullStatsSink>
where
    P: DescriptorParser,
    C: CryptoProvider,
    R: HashRing,
    K: Clock,
{
    /// Creates a cache with statistics disabled, matching the
    /// `options->HiddenServiceStatistics` default.
    pub fn init(config: RendCacheConfig, parser: P, crypto: C, ring: R, clock: K) -> Self {
        Self::init_with_stats(config, parser, crypto, ring, clock, NullStatsSink)
    }
}

impl<P, C, R, K, S> RendCache<P, C, R, K, S>
where
    P: DescriptorParser,
    C: CryptoProvider,
    R: HashRing,
    K: Clock,
    S: StatsSink,
{
    /// Creates a cache with both indexes empty and the accountant at zero,
    /// matching `rend_cache_init`.
    pub fn init_with_stats(config: RendCacheConfig, parser: P, crypto: C, ring: R, clock: K, stats: S) -> Self {
        Self {
            config,
            client: ClientIndex::new(),
            directory: DirectoryIndex::new(),
            accountant: Accountant::new(),
            parser,
            crypto,
            ring,
            clock,
            stats,
        }
    }

    /// Current total resident bytes attributed to the cache.
    pub fn total_bytes(&self) -> u64 {
        self.accountant.get()
    }

    /// Client-index lookup. See [`client_index::ClientIndex::lookup`].
    pub fn lookup(&self, query: &str, version: i32) -> LookupResult<'_> {
        self.client.lookup(query, version)
    }

    /// Directory-index lookup by base32 descriptor id. On a hit, stamps
    /// `last_served` to the current time — the sole write a read path
    /// performs.
    pub fn lookup_by_desc_id(&mut self, desc_id_base32: &str) -> DirLookupResult {
        let now = self.clock.approx_time();
        self.directory.lookup_and_serve(desc_id_base32, now)
    }

    /// Stores one or more concatenated descriptors on behalf of the
    /// directory role. See [`engine::store_as_directory`].
    pub fn store_as_directory(&mut self, blob: &[u8]) -> StoreStatus {
        engine::store_as_directory(
            blob,
            &self.config,
            &mut self.directory,
            &mut self.accountant,
            &self.parser,
            &self.ring,
            &self.clock,
            &self.stats,
        )
    }

    /// Stores exactly one descriptor on behalf of the client role. On
    /// `StoreStatus::Ok`, the returned service id can be passed to
    /// [`Self::get_client_entry`] to retrieve the live entry — this avoids
    /// returning a `&CacheEntry` borrow out of a `&mut self` call, which
    /// would prevent the caller from making any further mutating call on
    /// the cache while holding it.
    pub fn store_as_client(
        &mut self,
        blob: &[u8],
        expected_desc_id_base32: &str,
        query: &ClientQuery,
    ) -> (StoreStatus, Option<String>) {
        engine::store_as_client(
            blob,
            expected_desc_id_base32,
            query,
            &self.config,
            &mut self.client,
            &mut self.accountant,
            &self.parser,
            &self.crypto,
            &self.clock,
        )
    }

    /// Re-fetches the live entry stored for `service_id`, if any.
    pub fn get_client_entry(&self, service_id: &str) -> Option<&CacheEntry> {
        self.client.get(service_id)
    }

    /// Age-only sweep of the client index. See [`sweeper::clean`].
    pub fn clean(&mut self, now: i64) {
        sweeper::clean(now, &self.config, &mut self.client, &mut self.accountant)
    }

    /// Escalating, quota-driven sweep of the directory index. See
    /// [`sweeper::clean_directory`].
    pub fn clean_directory(&mut self, now: i64, force_remove_bytes: u64) {
        sweeper::clean_directory(
            now,
            force_remove_bytes,
            &self.config,
            &mut self.directory,
            &mut self.accountant,
            &self.ring,
        )
    }

    /// Removes every entry from the client index only, matching
    /// `rend_cache_purge`'s asymmetry: the directory role must preserve
    /// replication-received descriptors across operator-triggered client
    /// cache clears.
    pub fn purge(&mut self) {
        for entry in self.client.drain_all() {
            self.accountant.sub(entry.charge());
        }
    }

    /// Removes every entry from both indexes and hard-zeroes the accountant,
    /// matching `rend_cache_free_all`'s unconditional reset rather than
    /// subtracting each entry's charge back out.
    pub fn free_all(&mut self) {
        self.client.drain_all();
        self.directory.drain_all();
        self.accountant.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{AuthType, ParsedDescriptor};
    use crate::error::{CryptoError, ParseError};
    use crate::parser::ParsedDescriptorOutput;

    struct FixedClock(i64);
    impl Clock for FixedClock {
        fn now(&self) -> i64 {
            self.0
        }
    }

    struct PermissiveRing;
    impl HashRing for PermissiveRing {
        fn is_directory(&self) -> bool {
            true
        }
        fn is_responsible_for(&self, _desc_id: &[u8; 20]) -> bool {
            true
        }
    }

    struct OneDescriptorParser;
    impl DescriptorParser for OneDescriptorParser {
        fn parse(&self, buf: &[u8], _skip: bool) -> Result<ParsedDescriptorOutput, ParseError> {
            if buf.is_empty() {
                return Err(ParseError::Malformed("empty".into()));
            }
            Ok(ParsedDescriptorOutput {
                parsed: ParsedDescriptor {
                    public_key: vec![buf[0]],
                    timestamp: buf[0] as i64 * 1000,
                    version: 2,
                    intro_nodes: Vec::new(),
                },
                desc_id: [buf[0]; 20],
                intro_encrypted: Vec::new(),
                encoded_size: buf.len(),
                next_offset: buf.len(),
            })
        }
        fn parse_intro_points(&self, _parsed: &mut ParsedDescriptor, _blob: &[u8]) -> i64 {
            1
        }
    }

    struct IdentityCrypto;
    impl CryptoProvider for IdentityCrypto {
        fn decrypt_intro_points(&self, _cookie: &[u8; 16], blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
            Ok(blob.to_vec())
        }
        fn derive_service_id(&self, public_key: &[u8]) -> Result<String, CryptoError> {
            Ok(format!("svc{}", public_key.first().copied().unwrap_or(0)))
        }
    }

    fn cache(now: i64) -> RendCache<OneDescriptorParser, IdentityCrypto, PermissiveRing, FixedClock> {
        RendCache::init(
            RendCacheConfig::default(),
            OneDescriptorParser,
            IdentityCrypto,
            PermissiveRing,
            FixedClock(now),
        )
    }

    #[test]
    fn test_init_starts_empty() {
        let c = cache(1_000);
        assert_eq!(c.total_bytes(), 0);
    }

    #[test]
    fn test_lookup_empty_cache_not_found() {
        let c = cache(1_000);
        assert_eq!(c.lookup("aaaaaaaaaaaaaaaa", 2), LookupResult::NotFound);
    }

    #[test]
    fn test_lookup_invalid_query() {
        let c = cache(1_000);
        assert_eq!(c.lookup("!!bad!!query!!xx", 2), LookupResult::InvalidQuery);
    }

    #[test]
    fn test_store_as_directory_when_not_a_directory() {
        struct NotADir;
        impl HashRing for NotADir {
            fn is_directory(&self) -> bool {
                false
            }
            fn is_responsible_for(&self, _desc_id: &[u8; 20]) -> bool {
                true
            }
        }
        let mut c = RendCache::init(
            RendCacheConfig::default(),
            OneDescriptorParser,
            IdentityCrypto,
            NotADir,
            FixedClock(1_000),
        );
        let status = c.store_as_directory(&[5]);
        assert_eq!(status, StoreStatus::NotADirectory);
        assert_eq!(c.total_bytes(), 0);
    }

    #[test]
    fn test_store_as_client_then_lookup_round_trip() {
        let mut c = cache(5_000);
        let desc_id_b32 = directory_index::encode_desc_id(&[3; 20]);
        let query = ClientQuery {
            onion_address: String::new(),
            auth_type: AuthType::NoAuth,
            descriptor_cookie: [0u8; 16],
        };
        let (status, service_id) = c.store_as_client(&[3], &desc_id_b32, &query);
        assert_eq!(status, StoreStatus::Ok);
        assert!(c.total_bytes() > 0);

        let service_id = service_id.unwrap();
        assert!(c.get_client_entry(&service_id).is_some());
    }

    #[test]
    fn test_re_admitting_same_buffer_has_no_allocator_delta() {
        let mut c = cache(5_000);
        let desc_id_b32 = directory_index::encode_desc_id(&[3; 20]);
        let query = ClientQuery {
            onion_address: String::new(),
            auth_type: AuthType::NoAuth,
            descriptor_cookie: [0u8; 16],
        };
        let (_, _) = c.store_as_client(&[3], &desc_id_b32, &query);
        let total_after_first = c.total_bytes();
        let (status, _) = c.store_as_client(&[3], &desc_id_b32, &query);
        assert_eq!(status, StoreStatus::Ok);
        assert_eq!(c.total_bytes(), total_after_first);
    }

    #[test]
    fn test_purge_clears_client_but_not_directory() {
        let mut c = cache(5_000);
        let client_desc_id_b32 = directory_index::encode_desc_id(&[4; 20]);
        let query = ClientQuery {
            onion_address: String::new(),
            auth_type: AuthType::NoAuth,
            descriptor_cookie: [0u8; 16],
        };
        c.store_as_client(&[4], &client_desc_id_b32, &query);
        c.store_as_directory(&[6]);
        assert!(c.total_bytes() > 0);

        c.purge();

        assert!(c.client.is_empty());
        assert_eq!(c.directory.len(), 1);
    }

    #[test]
    fn test_free_all_clears_both_indexes_and_zeroes_accountant() {
        let mut c = cache(5_000);
        let client_desc_id_b32 = directory_index::encode_desc_id(&[4; 20]);
        let query = ClientQuery {
            onion_address: String::new(),
            auth_type: AuthType::NoAuth,
            descriptor_cookie: [0u8; 16],
        };
        c.store_as_client(&[4], &client_desc_id_b32, &query);
        c.store_as_directory(&[6]);

        c.free_all();

        assert!(c.client.is_empty());
        assert!(c.directory.is_empty());
        assert_eq!(c.total_bytes(), 0);
    }

    #[test]
    fn test_lookup_by_desc_id_updates_last_served() {
        let mut c = cache(5_000);
        c.store_as_directory(&[8]);
        let desc_id_b32 = directory_index::encode_desc_id(&[8; 20]);

        let result = c.lookup_by_desc_id(&desc_id_b32);
        assert!(matches!(result, DirLookupResult::Found(_)));
    }
}
