//! Status and error types surfaced by the cache's public operations.
//!
//! Per the propagation policy: per-descriptor failures inside a directory
//! batch are logged and the batch continues — only an empty batch reaches
//! [`StoreStatus::BadDescriptor`]. Client-path failures are surfaced
//! immediately via [`StoreStatus`] as well, since both store paths share one
//! result vocabulary.

use thiserror::Error;

/// Outcome of [`crate::RendCache::lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult<'a> {
    /// A live entry was found for the requested service id.
    Found(&'a crate::entry::CacheEntry),
    /// The service id was well-formed but no entry is cached.
    NotFound,
    /// The query was not a syntactically valid service id.
    InvalidQuery,
}

/// Outcome of [`crate::RendCache::lookup_by_desc_id`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirLookupResult {
    /// A descriptor is cached under this id; carries the exact encoded
    /// bytes as received.
    Found(Vec<u8>),
    /// The descriptor id decoded fine but nothing is cached under it.
    WellFormedButMissing,
    /// The descriptor id failed to base32-decode.
    Malformed,
}

/// Result of [`crate::RendCache::store_as_directory`] and
/// [`crate::RendCache::store_as_client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    /// Success. For the directory path this covers "admitted at least one
    /// descriptor" as well as "all descriptors were skipped" — see
    /// `rendcache.c`'s `number_stored` vs. `number_parsed` distinction,
    /// which this crate also does not surface as a separate status.
    Ok,
    /// The call could not parse a usable descriptor out of the input, or
    /// (client path) a parsed descriptor failed identity/freshness/
    /// introduction-point validation.
    BadDescriptor,
    /// `store_as_directory` was invoked while the node is not acting as a
    /// hidden service directory.
    NotADirectory,
}

/// Failure modes an external [`crate::parser::DescriptorParser`] may report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The input could not be parsed as a version-2 descriptor at all.
    #[error("malformed descriptor: {0}")]
    Malformed(String),
    /// The input claimed a format version this crate does not support.
    #[error("unsupported descriptor version {0}")]
    UnsupportedVersion(u8),
}

/// Failure modes an external [`crate::parser::CryptoProvider`] may report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Introduction-point decryption failed (wrong cookie, corrupt
    /// ciphertext, etc). Per spec this is logged and non-fatal: the
    /// pipeline proceeds with the still-encrypted blob.
    #[error("failed to decrypt introduction points")]
    DecryptionFailed,
    /// The service id could not be derived from the given public key.
    #[error("failed to derive service id from public key")]
    ServiceIdDerivationFailed,
}
