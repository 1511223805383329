//! Collaborator ports: the external systems `rendcache.c` calls out to
//! (`rend_parse_v2_service_descriptor`, `rend_decrypt_introduction_points`,
//! `rend_get_service_id`, `hid_serv_acting_as_directory`,
//! `hid_serv_responsible_for_desc_id`, `approx_time`/`time`,
//! `rep_hist_stored_maybe_new_hs`) — modeled as traits so the cache can be
//! exercised without a real Tor process.

use crate::descriptor::ParsedDescriptor;
use crate::error::{CryptoError, ParseError};

/// One descriptor parsed out of a (possibly multi-descriptor) buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDescriptorOutput {
    /// The structured descriptor.
    pub parsed: ParsedDescriptor,
    /// The 20-byte raw descriptor id digest.
    pub desc_id: [u8; 20],
    /// The still-encrypted (or plaintext, if the descriptor had none)
    /// introduction-point blob. Empty if the descriptor carries none.
    pub intro_encrypted: Vec<u8>,
    /// Length, in bytes, of this descriptor's encoded form within the
    /// input buffer (used to copy out exactly `encoded_size` bytes).
    pub encoded_size: usize,
    /// Byte offset within the input buffer where the next descriptor (if
    /// any) begins.
    pub next_offset: usize,
}

/// The wire-format parser and its cryptographic primitives, external to
/// this crate (`rend_parse_v2_service_descriptor` /
/// `rend_parse_introduction_points` in the original).
pub trait DescriptorParser {
    /// Parse one descriptor out of `buf`, starting at offset 0.
    ///
    /// `skip_intro_decrypt` mirrors the original's `as_dir` flag: when
    /// `true`, the parser does not attempt to interpret
    /// `intro_encrypted` at all (the directory role discards it
    /// unconditionally), it only needs to report its size and bytes.
    fn parse(
        &self,
        buf: &[u8],
        skip_intro_decrypt: bool,
    ) -> Result<ParsedDescriptorOutput, ParseError>;

    /// Parse introduction points out of `blob` (already decrypted if
    /// applicable) into `parsed.intro_nodes`.
    ///
    /// Returns the number of introduction points parsed; zero or negative
    /// signals failure, matching `rend_parse_introduction_points`'s return
    /// convention.
    fn parse_intro_points(&self, parsed: &mut ParsedDescriptor, blob: &[u8]) -> i64;
}

/// Cryptographic operations external to the wire-format parser
/// (`rend_decrypt_introduction_points`, `rend_get_service_id`).
pub trait CryptoProvider {
    /// Decrypt an introduction-point blob with the given descriptor cookie.
    fn decrypt_intro_points(
        &self,
        cookie: &[u8; crate::config::DESCRIPTOR_COOKIE_LEN],
        blob: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    /// Derive the base32 service id (without version prefix) from a raw
    /// public key.
    fn derive_service_id(&self, public_key: &[u8]) -> Result<String, CryptoError>;
}

/// The distributed-hash-ring predicates
/// (`hid_serv_acting_as_directory`, `hid_serv_responsible_for_desc_id`).
pub trait HashRing {
    /// Whether this node is currently acting as a hidden service directory.
    fn is_directory(&self) -> bool;

    /// Whether this node's position on the ring covers `desc_id`.
    fn is_responsible_for(&self, desc_id: &[u8; 20]) -> bool;
}

/// Wall-clock and monotonic time sources (`time(NULL)`, `approx_time()`).
pub trait Clock {
    /// Current wall-clock time, Unix seconds.
    fn now(&self) -> i64;

    /// Current monotonic-ish time, Unix seconds, used for `last_served`.
    /// In the original these are the same clock; kept distinct here so a
    /// test double can diverge them if it ever needs to.
    fn approx_time(&self) -> i64 {
        self.now()
    }
}

/// The statistics sink (`rep_hist_stored_maybe_new_hs`), gated in the
/// original by `options->HiddenServiceStatistics`.
pub trait StatsSink {
    /// Record that a descriptor for `public_key` was stored, possibly for
    /// a service not seen before.
    fn note_stored_maybe_new(&self, public_key: &[u8]);
}

/// A [`StatsSink`] that does nothing, used when statistics are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatsSink;

impl StatsSink for NullStatsSink {
    fn note_stored_maybe_new(&self, _public_key: &[u8]) {}
}
