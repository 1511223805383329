//! The parsed representation of a rendezvous service descriptor and the
//! small value types that travel alongside it.

/// An introduction point as carried by a parsed descriptor.
///
/// The wire format of an introduction point (onion key, relay identity,
/// extensions) is owned entirely by the external parser; this crate only
/// ever needs to count them and move them around, so they are kept as an
/// opaque blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntroductionPoint(pub Vec<u8>);

/// The structured form of a hidden service descriptor, as handed back by
/// [`crate::parser::DescriptorParser::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDescriptor {
    /// The service's public key, in whatever encoding the parser produces.
    pub public_key: Vec<u8>,

    /// Signed publication timestamp, Unix seconds.
    pub timestamp: i64,

    /// Descriptor format version. Only version 2 is supported by this
    /// crate; the parser is expected to reject anything older itself.
    pub version: u8,

    /// Ordered, possibly-empty list of introduction points.
    pub intro_nodes: Vec<IntroductionPoint>,
}

/// Authorization scheme carried by a client lookup, mirroring the three
/// schemes a `rend_data_t` query could specify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    /// No client authorization; introduction points are not decrypted.
    NoAuth,
    /// Basic authorization.
    Basic,
    /// Stealth authorization.
    Stealth,
}

/// The client-supplied context for a `store_as_client` call: which service
/// the caller expects to get back, and how to decrypt its introduction
/// points if they are encrypted.
#[derive(Debug, Clone)]
pub struct ClientQuery {
    /// The onion address the caller expects, or empty if the caller has no
    /// expectation (e.g. first-ever fetch for a service).
    pub onion_address: String,

    /// The authorization scheme to use when the descriptor's introduction
    /// points are encrypted.
    pub auth_type: AuthType,

    /// The descriptor cookie used to decrypt introduction points when
    /// `auth_type != AuthType::NoAuth`.
    pub descriptor_cookie: [u8; crate::config::DESCRIPTOR_COOKIE_LEN],
}

impl ClientQuery {
    /// Returns `true` if `descriptor_cookie` is all-zero, i.e. the caller
    /// supplied no usable cookie.
    pub fn cookie_is_zero(&self) -> bool {
        self.descriptor_cookie.iter().all(|b| *b == 0)
    }
}
