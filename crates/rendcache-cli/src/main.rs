use std::io::{self, Read};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use rendcache::config::RendCacheConfig;
use rendcache::descriptor::{AuthType, ClientQuery, ParsedDescriptor};
use rendcache::error::{CryptoError, ParseError};
use rendcache::parser::{Clock, CryptoProvider, DescriptorParser, HashRing, ParsedDescriptorOutput};
use rendcache::RendCache;
use serde::Serialize;

const DESCRIPTOR_PREFIX: &str = "rendezvous-service-descriptor ";

/// Drive the rendezvous descriptor cache end to end against a fixed,
/// in-process fake for the descriptor parser, crypto provider, hash ring,
/// and clock — this binary exists to exercise the cache's externally
/// observable behavior without a real routing process.
#[derive(Parser, Debug)]
#[command(name = "rendcache-cli", about = "Exercise the rendezvous descriptor cache and emit JSON results")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store one or more concatenated descriptors on behalf of the directory role.
    StoreDir {
        /// Read the descriptor batch from this file instead of stdin.
        #[arg(long)]
        file: Option<std::path::PathBuf>,
    },
    /// Store exactly one descriptor on behalf of the client role.
    StoreClient {
        /// Base32 descriptor id the caller expects to receive.
        #[arg(long)]
        expected_desc_id: String,
        /// Onion address the caller expects, if any.
        #[arg(long, default_value = "")]
        onion_address: String,
        /// Read the descriptor from this file instead of stdin.
        #[arg(long)]
        file: Option<std::path::PathBuf>,
    },
    /// Look up a cached descriptor by service id (client index).
    Lookup {
        service_id: String,
        #[arg(long, default_value_t = 2)]
        version: i32,
    },
    /// Look up a cached descriptor by descriptor id (directory index).
    LookupDir { desc_id: String },
    /// Print the accountant's current total.
    Stats,
}

/// Trivial textual descriptor format used only by this CLI's fake parser:
///
/// ```text
/// rendezvous-service-descriptor <hex public key>
/// timestamp <unix seconds>
/// <arbitrary body, becomes the opaque encoded form>
/// ```
///
/// Multiple descriptors may be concatenated; each must start with the
/// literal `rendezvous-service-descriptor ` prefix, matching the batch
/// continuation rule `store_as_directory` checks for.
struct TextDescriptorParser;

impl TextDescriptorParser {
    fn parse_header(buf: &[u8]) -> Option<(Vec<u8>, i64, usize)> {
        let text = std::str::from_utf8(buf).ok()?;
        let rest = text.strip_prefix(DESCRIPTOR_PREFIX)?;
        let (pubkey_hex, rest) = rest.split_once('\n')?;
        let rest_after_ts = rest.strip_prefix("timestamp ")?;
        let (timestamp_str, _) = rest_after_ts.split_once('\n')?;
        let timestamp: i64 = timestamp_str.trim().parse().ok()?;
        let public_key = hex_decode(pubkey_hex.trim())?;
        let header_len = DESCRIPTOR_PREFIX.len()
            + pubkey_hex.len()
            + 1
            + "timestamp ".len()
            + timestamp_str.len()
            + 1;
        Some((public_key, timestamp, header_len))
    }
}

impl DescriptorParser for TextDescriptorParser {
    fn parse(&self, buf: &[u8], _skip_intro_decrypt: bool) -> Result<ParsedDescriptorOutput, ParseError> {
        let (public_key, timestamp, header_len) = Self::parse_header(buf)
            .ok_or_else(|| ParseError::Malformed("missing descriptor header".to_string()))?;

        let body = &buf[header_len..];
        let next_marker = body
            .windows(DESCRIPTOR_PREFIX.len())
            .position(|w| w == DESCRIPTOR_PREFIX.as_bytes());
        let (encoded_size, next_offset) = match next_marker {
            Some(pos) => (header_len + pos, header_len + pos),
            None => (buf.len(), buf.len()),
        };

        let mut desc_id = [0u8; 20];
        let digest = simple_digest(&public_key, timestamp);
        desc_id.copy_from_slice(&digest);

        Ok(ParsedDescriptorOutput {
            parsed: ParsedDescriptor {
                public_key,
                timestamp,
                version: 2,
                intro_nodes: Vec::new(),
            },
            desc_id,
            intro_encrypted: Vec::new(),
            encoded_size,
            next_offset,
        })
    }

    fn parse_intro_points(&self, parsed: &mut ParsedDescriptor, _blob: &[u8]) -> i64 {
        parsed.intro_nodes = Vec::new();
        0
    }
}

struct IdentityCrypto;

impl CryptoProvider for IdentityCrypto {
    fn decrypt_intro_points(&self, _cookie: &[u8; 16], blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(blob.to_vec())
    }

    fn derive_service_id(&self, public_key: &[u8]) -> Result<String, CryptoError> {
        let digest = simple_digest(public_key, 0);
        Ok(base32::encode(base32::Alphabet::RFC4648 { padding: false }, &digest[..10]).to_ascii_lowercase())
    }
}

/// Always acts as a directory and is responsible for every descriptor id —
/// the CLI has no real hash ring to consult.
struct PermissiveRing;

impl HashRing for PermissiveRing {
    fn is_directory(&self) -> bool {
        true
    }

    fn is_responsible_for(&self, _desc_id: &[u8; 20]) -> bool {
        true
    }
}

struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// A deliberately non-cryptographic digest, sufficient to give the CLI's
/// fake parser/crypto stable, collision-avoiding 20-byte ids for demo input.
fn simple_digest(data: &[u8], salt: i64) -> [u8; 20] {
    let mut state: u64 = 0xcbf29ce484222325 ^ (salt as u64);
    for &byte in data {
        state ^= byte as u64;
        state = state.wrapping_mul(0x100000001b3);
    }
    let mut out = [0u8; 20];
    for (i, chunk) in out.chunks_mut(8).enumerate() {
        let mixed = state.wrapping_add(i as u64).wrapping_mul(0x9e3779b97f4a7c15);
        let bytes = mixed.to_be_bytes();
        chunk.copy_from_slice(&bytes[..chunk.len()]);
    }
    out
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[derive(Serialize)]
struct CliResult {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoded: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_bytes: Option<u64>,
}

fn read_input(file: Option<std::path::PathBuf>) -> Vec<u8> {
    match file {
        Some(path) => std::fs::read(&path).unwrap_or_else(|e| {
            eprintln!("Error reading file: {e}");
            std::process::exit(1);
        }),
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf).unwrap_or_else(|e| {
                eprintln!("Error reading stdin: {e}");
                std::process::exit(1);
            });
            buf
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut cache = RendCache::init(
        RendCacheConfig::default(),
        TextDescriptorParser,
        IdentityCrypto,
        PermissiveRing,
        SystemClock,
    );

    let result = match args.command {
        Command::StoreDir { file } => {
            let blob = read_input(file);
            let status = cache.store_as_directory(&blob);
            CliResult {
                status: format!("{status:?}"),
                service_id: None,
                encoded: None,
                total_bytes: Some(cache.total_bytes()),
            }
        }
        Command::StoreClient { expected_desc_id, onion_address, file } => {
            let blob = read_input(file);
            let query = ClientQuery {
                onion_address,
                auth_type: AuthType::NoAuth,
                descriptor_cookie: [0u8; 16],
            };
            let (status, service_id) = cache.store_as_client(&blob, &expected_desc_id, &query);
            CliResult {
                status: format!("{status:?}"),
                service_id,
                encoded: None,
                total_bytes: Some(cache.total_bytes()),
            }
        }
        Command::Lookup { service_id, version } => {
            use rendcache::error::LookupResult;
            match cache.lookup(&service_id, version) {
                LookupResult::Found(entry) => CliResult {
                    status: "Found".to_string(),
                    service_id: Some(service_id),
                    encoded: Some(String::from_utf8_lossy(entry.encoded()).into_owned()),
                    total_bytes: None,
                },
                LookupResult::NotFound => CliResult {
                    status: "NotFound".to_string(),
                    service_id: Some(service_id),
                    encoded: None,
                    total_bytes: None,
                },
                LookupResult::InvalidQuery => CliResult {
                    status: "InvalidQuery".to_string(),
                    service_id: Some(service_id),
                    encoded: None,
                    total_bytes: None,
                },
            }
        }
        Command::LookupDir { desc_id } => {
            use rendcache::error::DirLookupResult;
            match cache.lookup_by_desc_id(&desc_id) {
                DirLookupResult::Found(bytes) => CliResult {
                    status: "Found".to_string(),
                    service_id: None,
                    encoded: Some(String::from_utf8_lossy(&bytes).into_owned()),
                    total_bytes: None,
                },
                DirLookupResult::WellFormedButMissing => CliResult {
                    status: "WellFormedButMissing".to_string(),
                    service_id: None,
                    encoded: None,
                    total_bytes: None,
                },
                DirLookupResult::Malformed => CliResult {
                    status: "Malformed".to_string(),
                    service_id: None,
                    encoded: None,
                    total_bytes: None,
                },
            }
        }
        Command::Stats => CliResult {
            status: "Ok".to_string(),
            service_id: None,
            encoded: None,
            total_bytes: Some(cache.total_bytes()),
        },
    };

    let json = serde_json::to_string(&result).expect("CliResult is always serializable");
    println!("{json}");
}
