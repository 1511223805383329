//! Admission & Replacement Engine, grounded on
//! `rend_cache_store_v2_desc_as_dir` and `rend_cache_store_v2_desc_as_client`
//! in `rendcache.c`.
//!
//! Kept as two separate entry points rather than unified, because — as the
//! original's own comment on this point says — dirs don't care about
//! encrypted introduction points and clients do; dirs key by descriptor id
//! and clients key by service id; dirs are responsibility-gated and clients
//! are not; dirs process batches and clients accept a single descriptor.

use tracing::{debug, info, warn};

use crate::accountant::Accountant;
use crate::client_index::ClientIndex;
use crate::config::{RendCacheConfig, UPLOAD_DAMP};
use crate::descriptor::ClientQuery;
use crate::directory_index::{self, DirectoryIndex};
use crate::entry::CacheEntry;
use crate::error::StoreStatus;
use crate::parser::{Clock, CryptoProvider, DescriptorParser, HashRing, StatsSink};

const RENDEZVOUS_DESCRIPTOR_PREFIX: &str = "rendezvous-service-descriptor ";

/// Replaces the payload at an occupied slot, debiting the old charge and
/// crediting the new one, matching the decrement-then-replace-then-increment
/// sequence both store paths share.
fn replace_in_place(
    accountant: &mut Accountant,
    entry: &mut CacheEntry,
    encoded: Vec<u8>,
    parsed: crate::descriptor::ParsedDescriptor,
) {
    accountant.sub(entry.charge());
    entry.replace(encoded, parsed);
    accountant.add(entry.charge());
}

/// Runs `store_as_directory`, consulting `ring` for responsibility and
/// `clock` for the current time.
pub fn store_as_directory(
    blob: &[u8],
    config: &RendCacheConfig,
    directory: &mut DirectoryIndex,
    accountant: &mut Accountant,
    parser: &dyn DescriptorParser,
    ring: &dyn HashRing,
    clock: &dyn Clock,
    stats: &dyn StatsSink,
) -> StoreStatus {
    if !ring.is_directory() {
        info!("cannot store descriptors: not acting as hidden service directory");
        return StoreStatus::NotADirectory;
    }

    let now = clock.now();
    let mut number_parsed = 0u32;
    let mut number_stored = 0u32;
    let mut cursor = 0usize;

    loop {
        let output = match parser.parse(&blob[cursor..], true) {
            Ok(output) => output,
            Err(_) => break,
        };
        number_parsed += 1;

        let desc_id_base32 = directory_index::encode_desc_id(&output.desc_id);

        if !ring.is_responsible_for(&output.desc_id) {
            info!(desc_id = %desc_id_base32, "descriptor is not in the interval we are responsible for");
        } else if output.parsed.timestamp < config.min_timestamp(now) {
            info!(desc_id = %desc_id_base32, "descriptor is too old");
        } else if output.parsed.timestamp > config.max_timestamp(now) {
            info!(desc_id = %desc_id_base32, "descriptor is too far in the future");
        } else {
            let dominated = directory
                .get(&output.desc_id)
                .map(|existing| existing.parsed().timestamp > output.parsed.timestamp)
                .unwrap_or(false);
            let duplicate = directory
                .get(&output.desc_id)
                .map(|existing| existing.encoded() == &blob[cursor..cursor + output.encoded_size])
                .unwrap_or(false);

            if dominated {
                info!(desc_id = %desc_id_base32, "we already have a newer descriptor with this id");
            } else if duplicate {
                info!(desc_id = %desc_id_base32, "we already have this exact descriptor");
            } else {
                let encoded = blob[cursor..cursor + output.encoded_size].to_vec();
                let public_key = output.parsed.public_key.clone();

                match directory.get_mut(&output.desc_id) {
                    Some(existing) => {
                        replace_in_place(accountant, existing, encoded, output.parsed);
                    }
                    None => {
                        let fresh = CacheEntry::new(
                            encoded,
                            output.parsed,
                            clock.approx_time() - UPLOAD_DAMP,
                        );
                        accountant.add(fresh.charge());
                        directory.insert(output.desc_id, fresh);
                    }
                }

                info!(
                    desc_id = %desc_id_base32,
                    len = output.encoded_size,
                    "successfully stored service descriptor"
                );
                stats.note_stored_maybe_new(&public_key);
                number_stored += 1;
            }
        }

        cursor += output.next_offset;
        if cursor >= blob.len() || !blob[cursor..].starts_with(RENDEZVOUS_DESCRIPTOR_PREFIX.as_bytes())
        {
            break;
        }
    }

    if number_parsed == 0 {
        info!("could not parse any descriptor");
        return StoreStatus::BadDescriptor;
    }
    debug!(number_parsed, number_stored, "finished directory store batch");
    StoreStatus::Ok
}

/// Runs `store_as_client`. On success, the caller re-fetches the live entry
/// via `ClientIndex::get` using the service id derived internally — see
/// `RendCache::store_as_client`'s doc comment for why this crosses the
/// boundary as a re-fetch rather than a returned borrow.
pub fn store_as_client(
    blob: &[u8],
    expected_desc_id_base32: &str,
    query: &ClientQuery,
    config: &RendCacheConfig,
    client: &mut ClientIndex,
    accountant: &mut Accountant,
    parser: &dyn DescriptorParser,
    crypto: &dyn CryptoProvider,
    clock: &dyn Clock,
) -> (StoreStatus, Option<String>) {
    let expected_desc_id = match directory_index::decode_desc_id(expected_desc_id_base32) {
        Some(id) => id,
        None => {
            warn!(desc_id = %expected_desc_id_base32, "could not decode base32 descriptor id");
            return (StoreStatus::BadDescriptor, None);
        }
    };

    let output = match parser.parse(blob, false) {
        Ok(output) => output,
        Err(_) => {
            warn!("could not parse descriptor");
            return (StoreStatus::BadDescriptor, None);
        }
    };
    let mut parsed = output.parsed;

    let service_id = match crypto.derive_service_id(&parsed.public_key) {
        Ok(id) => id,
        Err(_) => {
            warn!("could not compute service id");
            return (StoreStatus::BadDescriptor, None);
        }
    };

    if !query.onion_address.is_empty() && query.onion_address != service_id {
        warn!(
            received = %service_id,
            expected = %query.onion_address,
            "received service descriptor for unexpected service id"
        );
        return (StoreStatus::BadDescriptor, None);
    }

    if output.desc_id != expected_desc_id {
        warn!(service_id = %service_id, "received service descriptor with incorrect descriptor id");
        return (StoreStatus::BadDescriptor, None);
    }

    if !output.intro_encrypted.is_empty() {
        let mut intro_blob = output.intro_encrypted;
        if !matches!(query.auth_type, crate::descriptor::AuthType::NoAuth) && !query.cookie_is_zero() {
            match crypto.decrypt_intro_points(&query.descriptor_cookie, &intro_blob) {
                Ok(decrypted) => {
                    info!("successfully decrypted introduction points");
                    intro_blob = decrypted;
                }
                Err(_) => {
                    warn!("failed to decrypt introduction points; parsing will likely fail");
                }
            }
        }

        let n_intro_points = parser.parse_intro_points(&mut parsed, &intro_blob);
        if n_intro_points <= 0 {
            warn!(service_id = %service_id, "failed to parse introduction points");
            return (StoreStatus::BadDescriptor, None);
        }
        if (n_intro_points as usize) > config.max_intro_points {
            warn!(
                service_id = %service_id,
                n_intro_points,
                "too many introduction points, possible guard enumeration attack"
            );
            return (StoreStatus::BadDescriptor, None);
        }
    } else {
        info!(service_id = %service_id, "descriptor does not contain any introduction points");
        parsed.intro_nodes = Vec::new();
    }

    if parsed.timestamp < config.min_timestamp(clock.now()) {
        warn!(service_id = %service_id, "descriptor is too old");
        return (StoreStatus::BadDescriptor, None);
    }
    if parsed.timestamp > config.max_timestamp(clock.now()) {
        warn!(service_id = %service_id, "descriptor is too far in the future");
        return (StoreStatus::BadDescriptor, None);
    }

    let already_fresh = client
        .get(&service_id)
        .map(|existing| existing.parsed().timestamp >= parsed.timestamp)
        .unwrap_or(false);
    if already_fresh {
        info!(service_id = %service_id, "already have a new enough descriptor for this service id");
        return (StoreStatus::Ok, Some(service_id));
    }

    let encoded = blob[..output.encoded_size].to_vec();
    match client.get_mut(&service_id) {
        Some(existing) => replace_in_place(accountant, existing, encoded, parsed),
        None => {
            let fresh = CacheEntry::new(encoded, parsed, 0);
            accountant.add(fresh.charge());
            client.insert(&service_id, fresh);
        }
    }

    debug!(service_id = %service_id, len = output.encoded_size, "successfully stored rendezvous descriptor");
    (StoreStatus::Ok, Some(service_id))
}
