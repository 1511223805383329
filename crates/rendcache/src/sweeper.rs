//! Periodic eviction, grounded on `rend_cache_clean` and
//! `rend_cache_clean_v2_descs_as_dir` in `rendcache.c`.

use tracing::info;

use crate::accountant::Accountant;
use crate::client_index::ClientIndex;
use crate::config::{RendCacheConfig, SERVED_CUTOFF_STEP};
use crate::directory_index::{self, DirectoryIndex};
use crate::parser::HashRing;

/// Age-only sweep over the client index, matching historical `rend_cache_clean`
/// (which — despite the written specification's broader wording — only ever
/// touches the string-keyed client map, never the directory map).
pub fn clean(now: i64, config: &RendCacheConfig, client: &mut ClientIndex, accountant: &mut Accountant) {
    let cutoff = config.min_timestamp(now);
    let removed = client.retain_and_collect_removed(|entry| entry.parsed().timestamp >= cutoff);
    for entry in removed {
        accountant.sub(entry.charge());
    }
}

/// Escalating, quota-driven sweep over the directory index. Evicts entries
/// that are too old, haven't been served recently enough, or are no longer
/// this node's responsibility, advancing `served_cutoff` by
/// [`SERVED_CUTOFF_STEP`] each pass until `bytes_removed >= force_remove_bytes`
/// or `served_cutoff > now`.
pub fn clean_directory(
    now: i64,
    force_remove_bytes: u64,
    config: &RendCacheConfig,
    directory: &mut DirectoryIndex,
    accountant: &mut Accountant,
    ring: &dyn HashRing,
) {
    let cutoff = config.min_timestamp(now);
    let mut served_cutoff = cutoff;
    let mut bytes_removed: u64 = 0;

    loop {
        let removed = directory.retain_and_collect_removed(|desc_id, entry| {
            entry.parsed().timestamp < cutoff
                || entry.last_served() < served_cutoff
                || !ring.is_responsible_for(desc_id)
        });

        for (desc_id, entry) in removed {
            let charge = entry.charge();
            bytes_removed += charge;
            accountant.sub(charge);
            info!(
                desc_id = %directory_index::encode_desc_id(&desc_id),
                "removing descriptor from cache"
            );
        }

        served_cutoff += SERVED_CUTOFF_STEP;
        if served_cutoff > now {
            break;
        }
        if bytes_removed >= force_remove_bytes {
            break;
        }
    }
}
