//! Bitstream and bundle storage shared by logos and item content

use super::services::Services;
use crate::core_model::{Bitstream, ORIGINAL_BUNDLE};
use crate::core_store::{require, BitstreamId, BundleId};
use crate::error::Result;
use tracing::debug;

pub(crate) fn store_bitstream(services: &Services, name: &str, data: &[u8]) -> Result<Bitstream> {
    let bitstream = services
        .store
        .bitstreams()
        .create(Bitstream::from_bytes(name, data))?;
    debug!(bitstream_id = %bitstream.id, size = bitstream.size_bytes, "Stored bitstream");
    Ok(bitstream)
}

pub(crate) fn delete_bitstream(services: &Services, id: &BitstreamId) -> Result<()> {
    services.authz.remove_all_policies(id.into())?;
    services.store.bitstreams().delete(id)?;
    debug!(bitstream_id = %id, "Deleted bitstream");
    Ok(())
}

/// Delete a bundle, dropping bitstreams no other bundle still holds
pub(crate) fn delete_bundle(services: &Services, id: &BundleId) -> Result<()> {
    let bundle = require(services.store.bundles(), id)?;
    for bitstream_id in &bundle.bitstreams {
        let mut bitstream = require(services.store.bitstreams(), bitstream_id)?;
        bitstream.bundles.retain(|b| b != id);
        if bitstream.bundles.is_empty() {
            delete_bitstream(services, bitstream_id)?;
        } else {
            services.store.bitstreams().save(&bitstream)?;
        }
    }
    services.authz.remove_all_policies(id.into())?;
    services.store.bundles().delete(id)?;
    debug!(bundle_id = %id, name = %bundle.name, "Deleted bundle");
    Ok(())
}

pub(crate) fn is_original(name: &str) -> bool {
    name == ORIGINAL_BUNDLE
}
