//! Bundles and the bitstreams they group

use super::{push_unique, remove_value, Metadata};
use crate::core_store::{BitstreamId, BundleId, Entity, ItemId, ResourceKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Bundle holding an item's uploaded content files
pub const ORIGINAL_BUNDLE: &str = "ORIGINAL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub id: BundleId,
    pub legacy_id: i64,
    pub name: String,
    pub metadata: Metadata,
    pub items: Vec<ItemId>,
    pub bitstreams: Vec<BitstreamId>,
    pub primary_bitstream: Option<BitstreamId>,
}

impl Bundle {
    pub fn new(name: &str) -> Self {
        Self {
            id: BundleId::generate(),
            legacy_id: 0,
            name: name.to_string(),
            metadata: Metadata::new(),
            items: Vec::new(),
            bitstreams: Vec::new(),
            primary_bitstream: None,
        }
    }

    pub fn add_item(&mut self, item: ItemId) -> bool {
        push_unique(&mut self.items, item)
    }

    pub fn remove_item(&mut self, item: &ItemId) -> bool {
        remove_value(&mut self.items, item)
    }

    pub fn add_bitstream(&mut self, bitstream: BitstreamId) -> bool {
        push_unique(&mut self.bitstreams, bitstream)
    }

    pub fn remove_bitstream(&mut self, bitstream: &BitstreamId) -> bool {
        if self.primary_bitstream.as_ref() == Some(bitstream) {
            self.primary_bitstream = None;
        }
        remove_value(&mut self.bitstreams, bitstream)
    }
}

impl Entity for Bundle {
    type Id = BundleId;

    const KIND: ResourceKind = ResourceKind::Bundle;

    fn id(&self) -> BundleId {
        self.id
    }

    fn legacy_id(&self) -> i64 {
        self.legacy_id
    }

    fn set_legacy_id(&mut self, legacy_id: i64) {
        self.legacy_id = legacy_id;
    }

    fn sort_key(&self) -> String {
        self.name.clone()
    }
}

/// A stored file; the content itself lives in the asset store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitstream {
    pub id: BitstreamId,
    pub legacy_id: i64,
    pub name: String,
    pub size_bytes: u64,
    pub checksum: String,
    pub checksum_algorithm: String,
    /// Internal bitstreams (licenses, extracted text) are hidden from listings
    pub internal: bool,
    /// Per-item position, assigned on item update
    pub sequence_id: Option<u32>,
    pub bundles: Vec<BundleId>,
}

impl Bitstream {
    /// Describe a file from its bytes
    pub fn from_bytes(name: &str, data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Self {
            id: BitstreamId::generate(),
            legacy_id: 0,
            name: name.to_string(),
            size_bytes: data.len() as u64,
            checksum: hex::encode(digest),
            checksum_algorithm: "SHA-256".to_string(),
            internal: false,
            sequence_id: None,
            bundles: Vec::new(),
        }
    }
}

impl Entity for Bitstream {
    type Id = BitstreamId;

    const KIND: ResourceKind = ResourceKind::Bitstream;

    fn id(&self) -> BitstreamId {
        self.id
    }

    fn legacy_id(&self) -> i64 {
        self.legacy_id
    }

    fn set_legacy_id(&mut self, legacy_id: i64) {
        self.legacy_id = legacy_id;
    }

    fn sort_key(&self) -> String {
        self.name.clone()
    }
}
