//! Provenance notes recorded when an item's status changes

use crate::core_model::{Bitstream, Collection, ContentObject, EPerson};
use chrono::{DateTime, Utc};
use std::fmt::Write;

/// `verb` is the past tense recorded in the note, e.g. "withdrawn"
pub(crate) fn status_note(
    verb: &str,
    actor: &EPerson,
    at: DateTime<Utc>,
    collections: &[Collection],
    bitstreams: &[Bitstream],
) -> String {
    let mut note = format!(
        "Item {} by {} ({}) on {}\nItem was in collections:\n",
        verb,
        actor.full_name,
        actor.email,
        at.format("%Y-%m-%dT%H:%M:%SZ")
    );
    for collection in collections {
        let _ = writeln!(note, "{} (ID: {})", collection.name(), collection.id);
    }
    note.push_str(&bitstream_summary(bitstreams));
    note
}

fn bitstream_summary(bitstreams: &[Bitstream]) -> String {
    let mut summary = format!("No. of bitstreams: {}\n", bitstreams.len());
    for bitstream in bitstreams {
        let _ = writeln!(
            summary,
            "{}: {} bytes, checksum: {} ({})",
            bitstream.name, bitstream.size_bytes, bitstream.checksum, bitstream.checksum_algorithm
        );
    }
    summary
}
