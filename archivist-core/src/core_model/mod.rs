//! Repository object model
//!
//! Objects reference each other by id; both ends of a relationship are kept
//! in sync by the content managers, which are the only code that persists
//! changes to these records.

mod bitstream;
mod collection;
mod community;
mod item;
mod metadata;
mod principal;

pub use bitstream::{Bitstream, Bundle, ORIGINAL_BUNDLE};
pub use collection::{Collection, WorkflowStep};
pub use community::Community;
pub use item::Item;
pub use metadata::{Metadata, MetadataField, MetadataValue};
pub use principal::{EPerson, Group};

/// Behaviour shared by communities, collections and items
pub trait ContentObject {
    fn handle(&self) -> Option<&str>;

    fn metadata(&self) -> &Metadata;

    fn metadata_mut(&mut self) -> &mut Metadata;

    /// The `dc.title` value, or an empty string
    fn name(&self) -> &str {
        self.metadata()
            .first_value(&MetadataField::title())
            .unwrap_or("")
    }
}

pub(crate) fn push_unique<T: PartialEq>(list: &mut Vec<T>, value: T) -> bool {
    if list.contains(&value) {
        false
    } else {
        list.push(value);
        true
    }
}

pub(crate) fn remove_value<T: PartialEq>(list: &mut Vec<T>, value: &T) -> bool {
    let before = list.len();
    list.retain(|v| v != value);
    before != list.len()
}
