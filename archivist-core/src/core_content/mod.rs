//! Content Management
//!
//! Managers for the three container levels of the repository and the
//! request context they share.
//!
//! ## Architecture
//!
//! - **CommunityManager**: top of the tree; communities nest under a single parent
//! - **CollectionManager**: owned by communities; holds items and role groups
//! - **ItemManager**: archived content, its bundles and its policies
//! - **Context**: acting principal plus the events raised in one transaction
//!
//! Every mutating call takes `&mut Context`. Events queue on the context and
//! reach the event log only when the context commits.

mod bitstreams;
mod cascade;
pub mod collection;
pub mod community;
pub mod context;
pub mod item;
mod provenance;
pub mod repository;
pub mod services;

pub use collection::CollectionManager;
pub use community::CommunityManager;
pub use context::Context;
pub use item::ItemManager;
pub use repository::Repository;
pub use services::{
    GroupService, HarvestService, IdentifierService, Services, SubscriptionService,
    VersioningService, WorkflowService, WorkspaceItemService,
};

use crate::core_model::{Metadata, MetadataField};
use crate::error::{Error, Result};

fn parse_field(field: &str) -> Result<MetadataField> {
    MetadataField::parse(field)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown metadata field: {}", field)))
}

/// Set or clear a container field; a blank title becomes `untitled`
pub(crate) fn apply_metadata(
    metadata: &mut Metadata,
    field: &str,
    value: Option<&str>,
    untitled: &str,
) -> Result<()> {
    let field = parse_field(field)?;
    let value = value.filter(|v| !v.trim().is_empty());
    match value {
        Some(v) => metadata.set_single(&field, None, v),
        None if field == MetadataField::title() => metadata.set_single(&field, None, untitled),
        None => {
            metadata.clear(&field);
        }
    }
    Ok(())
}

pub(crate) fn read_metadata(metadata: &Metadata, field: &str) -> Result<Option<String>> {
    let field = parse_field(field)?;
    Ok(metadata.first_value(&field).map(str::to_string))
}

/// Turn a denial into `false`; every other error still propagates
pub(crate) fn authorization_result(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_denied() => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_name_becomes_placeholder() {
        let mut metadata = Metadata::new();
        apply_metadata(&mut metadata, "name", Some("  "), "Untitled").unwrap();
        assert_eq!(metadata.first_value(&MetadataField::title()), Some("Untitled"));

        apply_metadata(&mut metadata, "name", Some("Physics"), "Untitled").unwrap();
        assert_eq!(read_metadata(&metadata, "dc.title").unwrap().as_deref(), Some("Physics"));
    }

    #[test]
    fn test_clearing_other_fields() {
        let mut metadata = Metadata::new();
        apply_metadata(&mut metadata, "short_description", Some("about"), "Untitled").unwrap();
        apply_metadata(&mut metadata, "short_description", None, "Untitled").unwrap();
        assert_eq!(read_metadata(&metadata, "short_description").unwrap(), None);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let mut metadata = Metadata::new();
        let err = apply_metadata(&mut metadata, "nonsense", Some("x"), "Untitled").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_authorization_result() {
        assert!(authorization_result(Ok(())).unwrap());
        assert!(!authorization_result(Err(Error::denied("no"))).unwrap());
        assert!(authorization_result(Err(Error::InvalidState("x".into()))).is_err());
    }
}
