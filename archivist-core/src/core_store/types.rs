//! Identifier and value types shared by the store and the content managers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Kind of repository object a reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    Site,
    Community,
    Collection,
    Item,
    Bundle,
    Bitstream,
    Group,
    EPerson,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Site => "SITE",
            ResourceKind::Community => "COMMUNITY",
            ResourceKind::Collection => "COLLECTION",
            ResourceKind::Item => "ITEM",
            ResourceKind::Bundle => "BUNDLE",
            ResourceKind::Bitstream => "BITSTREAM",
            ResourceKind::Group => "GROUP",
            ResourceKind::EPerson => "EPERSON",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed pointer to any object policies and events can refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: Uuid,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

macro_rules! object_id {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier
            pub fn generate() -> Self {
                $name(Uuid::new_v4())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                $name(id)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for ResourceRef {
            fn from(id: $name) -> Self {
                ResourceRef::new(ResourceKind::$kind, id.0)
            }
        }

        impl From<&$name> for ResourceRef {
            fn from(id: &$name) -> Self {
                ResourceRef::new(ResourceKind::$kind, id.0)
            }
        }
    };
}

object_id!(
    /// The repository root; parent of every top-level community
    SiteId => Site
);
object_id!(CommunityId => Community);
object_id!(CollectionId => Collection);
object_id!(ItemId => Item);
object_id!(BundleId => Bundle);
object_id!(BitstreamId => Bitstream);
object_id!(GroupId => Group);
object_id!(
    /// A registered user account
    EPersonId => EPerson
);

/// Identifier of a single resource policy row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PolicyId(pub Uuid);

impl PolicyId {
    pub fn generate() -> Self {
        PolicyId(Uuid::new_v4())
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Either form an object can be looked up by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectRef {
    Uuid(Uuid),
    Legacy(i64),
}

impl ObjectRef {
    /// Parse a UUID string, falling back to an integer legacy id
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(uuid) = Uuid::parse_str(raw) {
            return Some(ObjectRef::Uuid(uuid));
        }
        raw.parse::<i64>().ok().map(ObjectRef::Legacy)
    }
}

/// Unix timestamp in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Create a timestamp representing the current time
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Timestamp(millis)
    }

    /// Create a timestamp from milliseconds since epoch
    pub fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    /// Get milliseconds since epoch
    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Offset/limit window for listing queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Page {
    /// Every row
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }

    /// Apply the window to an already ordered list
    pub fn apply<T>(&self, rows: Vec<T>) -> Vec<T> {
        let rows = rows.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(ItemId::generate(), ItemId::generate());
    }

    #[test]
    fn test_resource_ref_display() {
        let id = CommunityId::generate();
        let r: ResourceRef = id.into();
        assert_eq!(r.kind, ResourceKind::Community);
        assert_eq!(r.to_string(), format!("COMMUNITY:{}", id));
    }

    #[test]
    fn test_object_ref_parse() {
        let uuid = Uuid::new_v4();
        assert_eq!(ObjectRef::parse(&uuid.to_string()), Some(ObjectRef::Uuid(uuid)));
        assert_eq!(ObjectRef::parse(" 17 "), Some(ObjectRef::Legacy(17)));
        assert_eq!(ObjectRef::parse("not-an-id"), None);
    }

    #[test]
    fn test_page_window() {
        let rows: Vec<u32> = (0..10).collect();
        assert_eq!(Page::new(3, 2).apply(rows.clone()), vec![2, 3, 4]);
        assert_eq!(Page::all().apply(rows.clone()).len(), 10);
        assert!(Page::new(5, 20).apply(rows).is_empty());
    }
}
