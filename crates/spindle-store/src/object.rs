use std::fmt;

use serde::{Deserialize, Serialize};
use spindle_types::NdArray;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Persistent identifier of a container object (UUID v7).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Allocate a new time-ordered id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persistent identifier of a metadata section (UUID v7).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectionId(Uuid);

impl SectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SectionId({})", self.0)
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Kinds and collections
// ---------------------------------------------------------------------------

/// The four container object kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Group,
    Source,
    Array,
    Tag,
}

impl ObjectKind {
    /// The collection an object of this kind lives in under its parent.
    pub fn collection(&self) -> Collection {
        match self {
            Self::Group => Collection::Groups,
            Self::Source => Collection::Sources,
            Self::Array => Collection::Arrays,
            Self::Tag => Collection::Tags,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Group => "group",
            Self::Source => "source",
            Self::Array => "array",
            Self::Tag => "tag",
        };
        f.write_str(s)
    }
}

/// A named child collection of a group or source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    Groups,
    Arrays,
    Tags,
    Sources,
}

impl Collection {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Groups => ObjectKind::Group,
            Self::Arrays => ObjectKind::Array,
            Self::Tags => ObjectKind::Tag,
            Self::Sources => ObjectKind::Source,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Groups => "groups",
            Self::Arrays => "arrays",
            Self::Tags => "tags",
            Self::Sources => "sources",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Fields common to every container object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectHeader {
    pub id: ObjectId,
    pub name: String,
    pub type_name: String,
    pub definition: Option<String>,
    /// Creation time in epoch seconds.
    pub created_at: i64,
    /// The object that owns this one, `None` for roots. Set by the store.
    pub owner: Option<ObjectId>,
    pub metadata: Option<SectionId>,
}

impl ObjectHeader {
    pub fn new(name: &str, type_name: &str) -> Self {
        Self {
            id: ObjectId::new(),
            name: name.to_string(),
            type_name: type_name.to_string(),
            definition: None,
            created_at: chrono::Utc::now().timestamp(),
            owner: None,
            metadata: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// Ordered container of child objects.
///
/// A root group owns everything in its collections. A nested group only holds
/// references to objects owned by its root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub header: ObjectHeader,
    pub groups: Vec<ObjectId>,
    pub arrays: Vec<ObjectId>,
    pub tags: Vec<ObjectId>,
    pub sources: Vec<ObjectId>,
}

impl Group {
    pub fn new(name: &str, type_name: &str) -> Self {
        Self {
            header: ObjectHeader::new(name, type_name),
            groups: Vec::new(),
            arrays: Vec::new(),
            tags: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn collection(&self, collection: Collection) -> &[ObjectId] {
        match collection {
            Collection::Groups => &self.groups,
            Collection::Arrays => &self.arrays,
            Collection::Tags => &self.tags,
            Collection::Sources => &self.sources,
        }
    }

    pub fn collection_mut(&mut self, collection: Collection) -> &mut Vec<ObjectId> {
        match collection {
            Collection::Groups => &mut self.groups,
            Collection::Arrays => &mut self.arrays,
            Collection::Tags => &mut self.tags,
            Collection::Sources => &mut self.sources,
        }
    }
}

/// Tree node used for reference-only groupings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub header: ObjectHeader,
    /// Owned child sources.
    pub sources: Vec<ObjectId>,
}

impl Source {
    pub fn new(name: &str, type_name: &str) -> Self {
        Self {
            header: ObjectHeader::new(name, type_name),
            sources: Vec::new(),
        }
    }
}

/// Descriptor of one axis of a data array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Dimension {
    /// Regularly spaced axis.
    Sampled {
        interval: f64,
        offset: f64,
        unit: Option<String>,
        label: Option<String>,
    },
    /// Axis with explicit tick positions.
    Range {
        ticks: Vec<f64>,
        unit: Option<String>,
        label: Option<String>,
    },
    /// Categorical axis, optionally labelled.
    Set { labels: Vec<String> },
}

impl Dimension {
    pub fn set() -> Self {
        Self::Set { labels: Vec::new() }
    }

    pub fn unit(&self) -> Option<&str> {
        match self {
            Self::Sampled { unit, .. } | Self::Range { unit, .. } => unit.as_deref(),
            Self::Set { .. } => None,
        }
    }
}

/// Typed numeric payload plus axis descriptors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataArray {
    pub header: ObjectHeader,
    pub unit: Option<String>,
    pub data: NdArray,
    pub dimensions: Vec<Dimension>,
    pub sources: Vec<ObjectId>,
}

impl DataArray {
    pub fn new(name: &str, type_name: &str, data: NdArray) -> Self {
        Self {
            header: ObjectHeader::new(name, type_name),
            unit: None,
            data,
            dimensions: Vec::new(),
            sources: Vec::new(),
        }
    }
}

/// How a feature array relates to a tag's positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkType {
    Tagged,
    Untagged,
    /// One feature entry per position.
    Indexed,
}

/// An array attached to a tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub data: ObjectId,
    pub link: LinkType,
}

/// A set of points or regions in the index space of other arrays.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub header: ObjectHeader,
    pub positions: ObjectId,
    pub extents: Option<ObjectId>,
    pub references: Vec<ObjectId>,
    pub sources: Vec<ObjectId>,
    pub features: Vec<Feature>,
}

impl Tag {
    pub fn new(name: &str, type_name: &str, positions: ObjectId) -> Self {
        Self {
            header: ObjectHeader::new(name, type_name),
            positions,
            extents: None,
            references: Vec::new(),
            sources: Vec::new(),
            features: Vec::new(),
        }
    }
}

/// Any container object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StoredObject {
    Group(Group),
    Source(Source),
    Array(DataArray),
    Tag(Tag),
}

impl StoredObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Group(_) => ObjectKind::Group,
            Self::Source(_) => ObjectKind::Source,
            Self::Array(_) => ObjectKind::Array,
            Self::Tag(_) => ObjectKind::Tag,
        }
    }

    pub fn header(&self) -> &ObjectHeader {
        match self {
            Self::Group(g) => &g.header,
            Self::Source(s) => &s.header,
            Self::Array(a) => &a.header,
            Self::Tag(t) => &t.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut ObjectHeader {
        match self {
            Self::Group(g) => &mut g.header,
            Self::Source(s) => &mut s.header,
            Self::Array(a) => &mut a.header,
            Self::Tag(t) => &mut t.header,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.header().id
    }

    pub fn name(&self) -> &str {
        &self.header().name
    }

    /// Child collection of a group or source; `None` when this kind has no
    /// such collection.
    pub fn collection(&self, collection: Collection) -> Option<&[ObjectId]> {
        match (self, collection) {
            (Self::Group(g), c) => Some(g.collection(c)),
            (Self::Source(s), Collection::Sources) => Some(&s.sources),
            _ => None,
        }
    }

    pub fn collection_mut(&mut self, collection: Collection) -> Option<&mut Vec<ObjectId>> {
        match (self, collection) {
            (Self::Group(g), c) => Some(g.collection_mut(c)),
            (Self::Source(s), Collection::Sources) => Some(&mut s.sources),
            _ => None,
        }
    }

    /// Every object id this object mentions, owned or not.
    pub fn links(&self) -> Vec<ObjectId> {
        match self {
            Self::Group(g) => g
                .groups
                .iter()
                .chain(&g.arrays)
                .chain(&g.tags)
                .chain(&g.sources)
                .copied()
                .collect(),
            Self::Source(s) => s.sources.clone(),
            Self::Array(a) => a.sources.clone(),
            Self::Tag(t) => std::iter::once(t.positions)
                .chain(t.extents)
                .chain(t.references.iter().copied())
                .chain(t.sources.iter().copied())
                .chain(t.features.iter().map(|f| f.data))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ids_are_time_ordered() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_uuid().get_version_num(), 7);
    }

    #[test]
    fn kind_collection_mapping_is_inverse() {
        for kind in [
            ObjectKind::Group,
            ObjectKind::Source,
            ObjectKind::Array,
            ObjectKind::Tag,
        ] {
            assert_eq!(kind.collection().kind(), kind);
        }
    }

    #[test]
    fn source_only_exposes_sources_collection() {
        let obj = StoredObject::Source(Source::new("s", "t"));
        assert!(obj.collection(Collection::Sources).is_some());
        assert!(obj.collection(Collection::Arrays).is_none());
    }

    #[test]
    fn tag_links_include_positions_and_features() {
        let positions = ObjectId::new();
        let feature = ObjectId::new();
        let mut tag = Tag::new("t", "x", positions);
        tag.features.push(Feature {
            data: feature,
            link: LinkType::Indexed,
        });
        let links = StoredObject::Tag(tag).links();
        assert_eq!(links, vec![positions, feature]);
    }
}
