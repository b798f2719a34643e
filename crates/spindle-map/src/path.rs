//! Path addressing: `/<block>(/<label>/<name>)*`.
//!
//! Paths alternate a container label (`segments`, `channelgroups`, ...) and
//! an object name. They are built by the write rules and resolved by the read
//! rules, so the same logical entity keeps the same path across round trips.

use std::fmt;
use std::str::FromStr;

use spindle_store::{Collection, ContainerStore, ObjectId};
use spindle_types::EntityKind;

use crate::error::{MapError, MapResult};
use crate::schema;

/// Label of a child collection in a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContainerLabel {
    Segments,
    RegularSignals,
    IrregularSignals,
    Epochs,
    Events,
    SpikeSeries,
    ChannelGroups,
    Units,
}

impl ContainerLabel {
    pub const ALL: [ContainerLabel; 8] = [
        Self::Segments,
        Self::RegularSignals,
        Self::IrregularSignals,
        Self::Epochs,
        Self::Events,
        Self::SpikeSeries,
        Self::ChannelGroups,
        Self::Units,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Segments => "segments",
            Self::RegularSignals => "regularsignals",
            Self::IrregularSignals => "irregularsignals",
            Self::Epochs => "epochs",
            Self::Events => "events",
            Self::SpikeSeries => "spikeseries",
            Self::ChannelGroups => "channelgroups",
            Self::Units => "units",
        }
    }

    /// Entity kind addressed through this label.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Segments => EntityKind::Segment,
            Self::RegularSignals => EntityKind::RegularSignal,
            Self::IrregularSignals => EntityKind::IrregularSignal,
            Self::Epochs => EntityKind::Epoch,
            Self::Events => EntityKind::Event,
            Self::SpikeSeries => EntityKind::SpikeSeries,
            Self::ChannelGroups => EntityKind::ChannelGroup,
            Self::Units => EntityKind::Unit,
        }
    }

    /// Label for an entity kind; blocks are roots and have none.
    pub fn for_kind(kind: EntityKind) -> Option<Self> {
        Self::ALL.into_iter().find(|label| label.kind() == kind)
    }

    /// Kind of the entity that owns this collection.
    pub fn parent_kind(&self) -> EntityKind {
        match self {
            Self::Segments | Self::ChannelGroups => EntityKind::Block,
            Self::Units => EntityKind::ChannelGroup,
            _ => EntityKind::Segment,
        }
    }

    /// Store collection searched under the parent object.
    pub fn collection(&self) -> Collection {
        match self {
            Self::Segments => Collection::Groups,
            Self::RegularSignals | Self::IrregularSignals => Collection::Arrays,
            Self::Epochs | Self::Events | Self::SpikeSeries => Collection::Tags,
            Self::ChannelGroups | Self::Units => Collection::Sources,
        }
    }
}

impl fmt::Display for ContainerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| format!("unknown container label {s:?}"))
    }
}

/// A parsed object path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectPath {
    root: String,
    steps: Vec<(ContainerLabel, String)>,
}

impl ObjectPath {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            root: name.into(),
            steps: Vec::new(),
        }
    }

    /// Extend by one `label/name` step.
    pub fn child(&self, label: ContainerLabel, name: impl Into<String>) -> Self {
        let mut steps = self.steps.clone();
        steps.push((label, name.into()));
        Self {
            root: self.root.clone(),
            steps,
        }
    }

    /// The enclosing path, or `None` for a block path.
    pub fn parent(&self) -> Option<Self> {
        if self.steps.is_empty() {
            return None;
        }
        Some(Self {
            root: self.root.clone(),
            steps: self.steps[..self.steps.len() - 1].to_vec(),
        })
    }

    /// Name of the addressed object.
    pub fn name(&self) -> &str {
        self.steps.last().map_or(&self.root, |(_, name)| name)
    }

    pub fn label(&self) -> Option<ContainerLabel> {
        self.steps.last().map(|(label, _)| *label)
    }

    pub fn kind(&self) -> EntityKind {
        self.label().map_or(EntityKind::Block, |l| l.kind())
    }

    /// Parse and check that every label is legal under its parent.
    pub fn parse(path: &str) -> MapResult<Self> {
        let invalid = |reason: String| MapError::InvalidPath {
            path: path.to_string(),
            reason,
        };
        let rest = path
            .strip_prefix('/')
            .ok_or_else(|| invalid("must start with '/'".into()))?;
        let parts: Vec<&str> = rest.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid("empty path segment".into()));
        }
        if parts.len() % 2 == 0 {
            return Err(invalid("expected alternating label/name segments".into()));
        }

        let mut out = Self::root(parts[0]);
        let mut parent_kind = EntityKind::Block;
        for pair in parts[1..].chunks(2) {
            let label: ContainerLabel = pair[0].parse().map_err(invalid)?;
            if label.parent_kind() != parent_kind {
                return Err(invalid(format!(
                    "{label} cannot appear under a {parent_kind}"
                )));
            }
            parent_kind = label.kind();
            out.steps.push((label, pair[1].to_string()));
        }
        Ok(out)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.root)?;
        for (label, name) in &self.steps {
            write!(f, "/{label}/{name}")?;
        }
        Ok(())
    }
}

impl FromStr for ObjectPath {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Join a child step onto a parent path string. The write rules register
/// every object under the path built here.
pub fn build_path(parent: &str, label: ContainerLabel, child: &str) -> String {
    format!("{parent}/{label}/{child}")
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// What a path resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolved {
    Object(ObjectId),
    /// The sibling arrays of one multi-channel signal, in channel order.
    SignalGroup(Vec<ObjectId>),
}

impl Resolved {
    pub fn ids(&self) -> &[ObjectId] {
        match self {
            Self::Object(id) => std::slice::from_ref(id),
            Self::SignalGroup(ids) => ids,
        }
    }
}

/// Resolve a path against the store, parent first.
pub fn resolve<S: ContainerStore>(store: &S, path: &ObjectPath) -> MapResult<Resolved> {
    let not_found = || MapError::NotFound {
        path: path.to_string(),
    };
    let Some(parent_path) = path.parent() else {
        return store
            .find_root(&path.root)
            .filter(|id| has_type(store, *id, schema::type_name(EntityKind::Block)))
            .map(Resolved::Object)
            .ok_or_else(not_found);
    };
    let parent = match resolve(store, &parent_path)? {
        Resolved::Object(id) => id,
        Resolved::SignalGroup(_) => return Err(not_found()),
    };
    let Some(label) = path.label() else {
        return Err(not_found());
    };
    let type_name = schema::type_name(label.kind());

    if label.kind().is_multi_array() {
        let arrays = signal_arrays(store, parent, path.name(), type_name)?;
        if arrays.is_empty() {
            return Err(not_found());
        }
        return Ok(Resolved::SignalGroup(arrays));
    }

    let child = store.find_child(parent, label.collection(), path.name())?;
    child
        .filter(|id| has_type(store, *id, type_name))
        .map(Resolved::Object)
        .ok_or_else(not_found)
}

/// Collect `base.0`, `base.1`, ... from a group's array references, stopping
/// at the first missing index.
pub fn signal_arrays<S: ContainerStore>(
    store: &S,
    group: ObjectId,
    base: &str,
    type_name: &str,
) -> MapResult<Vec<ObjectId>> {
    let mut out = Vec::new();
    loop {
        let name = format!("{base}.{}", out.len());
        match store.find_child(group, Collection::Arrays, &name)? {
            Some(id) if has_type(store, id, type_name) => out.push(id),
            _ => return Ok(out),
        }
    }
}

/// Split `base.N` into `(base, N)`.
pub fn split_channel_suffix(name: &str) -> Option<(&str, usize)> {
    let (base, index) = name.rsplit_once('.')?;
    Some((base, index.parse().ok()?))
}

pub(crate) fn has_type<S: ContainerStore>(store: &S, id: ObjectId, type_name: &str) -> bool {
    store
        .header(id)
        .is_ok_and(|header| header.type_name == type_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use spindle_store::MemoryStore;
    use spindle_types::NdArray;

    #[test]
    fn parse_and_display() {
        let path = ObjectPath::parse("/B1/segments/S1/epochs/ep").unwrap();
        assert_eq!(path.name(), "ep");
        assert_eq!(path.kind(), EntityKind::Epoch);
        assert_eq!(path.to_string(), "/B1/segments/S1/epochs/ep");
        assert_eq!(path.parent().unwrap().to_string(), "/B1/segments/S1");
    }

    #[test]
    fn parse_rejects_bad_shapes() {
        for bad in ["B1", "/", "/B1/segments", "/B1//S1", "/B1/rooms/x"] {
            assert!(
                matches!(ObjectPath::parse(bad), Err(MapError::InvalidPath { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn parse_rejects_illegal_nesting() {
        assert!(ObjectPath::parse("/B1/units/u").is_err());
        assert!(ObjectPath::parse("/B1/segments/s/units/u").is_err());
        assert!(ObjectPath::parse("/B1/channelgroups/g/units/u").is_ok());
    }

    #[test]
    fn build_path_matches_child_display() {
        let joined = build_path("/B1", ContainerLabel::ChannelGroups, "g");
        assert_eq!(joined, "/B1/channelgroups/g");
        let parsed = ObjectPath::parse(&joined).unwrap();
        assert_eq!(
            parsed,
            ObjectPath::root("B1").child(ContainerLabel::ChannelGroups, "g")
        );
    }

    #[test]
    fn channel_suffix() {
        assert_eq!(split_channel_suffix("sig.12"), Some(("sig", 12)));
        assert_eq!(split_channel_suffix("a.b.3"), Some(("a.b", 3)));
        assert_eq!(split_channel_suffix("sig.times"), None);
        assert_eq!(split_channel_suffix("sig"), None);
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    fn fixture() -> (MemoryStore, ObjectId, Vec<ObjectId>) {
        let mut store = MemoryStore::new();
        let root = store.create_root("B1", "spindle.block").unwrap();
        let group = store.create_group(root, "S1", "spindle.segment").unwrap();
        let mut arrays = Vec::new();
        for i in 0..3 {
            let id = store
                .create_array(
                    root,
                    &format!("V.{i}"),
                    "spindle.regularsignal",
                    NdArray::vector(vec![]),
                )
                .unwrap();
            store.append_reference(group, Collection::Arrays, id).unwrap();
            arrays.push(id);
        }
        (store, group, arrays)
    }

    #[test]
    fn resolves_segment_and_signal_group() {
        let (store, group, arrays) = fixture();
        let seg = ObjectPath::parse("/B1/segments/S1").unwrap();
        assert_eq!(resolve(&store, &seg).unwrap(), Resolved::Object(group));

        let sig = seg.child(ContainerLabel::RegularSignals, "V");
        assert_eq!(resolve(&store, &sig).unwrap(), Resolved::SignalGroup(arrays));
    }

    #[test]
    fn wrong_type_is_not_found() {
        let (store, _, _) = fixture();
        let path = ObjectPath::parse("/B1/segments/S1/irregularsignals/V").unwrap();
        assert!(matches!(
            resolve(&store, &path),
            Err(MapError::NotFound { .. })
        ));
    }

    #[test]
    fn missing_parent_is_not_found() {
        let (store, _, _) = fixture();
        let path = ObjectPath::parse("/B1/segments/S9/epochs/e").unwrap();
        match resolve(&store, &path) {
            Err(MapError::NotFound { path }) => assert_eq!(path, "/B1/segments/S9/epochs/e"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn display_then_parse_is_identity(
            root in "[A-Za-z0-9_.-]{1,12}",
            seg in "[A-Za-z0-9_.-]{1,12}",
            leaf in "[A-Za-z0-9_.-]{1,12}",
            label in prop::sample::select(vec![
                ContainerLabel::RegularSignals,
                ContainerLabel::IrregularSignals,
                ContainerLabel::Epochs,
                ContainerLabel::Events,
                ContainerLabel::SpikeSeries,
            ]),
        ) {
            let path = ObjectPath::root(root)
                .child(ContainerLabel::Segments, seg)
                .child(label, leaf);
            let parsed = ObjectPath::parse(&path.to_string()).unwrap();
            prop_assert_eq!(parsed, path);
        }
    }
}
