use spindle_types::NdArray;

use crate::error::{StoreError, StoreResult};
use crate::object::{
    Collection, DataArray, Group, ObjectHeader, ObjectId, ObjectKind, SectionId, Source,
    StoredObject, Tag,
};
use crate::section::Section;

/// Tagged container store.
///
/// All implementations must satisfy these invariants:
/// - Names are unique within a namespace: the root list, one collection of a
///   group or source, or the children of one section.
/// - Every object except a root has exactly one owner. Non-root groups hold
///   references to objects owned elsewhere.
/// - Deleting an object that a surviving object still links to fails with
///   [`StoreError::StillReferenced`]; the store never leaves dangling links.
/// - A metadata section is dropped when the last object using it is deleted.
pub trait ContainerStore {
    /// Root groups in creation order.
    fn roots(&self) -> &[ObjectId];

    /// Look up any object by id.
    fn object(&self, id: ObjectId) -> StoreResult<&StoredObject>;

    fn object_mut(&mut self, id: ObjectId) -> StoreResult<&mut StoredObject>;

    /// Insert a freshly built object under `parent` (or as a root when
    /// `None`) and return its id.
    ///
    /// Roots must be groups. Sources may live under a group or a source, all
    /// other kinds under a group. A tag's positions array must already exist.
    fn insert(&mut self, parent: Option<ObjectId>, object: StoredObject) -> StoreResult<ObjectId>;

    /// Add `target` to a group's collection without transferring ownership.
    /// Appending an id that is already present is a no-op.
    fn append_reference(
        &mut self,
        group: ObjectId,
        collection: Collection,
        target: ObjectId,
    ) -> StoreResult<()>;

    /// Remove `target` from a group's collection without deleting it.
    /// Returns `true` if it was present.
    fn remove_reference(
        &mut self,
        group: ObjectId,
        collection: Collection,
        target: ObjectId,
    ) -> StoreResult<bool>;

    /// Delete an object together with everything it owns.
    fn delete(&mut self, id: ObjectId) -> StoreResult<()>;

    /// Top-level metadata sections in creation order.
    fn root_sections(&self) -> &[SectionId];

    fn section(&self, id: SectionId) -> StoreResult<&Section>;

    fn section_mut(&mut self, id: SectionId) -> StoreResult<&mut Section>;

    /// Create a metadata section under `parent`, or at the top level.
    fn create_section(
        &mut self,
        parent: Option<SectionId>,
        name: &str,
        type_name: &str,
    ) -> StoreResult<SectionId>;

    /// Delete a section subtree, detaching it from any object using it.
    fn delete_section(&mut self, id: SectionId) -> StoreResult<()>;

    /// Re-parent a section subtree under `parent`, or to the top level, and
    /// rename it. Objects using sections in the subtree keep them.
    fn move_section(
        &mut self,
        id: SectionId,
        parent: Option<SectionId>,
        name: &str,
    ) -> StoreResult<()>;

    /// Persist pending changes. In-memory backends have nothing to do.
    fn flush(&mut self) -> StoreResult<()> {
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Provided: typed access
    // -----------------------------------------------------------------------

    fn header(&self, id: ObjectId) -> StoreResult<&ObjectHeader> {
        Ok(self.object(id)?.header())
    }

    fn set_metadata(&mut self, id: ObjectId, section: Option<SectionId>) -> StoreResult<()> {
        if let Some(section) = section {
            self.section(section)?;
        }
        self.object_mut(id)?.header_mut().metadata = section;
        Ok(())
    }

    fn group(&self, id: ObjectId) -> StoreResult<&Group> {
        match self.object(id)? {
            StoredObject::Group(g) => Ok(g),
            other => Err(wrong_kind(id, ObjectKind::Group, other)),
        }
    }

    fn group_mut(&mut self, id: ObjectId) -> StoreResult<&mut Group> {
        match self.object_mut(id)? {
            StoredObject::Group(g) => Ok(g),
            other => Err(wrong_kind(id, ObjectKind::Group, other)),
        }
    }

    fn source(&self, id: ObjectId) -> StoreResult<&Source> {
        match self.object(id)? {
            StoredObject::Source(s) => Ok(s),
            other => Err(wrong_kind(id, ObjectKind::Source, other)),
        }
    }

    fn array(&self, id: ObjectId) -> StoreResult<&DataArray> {
        match self.object(id)? {
            StoredObject::Array(a) => Ok(a),
            other => Err(wrong_kind(id, ObjectKind::Array, other)),
        }
    }

    fn array_mut(&mut self, id: ObjectId) -> StoreResult<&mut DataArray> {
        match self.object_mut(id)? {
            StoredObject::Array(a) => Ok(a),
            other => Err(wrong_kind(id, ObjectKind::Array, other)),
        }
    }

    fn tag(&self, id: ObjectId) -> StoreResult<&Tag> {
        match self.object(id)? {
            StoredObject::Tag(t) => Ok(t),
            other => Err(wrong_kind(id, ObjectKind::Tag, other)),
        }
    }

    fn tag_mut(&mut self, id: ObjectId) -> StoreResult<&mut Tag> {
        match self.object_mut(id)? {
            StoredObject::Tag(t) => Ok(t),
            other => Err(wrong_kind(id, ObjectKind::Tag, other)),
        }
    }

    // -----------------------------------------------------------------------
    // Provided: lookup
    // -----------------------------------------------------------------------

    fn find_root(&self, name: &str) -> Option<ObjectId> {
        self.roots()
            .iter()
            .copied()
            .find(|id| self.object(*id).is_ok_and(|o| o.name() == name))
    }

    /// Ids in one collection of a group or source.
    fn children(&self, parent: ObjectId, collection: Collection) -> StoreResult<&[ObjectId]> {
        let object = self.object(parent)?;
        object
            .collection(collection)
            .ok_or_else(|| wrong_kind(parent, ObjectKind::Group, object))
    }

    fn find_child(
        &self,
        parent: ObjectId,
        collection: Collection,
        name: &str,
    ) -> StoreResult<Option<ObjectId>> {
        let children = self.children(parent, collection)?;
        Ok(children
            .iter()
            .copied()
            .find(|id| self.object(*id).is_ok_and(|o| o.name() == name)))
    }

    /// Child section of `parent` (or top-level section) with the given name.
    fn find_section(&self, parent: Option<SectionId>, name: &str) -> StoreResult<Option<SectionId>> {
        let candidates = match parent {
            Some(parent) => self.section(parent)?.sections.as_slice(),
            None => self.root_sections(),
        };
        Ok(candidates
            .iter()
            .copied()
            .find(|id| self.section(*id).is_ok_and(|s| s.name == name)))
    }

    // -----------------------------------------------------------------------
    // Provided: creation
    // -----------------------------------------------------------------------

    fn create_root(&mut self, name: &str, type_name: &str) -> StoreResult<ObjectId> {
        self.insert(None, StoredObject::Group(Group::new(name, type_name)))
    }

    fn create_group(&mut self, parent: ObjectId, name: &str, type_name: &str) -> StoreResult<ObjectId> {
        self.insert(Some(parent), StoredObject::Group(Group::new(name, type_name)))
    }

    fn create_source(&mut self, parent: ObjectId, name: &str, type_name: &str) -> StoreResult<ObjectId> {
        self.insert(Some(parent), StoredObject::Source(Source::new(name, type_name)))
    }

    fn create_array(
        &mut self,
        parent: ObjectId,
        name: &str,
        type_name: &str,
        data: NdArray,
    ) -> StoreResult<ObjectId> {
        self.insert(
            Some(parent),
            StoredObject::Array(DataArray::new(name, type_name, data)),
        )
    }

    fn create_tag(
        &mut self,
        parent: ObjectId,
        name: &str,
        type_name: &str,
        positions: ObjectId,
    ) -> StoreResult<ObjectId> {
        self.insert(
            Some(parent),
            StoredObject::Tag(Tag::new(name, type_name, positions)),
        )
    }
}

pub(crate) fn wrong_kind(id: ObjectId, expected: ObjectKind, actual: &StoredObject) -> StoreError {
    StoreError::WrongKind {
        id,
        expected,
        actual: actual.kind(),
    }
}
