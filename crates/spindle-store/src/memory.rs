use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::{Collection, ObjectId, ObjectKind, SectionId, StoredObject};
use crate::section::Section;
use crate::traits::{wrong_kind, ContainerStore};

/// In-memory arena of container objects and metadata sections.
///
/// Used directly for tests and embedding, and as the working document behind
/// [`FileStore`](crate::FileStore).
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    roots: Vec<ObjectId>,
    objects: HashMap<ObjectId, StoredObject>,
    root_sections: Vec<SectionId>,
    sections: HashMap<SectionId, Section>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of metadata sections currently stored.
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Number of objects of one kind.
    pub fn count(&self, kind: ObjectKind) -> usize {
        self.objects.values().filter(|o| o.kind() == kind).count()
    }

    fn namespace_label(&self, parent: Option<ObjectId>, collection: Collection) -> String {
        match parent.and_then(|p| self.objects.get(&p)) {
            Some(obj) => format!("{}/{}", obj.name(), collection),
            None => "roots".to_string(),
        }
    }

    fn name_taken(&self, ids: &[ObjectId], name: &str) -> bool {
        ids.iter()
            .filter_map(|id| self.objects.get(id))
            .any(|o| o.name() == name)
    }

    /// `id` plus every object it owns, transitively.
    fn owned_closure(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut out = vec![id];
        let mut cursor = 0;
        while cursor < out.len() {
            let current = out[cursor];
            cursor += 1;
            if let Some(obj) = self.objects.get(&current) {
                for child in obj.links() {
                    let owned = self
                        .objects
                        .get(&child)
                        .is_some_and(|c| c.header().owner == Some(current));
                    if owned && !out.contains(&child) {
                        out.push(child);
                    }
                }
            }
        }
        out
    }

    fn section_closure(&self, id: SectionId) -> Vec<SectionId> {
        let mut out = vec![id];
        let mut cursor = 0;
        while cursor < out.len() {
            if let Some(section) = self.sections.get(&out[cursor]) {
                out.extend(section.sections.iter().copied());
            }
            cursor += 1;
        }
        out
    }
}

impl ContainerStore for MemoryStore {
    fn roots(&self) -> &[ObjectId] {
        &self.roots
    }

    fn object(&self, id: ObjectId) -> StoreResult<&StoredObject> {
        self.objects.get(&id).ok_or(StoreError::NotFound(id))
    }

    fn object_mut(&mut self, id: ObjectId) -> StoreResult<&mut StoredObject> {
        self.objects.get_mut(&id).ok_or(StoreError::NotFound(id))
    }

    fn insert(&mut self, parent: Option<ObjectId>, mut object: StoredObject) -> StoreResult<ObjectId> {
        let collection = object.kind().collection();
        let name = object.name().to_string();
        let id = object.id();

        if let StoredObject::Tag(tag) = &object {
            self.array(tag.positions)?;
            if let Some(extents) = tag.extents {
                self.array(extents)?;
            }
        }

        match parent {
            None => {
                if object.kind() != ObjectKind::Group {
                    return Err(StoreError::WrongKind {
                        id,
                        expected: ObjectKind::Group,
                        actual: object.kind(),
                    });
                }
                if self.name_taken(&self.roots, &name) {
                    return Err(StoreError::DuplicateName {
                        namespace: self.namespace_label(None, collection),
                        name,
                    });
                }
                self.roots.push(id);
            }
            Some(parent_id) => {
                let parent_obj = self.object(parent_id)?;
                let siblings = parent_obj
                    .collection(collection)
                    .ok_or_else(|| wrong_kind(parent_id, ObjectKind::Group, parent_obj))?;
                if self.name_taken(siblings, &name) {
                    return Err(StoreError::DuplicateName {
                        namespace: self.namespace_label(parent, collection),
                        name,
                    });
                }
                if let Some(list) = self.object_mut(parent_id)?.collection_mut(collection) {
                    list.push(id);
                }
            }
        }

        object.header_mut().owner = parent;
        debug!(%id, name = %name, kind = %object.kind(), "object created");
        self.objects.insert(id, object);
        Ok(id)
    }

    fn append_reference(
        &mut self,
        group: ObjectId,
        collection: Collection,
        target: ObjectId,
    ) -> StoreResult<()> {
        let target_kind = self.object(target)?.kind();
        if target_kind != collection.kind() {
            return Err(StoreError::WrongKind {
                id: target,
                expected: collection.kind(),
                actual: target_kind,
            });
        }
        let list = self.group_mut(group)?.collection_mut(collection);
        if !list.contains(&target) {
            list.push(target);
        }
        Ok(())
    }

    fn remove_reference(
        &mut self,
        group: ObjectId,
        collection: Collection,
        target: ObjectId,
    ) -> StoreResult<bool> {
        let list = self.group_mut(group)?.collection_mut(collection);
        let before = list.len();
        list.retain(|id| *id != target);
        Ok(list.len() != before)
    }

    fn delete(&mut self, id: ObjectId) -> StoreResult<()> {
        let owner = self.object(id)?.header().owner;
        let doomed = self.owned_closure(id);
        let doomed_set: HashSet<ObjectId> = doomed.iter().copied().collect();

        // Any surviving link into the doomed set, other than the owner's own
        // collection entry for `id`, blocks the deletion.
        for (other_id, other) in &self.objects {
            if doomed_set.contains(other_id) {
                continue;
            }
            for link in other.links() {
                if !doomed_set.contains(&link) {
                    continue;
                }
                if link == id && owner == Some(*other_id) {
                    continue;
                }
                return Err(StoreError::StillReferenced {
                    id: link,
                    by: *other_id,
                });
            }
        }

        match owner {
            Some(owner) => {
                let collection = self.object(id)?.kind().collection();
                if let Some(list) = self.object_mut(owner)?.collection_mut(collection) {
                    list.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }

        let mut orphaned_sections = Vec::new();
        for gone in &doomed {
            if let Some(obj) = self.objects.remove(gone) {
                debug!(id = %gone, name = %obj.name(), kind = %obj.kind(), "object deleted");
                orphaned_sections.extend(obj.header().metadata);
            }
        }

        for section in orphaned_sections {
            let still_used = self
                .objects
                .values()
                .any(|o| o.header().metadata == Some(section));
            if !still_used && self.sections.contains_key(&section) {
                self.delete_section(section)?;
            }
        }
        Ok(())
    }

    fn root_sections(&self) -> &[SectionId] {
        &self.root_sections
    }

    fn section(&self, id: SectionId) -> StoreResult<&Section> {
        self.sections.get(&id).ok_or(StoreError::SectionNotFound(id))
    }

    fn section_mut(&mut self, id: SectionId) -> StoreResult<&mut Section> {
        self.sections
            .get_mut(&id)
            .ok_or(StoreError::SectionNotFound(id))
    }

    fn create_section(
        &mut self,
        parent: Option<SectionId>,
        name: &str,
        type_name: &str,
    ) -> StoreResult<SectionId> {
        if self.find_section(parent, name)?.is_some() {
            let namespace = match parent {
                Some(p) => format!("section {}", self.section(p)?.name),
                None => "root sections".to_string(),
            };
            return Err(StoreError::DuplicateName {
                namespace,
                name: name.to_string(),
            });
        }
        let section = Section::new(name, type_name, parent);
        let id = section.id;
        match parent {
            Some(p) => self.section_mut(p)?.sections.push(id),
            None => self.root_sections.push(id),
        }
        self.sections.insert(id, section);
        Ok(id)
    }

    fn delete_section(&mut self, id: SectionId) -> StoreResult<()> {
        let parent = self.section(id)?.parent;
        let doomed = self.section_closure(id);
        match parent {
            Some(p) => {
                if let Some(parent) = self.sections.get_mut(&p) {
                    parent.sections.retain(|s| *s != id);
                }
            }
            None => self.root_sections.retain(|s| *s != id),
        }
        for section in &doomed {
            self.sections.remove(section);
        }
        for obj in self.objects.values_mut() {
            let header = obj.header_mut();
            if header.metadata.is_some_and(|m| doomed.contains(&m)) {
                header.metadata = None;
            }
        }
        debug!(%id, count = doomed.len(), "section subtree deleted");
        Ok(())
    }

    fn move_section(
        &mut self,
        id: SectionId,
        parent: Option<SectionId>,
        name: &str,
    ) -> StoreResult<()> {
        let old_parent = self.section(id)?.parent;
        if let Some(p) = parent {
            self.section(p)?;
            if self.section_closure(id).contains(&p) {
                return Err(StoreError::SectionCycle { id, parent: p });
            }
        }
        if let Some(existing) = self.find_section(parent, name)? {
            if existing != id {
                let namespace = match parent {
                    Some(p) => format!("section {}", self.section(p)?.name),
                    None => "root sections".to_string(),
                };
                return Err(StoreError::DuplicateName {
                    namespace,
                    name: name.to_string(),
                });
            }
        }

        if old_parent != parent {
            match old_parent {
                Some(p) => self.section_mut(p)?.sections.retain(|s| *s != id),
                None => self.root_sections.retain(|s| *s != id),
            }
            match parent {
                Some(p) => self.section_mut(p)?.sections.push(id),
                None => self.root_sections.push(id),
            }
        }
        let section = self.section_mut(id)?;
        section.parent = parent;
        section.name = name.to_string();
        debug!(%id, name, "section moved");
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("root_count", &self.roots.len())
            .field("object_count", &self.objects.len())
            .field("section_count", &self.sections.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Feature, LinkType};
    use spindle_types::NdArray;

    fn block_with_array(store: &mut MemoryStore) -> (ObjectId, ObjectId) {
        let root = store.create_root("b", "block").unwrap();
        let array = store
            .create_array(root, "sig.0", "signal", NdArray::vector(vec![1.0, 2.0]))
            .unwrap();
        (root, array)
    }

    // -----------------------------------------------------------------------
    // Creation and lookup
    // -----------------------------------------------------------------------

    #[test]
    fn create_and_find_children() {
        let mut store = MemoryStore::new();
        let (root, array) = block_with_array(&mut store);
        let group = store.create_group(root, "seg", "segment").unwrap();

        assert_eq!(store.find_root("b"), Some(root));
        assert_eq!(store.find_child(root, Collection::Arrays, "sig.0").unwrap(), Some(array));
        assert_eq!(store.find_child(root, Collection::Groups, "seg").unwrap(), Some(group));
        assert_eq!(store.header(array).unwrap().owner, Some(root));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn duplicate_names_rejected_per_namespace() {
        let mut store = MemoryStore::new();
        let (root, _) = block_with_array(&mut store);
        assert!(matches!(
            store.create_root("b", "block"),
            Err(StoreError::DuplicateName { .. })
        ));
        assert!(matches!(
            store.create_array(root, "sig.0", "signal", NdArray::vector(vec![])),
            Err(StoreError::DuplicateName { .. })
        ));
        // Same name in a different collection is fine.
        assert!(store.create_group(root, "sig.0", "segment").is_ok());
    }

    #[test]
    fn roots_must_be_groups() {
        let mut store = MemoryStore::new();
        let source = StoredObject::Source(crate::object::Source::new("s", "x"));
        assert!(matches!(
            store.insert(None, source),
            Err(StoreError::WrongKind { .. })
        ));
    }

    #[test]
    fn arrays_cannot_live_under_sources() {
        let mut store = MemoryStore::new();
        let root = store.create_root("b", "block").unwrap();
        let source = store.create_source(root, "cg", "x").unwrap();
        assert!(store.create_source(source, "ch", "x").is_ok());
        assert!(matches!(
            store.create_array(source, "a", "x", NdArray::vector(vec![])),
            Err(StoreError::WrongKind { .. })
        ));
    }

    #[test]
    fn tag_requires_existing_positions() {
        let mut store = MemoryStore::new();
        let root = store.create_root("b", "block").unwrap();
        assert!(matches!(
            store.create_tag(root, "t", "x", ObjectId::new()),
            Err(StoreError::NotFound(_))
        ));
    }

    // -----------------------------------------------------------------------
    // References
    // -----------------------------------------------------------------------

    #[test]
    fn append_reference_is_idempotent_and_typed() {
        let mut store = MemoryStore::new();
        let (root, array) = block_with_array(&mut store);
        let group = store.create_group(root, "seg", "segment").unwrap();

        store.append_reference(group, Collection::Arrays, array).unwrap();
        store.append_reference(group, Collection::Arrays, array).unwrap();
        assert_eq!(store.children(group, Collection::Arrays).unwrap(), &[array]);

        assert!(matches!(
            store.append_reference(group, Collection::Tags, array),
            Err(StoreError::WrongKind { .. })
        ));

        assert!(store.remove_reference(group, Collection::Arrays, array).unwrap());
        assert!(!store.remove_reference(group, Collection::Arrays, array).unwrap());
        // Unlinking leaves the array itself in place.
        assert!(store.array(array).is_ok());
    }

    // -----------------------------------------------------------------------
    // Deletion
    // -----------------------------------------------------------------------

    #[test]
    fn delete_refuses_while_referenced() {
        let mut store = MemoryStore::new();
        let (root, array) = block_with_array(&mut store);
        let group = store.create_group(root, "seg", "segment").unwrap();
        store.append_reference(group, Collection::Arrays, array).unwrap();

        match store.delete(array) {
            Err(StoreError::StillReferenced { id, by }) => {
                assert_eq!(id, array);
                assert_eq!(by, group);
            }
            other => panic!("expected StillReferenced, got {other:?}"),
        }

        store.remove_reference(group, Collection::Arrays, array).unwrap();
        store.delete(array).unwrap();
        assert!(store.children(root, Collection::Arrays).unwrap().is_empty());
    }

    #[test]
    fn tag_positions_block_array_deletion() {
        let mut store = MemoryStore::new();
        let (root, array) = block_with_array(&mut store);
        let tag = store.create_tag(root, "ev", "event", array).unwrap();
        assert!(matches!(
            store.delete(array),
            Err(StoreError::StillReferenced { .. })
        ));
        store.delete(tag).unwrap();
        store.delete(array).unwrap();
    }

    #[test]
    fn delete_source_removes_owned_children() {
        let mut store = MemoryStore::new();
        let root = store.create_root("b", "block").unwrap();
        let cg = store.create_source(root, "cg", "x").unwrap();
        let ch = store.create_source(cg, "ch", "x").unwrap();
        store.delete(cg).unwrap();
        assert!(matches!(store.object(ch), Err(StoreError::NotFound(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_checks_links_into_owned_children() {
        let mut store = MemoryStore::new();
        let (root, array) = block_with_array(&mut store);
        let cg = store.create_source(root, "cg", "x").unwrap();
        let unit = store.create_source(cg, "u", "x").unwrap();
        let tag = store.create_tag(root, "st", "x", array).unwrap();
        store.tag_mut(tag).unwrap().sources.push(unit);

        assert!(matches!(
            store.delete(cg),
            Err(StoreError::StillReferenced { id, .. }) if id == unit
        ));
    }

    #[test]
    fn deleting_root_drops_everything() {
        let mut store = MemoryStore::new();
        let (root, array) = block_with_array(&mut store);
        let feature = store
            .create_array(root, "wf", "x", NdArray::vector(vec![0.0]))
            .unwrap();
        let tag = store.create_tag(root, "st", "x", array).unwrap();
        store.tag_mut(tag).unwrap().features.push(Feature {
            data: feature,
            link: LinkType::Indexed,
        });
        store.delete(root).unwrap();
        assert!(store.is_empty());
        assert!(store.roots().is_empty());
    }

    // -----------------------------------------------------------------------
    // Sections
    // -----------------------------------------------------------------------

    #[test]
    fn shared_section_survives_until_last_user_deleted() {
        let mut store = MemoryStore::new();
        let root = store.create_root("b", "block").unwrap();
        let a0 = store.create_array(root, "s.0", "x", NdArray::vector(vec![])).unwrap();
        let a1 = store.create_array(root, "s.1", "x", NdArray::vector(vec![])).unwrap();
        let section = store.create_section(None, "s", "x.metadata").unwrap();
        store.set_metadata(a0, Some(section)).unwrap();
        store.set_metadata(a1, Some(section)).unwrap();

        store.delete(a0).unwrap();
        assert!(store.section(section).is_ok());
        store.delete(a1).unwrap();
        assert!(matches!(
            store.section(section),
            Err(StoreError::SectionNotFound(_))
        ));
    }

    #[test]
    fn delete_section_subtree_detaches_objects() {
        let mut store = MemoryStore::new();
        let root = store.create_root("b", "block").unwrap();
        let top = store.create_section(None, "b", "x").unwrap();
        let child = store.create_section(Some(top), "seg", "x").unwrap();
        let group = store.create_group(root, "seg", "x").unwrap();
        store.set_metadata(group, Some(child)).unwrap();

        assert!(matches!(
            store.create_section(Some(top), "seg", "x"),
            Err(StoreError::DuplicateName { .. })
        ));

        store.delete_section(top).unwrap();
        assert_eq!(store.section_count(), 0);
        assert!(store.root_sections().is_empty());
        assert_eq!(store.header(group).unwrap().metadata, None);
    }

    #[test]
    fn find_section_by_name() {
        let mut store = MemoryStore::new();
        let top = store.create_section(None, "b", "x").unwrap();
        let child = store.create_section(Some(top), "seg", "x").unwrap();
        assert_eq!(store.find_section(None, "b").unwrap(), Some(top));
        assert_eq!(store.find_section(Some(top), "seg").unwrap(), Some(child));
        assert_eq!(store.find_section(Some(top), "nope").unwrap(), None);
    }

    #[test]
    fn move_section_reparents_subtree_and_keeps_users() {
        let mut store = MemoryStore::new();
        let root = store.create_root("b", "block").unwrap();
        let top = store.create_section(None, "b", "x").unwrap();
        let s1 = store.create_section(Some(top), "S1", "x").unwrap();
        let s2 = store.create_section(Some(top), "S2", "x").unwrap();
        let ev = store.create_section(Some(s1), "ev", "x").unwrap();
        let detail = store.create_section(Some(ev), "detail", "x").unwrap();
        let tag_times = store.create_array(root, "ev.times", "x", NdArray::vector(vec![])).unwrap();
        let tag = store.create_tag(root, "ev", "x", tag_times).unwrap();
        store.set_metadata(tag, Some(ev)).unwrap();

        store.move_section(ev, Some(s2), "ev").unwrap();
        assert!(store.section(s1).unwrap().sections.is_empty());
        assert_eq!(store.section(s2).unwrap().sections, vec![ev]);
        assert_eq!(store.section(ev).unwrap().parent, Some(s2));
        assert_eq!(store.section(detail).unwrap().parent, Some(ev));
        assert_eq!(store.header(tag).unwrap().metadata, Some(ev));
        assert_eq!(store.section_count(), 5);

        store.move_section(ev, None, "loose").unwrap();
        assert_eq!(store.root_sections(), &[top, ev]);
        assert_eq!(store.section(ev).unwrap().name, "loose");
    }

    #[test]
    fn move_section_rejects_cycles_and_taken_names() {
        let mut store = MemoryStore::new();
        let top = store.create_section(None, "b", "x").unwrap();
        let s1 = store.create_section(Some(top), "S1", "x").unwrap();
        let s2 = store.create_section(Some(top), "S2", "x").unwrap();

        assert!(matches!(
            store.move_section(top, Some(s1), "b"),
            Err(StoreError::SectionCycle { .. })
        ));
        assert!(matches!(
            store.move_section(s1, Some(top), "S2"),
            Err(StoreError::DuplicateName { .. })
        ));
        // Renaming in place to its own name is fine.
        store.move_section(s2, Some(top), "S2").unwrap();
        assert_eq!(store.section(top).unwrap().sections, vec![s1, s2]);
    }
}
