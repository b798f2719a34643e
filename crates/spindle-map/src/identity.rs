//! Correlates record entities with the container objects built for them.
//!
//! The write half is keyed by [`EntityId`] and populated top-down during one
//! write pass, so a later entity can reference an earlier one. The read half
//! is keyed by [`ObjectId`], so reading the same object twice through one
//! engine yields the same handle.

use std::collections::HashMap;

use spindle_store::ObjectId;
use spindle_types::EntityId;

use crate::error::{MapError, MapResult};

/// Container object(s) written for one entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mapped {
    Object(ObjectId),
    /// One array per channel.
    Arrays(Vec<ObjectId>),
}

impl Mapped {
    pub fn ids(&self) -> &[ObjectId] {
        match self {
            Self::Object(id) => std::slice::from_ref(id),
            Self::Arrays(ids) => ids,
        }
    }
}

#[derive(Clone, Debug)]
struct WrittenEntry {
    mapped: Mapped,
    path: String,
}

#[derive(Debug, Default)]
pub struct IdentityMap {
    written: HashMap<EntityId, WrittenEntry>,
    read: HashMap<ObjectId, EntityId>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_written(&mut self, entity: EntityId, mapped: Mapped, path: impl Into<String>) {
        self.written.insert(
            entity,
            WrittenEntry {
                mapped,
                path: path.into(),
            },
        );
    }

    /// Container object(s) written for `entity` in the current pass.
    pub fn lookup_written(&self, entity: EntityId) -> MapResult<&Mapped> {
        self.written
            .get(&entity)
            .map(|e| &e.mapped)
            .ok_or(MapError::UnresolvedReference { entity })
    }

    pub fn written_path(&self, entity: EntityId) -> Option<&str> {
        self.written.get(&entity).map(|e| e.path.as_str())
    }

    pub fn written_len(&self) -> usize {
        self.written.len()
    }

    /// Start a new write pass.
    pub fn clear_written(&mut self) {
        self.written.clear();
    }

    /// Handle for `objects`, reusing the one already bound to the first object
    /// or binding `fresh` to all of them.
    pub fn bind_read(&mut self, objects: &[ObjectId], fresh: EntityId) -> EntityId {
        let entity = objects
            .first()
            .and_then(|first| self.read.get(first).copied())
            .unwrap_or(fresh);
        for object in objects {
            self.read.insert(*object, entity);
        }
        entity
    }

    pub fn entity_for(&self, object: ObjectId) -> Option<EntityId> {
        self.read.get(&object).copied()
    }
}
