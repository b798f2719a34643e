//! Collision-free container names.
//!
//! A name is the entity's own name, or its kind tag when it has none. If that
//! is taken in the sibling namespace, `-1`, `-2`, ... is appended until it is
//! free. Multi-channel signals are checked by their first array name
//! (`<name>.0`), since that is the first place two signals can collide.

use std::collections::{BTreeSet, HashMap};

use spindle_store::{Collection, ObjectId};
use spindle_types::EntityKind;

use crate::error::{MapError, MapResult};

/// Characters that may not appear in a container name.
const FORBIDDEN_CHARS: &[char] = &['/', '\n', '\r', '\0'];

/// Check that a name can be used as one path segment.
pub fn validate_name(name: &str) -> MapResult<()> {
    if name.is_empty() {
        return Err(MapError::InvalidName {
            name: name.to_string(),
            reason: "name must not be empty".into(),
        });
    }
    for ch in FORBIDDEN_CHARS {
        if name.contains(*ch) {
            return Err(MapError::InvalidName {
                name: name.to_string(),
                reason: format!("contains forbidden character: {ch:?}"),
            });
        }
    }
    Ok(())
}

/// Mediate the name of an entity. An empty name counts as no name.
pub fn mediate(name: Option<&str>, taken: &BTreeSet<String>, kind: EntityKind) -> MapResult<String> {
    let base = match name {
        Some(n) if !n.is_empty() => n,
        _ => kind.tag(),
    };
    validate_name(base)?;
    Ok(mediate_with_base(base, taken, kind.is_multi_array()))
}

/// Mediate from an explicit base name.
pub fn mediate_with_base(base: &str, taken: &BTreeSet<String>, multi_array: bool) -> String {
    let is_free = |candidate: &str| {
        if multi_array {
            !taken.contains(&format!("{candidate}.0"))
        } else {
            !taken.contains(candidate)
        }
    };
    if is_free(base) {
        return base.to_string();
    }
    let mut k = 1usize;
    loop {
        let candidate = format!("{base}-{k}");
        if is_free(&candidate) {
            return candidate;
        }
        k += 1;
    }
}

static EMPTY: BTreeSet<String> = BTreeSet::new();

/// Namespace key: a parent object (or the root list) plus a collection.
type Namespace = (Option<ObjectId>, Collection);

/// Names claimed during the current write pass, per namespace.
#[derive(Debug, Default)]
pub struct Claims {
    taken: HashMap<Namespace, BTreeSet<String>>,
}

impl Claims {
    pub fn taken(&self, parent: Option<ObjectId>, collection: Collection) -> &BTreeSet<String> {
        self.taken.get(&(parent, collection)).unwrap_or(&EMPTY)
    }

    /// Claim a name. Returns `false` if it was already claimed.
    pub fn claim(&mut self, parent: Option<ObjectId>, collection: Collection, name: &str) -> bool {
        self.taken
            .entry((parent, collection))
            .or_default()
            .insert(name.to_string())
    }

    pub fn is_claimed(&self, parent: Option<ObjectId>, collection: Collection, name: &str) -> bool {
        self.taken(parent, collection).contains(name)
    }

    pub fn clear(&mut self) {
        self.taken.clear();
    }
}
