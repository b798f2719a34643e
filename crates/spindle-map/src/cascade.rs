//! Read depth and payload laziness.

use serde::{Deserialize, Serialize};
use spindle_types::{Children, Deferred};

/// How far a read descends below the requested entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadeMode {
    /// Materialize children recursively.
    #[default]
    Full,
    /// Leave children as a deferred list of paths.
    Shallow,
    /// Read the entity alone.
    None,
}

impl CascadeMode {
    /// Whether non-structural references are resolved at this depth.
    pub fn resolves_references(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Options carried through one read call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub cascade: CascadeMode,
    /// Leave numeric payloads as zero-length placeholders.
    pub lazy: bool,
}

impl ReadOptions {
    pub fn new(cascade: CascadeMode, lazy: bool) -> Self {
        Self { cascade, lazy }
    }

    /// Build a child collection: `load` runs only in full mode, `paths` only
    /// in shallow mode.
    pub fn children<T, E>(
        &self,
        paths: impl FnOnce() -> Vec<String>,
        load: impl FnOnce() -> Result<Vec<T>, E>,
    ) -> Result<Children<T>, E> {
        Ok(match self.cascade {
            CascadeMode::Full => Children::Loaded(load()?),
            CascadeMode::Shallow => Children::Deferred(Deferred {
                paths: paths(),
                lazy: self.lazy,
            }),
            CascadeMode::None => Children::Omitted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(cascade: CascadeMode) -> Children<u32> {
        ReadOptions::new(cascade, true)
            .children(|| vec!["/b/segments/s".into()], || Ok::<_, ()>(vec![1, 2]))
            .unwrap()
    }

    #[test]
    fn full_loads() {
        assert_eq!(build(CascadeMode::Full).loaded(), Some(&[1, 2][..]));
    }

    #[test]
    fn shallow_defers_with_lazy_flag() {
        let children = build(CascadeMode::Shallow);
        let deferred = children.deferred().unwrap();
        assert_eq!(deferred.paths, vec!["/b/segments/s".to_string()]);
        assert!(deferred.lazy);
    }

    #[test]
    fn none_omits_without_running_loader() {
        let children: Children<u32> = ReadOptions::new(CascadeMode::None, false)
            .children(Vec::new, || Err("loader must not run"))
            .unwrap();
        assert!(children.is_omitted());
        assert!(!CascadeMode::None.resolves_references());
    }
}
