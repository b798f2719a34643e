use std::collections::BTreeSet;
use std::path::Path;

use spindle_store::{ContainerStore, FileStore, ObjectId, OpenMode, SectionId};
use tracing::{debug, info};

use crate::config::MapperConfig;
use crate::diagnostics::DiagnosticSink;
use crate::error::MapResult;
use crate::identity::IdentityMap;
use crate::names::Claims;

/// Mapping engine bound to one container store.
///
/// Holds the identity map, the per-pass name claims and the lazy-read
/// bookkeeping. All of it is discarded with the engine. Write rules live in
/// `write.rs`, read rules in `read.rs`.
pub struct NixMapper<S: ContainerStore = FileStore> {
    pub(crate) store: S,
    pub(crate) config: MapperConfig,
    pub(crate) identity: IdentityMap,
    pub(crate) claims: Claims,
    pub(crate) sink: DiagnosticSink,
    pub(crate) lazy_paths: BTreeSet<String>,
}

impl<S: ContainerStore> NixMapper<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, MapperConfig::default())
    }

    pub fn with_config(store: S, config: MapperConfig) -> Self {
        Self {
            store,
            config,
            identity: IdentityMap::new(),
            claims: Claims::default(),
            sink: DiagnosticSink::default(),
            lazy_paths: BTreeSet::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn identity(&self) -> &IdentityMap {
        &self.identity
    }

    /// Paths read with `lazy = true` through this engine.
    pub fn lazy_paths(&self) -> &BTreeSet<String> {
        &self.lazy_paths
    }

    /// Persist pending changes.
    pub fn flush(&mut self) -> MapResult<()> {
        self.store.flush()?;
        Ok(())
    }

    /// Release the engine and hand back its store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Reuse the object's section, moving it under `parent` if the object
    /// changed owner, otherwise create one with a name unique among its
    /// siblings.
    pub(crate) fn section_for(
        &mut self,
        existing: Option<ObjectId>,
        parent: Option<SectionId>,
        name: &str,
        type_name: &str,
    ) -> MapResult<SectionId> {
        let current = match existing {
            Some(object) => self.store.header(object)?.metadata,
            None => None,
        };
        if let Some(section) = current {
            if self.store.section(section)?.parent == parent {
                return Ok(section);
            }
        }

        let siblings: BTreeSet<String> = match parent {
            Some(p) => self.store.section(p)?.sections.clone(),
            None => self.store.root_sections().to_vec(),
        }
        .iter()
        .filter_map(|s| self.store.section(*s).ok())
        .map(|s| s.name.clone())
        .collect();
        let section_name = crate::names::mediate_with_base(name, &siblings, false);

        if let Some(section) = current {
            self.store.move_section(section, parent, &section_name)?;
            debug!(%section, name = %section_name, "section moved to new parent");
            return Ok(section);
        }
        let section_type = crate::schema::section_type(type_name);
        Ok(self
            .store
            .create_section(parent, &section_name, &section_type)?)
    }
}

impl NixMapper<FileStore> {
    /// Open a container file and bind an engine to it.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> MapResult<Self> {
        Self::open_with_config(path, mode, MapperConfig::default())
    }

    pub fn open_with_config(
        path: impl AsRef<Path>,
        mode: OpenMode,
        config: MapperConfig,
    ) -> MapResult<Self> {
        let mut store = FileStore::open(path, mode)?;
        store.set_flush_on_drop(config.flush_on_drop);
        Ok(Self::with_config(store, config))
    }

    /// Flush and release the file handle.
    pub fn close(self) -> MapResult<()> {
        let path = self.store.path().display().to_string();
        self.store.close()?;
        info!(path = %path, "mapper closed");
        Ok(())
    }
}

impl<S: ContainerStore + std::fmt::Debug> std::fmt::Debug for NixMapper<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NixMapper")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("lazy_paths", &self.lazy_paths.len())
            .finish()
    }
}
