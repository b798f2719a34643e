use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::memory::MemoryStore;
use crate::object::{Collection, ObjectId, SectionId, StoredObject};
use crate::section::Section;
use crate::traits::ContainerStore;

/// Magic bytes at the start of every container document.
pub const MAGIC: [u8; 4] = *b"SPDL";

/// Current document format version.
pub const FORMAT_VERSION: u16 = 1;

/// magic (4) + version (2) + crc (4)
const HEADER_SIZE: usize = 10;

/// How a container file is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Load an existing file; every mutation fails.
    ReadOnly,
    /// Load an existing file, or start empty if it does not exist.
    ReadWrite,
    /// Start empty, replacing any existing file on flush.
    Overwrite,
}

impl OpenMode {
    pub fn is_writable(&self) -> bool {
        !matches!(self, Self::ReadOnly)
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ReadOnly => "ro",
            Self::ReadWrite => "rw",
            Self::Overwrite => "ow",
        };
        f.write_str(s)
    }
}

impl FromStr for OpenMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ro" | "readonly" | "read_only" => Ok(Self::ReadOnly),
            "rw" | "readwrite" | "read_write" => Ok(Self::ReadWrite),
            "ow" | "overwrite" => Ok(Self::Overwrite),
            _ => Err(StoreError::InvalidMode(s.to_string())),
        }
    }
}

/// Encode a document as `[magic][version: u16 LE][crc: u32 LE][bincode payload]`.
pub fn encode_document(store: &MemoryStore) -> StoreResult<Vec<u8>> {
    let payload =
        bincode::serialize(store).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let crc = crc32fast::hash(&payload);

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode a document produced by [`encode_document`].
pub fn decode_document(bytes: &[u8]) -> StoreResult<MemoryStore> {
    if bytes.len() < HEADER_SIZE || bytes[0..4] != MAGIC {
        return Err(StoreError::UnsupportedFormat(
            "missing container magic".to_string(),
        ));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(StoreError::UnsupportedFormat(format!(
            "format version {version}, expected {FORMAT_VERSION}"
        )));
    }
    let expected_crc = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
    let payload = &bytes[HEADER_SIZE..];
    let actual_crc = crc32fast::hash(payload);
    if actual_crc != expected_crc {
        return Err(StoreError::Serialization(format!(
            "checksum mismatch: expected {expected_crc:08x}, computed {actual_crc:08x}"
        )));
    }
    bincode::deserialize(payload).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// A container document bound to a file on disk.
///
/// The whole document is loaded on open and kept in a [`MemoryStore`].
/// Changes reach disk on [`flush`](ContainerStore::flush), on
/// [`close`](FileStore::close), and on drop unless disabled.
pub struct FileStore {
    path: PathBuf,
    mode: OpenMode,
    inner: MemoryStore,
    dirty: bool,
    flush_on_drop: bool,
    closed: bool,
}

impl FileStore {
    /// Open a container file.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = match mode {
            OpenMode::Overwrite => MemoryStore::new(),
            OpenMode::ReadWrite if !path.exists() => MemoryStore::new(),
            OpenMode::ReadOnly | OpenMode::ReadWrite => decode_document(&fs::read(&path)?)?,
        };
        info!(path = %path.display(), %mode, objects = inner.len(), "container file opened");
        Ok(Self {
            path,
            mode,
            inner,
            // An overwrite must replace the old file even if nothing is written.
            dirty: mode == OpenMode::Overwrite,
            flush_on_drop: true,
            closed: false,
        })
    }

    /// Whether a dropped handle persists pending changes. Defaults to `true`.
    pub fn set_flush_on_drop(&mut self, enabled: bool) {
        self.flush_on_drop = enabled;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Whether there are changes not yet written to disk.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The working document.
    pub fn document(&self) -> &MemoryStore {
        &self.inner
    }

    /// Flush and release the handle.
    pub fn close(mut self) -> StoreResult<()> {
        self.flush()?;
        self.closed = true;
        info!(path = %self.path.display(), "container file closed");
        Ok(())
    }

    fn writable(&mut self) -> StoreResult<&mut MemoryStore> {
        if !self.mode.is_writable() {
            return Err(StoreError::ReadOnly);
        }
        self.dirty = true;
        Ok(&mut self.inner)
    }

    fn persist(&mut self) -> StoreResult<()> {
        let bytes = encode_document(&self.inner)?;
        let tmp = self.path.with_extension("tmp");
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &self.path)?;
        self.dirty = false;
        debug!(path = %self.path.display(), bytes = bytes.len(), "container file flushed");
        Ok(())
    }
}

impl ContainerStore for FileStore {
    fn roots(&self) -> &[ObjectId] {
        self.inner.roots()
    }

    fn object(&self, id: ObjectId) -> StoreResult<&StoredObject> {
        self.inner.object(id)
    }

    fn object_mut(&mut self, id: ObjectId) -> StoreResult<&mut StoredObject> {
        self.writable()?.object_mut(id)
    }

    fn insert(&mut self, parent: Option<ObjectId>, object: StoredObject) -> StoreResult<ObjectId> {
        self.writable()?.insert(parent, object)
    }

    fn append_reference(
        &mut self,
        group: ObjectId,
        collection: Collection,
        target: ObjectId,
    ) -> StoreResult<()> {
        self.writable()?.append_reference(group, collection, target)
    }

    fn remove_reference(
        &mut self,
        group: ObjectId,
        collection: Collection,
        target: ObjectId,
    ) -> StoreResult<bool> {
        self.writable()?.remove_reference(group, collection, target)
    }

    fn delete(&mut self, id: ObjectId) -> StoreResult<()> {
        self.writable()?.delete(id)
    }

    fn root_sections(&self) -> &[SectionId] {
        self.inner.root_sections()
    }

    fn section(&self, id: SectionId) -> StoreResult<&Section> {
        self.inner.section(id)
    }

    fn section_mut(&mut self, id: SectionId) -> StoreResult<&mut Section> {
        self.writable()?.section_mut(id)
    }

    fn create_section(
        &mut self,
        parent: Option<SectionId>,
        name: &str,
        type_name: &str,
    ) -> StoreResult<SectionId> {
        self.writable()?.create_section(parent, name, type_name)
    }

    fn delete_section(&mut self, id: SectionId) -> StoreResult<()> {
        self.writable()?.delete_section(id)
    }

    fn move_section(
        &mut self,
        id: SectionId,
        parent: Option<SectionId>,
        name: &str,
    ) -> StoreResult<()> {
        self.writable()?.move_section(id, parent, name)
    }

    fn flush(&mut self) -> StoreResult<()> {
        if !self.mode.is_writable() || !self.dirty {
            return Ok(());
        }
        self.persist()
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if self.closed || !self.flush_on_drop {
            return;
        }
        if let Err(e) = self.flush() {
            warn!(path = %self.path.display(), error = %e, "flush on drop failed");
        }
    }
}

impl fmt::Debug for FileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("dirty", &self.dirty)
            .field("document", &self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_types::NdArray;

    fn populate(store: &mut impl ContainerStore) -> ObjectId {
        let root = store.create_root("b", "block").unwrap();
        let array = store
            .create_array(root, "sig.0", "signal", NdArray::vector(vec![1.0, 2.0, 3.0]))
            .unwrap();
        let section = store.create_section(None, "b", "block.metadata").unwrap();
        store.set_metadata(root, Some(section)).unwrap();
        array
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("ro".parse::<OpenMode>().unwrap(), OpenMode::ReadOnly);
        assert_eq!("RW".parse::<OpenMode>().unwrap(), OpenMode::ReadWrite);
        assert_eq!("overwrite".parse::<OpenMode>().unwrap(), OpenMode::Overwrite);
        assert!(matches!(
            "append".parse::<OpenMode>(),
            Err(StoreError::InvalidMode(_))
        ));
        assert_eq!(OpenMode::Overwrite.to_string(), "ow");
    }

    #[test]
    fn close_then_reopen_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.spdl");

        let mut store = FileStore::open(&path, OpenMode::Overwrite).unwrap();
        let array = populate(&mut store);
        store.close().unwrap();

        let store = FileStore::open(&path, OpenMode::ReadOnly).unwrap();
        assert_eq!(store.roots().len(), 1);
        assert_eq!(store.array(array).unwrap().data.values(), &[1.0, 2.0, 3.0]);
        assert_eq!(store.root_sections().len(), 1);
    }

    #[test]
    fn read_only_rejects_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.spdl");
        FileStore::open(&path, OpenMode::Overwrite)
            .unwrap()
            .close()
            .unwrap();

        let mut store = FileStore::open(&path, OpenMode::ReadOnly).unwrap();
        assert!(matches!(
            store.create_root("b", "block"),
            Err(StoreError::ReadOnly)
        ));
        assert!(matches!(
            store.create_section(None, "s", "x"),
            Err(StoreError::ReadOnly)
        ));
        assert!(!store.is_dirty());
    }

    #[test]
    fn read_only_on_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.spdl");
        assert!(matches!(
            FileStore::open(&path, OpenMode::ReadOnly),
            Err(StoreError::Io(_))
        ));
    }

    #[test]
    fn drop_flushes_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.spdl");
        {
            let mut store = FileStore::open(&path, OpenMode::ReadWrite).unwrap();
            populate(&mut store);
        }
        let store = FileStore::open(&path, OpenMode::ReadOnly).unwrap();
        assert_eq!(store.document().len(), 2);
    }

    #[test]
    fn drop_without_flush_discards() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.spdl");
        {
            let mut store = FileStore::open(&path, OpenMode::ReadWrite).unwrap();
            store.set_flush_on_drop(false);
            populate(&mut store);
        }
        assert!(!path.exists());
    }

    #[test]
    fn overwrite_replaces_existing_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.spdl");
        let mut store = FileStore::open(&path, OpenMode::Overwrite).unwrap();
        populate(&mut store);
        store.close().unwrap();

        FileStore::open(&path, OpenMode::Overwrite)
            .unwrap()
            .close()
            .unwrap();
        let store = FileStore::open(&path, OpenMode::ReadOnly).unwrap();
        assert!(store.document().is_empty());
    }

    #[test]
    fn corrupt_payload_is_detected() {
        let mut store = MemoryStore::new();
        populate(&mut store);
        let mut bytes = encode_document(&store).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(matches!(
            decode_document(&bytes),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut bytes = encode_document(&MemoryStore::new()).unwrap();
        bytes[4] = 9;
        assert!(matches!(
            decode_document(&bytes),
            Err(StoreError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            decode_document(b"nope"),
            Err(StoreError::UnsupportedFormat(_))
        ));
    }
}
