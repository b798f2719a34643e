//! Tagged container storage for Spindle.
//!
//! This crate provides the storage primitives the mapping engine targets:
//! root groups holding arrays, tags and sources, nested groups that reference
//! them, and a separate tree of metadata sections holding typed properties.
//! Objects are addressed by persistent UUID v7 ids and looked up by name
//! within their namespace.
//!
//! # Object Types
//!
//! - [`Group`] -- ordered container; owns children at the root, references them below
//! - [`Source`] -- tree node for reference-only groupings
//! - [`DataArray`] -- numeric payload plus [`Dimension`] descriptors
//! - [`Tag`] -- points or regions over a positions array, linking other arrays
//! - [`Section`] -- key/value metadata attached to any object
//!
//! # Storage Backends
//!
//! All backends implement the [`ContainerStore`] trait:
//!
//! - [`MemoryStore`] -- arena for tests and embedding
//! - [`FileStore`] -- a [`MemoryStore`] persisted to one checksummed file
//!
//! # Design Rules
//!
//! 1. Names are unique within a namespace; creation never overwrites.
//! 2. Every non-root object has one owner; links from other objects are references.
//! 3. Deletion never leaves dangling links: it fails instead.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod file;
pub mod memory;
pub mod object;
pub mod section;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::{FileStore, OpenMode};
pub use memory::MemoryStore;
pub use object::{
    Collection, DataArray, Dimension, Feature, Group, LinkType, ObjectHeader, ObjectId,
    ObjectKind, SectionId, Source, StoredObject, Tag,
};
pub use section::{Property, PropertyValue, Section};
pub use traits::ContainerStore;
