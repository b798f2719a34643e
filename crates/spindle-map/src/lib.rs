//! Bidirectional mapping between Spindle records and the container store.
//!
//! A [`NixMapper`] binds to one [`ContainerStore`](spindle_store::ContainerStore)
//! and translates record trees (blocks, segments, signals, epochs, events,
//! spike series, channel groups, units) into groups, arrays, tags, sources and
//! metadata sections, and back.
//!
//! # Key Types
//!
//! - [`NixMapper`] -- the engine: write passes, path reads, deferred expansion
//! - [`ObjectPath`] -- `/block/segments/seg/regularsignals/sig` style addresses
//! - [`CascadeMode`] / [`ReadOptions`] -- how far a read descends
//! - [`MapperConfig`] -- TOML-loadable defaults for reads and file handling
//! - [`Outcome`] / [`Diagnostic`] -- write results plus dropped annotations
//! - [`IdentityMap`] -- entity handles bound to container objects
//!
//! # Design Rules
//!
//! 1. A re-write reuses containers by name; nothing is duplicated.
//! 2. Sibling names are mediated within one pass, never overwritten.
//! 3. One signal's arrays share one metadata section.
//! 4. Annotations the store cannot hold are reported, not fatal.
//! 5. Reconciliation only runs when the whole block is loaded.

pub mod cascade;
pub mod codec;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod identity;
pub mod mapper;
pub mod names;
pub mod path;
pub mod read;
pub mod schema;
pub mod write;

#[cfg(test)]
mod testing;

pub use cascade::{CascadeMode, ReadOptions};
pub use config::MapperConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, Outcome};
pub use error::{MapError, MapResult};
pub use identity::{IdentityMap, Mapped};
pub use mapper::NixMapper;
pub use path::{build_path, resolve, ContainerLabel, ObjectPath, Resolved};
