//! Record model for the Spindle mapping engine.
//!
//! This crate defines the in-memory hierarchy of recorded data: blocks,
//! segments, signals, spike series, epochs, events, channel groups and
//! units. It has no knowledge of any storage layout. `spindle-map` maps this
//! model onto a container store.
//!
//! # Key Types
//!
//! - [`Block`]: Top-level container, owning segments and channel groups
//! - [`EntityId`]: Stable handle for an in-memory entity
//! - [`EntityKind`]: The closed set of entity kinds
//! - [`Children`]: Loaded, deferred or omitted child collections
//! - [`AnnotationValue`]: Free-form annotation values
//! - [`NdArray`]: Shaped numeric payload

pub mod annotation;
pub mod error;
pub mod identity;
pub mod payload;
pub mod record;

pub use annotation::{AnnotationValue, Annotations, Quantity};
pub use error::TypeError;
pub use identity::{EntityId, EntityKind};
pub use payload::NdArray;
pub use record::{
    Attributes, Block, ChannelGroup, Children, Coordinates, Deferred, Entity, Epoch, Event,
    IrregularSignal, Record, RegularSignal, Segment, SpikeSeries, Unit, Waveforms,
};
