//! The record model: a block tree of segments, signals, spike series, epochs,
//! events, channel groups and units.
//!
//! Structural children live in [`Children`] collections. References that
//! cross the structural tree (channel group to signal, unit to spike series)
//! are [`EntityId`] handles resolved against the owning [`Block`].

use chrono::NaiveDateTime;

use crate::annotation::Annotations;
use crate::error::TypeError;
use crate::identity::{EntityId, EntityKind};
use crate::payload::NdArray;

/// Attributes shared by every entity kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attributes {
    pub name: Option<String>,
    pub description: Option<String>,
    pub file_origin: Option<String>,
    pub annotations: Annotations,
}

impl Attributes {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Children
// ---------------------------------------------------------------------------

/// Paths of children that have not been read yet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Deferred {
    /// Container paths, one per child, in container order.
    pub paths: Vec<String>,
    /// Whether payloads should stay unloaded when the children are expanded.
    pub lazy: bool,
}

/// A child collection that may be loaded, deferred, or not read at all.
#[derive(Clone, Debug, PartialEq)]
pub enum Children<T> {
    /// Children are materialized.
    Loaded(Vec<T>),
    /// Children exist in the container but are read on demand.
    Deferred(Deferred),
    /// Children were not requested.
    Omitted,
}

impl<T> Children<T> {
    pub fn new() -> Self {
        Self::Loaded(Vec::new())
    }

    /// The loaded children, or `None` when deferred or omitted.
    pub fn loaded(&self) -> Option<&[T]> {
        match self {
            Self::Loaded(items) => Some(items),
            _ => None,
        }
    }

    pub fn loaded_mut(&mut self) -> Option<&mut Vec<T>> {
        match self {
            Self::Loaded(items) => Some(items),
            _ => None,
        }
    }

    /// Iterate over loaded children. Deferred and omitted collections yield
    /// nothing.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.loaded().unwrap_or(&[]).iter()
    }

    /// Number of loaded children.
    pub fn len(&self) -> usize {
        self.loaded().map_or(0, <[T]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn deferred(&self) -> Option<&Deferred> {
        match self {
            Self::Deferred(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_omitted(&self) -> bool {
        matches!(self, Self::Omitted)
    }

    /// Append a child. A deferred or omitted collection is replaced by a
    /// loaded one first.
    pub fn push(&mut self, item: T) {
        match self {
            Self::Loaded(items) => items.push(item),
            _ => *self = Self::Loaded(vec![item]),
        }
    }
}

impl<T> Default for Children<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<T>> for Children<T> {
    fn from(items: Vec<T>) -> Self {
        Self::Loaded(items)
    }
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

/// Top-level recording container.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub id: EntityId,
    pub attrs: Attributes,
    pub rec_datetime: Option<NaiveDateTime>,
    pub file_datetime: Option<NaiveDateTime>,
    pub segments: Children<Segment>,
    pub channel_groups: Children<ChannelGroup>,
}

impl Block {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_attributes(Attributes::named(name))
    }

    pub fn with_attributes(attrs: Attributes) -> Self {
        Self {
            id: EntityId::fresh(),
            attrs,
            rec_datetime: None,
            file_datetime: None,
            segments: Children::new(),
            channel_groups: Children::new(),
        }
    }

    /// Find a loaded regular signal anywhere in this block.
    pub fn regular_signal(&self, id: EntityId) -> Option<&RegularSignal> {
        self.segments
            .iter()
            .flat_map(|s| s.regular_signals.iter())
            .find(|sig| sig.id == id)
    }

    /// Find a loaded irregular signal anywhere in this block.
    pub fn irregular_signal(&self, id: EntityId) -> Option<&IrregularSignal> {
        self.segments
            .iter()
            .flat_map(|s| s.irregular_signals.iter())
            .find(|sig| sig.id == id)
    }

    /// Find a loaded spike series anywhere in this block.
    pub fn spike_series(&self, id: EntityId) -> Option<&SpikeSeries> {
        self.segments
            .iter()
            .flat_map(|s| s.spike_series.iter())
            .find(|st| st.id == id)
    }
}

/// A contiguous recording period within a block.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub id: EntityId,
    pub attrs: Attributes,
    pub rec_datetime: Option<NaiveDateTime>,
    pub file_datetime: Option<NaiveDateTime>,
    pub regular_signals: Children<RegularSignal>,
    pub irregular_signals: Children<IrregularSignal>,
    pub epochs: Children<Epoch>,
    pub events: Children<Event>,
    pub spike_series: Children<SpikeSeries>,
}

impl Segment {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_attributes(Attributes::named(name))
    }

    pub fn with_attributes(attrs: Attributes) -> Self {
        Self {
            id: EntityId::fresh(),
            attrs,
            rec_datetime: None,
            file_datetime: None,
            regular_signals: Children::new(),
            irregular_signals: Children::new(),
            epochs: Children::new(),
            events: Children::new(),
            spike_series: Children::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Multi-channel signal sampled at a fixed interval.
#[derive(Clone, Debug, PartialEq)]
pub struct RegularSignal {
    pub id: EntityId,
    pub attrs: Attributes,
    /// Shape `(channels, samples)`.
    pub data: NdArray,
    pub units: Option<String>,
    pub time_units: Option<String>,
    pub t_start: f64,
    pub sampling_period: f64,
}

impl RegularSignal {
    /// Build from per-channel sample vectors. All channels must have the same
    /// length.
    pub fn new(
        name: impl Into<String>,
        channels: Vec<Vec<f64>>,
        sampling_period: f64,
        time_units: impl Into<String>,
    ) -> Result<Self, TypeError> {
        Ok(Self {
            id: EntityId::fresh(),
            attrs: Attributes::named(name),
            data: NdArray::from_rows(channels)?,
            units: None,
            time_units: Some(time_units.into()),
            t_start: 0.0,
            sampling_period,
        })
    }

    pub fn channel_count(&self) -> usize {
        self.data.outer_len()
    }

    pub fn sample_count(&self) -> usize {
        self.data.shape().get(1).copied().unwrap_or(0)
    }

    pub fn sampling_rate(&self) -> f64 {
        1.0 / self.sampling_period
    }
}

/// Multi-channel signal sampled at explicit time points.
#[derive(Clone, Debug, PartialEq)]
pub struct IrregularSignal {
    pub id: EntityId,
    pub attrs: Attributes,
    /// Shape `(channels, samples)`.
    pub data: NdArray,
    pub units: Option<String>,
    pub times: Vec<f64>,
    pub time_units: Option<String>,
}

impl IrregularSignal {
    /// Build from sample times and per-channel values; every channel must have
    /// one value per time point.
    pub fn new(
        name: impl Into<String>,
        times: Vec<f64>,
        channels: Vec<Vec<f64>>,
        time_units: impl Into<String>,
    ) -> Result<Self, TypeError> {
        let data = NdArray::from_rows(channels)?;
        let samples = data.shape().get(1).copied().unwrap_or(0);
        if data.outer_len() > 0 && samples != times.len() {
            return Err(TypeError::ShapeMismatch {
                shape: data.shape().to_vec(),
                expected: times.len() * data.outer_len(),
                actual: data.len(),
            });
        }
        Ok(Self {
            id: EntityId::fresh(),
            attrs: Attributes::named(name),
            data,
            units: None,
            times,
            time_units: Some(time_units.into()),
        })
    }

    pub fn channel_count(&self) -> usize {
        self.data.outer_len()
    }
}

// ---------------------------------------------------------------------------
// Time series of points and intervals
// ---------------------------------------------------------------------------

/// Labelled time intervals.
#[derive(Clone, Debug, PartialEq)]
pub struct Epoch {
    pub id: EntityId,
    pub attrs: Attributes,
    pub times: Vec<f64>,
    pub time_units: Option<String>,
    pub durations: Vec<f64>,
    pub duration_units: Option<String>,
    pub labels: Vec<String>,
}

impl Epoch {
    pub fn new(name: impl Into<String>, times: Vec<f64>, durations: Vec<f64>) -> Self {
        Self {
            id: EntityId::fresh(),
            attrs: Attributes::named(name),
            times,
            time_units: None,
            durations,
            duration_units: None,
            labels: Vec::new(),
        }
    }
}

/// Labelled time points.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub id: EntityId,
    pub attrs: Attributes,
    pub times: Vec<f64>,
    pub time_units: Option<String>,
    pub labels: Vec<String>,
}

impl Event {
    pub fn new(name: impl Into<String>, times: Vec<f64>) -> Self {
        Self {
            id: EntityId::fresh(),
            attrs: Attributes::named(name),
            times,
            time_units: None,
            labels: Vec::new(),
        }
    }
}

/// Spike waveforms cut around each spike time.
#[derive(Clone, Debug, PartialEq)]
pub struct Waveforms {
    /// Shape `(spikes, channels, samples)`.
    pub data: NdArray,
    pub units: Option<String>,
    pub sampling_period: f64,
    pub time_units: Option<String>,
    /// Time from the start of each waveform to its spike.
    pub left_sweep: Option<f64>,
}

/// Spike times of one putative neuron within a segment.
#[derive(Clone, Debug, PartialEq)]
pub struct SpikeSeries {
    pub id: EntityId,
    pub attrs: Attributes,
    pub times: Vec<f64>,
    pub time_units: Option<String>,
    pub t_start: Option<f64>,
    pub t_stop: f64,
    pub waveforms: Option<Waveforms>,
}

impl SpikeSeries {
    pub fn new(name: impl Into<String>, times: Vec<f64>, t_stop: f64) -> Self {
        Self {
            id: EntityId::fresh(),
            attrs: Attributes::named(name),
            times,
            time_units: None,
            t_start: None,
            t_stop,
            waveforms: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Channel groups and units
// ---------------------------------------------------------------------------

/// Per-channel spatial coordinates sharing one unit.
#[derive(Clone, Debug, PartialEq)]
pub struct Coordinates {
    /// One coordinate tuple per channel.
    pub values: Vec<Vec<f64>>,
    pub units: String,
}

/// A set of recording channels plus the units sorted from them.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelGroup {
    pub id: EntityId,
    pub attrs: Attributes,
    pub channel_indexes: Vec<i64>,
    /// Either empty or one name per channel index.
    pub channel_names: Vec<String>,
    pub coordinates: Option<Coordinates>,
    pub units: Children<Unit>,
    /// Regular signals recorded from this group, living in any segment.
    pub regular_signals: Vec<EntityId>,
    /// Irregular signals recorded from this group, living in any segment.
    pub irregular_signals: Vec<EntityId>,
}

impl ChannelGroup {
    pub fn new(name: impl Into<String>, channel_indexes: Vec<i64>) -> Self {
        Self {
            id: EntityId::fresh(),
            attrs: Attributes::named(name),
            channel_indexes,
            channel_names: Vec::new(),
            coordinates: None,
            units: Children::new(),
            regular_signals: Vec::new(),
            irregular_signals: Vec::new(),
        }
    }
}

/// A putative neuron; owns references to its spike series across segments.
#[derive(Clone, Debug, PartialEq)]
pub struct Unit {
    pub id: EntityId,
    pub attrs: Attributes,
    pub spike_series: Vec<EntityId>,
}

impl Unit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::fresh(),
            attrs: Attributes::named(name),
            spike_series: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Closed entity enumeration
// ---------------------------------------------------------------------------

/// Any record entity.
#[derive(Clone, Debug, PartialEq)]
pub enum Entity {
    Block(Block),
    Segment(Segment),
    RegularSignal(RegularSignal),
    IrregularSignal(IrregularSignal),
    Epoch(Epoch),
    Event(Event),
    SpikeSeries(SpikeSeries),
    ChannelGroup(ChannelGroup),
    Unit(Unit),
}

/// Common access to every entity struct.
pub trait Record: Sized {
    const KIND: EntityKind;

    fn id(&self) -> EntityId;

    fn attributes(&self) -> &Attributes;

    fn into_entity(self) -> Entity;

    /// Unwrap the matching variant, or `None` for any other kind.
    fn from_entity(entity: Entity) -> Option<Self>;
}

macro_rules! impl_record {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Record for $ty {
                const KIND: EntityKind = EntityKind::$ty;

                fn id(&self) -> EntityId {
                    self.id
                }

                fn attributes(&self) -> &Attributes {
                    &self.attrs
                }

                fn into_entity(self) -> Entity {
                    Entity::$ty(self)
                }

                fn from_entity(entity: Entity) -> Option<Self> {
                    match entity {
                        Entity::$ty(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )*

        impl Entity {
            pub fn kind(&self) -> EntityKind {
                match self {
                    $(Self::$ty(_) => EntityKind::$ty,)*
                }
            }

            pub fn id(&self) -> EntityId {
                match self {
                    $(Self::$ty(inner) => inner.id,)*
                }
            }

            pub fn attributes(&self) -> &Attributes {
                match self {
                    $(Self::$ty(inner) => &inner.attrs,)*
                }
            }
        }
    };
}

impl_record!(
    Block,
    Segment,
    RegularSignal,
    IrregularSignal,
    Epoch,
    Event,
    SpikeSeries,
    ChannelGroup,
    Unit,
);
