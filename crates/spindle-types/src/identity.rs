use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

static NEXT_ENTITY: AtomicU64 = AtomicU64::new(1);

/// Stable handle of an in-memory record entity.
///
/// Every entity receives a fresh handle when it is constructed. Cross
/// references between entities that are not parent/child (a channel group
/// naming the signals it records from, a unit naming its spike series) are
/// expressed as `EntityId` values rather than pointers, so they stay valid
/// when the owning tree is moved or cloned.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Allocate a new process-unique handle.
    pub fn fresh() -> Self {
        Self(NEXT_ENTITY.fetch_add(1, Ordering::Relaxed))
    }

    /// Create from a raw value. Use `fresh()` for production code.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw handle value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId(#{})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The closed set of record entity kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Block,
    Segment,
    RegularSignal,
    IrregularSignal,
    Epoch,
    Event,
    SpikeSeries,
    ChannelGroup,
    Unit,
}

impl EntityKind {
    /// Every kind, in write order within a block.
    pub const ALL: [EntityKind; 9] = [
        Self::Block,
        Self::Segment,
        Self::RegularSignal,
        Self::IrregularSignal,
        Self::Epoch,
        Self::Event,
        Self::SpikeSeries,
        Self::ChannelGroup,
        Self::Unit,
    ];

    /// The kind tag used as the base name for unnamed entities.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Block => "Block",
            Self::Segment => "Segment",
            Self::RegularSignal => "RegularSignal",
            Self::IrregularSignal => "IrregularSignal",
            Self::Epoch => "Epoch",
            Self::Event => "Event",
            Self::SpikeSeries => "SpikeSeries",
            Self::ChannelGroup => "ChannelGroup",
            Self::Unit => "Unit",
        }
    }

    /// Whether one entity of this kind maps to several sibling arrays.
    pub fn is_multi_array(&self) -> bool {
        matches!(self, Self::RegularSignal | Self::IrregularSignal)
    }

    /// Whether entities of this kind carry recording timestamps.
    pub fn has_datetimes(&self) -> bool {
        matches!(self, Self::Block | Self::Segment)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for EntityKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.tag().eq_ignore_ascii_case(s))
            .ok_or_else(|| TypeError::UnknownKind(s.to_string()))
    }
}
