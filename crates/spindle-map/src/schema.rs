//! Type strings stamped on container objects and metadata sections.

use spindle_types::EntityKind;

pub const TYPE_CHANNEL: &str = "spindle.channel";
pub const TYPE_WAVEFORMS: &str = "spindle.waveforms";

/// Type string of the container object(s) an entity kind maps to.
pub fn type_name(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Block => "spindle.block",
        EntityKind::Segment => "spindle.segment",
        EntityKind::RegularSignal => "spindle.regularsignal",
        EntityKind::IrregularSignal => "spindle.irregularsignal",
        EntityKind::Epoch => "spindle.epoch",
        EntityKind::Event => "spindle.event",
        EntityKind::SpikeSeries => "spindle.spikeseries",
        EntityKind::ChannelGroup => "spindle.channelgroup",
        EntityKind::Unit => "spindle.unit",
    }
}

/// Type string of a tag's positions array.
pub fn positions_type(kind: EntityKind) -> String {
    format!("{}.times", type_name(kind))
}

/// Type string of an epoch's extents array.
pub fn extents_type(kind: EntityKind) -> String {
    format!("{}.durations", type_name(kind))
}

/// Type string of the metadata section for an object of the given type.
pub fn section_type(type_name: &str) -> String {
    format!("{type_name}.metadata")
}

/// Whether an array type string belongs to a signal.
pub fn is_signal_type(type_name: &str) -> bool {
    type_name == self::type_name(EntityKind::RegularSignal)
        || type_name == self::type_name(EntityKind::IrregularSignal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_are_distinct() {
        let mut names: Vec<_> = EntityKind::ALL.iter().map(|k| type_name(*k)).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), EntityKind::ALL.len());
    }

    #[test]
    fn derived_types() {
        assert_eq!(positions_type(EntityKind::Epoch), "spindle.epoch.times");
        assert_eq!(extents_type(EntityKind::Epoch), "spindle.epoch.durations");
        assert_eq!(section_type("spindle.block"), "spindle.block.metadata");
        assert!(is_signal_type("spindle.irregularsignal"));
        assert!(!is_signal_type("spindle.epoch.times"));
    }
}
