//! Read rules: container objects back to record entities.
//!
//! Every reader takes the objects a path resolved to plus the read options.
//! Handles are bound through the identity map, so reading the same objects
//! twice through one engine yields the same handles, and references from
//! channel groups and units point at the handles of the entities they name.

use spindle_store::{Collection, ContainerStore, Dimension, LinkType, ObjectId, PropertyValue};
use spindle_types::{
    Block, ChannelGroup, Children, Coordinates, Entity, EntityId, EntityKind, Epoch, Event,
    IrregularSignal, NdArray, Record, RegularSignal, Segment, SpikeSeries, Unit, Waveforms,
};
use tracing::debug;

use crate::cascade::{CascadeMode, ReadOptions};
use crate::codec::{self, DecodedAttributes};
use crate::error::{MapError, MapResult};
use crate::mapper::NixMapper;
use crate::path::{self, has_type, ContainerLabel, ObjectPath};
use crate::schema::{self, TYPE_CHANNEL};

/// Reader for one entity kind, given the objects its path resolved to.
type Reader<S, T> = fn(&mut NixMapper<S>, &[ObjectId], &ObjectPath, ReadOptions) -> MapResult<T>;

/// A child found under a parent container, not read yet.
struct Listed {
    ids: Vec<ObjectId>,
    path: ObjectPath,
}

fn corrupt(path: &ObjectPath, reason: impl Into<String>) -> MapError {
    MapError::Corrupt {
        path: path.to_string(),
        reason: reason.into(),
    }
}

fn single(ids: &[ObjectId], path: &ObjectPath) -> MapResult<ObjectId> {
    ids.first()
        .copied()
        .ok_or_else(|| MapError::NotFound {
            path: path.to_string(),
        })
}

impl<S: ContainerStore> NixMapper<S> {
    // -----------------------------------------------------------------------
    // Public entry points
    // -----------------------------------------------------------------------

    /// Read every block in the store.
    pub fn read_all_blocks(&mut self, cascade: CascadeMode, lazy: bool) -> MapResult<Vec<Block>> {
        let block_type = schema::type_name(EntityKind::Block);
        let roots: Vec<ObjectId> = self
            .store
            .roots()
            .iter()
            .copied()
            .filter(|id| has_type(&self.store, *id, block_type))
            .collect();
        let opts = ReadOptions::new(cascade, lazy);
        let mut blocks = Vec::with_capacity(roots.len());
        for root in roots {
            let path = ObjectPath::root(self.store.header(root)?.name.clone());
            blocks.push(self.block_at(&[root], &path, opts)?);
        }
        debug!(count = blocks.len(), ?cascade, lazy, "blocks read");
        Ok(blocks)
    }

    /// Read every block with the configured cascade and laziness.
    pub fn read_all_blocks_default(&mut self) -> MapResult<Vec<Block>> {
        self.read_all_blocks(self.config.cascade, self.config.lazy)
    }

    pub fn read_block(&mut self, path: &str, cascade: CascadeMode, lazy: bool) -> MapResult<Block> {
        self.read_as(path, cascade, lazy, Self::block_at)
    }

    pub fn read_segment(&mut self, path: &str, cascade: CascadeMode, lazy: bool) -> MapResult<Segment> {
        self.read_as(path, cascade, lazy, Self::segment_at)
    }

    pub fn read_regular_signal(
        &mut self,
        path: &str,
        cascade: CascadeMode,
        lazy: bool,
    ) -> MapResult<RegularSignal> {
        self.read_as(path, cascade, lazy, Self::regular_signal_at)
    }

    pub fn read_irregular_signal(
        &mut self,
        path: &str,
        cascade: CascadeMode,
        lazy: bool,
    ) -> MapResult<IrregularSignal> {
        self.read_as(path, cascade, lazy, Self::irregular_signal_at)
    }

    pub fn read_epoch(&mut self, path: &str, cascade: CascadeMode, lazy: bool) -> MapResult<Epoch> {
        self.read_as(path, cascade, lazy, Self::epoch_at)
    }

    pub fn read_event(&mut self, path: &str, cascade: CascadeMode, lazy: bool) -> MapResult<Event> {
        self.read_as(path, cascade, lazy, Self::event_at)
    }

    pub fn read_spike_series(
        &mut self,
        path: &str,
        cascade: CascadeMode,
        lazy: bool,
    ) -> MapResult<SpikeSeries> {
        self.read_as(path, cascade, lazy, Self::spike_series_at)
    }

    pub fn read_channel_group(
        &mut self,
        path: &str,
        cascade: CascadeMode,
        lazy: bool,
    ) -> MapResult<ChannelGroup> {
        self.read_as(path, cascade, lazy, Self::channel_group_at)
    }

    pub fn read_unit(&mut self, path: &str, cascade: CascadeMode, lazy: bool) -> MapResult<Unit> {
        self.read_as(path, cascade, lazy, Self::unit_at)
    }

    /// Read whatever entity of `kind` lives at `path`.
    pub fn read_entity(
        &mut self,
        kind: EntityKind,
        path: &str,
        cascade: CascadeMode,
        lazy: bool,
    ) -> MapResult<Entity> {
        Ok(match kind {
            EntityKind::Block => self.read_block(path, cascade, lazy)?.into_entity(),
            EntityKind::Segment => self.read_segment(path, cascade, lazy)?.into_entity(),
            EntityKind::RegularSignal => self.read_regular_signal(path, cascade, lazy)?.into_entity(),
            EntityKind::IrregularSignal => {
                self.read_irregular_signal(path, cascade, lazy)?.into_entity()
            }
            EntityKind::Epoch => self.read_epoch(path, cascade, lazy)?.into_entity(),
            EntityKind::Event => self.read_event(path, cascade, lazy)?.into_entity(),
            EntityKind::SpikeSeries => self.read_spike_series(path, cascade, lazy)?.into_entity(),
            EntityKind::ChannelGroup => self.read_channel_group(path, cascade, lazy)?.into_entity(),
            EntityKind::Unit => self.read_unit(path, cascade, lazy)?.into_entity(),
        })
    }

    /// Load a deferred child list in place, one shallow level at a time.
    ///
    /// Loaded and omitted lists are left as they are. On error the list is
    /// unchanged.
    pub fn expand<T: Record>(&mut self, children: &mut Children<T>) -> MapResult<()> {
        let Some(deferred) = children.deferred().cloned() else {
            return Ok(());
        };
        let mut loaded = Vec::with_capacity(deferred.paths.len());
        for path in &deferred.paths {
            let entity = self.read_entity(T::KIND, path, CascadeMode::Shallow, deferred.lazy)?;
            let item = T::from_entity(entity).ok_or_else(|| MapError::Corrupt {
                path: path.clone(),
                reason: format!("expected a {}", T::KIND),
            })?;
            loaded.push(item);
        }
        *children = Children::Loaded(loaded);
        Ok(())
    }

    fn read_as<T: Record>(
        &mut self,
        path: &str,
        cascade: CascadeMode,
        lazy: bool,
        reader: Reader<S, T>,
    ) -> MapResult<T> {
        let parsed = ObjectPath::parse(path)?;
        if parsed.kind() != T::KIND {
            return Err(MapError::InvalidPath {
                path: path.to_string(),
                reason: format!("names a {}, not a {}", parsed.kind(), T::KIND),
            });
        }
        let resolved = path::resolve(&self.store, &parsed)?;
        reader(self, resolved.ids(), &parsed, ReadOptions::new(cascade, lazy))
    }

    // -----------------------------------------------------------------------
    // Shared plumbing
    // -----------------------------------------------------------------------

    /// Handle for `ids`, marking the path lazy when asked to.
    fn bind(&mut self, ids: &[ObjectId], path: &ObjectPath, opts: ReadOptions) -> EntityId {
        if opts.lazy {
            self.lazy_paths.insert(path.to_string());
        }
        self.identity.bind_read(ids, EntityId::fresh())
    }

    fn attributes_of(&self, object: ObjectId) -> MapResult<DecodedAttributes> {
        let header = self.store.header(object)?;
        let section = match header.metadata {
            Some(id) => Some(self.store.section(id)?),
            None => None,
        };
        Ok(codec::decode(header, section))
    }

    /// Children of `parent` in `collection` carrying the type of `label`.
    fn list(
        &self,
        parent: ObjectId,
        parent_path: &ObjectPath,
        label: ContainerLabel,
    ) -> MapResult<Vec<Listed>> {
        let type_name = schema::type_name(label.kind());
        let children = self.store.children(parent, label.collection())?;

        if !label.kind().is_multi_array() {
            return Ok(children
                .iter()
                .copied()
                .filter(|id| has_type(&self.store, *id, type_name))
                .filter_map(|id| {
                    let name = self.store.header(id).ok()?.name.clone();
                    Some(Listed {
                        ids: vec![id],
                        path: parent_path.child(label, name),
                    })
                })
                .collect());
        }

        let mut bases: Vec<String> = Vec::new();
        for id in children {
            if !has_type(&self.store, *id, type_name) {
                continue;
            }
            let header = self.store.header(*id)?;
            if let Some((base, _)) = path::split_channel_suffix(&header.name) {
                if !bases.iter().any(|b| b == base) {
                    bases.push(base.to_string());
                }
            }
        }
        let mut listed = Vec::with_capacity(bases.len());
        for base in bases {
            let ids = path::signal_arrays(&self.store, parent, &base, type_name)?;
            if ids.is_empty() {
                continue;
            }
            listed.push(Listed {
                ids,
                path: parent_path.child(label, base),
            });
        }
        Ok(listed)
    }

    /// Build a child list per the cascade mode.
    fn read_children<T>(
        &mut self,
        listed: Vec<Listed>,
        opts: ReadOptions,
        reader: Reader<S, T>,
    ) -> MapResult<Children<T>> {
        let paths: Vec<String> = listed.iter().map(|l| l.path.to_string()).collect();
        opts.children(
            || paths,
            || {
                listed
                    .iter()
                    .map(|l| reader(self, &l.ids, &l.path, opts))
                    .collect()
            },
        )
    }

    /// The block group owning `object`.
    fn root_of(&self, object: ObjectId) -> MapResult<ObjectId> {
        let mut current = object;
        while let Some(owner) = self.store.header(current)?.owner {
            current = owner;
        }
        Ok(current)
    }

    // -----------------------------------------------------------------------
    // Containers
    // -----------------------------------------------------------------------

    fn block_at(&mut self, ids: &[ObjectId], path: &ObjectPath, opts: ReadOptions) -> MapResult<Block> {
        let root = single(ids, path)?;
        let decoded = self.attributes_of(root)?;
        let mut block = Block::with_attributes(decoded.attrs);
        block.id = self.bind(ids, path, opts);
        block.rec_datetime = decoded.created_at;
        block.file_datetime = decoded.file_datetime;

        let segments = self.list(root, path, ContainerLabel::Segments)?;
        block.segments = self.read_children(segments, opts, Self::segment_at)?;
        let groups = self.list(root, path, ContainerLabel::ChannelGroups)?;
        block.channel_groups = self.read_children(groups, opts, Self::channel_group_at)?;
        Ok(block)
    }

    fn segment_at(
        &mut self,
        ids: &[ObjectId],
        path: &ObjectPath,
        opts: ReadOptions,
    ) -> MapResult<Segment> {
        let group = single(ids, path)?;
        let decoded = self.attributes_of(group)?;
        let mut segment = Segment::with_attributes(decoded.attrs);
        segment.id = self.bind(ids, path, opts);
        segment.rec_datetime = decoded.created_at;
        segment.file_datetime = decoded.file_datetime;

        let listed = self.list(group, path, ContainerLabel::RegularSignals)?;
        segment.regular_signals = self.read_children(listed, opts, Self::regular_signal_at)?;
        let listed = self.list(group, path, ContainerLabel::IrregularSignals)?;
        segment.irregular_signals = self.read_children(listed, opts, Self::irregular_signal_at)?;
        let listed = self.list(group, path, ContainerLabel::Epochs)?;
        segment.epochs = self.read_children(listed, opts, Self::epoch_at)?;
        let listed = self.list(group, path, ContainerLabel::Events)?;
        segment.events = self.read_children(listed, opts, Self::event_at)?;
        let listed = self.list(group, path, ContainerLabel::SpikeSeries)?;
        segment.spike_series = self.read_children(listed, opts, Self::spike_series_at)?;
        Ok(segment)
    }

    // -----------------------------------------------------------------------
    // Signals
    // -----------------------------------------------------------------------

    /// Attributes shared by a signal's arrays; all must hang off one section.
    fn signal_attributes(&self, ids: &[ObjectId], path: &ObjectPath) -> MapResult<DecodedAttributes> {
        let first = single(ids, path)?;
        let header = self.store.header(first)?;
        for id in &ids[1..] {
            let other = self.store.header(*id)?;
            if other.metadata != header.metadata {
                return Err(MapError::MetadataConsistency {
                    signal: path.to_string(),
                    array: other.name.clone(),
                });
            }
        }
        let section = match header.metadata {
            Some(id) => Some(self.store.section(id)?),
            None => None,
        };
        Ok(codec::decode_named(path.name(), header, section))
    }

    /// Stack per-channel arrays into a `(channels, samples)` payload.
    fn signal_payload(&self, ids: &[ObjectId]) -> MapResult<NdArray> {
        let rows = ids
            .iter()
            .map(|id| Ok(self.store.array(*id)?.data.values().to_vec()))
            .collect::<MapResult<Vec<_>>>()?;
        Ok(NdArray::from_rows(rows)?)
    }

    fn regular_signal_at(
        &mut self,
        ids: &[ObjectId],
        path: &ObjectPath,
        opts: ReadOptions,
    ) -> MapResult<RegularSignal> {
        let decoded = self.signal_attributes(ids, path)?;
        let first = self.store.array(single(ids, path)?)?;
        let Some(Dimension::Sampled {
            interval,
            offset,
            unit,
            ..
        }) = first.dimensions.first()
        else {
            return Err(corrupt(path, "first dimension is not sampled"));
        };
        let (sampling_period, t_start, time_units) = (*interval, *offset, unit.clone());
        let units = first.unit.clone();
        let data = if opts.lazy {
            NdArray::placeholder(2)
        } else {
            self.signal_payload(ids)?
        };
        Ok(RegularSignal {
            id: self.bind(ids, path, opts),
            attrs: decoded.attrs,
            data,
            units,
            time_units,
            t_start,
            sampling_period,
        })
    }

    fn irregular_signal_at(
        &mut self,
        ids: &[ObjectId],
        path: &ObjectPath,
        opts: ReadOptions,
    ) -> MapResult<IrregularSignal> {
        let decoded = self.signal_attributes(ids, path)?;
        let first = self.store.array(single(ids, path)?)?;
        let Some(Dimension::Range { ticks, unit, .. }) = first.dimensions.first() else {
            return Err(corrupt(path, "first dimension is not a range"));
        };
        let times = if opts.lazy { Vec::new() } else { ticks.clone() };
        let time_units = unit.clone();
        let units = first.unit.clone();
        let data = if opts.lazy {
            NdArray::placeholder(2)
        } else {
            self.signal_payload(ids)?
        };
        Ok(IrregularSignal {
            id: self.bind(ids, path, opts),
            attrs: decoded.attrs,
            data,
            units,
            times,
            time_units,
        })
    }

    // -----------------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------------

    /// Times, units and labels from a tag's positions array.
    fn positions_of(
        &self,
        tag: ObjectId,
        opts: ReadOptions,
    ) -> MapResult<(Vec<f64>, Option<String>, Vec<String>)> {
        let positions = self.store.array(self.store.tag(tag)?.positions)?;
        if opts.lazy {
            return Ok((Vec::new(), positions.unit.clone(), Vec::new()));
        }
        let labels = match positions.dimensions.first() {
            Some(Dimension::Set { labels }) => labels.clone(),
            _ => Vec::new(),
        };
        Ok((
            positions.data.values().to_vec(),
            positions.unit.clone(),
            labels,
        ))
    }

    fn epoch_at(&mut self, ids: &[ObjectId], path: &ObjectPath, opts: ReadOptions) -> MapResult<Epoch> {
        let tag = single(ids, path)?;
        let decoded = self.attributes_of(tag)?;
        let (times, time_units, labels) = self.positions_of(tag, opts)?;
        let Some(extents) = self.store.tag(tag)?.extents else {
            return Err(corrupt(path, "epoch without extents"));
        };
        let extents = self.store.array(extents)?;
        let durations = if opts.lazy {
            Vec::new()
        } else {
            extents.data.values().to_vec()
        };
        let duration_units = extents.unit.clone();
        Ok(Epoch {
            id: self.bind(ids, path, opts),
            attrs: decoded.attrs,
            times,
            time_units,
            durations,
            duration_units,
            labels,
        })
    }

    fn event_at(&mut self, ids: &[ObjectId], path: &ObjectPath, opts: ReadOptions) -> MapResult<Event> {
        let tag = single(ids, path)?;
        let decoded = self.attributes_of(tag)?;
        let (times, time_units, labels) = self.positions_of(tag, opts)?;
        Ok(Event {
            id: self.bind(ids, path, opts),
            attrs: decoded.attrs,
            times,
            time_units,
            labels,
        })
    }

    fn spike_series_at(
        &mut self,
        ids: &[ObjectId],
        path: &ObjectPath,
        opts: ReadOptions,
    ) -> MapResult<SpikeSeries> {
        let tag = single(ids, path)?;
        let decoded = self.attributes_of(tag)?;
        let (times, time_units, _) = self.positions_of(tag, opts)?;

        let stored = self.store.tag(tag)?;
        let section = match stored.header.metadata {
            Some(id) => Some(self.store.section(id)?),
            None => None,
        };
        let float = |key: &str| section.and_then(|s| s.value(key)).and_then(PropertyValue::as_float);
        let t_start = float(codec::T_START);
        let Some(t_stop) = float(codec::T_STOP) else {
            return Err(corrupt(path, "spike series without t_stop"));
        };

        let waveforms = match stored.features.iter().find(|f| f.link == LinkType::Indexed) {
            Some(feature) => Some(self.waveforms_of(feature.data, path, opts)?),
            None => None,
        };

        Ok(SpikeSeries {
            id: self.bind(ids, path, opts),
            attrs: decoded.attrs,
            times,
            time_units,
            t_start,
            t_stop,
            waveforms,
        })
    }

    fn waveforms_of(&self, array: ObjectId, path: &ObjectPath, opts: ReadOptions) -> MapResult<Waveforms> {
        let array = self.store.array(array)?;
        let Some(Dimension::Sampled {
            interval, unit, ..
        }) = array.dimensions.get(2)
        else {
            return Err(corrupt(path, "waveforms without a sampled third dimension"));
        };
        let left_sweep = match array.header.metadata {
            Some(id) => self
                .store
                .section(id)?
                .value(codec::LEFT_SWEEP)
                .and_then(PropertyValue::as_float),
            None => None,
        };
        Ok(Waveforms {
            data: if opts.lazy {
                NdArray::placeholder(3)
            } else {
                array.data.clone()
            },
            units: array.unit.clone(),
            sampling_period: *interval,
            time_units: unit.clone(),
            left_sweep,
        })
    }

    // -----------------------------------------------------------------------
    // Channel groups and units
    // -----------------------------------------------------------------------

    fn channel_group_at(
        &mut self,
        ids: &[ObjectId],
        path: &ObjectPath,
        opts: ReadOptions,
    ) -> MapResult<ChannelGroup> {
        let source = single(ids, path)?;
        let decoded = self.attributes_of(source)?;
        let mut group = ChannelGroup::new(String::new(), Vec::new());
        group.attrs = decoded.attrs;
        group.id = self.bind(ids, path, opts);

        let mut coordinates = Vec::new();
        let mut coordinate_units = None;
        let mut complete_coordinates = true;
        for channel in self.store.children(source, Collection::Sources)? {
            if !has_type(&self.store, *channel, TYPE_CHANNEL) {
                continue;
            }
            let header = self.store.header(*channel)?;
            let section = match header.metadata {
                Some(id) => self.store.section(id)?,
                None => return Err(corrupt(path, format!("channel {} without metadata", header.name))),
            };
            let Some(index) = section.value(codec::INDEX).and_then(PropertyValue::as_int) else {
                return Err(corrupt(path, format!("channel {} without index", header.name)));
            };
            group.channel_indexes.push(index);
            group.channel_names.push(header.name.clone());
            match section.property(codec::COORDINATES) {
                Some(property) => {
                    coordinates.push(property.values.iter().filter_map(PropertyValue::as_float).collect());
                    if coordinate_units.is_none() {
                        coordinate_units = section
                            .value(codec::COORDINATES_UNITS)
                            .and_then(PropertyValue::as_text)
                            .map(str::to_string);
                    }
                }
                None => complete_coordinates = false,
            }
        }
        if complete_coordinates && !coordinates.is_empty() {
            group.coordinates = Some(Coordinates {
                values: coordinates,
                units: coordinate_units.unwrap_or_default(),
            });
        }

        let units = self.list(source, path, ContainerLabel::Units)?;
        group.units = self.read_children(units, opts, Self::unit_at)?;

        if opts.cascade.resolves_references() {
            let root = self.root_of(source)?;
            group.regular_signals = self.signals_sourced_by(root, source, EntityKind::RegularSignal)?;
            group.irregular_signals = self.signals_sourced_by(root, source, EntityKind::IrregularSignal)?;
        }
        Ok(group)
    }

    /// Handles of the signals under `root` whose arrays list `source`.
    fn signals_sourced_by(
        &mut self,
        root: ObjectId,
        source: ObjectId,
        kind: EntityKind,
    ) -> MapResult<Vec<EntityId>> {
        let type_name = schema::type_name(kind);
        let mut bases: Vec<String> = Vec::new();
        for id in self.store.children(root, Collection::Arrays)? {
            let array = self.store.array(*id)?;
            if array.header.type_name != type_name || !array.sources.contains(&source) {
                continue;
            }
            if let Some((base, _)) = path::split_channel_suffix(&array.header.name) {
                if !bases.iter().any(|b| b == base) {
                    bases.push(base.to_string());
                }
            }
        }
        let mut handles = Vec::with_capacity(bases.len());
        for base in bases {
            let arrays = path::signal_arrays(&self.store, root, &base, type_name)?;
            handles.push(self.identity.bind_read(&arrays, EntityId::fresh()));
        }
        Ok(handles)
    }

    fn unit_at(&mut self, ids: &[ObjectId], path: &ObjectPath, opts: ReadOptions) -> MapResult<Unit> {
        let source = single(ids, path)?;
        let decoded = self.attributes_of(source)?;
        let mut unit = Unit::new(String::new());
        unit.attrs = decoded.attrs;
        unit.id = self.bind(ids, path, opts);

        if opts.cascade.resolves_references() {
            let root = self.root_of(source)?;
            let spikes_type = schema::type_name(EntityKind::SpikeSeries);
            let tags: Vec<ObjectId> = self
                .store
                .children(root, Collection::Tags)?
                .iter()
                .copied()
                .filter(|id| {
                    self.store.tag(*id).is_ok_and(|t| {
                        t.header.type_name == spikes_type && t.sources.contains(&source)
                    })
                })
                .collect();
            unit.spike_series = tags
                .into_iter()
                .map(|tag| self.identity.bind_read(&[tag], EntityId::fresh()))
                .collect();
        }
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{recorded_at, rich_block, scenario_block};
    use spindle_store::MemoryStore;
    use spindle_types::{AnnotationValue, Deferred};

    const V: &str = "/B1/segments/S1/regularsignals/V";

    fn written(block: &Block) -> NixMapper<MemoryStore> {
        let mut m = NixMapper::new(MemoryStore::new());
        m.write_block(block).unwrap();
        m
    }

    fn full_block(m: &mut NixMapper<MemoryStore>) -> Block {
        m.read_block("/B1", CascadeMode::Full, false).unwrap()
    }

    // -----------------------------------------------------------------------
    // Round trip
    // -----------------------------------------------------------------------

    #[test]
    fn rich_block_roundtrips() {
        let input = rich_block();
        let mut m = written(&input);
        let block = full_block(&mut m);

        assert_eq!(block.attrs, input.attrs);
        assert_eq!(block.rec_datetime, Some(recorded_at()));
        assert_eq!(block.file_datetime, Some(recorded_at()));

        let segments = block.segments.loaded().unwrap();
        assert_eq!(segments.len(), 2);
        let s1 = &segments[0];
        assert_eq!(s1.attrs.name.as_deref(), Some("S1"));
        assert_eq!(s1.attrs.annotations.get("trial"), Some(&AnnotationValue::Int(1)));

        let input_s1 = &input.segments.loaded().unwrap()[0];
        let v = &s1.regular_signals.loaded().unwrap()[0];
        let input_v = &input_s1.regular_signals.loaded().unwrap()[0];
        assert_eq!(v.attrs, input_v.attrs);
        assert_eq!(v.data, input_v.data);
        assert_eq!(v.units.as_deref(), Some("mV"));
        assert_eq!(v.time_units.as_deref(), Some("s"));
        assert_eq!(v.t_start, 1.5);
        assert_eq!(v.sampling_period, 0.1);

        let i = &s1.irregular_signals.loaded().unwrap()[0];
        let input_i = &input_s1.irregular_signals.loaded().unwrap()[0];
        assert_eq!(i.times, input_i.times);
        assert_eq!(i.data, input_i.data);
        assert_eq!(i.units.as_deref(), Some("pA"));

        let epoch = &s1.epochs.loaded().unwrap()[0];
        let input_epoch = &input_s1.epochs.loaded().unwrap()[0];
        assert_eq!(epoch.times, input_epoch.times);
        assert_eq!(epoch.durations, input_epoch.durations);
        assert_eq!(epoch.labels, input_epoch.labels);
        assert_eq!(epoch.duration_units.as_deref(), Some("ms"));

        let event = &s1.events.loaded().unwrap()[0];
        assert_eq!(event.labels, vec!["stim".to_string()]);
        assert_eq!(event.times, vec![0.2]);

        let spikes = &s1.spike_series.loaded().unwrap()[0];
        let input_spikes = &input_s1.spike_series.loaded().unwrap()[0];
        assert_eq!(spikes.times, input_spikes.times);
        assert_eq!(spikes.t_start, Some(0.0));
        assert_eq!(spikes.t_stop, 0.5);
        assert_eq!(spikes.waveforms, input_spikes.waveforms);

        let late = &segments[1].spike_series.loaded().unwrap()[0];
        assert_eq!(late.t_start, None);
        assert_eq!(late.t_stop, 2.0);

        let group = &block.channel_groups.loaded().unwrap()[0];
        let input_group = &input.channel_groups.loaded().unwrap()[0];
        assert_eq!(group.attrs, input_group.attrs);
        assert_eq!(group.channel_indexes, vec![0, 1, 2]);
        assert_eq!(group.channel_names, input_group.channel_names);
        assert_eq!(group.coordinates, input_group.coordinates);
        assert_eq!(group.units.loaded().unwrap()[0].attrs.name.as_deref(), Some("u1"));
    }

    #[test]
    fn scenario_signal_reads_back_as_three_by_eight() {
        let mut m = written(&scenario_block());
        let signal = m.read_regular_signal(V, CascadeMode::Full, false).unwrap();
        assert_eq!(signal.data.shape(), &[3, 8]);
        assert_eq!(signal.data.row(2).unwrap()[7], 207.0);
        assert_eq!(signal.sampling_period, 0.1);
        assert_eq!(signal.t_start, 0.0);
        assert_eq!(signal.time_units.as_deref(), Some("s"));
    }

    #[test]
    fn references_point_at_read_handles() {
        let mut m = written(&rich_block());
        let block = full_block(&mut m);
        let segments = block.segments.loaded().unwrap();
        let s1 = &segments[0];
        let group = &block.channel_groups.loaded().unwrap()[0];

        assert_eq!(group.regular_signals, vec![s1.regular_signals.loaded().unwrap()[0].id]);
        assert_eq!(group.irregular_signals, vec![s1.irregular_signals.loaded().unwrap()[0].id]);

        let unit = &group.units.loaded().unwrap()[0];
        assert_eq!(
            unit.spike_series,
            vec![
                s1.spike_series.loaded().unwrap()[0].id,
                segments[1].spike_series.loaded().unwrap()[0].id,
            ]
        );
        assert!(block.regular_signal(group.regular_signals[0]).is_some());
    }

    #[test]
    fn shallow_unit_binds_spike_handles_on_demand() {
        let mut m = written(&rich_block());
        let unit = m
            .read_unit("/B1/channelgroups/G/units/u1", CascadeMode::Shallow, false)
            .unwrap();
        assert_eq!(unit.spike_series.len(), 2);

        let spikes = m
            .read_spike_series("/B1/segments/S1/spikeseries/st", CascadeMode::Full, false)
            .unwrap();
        assert_eq!(spikes.id, unit.spike_series[0]);
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    #[test]
    fn rereading_yields_same_handles() {
        let mut m = written(&rich_block());
        let first = full_block(&mut m);
        let second = full_block(&mut m);
        assert_eq!(first.id, second.id);
        assert_eq!(first, second);

        let again = m.read_regular_signal(V, CascadeMode::Full, false).unwrap();
        let s1 = &first.segments.loaded().unwrap()[0];
        assert_eq!(again.id, s1.regular_signals.loaded().unwrap()[0].id);
    }

    // -----------------------------------------------------------------------
    // Cascade and laziness
    // -----------------------------------------------------------------------

    #[test]
    fn lazy_read_leaves_placeholders_then_full_read_fills_them() {
        let mut m = written(&rich_block());
        let block = m.read_block("/B1", CascadeMode::Full, true).unwrap();
        let s1 = &block.segments.loaded().unwrap()[0];

        let v = &s1.regular_signals.loaded().unwrap()[0];
        assert!(v.data.is_empty());
        assert_eq!(v.data.shape().len(), 2);
        assert_eq!(v.units.as_deref(), Some("mV"));
        assert_eq!(v.sampling_period, 0.1);

        let spikes = &s1.spike_series.loaded().unwrap()[0];
        assert!(spikes.times.is_empty());
        let waveforms = spikes.waveforms.as_ref().unwrap();
        assert_eq!(waveforms.data.shape().len(), 3);
        assert!(waveforms.data.is_empty());
        assert_eq!(waveforms.left_sweep, Some(0.002));

        assert!(m.lazy_paths().contains(V));
        assert!(m.lazy_paths().contains("/B1"));

        let full = m.read_regular_signal(V, CascadeMode::Full, false).unwrap();
        assert_eq!(full.id, v.id);
        assert_eq!(full.data.shape(), &[3, 5]);
    }

    #[test]
    fn shallow_read_defers_and_expand_loads() {
        let mut m = written(&rich_block());
        let mut block = m.read_block("/B1", CascadeMode::Shallow, false).unwrap();
        assert_eq!(
            block.segments.deferred().unwrap().paths,
            vec!["/B1/segments/S1".to_string(), "/B1/segments/S2".to_string()]
        );
        assert_eq!(
            block.channel_groups.deferred().unwrap().paths,
            vec!["/B1/channelgroups/G".to_string()]
        );

        m.expand(&mut block.segments).unwrap();
        let segments = block.segments.loaded().unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(
            segments[0].regular_signals.deferred().unwrap().paths,
            vec![V.to_string()]
        );

        let mut signals = segments[0].regular_signals.clone();
        m.expand(&mut signals).unwrap();
        assert_eq!(signals.loaded().unwrap()[0].data.shape(), &[3, 5]);
    }

    #[test]
    fn failed_expand_leaves_list_deferred() {
        let mut m = written(&rich_block());
        let mut children: Children<Segment> = Children::Deferred(Deferred {
            paths: vec!["/B1/segments/S1".into(), "/B1/segments/gone".into()],
            lazy: false,
        });
        assert!(matches!(
            m.expand(&mut children),
            Err(MapError::NotFound { .. })
        ));
        assert_eq!(children.deferred().unwrap().paths.len(), 2);
    }

    #[test]
    fn cascade_none_omits_children_and_references() {
        let mut m = written(&rich_block());
        let block = m.read_block("/B1", CascadeMode::None, false).unwrap();
        assert!(block.segments.is_omitted());
        assert!(block.channel_groups.is_omitted());

        let group = m
            .read_channel_group("/B1/channelgroups/G", CascadeMode::None, false)
            .unwrap();
        assert!(group.units.is_omitted());
        assert!(group.regular_signals.is_empty());
        assert_eq!(group.channel_indexes, vec![0, 1, 2]);
    }

    // -----------------------------------------------------------------------
    // Errors
    // -----------------------------------------------------------------------

    #[test]
    fn split_metadata_is_a_consistency_error() {
        let mut m = written(&scenario_block());
        let root = m.store().find_root("B1").unwrap();
        let stray = m.store.create_section(None, "stray", "stray").unwrap();
        let second = m
            .store()
            .find_child(root, Collection::Arrays, "V.1")
            .unwrap()
            .unwrap();
        m.store.set_metadata(second, Some(stray)).unwrap();

        match m.read_regular_signal(V, CascadeMode::Full, false) {
            Err(MapError::MetadataConsistency { signal, array }) => {
                assert_eq!(signal, V);
                assert_eq!(array, "V.1");
            }
            other => panic!("expected MetadataConsistency, got {other:?}"),
        }
    }

    #[test]
    fn missing_paths_are_not_found() {
        let mut m = written(&scenario_block());
        for path in ["/B2", "/B1/segments/S9", "/B1/segments/S1/regularsignals/W"] {
            match m.read_entity(ObjectPath::parse(path).unwrap().kind(), path, CascadeMode::Full, false) {
                Err(MapError::NotFound { path: missing }) => assert_eq!(missing, path),
                other => panic!("expected NotFound for {path}, got {other:?}"),
            }
        }
    }

    #[test]
    fn path_of_another_kind_is_rejected() {
        let mut m = written(&scenario_block());
        assert!(matches!(
            m.read_segment("/B1", CascadeMode::Full, false),
            Err(MapError::InvalidPath { .. })
        ));
        assert!(matches!(
            m.read_entity(EntityKind::Epoch, V, CascadeMode::Full, false),
            Err(MapError::InvalidPath { .. })
        ));
    }
}
