//! Write rules: record entities to container objects.
//!
//! One write pass walks a block top-down. Every entity mediates its name
//! against the names already claimed in this pass, then creates or fetches
//! the container under that name, so re-writing a block reuses its
//! containers. Containers left unclaimed at the end of the pass are
//! reconciled away: references are unlinked from segment groups, owned
//! objects are deleted. Reconciliation is skipped when any child list of the
//! block is deferred or omitted, since the pass then cannot know what still
//! belongs. Source links on reused arrays and tags are only rebuilt when the
//! channel groups and all their units are loaded; otherwise they are kept.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use spindle_store::{
    Collection, ContainerStore, Dimension, Feature, LinkType, ObjectId, PropertyValue, SectionId,
};
use spindle_types::{
    Attributes, Block, ChannelGroup, Children, EntityId, EntityKind, Epoch, Event,
    IrregularSignal, NdArray, RegularSignal, Segment, SpikeSeries, Unit,
};
use tracing::debug;

use crate::codec;
use crate::diagnostics::Outcome;
use crate::error::MapResult;
use crate::identity::Mapped;
use crate::mapper::NixMapper;
use crate::names;
use crate::path::{build_path, has_type, ContainerLabel, ObjectPath};
use crate::schema::{self, TYPE_CHANNEL, TYPE_WAVEFORMS};

const TIME_LABEL: &str = "time";

/// Where a block is being written.
struct BlockCtx {
    root: ObjectId,
    section: SectionId,
    path: String,
    complete: bool,
    relink_sources: bool,
}

/// Where a segment is being written.
struct SegmentCtx {
    root: ObjectId,
    group: ObjectId,
    section: SectionId,
    path: String,
    relink_sources: bool,
}

impl<S: ContainerStore> NixMapper<S> {
    /// Write one block, creating or refreshing its containers.
    pub fn write_block(&mut self, block: &Block) -> MapResult<Outcome<ObjectId>> {
        self.begin_pass();
        let root = self.write_block_pass(block);
        let diagnostics = self.sink.take();
        Ok(Outcome::new(root?, diagnostics))
    }

    /// Write several blocks in one pass; equal block names are mediated.
    ///
    /// The identity map keeps every entity written by the call until it
    /// returns.
    pub fn write_all_blocks(&mut self, blocks: &[Block]) -> MapResult<Outcome<Vec<ObjectId>>> {
        self.begin_pass();
        let mut roots = Vec::with_capacity(blocks.len());
        for block in blocks {
            match self.write_block_pass(block) {
                Ok(root) => roots.push(root),
                Err(e) => {
                    self.sink.take();
                    return Err(e);
                }
            }
        }
        Ok(Outcome::new(roots, self.sink.take()))
    }

    fn begin_pass(&mut self) {
        self.claims.clear();
        self.identity.clear_written();
        self.sink.take();
    }

    fn write_block_pass(&mut self, block: &Block) -> MapResult<ObjectId> {
        let kind = EntityKind::Block;
        let type_name = schema::type_name(kind);
        let name = self.mediate_claim(None, Collection::Groups, &block.attrs, kind)?;
        let root = match self.store.find_root(&name) {
            Some(id) => {
                debug!(name = %name, "block reused");
                id
            }
            None => self.store.create_root(&name, type_name)?,
        };
        let path = ObjectPath::root(&name).to_string();
        let section = self.section_for(Some(root), None, &name, type_name)?;
        self.write_attributes(
            &[root],
            section,
            type_name,
            &block.attrs,
            block.rec_datetime,
            block.file_datetime,
            &path,
        )?;
        self.identity
            .register_written(block.id, Mapped::Object(root), path.as_str());

        let ctx = BlockCtx {
            root,
            section,
            path,
            complete: is_complete(block),
            relink_sources: sources_loaded(block),
        };

        for segment in block.segments.iter() {
            self.write_segment(&ctx, segment)?;
        }
        if ctx.complete {
            self.sweep(root, Collection::Groups)?;
            self.sweep(root, Collection::Tags)?;
            self.sweep(root, Collection::Arrays)?;
        }

        for group in block.channel_groups.iter() {
            self.write_channel_group(&ctx, group)?;
        }
        if ctx.complete {
            self.sweep(root, Collection::Sources)?;
        }

        debug!(path = %ctx.path, written = self.identity.written_len(), "block written");
        Ok(root)
    }

    // -----------------------------------------------------------------------
    // Segments
    // -----------------------------------------------------------------------

    fn write_segment(&mut self, ctx: &BlockCtx, segment: &Segment) -> MapResult<ObjectId> {
        let kind = EntityKind::Segment;
        let type_name = schema::type_name(kind);
        let name = self.mediate_claim(Some(ctx.root), Collection::Groups, &segment.attrs, kind)?;
        let group = match self.store.find_child(ctx.root, Collection::Groups, &name)? {
            Some(id) => id,
            None => self.store.create_group(ctx.root, &name, type_name)?,
        };
        let path = build_path(&ctx.path, ContainerLabel::Segments, &name);
        let section = self.section_for(Some(group), Some(ctx.section), &name, type_name)?;
        self.write_attributes(
            &[group],
            section,
            type_name,
            &segment.attrs,
            segment.rec_datetime,
            segment.file_datetime,
            &path,
        )?;
        self.identity
            .register_written(segment.id, Mapped::Object(group), path.as_str());

        let seg = SegmentCtx {
            root: ctx.root,
            group,
            section,
            path,
            relink_sources: ctx.relink_sources,
        };

        let mut kept_arrays = HashSet::new();
        for signal in segment.regular_signals.iter() {
            kept_arrays.extend(self.write_regular_signal(&seg, signal)?);
        }
        for signal in segment.irregular_signals.iter() {
            kept_arrays.extend(self.write_irregular_signal(&seg, signal)?);
        }
        let mut preserved = Vec::new();
        if segment.regular_signals.loaded().is_none() {
            preserved.push(schema::type_name(EntityKind::RegularSignal));
        }
        if segment.irregular_signals.loaded().is_none() {
            preserved.push(schema::type_name(EntityKind::IrregularSignal));
        }
        self.unlink_stale(group, Collection::Arrays, &kept_arrays, &preserved)?;

        // Epochs and events annotate every signal of their segment.
        let signal_refs: Vec<ObjectId> = self
            .store
            .children(group, Collection::Arrays)?
            .iter()
            .copied()
            .filter(|id| {
                self.store
                    .header(*id)
                    .is_ok_and(|h| schema::is_signal_type(&h.type_name))
            })
            .collect();

        let mut kept_tags = HashSet::new();
        for epoch in segment.epochs.iter() {
            kept_tags.insert(self.write_epoch(&seg, epoch, &signal_refs)?);
        }
        for event in segment.events.iter() {
            kept_tags.insert(self.write_event(&seg, event, &signal_refs)?);
        }
        for spikes in segment.spike_series.iter() {
            kept_tags.insert(self.write_spike_series(&seg, spikes)?);
        }
        let mut preserved = Vec::new();
        if segment.epochs.loaded().is_none() {
            preserved.push(schema::type_name(EntityKind::Epoch));
        }
        if segment.events.loaded().is_none() {
            preserved.push(schema::type_name(EntityKind::Event));
        }
        if segment.spike_series.loaded().is_none() {
            preserved.push(schema::type_name(EntityKind::SpikeSeries));
        }
        self.unlink_stale(group, Collection::Tags, &kept_tags, &preserved)?;

        Ok(group)
    }

    // -----------------------------------------------------------------------
    // Signals
    // -----------------------------------------------------------------------

    fn write_regular_signal(
        &mut self,
        seg: &SegmentCtx,
        signal: &RegularSignal,
    ) -> MapResult<Vec<ObjectId>> {
        let kind = EntityKind::RegularSignal;
        let name = self.mediate_claim(Some(seg.root), Collection::Arrays, &signal.attrs, kind)?;
        let path = build_path(&seg.path, ContainerLabel::RegularSignals, &name);
        let dimensions = vec![
            Dimension::Sampled {
                interval: signal.sampling_period,
                offset: signal.t_start,
                unit: signal.time_units.clone(),
                label: Some(TIME_LABEL.to_string()),
            },
            Dimension::set(),
        ];
        let ids = self.write_signal_arrays(
            seg,
            &name,
            kind,
            &signal.data,
            signal.units.as_deref(),
            dimensions,
            &signal.attrs,
            &path,
        )?;
        self.identity
            .register_written(signal.id, Mapped::Arrays(ids.clone()), path.as_str());
        Ok(ids)
    }

    fn write_irregular_signal(
        &mut self,
        seg: &SegmentCtx,
        signal: &IrregularSignal,
    ) -> MapResult<Vec<ObjectId>> {
        let kind = EntityKind::IrregularSignal;
        let name = self.mediate_claim(Some(seg.root), Collection::Arrays, &signal.attrs, kind)?;
        let path = build_path(&seg.path, ContainerLabel::IrregularSignals, &name);
        let dimensions = vec![
            Dimension::Range {
                ticks: signal.times.clone(),
                unit: signal.time_units.clone(),
                label: Some(TIME_LABEL.to_string()),
            },
            Dimension::set(),
        ];
        let ids = self.write_signal_arrays(
            seg,
            &name,
            kind,
            &signal.data,
            signal.units.as_deref(),
            dimensions,
            &signal.attrs,
            &path,
        )?;
        self.identity
            .register_written(signal.id, Mapped::Arrays(ids.clone()), path.as_str());
        Ok(ids)
    }

    /// One `(samples, 1)` array per channel, all sharing one section.
    #[allow(clippy::too_many_arguments)]
    fn write_signal_arrays(
        &mut self,
        seg: &SegmentCtx,
        name: &str,
        kind: EntityKind,
        data: &NdArray,
        units: Option<&str>,
        dimensions: Vec<Dimension>,
        attrs: &Attributes,
        path: &str,
    ) -> MapResult<Vec<ObjectId>> {
        if data.outer_len() == 0 {
            debug!(path = %path, "signal without channels; nothing written");
            return Ok(Vec::new());
        }
        let type_name = schema::type_name(kind);
        let first = self
            .store
            .find_child(seg.root, Collection::Arrays, &format!("{name}.0"))?;
        let section = self.section_for(first, Some(seg.section), name, type_name)?;

        let mut ids = Vec::with_capacity(data.outer_len());
        for (index, channel) in data.rows().enumerate() {
            let samples = NdArray::new(vec![channel.len(), 1], channel.to_vec())?;
            let id = self.upsert_array(seg, &format!("{name}.{index}"), type_name, samples)?;
            let array = self.store.array_mut(id)?;
            array.unit = units.map(str::to_string);
            array.dimensions = dimensions.clone();
            self.store
                .append_reference(seg.group, Collection::Arrays, id)?;
            ids.push(id);
        }
        self.write_attributes(&ids, section, type_name, attrs, None, None, path)?;
        Ok(ids)
    }

    // -----------------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------------

    fn write_epoch(
        &mut self,
        seg: &SegmentCtx,
        epoch: &Epoch,
        signal_refs: &[ObjectId],
    ) -> MapResult<ObjectId> {
        let kind = EntityKind::Epoch;
        let type_name = schema::type_name(kind);
        let name = self.mediate_claim(Some(seg.root), Collection::Tags, &epoch.attrs, kind)?;
        let path = build_path(&seg.path, ContainerLabel::Epochs, &name);

        let positions = self.write_positions(seg, &name, kind, &epoch.times, &epoch.time_units, &epoch.labels)?;
        let extents = self.upsert_array(
            seg,
            &format!("{name}.durations"),
            &schema::extents_type(kind),
            NdArray::vector(epoch.durations.clone()),
        )?;
        let array = self.store.array_mut(extents)?;
        array.unit = epoch.duration_units.clone();
        array.dimensions = vec![Dimension::set()];

        let tag = self.upsert_tag(seg, &name, type_name, positions)?;
        let stored = self.store.tag_mut(tag)?;
        stored.extents = Some(extents);
        stored.references = signal_refs.to_vec();

        self.finish_tag(seg, tag, &name, kind, &epoch.attrs, &path, epoch.id)?;
        Ok(tag)
    }

    fn write_event(
        &mut self,
        seg: &SegmentCtx,
        event: &Event,
        signal_refs: &[ObjectId],
    ) -> MapResult<ObjectId> {
        let kind = EntityKind::Event;
        let type_name = schema::type_name(kind);
        let name = self.mediate_claim(Some(seg.root), Collection::Tags, &event.attrs, kind)?;
        let path = build_path(&seg.path, ContainerLabel::Events, &name);

        let positions = self.write_positions(seg, &name, kind, &event.times, &event.time_units, &event.labels)?;
        let tag = self.upsert_tag(seg, &name, type_name, positions)?;
        self.store.tag_mut(tag)?.references = signal_refs.to_vec();

        self.finish_tag(seg, tag, &name, kind, &event.attrs, &path, event.id)?;
        Ok(tag)
    }

    fn write_spike_series(&mut self, seg: &SegmentCtx, spikes: &SpikeSeries) -> MapResult<ObjectId> {
        let kind = EntityKind::SpikeSeries;
        let type_name = schema::type_name(kind);
        let name = self.mediate_claim(Some(seg.root), Collection::Tags, &spikes.attrs, kind)?;
        let path = build_path(&seg.path, ContainerLabel::SpikeSeries, &name);

        let positions = self.write_positions(seg, &name, kind, &spikes.times, &spikes.time_units, &[])?;
        let tag = self.upsert_tag(seg, &name, type_name, positions)?;
        let section = self.finish_tag(seg, tag, &name, kind, &spikes.attrs, &path, spikes.id)?;

        let props = self.store.section_mut(section)?;
        if let Some(t_start) = spikes.t_start {
            props.set_property(codec::T_START, vec![PropertyValue::Float(t_start)]);
        }
        props.set_property(codec::T_STOP, vec![PropertyValue::Float(spikes.t_stop)]);

        if let Some(waveforms) = &spikes.waveforms {
            let wf_name = format!("{name}.waveforms");
            let wf = self.upsert_array(seg, &wf_name, TYPE_WAVEFORMS, waveforms.data.clone())?;
            let array = self.store.array_mut(wf)?;
            array.unit = waveforms.units.clone();
            array.dimensions = vec![
                Dimension::set(),
                Dimension::set(),
                Dimension::Sampled {
                    interval: waveforms.sampling_period,
                    offset: 0.0,
                    unit: waveforms.time_units.clone(),
                    label: Some(TIME_LABEL.to_string()),
                },
            ];
            let wf_section = self.section_for(Some(wf), Some(section), &wf_name, TYPE_WAVEFORMS)?;
            self.store.set_metadata(wf, Some(wf_section))?;
            let props = self.store.section_mut(wf_section)?;
            props.properties.clear();
            if let Some(left_sweep) = waveforms.left_sweep {
                props.set_property(codec::LEFT_SWEEP, vec![PropertyValue::Float(left_sweep)]);
            }
            self.store.tag_mut(tag)?.features.push(Feature {
                data: wf,
                link: LinkType::Indexed,
            });
        }
        Ok(tag)
    }

    /// The `<name>.times` array of a tag, with labels on its set dimension.
    fn write_positions(
        &mut self,
        seg: &SegmentCtx,
        name: &str,
        kind: EntityKind,
        times: &[f64],
        time_units: &Option<String>,
        labels: &[String],
    ) -> MapResult<ObjectId> {
        let positions = self.upsert_array(
            seg,
            &format!("{name}.times"),
            &schema::positions_type(kind),
            NdArray::vector(times.to_vec()),
        )?;
        let array = self.store.array_mut(positions)?;
        array.unit = time_units.clone();
        array.dimensions = vec![Dimension::Set {
            labels: labels.to_vec(),
        }];
        Ok(positions)
    }

    /// Link a tag into its segment, write its metadata and register it.
    #[allow(clippy::too_many_arguments)]
    fn finish_tag(
        &mut self,
        seg: &SegmentCtx,
        tag: ObjectId,
        name: &str,
        kind: EntityKind,
        attrs: &Attributes,
        path: &str,
        entity: EntityId,
    ) -> MapResult<SectionId> {
        let type_name = schema::type_name(kind);
        self.store
            .append_reference(seg.group, Collection::Tags, tag)?;
        let section = self.section_for(Some(tag), Some(seg.section), name, type_name)?;
        self.write_attributes(&[tag], section, type_name, attrs, None, None, path)?;
        self.identity
            .register_written(entity, Mapped::Object(tag), path);
        Ok(section)
    }

    // -----------------------------------------------------------------------
    // Channel groups and units
    // -----------------------------------------------------------------------

    fn write_channel_group(&mut self, ctx: &BlockCtx, group: &ChannelGroup) -> MapResult<ObjectId> {
        let kind = EntityKind::ChannelGroup;
        let type_name = schema::type_name(kind);
        let name = self.mediate_claim(Some(ctx.root), Collection::Sources, &group.attrs, kind)?;
        let source = self.upsert_source(ctx.root, &name, type_name)?;
        let path = build_path(&ctx.path, ContainerLabel::ChannelGroups, &name);
        let section = self.section_for(Some(source), Some(ctx.section), &name, type_name)?;
        self.write_attributes(&[source], section, type_name, &group.attrs, None, None, &path)?;
        self.identity
            .register_written(group.id, Mapped::Object(source), path.as_str());

        for (position, index) in group.channel_indexes.iter().enumerate() {
            self.write_channel(group, position, *index, source, section)?;
        }

        for unit in group.units.iter() {
            self.write_unit(ctx, source, section, &path, unit)?;
        }

        for handle in group.regular_signals.iter().chain(&group.irregular_signals) {
            let Some(arrays) = self.resolve_reference(*handle, ctx.complete)? else {
                continue;
            };
            for array in arrays {
                let sources = &mut self.store.array_mut(array)?.sources;
                if !sources.contains(&source) {
                    sources.push(source);
                }
            }
        }

        if ctx.complete {
            self.sweep(source, Collection::Sources)?;
        }
        Ok(source)
    }

    /// A child source per channel carrying its index and coordinates.
    fn write_channel(
        &mut self,
        group: &ChannelGroup,
        position: usize,
        index: i64,
        parent: ObjectId,
        parent_section: SectionId,
    ) -> MapResult<()> {
        let base = group
            .channel_names
            .get(position)
            .filter(|n| !n.is_empty())
            .map_or("Channel", String::as_str);
        names::validate_name(base)?;
        let name = names::mediate_with_base(
            base,
            self.claims.taken(Some(parent), Collection::Sources),
            false,
        );
        let channel = self.upsert_source(parent, &name, TYPE_CHANNEL)?;
        let section = self.section_for(Some(channel), Some(parent_section), &name, TYPE_CHANNEL)?;
        self.store.set_metadata(channel, Some(section))?;

        let props = self.store.section_mut(section)?;
        props.properties.clear();
        props.set_property(codec::INDEX, vec![PropertyValue::Int(index)]);
        if let Some(coordinates) = &group.coordinates {
            if let Some(row) = coordinates.values.get(position) {
                let values = row.iter().map(|v| PropertyValue::Float(*v)).collect();
                props.set_property(codec::COORDINATES, values);
                props.set_property(
                    codec::COORDINATES_UNITS,
                    vec![PropertyValue::Text(coordinates.units.clone())],
                );
            }
        }
        if let Some(origin) = &group.attrs.file_origin {
            props.set_property(codec::FILE_ORIGIN, vec![PropertyValue::Text(origin.clone())]);
        }
        Ok(())
    }

    fn write_unit(
        &mut self,
        ctx: &BlockCtx,
        group_source: ObjectId,
        group_section: SectionId,
        group_path: &str,
        unit: &Unit,
    ) -> MapResult<ObjectId> {
        let kind = EntityKind::Unit;
        let type_name = schema::type_name(kind);
        let name = self.mediate_claim(Some(group_source), Collection::Sources, &unit.attrs, kind)?;
        let source = self.upsert_source(group_source, &name, type_name)?;
        let path = build_path(group_path, ContainerLabel::Units, &name);
        let section = self.section_for(Some(source), Some(group_section), &name, type_name)?;
        self.write_attributes(&[source], section, type_name, &unit.attrs, None, None, &path)?;
        self.identity
            .register_written(unit.id, Mapped::Object(source), path.as_str());

        for handle in &unit.spike_series {
            let Some(tags) = self.resolve_reference(*handle, ctx.complete)? else {
                continue;
            };
            for tag in tags {
                let sources = &mut self.store.tag_mut(tag)?.sources;
                for linked in [group_source, source] {
                    if !sources.contains(&linked) {
                        sources.push(linked);
                    }
                }
            }
        }
        Ok(source)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn mediate_claim(
        &mut self,
        parent: Option<ObjectId>,
        collection: Collection,
        attrs: &Attributes,
        kind: EntityKind,
    ) -> MapResult<String> {
        let name = names::mediate(
            attrs.name.as_deref(),
            self.claims.taken(parent, collection),
            kind,
        )?;
        // Multi-channel signals claim their array names one by one.
        if !kind.is_multi_array() {
            self.claims.claim(parent, collection, &name);
        }
        Ok(name)
    }

    #[allow(clippy::too_many_arguments)]
    fn write_attributes(
        &mut self,
        objects: &[ObjectId],
        section: SectionId,
        type_name: &str,
        attrs: &Attributes,
        rec_datetime: Option<NaiveDateTime>,
        file_datetime: Option<NaiveDateTime>,
        path: &str,
    ) -> MapResult<()> {
        let record = codec::encode(
            type_name,
            attrs,
            rec_datetime,
            file_datetime,
            path,
            &mut self.sink,
        );
        codec::apply(&mut self.store, objects, section, &record)
    }

    /// Fetch the named array under the block and reset it, or create it.
    /// Its sources are only dropped when this pass rebuilds them.
    fn upsert_array(
        &mut self,
        seg: &SegmentCtx,
        name: &str,
        type_name: &str,
        data: NdArray,
    ) -> MapResult<ObjectId> {
        let root = seg.root;
        self.claims.claim(Some(root), Collection::Arrays, name);
        match self.store.find_child(root, Collection::Arrays, name)? {
            Some(id) => {
                let array = self.store.array_mut(id)?;
                array.header.type_name = type_name.to_string();
                array.data = data;
                array.unit = None;
                array.dimensions.clear();
                if seg.relink_sources {
                    array.sources.clear();
                }
                debug!(name, "array reused");
                Ok(id)
            }
            None => Ok(self.store.create_array(root, name, type_name, data)?),
        }
    }

    /// Fetch the named tag under the block and reset its links, or create it.
    /// Its sources are only dropped when this pass rebuilds them.
    fn upsert_tag(
        &mut self,
        seg: &SegmentCtx,
        name: &str,
        type_name: &str,
        positions: ObjectId,
    ) -> MapResult<ObjectId> {
        let root = seg.root;
        self.claims.claim(Some(root), Collection::Tags, name);
        match self.store.find_child(root, Collection::Tags, name)? {
            Some(id) => {
                let tag = self.store.tag_mut(id)?;
                tag.header.type_name = type_name.to_string();
                tag.positions = positions;
                tag.extents = None;
                tag.references.clear();
                if seg.relink_sources {
                    tag.sources.clear();
                }
                tag.features.clear();
                debug!(name, "tag reused");
                Ok(id)
            }
            None => Ok(self.store.create_tag(root, name, type_name, positions)?),
        }
    }

    fn upsert_source(&mut self, parent: ObjectId, name: &str, type_name: &str) -> MapResult<ObjectId> {
        self.claims.claim(Some(parent), Collection::Sources, name);
        match self.store.find_child(parent, Collection::Sources, name)? {
            Some(id) => {
                self.store.object_mut(id)?.header_mut().type_name = type_name.to_string();
                debug!(name, "source reused");
                Ok(id)
            }
            None => Ok(self.store.create_source(parent, name, type_name)?),
        }
    }

    /// Container objects of an already written entity. In an incomplete pass
    /// an unwritten target is skipped: it lives in a child list that was not
    /// loaded and its links are already on disk.
    fn resolve_reference(&self, entity: EntityId, complete: bool) -> MapResult<Option<Vec<ObjectId>>> {
        match self.identity.lookup_written(entity) {
            Ok(mapped) => {
                debug!(
                    %entity,
                    path = self.identity.written_path(entity).unwrap_or_default(),
                    "reference resolved"
                );
                Ok(Some(mapped.ids().to_vec()))
            }
            Err(_) if !complete => {
                debug!(%entity, "reference to unwritten entity skipped");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Unlink references from a segment group that this pass did not write.
    fn unlink_stale(
        &mut self,
        group: ObjectId,
        collection: Collection,
        kept: &HashSet<ObjectId>,
        preserved_types: &[&str],
    ) -> MapResult<()> {
        let stale: Vec<ObjectId> = self
            .store
            .children(group, collection)?
            .iter()
            .copied()
            .filter(|id| !kept.contains(id))
            .filter(|id| !preserved_types.iter().any(|t| has_type(&self.store, *id, t)))
            .collect();
        for id in stale {
            self.store.remove_reference(group, collection, id)?;
            debug!(%id, %collection, "reference unlinked");
        }
        Ok(())
    }

    /// Delete objects owned by `parent` whose names were not claimed.
    fn sweep(&mut self, parent: ObjectId, collection: Collection) -> MapResult<()> {
        let stale: Vec<ObjectId> = self
            .store
            .children(parent, collection)?
            .iter()
            .copied()
            .filter(|id| {
                self.store.header(*id).is_ok_and(|h| {
                    h.owner == Some(parent)
                        && !self.claims.is_claimed(Some(parent), collection, &h.name)
                })
            })
            .collect();
        for id in stale {
            self.store.delete(id)?;
            debug!(%id, %collection, "stale container deleted");
        }
        Ok(())
    }
}

/// Whether the channel groups and every unit list are loaded, so the pass
/// rebuilds all source links on the arrays and tags it rewrites.
fn sources_loaded(block: &Block) -> bool {
    block.channel_groups.loaded().is_some()
        && block.channel_groups.iter().all(|g| g.units.loaded().is_some())
}

/// Whether every child list under the block is loaded.
fn is_complete(block: &Block) -> bool {
    fn loaded<T>(children: &Children<T>) -> bool {
        children.loaded().is_some()
    }
    loaded(&block.segments)
        && sources_loaded(block)
        && block.segments.iter().all(|s| {
            loaded(&s.regular_signals)
                && loaded(&s.irregular_signals)
                && loaded(&s.epochs)
                && loaded(&s.events)
                && loaded(&s.spike_series)
        })
}
