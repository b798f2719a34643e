//! Record trees shared by the write and read tests.

use chrono::{NaiveDate, NaiveDateTime};
use spindle_types::{
    Block, ChannelGroup, Coordinates, Epoch, Event, IrregularSignal, NdArray, RegularSignal,
    Segment, SpikeSeries, Unit, Waveforms,
};

pub(crate) fn recorded_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2015, 6, 1)
        .unwrap()
        .and_hms_opt(12, 30, 0)
        .unwrap()
}

/// `B1/S1` holding one 3-channel signal sampled at 10 per second from 0.
pub(crate) fn scenario_block() -> Block {
    let mut block = Block::new("B1");
    let mut segment = Segment::new("S1");
    let channels = (0..3)
        .map(|c| (0..8).map(|i| f64::from(c * 100 + i)).collect())
        .collect();
    let mut signal = RegularSignal::new("V", channels, 0.1, "s").unwrap();
    signal.units = Some("mV".into());
    segment.regular_signals.push(signal);
    block.segments.push(segment);
    block
}

/// A block using every entity kind, with a unit spanning two segments.
pub(crate) fn rich_block() -> Block {
    let mut block = Block::new("B1");
    block.attrs.description = Some("rich fixture".into());
    block.attrs.file_origin = Some("session.raw".into());
    block.attrs.annotations.insert("rig".into(), "left".into());
    block.rec_datetime = Some(recorded_at());
    block.file_datetime = Some(recorded_at());

    let mut s1 = Segment::new("S1");
    s1.rec_datetime = Some(recorded_at());
    s1.attrs.annotations.insert("trial".into(), 1.into());

    let mut v = RegularSignal::new(
        "V",
        vec![
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            vec![5.0, 6.0, 7.0, 8.0, 9.0],
            vec![10.0, 11.0, 12.0, 13.0, 14.0],
        ],
        0.1,
        "s",
    )
    .unwrap();
    v.units = Some("mV".into());
    v.t_start = 1.5;
    v.attrs.annotations.insert("gain".into(), 2.5.into());

    let mut irregular = IrregularSignal::new(
        "I",
        vec![0.0, 0.15, 0.4],
        vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]],
        "s",
    )
    .unwrap();
    irregular.units = Some("pA".into());

    let mut epoch = Epoch::new("ep", vec![0.1, 0.3], vec![0.05, 0.1]);
    epoch.time_units = Some("s".into());
    epoch.duration_units = Some("ms".into());
    epoch.labels = vec!["a".into(), "b".into()];

    let mut event = Event::new("ev", vec![0.2]);
    event.time_units = Some("s".into());
    event.labels = vec!["stim".into()];

    let mut spikes = SpikeSeries::new("st", vec![0.1, 0.25, 0.3], 0.5);
    spikes.time_units = Some("s".into());
    spikes.t_start = Some(0.0);
    spikes.waveforms = Some(Waveforms {
        data: NdArray::new(vec![3, 1, 4], (0..12).map(f64::from).collect()).unwrap(),
        units: Some("uV".into()),
        sampling_period: 0.001,
        time_units: Some("s".into()),
        left_sweep: Some(0.002),
    });

    let mut s2 = Segment::new("S2");
    let mut late_spikes = SpikeSeries::new("st2", vec![1.1], 2.0);
    late_spikes.time_units = Some("s".into());

    let mut group = ChannelGroup::new("G", vec![0, 1, 2]);
    group.attrs.file_origin = Some("session.raw".into());
    group.channel_names = vec!["c0".into(), "c1".into(), "c2".into()];
    group.coordinates = Some(Coordinates {
        values: vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]],
        units: "mm".into(),
    });
    group.regular_signals.push(v.id);
    group.irregular_signals.push(irregular.id);

    let mut unit = Unit::new("u1");
    unit.spike_series = vec![spikes.id, late_spikes.id];
    group.units.push(unit);

    s1.regular_signals.push(v);
    s1.irregular_signals.push(irregular);
    s1.epochs.push(epoch);
    s1.events.push(event);
    s1.spike_series.push(spikes);
    s2.spike_series.push(late_spikes);

    block.segments.push(s1);
    block.segments.push(s2);
    block.channel_groups.push(group);
    block
}
