use std::sync::Arc;

use itertools::Itertools;
use pretty_assertions::assert_eq;
use streamreduce::reduce::extent::{self, Config, ExtentReducer, EXTENT_SUFFIX};
use streamreduce::{Error, Schema};
use streamreduce_test_support::{
    id, replay, setup_tracing, stream, time_series, waveform, Collector, Event, SECOND,
    START_2014,
};

fn reduce(target_cadence: f64, events: &[Event]) -> Result<Collector, Error> {
    let mut reducer = ExtentReducer::new(Config { target_cadence }, Collector::default()).unwrap();
    replay(events, &mut reducer)?;
    Ok(reducer.into_inner())
}

fn sample(i: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let value = ((i * 37) % 128) as f64;
    value - 64.0
}

fn burst(offsets: &Arc<Schema>, samples: &Arc<Schema>, len: usize) -> Vec<Event> {
    #[allow(clippy::cast_precision_loss)]
    let spacing: Vec<f64> = (0..len).map(|i| i as f64).collect();
    let values: Vec<f64> = (0..len).map(sample).collect();
    vec![
        Event::schema(offsets),
        Event::schema(samples),
        Event::packet(offsets, vec![vec![START_2014], spacing]),
        Event::packet(samples, vec![vec![START_2014], values]),
    ]
}

#[test]
fn bursts_become_one_extent_per_block() {
    setup_tracing();
    let (offsets, samples) = waveform(id(1), id(2), 128, "s");
    let collector = reduce(16.0, &stream(burst(&offsets, &samples, 128))).unwrap();

    let schemas = collector.schemas();
    assert_eq!(schemas.len(), 1, "offsets are consumed");
    let out = schemas[0];
    assert_eq!(out.id(), id(2));
    assert_eq!(out.fields()[1].name, format!("amplitude{EXTENT_SUFFIX}"));
    assert_eq!(out.fields()[1].elements, 2);

    let records = collector.records(id(2));
    assert_eq!(records.len(), 8);
    for (i, record) in records.iter().enumerate() {
        let block: Vec<f64> = (i * 16..(i + 1) * 16).map(sample).collect();
        let (min, max) = block.iter().copied().minmax().into_option().unwrap();
        assert_eq!(record.field(1), &[min, max]);

        #[allow(clippy::cast_precision_loss)]
        let middle = (i * 16 + 8) as f64;
        let expected = START_2014 + middle * SECOND;
        assert!((record.field(0)[0] - expected).abs() < 1e-3);
    }
    assert!(collector.records(id(1)).is_empty());
}

#[test]
fn trailing_partial_block_is_kept() {
    let (offsets, samples) = waveform(id(1), id(2), 100, "s");
    let collector = reduce(16.0, &stream(burst(&offsets, &samples, 100))).unwrap();
    let records = collector.records(id(2));
    assert_eq!(records.len(), 7);

    let last: Vec<f64> = (96..100).map(sample).collect();
    let (min, max) = last.iter().copied().minmax().into_option().unwrap();
    assert_eq!(records[6].field(1), &[min, max]);
    assert!((records[6].field(0)[0] - (START_2014 + 98.0 * SECOND)).abs() < 1e-3);
}

#[test]
fn offsets_in_other_units_are_converted() {
    // one sample per millisecond, blocks of 16 ms fit a 17 ms target
    let (offsets, samples) = waveform(id(3), id(4), 128, "ms");
    let collector = reduce(0.017, &stream(burst(&offsets, &samples, 128))).unwrap();
    let records = collector.records(id(4));
    assert_eq!(records.len(), 8);
    let expected = START_2014 + 8.0 * 1e3;
    assert!((records[0].field(0)[0] - expected).abs() < 1e-3);
}

#[test]
fn single_sample_bursts_are_degenerate() {
    let (offsets, samples) = waveform(id(1), id(2), 1, "s");
    let err = reduce(16.0, &stream(burst(&offsets, &samples, 1))).unwrap_err();
    assert!(matches!(
        err,
        Error::Extent(extent::Error::DegenerateBlock { offsets: 1, .. })
    ));
}

#[test]
fn samples_need_offsets_first() {
    let (_, samples) = waveform(id(1), id(2), 8, "s");
    let events = stream([
        Event::schema(&samples),
        Event::packet(&samples, vec![vec![START_2014], vec![0.0; 8]]),
    ]);
    let err = reduce(1.0, &events).unwrap_err();
    assert!(matches!(
        err,
        Error::Extent(extent::Error::MissingOffsets(i)) if i == id(2)
    ));
}

#[test]
fn sample_count_must_match_offsets() {
    let (offsets, _) = waveform(id(1), id(2), 128, "s");
    let (_, short) = waveform(id(1), id(3), 64, "s");
    #[allow(clippy::cast_precision_loss)]
    let spacing: Vec<f64> = (0..128).map(|i| i as f64).collect();
    let events = stream([
        Event::schema(&offsets),
        Event::schema(&short),
        Event::packet(&offsets, vec![vec![START_2014], spacing]),
        Event::packet(&short, vec![vec![START_2014], vec![1.0; 64]]),
    ]);
    let err = reduce(16.0, &events).unwrap_err();
    assert!(matches!(
        err,
        Error::Extent(extent::Error::LengthMismatch {
            offsets: 128,
            samples: 64
        })
    ));
}

#[test]
fn single_field_schemas_pass_through() {
    let tags = time_series(id(9), &[]);
    let events = stream([
        Event::schema(&tags),
        Event::packet(&tags, vec![vec![START_2014]]),
    ]);
    let collector = reduce(16.0, &events).unwrap();
    assert_eq!(collector.schemas(), vec![&tags]);
    assert_eq!(collector.records(id(9)).len(), 1);
}

#[test]
fn redefined_offsets_are_not_reused() {
    let (offsets, samples) = waveform(id(1), id(2), 128, "s");
    let (redefined, _) = waveform(id(1), id(3), 128, "ms");
    let mut events = burst(&offsets, &samples, 128);
    let last = events.pop().expect("burst ends with the samples packet");
    events.push(Event::schema(&redefined));
    events.push(last);

    let err = reduce(16.0, &stream(events)).unwrap_err();
    assert!(matches!(
        err,
        Error::Extent(extent::Error::MissingOffsets(i)) if i == id(2)
    ));
}

#[test]
fn redefining_samples_keeps_offsets() {
    let (offsets, samples) = waveform(id(1), id(2), 128, "s");
    let mut events = burst(&offsets, &samples, 128);
    let last = events.pop().expect("burst ends with the samples packet");
    events.push(Event::schema(&samples));
    events.push(last);

    let collector = reduce(16.0, &stream(events)).unwrap();
    assert_eq!(collector.records(id(2)).len(), 8);
}
