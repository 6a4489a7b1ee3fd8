use std::sync::Arc;

use pretty_assertions::assert_eq;
use streamreduce::codec::{parse_time, TransferType};
use streamreduce::filters::strip::PACKET_COUNT;
use streamreduce::filters::{ascii, trim, Ascii, Log, RenderType, Strip, Trim};
use streamreduce::schema::{CADENCE, RENDER_TYPE};
use streamreduce::{ByteOrder, Comment, ConfigError, Field, Schema, StreamDescriptor};
use streamreduce_test_support::{
    id, replay, setup_tracing, stream, time_series, Collector, Event, SECOND, START_2014,
};

fn packets(schema: &Arc<Schema>, n: u32) -> Vec<Event> {
    (0..n)
        .map(|i| {
            let tag = START_2014 + f64::from(i) * SECOND;
            Event::packet(schema, vec![vec![tag], vec![f64::from(i) * 0.5]])
        })
        .collect()
}

#[test]
fn log_forwards_everything() {
    setup_tracing();
    let schema = time_series(id(1), &["a"]);
    let mut body = vec![Event::schema(&schema)];
    body.extend(packets(&schema, 3));
    body.push(Event::Comment(Comment::new("taskProgress", "reader", "0.5")));
    let events = stream(body);

    let mut log = Log::new(Collector::default());
    replay(&events, &mut log).unwrap();
    assert_eq!(log.into_inner().events, events);
}

#[test]
fn strip_removes_properties_and_counts_packets() {
    let first = Arc::new(time_series(id(2), &["a"]).with_property(CADENCE, "1 s"));
    let second = Arc::new(time_series(id(2), &["a", "b"]).with_property(CADENCE, "4 s"));
    let other = time_series(id(3), &["c"]);

    let mut body = vec![Event::schema(&first), Event::schema(&other)];
    body.extend(packets(&first, 4));
    body.extend(packets(&other, 1));
    body.push(Event::schema(&second));
    let mut descriptor = StreamDescriptor::new(ByteOrder::Big);
    descriptor.properties.insert("title".into(), "test".into());
    let mut events = vec![Event::StreamStart(descriptor.clone())];
    events.extend(body);
    events.push(Event::StreamEnd(descriptor));

    let mut strip = Strip::new(Collector::default());
    replay(&events, &mut strip).unwrap();
    let collector = strip.into_inner();

    let Event::StreamStart(start) = &collector.events[0] else {
        panic!("stream should start with its descriptor");
    };
    assert!(start.properties.is_empty());
    assert!(collector
        .schemas()
        .iter()
        .all(|schema| schema.properties().is_empty()));
    assert!(collector
        .packets()
        .iter()
        .all(|(schema, _)| schema.properties().is_empty()));

    let counts: Vec<_> = collector
        .comments()
        .into_iter()
        .map(|c| (c.kind.as_str(), c.source.as_str(), c.value.as_str()))
        .collect();
    assert_eq!(
        counts,
        vec![
            (PACKET_COUNT, "02", "4"),
            (PACKET_COUNT, "02", "0"),
            (PACKET_COUNT, "03", "1"),
        ]
    );
}

#[test]
fn render_type_tags_selected_id() {
    let a = time_series(id(1), &["a"]);
    let b = time_series(id(2), &["b"]);
    let mut body = vec![Event::schema(&a), Event::schema(&b)];
    body.extend(packets(&b, 2));
    let events = stream(body);

    let mut tagger = RenderType::new("spectrogram", Some(id(2)), Collector::default());
    replay(&events, &mut tagger).unwrap();
    let collector = tagger.into_inner();

    let schemas = collector.schemas();
    assert_eq!(schemas[0].property(RENDER_TYPE), None);
    assert_eq!(schemas[1].property(RENDER_TYPE), Some("spectrogram"));
    assert!(collector
        .packets()
        .iter()
        .all(|(schema, _)| schema.property(RENDER_TYPE) == Some("spectrogram")));
}

#[test]
fn render_type_tags_all_by_default() {
    let a = time_series(id(1), &["a"]);
    let b = time_series(id(2), &["b"]);
    let events = stream([Event::schema(&a), Event::schema(&b)]);
    let mut tagger = RenderType::new("series", None, Collector::default());
    replay(&events, &mut tagger).unwrap();
    assert!(tagger
        .into_inner()
        .schemas()
        .iter()
        .all(|schema| schema.property(RENDER_TYPE) == Some("series")));
}

#[test]
fn ascii_keeps_values_and_recomputes_sizes() {
    let schema = Arc::new(
        Schema::builder(id(4))
            .field(Field::new("time", TransferType::Real8).with_units("us2000"))
            .field(Field::new("count", TransferType::Int2))
            .field(
                Field::new("spectrum", TransferType::Real4)
                    .with_elements(3)
                    .with_units("V"),
            )
            .build()
            .unwrap(),
    );
    let values = vec![vec![START_2014], vec![-12.0], vec![0.5, 1.25, -8.0]];
    let events = stream([
        Event::schema(&schema),
        Event::packet(&schema, values.clone()),
    ]);

    let mut ascii = Ascii::new(ascii::Config::default(), Collector::default());
    replay(&events, &mut ascii).unwrap();
    let collector = ascii.into_inner();

    let Event::StreamStart(descriptor) = &collector.events[0] else {
        panic!("stream should start with its descriptor");
    };
    assert_eq!(
        descriptor.properties.get(ascii::ENCODING).map(String::as_str),
        Some(ascii::ENCODING_ASCII)
    );

    let text = collector.schemas()[0];
    assert!(text.fields().iter().all(|f| f.transfer_type.is_ascii()));
    assert_eq!(text.packet_size(), 25 + 13 + 3 * 17);
    let (_, bytes) = collector.packets()[0];
    assert_eq!(bytes.last(), Some(&b'\n'));
    assert_eq!(collector.records(id(4))[0].clone().into_values(), values);
}

#[test]
fn ascii_writes_calendar_times() {
    let schema = time_series(id(5), &["a"]);
    let tag = START_2014 + 1.5 * SECOND;
    let events = stream([
        Event::schema(&schema),
        Event::packet(&schema, vec![vec![tag], vec![2.0]]),
    ]);
    let config = ascii::Config { time_as_text: true };
    let mut ascii = Ascii::new(config, Collector::default());
    replay(&events, &mut ascii).unwrap();
    let collector = ascii.into_inner();

    assert_eq!(
        collector.schemas()[0].leading().transfer_type,
        TransferType::Time {
            width: ascii::TIME_WIDTH
        }
    );
    let (_, bytes) = collector.packets()[0];
    assert!(bytes.starts_with(b"2014-01-01T00:00:01.500000 "));
    assert_eq!(collector.records(id(5))[0].leading(), Some(tag));
}

#[test]
fn trim_bounds_are_inclusive() {
    let schema = time_series(id(6), &["a"]);
    let mut body = vec![Event::schema(&schema)];
    body.extend(packets(&schema, 10));
    let events = stream(body);

    let start = parse_time("2014-01-01T00:00:02").unwrap();
    let end = parse_time("2014-01-01T00:00:05").unwrap();
    let mut trim = Trim::new(trim::Config::new(start, end), Collector::default()).unwrap();
    replay(&events, &mut trim).unwrap();

    let tags: Vec<_> = trim
        .into_inner()
        .records(id(6))
        .iter()
        .filter_map(|r| r.leading())
        .collect();
    let expected: Vec<_> = (2..=5).map(|s| START_2014 + f64::from(s) * SECOND).collect();
    assert_eq!(tags, expected);
}

#[test]
fn trim_converts_to_schema_time_units() {
    let schema = Arc::new(
        Schema::builder(id(7))
            .field(Field::new("time", TransferType::Real8).with_units("t2000"))
            .field(Field::new("a", TransferType::Real4))
            .build()
            .unwrap(),
    );
    let events = stream([
        Event::schema(&schema),
        Event::packet(&schema, vec![vec![10.0], vec![1.0]]),
        Event::packet(&schema, vec![vec![20.0], vec![2.0]]),
        Event::packet(&schema, vec![vec![30.0], vec![3.0]]),
    ]);
    let config = trim::Config::new(15.0 * SECOND, 25.0 * SECOND);
    let mut trim = Trim::new(config, Collector::default()).unwrap();
    replay(&events, &mut trim).unwrap();

    let records = trim.into_inner().records(id(7));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].leading(), Some(20.0));
}

#[test]
fn trim_passes_non_time_series() {
    let schema = Arc::new(
        Schema::builder(id(8))
            .field(Field::new("frequency", TransferType::Real4).with_units("Hz"))
            .build()
            .unwrap(),
    );
    let events = stream([
        Event::schema(&schema),
        Event::packet(&schema, vec![vec![1e9]]),
    ]);
    let mut trim = Trim::new(trim::Config::new(0.0, 1.0), Collector::default()).unwrap();
    replay(&events, &mut trim).unwrap();
    assert_eq!(trim.into_inner().packets().len(), 1);
}

#[test]
fn trim_range_must_be_ordered() {
    let err = Trim::new(trim::Config::new(2.0, 1.0), Collector::default()).unwrap_err();
    assert_eq!(err, ConfigError::Range { start: 2.0, end: 1.0 });
}
