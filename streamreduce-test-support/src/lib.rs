use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro128StarStar;
use streamreduce::codec::TransferType;
use streamreduce::{
    ByteOrder, Comment, Error, Field, Record, Schema, SchemaId, Sink, StreamDescriptor,
    StreamError,
};

/// One second in the units of a `us2000` time field
pub const SECOND: f64 = 1e6;
/// 2014-01-01T00:00 as `us2000`
pub const START_2014: f64 = 441_849_600.0 * SECOND;

pub fn setup_tracing() {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let fmt = fmt::layer()
        .pretty()
        .with_line_number(true)
        .with_test_writer();

    let _ignore_err = color_eyre::install();
    let _ignore_err = tracing_subscriber::registry()
        .with(filter)
        .with(fmt)
        .with(ErrorLayer::default())
        .try_init();
}

pub fn id(n: u8) -> SchemaId {
    SchemaId::new(n).expect("test ids lie in 1..=99")
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StreamStart(StreamDescriptor),
    Schema(Arc<Schema>),
    Packet { schema: Arc<Schema>, bytes: Vec<u8> },
    StreamEnd(StreamDescriptor),
    Error(StreamError),
    Comment(Comment),
}

impl Event {
    /// A packet for `schema` holding `values`, encoded big endian
    pub fn packet(schema: &Arc<Schema>, values: Vec<Vec<f64>>) -> Self {
        let bytes = schema
            .encode(ByteOrder::Big, &Record::new(values))
            .expect("test values should fit the schema");
        Event::Packet {
            schema: Arc::clone(schema),
            bytes,
        }
    }

    pub fn schema(schema: &Arc<Schema>) -> Self {
        Event::Schema(Arc::clone(schema))
    }
}

/// Pushes `events` into `sink` in order
pub fn replay(events: &[Event], sink: &mut impl Sink) -> Result<(), Error> {
    for event in events {
        match event {
            Event::StreamStart(stream) => sink.stream_start(stream)?,
            Event::Schema(schema) => sink.schema(schema)?,
            Event::Packet { schema, bytes } => sink.packet(schema, bytes)?,
            Event::StreamEnd(stream) => sink.stream_end(stream)?,
            Event::Error(error) => sink.stream_error(error)?,
            Event::Comment(comment) => sink.comment(comment)?,
        }
    }
    Ok(())
}

/// A complete big endian stream: start, `body`, end
pub fn stream(body: impl IntoIterator<Item = Event>) -> Vec<Event> {
    let descriptor = StreamDescriptor::new(ByteOrder::Big);
    let mut events = vec![Event::StreamStart(descriptor.clone())];
    events.extend(body);
    events.push(Event::StreamEnd(descriptor));
    events
}

/// Last stage recording everything it receives
#[derive(Debug, Default)]
pub struct Collector {
    pub events: Vec<Event>,
    byte_order: ByteOrder,
}

impl Collector {
    pub fn schemas(&self) -> Vec<&Arc<Schema>> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Schema(schema) => Some(schema),
                _ => None,
            })
            .collect()
    }

    pub fn packets(&self) -> Vec<(&Arc<Schema>, &[u8])> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Packet { schema, bytes } => Some((schema, bytes.as_slice())),
                _ => None,
            })
            .collect()
    }

    /// Decoded packets with id `id`, each with the schema it was sent with
    pub fn records(&self, id: SchemaId) -> Vec<Record> {
        self.packets()
            .into_iter()
            .filter(|(schema, _)| schema.id() == id)
            .map(|(schema, bytes)| {
                schema
                    .decode(self.byte_order, bytes)
                    .expect("packets sent downstream should match their schema")
            })
            .collect()
    }

    pub fn comments(&self) -> Vec<&Comment> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Comment(comment) => Some(comment),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<&StreamError> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Error(error) => Some(error),
                _ => None,
            })
            .collect()
    }

    pub fn stream_ends(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, Event::StreamEnd(_)))
            .count()
    }
}

impl Sink for Collector {
    fn stream_start(&mut self, stream: &StreamDescriptor) -> Result<(), Error> {
        self.byte_order = stream.byte_order;
        self.events.push(Event::StreamStart(stream.clone()));
        Ok(())
    }
    fn schema(&mut self, schema: &Arc<Schema>) -> Result<(), Error> {
        self.events.push(Event::Schema(Arc::clone(schema)));
        Ok(())
    }
    fn packet(&mut self, schema: &Arc<Schema>, packet: &[u8]) -> Result<(), Error> {
        assert_eq!(
            packet.len(),
            schema.packet_size(),
            "packet should be exactly as long as its schema declares"
        );
        self.events.push(Event::Packet {
            schema: Arc::clone(schema),
            bytes: packet.to_vec(),
        });
        Ok(())
    }
    fn stream_end(&mut self, stream: &StreamDescriptor) -> Result<(), Error> {
        self.events.push(Event::StreamEnd(stream.clone()));
        Ok(())
    }
    fn stream_error(&mut self, error: &StreamError) -> Result<(), Error> {
        self.events.push(Event::Error(error.clone()));
        Ok(())
    }
    fn comment(&mut self, comment: &Comment) -> Result<(), Error> {
        self.events.push(Event::Comment(comment.clone()));
        Ok(())
    }
}

/// Time tagged series: a `us2000` time field then one `Real8` field per
/// name, all in volts.
pub fn time_series(id: SchemaId, names: &[&str]) -> Arc<Schema> {
    let mut builder = Schema::builder(id)
        .field(Field::new("time", TransferType::Real8).with_units("us2000"));
    for name in names {
        builder = builder.field(Field::new(*name, TransferType::Real8).with_units("V"));
    }
    Arc::new(builder.build().expect("names should be unique"))
}

/// A waveform burst pair: `len` offsets in `offset_unit` then `len` samples
/// in volts
pub fn waveform(
    offsets_id: SchemaId,
    samples_id: SchemaId,
    len: usize,
    offset_unit: &str,
) -> (Arc<Schema>, Arc<Schema>) {
    let offsets = Schema::builder(offsets_id)
        .field(Field::new("time", TransferType::Real8).with_units("us2000"))
        .field(
            Field::new("offset", TransferType::Real4)
                .with_elements(len)
                .with_units(offset_unit),
        )
        .build()
        .expect("valid schema");
    let samples = Schema::builder(samples_id)
        .field(Field::new("time", TransferType::Real8).with_units("us2000"))
        .field(
            Field::new("amplitude", TransferType::Real4)
                .with_elements(len)
                .with_units("V"),
        )
        .build()
        .expect("valid schema");
    (Arc::new(offsets), Arc::new(samples))
}

/// Strictly increasing time tags with random gaps between `min_gap` and
/// `max_gap` seconds
pub struct TagGen {
    rng: Xoshiro128StarStar,
    next: f64,
    min_gap: f64,
    max_gap: f64,
}

impl TagGen {
    pub fn new(seed: u64, start: f64, min_gap: f64, max_gap: f64) -> Self {
        Self {
            rng: Xoshiro128StarStar::seed_from_u64(seed),
            next: start,
            min_gap,
            max_gap,
        }
    }
}

impl Iterator for TagGen {
    type Item = f64;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.next;
        let gap = self.rng.random_range(self.min_gap..=self.max_gap);
        self.next += (gap * SECOND).round();
        Some(tag)
    }
}
