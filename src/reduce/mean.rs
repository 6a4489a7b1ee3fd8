mod accumulator;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use self::accumulator::Accumulator;
use crate::config::{positive, ConfigError};
use crate::pipeline::{Filter, Sink};
use crate::schema::{Record, Schema, SchemaId, CACHE_TAG, CADENCE};
use crate::stream::{ByteOrder, StreamDescriptor};
use crate::units::{self, CacheTag, Datum, Resolution, TimeLocationUnit, TimeOffsetUnit};
use crate::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// length of one averaging window in seconds
    pub window: f64,
}

impl Config {
    pub fn new(window: f64) -> Self {
        Self { window }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self { window: 60.0 }
    }
}

/// Averages every field of a time series over fixed length time windows,
/// emitting one packet per window.
///
/// Windows are aligned to multiples of the window length and tracked per
/// schema id. A schema whose leading field is not a time location is passed
/// through untouched.
#[derive(Debug)]
pub struct MeanReducer<S> {
    next: S,
    config: Config,
    byte_order: ByteOrder,
    schemas: BTreeMap<SchemaId, Entry>,
}

#[derive(Debug)]
enum Entry {
    PassThrough,
    Reduce(Window),
}

#[derive(Debug)]
struct Window {
    /// as received, packets are decoded with this
    input: Arc<Schema>,
    /// sent downstream, means are encoded with this
    output: Arc<Schema>,
    /// in the offset unit of the leading field
    length: f64,
    /// exclusive end of the current window
    next_boundary: Option<f64>,
    /// one per field, in field order
    accumulators: Vec<Accumulator>,
}

impl Window {
    fn boundary_after(&self, tag: f64) -> f64 {
        (1.0 + (tag / self.length).floor()) * self.length
    }

    fn add(&mut self, record: &Record) {
        for (accumulator, values) in self.accumulators.iter_mut().zip(record.fields()) {
            accumulator.add(values);
        }
    }

    #[instrument(level = "trace", skip_all, fields(id = %self.output.id()))]
    fn flush(&mut self, order: ByteOrder, next: &mut dyn Sink) -> Result<(), Error> {
        if self.accumulators.iter().all(Accumulator::is_empty) {
            return Ok(());
        }

        let means = self
            .accumulators
            .iter_mut()
            .map(Accumulator::finish)
            .collect();
        let record = Record::new(means);
        let packet = self
            .output
            .encode(order, &record)
            .map_err(|source| Error::Packet {
                id: self.output.id(),
                source,
            })?;
        trace!(tag = record.leading(), "emitting window mean");
        next.packet(&self.output, &packet)
    }
}

impl<S: Sink> MeanReducer<S> {
    #[instrument(skip(next))]
    pub fn new(config: Config, next: S) -> Result<Self, ConfigError> {
        if !positive(config.window) {
            return Err(ConfigError::Window(config.window));
        }
        Ok(Self {
            next,
            config,
            byte_order: ByteOrder::default(),
            schemas: BTreeMap::new(),
        })
    }

    pub fn into_inner(self) -> S {
        self.next
    }

    fn open_window(
        &self,
        schema: &Arc<Schema>,
        location: TimeLocationUnit,
    ) -> Result<Window, Error> {
        let id = schema.id();
        let requested = self.config.window;

        let declared = schema
            .property(CADENCE)
            .map(str::parse::<Datum>)
            .transpose()
            .map_err(|source| Error::Cadence { id, source })?;
        // reducing never makes a stream finer than it already is
        let cadence = declared.map_or(requested, |datum| datum.seconds().max(requested));
        let mut output = schema.with_property(CADENCE, Datum::from_seconds(cadence).to_string());

        if let Some(tag) = schema.property(CACHE_TAG) {
            let tag = tag
                .parse::<CacheTag>()
                .map_err(|source| Error::CacheTag { id, source })?
                .with_resolution(Resolution::Datum(Datum::from_seconds(requested)));
            output = output.with_property(CACHE_TAG, tag.to_string());
        }

        let length = TimeOffsetUnit::Seconds.convert(requested, location.offset_unit());
        debug!(%id, length, cadence, "reducing schema");
        Ok(Window {
            input: Arc::clone(schema),
            output: Arc::new(output),
            length,
            next_boundary: None,
            accumulators: schema
                .fields()
                .iter()
                .map(|field| Accumulator::new(field.elements))
                .collect(),
        })
    }
}

impl<S: Sink> Filter for MeanReducer<S> {
    fn downstream(&mut self) -> &mut dyn Sink {
        &mut self.next
    }

    fn on_stream_start(&mut self, stream: &StreamDescriptor) -> Result<(), Error> {
        self.byte_order = stream.byte_order;
        self.next.stream_start(stream)
    }

    #[instrument(level = "debug", skip_all, fields(id = %schema.id()))]
    fn on_schema(&mut self, schema: &Arc<Schema>) -> Result<(), Error> {
        let id = schema.id();
        if let Some(Entry::Reduce(mut previous)) = self.schemas.remove(&id) {
            debug!("schema redefined, flushing window of the previous definition");
            previous.flush(self.byte_order, &mut self.next)?;
        }

        let Some(location) = units::time_location(schema.leading().units.as_deref()) else {
            debug!("leading field is not a time location, passing packets through");
            self.schemas.insert(id, Entry::PassThrough);
            return self.next.schema(schema);
        };

        let window = self.open_window(schema, location)?;
        let output = Arc::clone(&window.output);
        self.schemas.insert(id, Entry::Reduce(window));
        self.next.schema(&output)
    }

    #[instrument(level = "trace", skip_all, fields(id = %schema.id()))]
    fn on_packet(&mut self, schema: &Arc<Schema>, packet: &[u8]) -> Result<(), Error> {
        let id = schema.id();
        let window = match self.schemas.get_mut(&id) {
            None => return Err(Error::UnknownSchema(id)),
            Some(Entry::PassThrough) => return self.next.packet(schema, packet),
            Some(Entry::Reduce(window)) => window,
        };

        let record = window
            .input
            .decode(self.byte_order, packet)
            .map_err(|source| Error::Packet { id, source })?;
        let tag = record.leading().unwrap_or_default();
        if !tag.is_finite() {
            return Err(Error::InvalidTag { id, tag });
        }

        if window.next_boundary.map_or(true, |boundary| tag >= boundary) {
            window.flush(self.byte_order, &mut self.next)?;
            window.next_boundary = Some(window.boundary_after(tag));
        }
        window.add(&record);
        Ok(())
    }

    #[instrument(level = "debug", skip_all)]
    fn on_stream_end(&mut self, stream: &StreamDescriptor) -> Result<(), Error> {
        for entry in self.schemas.values_mut() {
            if let Entry::Reduce(window) = entry {
                window.flush(self.byte_order, &mut self.next)?;
            }
        }
        self.next.stream_end(stream)
    }
}
