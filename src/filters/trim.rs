use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::ConfigError;
use crate::pipeline::{Filter, Sink};
use crate::schema::{Schema, SchemaId};
use crate::stream::{ByteOrder, StreamDescriptor};
use crate::units::{self, TimeLocationUnit};
use crate::Error;

/// Inclusive time range in microseconds since 2000-01-01
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub start: f64,
    pub end: f64,
}

impl Config {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start: f64::NEG_INFINITY,
            end: f64::INFINITY,
        }
    }
}

/// Drops packets whose time tag lies outside a range. Packet types that
/// are not time series pass untouched.
#[derive(Debug)]
pub struct Trim<S> {
    next: S,
    config: Config,
    byte_order: ByteOrder,
    /// range in the units of each schema's leading field
    ranges: BTreeMap<SchemaId, Option<(f64, f64)>>,
    dropped: u64,
}

impl<S: Sink> Trim<S> {
    #[instrument(skip(next))]
    pub fn new(config: Config, next: S) -> Result<Self, ConfigError> {
        if !(config.start <= config.end) {
            return Err(ConfigError::Range {
                start: config.start,
                end: config.end,
            });
        }
        Ok(Self {
            next,
            config,
            byte_order: ByteOrder::default(),
            ranges: BTreeMap::new(),
            dropped: 0,
        })
    }

    pub fn into_inner(self) -> S {
        self.next
    }
}

impl<S: Sink> Filter for Trim<S> {
    fn downstream(&mut self) -> &mut dyn Sink {
        &mut self.next
    }

    fn on_stream_start(&mut self, stream: &StreamDescriptor) -> Result<(), Error> {
        self.byte_order = stream.byte_order;
        self.next.stream_start(stream)
    }

    fn on_schema(&mut self, schema: &Arc<Schema>) -> Result<(), Error> {
        let range = units::time_location(schema.leading().units.as_deref()).map(|unit| {
            let Config { start, end } = self.config;
            (
                TimeLocationUnit::Us2000.convert(start, unit),
                TimeLocationUnit::Us2000.convert(end, unit),
            )
        });
        self.ranges.insert(schema.id(), range);
        self.next.schema(schema)
    }

    fn on_packet(&mut self, schema: &Arc<Schema>, packet: &[u8]) -> Result<(), Error> {
        let id = schema.id();
        let Some((start, end)) = *self.ranges.get(&id).ok_or(Error::UnknownSchema(id))? else {
            return self.next.packet(schema, packet);
        };

        let tag = schema
            .decode(self.byte_order, packet)
            .map_err(|source| Error::Packet { id, source })?
            .leading()
            .unwrap_or_default();
        if (start..=end).contains(&tag) {
            self.next.packet(schema, packet)
        } else {
            self.dropped += 1;
            Ok(())
        }
    }

    fn on_stream_end(&mut self, stream: &StreamDescriptor) -> Result<(), Error> {
        debug!(dropped = self.dropped, "trimmed stream");
        self.next.stream_end(stream)
    }
}
