//! Min/max reduction of waveform bursts.
//!
//! A waveform arrives as two packets: one carrying the offsets of each sample
//! relative to the packet time, then one carrying the samples themselves.
//! The samples are split in blocks spanning about the target cadence, each
//! block becomes one packet holding the block's `[min, max]`.

use std::collections::BTreeMap;
use std::sync::Arc;

use itertools::{Itertools, MinMaxResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::{positive, ConfigError};
use crate::pipeline::{Filter, Sink};
use crate::schema::{Field, Record, Schema, SchemaId};
use crate::stream::{ByteOrder, StreamDescriptor};
use crate::units::{self, TimeLocationUnit, TimeOffsetUnit};

/// Appended to the samples field name in the reduced schema
pub const EXTENT_SUFFIX: &str = ".extent";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// wanted spacing of the reduced output in seconds
    pub target_cadence: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_cadence: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(
        "Block length {block} does not fit {offsets} offsets, the target \
        cadence does not match the sample spacing"
    )]
    DegenerateBlock { block: usize, offsets: usize },
    #[error("Samples with id {0} arrived before any offsets")]
    MissingOffsets(SchemaId),
    #[error("Got {samples} samples for {offsets} offsets")]
    LengthMismatch { offsets: usize, samples: usize },
}

/// Largest power of two block, at least 2, whose span from the first offset
/// does not exceed `target`. Searching starts at 4 and stops at half the
/// burst.
pub fn block_length(offsets: &[f64], target: f64) -> Result<usize, Error> {
    let mut block = 4;
    while block < offsets.len() / 2 && offsets[block] - offsets[0] <= target {
        block *= 2;
    }
    block /= 2;

    if block < 2 || block > offsets.len() {
        return Err(Error::DegenerateBlock {
            block,
            offsets: offsets.len(),
        });
    }
    Ok(block)
}

#[derive(Debug)]
pub struct ExtentReducer<S> {
    next: S,
    config: Config,
    byte_order: ByteOrder,
    roles: BTreeMap<SchemaId, Role>,
    offsets: Option<Offsets>,
}

#[derive(Debug)]
enum Role {
    PassThrough,
    Offsets {
        input: Arc<Schema>,
        unit: TimeOffsetUnit,
    },
    Samples {
        input: Arc<Schema>,
        output: Arc<Schema>,
        location: TimeLocationUnit,
    },
}

#[derive(Debug)]
struct Offsets {
    /// schema the offsets arrived with
    id: SchemaId,
    values: Vec<f64>,
    unit: TimeOffsetUnit,
    block: usize,
}

impl<S: Sink> ExtentReducer<S> {
    #[instrument(skip(next))]
    pub fn new(config: Config, next: S) -> Result<Self, ConfigError> {
        if !positive(config.target_cadence) {
            return Err(ConfigError::Cadence(config.target_cadence));
        }
        Ok(Self {
            next,
            config,
            byte_order: ByteOrder::default(),
            roles: BTreeMap::new(),
            offsets: None,
        })
    }

    pub fn into_inner(self) -> S {
        self.next
    }

    fn classify(schema: &Arc<Schema>) -> Result<Role, crate::Error> {
        let Some(location) = units::time_location(schema.leading().units.as_deref()) else {
            return Ok(Role::PassThrough);
        };
        let [leading, .., last] = schema.fields() else {
            return Ok(Role::PassThrough);
        };

        if let Some(Ok(unit)) = last.units.as_deref().map(str::parse::<TimeOffsetUnit>) {
            return Ok(Role::Offsets {
                input: Arc::clone(schema),
                unit,
            });
        }

        let mut output = Schema::builder(schema.id()).field(leading.clone()).field(Field {
            name: format!("{}{EXTENT_SUFFIX}", last.name),
            transfer_type: last.transfer_type,
            elements: 2,
            units: last.units.clone(),
        });
        for (key, value) in schema.properties() {
            output = output.property(key.clone(), value.clone());
        }
        let output = output.build().map_err(crate::Error::DeriveSchema)?;
        Ok(Role::Samples {
            input: Arc::clone(schema),
            output: Arc::new(output),
            location,
        })
    }

    fn reduce_samples(
        &mut self,
        input: &Schema,
        output: &Arc<Schema>,
        location: TimeLocationUnit,
        packet: &[u8],
    ) -> Result<(), crate::Error> {
        let id = input.id();
        let offsets = self
            .offsets
            .as_ref()
            .ok_or(Error::MissingOffsets(id))
            .map_err(crate::Error::Extent)?;
        let record = input
            .decode(self.byte_order, packet)
            .map_err(|source| crate::Error::Packet { id, source })?;
        let samples = record.last();
        if samples.len() != offsets.values.len() {
            return Err(crate::Error::Extent(Error::LengthMismatch {
                offsets: offsets.values.len(),
                samples: samples.len(),
            }));
        }

        let timestamp = record.leading().unwrap_or_default();
        for (i, block) in samples.chunks(offsets.block).enumerate() {
            let (min, max) = match block.iter().copied().minmax() {
                MinMaxResult::NoElements => continue,
                MinMaxResult::OneElement(value) => (value, value),
                MinMaxResult::MinMax(min, max) => (min, max),
            };
            let middle = i * offsets.block + block.len() / 2;
            let context = timestamp
                + offsets
                    .unit
                    .convert(offsets.values[middle], location.offset_unit());

            let reduced = Record::new(vec![vec![context], vec![min, max]]);
            let reduced = output
                .encode(self.byte_order, &reduced)
                .map_err(|source| crate::Error::Packet { id, source })?;
            self.next.packet(output, &reduced)?;
        }
        Ok(())
    }
}

impl<S: Sink> Filter for ExtentReducer<S> {
    fn downstream(&mut self) -> &mut dyn Sink {
        &mut self.next
    }

    fn on_stream_start(&mut self, stream: &StreamDescriptor) -> Result<(), crate::Error> {
        self.byte_order = stream.byte_order;
        self.next.stream_start(stream)
    }

    #[instrument(level = "debug", skip_all, fields(id = %schema.id()))]
    fn on_schema(&mut self, schema: &Arc<Schema>) -> Result<(), crate::Error> {
        let role = Self::classify(schema)?;
        if self.offsets.as_ref().is_some_and(|o| o.id == schema.id()) {
            debug!("offsets schema redefined, dropping its offsets");
            self.offsets = None;
        }
        let forward = match &role {
            Role::PassThrough => Some(Arc::clone(schema)),
            Role::Offsets { .. } => {
                debug!("waveform offsets, consumed");
                None
            }
            Role::Samples { output, .. } => {
                debug!("waveform samples, reducing to extents");
                Some(Arc::clone(output))
            }
        };
        self.roles.insert(schema.id(), role);
        match forward {
            Some(schema) => self.next.schema(&schema),
            None => Ok(()),
        }
    }

    #[instrument(level = "trace", skip_all, fields(id = %schema.id()))]
    fn on_packet(&mut self, schema: &Arc<Schema>, packet: &[u8]) -> Result<(), crate::Error> {
        let id = schema.id();
        match self.roles.get(&id) {
            None => Err(crate::Error::UnknownSchema(id)),
            Some(Role::PassThrough) => self.next.packet(schema, packet),
            Some(Role::Offsets { input, unit }) => {
                let unit = *unit;
                let record = input
                    .decode(self.byte_order, packet)
                    .map_err(|source| crate::Error::Packet { id, source })?;
                let values = record.last().to_vec();
                let target = TimeOffsetUnit::Seconds.convert(self.config.target_cadence, unit);
                let block = block_length(&values, target).map_err(crate::Error::Extent)?;
                debug!(block, offsets = values.len(), "new waveform offsets");
                self.offsets = Some(Offsets {
                    id,
                    values,
                    unit,
                    block,
                });
                Ok(())
            }
            Some(Role::Samples {
                input,
                output,
                location,
            }) => {
                let (input, output, location) = (Arc::clone(input), Arc::clone(output), *location);
                self.reduce_samples(&input, &output, location, packet)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::cast_precision_loss)]
    fn offsets(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn block_spans_target_cadence() {
        assert_eq!(block_length(&offsets(128), 16.0).unwrap(), 16);
        assert_eq!(block_length(&offsets(128), 17.0).unwrap(), 16);
        assert_eq!(block_length(&offsets(128), 32.0).unwrap(), 32);
    }

    #[test]
    fn block_never_exceeds_half_the_burst() {
        assert_eq!(block_length(&offsets(128), 1e9).unwrap(), 32);
    }

    #[test]
    fn coarse_spacing_backs_off_to_two() {
        assert_eq!(block_length(&offsets(128), 0.5).unwrap(), 2);
    }

    #[test]
    fn tiny_burst_is_degenerate() {
        assert_eq!(
            block_length(&offsets(1), 16.0),
            Err(Error::DegenerateBlock {
                block: 2,
                offsets: 1
            })
        );
    }
}
