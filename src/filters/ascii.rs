use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::codec::TransferType;
use crate::pipeline::{Filter, Sink};
use crate::schema::{Field, Schema, SchemaId};
use crate::stream::{ByteOrder, StreamDescriptor};
use crate::units::{self, TimeLocationUnit};
use crate::Error;

/// Text width used for times when writing them as calendar strings,
/// fits microsecond resolution: `2014-01-01T12:00:00.000000 `
pub const TIME_WIDTH: u8 = 27;
/// Stream descriptor property naming how packets are encoded
pub const ENCODING: &str = "encoding";
pub const ENCODING_ASCII: &str = "ascii";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// write `us2000` fields as calendar times instead of numbers
    pub time_as_text: bool,
}

/// Re-encodes every field as fixed width text
#[derive(Debug)]
pub struct Ascii<S> {
    next: S,
    config: Config,
    byte_order: ByteOrder,
    schemas: BTreeMap<SchemaId, (Arc<Schema>, Arc<Schema>)>,
}

impl<S: Sink> Ascii<S> {
    pub fn new(config: Config, next: S) -> Self {
        Self {
            next,
            config,
            byte_order: ByteOrder::default(),
            schemas: BTreeMap::new(),
        }
    }

    pub fn into_inner(self) -> S {
        self.next
    }

    fn text_type(&self, field: &Field) -> TransferType {
        let us2000 = units::time_location(field.units.as_deref()) == Some(TimeLocationUnit::Us2000);
        if self.config.time_as_text && us2000 {
            TransferType::Time { width: TIME_WIDTH }
        } else {
            field.transfer_type.ascii_equivalent()
        }
    }
}

impl<S: Sink> Filter for Ascii<S> {
    fn downstream(&mut self) -> &mut dyn Sink {
        &mut self.next
    }

    fn on_stream_start(&mut self, stream: &StreamDescriptor) -> Result<(), Error> {
        self.byte_order = stream.byte_order;
        let mut text = stream.clone();
        text.properties
            .insert(ENCODING.to_owned(), ENCODING_ASCII.to_owned());
        self.next.stream_start(&text)
    }

    #[instrument(level = "debug", skip_all, fields(id = %schema.id()))]
    fn on_schema(&mut self, schema: &Arc<Schema>) -> Result<(), Error> {
        let text = Arc::new(schema.with_transfer_types(|field| self.text_type(field)));
        debug!(
            from = schema.packet_size(),
            to = text.packet_size(),
            "re-encoding as text"
        );
        self.schemas
            .insert(schema.id(), (Arc::clone(schema), Arc::clone(&text)));
        self.next.schema(&text)
    }

    fn on_packet(&mut self, schema: &Arc<Schema>, packet: &[u8]) -> Result<(), Error> {
        let id = schema.id();
        let (input, text) = self.schemas.get(&id).ok_or(Error::UnknownSchema(id))?;
        let record = input
            .decode(self.byte_order, packet)
            .map_err(|source| Error::Packet { id, source })?;
        let packet = text
            .encode(self.byte_order, &record)
            .map_err(|source| Error::Packet { id, source })?;
        self.next.packet(text, &packet)
    }
}
