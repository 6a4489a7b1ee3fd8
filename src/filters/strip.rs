use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::Derived;
use crate::pipeline::{Filter, Sink};
use crate::schema::{Properties, Schema, SchemaId};
use crate::stream::{Comment, StreamDescriptor};
use crate::Error;

/// Kind of the comment reporting how many packets used a schema
pub const PACKET_COUNT: &str = "packetCount";

/// Removes every property from the stream descriptor and the schemas.
///
/// The packets seen per schema id are reported as a [`PACKET_COUNT`]
/// comment when the id is redefined and for every id before the stream
/// ends.
#[derive(Debug)]
pub struct Strip<S> {
    next: S,
    stripped: Derived,
    counts: BTreeMap<SchemaId, u64>,
}

impl<S: Sink> Strip<S> {
    pub fn new(next: S) -> Self {
        Self {
            next,
            stripped: Derived::default(),
            counts: BTreeMap::new(),
        }
    }

    pub fn into_inner(self) -> S {
        self.next
    }

    fn report(next: &mut S, id: SchemaId, count: u64) -> Result<(), Error> {
        debug!(%id, count, "reporting packet count");
        next.comment(&Comment::new(PACKET_COUNT, id.to_string(), count.to_string()))
    }
}

impl<S: Sink> Filter for Strip<S> {
    fn downstream(&mut self) -> &mut dyn Sink {
        &mut self.next
    }

    fn on_stream_start(&mut self, stream: &StreamDescriptor) -> Result<(), Error> {
        self.next.stream_start(&StreamDescriptor {
            byte_order: stream.byte_order,
            properties: Properties::new(),
        })
    }

    fn on_schema(&mut self, schema: &Arc<Schema>) -> Result<(), Error> {
        let id = schema.id();
        if let Some(count) = self.counts.insert(id, 0) {
            Self::report(&mut self.next, id, count)?;
        }
        let stripped = self.stripped.insert(schema.without_properties());
        self.next.schema(&stripped)
    }

    fn on_packet(&mut self, schema: &Arc<Schema>, packet: &[u8]) -> Result<(), Error> {
        *self.counts.entry(schema.id()).or_default() += 1;
        self.next.packet(self.stripped.of(schema), packet)
    }

    fn on_stream_end(&mut self, stream: &StreamDescriptor) -> Result<(), Error> {
        for (id, count) in std::mem::take(&mut self.counts) {
            Self::report(&mut self.next, id, count)?;
        }
        self.next.stream_end(&StreamDescriptor {
            byte_order: stream.byte_order,
            properties: Properties::new(),
        })
    }
}
