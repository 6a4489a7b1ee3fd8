use std::sync::Arc;

use tracing::{info, trace, warn};

use crate::pipeline::{Filter, Sink};
use crate::schema::Schema;
use crate::stream::{Comment, StreamDescriptor, StreamError};
use crate::Error;

/// Logs every event then forwards it unchanged
#[derive(Debug)]
pub struct Log<S> {
    next: S,
    packets: u64,
}

impl<S: Sink> Log<S> {
    pub fn new(next: S) -> Self {
        Self { next, packets: 0 }
    }

    pub fn into_inner(self) -> S {
        self.next
    }
}

impl<S: Sink> Filter for Log<S> {
    fn downstream(&mut self) -> &mut dyn Sink {
        &mut self.next
    }

    fn on_stream_start(&mut self, stream: &StreamDescriptor) -> Result<(), Error> {
        info!(byte_order = ?stream.byte_order, properties = ?stream.properties, "stream start");
        self.next.stream_start(stream)
    }

    fn on_schema(&mut self, schema: &Arc<Schema>) -> Result<(), Error> {
        let fields: Vec<_> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        info!(
            id = %schema.id(),
            ?fields,
            packet_size = schema.packet_size(),
            "schema"
        );
        self.next.schema(schema)
    }

    fn on_packet(&mut self, schema: &Arc<Schema>, packet: &[u8]) -> Result<(), Error> {
        self.packets += 1;
        trace!(id = %schema.id(), len = packet.len(), "packet");
        self.next.packet(schema, packet)
    }

    fn on_stream_end(&mut self, stream: &StreamDescriptor) -> Result<(), Error> {
        info!(packets = self.packets, "stream end");
        self.next.stream_end(stream)
    }

    fn on_stream_error(&mut self, error: &StreamError) -> Result<(), Error> {
        warn!(kind = %error.kind, message = %error.message, "stream error");
        self.next.stream_error(error)
    }

    fn on_comment(&mut self, comment: &Comment) -> Result<(), Error> {
        info!(
            kind = %comment.kind,
            source = %comment.source,
            value = %comment.value,
            "comment"
        );
        self.next.comment(comment)
    }
}
