//! Push based, single pass pipeline of packet stream stages.
//!
//! A reader drives events into the first [`Sink`]. Filters own the next
//! stage and forward whatever they do not handle themselves, the last stage
//! usually is a [`Formatter`](crate::wire::Formatter) writing the stream
//! back out.

use std::sync::Arc;

use crate::schema::Schema;
use crate::stream::{Comment, StreamDescriptor, StreamError};
use crate::Error;

/// Receives the events of one stream in arrival order
pub trait Sink {
    fn stream_start(&mut self, stream: &StreamDescriptor) -> Result<(), Error>;
    /// A (re)definition of the packet type with id `schema.id()`
    fn schema(&mut self, schema: &Arc<Schema>) -> Result<(), Error>;
    /// `packet` is exactly `schema.packet_size()` bytes
    fn packet(&mut self, schema: &Arc<Schema>, packet: &[u8]) -> Result<(), Error>;
    fn stream_end(&mut self, stream: &StreamDescriptor) -> Result<(), Error>;
    fn stream_error(&mut self, error: &StreamError) -> Result<(), Error>;
    fn comment(&mut self, comment: &Comment) -> Result<(), Error>;
}

/// A stage with exactly one downstream sink. Every event it does not
/// override is forwarded unchanged.
pub trait Filter {
    fn downstream(&mut self) -> &mut dyn Sink;

    fn on_stream_start(&mut self, stream: &StreamDescriptor) -> Result<(), Error> {
        self.downstream().stream_start(stream)
    }
    fn on_schema(&mut self, schema: &Arc<Schema>) -> Result<(), Error> {
        self.downstream().schema(schema)
    }
    fn on_packet(&mut self, schema: &Arc<Schema>, packet: &[u8]) -> Result<(), Error> {
        self.downstream().packet(schema, packet)
    }
    fn on_stream_end(&mut self, stream: &StreamDescriptor) -> Result<(), Error> {
        self.downstream().stream_end(stream)
    }
    fn on_stream_error(&mut self, error: &StreamError) -> Result<(), Error> {
        self.downstream().stream_error(error)
    }
    fn on_comment(&mut self, comment: &Comment) -> Result<(), Error> {
        self.downstream().comment(comment)
    }
}

impl<F: Filter> Sink for F {
    fn stream_start(&mut self, stream: &StreamDescriptor) -> Result<(), Error> {
        self.on_stream_start(stream)
    }
    fn schema(&mut self, schema: &Arc<Schema>) -> Result<(), Error> {
        self.on_schema(schema)
    }
    fn packet(&mut self, schema: &Arc<Schema>, packet: &[u8]) -> Result<(), Error> {
        self.on_packet(schema, packet)
    }
    fn stream_end(&mut self, stream: &StreamDescriptor) -> Result<(), Error> {
        self.on_stream_end(stream)
    }
    fn stream_error(&mut self, error: &StreamError) -> Result<(), Error> {
        self.on_stream_error(error)
    }
    fn comment(&mut self, comment: &Comment) -> Result<(), Error> {
        self.on_comment(comment)
    }
}
