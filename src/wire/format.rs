use std::io::{self, Write};
use std::sync::Arc;

use serde::Serialize;

use super::{OutOfBand, LENGTH_DIGITS, MAX_HEADER_LEN, OUT_OF_BAND_ID, STREAM_ID};
use crate::pipeline::Sink;
use crate::schema::Schema;
use crate::stream::{Comment, StreamDescriptor, StreamError};
use crate::Error;

/// Last stage of a pipeline, writes every event back to the wire
#[derive(Debug)]
pub struct Formatter<W> {
    out: W,
}

impl<W: Write> Formatter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn header(&mut self, id: &str, value: &impl Serialize) -> Result<(), Error> {
        let text = ron::to_string(value).map_err(Error::Serialize)?;
        if text.len() > MAX_HEADER_LEN {
            return Err(Error::Write(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("header of {} bytes does not fit the length field", text.len()),
            )));
        }
        write!(self.out, "[{id}]{:0w$}{text}", text.len(), w = LENGTH_DIGITS).map_err(Error::Write)
    }
}

impl<W: Write> Sink for Formatter<W> {
    fn stream_start(&mut self, stream: &StreamDescriptor) -> Result<(), Error> {
        self.header(STREAM_ID, stream)
    }

    fn schema(&mut self, schema: &Arc<Schema>) -> Result<(), Error> {
        self.header(&schema.id().to_string(), &**schema)
    }

    fn packet(&mut self, schema: &Arc<Schema>, packet: &[u8]) -> Result<(), Error> {
        debug_assert_eq!(packet.len(), schema.packet_size());
        write!(self.out, ":{}:", schema.id()).map_err(Error::Write)?;
        self.out.write_all(packet).map_err(Error::Write)
    }

    fn stream_end(&mut self, _: &StreamDescriptor) -> Result<(), Error> {
        self.out.flush().map_err(Error::Write)
    }

    fn stream_error(&mut self, error: &StreamError) -> Result<(), Error> {
        self.header(OUT_OF_BAND_ID, &OutOfBand::Exception(error.clone()))?;
        self.out.flush().map_err(Error::Write)
    }

    fn comment(&mut self, comment: &Comment) -> Result<(), Error> {
        self.header(OUT_OF_BAND_ID, &OutOfBand::Comment(comment.clone()))
    }
}
