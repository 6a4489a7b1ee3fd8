use std::collections::BTreeMap;
use std::io::{self, BufRead, BufReader, Read};
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::{OutOfBand, LENGTH_DIGITS, OUT_OF_BAND_ID, STREAM_ID};
use crate::pipeline::Sink;
use crate::schema::{Schema, SchemaId};
use crate::stream::{StreamDescriptor, StreamError};
use crate::Error;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Could not read input: {0}")]
    Io(io::Error),
    #[error("Input ended in the middle of a header or packet")]
    Truncated,
    #[error("Expected a header or packet tag at byte {offset}, found {found:?}")]
    InvalidTag { offset: u64, found: char },
    #[error("Malformed {0} frame at byte {1}")]
    MalformedFrame(&'static str, u64),
    #[error("Header at byte {offset} has an invalid length: {text:?}")]
    InvalidLength { offset: u64, text: String },
    #[error("Header or packet at byte {offset} has an invalid id: {text:?}")]
    InvalidId { offset: u64, text: String },
    #[error("Header at byte {0} is not valid utf-8")]
    NotUtf8(u64),
    #[error("Could not parse header at byte {offset}: {source}")]
    Ron {
        offset: u64,
        source: ron::error::SpannedError,
    },
    #[error("Stream does not start with a stream descriptor")]
    MissingStreamHeader,
    #[error("Second stream descriptor at byte {0}")]
    DuplicateStreamHeader(u64),
    #[error("Header for id {header} holds a schema with id {schema}")]
    SchemaIdMismatch { header: SchemaId, schema: SchemaId },
}

impl From<ReadError> for Error {
    fn from(error: ReadError) -> Self {
        Error::Read(error)
    }
}

/// One parsed unit of the wire format
#[derive(Debug)]
enum Frame {
    Stream(StreamDescriptor),
    Schema(Arc<Schema>),
    /// bytes are in [`Reader::packet`]
    Packet(Arc<Schema>),
    OutOfBand(OutOfBand),
}

/// Parses a stream and pushes its events into a pipeline
#[derive(Debug)]
pub struct Reader<R> {
    input: BufReader<R>,
    /// bytes consumed so far
    offset: u64,
    schemas: BTreeMap<SchemaId, Arc<Schema>>,
    packet: Vec<u8>,
}

impl<R: Read> Reader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: BufReader::new(input),
            offset: 0,
            schemas: BTreeMap::new(),
            packet: Vec::new(),
        }
    }

    /// Reads until the end of input. On failure the sink is sent a
    /// [`StreamError`] describing it, unless the failure is an exception
    /// raised upstream which the sink already received.
    #[instrument(level = "debug", skip_all)]
    pub fn drive<S: Sink + ?Sized>(mut self, sink: &mut S) -> Result<(), Error> {
        let error = match self.run(sink) {
            Ok(()) => return Ok(()),
            Err(error @ Error::Upstream(_)) => return Err(error),
            Err(error) => error,
        };

        warn!(offset = self.offset, %error, "abandoning stream");
        if let Err(forward) = sink.stream_error(&StreamError::from(&error)) {
            warn!(%forward, "could not forward the error downstream");
        }
        Err(error)
    }

    fn run<S: Sink + ?Sized>(&mut self, sink: &mut S) -> Result<(), Error> {
        let stream = match self.frame()? {
            Some(Frame::Stream(stream)) => stream,
            _ => return Err(ReadError::MissingStreamHeader.into()),
        };
        sink.stream_start(&stream)?;

        loop {
            let start = self.offset;
            match self.frame()? {
                None => return sink.stream_end(&stream),
                Some(Frame::Stream(_)) => {
                    return Err(ReadError::DuplicateStreamHeader(start).into())
                }
                Some(Frame::Schema(schema)) => {
                    self.schemas.insert(schema.id(), Arc::clone(&schema));
                    sink.schema(&schema)?;
                }
                Some(Frame::Packet(schema)) => sink.packet(&schema, &self.packet)?,
                Some(Frame::OutOfBand(OutOfBand::Comment(comment))) => sink.comment(&comment)?,
                Some(Frame::OutOfBand(OutOfBand::Exception(error))) => {
                    debug!(kind = %error.kind, "exception from upstream");
                    sink.stream_error(&error)?;
                    return Err(Error::Upstream(error));
                }
            }
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ReadError> {
        self.input.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => ReadError::Truncated,
            _ => ReadError::Io(e),
        })?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    /// `None` at a clean end of input
    fn frame(&mut self) -> Result<Option<Frame>, Error> {
        let start = self.offset;
        let tag = match self.input.fill_buf().map_err(ReadError::Io)? {
            [] => return Ok(None),
            [tag, ..] => *tag,
        };
        self.input.consume(1);
        self.offset += 1;

        match tag {
            b'[' => self.header(start).map(Some),
            b':' => self.packet(start).map(Some),
            other => Err(ReadError::InvalidTag {
                offset: start,
                found: char::from(other),
            }
            .into()),
        }
    }

    fn header(&mut self, start: u64) -> Result<Frame, Error> {
        let mut head = [0u8; 3 + LENGTH_DIGITS];
        self.read_exact(&mut head)?;
        let (id, rest) = head.split_at(2);
        let (close, length) = rest.split_at(1);
        if close != b"]" {
            return Err(ReadError::MalformedFrame("header", start).into());
        }
        let length = std::str::from_utf8(length)
            .ok()
            .filter(|text| text.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|text| text.parse::<usize>().ok())
            .ok_or_else(|| ReadError::InvalidLength {
                offset: start,
                text: String::from_utf8_lossy(length).into_owned(),
            })?;

        let mut text = vec![0u8; length];
        self.read_exact(&mut text)?;
        let text = String::from_utf8(text).map_err(|_| ReadError::NotUtf8(start))?;
        let ron_err = |source| ReadError::Ron {
            offset: start,
            source,
        };

        if id == STREAM_ID.as_bytes() {
            let stream = ron::from_str(&text).map_err(ron_err)?;
            return Ok(Frame::Stream(stream));
        }
        if id == OUT_OF_BAND_ID.as_bytes() {
            let message = ron::from_str(&text).map_err(ron_err)?;
            return Ok(Frame::OutOfBand(message));
        }

        let header = parse_id(id, start)?;
        let schema: Schema = ron::from_str(&text).map_err(ron_err)?;
        if schema.id() != header {
            return Err(ReadError::SchemaIdMismatch {
                header,
                schema: schema.id(),
            }
            .into());
        }
        debug!(id = %header, packet_size = schema.packet_size(), "new schema");
        Ok(Frame::Schema(Arc::new(schema)))
    }

    fn packet(&mut self, start: u64) -> Result<Frame, Error> {
        let mut head = [0u8; 3];
        self.read_exact(&mut head)?;
        if head[2] != b':' {
            return Err(ReadError::MalformedFrame("packet", start).into());
        }
        let id = parse_id(&head[..2], start)?;
        let schema = self
            .schemas
            .get(&id)
            .map(Arc::clone)
            .ok_or(Error::UnknownSchema(id))?;

        let mut packet = std::mem::take(&mut self.packet);
        packet.resize(schema.packet_size(), 0);
        let read = self.read_exact(&mut packet);
        self.packet = packet;
        read?;
        Ok(Frame::Packet(schema))
    }
}

fn parse_id(text: &[u8], offset: u64) -> Result<SchemaId, ReadError> {
    std::str::from_utf8(text)
        .ok()
        .filter(|text| text.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|text| text.parse::<u8>().ok())
        .and_then(SchemaId::new)
        .ok_or_else(|| ReadError::InvalidId {
            offset,
            text: String::from_utf8_lossy(text).into_owned(),
        })
}
