use crate::reduce::extent;
use crate::schema::{BuildError, PacketError, SchemaId};
use crate::stream::StreamError;
use crate::{units, wire};

/// Anything that stops a pipeline. Once returned the stream is abandoned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Packet with id {0} arrived before any schema with that id")]
    UnknownSchema(SchemaId),
    #[error("Packet with id {id} is malformed: {source}")]
    Packet { id: SchemaId, source: PacketError },
    #[error("Packet with id {id} has time tag {tag}, window boundaries need a finite tag")]
    InvalidTag { id: SchemaId, tag: f64 },
    #[error("Schema {id} declares an invalid cadence: {source}")]
    Cadence { id: SchemaId, source: units::Error },
    #[error("Schema {id} declares an invalid cache tag: {source}")]
    CacheTag { id: SchemaId, source: units::Error },
    #[error("Could not derive schema for the output: {0}")]
    DeriveSchema(BuildError),
    #[error("Could not reduce waveform: {0}")]
    Extent(extent::Error),
    #[error("Could not read stream: {0}")]
    Read(wire::ReadError),
    #[error("Could not write stream: {0}")]
    Write(std::io::Error),
    #[error("Could not serialize header: {0}")]
    Serialize(ron::Error),
    #[error("Upstream reported {}: {}", .0.kind, .0.message)]
    Upstream(StreamError),
}

impl Error {
    /// short machine readable category, used when the error is forwarded
    /// as a [`StreamError`]
    pub fn kind(&self) -> &'static str {
        match self {
            Error::UnknownSchema(_)
            | Error::Packet { .. }
            | Error::InvalidTag { .. }
            | Error::Read(_) => "IllegalArgument",
            Error::Cadence { .. } | Error::CacheTag { .. } | Error::DeriveSchema(_) => {
                "InvalidProperty"
            }
            Error::Extent(_) => "Configuration",
            Error::Write(_) | Error::Serialize(_) => "IOError",
            Error::Upstream(_) => "Upstream",
        }
    }
}
