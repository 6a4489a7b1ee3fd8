use serde::{Deserialize, Serialize};

use crate::schema::Properties;

/// Byte order used by every binary field in a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    #[default]
    Big,
    Little,
}

/// Stream wide header. Sent once, before any schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub byte_order: ByteOrder,
    #[serde(default)]
    pub properties: Properties,
}

impl StreamDescriptor {
    pub fn new(byte_order: ByteOrder) -> Self {
        Self {
            byte_order,
            properties: Properties::new(),
        }
    }
}

/// Out of band annotation travelling with the stream, for example progress
/// or packet counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub kind: String,
    pub source: String,
    pub value: String,
}

impl Comment {
    pub fn new(
        kind: impl Into<String>,
        source: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            source: source.into(),
            value: value.into(),
        }
    }
}

/// An error raised somewhere upstream. After it no further events are
/// guaranteed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamError {
    pub kind: String,
    pub message: String,
}

impl StreamError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl From<&crate::Error> for StreamError {
    fn from(error: &crate::Error) -> Self {
        Self::new(error.kind(), error.to_string())
    }
}
