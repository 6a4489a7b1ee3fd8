//! Single pass reduction and reformatting of self describing packet
//! streams.
//!
//! A stream is a descriptor followed by schemas and data packets. Each
//! schema defines the layout of the packets with its id and can be
//! redefined at any point. Stages implementing [`Sink`] or [`Filter`] are
//! chained by ownership and driven one event at a time by a
//! [`wire::Reader`].

pub mod codec;
pub mod config;
pub mod error;
pub mod filters;
pub mod logging;
pub mod pipeline;
pub mod reduce;
pub mod schema;
pub mod stream;
pub mod units;
pub mod wire;

pub use config::ConfigError;
pub use error::Error;
pub use pipeline::{Filter, Sink};
pub use reduce::extent::ExtentReducer;
pub use reduce::mean::MeanReducer;
pub use schema::{Field, Record, Schema, SchemaId};
pub use stream::{ByteOrder, Comment, StreamDescriptor, StreamError};
