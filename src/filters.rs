//! Stages that annotate, re-encode or drop parts of a stream without
//! aggregating it.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::schema::{Schema, SchemaId};

pub mod ascii;
pub mod log;
pub mod render_type;
pub mod strip;
pub mod trim;

pub use ascii::Ascii;
pub use log::Log;
pub use render_type::RenderType;
pub use strip::Strip;
pub use trim::Trim;

/// Schemas a filter sent downstream in place of the ones it received
#[derive(Debug, Default)]
pub(crate) struct Derived(BTreeMap<SchemaId, Arc<Schema>>);

impl Derived {
    pub(crate) fn insert(&mut self, schema: Schema) -> Arc<Schema> {
        let schema = Arc::new(schema);
        self.0.insert(schema.id(), Arc::clone(&schema));
        schema
    }

    pub(crate) fn remove(&mut self, id: SchemaId) {
        self.0.remove(&id);
    }

    /// the derived version of `received`, `received` itself if there is none
    pub(crate) fn of<'a>(&'a self, received: &'a Arc<Schema>) -> &'a Arc<Schema> {
        self.0.get(&received.id()).unwrap_or(received)
    }
}
