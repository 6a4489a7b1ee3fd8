use std::sync::Arc;

use super::Derived;
use crate::pipeline::{Filter, Sink};
use crate::schema::{Schema, SchemaId, RENDER_TYPE};
use crate::Error;

/// Tells plotting clients how to draw a packet type, for example as a
/// `series` or a `spectrogram`.
#[derive(Debug)]
pub struct RenderType<S> {
    next: S,
    render_type: String,
    /// tag only this id, all of them if `None`
    only: Option<SchemaId>,
    tagged: Derived,
}

impl<S: Sink> RenderType<S> {
    pub fn new(render_type: impl Into<String>, only: Option<SchemaId>, next: S) -> Self {
        Self {
            next,
            render_type: render_type.into(),
            only,
            tagged: Derived::default(),
        }
    }

    pub fn into_inner(self) -> S {
        self.next
    }
}

impl<S: Sink> Filter for RenderType<S> {
    fn downstream(&mut self) -> &mut dyn Sink {
        &mut self.next
    }

    fn on_schema(&mut self, schema: &Arc<Schema>) -> Result<(), Error> {
        if self.only.is_some_and(|id| id != schema.id()) {
            self.tagged.remove(schema.id());
            return self.next.schema(schema);
        }
        let tagged = self
            .tagged
            .insert(schema.with_property(RENDER_TYPE, self.render_type.as_str()));
        self.next.schema(&tagged)
    }

    fn on_packet(&mut self, schema: &Arc<Schema>, packet: &[u8]) -> Result<(), Error> {
        self.next.packet(self.tagged.of(schema), packet)
    }
}
