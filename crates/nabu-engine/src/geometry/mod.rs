//! Vertex and index buffer bookkeeping.

mod index;
mod vertex;

pub use index::{IndexData, IndexFormat, GL_UNSIGNED_INT, GL_UNSIGNED_SHORT};
pub use vertex::{
    attrib_type_from_gl, build_layout, VertexAttributeDesc, GL_FLOAT, GL_SHORT, GL_UNSIGNED_BYTE,
};

use crate::backend::{IndexBufferId, VertexBufferId, VertexLayout};
use crate::handle::Handle;

pub type VertexBufferHandle = Handle<VertexBufferData>;
pub type IndexBufferHandle = Handle<IndexBufferData>;
pub type VertexArrayHandle = Handle<VertexArray>;

#[derive(Debug)]
pub struct VertexBufferData {
    pub buffer: VertexBufferId,
    pub layout: VertexLayout,
}

#[derive(Debug)]
pub struct IndexBufferData {
    pub buffer: IndexBufferId,
    pub format: IndexFormat,
}

/// Binding list for one draw: an index buffer plus vertex streams.
///
/// Stream `i` is the `i`-th recorded vertex buffer. The buffers themselves are
/// owned by the context; deleting the array leaves them alive.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VertexArray {
    pub index_buffer: Option<IndexBufferHandle>,
    pub vertex_buffers: Vec<VertexBufferHandle>,
}

impl VertexArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the index buffer, replacing any previous one.
    pub fn record_index_buffer(&mut self, buffer: IndexBufferHandle) {
        self.index_buffer = Some(buffer);
    }

    /// Appends a vertex buffer as the next stream.
    pub fn record_vertex_buffer(&mut self, buffer: VertexBufferHandle) {
        self.vertex_buffers.push(buffer);
    }
}
