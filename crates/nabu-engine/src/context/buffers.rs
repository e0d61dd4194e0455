//! Vertex/index buffers, vertex arrays and draw submission.

use crate::backend::Backend;
use crate::error::Result;
use crate::geometry::{
    build_layout, IndexBufferData, IndexBufferHandle, IndexData, VertexArray, VertexArrayHandle,
    VertexAttributeDesc, VertexBufferData, VertexBufferHandle,
};

use super::{live, live_mut, RenderContext};

impl<B: Backend> RenderContext<B> {
    /// Uploads interleaved vertex bytes described by `attributes`.
    ///
    /// The whole buffer is handed to the backend; trailing bytes short of a
    /// full vertex are kept.
    pub fn create_vertex_buffer(
        &mut self,
        bytes: &[u8],
        stride: u16,
        attributes: &[VertexAttributeDesc],
    ) -> Result<VertexBufferHandle> {
        let layout = build_layout(stride, attributes)?;
        let buffer = self.backend.create_vertex_buffer(bytes, &layout);
        log::trace!(
            "vertex buffer {} created: {} vertices, stride {stride}",
            buffer.idx(),
            bytes.len() / stride as usize
        );
        Ok(self.vertex_buffers.insert(VertexBufferData { buffer, layout }))
    }

    pub fn delete_vertex_buffer(&mut self, buffer: VertexBufferHandle) {
        let Some(data) = self.vertex_buffers.remove(buffer) else {
            panic!("stale or foreign vertex buffer handle {buffer:?}");
        };
        self.backend.destroy_vertex_buffer(data.buffer);
    }

    /// Uploads indices; the element width follows the data.
    pub fn create_index_buffer(&mut self, indices: &IndexData) -> IndexBufferHandle {
        let format = indices.format();
        let buffer = self
            .backend
            .create_index_buffer(indices.as_bytes(), format.buffer_flags());
        log::trace!(
            "index buffer {} created: {} x {format:?}",
            buffer.idx(),
            indices.len()
        );
        self.index_buffers.insert(IndexBufferData { buffer, format })
    }

    pub fn delete_index_buffer(&mut self, buffer: IndexBufferHandle) {
        let Some(data) = self.index_buffers.remove(buffer) else {
            panic!("stale or foreign index buffer handle {buffer:?}");
        };
        self.backend.destroy_index_buffer(data.buffer);
    }

    pub fn create_vertex_array(&mut self) -> VertexArrayHandle {
        self.vertex_arrays.insert(VertexArray::new())
    }

    /// # Panics
    /// Panics if either handle is stale.
    pub fn record_index_buffer(&mut self, array: VertexArrayHandle, buffer: IndexBufferHandle) {
        live(&self.index_buffers, buffer, "index buffer");
        live_mut(&mut self.vertex_arrays, array, "vertex array").record_index_buffer(buffer);
    }

    /// # Panics
    /// Panics if either handle is stale.
    pub fn record_vertex_buffer(&mut self, array: VertexArrayHandle, buffer: VertexBufferHandle) {
        live(&self.vertex_buffers, buffer, "vertex buffer");
        live_mut(&mut self.vertex_arrays, array, "vertex array").record_vertex_buffer(buffer);
    }

    /// Binds the array's index buffer, then its vertex buffers as streams
    /// `0..n` in recorded order.
    ///
    /// # Panics
    /// Panics if the array or any buffer it recorded was deleted.
    pub fn bind_vertex_array(&mut self, array: VertexArrayHandle) {
        let va = live(&self.vertex_arrays, array, "vertex array");

        if let Some(index_buffer) = va.index_buffer {
            let id = live(&self.index_buffers, index_buffer, "index buffer").buffer;
            self.backend.set_index_buffer(id);
        }

        for (stream, &vertex_buffer) in va.vertex_buffers.iter().enumerate() {
            let stream = match u8::try_from(stream) {
                Ok(stream) => stream,
                Err(_) => panic!("vertex array {array:?} records more than 256 streams"),
            };
            let id = live(&self.vertex_buffers, vertex_buffer, "vertex buffer").buffer;
            self.backend.set_vertex_buffer(stream, id);
        }
    }

    /// Deletes the array. The buffers it recorded stay alive.
    pub fn delete_vertex_array(&mut self, array: VertexArrayHandle) {
        if self.vertex_arrays.remove(array).is_none() {
            panic!("stale or foreign vertex array handle {array:?}");
        }
    }

    /// Submits the current program with the current render state.
    ///
    /// The whole bound index buffer is drawn; `fill_mode`, `start` and `count`
    /// are accepted but not applied.
    ///
    /// # Panics
    /// Panics if no program is bound.
    pub fn draw_indexed(&mut self, fill_mode: i32, start: u32, count: u32) {
        let program = self.bound_program("draw_indexed");
        log::trace!("draw_indexed(fill {fill_mode}, start {start}, count {count})");
        self.backend.set_state(self.engine_state);
        self.backend.submit(self.init.view, program);
    }

    /// Non-indexed drawing is not supported; the call is logged and dropped.
    pub fn draw(&mut self, fill_mode: i32, start: u32, count: u32) {
        log::debug!("draw(fill {fill_mode}, start {start}, count {count}) is not applied");
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::context;
    use super::*;
    use crate::backend::{AttribType, BUFFER_INDEX32, BUFFER_NONE};
    use crate::error::EngineError;

    const VS: &str = "#version 450
        layout(std140, set = 0, binding = 0) uniform Transform { mat4 worldViewProj; };
        layout(location = 0) in vec3 position;
        void main() { gl_Position = worldViewProj * vec4(position, 1.0); }";
    const FS: &str = "#version 450
        layout(std140, set = 0, binding = 0) uniform Material { vec4 color; };
        layout(location = 0) out vec4 fragColor;
        void main() { fragColor = color; }";

    fn position_attr() -> [VertexAttributeDesc; 1] {
        [VertexAttributeDesc {
            location: 0,
            count: 3,
            kind: AttribType::Float,
            normalized: false,
            offset: 0,
        }]
    }

    #[test]
    fn index_width_follows_data() {
        let mut ctx = context();
        let small = ctx.create_index_buffer(&IndexData::U16(vec![0, 1, 2]));
        let wide = ctx.create_index_buffer(&IndexData::U32(vec![0, 1, 2]));

        let flags = |h: IndexBufferHandle| {
            let id = live(&ctx.index_buffers, h, "index buffer").buffer;
            ctx.backend().index_buffer(id).unwrap().1
        };
        assert_eq!(flags(small), BUFFER_NONE);
        assert_eq!(flags(wide), BUFFER_INDEX32);
    }

    #[test]
    fn padded_vertex_buffer_is_uploaded_whole() {
        let mut ctx = context();
        let bytes: Vec<u8> = (0..20).collect();
        let vb = ctx.create_vertex_buffer(&bytes, 12, &position_attr()).unwrap();

        let id = live(&ctx.vertex_buffers, vb, "vertex buffer").buffer;
        let (data, layout) = ctx.backend().vertex_buffer(id).unwrap();
        assert_eq!(data, &bytes[..]);
        assert_eq!(layout.stride, 12);
    }

    #[test]
    fn zero_stride_is_rejected() {
        let mut ctx = context();
        let err = ctx.create_vertex_buffer(&[0; 12], 0, &position_attr()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
        assert_eq!(ctx.backend().live_vertex_buffers(), 0);
    }

    #[test]
    fn bind_sets_index_then_streams_in_order() {
        let mut ctx = context();
        let program = ctx.create_program(VS, FS).unwrap();
        ctx.set_program(program);

        let ib = ctx.create_index_buffer(&IndexData::U16(vec![0, 1, 2]));
        let vb0 = ctx.create_vertex_buffer(&[0; 36], 12, &position_attr()).unwrap();
        let vb1 = ctx.create_vertex_buffer(&[0; 24], 12, &position_attr()).unwrap();
        let va = ctx.create_vertex_array();
        ctx.record_vertex_buffer(va, vb0);
        ctx.record_vertex_buffer(va, vb1);
        ctx.record_index_buffer(va, ib);

        ctx.bind_vertex_array(va);
        ctx.draw_indexed(0, 0, 3);

        let draw = &ctx.backend().draws()[0];
        let id = |h: VertexBufferHandle| live(&ctx.vertex_buffers, h, "vertex buffer").buffer;
        assert_eq!(draw.vertex_buffers, vec![(0, id(vb0)), (1, id(vb1))]);
        assert_eq!(
            draw.index_buffer,
            Some(live(&ctx.index_buffers, ib, "index buffer").buffer)
        );
    }

    #[test]
    fn every_draw_pushes_engine_state() {
        let mut ctx = context();
        let program = ctx.create_program(VS, FS).unwrap();
        ctx.set_program(program);
        ctx.set_state(true, 0.0, true);

        ctx.draw_indexed(0, 0, 0);
        ctx.draw_indexed(0, 0, 0);
        let draws = ctx.backend().draws();
        assert_eq!(draws.len(), 2);
        assert!(draws.iter().all(|d| d.state == ctx.engine_state()));
    }

    #[test]
    fn deleting_array_keeps_buffers() {
        let mut ctx = context();
        let vb = ctx.create_vertex_buffer(&[0; 12], 12, &position_attr()).unwrap();
        let va = ctx.create_vertex_array();
        ctx.record_vertex_buffer(va, vb);
        ctx.delete_vertex_array(va);
        assert_eq!(ctx.backend().live_vertex_buffers(), 1);
        ctx.delete_vertex_buffer(vb);
        assert_eq!(ctx.backend().live_vertex_buffers(), 0);
    }

    #[test]
    fn non_indexed_draw_is_dropped() {
        let mut ctx = context();
        ctx.draw(0, 0, 3);
        assert!(ctx.backend().draws().is_empty());
    }

    #[test]
    #[should_panic(expected = "draw_indexed requires a bound program")]
    fn draw_without_program_panics() {
        let mut ctx = context();
        ctx.draw_indexed(0, 0, 3);
    }

    #[test]
    #[should_panic(expected = "stale or foreign vertex buffer")]
    fn bind_after_buffer_delete_panics() {
        let mut ctx = context();
        let vb = ctx.create_vertex_buffer(&[0; 12], 12, &position_attr()).unwrap();
        let va = ctx.create_vertex_array();
        ctx.record_vertex_buffer(va, vb);
        ctx.delete_vertex_buffer(vb);
        ctx.bind_vertex_array(va);
    }
}
