//! Programs, uniform lookups and uniform writes.

use crate::backend::{Backend, ProgramId};
use crate::error::{EngineError, Result};
use crate::shader::{
    ProgramData, ProgramHandle, UniformData, UniformDescriptor, UniformKind, UniformRef,
};
use crate::texture::TextureHandle;

use super::{live, RenderContext};

/// Floats in one uniform register.
const REGISTER_FLOATS: usize = 4;

const MATRIX_FLOATS: usize = 16;

impl<B: Backend> RenderContext<B> {
    /// Compiles and links a program from GLSL-like sources.
    ///
    /// Fails without creating any backend object when a uniform shape cannot
    /// be encoded.
    pub fn create_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramHandle> {
        let data = ProgramData::compile(
            &mut self.backend,
            &*self.compiler,
            vertex_source,
            fragment_source,
            &self.init.shader,
        )?;
        Ok(self.programs.insert(data))
    }

    /// Resolves each name to a uniform of `program`; unknown names give `None`.
    ///
    /// # Panics
    /// Panics if `program` was deleted.
    pub fn get_uniforms<S: AsRef<str>>(
        &self,
        program: ProgramHandle,
        names: &[S],
    ) -> Vec<Option<UniformRef>> {
        let data = live(&self.programs, program, "program");
        names
            .iter()
            .map(|name| {
                data.lookup_uniform(name.as_ref())
                    .map(|(stage, index)| UniformRef { program, stage, index })
            })
            .collect()
    }

    /// Location of each named vertex input, or -1.
    ///
    /// # Panics
    /// Panics if `program` was deleted.
    pub fn get_attributes<S: AsRef<str>>(&self, program: ProgramHandle, names: &[S]) -> Vec<i32> {
        let data = live(&self.programs, program, "program");
        names
            .iter()
            .map(|name| data.attribute_location(name.as_ref()))
            .collect()
    }

    /// Makes `program` the target of subsequent uniform writes and draws.
    ///
    /// # Panics
    /// Panics if `program` was deleted.
    pub fn set_program(&mut self, program: ProgramHandle) {
        assert!(
            self.programs.contains(program),
            "stale or foreign program handle {program:?}"
        );
        self.current_program = Some(program);
    }

    /// Destroys the program and its shaders. Clears the current program slot
    /// when it pointed here.
    ///
    /// # Panics
    /// Panics if `program` was already deleted.
    pub fn delete_program(&mut self, program: ProgramHandle) {
        let Some(data) = self.programs.remove(program) else {
            panic!("stale or foreign program handle {program:?}");
        };
        data.destroy(&mut self.backend);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    /// # Panics
    /// Panics if the owning program was deleted.
    pub fn uniform_descriptor(&self, uniform: UniformRef) -> &UniformDescriptor {
        &self.uniform_data(uniform).descriptor
    }

    fn uniform_data(&self, uniform: UniformRef) -> &UniformData {
        let data = live(&self.programs, uniform.program, "program");
        match data.stage_uniforms(uniform.stage).get(uniform.index) {
            Some(entry) => entry,
            None => panic!(
                "uniform index {} out of range for the {} stage",
                uniform.index, uniform.stage
            ),
        }
    }

    /// Current program id, for operations that require one.
    pub(super) fn bound_program(&self, operation: &str) -> ProgramId {
        let Some(handle) = self.current_program else {
            panic!("{operation} requires a bound program");
        };
        live(&self.programs, handle, "program").program
    }

    /// Writes `registers` registers of `values` to a numeric uniform.
    fn write_registers(
        &mut self,
        uniform: UniformRef,
        values: &[f32],
        registers: u16,
        operation: &str,
    ) {
        self.bound_program(operation);
        let entry = self.uniform_data(uniform);
        assert!(
            entry.descriptor.kind != UniformKind::Sampler,
            "{operation} on sampler uniform `{}`",
            entry.descriptor.name
        );
        let handle = entry.handle;
        self.backend.set_uniform(handle, values, registers);
    }

    // ── uniform writes ────────────────────────────────────────────────────
    //
    // Every write needs a bound program and a live uniform reference; both
    // are caller contracts and panic when broken.

    pub fn set_matrix(&mut self, uniform: UniformRef, matrix: &[f32; MATRIX_FLOATS]) {
        self.assert_matrix(uniform, "set_matrix");
        self.write_registers(uniform, matrix, 4, "set_matrix");
    }

    /// Writes consecutive 4x4 matrices starting at `uniform`.
    ///
    /// # Panics
    /// Panics if `uniform` is not a 4x4 matrix.
    pub fn set_matrices(&mut self, uniform: UniformRef, matrices: &[f32]) -> Result<()> {
        self.assert_matrix(uniform, "set_matrices");
        if matrices.len() % MATRIX_FLOATS != 0 {
            return Err(EngineError::InvalidArgument(format!(
                "matrix array of {} floats is not a multiple of {MATRIX_FLOATS}",
                matrices.len()
            )));
        }
        let registers = register_count(matrices.len())?;
        self.write_registers(uniform, matrices, registers, "set_matrices");
        Ok(())
    }

    fn assert_matrix(&self, uniform: UniformRef, operation: &str) {
        let kind = self.uniform_data(uniform).descriptor.kind;
        assert!(kind == UniformKind::Matrix4, "{operation} on a {kind:?} uniform");
    }

    pub fn set_float(&mut self, uniform: UniformRef, x: f32) {
        self.set_float4(uniform, x, 0.0, 0.0, 0.0);
    }

    pub fn set_float2(&mut self, uniform: UniformRef, x: f32, y: f32) {
        self.set_float4(uniform, x, y, 0.0, 0.0);
    }

    pub fn set_float3(&mut self, uniform: UniformRef, x: f32, y: f32, z: f32) {
        self.set_float4(uniform, x, y, z, 0.0);
    }

    pub fn set_float4(&mut self, uniform: UniformRef, x: f32, y: f32, z: f32, w: f32) {
        self.write_registers(uniform, &[x, y, z, w], 1, "set_float");
    }

    /// Packs `values` into whole registers, zero-filling the last one.
    pub fn set_float_array(&mut self, uniform: UniformRef, values: &[f32]) -> Result<()> {
        if values.is_empty() {
            log::debug!("set_float_array with no values ignored");
            return Ok(());
        }
        let registers = register_count(values.len())?;
        let mut padded = values.to_vec();
        padded.resize(registers as usize * REGISTER_FLOATS, 0.0);
        self.write_registers(uniform, &padded, registers, "set_float_array");
        Ok(())
    }

    /// Binds `texture` to the sampler's slot for the next draw.
    ///
    /// # Panics
    /// Panics if no program is bound, `uniform` is not a sampler, or the
    /// texture was never loaded.
    pub fn set_texture(&mut self, uniform: UniformRef, texture: TextureHandle) {
        self.bound_program("set_texture");
        let entry = self.uniform_data(uniform);
        let Some(slot) = entry.descriptor.slot else {
            panic!("set_texture on non-sampler uniform `{}`", entry.descriptor.name);
        };
        let sampler = entry.handle;

        let Some(id) = live(&self.textures, texture, "texture").texture else {
            panic!("set_texture with texture {texture:?} that was never loaded");
        };
        self.backend.set_texture(slot, sampler, id);
    }
}

fn register_count(floats: usize) -> Result<u16> {
    u16::try_from(floats.div_ceil(REGISTER_FLOATS)).map_err(|_| {
        EngineError::InvalidArgument(format!("{floats} floats exceed the uniform register range"))
    })
}
