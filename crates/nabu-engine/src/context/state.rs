//! Render state: culling, winding and blending.
//!
//! Depth, color-write and z-offset controls are accepted and logged but do not
//! reach the backend state word.

use crate::backend::{
    Backend, STATE_BLEND_MASK, STATE_BLEND_NORMAL, STATE_CULL_CCW, STATE_CULL_CW, STATE_CULL_MASK,
    STATE_FRONT_CCW,
};
use crate::error::{EngineError, Result};

use super::RenderContext;

/// Blend code that disables blending.
pub const BLEND_MODE_DISABLE: i32 = 0;

/// Blend code for standard alpha blending.
pub const BLEND_MODE_NORMAL: i32 = 25;

impl<B: Backend> RenderContext<B> {
    /// Recomputes culling and front-face winding.
    ///
    /// `reverse_side` selects clockwise front faces (culling clockwise);
    /// otherwise front faces are counter-clockwise (culling counter-clockwise).
    pub fn set_state(&mut self, culling: bool, z_offset: f32, reverse_side: bool) {
        self.engine_state &= !STATE_CULL_MASK;
        if reverse_side {
            self.engine_state &= !STATE_FRONT_CCW;
            if culling {
                self.engine_state |= STATE_CULL_CW;
            }
        } else {
            self.engine_state |= STATE_FRONT_CCW;
            if culling {
                self.engine_state |= STATE_CULL_CCW;
            }
        }

        self.set_z_offset(z_offset);
        self.backend.set_state(self.engine_state);
    }

    /// Applies one of the two supported blend codes. Any other code fails and
    /// leaves the state untouched.
    pub fn set_blend_mode(&mut self, mode: i32) -> Result<()> {
        let blend = match mode {
            BLEND_MODE_DISABLE => 0,
            BLEND_MODE_NORMAL => STATE_BLEND_NORMAL,
            other => {
                log::warn!("unsupported blend mode {other}");
                return Err(EngineError::UnsupportedBlendMode(other));
            }
        };

        self.engine_state = (self.engine_state & !STATE_BLEND_MASK) | blend;
        self.backend.set_state(self.engine_state);
        Ok(())
    }

    pub fn set_z_offset(&mut self, offset: f32) {
        if offset != self.z_offset {
            log::debug!("z offset {offset} recorded, not applied");
        }
        self.z_offset = offset;
    }

    pub fn z_offset(&self) -> f32 {
        self.z_offset
    }

    pub fn set_depth_test(&mut self, enable: bool) {
        log::debug!("set_depth_test({enable}) is not applied");
    }

    pub fn set_depth_write(&mut self, enable: bool) {
        log::debug!("set_depth_write({enable}) recorded, not applied");
        self.depth_write = enable;
    }

    pub fn depth_write(&self) -> bool {
        self.depth_write
    }

    pub fn set_color_write(&mut self, enable: bool) {
        log::debug!("set_color_write({enable}) is not applied");
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::context;
    use super::*;
    use crate::backend::STATE_DEFAULT;

    fn cull_bits(state: u64) -> (u64, bool) {
        (state & STATE_CULL_MASK, state & STATE_FRONT_CCW != 0)
    }

    #[test]
    fn culling_follows_winding() {
        let mut ctx = context();

        ctx.set_state(true, 0.0, false);
        assert_eq!(cull_bits(ctx.engine_state()), (STATE_CULL_CCW, true));

        ctx.set_state(true, 0.0, true);
        assert_eq!(cull_bits(ctx.engine_state()), (STATE_CULL_CW, false));

        ctx.set_state(false, 0.0, false);
        assert_eq!(cull_bits(ctx.engine_state()), (0, true));

        ctx.set_state(false, 0.0, true);
        assert_eq!(cull_bits(ctx.engine_state()), (0, false));
    }

    #[test]
    fn set_state_keeps_other_bits() {
        let mut ctx = context();
        ctx.set_blend_mode(BLEND_MODE_NORMAL).unwrap();
        ctx.set_state(true, 0.5, false);

        let state = ctx.engine_state();
        assert_eq!(state & STATE_BLEND_MASK, STATE_BLEND_NORMAL);
        let untouched = !(STATE_CULL_MASK | STATE_FRONT_CCW | STATE_BLEND_MASK);
        assert_eq!(state & untouched, STATE_DEFAULT & untouched);
        assert_eq!(ctx.z_offset(), 0.5);
    }

    #[test]
    fn blend_disable_clears_only_blend_bits() {
        let mut ctx = context();
        ctx.set_state(true, 0.0, true);
        ctx.set_blend_mode(BLEND_MODE_NORMAL).unwrap();
        let before = ctx.engine_state();

        ctx.set_blend_mode(BLEND_MODE_DISABLE).unwrap();
        assert_eq!(ctx.engine_state() & STATE_BLEND_MASK, 0);
        assert_eq!(ctx.engine_state(), before & !STATE_BLEND_MASK);
    }

    #[test]
    fn unsupported_blend_leaves_state_alone() {
        let mut ctx = context();
        ctx.set_blend_mode(BLEND_MODE_NORMAL).unwrap();
        let before = ctx.engine_state();

        let err = ctx.set_blend_mode(7).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedBlendMode(7)));
        assert_eq!(ctx.engine_state(), before);
    }

    #[test]
    fn stubs_record_without_touching_state() {
        let mut ctx = context();
        let before = ctx.engine_state();
        ctx.set_depth_test(false);
        ctx.set_depth_write(false);
        ctx.set_color_write(false);
        ctx.set_z_offset(2.0);
        assert!(!ctx.depth_write());
        assert_eq!(ctx.z_offset(), 2.0);
        assert_eq!(ctx.engine_state(), before);
    }
}
