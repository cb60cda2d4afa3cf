//! # Render Dispatch: the Backend Seam
//!
//! The scene never talks to a GPU. It walks the tree and issues calls on a
//! [`RenderDispatch`] implementation, in strict nesting that matches tree
//! depth:
//!
//! ```text
//! begin_scene(frame)
//!   push_matrix
//!     set_transform(world) · set_vertex_color · draw state · draw …
//!     push_matrix                 ← child
//!       …
//!     pop_matrix
//!   pop_matrix
//! end_scene
//! ```
//!
//! A backend may keep its own matrix stack or ignore `push/pop` entirely and
//! rely on the absolute `set_transform` it receives for every drawn node.
//!
//! ## Comparison
//!
//! - **wgpu renderers**: record into command encoders and submit per pass; a
//!   wgpu backend would implement this trait by batching into a render pass.
//! - **Immediate-mode GL**: maps one to one (`glPushMatrix`, `glColor4f`,
//!   `glBindTexture`, `glDrawArrays`).

use crate::drawable::{BlendMode, PrimitiveType, TextureId, Vertex};
use crate::light::LightData;
use crate::math::{Color, Mat4, Vec3};

/// Linear distance fog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub color: Color,
    pub start: f32,
    pub end: f32,
}

/// Per-frame data handed to the backend before any draw.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneFrame {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    /// `None` leaves the target's contents in place.
    pub clear_color: Option<Color>,
    pub ambient_color: Color,
    pub fog: Option<Fog>,
    pub lighting_enabled: bool,
    pub lights: Vec<LightData>,
}

/// Fixed-function state a node carries and pushes before drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawState {
    pub blend_mode: BlendMode,
    pub depth_test: bool,
    pub depth_write: bool,
    pub backface_culled: bool,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            blend_mode: BlendMode::default(),
            depth_test: true,
            depth_write: true,
            backface_culled: true,
        }
    }
}

impl DrawState {
    /// Issue only the calls needed to go from `current` to `self`.
    pub fn apply_diff(&self, current: &DrawState, dispatch: &mut dyn RenderDispatch) {
        if self.blend_mode != current.blend_mode {
            dispatch.set_blend_mode(self.blend_mode);
        }
        if self.depth_test != current.depth_test || self.depth_write != current.depth_write {
            dispatch.set_depth_state(self.depth_test, self.depth_write);
        }
        if self.backface_culled != current.backface_culled {
            dispatch.set_backface_culling(self.backface_culled);
        }
    }

    /// Issue every call, used at the start of a frame.
    pub fn apply_all(&self, dispatch: &mut dyn RenderDispatch) {
        dispatch.set_blend_mode(self.blend_mode);
        dispatch.set_depth_state(self.depth_test, self.depth_write);
        dispatch.set_backface_culling(self.backface_culled);
    }
}

/// The operations the scene needs from a rendering backend.
pub trait RenderDispatch {
    fn begin_scene(&mut self, frame: &SceneFrame);
    fn end_scene(&mut self);

    fn push_matrix(&mut self);
    fn pop_matrix(&mut self);
    /// Absolute world matrix for subsequent draws.
    fn set_transform(&mut self, matrix: Mat4);

    fn set_vertex_color(&mut self, color: Color);
    fn set_blend_mode(&mut self, mode: BlendMode);
    fn set_depth_state(&mut self, test: bool, write: bool);
    fn set_backface_culling(&mut self, enabled: bool);
    /// `None` unbinds, drawing untextured.
    fn bind_texture(&mut self, texture: Option<TextureId>);

    fn submit_vertices(&mut self, vertices: &[Vertex]);
    fn draw(&mut self, primitive: PrimitiveType, vertex_count: usize);
}
