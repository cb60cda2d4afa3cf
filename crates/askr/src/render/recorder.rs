//! A [`RenderDispatch`] that records every call instead of drawing.
//!
//! Used by tests to assert traversal order and by headless tools that want
//! a frame's draw list without a GPU.

use super::dispatch::{RenderDispatch, SceneFrame};
use crate::drawable::{BlendMode, PrimitiveType, TextureId, Vertex};
use crate::math::{Color, Mat4};

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    BeginScene(SceneFrame),
    EndScene,
    PushMatrix,
    PopMatrix,
    SetTransform(Mat4),
    SetVertexColor(Color),
    SetBlendMode(BlendMode),
    SetDepthState { test: bool, write: bool },
    SetBackfaceCulling(bool),
    BindTexture(Option<TextureId>),
    /// Number of vertices submitted.
    SubmitVertices(usize),
    Draw { primitive: PrimitiveType, count: usize },
}

#[derive(Debug, Default)]
pub struct RecordingDispatch {
    commands: Vec<DrawCommand>,
    depth: usize,
    max_depth: usize,
}

impl RecordingDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Take the recorded commands, leaving the recorder empty.
    pub fn take(&mut self) -> Vec<DrawCommand> {
        self.depth = 0;
        self.max_depth = 0;
        std::mem::take(&mut self.commands)
    }

    /// Matrix stack depth right now. Zero after a balanced frame.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Draw { .. }))
            .count()
    }

    /// World matrices in the order their draws were issued.
    pub fn drawn_transforms(&self) -> Vec<Mat4> {
        let mut current = Mat4::IDENTITY;
        let mut out = Vec::new();
        for command in &self.commands {
            match command {
                DrawCommand::SetTransform(m) => current = *m,
                DrawCommand::Draw { .. } => out.push(current),
                _ => {}
            }
        }
        out
    }

    /// Vertex colors in the order their draws were issued.
    pub fn drawn_colors(&self) -> Vec<Color> {
        let mut current = Color::WHITE;
        let mut out = Vec::new();
        for command in &self.commands {
            match command {
                DrawCommand::SetVertexColor(c) => current = *c,
                DrawCommand::Draw { .. } => out.push(current),
                _ => {}
            }
        }
        out
    }
}

impl RenderDispatch for RecordingDispatch {
    fn begin_scene(&mut self, frame: &SceneFrame) {
        self.commands.push(DrawCommand::BeginScene(frame.clone()));
    }

    fn end_scene(&mut self) {
        self.commands.push(DrawCommand::EndScene);
    }

    fn push_matrix(&mut self) {
        self.depth += 1;
        self.max_depth = self.max_depth.max(self.depth);
        self.commands.push(DrawCommand::PushMatrix);
    }

    fn pop_matrix(&mut self) {
        if self.depth == 0 {
            log::warn!("RecordingDispatch: pop_matrix on an empty stack");
        }
        self.depth = self.depth.saturating_sub(1);
        self.commands.push(DrawCommand::PopMatrix);
    }

    fn set_transform(&mut self, matrix: Mat4) {
        self.commands.push(DrawCommand::SetTransform(matrix));
    }

    fn set_vertex_color(&mut self, color: Color) {
        self.commands.push(DrawCommand::SetVertexColor(color));
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.commands.push(DrawCommand::SetBlendMode(mode));
    }

    fn set_depth_state(&mut self, test: bool, write: bool) {
        self.commands.push(DrawCommand::SetDepthState { test, write });
    }

    fn set_backface_culling(&mut self, enabled: bool) {
        self.commands.push(DrawCommand::SetBackfaceCulling(enabled));
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        self.commands.push(DrawCommand::BindTexture(texture));
    }

    fn submit_vertices(&mut self, vertices: &[Vertex]) {
        self.commands.push(DrawCommand::SubmitVertices(vertices.len()));
    }

    fn draw(&mut self, primitive: PrimitiveType, count: usize) {
        self.commands.push(DrawCommand::Draw { primitive, count });
    }
}
