//! # Drawables: What a Node Puts on Screen
//!
//! A node is only a transform plus state flags. What it *draws* is a
//! [`Drawable`] payload attached to it: raw mesh data, a textured image quad,
//! or a text label whose glyph quads were laid out elsewhere. Dispatch on
//! draw is a `match` over this enum rather than a deep type hierarchy.
//!
//! ## Ownership
//!
//! Meshes may be private to one node or shared between many (a forest of
//! identical trees). [`Attachment`] makes that explicit: `Owned` data is
//! dropped with the node, `Shared` data lives as long as any `Rc` holder.
//!
//! ## Vertex Layout
//!
//! ```text
//! Vertex (48 bytes)
//! ┌──────────────┬──────────────┬──────────┬──────────────┐
//! │ position     │ normal       │ uv       │ color        │
//! │ [f32; 3]     │ [f32; 3]     │ [f32; 2] │ [f32; 4]     │
//! └──────────────┴──────────────┴──────────┴──────────────┘
//! ```
//!
//! `#[repr(C)]` plus `bytemuck::Pod` lets a backend cast `&[Vertex]` straight
//! to bytes for upload.

use std::ops::Deref;
use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::math::{Vec2, Vec3};

/// One mesh vertex, in the node's local space.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    pub fn new(position: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: [0.0, 0.0, 1.0],
            uv: uv.to_array(),
            color: [1.0; 4],
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }
}

/// How a vertex stream is assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Triangles,
    TriangleFan,
    TriangleStrip,
    Lines,
    Points,
}

/// Framebuffer blending applied to a node's draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlendMode {
    Opaque,
    #[default]
    Alpha,
    Additive,
    Multiply,
}

/// Backend-side texture handle. Resolution of the handle to GPU memory is
/// the dispatcher's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureId(pub u32);

// ── Attachment ──────────────────────────────────────────────────────────

/// Payload data that is either owned by one node or shared between nodes.
#[derive(Debug, Clone)]
pub enum Attachment<T> {
    Owned(Box<T>),
    Shared(Rc<T>),
}

impl<T> Attachment<T> {
    pub fn owned(value: T) -> Self {
        Self::Owned(Box::new(value))
    }

    pub fn shared(value: Rc<T>) -> Self {
        Self::Shared(value)
    }

    /// `true` when dropping this attachment frees the data.
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }
}

impl<T> Deref for Attachment<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            Self::Owned(value) => value,
            Self::Shared(value) => value,
        }
    }
}

// ── Mesh ────────────────────────────────────────────────────────────────

/// CPU-side geometry: a vertex stream plus how to assemble it.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub primitive: PrimitiveType,
    /// `None` draws untextured.
    pub texture: Option<TextureId>,
}

impl Mesh {
    pub fn new(primitive: PrimitiveType) -> Self {
        Self {
            vertices: Vec::new(),
            primitive,
            texture: None,
        }
    }

    /// A `width` × `height` quad centred on the origin, as a triangle fan.
    pub fn quad(width: f32, height: f32) -> Self {
        let (hw, hh) = (width * 0.5, height * 0.5);
        Self {
            vertices: vec![
                Vertex::new(Vec3::new(-hw, -hh, 0.0), Vec2::new(0.0, 1.0)),
                Vertex::new(Vec3::new(hw, -hh, 0.0), Vec2::new(1.0, 1.0)),
                Vertex::new(Vec3::new(hw, hh, 0.0), Vec2::new(1.0, 0.0)),
                Vertex::new(Vec3::new(-hw, hh, 0.0), Vec2::new(0.0, 0.0)),
            ],
            primitive: PrimitiveType::TriangleFan,
            texture: None,
        }
    }

    /// A closed polygon outline from 2D points, as a triangle fan.
    pub fn polygon(points: &[Vec2]) -> Self {
        Self {
            vertices: points
                .iter()
                .map(|p| Vertex::new(p.extend(0.0), Vec2::ZERO))
                .collect(),
            primitive: PrimitiveType::TriangleFan,
            texture: None,
        }
    }

    pub fn with_texture(mut self, texture: TextureId) -> Self {
        self.texture = Some(texture);
        self
    }

    /// Half extents of the axis-aligned box around all vertices, measured
    /// from the local origin.
    pub fn half_extents(&self) -> Vec3 {
        self.vertices
            .iter()
            .fold(Vec3::ZERO, |acc, v| acc.max(v.position().abs()))
    }

    /// Distance from the local origin to the farthest vertex.
    pub fn radius(&self) -> f32 {
        self.vertices
            .iter()
            .fold(0.0_f32, |acc, v| acc.max(v.position().length()))
    }
}

// ── Image / Label ───────────────────────────────────────────────────────

/// A textured quad of a given size.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    /// `None` means the texture failed to load or was never set; the quad is
    /// still drawn untextured.
    pub texture: Option<TextureId>,
    pub size: Vec2,
}

/// Text plus its pre-shaped glyph geometry.
#[derive(Debug, Clone)]
pub struct Label {
    pub text: String,
    /// Glyph quads produced by an external text layout step.
    pub layout: Option<Attachment<Mesh>>,
}

// ── Drawable ────────────────────────────────────────────────────────────

/// The payload a node draws.
#[derive(Debug, Clone, Default)]
pub enum Drawable {
    /// Pure transform/grouping node.
    #[default]
    None,
    Mesh(Attachment<Mesh>),
    Image(Image),
    Label(Label),
}

impl Drawable {
    pub fn mesh(mesh: Mesh) -> Self {
        Self::Mesh(Attachment::owned(mesh))
    }

    pub fn shared_mesh(mesh: Rc<Mesh>) -> Self {
        Self::Mesh(Attachment::shared(mesh))
    }

    pub fn image(texture: Option<TextureId>, size: Vec2) -> Self {
        Self::Image(Image { texture, size })
    }

    pub fn label(text: impl Into<String>) -> Self {
        Self::Label(Label {
            text: text.into(),
            layout: None,
        })
    }

    /// The mesh data when this node is mesh-backed.
    pub fn as_mesh(&self) -> Option<&Mesh> {
        match self {
            Self::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self, Self::Mesh(_))
    }

    /// Half extents of the payload's local bounds, if it has geometry.
    pub fn half_extents(&self) -> Option<Vec3> {
        match self {
            Self::None => None,
            Self::Mesh(mesh) => Some(mesh.half_extents()),
            Self::Image(image) => Some((image.size * 0.5).extend(0.0)),
            Self::Label(label) => label.layout.as_ref().map(|m| m.half_extents()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_bounds() {
        let quad = Mesh::quad(4.0, 2.0);
        assert_eq!(quad.half_extents(), Vec3::new(2.0, 1.0, 0.0));
        assert!((quad.radius() - 5.0_f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn shared_mesh_is_not_owned() {
        let mesh = Rc::new(Mesh::quad(1.0, 1.0));
        let drawable = Drawable::shared_mesh(mesh.clone());
        match &drawable {
            Drawable::Mesh(attachment) => assert!(!attachment.is_owned()),
            _ => panic!("expected mesh"),
        }
        drop(drawable);
        assert_eq!(Rc::strong_count(&mesh), 1);
    }

    #[test]
    fn only_meshes_are_mesh_backed() {
        assert!(Drawable::mesh(Mesh::quad(1.0, 1.0)).as_mesh().is_some());
        assert!(Drawable::image(None, Vec2::ONE).as_mesh().is_none());
        assert!(Drawable::None.as_mesh().is_none());
    }

    #[test]
    fn vertex_is_plain_bytes() {
        let quad = Mesh::quad(1.0, 1.0);
        let bytes: &[u8] = bytemuck::cast_slice(&quad.vertices);
        assert_eq!(bytes.len(), 4 * std::mem::size_of::<Vertex>());
        assert_eq!(std::mem::size_of::<Vertex>(), 48);
    }
}
