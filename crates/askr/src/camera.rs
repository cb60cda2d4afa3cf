//! # Camera: View, Projection and Frustum
//!
//! A [`Camera`] does not own a transform of its own. It points at a node in
//! the scene graph and derives its view from that node's concatenated
//! matrix, so a camera can be parented to a moving object like any other
//! node.
//!
//! ```text
//!   camera node (world matrix W)
//!         │
//!         ▼
//!   view = flip × W⁻¹        projection = perspective_rh / orthographic_rh
//!         │                              │
//!         └──────────► view_proj ◄───────┘
//!                          │
//!                          ▼
//!                  Frustum (6 planes)
//! ```
//!
//! A camera looks along its node's +Z axis, the same axis
//! [`SceneGraph::look_at`] aims at a target, so `look_at` on a camera node
//! points the camera. glam's right-handed projections look down −Z, hence
//! the half turn about Y in the view matrix.
//!
//! ## Frustum Culling
//!
//! Planes are extracted from the view-projection matrix (Gribb/Hartmann),
//! normalized, and tested against bounding spheres. glam's `_rh` projections
//! map depth to `[0, 1]`, so the near plane is row 2 alone.

use std::f32::consts::PI;

use crate::graph::{NodeId, SceneGraph};
use crate::math::{Mat4, Quat, Vec3, Vec4};

/// Projection model for a [`Camera`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in degrees.
        fov_y_degrees: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        /// Half of the visible height in world units; width follows the aspect.
        half_height: f32,
        near: f32,
        far: f32,
    },
}

impl Default for Projection {
    fn default() -> Self {
        Self::Perspective {
            fov_y_degrees: 45.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

/// A viewpoint bound to a scene-graph node.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub node: NodeId,
    pub projection: Projection,
    /// Viewport width / height.
    pub aspect: f32,
}

impl Camera {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            projection: Projection::default(),
            aspect: 16.0 / 9.0,
        }
    }

    pub fn perspective(node: NodeId, fov_y_degrees: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Perspective {
                fov_y_degrees,
                near,
                far,
            },
            ..Self::new(node)
        }
    }

    pub fn orthographic(node: NodeId, half_height: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Orthographic {
                half_height,
                near,
                far,
            },
            ..Self::new(node)
        }
    }

    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }

    /// A camera is usable while its node is alive.
    pub fn is_reachable(&self, graph: &SceneGraph) -> bool {
        graph.contains(self.node)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        let aspect = if self.aspect.is_finite() && self.aspect > 0.0 {
            self.aspect
        } else {
            1.0
        };
        match self.projection {
            Projection::Perspective {
                fov_y_degrees,
                near,
                far,
            } => Mat4::perspective_rh(fov_y_degrees.to_radians(), aspect, near, far),
            Projection::Orthographic {
                half_height,
                near,
                far,
            } => {
                let half_width = half_height * aspect;
                Mat4::orthographic_rh(-half_width, half_width, -half_height, half_height, near, far)
            }
        }
    }

    pub fn view_matrix(&self, graph: &SceneGraph) -> Mat4 {
        Mat4::from_rotation_y(PI) * graph.concatenated_matrix(self.node).inverse()
    }

    pub fn view_projection(&self, graph: &SceneGraph) -> Mat4 {
        self.projection_matrix() * self.view_matrix(graph)
    }

    pub fn position(&self, graph: &SceneGraph) -> Vec3 {
        graph.combined_position(self.node)
    }

    /// World rotation of the camera node; billboards copy it.
    pub fn rotation(&self, graph: &SceneGraph) -> Quat {
        graph.concatenated_rotation(self.node)
    }

    /// Unit vector the camera looks along, in world space.
    pub fn forward(&self, graph: &SceneGraph) -> Vec3 {
        (self.rotation(graph) * Vec3::Z).normalize_or_zero()
    }

    pub fn frustum(&self, graph: &SceneGraph) -> Frustum {
        Frustum::from_view_projection(&self.view_projection(graph))
    }
}

// ── Frustum ─────────────────────────────────────────────────────────────

/// Six inward-facing planes `(n, d)` with `n·p + d ≥ 0` inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    pub fn from_view_projection(m: &Mat4) -> Self {
        let (r0, r1, r2, r3) = (m.row(0), m.row(1), m.row(2), m.row(3));
        let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2].map(|p| {
            let len = p.truncate().length();
            if len > f32::EPSILON { p / len } else { p }
        });
        Self { planes }
    }

    /// `true` when any part of the sphere may be visible.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(center) + plane.w >= -radius)
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.intersects_sphere(point, 0.0)
    }
}
