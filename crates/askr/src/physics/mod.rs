//! # Physics: Backend Seam and Collision Bridge
//!
//! The simulation itself is a black box behind [`PhysicsBackend`]. This
//! module defines what the scene needs from it (create bodies, step, read
//! poses and contacts, push forces) and the bridge that keeps scene nodes
//! and bodies in sync.
//!
//! ```text
//!          PhysicsScene::step(frame_dt)
//!                     │
//!   purge bodies of destroyed nodes (End events)
//!                     │
//!   fixed-step accumulator ──► n steps
//!                     │
//!   for each step:
//!     push collision-only node poses ──► kinematic bodies
//!     backend.step(dt)
//!     pull dynamic body poses ──► node matrices (pure, no decomposition)
//!     contact diff ──► Begin / Persist / End events
//! ```
//!
//! ## Backends
//!
//! | Backend | Feature | Notes |
//! |---|---|---|
//! | [`rapier2d::Rapier2dBackend`] | `physics2d` | Z is ignored; rotation is about Z |
//! | [`rapier3d::Rapier3dBackend`] | `physics3d` | |
//!
//! Ray and point queries go through each backend's own collision world. The
//! Rapier backends answer them from the broad-phase tree, which is refreshed
//! by `step`, so a body created or teleported since the last step is not
//! seen until the next one.

pub mod bridge;
pub mod contacts;
#[cfg(feature = "physics2d")]
pub mod rapier2d;
#[cfg(feature = "physics3d")]
pub mod rapier3d;
#[cfg(test)]
pub(crate) mod testing;

pub use bridge::{BodyParams, BodyState, CollisionEvent, CollisionKind, PhysicsEntity, PhysicsScene};
pub use contacts::{BodyPair, ContactChange, ContactPhase, ContactTracker};

use crate::math::{Quat, Vec3};

/// Backend-assigned body handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u64);

/// How a bridged body moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyKind {
    /// Never moves.
    Static,
    /// Integrated by the simulation; its pose drives the node.
    Dynamic,
    /// Kinematic; the node's pose drives the body. Only reports contacts.
    CollisionOnly,
}

/// Which bounds of a node become its collision shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// Box of the node's bounding half extents.
    Rect,
    /// Ball of the node's bounding radius.
    Circle,
    /// Convex hull of the node's mesh vertices. Requires a mesh-backed node.
    Mesh,
}

/// Collision geometry in physics units, local to the body.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyShape {
    Cuboid { half_extents: Vec3 },
    Ball { radius: f32 },
    ConvexPolygon { points: Vec<Vec3> },
}

/// Position and orientation of a body in physics units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPose {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl BodyPose {
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn to_local(&self, world: Vec3) -> Vec3 {
        self.rotation.inverse() * (world - self.translation)
    }
}

/// Everything a backend needs to create a body.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    pub kind: BodyKind,
    pub shape: BodyShape,
    pub pose: BodyPose,
    pub friction: f32,
    pub density: f32,
    pub restitution: f32,
    pub is_sensor: bool,
    pub fixed_rotation: bool,
}

/// One touching body pair as reported by the backend after a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub body_a: BodyId,
    pub body_b: BodyId,
    /// Unit normal pointing from `body_a` towards `body_b`.
    pub world_normal: Vec3,
    pub world_point: Vec3,
    /// Normal impulse magnitude applied this step.
    pub impulse: f32,
    /// Tangent impulse magnitude. The Rapier backends do not extract it and
    /// always report `0.0`.
    pub friction_impulse: f32,
}

/// Result of a ray query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub body: BodyId,
    /// Fraction of the ray direction at the hit.
    pub toi: f32,
    pub point: Vec3,
    pub normal: Vec3,
}

/// What the bridge needs from a rigid-body simulation. All quantities are in
/// physics units.
pub trait PhysicsBackend {
    /// `None` when the backend cannot build the body (e.g. a degenerate hull).
    fn create_body(&mut self, desc: &BodyDesc) -> Option<BodyId>;
    fn destroy_body(&mut self, body: BodyId) -> bool;
    fn step(&mut self, dt: f32);

    fn body_pose(&self, body: BodyId) -> Option<BodyPose>;
    /// Teleport a body, bypassing integration.
    fn set_body_pose(&mut self, body: BodyId, pose: BodyPose);
    /// Target pose of a kinematic body for the next step.
    fn set_kinematic_pose(&mut self, body: BodyId, pose: BodyPose);

    /// Touching pairs after the last step.
    fn contacts(&self) -> Vec<Contact>;

    fn apply_force(&mut self, body: BodyId, force: Vec3);
    fn apply_impulse(&mut self, body: BodyId, impulse: Vec3);
    fn set_linear_velocity(&mut self, body: BodyId, velocity: Vec3);
    fn linear_velocity(&self, body: BodyId) -> Option<Vec3>;
    fn set_angular_velocity(&mut self, body: BodyId, velocity: Vec3);

    fn wake_up(&mut self, body: BodyId);
    /// `None` for unknown bodies.
    fn is_sleeping(&self, body: BodyId) -> Option<bool>;
    fn set_gravity(&mut self, gravity: Vec3);

    /// Closest body hit by `origin + dir * t`, `t ∈ [0, max_toi]`.
    fn cast_ray(&self, origin: Vec3, dir: Vec3, max_toi: f32) -> Option<RayHit>;
    fn bodies_at_point(&self, point: Vec3) -> Vec<BodyId>;
}
