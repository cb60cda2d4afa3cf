//! Convenience re-exports: `use askr::prelude::*` for the common items.

// Core
pub use crate::camera::{Camera, Frustum, Projection};
pub use crate::config::{EngineConfig, PhysicsConfig, SceneConfig};
pub use crate::document::{Document, Entry, Value};
pub use crate::drawable::{Attachment, BlendMode, Drawable, Mesh, PrimitiveType, TextureId, Vertex};
pub use crate::error::{Error, Result};
pub use crate::events::{EventDispatcher, EventHandler, ListenerId};
pub use crate::graph::{Behavior, Node, NodeId, SceneGraph};
pub use crate::light::{Light, LightKind};
pub use crate::math::{Color, Mat4, Quat, Ray, Vec2, Vec3, Vec4};
pub use crate::render::{RecordingDispatch, RenderDispatch, SceneFrame};
pub use crate::scene::Scene;
pub use crate::time::FixedStep;

// Physics
pub use crate::physics::{
    BodyParams, BodyState, CollisionEvent, CollisionKind, PhysicsBackend, PhysicsEntity, PhysicsScene, ShapeKind,
};
#[cfg(feature = "physics2d")]
pub use crate::physics::rapier2d::Rapier2dBackend;
#[cfg(feature = "physics3d")]
pub use crate::physics::rapier3d::Rapier3dBackend;
