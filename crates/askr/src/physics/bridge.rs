//! # Bridge: Scene Nodes ⇄ Physics Bodies
//!
//! [`PhysicsScene`] owns a [`Scene`] and a [`PhysicsBackend`] and pairs nodes
//! with bodies. The node's transform is what gets rendered; the body is where
//! the simulation happens. Which side is authoritative depends on the kind:
//!
//! ```text
//! kind            before step                 after step
//! ─────────────   ─────────────────────────   ───────────────────────────
//! Static          -                           -
//! Dynamic         -                           body pose ──► node (pure)
//! CollisionOnly   node pose ──► kinematic     -
//! ```
//!
//! `warp` is the one exception: it writes a pose into a dynamic body and its
//! node at the same time.
//!
//! ## Units
//!
//! `world_scale` is scene units per physics unit. Positions, velocities,
//! forces and shape sizes are divided by it on the way into the backend and
//! multiplied on the way out. Gravity is given in physics units.
//!
//! ## Node lifetime
//!
//! Bodies are keyed by [`NodeId`]. A node destroyed directly through the
//! graph leaves its body orphaned until the start of the next step, when the
//! bridge notices, ends the body's contacts and destroys it.

use std::collections::{BTreeMap, HashMap};

use super::contacts::{ContactChange, ContactPhase, ContactTracker};
use super::{BodyDesc, BodyId, BodyKind, BodyPose, BodyShape, PhysicsBackend, ShapeKind};
use crate::config::PhysicsConfig;
use crate::diag::LogOnce;
use crate::events::EventDispatcher;
use crate::graph::NodeId;
use crate::math::{Mat4, Quat, Vec3};
use crate::render::RenderDispatch;
use crate::scene::Scene;
use crate::time::FixedStep;

/// Material and behavior flags for a new body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyParams {
    pub is_static: bool,
    pub friction: f32,
    pub density: f32,
    pub restitution: f32,
    /// Reports overlaps but produces no contact response.
    pub is_sensor: bool,
    /// Never rotates, whatever torque it receives.
    pub fixed_rotation: bool,
}

impl Default for BodyParams {
    fn default() -> Self {
        Self {
            is_static: false,
            friction: 0.5,
            density: 1.0,
            restitution: 0.0,
            is_sensor: false,
            fixed_rotation: false,
        }
    }
}

impl BodyParams {
    pub fn dynamic() -> Self {
        Self::default()
    }

    pub fn fixed() -> Self {
        Self {
            is_static: true,
            ..Self::default()
        }
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn sensor(mut self) -> Self {
        self.is_sensor = true;
        self
    }

    pub fn with_fixed_rotation(mut self) -> Self {
        self.fixed_rotation = true;
        self
    }
}

/// One node paired with one body.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsEntity {
    pub node: NodeId,
    pub body: BodyId,
    pub kind: BodyKind,
    pub shape: ShapeKind,
    pub params: BodyParams,
}

/// Lifecycle of a bridged body as seen from the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyState {
    Active,
    Sleeping,
    /// No body for this node (never added, removed or purged).
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionKind {
    Begin,
    Persist,
    End,
}

/// Collision notification handed to gameplay code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    pub kind: CollisionKind,
    pub entity_a: NodeId,
    pub entity_b: NodeId,
    /// Unit normal pointing from `entity_a` towards `entity_b`.
    pub world_normal: Vec3,
    /// `world_normal` in `entity_a`'s local space.
    pub local_normal: Vec3,
    /// Contact point in scene units.
    pub world_point: Vec3,
    /// `world_point` in `entity_a`'s local space.
    pub local_point: Vec3,
    pub impact_strength: f32,
    pub friction_strength: f32,
}

/// A scene with a physics simulation attached.
pub struct PhysicsScene<B: PhysicsBackend> {
    scene: Scene,
    backend: B,
    config: PhysicsConfig,
    entities: BTreeMap<NodeId, PhysicsEntity>,
    nodes_by_body: HashMap<BodyId, NodeId>,
    contacts: ContactTracker,
    events: EventDispatcher<CollisionEvent>,
    fixed_step: FixedStep,
    log_once: LogOnce,
}

impl<B: PhysicsBackend> PhysicsScene<B> {
    pub fn new(scene: Scene, mut backend: B, config: PhysicsConfig) -> Self {
        backend.set_gravity(config.gravity);
        let fixed_step = FixedStep::new(config.timestep, config.max_frame_delta);
        log::info!(
            "physics: step {:.4}s, world scale {}, gravity {:?}",
            fixed_step.step(),
            config.world_scale,
            config.gravity
        );
        Self {
            scene,
            backend,
            config,
            entities: BTreeMap::new(),
            nodes_by_body: HashMap::new(),
            contacts: ContactTracker::new(),
            events: EventDispatcher::new(),
            fixed_step,
            log_once: LogOnce::new(),
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn events(&self) -> &EventDispatcher<CollisionEvent> {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventDispatcher<CollisionEvent> {
        &mut self.events
    }

    /// Take every queued collision event.
    pub fn drain_events(&mut self) -> Vec<CollisionEvent> {
        self.events.drain()
    }

    fn world_scale(&self) -> f32 {
        let scale = self.config.world_scale;
        if scale.is_finite() && scale > 0.0 { scale } else { 1.0 }
    }

    // ── Bodies ──────────────────────────────────────────────────────────

    /// Give `node` a static or dynamic body. `None` when the node is dead,
    /// already has a body, asks for a mesh shape without carrying a mesh, or
    /// the backend refuses the body.
    pub fn add_physics_child(&mut self, node: NodeId, shape: ShapeKind, params: BodyParams) -> Option<BodyId> {
        let kind = if params.is_static { BodyKind::Static } else { BodyKind::Dynamic };
        self.add_body(node, shape, kind, params)
    }

    /// Give `node` a collision-only body. It follows the node and reports
    /// contacts but is never pushed around.
    pub fn add_collision_child(&mut self, node: NodeId, shape: ShapeKind) -> Option<BodyId> {
        self.add_body(node, shape, BodyKind::CollisionOnly, BodyParams::default())
    }

    fn add_body(&mut self, node: NodeId, shape: ShapeKind, kind: BodyKind, params: BodyParams) -> Option<BodyId> {
        if self.entities.contains_key(&node) {
            log::warn!("physics: {node} already has a body");
            return None;
        }
        let desc = self.body_desc(node, shape, kind, &params)?;
        let Some(body) = self.backend.create_body(&desc) else {
            log::warn!("physics: backend refused a {shape:?} body for {node}");
            return None;
        };
        if !self.scene.is_tracked(node) {
            self.track_in_place(node);
        }
        self.entities.insert(
            node,
            PhysicsEntity {
                node,
                body,
                kind,
                shape,
                params,
            },
        );
        self.nodes_by_body.insert(body, node);
        log::debug!("physics: {node} -> {body:?} ({kind:?}, {shape:?})");
        Some(body)
    }

    /// Make an untracked node a scene root without moving it: a node hanging
    /// off an untracked parent keeps the world pose its body was built from.
    fn track_in_place(&mut self, node: NodeId) {
        let graph = self.scene.graph();
        let reparented = graph.parent(node).map(|_| {
            let pure = graph.get(node).is_some_and(|n| n.has_pure_matrix());
            (graph.concatenated_matrix(node), pure)
        });
        self.scene.add_entity(node);
        if let Some((world, pure)) = reparented {
            let graph = self.scene.graph_mut();
            if pure {
                graph.set_world_matrix_pure(node, world);
            } else {
                graph.set_world_matrix(node, world);
            }
        }
    }

    /// Build a body description from the node's world transform and bounds.
    fn body_desc(&self, node: NodeId, shape: ShapeKind, kind: BodyKind, params: &BodyParams) -> Option<BodyDesc> {
        let graph = self.scene.graph();
        let Some(n) = graph.get(node) else {
            log::warn!("physics: {node} is not alive");
            return None;
        };
        let ws = self.world_scale();
        let (scale, rotation, translation) = graph.concatenated_matrix(node).to_scale_rotation_translation();
        let scale = scale.abs();
        let body_shape = match shape {
            ShapeKind::Rect => BodyShape::Cuboid {
                half_extents: n.bbox() * scale / ws,
            },
            ShapeKind::Circle => BodyShape::Ball {
                radius: n.bbox_radius() * scale.max_element() / ws,
            },
            ShapeKind::Mesh => {
                let Some(mesh) = n.drawable.as_mesh() else {
                    log::warn!("physics: mesh shape requested for '{}' ({node}), which has no mesh", n.name);
                    return None;
                };
                BodyShape::ConvexPolygon {
                    points: mesh.vertices.iter().map(|v| v.position() * scale / ws).collect(),
                }
            }
        };
        Some(BodyDesc {
            kind,
            shape: body_shape,
            pose: BodyPose::new(translation / ws, rotation),
            friction: params.friction,
            density: params.density,
            restitution: params.restitution,
            is_sensor: params.is_sensor,
            fixed_rotation: params.fixed_rotation,
        })
    }

    /// Destroy the body of `node`, ending its contacts first. The node itself
    /// is untouched.
    pub fn remove_physics_child(&mut self, node: NodeId) -> bool {
        let Some(body) = self.entities.get(&node).map(|e| e.body) else {
            log::warn!("physics: {node} has no body to remove");
            return false;
        };
        let ended = self.contacts.remove_body(body);
        self.emit_changes(&ended);
        self.entities.remove(&node);
        self.nodes_by_body.remove(&body);
        self.backend.destroy_body(body);
        self.log_once.clear(&pose_key(body));
        log::debug!("physics: removed {body:?} of {node}");
        true
    }

    /// Remove an entity from the scene together with the bodies in its
    /// subtree.
    pub fn remove_entity(&mut self, node: NodeId) -> bool {
        for id in self.scene.graph().subtree(node) {
            if self.entities.contains_key(&id) {
                self.remove_physics_child(id);
            }
        }
        self.scene.remove_entity(node)
    }

    pub fn physics_entity(&self, node: NodeId) -> Option<&PhysicsEntity> {
        self.entities.get(&node)
    }

    pub fn physics_entities(&self) -> impl Iterator<Item = &PhysicsEntity> + '_ {
        self.entities.values()
    }

    pub fn body_state(&self, node: NodeId) -> BodyState {
        let Some(entity) = self.entities.get(&node) else {
            return BodyState::Removed;
        };
        match self.backend.is_sleeping(entity.body) {
            Some(true) => BodyState::Sleeping,
            Some(false) => BodyState::Active,
            None => BodyState::Removed,
        }
    }

    // ── Frame ───────────────────────────────────────────────────────────

    /// Scene update followed by the physics step.
    pub fn update(&mut self, dt: f32) {
        self.scene.update(dt);
        self.step(dt);
    }

    pub fn render(&mut self, dispatch: &mut dyn RenderDispatch) -> bool {
        self.scene.render(dispatch)
    }

    /// Feed a frame delta into the fixed-step accumulator and run the steps
    /// that are due. Returns how many ran.
    pub fn step(&mut self, frame_dt: f32) -> u32 {
        self.purge_dead_nodes();
        let steps = self.fixed_step.advance(frame_dt);
        let dt = self.fixed_step.step();
        for _ in 0..steps {
            self.push_collision_poses();
            self.backend.step(dt);
            self.pull_dynamic_poses();
            let changes = self.contacts.update(&self.backend.contacts());
            self.emit_changes(&changes);
        }
        let stats = self.scene.stats_mut();
        stats.physics_steps = steps;
        stats.contacts = self.contacts.live_count() as u32;
        steps
    }

    fn purge_dead_nodes(&mut self) {
        let dead: Vec<NodeId> = self
            .entities
            .keys()
            .copied()
            .filter(|&id| !self.scene.graph().contains(id))
            .collect();
        for node in dead {
            log::debug!("physics: {node} was destroyed, dropping its body");
            self.remove_physics_child(node);
        }
    }

    fn push_collision_poses(&mut self) {
        let ws = self.world_scale();
        let graph = self.scene.graph();
        for entity in self.entities.values().filter(|e| e.kind == BodyKind::CollisionOnly) {
            let (_, rotation, translation) = graph.concatenated_matrix(entity.node).to_scale_rotation_translation();
            self.backend
                .set_kinematic_pose(entity.body, BodyPose::new(translation / ws, rotation));
        }
    }

    /// Body poses become pure node matrices. The node keeps its world scale.
    fn pull_dynamic_poses(&mut self) {
        let ws = self.world_scale();
        for entity in self.entities.values().filter(|e| e.kind == BodyKind::Dynamic) {
            let Some(pose) = self.backend.body_pose(entity.body) else {
                self.log_once.warn(pose_key(entity.body), || {
                    format!("physics: backend lost {:?} of {}", entity.body, entity.node)
                });
                continue;
            };
            let graph = self.scene.graph_mut();
            let scale = graph.compound_scale(entity.node);
            let world = Mat4::from_scale_rotation_translation(scale, pose.rotation, pose.translation * ws);
            graph.set_world_matrix_pure(entity.node, world);
        }
    }

    fn emit_changes(&mut self, changes: &[ContactChange]) {
        let ws = self.world_scale();
        for change in changes {
            let contact = &change.contact;
            let (Some(&a), Some(&b)) = (
                self.nodes_by_body.get(&contact.body_a),
                self.nodes_by_body.get(&contact.body_b),
            ) else {
                continue;
            };
            let world_point = contact.world_point * ws;
            let to_local = self.scene.graph().concatenated_matrix(a).inverse();
            let kind = match change.phase {
                ContactPhase::Begin => CollisionKind::Begin,
                ContactPhase::Persist => CollisionKind::Persist,
                ContactPhase::End => CollisionKind::End,
            };
            self.events.emit(CollisionEvent {
                kind,
                entity_a: a,
                entity_b: b,
                world_normal: contact.world_normal,
                local_normal: to_local.transform_vector3(contact.world_normal).normalize_or_zero(),
                world_point,
                local_point: to_local.transform_point3(world_point),
                impact_strength: contact.impulse,
                friction_strength: contact.friction_impulse,
            });
        }
    }

    // ── Control ─────────────────────────────────────────────────────────

    fn body_of(&self, node: NodeId, op: &str) -> Option<BodyId> {
        let body = self.entities.get(&node).map(|e| e.body);
        if body.is_none() {
            log::warn!("physics: {op} on {node}, which has no body");
        }
        body
    }

    /// Teleport a node and its body to a world-space pose.
    pub fn warp(&mut self, node: NodeId, position: Vec3, rotation: Quat) -> bool {
        let Some(body) = self.body_of(node, "warp") else {
            return false;
        };
        if !position.is_finite() || !rotation.is_finite() {
            log::warn!("physics: rejected non-finite warp of {node}");
            return false;
        }
        let ws = self.world_scale();
        let graph = self.scene.graph_mut();
        let scale = graph.compound_scale(node);
        graph.set_world_matrix(node, Mat4::from_scale_rotation_translation(scale, rotation, position));
        self.backend.set_body_pose(body, BodyPose::new(position / ws, rotation));
        true
    }

    pub fn apply_force(&mut self, node: NodeId, force: Vec3) -> bool {
        let Some(body) = self.body_of(node, "apply_force") else {
            return false;
        };
        let ws = self.world_scale();
        self.backend.apply_force(body, force / ws);
        true
    }

    pub fn apply_impulse(&mut self, node: NodeId, impulse: Vec3) -> bool {
        let Some(body) = self.body_of(node, "apply_impulse") else {
            return false;
        };
        let ws = self.world_scale();
        self.backend.apply_impulse(body, impulse / ws);
        true
    }

    /// Linear velocity in scene units per second.
    pub fn velocity(&self, node: NodeId) -> Option<Vec3> {
        let body = self.entities.get(&node)?.body;
        Some(self.backend.linear_velocity(body)? * self.world_scale())
    }

    pub fn set_velocity(&mut self, node: NodeId, velocity: Vec3) -> bool {
        let Some(body) = self.body_of(node, "set_velocity") else {
            return false;
        };
        let ws = self.world_scale();
        self.backend.set_linear_velocity(body, velocity / ws);
        true
    }

    /// Replace the X velocity, keeping the others.
    pub fn set_velocity_x(&mut self, node: NodeId, x: f32) -> bool {
        let Some(current) = self.velocity(node) else {
            log::warn!("physics: set_velocity_x on {node}, which has no body");
            return false;
        };
        self.set_velocity(node, Vec3::new(x, current.y, current.z))
    }

    /// Replace the Y velocity, keeping the others.
    pub fn set_velocity_y(&mut self, node: NodeId, y: f32) -> bool {
        let Some(current) = self.velocity(node) else {
            log::warn!("physics: set_velocity_y on {node}, which has no body");
            return false;
        };
        self.set_velocity(node, Vec3::new(current.x, y, current.z))
    }

    /// Angular velocity in radians per second. 2D backends use only `z`.
    pub fn set_spin(&mut self, node: NodeId, angular: Vec3) -> bool {
        let Some(body) = self.body_of(node, "set_spin") else {
            return false;
        };
        self.backend.set_angular_velocity(body, angular);
        true
    }

    /// Gravity in physics units.
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.config.gravity = gravity;
        self.backend.set_gravity(gravity);
    }

    pub fn wake_up(&mut self, node: NodeId) -> bool {
        let Some(body) = self.body_of(node, "wake_up") else {
            return false;
        };
        self.backend.wake_up(body);
        true
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Nearest bridged node hit by the segment `origin → dest`, in scene
    /// units.
    pub fn first_entity_in_ray(&self, origin: Vec3, dest: Vec3) -> Option<NodeId> {
        let ws = self.world_scale();
        let hit = self.backend.cast_ray(origin / ws, (dest - origin) / ws, 1.0)?;
        self.nodes_by_body.get(&hit.body).copied()
    }

    /// A bridged node whose shape contains `position`. Lowest body id wins
    /// when shapes overlap.
    pub fn entity_at_position(&self, position: Vec3) -> Option<NodeId> {
        let ws = self.world_scale();
        self.backend
            .bodies_at_point(position / ws)
            .into_iter()
            .find_map(|body| self.nodes_by_body.get(&body).copied())
    }

    pub fn test_entity_at_position(&self, node: NodeId, position: Vec3) -> bool {
        let Some(entity) = self.entities.get(&node) else {
            return false;
        };
        let ws = self.world_scale();
        self.backend.bodies_at_point(position / ws).contains(&entity.body)
    }

    /// `true` while the two nodes' bodies are in contact.
    pub fn test_entity_collision(&self, a: NodeId, b: NodeId) -> bool {
        match (self.entities.get(&a), self.entities.get(&b)) {
            (Some(a), Some(b)) => self.contacts.is_touching(a.body, b.body),
            _ => false,
        }
    }

    /// End every live contact and destroy every body. The scene is kept.
    pub fn shutdown(&mut self) {
        let ended = self.contacts.clear();
        self.emit_changes(&ended);
        let count = self.entities.len();
        for entity in std::mem::take(&mut self.entities).into_values() {
            self.backend.destroy_body(entity.body);
        }
        self.nodes_by_body.clear();
        log::info!("physics: shut down, destroyed {count} bodies");
    }
}

fn pose_key(body: BodyId) -> String {
    format!("pose:{body:?}")
}

impl<B: PhysicsBackend> Drop for PhysicsScene<B> {
    fn drop(&mut self) {
        if !self.entities.is_empty() {
            self.shutdown();
        }
    }
}
