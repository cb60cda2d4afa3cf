//! 3D [`PhysicsBackend`] on top of Rapier.
//!
//! Flat shapes (a quad's bounds have no depth) get a thin slab so Rapier has
//! a volume to work with.

use std::collections::{BTreeMap, HashMap};

use rapier3d::prelude::*;

use super::{BodyDesc, BodyId, BodyKind, BodyPose, BodyShape, Contact, PhysicsBackend, RayHit};
use crate::math::{Quat, Vec3};

// ── Conversion helpers ──────────────────────────────────────────────────

/// Smallest half extent handed to Rapier.
const MIN_HALF_EXTENT: f32 = 1e-3;

fn quat_to_scaled_axis(q: Quat) -> Vec3 {
    let (axis, angle) = q.to_axis_angle();
    axis * angle
}

fn body_type(kind: BodyKind) -> RigidBodyType {
    match kind {
        BodyKind::Static => RigidBodyType::Fixed,
        BodyKind::Dynamic => RigidBodyType::Dynamic,
        BodyKind::CollisionOnly => RigidBodyType::KinematicPositionBased,
    }
}

fn collider_builder(shape: &BodyShape) -> Option<ColliderBuilder> {
    match shape {
        BodyShape::Cuboid { half_extents } => {
            let h = half_extents.max(Vec3::splat(MIN_HALF_EXTENT));
            Some(ColliderBuilder::cuboid(h.x, h.y, h.z))
        }
        BodyShape::Ball { radius } => Some(ColliderBuilder::ball(*radius)),
        BodyShape::ConvexPolygon { points } => {
            ColliderBuilder::convex_hull(points)
        }
    }
}

fn pose_of(body: &RigidBody) -> BodyPose {
    let t = body.translation();
    BodyPose::new(Vec3::new(t.x, t.y, t.z), *body.rotation())
}

// ── Backend ─────────────────────────────────────────────────────────────

struct Slot {
    body: RigidBodyHandle,
    collider: ColliderHandle,
}

pub struct Rapier3dBackend {
    gravity: Vec3,
    pipeline: PhysicsPipeline,
    params: IntegrationParameters,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    slots: BTreeMap<BodyId, Slot>,
    body_by_collider: HashMap<ColliderHandle, BodyId>,
    next_id: u64,
}

impl std::fmt::Debug for Rapier3dBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rapier3dBackend")
            .field("gravity", &self.gravity)
            .field("bodies", &self.bodies.len())
            .field("colliders", &self.colliders.len())
            .finish()
    }
}

impl Rapier3dBackend {
    pub fn new() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            pipeline: PhysicsPipeline::new(),
            params: IntegrationParameters::default(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            slots: BTreeMap::new(),
            body_by_collider: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn body_count(&self) -> usize {
        self.slots.len()
    }

    fn rigid_body(&self, body: BodyId) -> Option<&RigidBody> {
        self.bodies.get(self.slots.get(&body)?.body)
    }

    fn rigid_body_mut(&mut self, body: BodyId) -> Option<&mut RigidBody> {
        let handle = self.slots.get(&body)?.body;
        self.bodies.get_mut(handle)
    }

    /// Scene queries against the broad-phase tree as of the last step.
    fn query_pipeline(&self) -> QueryPipeline<'_> {
        self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.bodies,
            &self.colliders,
            QueryFilter::default(),
        )
    }

    fn contact_between(&self, c1: ColliderHandle, c2: ColliderHandle) -> Option<(BodyId, BodyId)> {
        Some((*self.body_by_collider.get(&c1)?, *self.body_by_collider.get(&c2)?))
    }
}

impl Default for Rapier3dBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsBackend for Rapier3dBackend {
    fn create_body(&mut self, desc: &BodyDesc) -> Option<BodyId> {
        let Some(builder) = collider_builder(&desc.shape) else {
            log::warn!("rapier3d: cannot build a convex hull from {:?}", desc.shape);
            return None;
        };
        let mut rb = RigidBodyBuilder::new(body_type(desc.kind))
            .translation(desc.pose.translation)
            .rotation(quat_to_scaled_axis(desc.pose.rotation));
        if desc.fixed_rotation {
            rb = rb.lock_rotations();
        }
        let collider = builder
            .friction(desc.friction)
            .density(desc.density)
            .restitution(desc.restitution)
            .sensor(desc.is_sensor)
            .active_collision_types(ActiveCollisionTypes::all())
            .build();

        let body_handle = self.bodies.insert(rb.build());
        let collider_handle = self
            .colliders
            .insert_with_parent(collider, body_handle, &mut self.bodies);

        self.next_id += 1;
        let id = BodyId(self.next_id);
        self.slots.insert(
            id,
            Slot {
                body: body_handle,
                collider: collider_handle,
            },
        );
        self.body_by_collider.insert(collider_handle, id);
        Some(id)
    }

    fn destroy_body(&mut self, body: BodyId) -> bool {
        let Some(slot) = self.slots.remove(&body) else {
            return false;
        };
        self.body_by_collider.remove(&slot.collider);
        self.bodies.remove(
            slot.body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        true
    }

    fn step(&mut self, dt: f32) {
        self.params.dt = dt;
        self.pipeline.step(
            self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &(),
        );
        // Forces apply for a single step.
        for (_, body) in self.bodies.iter_mut() {
            body.reset_forces(false);
        }
    }

    fn body_pose(&self, body: BodyId) -> Option<BodyPose> {
        self.rigid_body(body).map(pose_of)
    }

    fn set_body_pose(&mut self, body: BodyId, pose: BodyPose) {
        if let Some(rb) = self.rigid_body_mut(body) {
            rb.set_position(Pose::from_parts(pose.translation, pose.rotation), true);
        }
    }

    fn set_kinematic_pose(&mut self, body: BodyId, pose: BodyPose) {
        if let Some(rb) = self.rigid_body_mut(body) {
            rb.set_next_kinematic_position(Pose::from_parts(pose.translation, pose.rotation));
        }
    }

    fn contacts(&self) -> Vec<Contact> {
        let mut contacts = Vec::new();
        for pair in self.narrow_phase.contact_pairs() {
            let Some((body_a, body_b)) = self.contact_between(pair.collider1, pair.collider2) else {
                continue;
            };
            for manifold in &pair.manifolds {
                let Some(point) = manifold.data.solver_contacts.first() else {
                    continue;
                };
                let n = manifold.data.normal;
                let p = point.point;
                contacts.push(Contact {
                    body_a,
                    body_b,
                    world_normal: Vec3::new(n.x, n.y, n.z),
                    world_point: Vec3::new(p.x, p.y, p.z),
                    impulse: manifold.points.iter().map(|c| c.data.impulse).sum(),
                    friction_impulse: 0.0,
                });
            }
        }
        // Sensors never produce manifolds; they only intersect.
        for (c1, c2, intersecting) in self.narrow_phase.intersection_pairs() {
            if !intersecting {
                continue;
            }
            let Some((body_a, body_b)) = self.contact_between(c1, c2) else {
                continue;
            };
            let (Some(a), Some(b)) = (self.body_pose(body_a), self.body_pose(body_b)) else {
                continue;
            };
            contacts.push(Contact {
                body_a,
                body_b,
                world_normal: (b.translation - a.translation).normalize_or_zero(),
                world_point: (a.translation + b.translation) * 0.5,
                impulse: 0.0,
                friction_impulse: 0.0,
            });
        }
        contacts
    }

    fn apply_force(&mut self, body: BodyId, force: Vec3) {
        if let Some(rb) = self.rigid_body_mut(body) {
            rb.add_force(force, true);
        }
    }

    fn apply_impulse(&mut self, body: BodyId, impulse: Vec3) {
        if let Some(rb) = self.rigid_body_mut(body) {
            rb.apply_impulse(impulse, true);
        }
    }

    fn set_linear_velocity(&mut self, body: BodyId, velocity: Vec3) {
        if let Some(rb) = self.rigid_body_mut(body) {
            rb.set_linvel(velocity, true);
        }
    }

    fn linear_velocity(&self, body: BodyId) -> Option<Vec3> {
        let v = self.rigid_body(body)?.linvel();
        Some(Vec3::new(v.x, v.y, v.z))
    }

    fn set_angular_velocity(&mut self, body: BodyId, velocity: Vec3) {
        if let Some(rb) = self.rigid_body_mut(body) {
            rb.set_angvel(velocity, true);
        }
    }

    fn wake_up(&mut self, body: BodyId) {
        if let Some(rb) = self.rigid_body_mut(body) {
            rb.wake_up(true);
        }
    }

    fn is_sleeping(&self, body: BodyId) -> Option<bool> {
        self.rigid_body(body).map(|rb| rb.is_sleeping())
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    fn cast_ray(&self, origin: Vec3, dir: Vec3, max_toi: f32) -> Option<RayHit> {
        let ray = Ray::new(origin, dir);
        let (collider, hit) = self.query_pipeline().cast_ray_and_get_normal(&ray, max_toi, true)?;
        // Removed colliders linger in the tree until the next step.
        let body = *self.body_by_collider.get(&collider)?;
        let point = ray.point_at(hit.time_of_impact);
        Some(RayHit {
            body,
            toi: hit.time_of_impact,
            point: Vec3::new(point.x, point.y, point.z),
            normal: Vec3::new(hit.normal.x, hit.normal.y, hit.normal.z),
        })
    }

    fn bodies_at_point(&self, point: Vec3) -> Vec<BodyId> {
        let mut hits: Vec<BodyId> = self
            .query_pipeline()
            .intersect_point(point)
            .filter_map(|(collider, _)| self.body_by_collider.get(&collider).copied())
            .collect();
        hits.sort();
        hits.dedup();
        hits
    }
}
