//! 2D [`PhysicsBackend`] on top of Rapier.
//!
//! The scene is 3D, the simulation is planar: Z translations are dropped on
//! the way in and come back as zero, and only the rotation about Z survives.

use std::collections::{BTreeMap, HashMap};

use rapier2d::prelude::*;

use super::{BodyDesc, BodyId, BodyKind, BodyPose, BodyShape, Contact, PhysicsBackend, RayHit};
use crate::math::{Quat, Vec3};

// ── Conversion helpers ──────────────────────────────────────────────────

fn to_rapier(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.y)
}

fn from_rapier(x: f32, y: f32) -> Vec3 {
    Vec3::new(x, y, 0.0)
}

fn quat_to_angle(q: Quat) -> f32 {
    let (z, _y, _x) = q.to_euler(glam::EulerRot::ZYX);
    z
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
        BodyShape::Cuboid { half_extents } => Some(ColliderBuilder::cuboid(half_extents.x, half_extents.y)),
        BodyShape::Ball { radius } => Some(ColliderBuilder::ball(*radius)),
        BodyShape::ConvexPolygon { points } => {
            let points: Vec<Vec2> = points.iter().map(|p| to_rapier(*p)).collect();
            ColliderBuilder::convex_hull(&points)
        }
    }
}

fn pose_of(body: &RigidBody) -> BodyPose {
    let t = body.translation();
    BodyPose::new(from_rapier(t.x, t.y), Quat::from_rotation_z(body.rotation().angle()))
}

// ── Backend ─────────────────────────────────────────────────────────────

struct Slot {
    body: RigidBodyHandle,
    collider: ColliderHandle,
}

pub struct Rapier2dBackend {
    gravity: Vec2,
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

impl std::fmt::Debug for Rapier2dBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rapier2dBackend")
            .field("gravity", &self.gravity)
            .field("bodies", &self.bodies.len())
            .field("colliders", &self.colliders.len())
            .finish()
    }
}

impl Rapier2dBackend {
    pub fn new() -> Self {
        Self {
            gravity: Vec2::new(0.0, -9.81),
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

impl Default for Rapier2dBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsBackend for Rapier2dBackend {
    fn create_body(&mut self, desc: &BodyDesc) -> Option<BodyId> {
        let Some(builder) = collider_builder(&desc.shape) else {
            log::warn!("rapier2d: cannot build a convex hull from {:?}", desc.shape);
            return None;
        };
        let mut rb = RigidBodyBuilder::new(body_type(desc.kind))
            .translation(to_rapier(desc.pose.translation))
            .rotation(quat_to_angle(desc.pose.rotation));
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
            rb.set_position(Pose::new(to_rapier(pose.translation), quat_to_angle(pose.rotation)), true);
        }
    }

    fn set_kinematic_pose(&mut self, body: BodyId, pose: BodyPose) {
        if let Some(rb) = self.rigid_body_mut(body) {
            rb.set_next_kinematic_position(Pose::new(to_rapier(pose.translation), quat_to_angle(pose.rotation)));
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
                    world_normal: from_rapier(n.x, n.y),
                    world_point: from_rapier(p.x, p.y),
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
            rb.add_force(to_rapier(force), true);
        }
    }

    fn apply_impulse(&mut self, body: BodyId, impulse: Vec3) {
        if let Some(rb) = self.rigid_body_mut(body) {
            rb.apply_impulse(to_rapier(impulse), true);
        }
    }

    fn set_linear_velocity(&mut self, body: BodyId, velocity: Vec3) {
        if let Some(rb) = self.rigid_body_mut(body) {
            rb.set_linvel(to_rapier(velocity), true);
        }
    }

    fn linear_velocity(&self, body: BodyId) -> Option<Vec3> {
        let v = self.rigid_body(body)?.linvel();
        Some(from_rapier(v.x, v.y))
    }

    fn set_angular_velocity(&mut self, body: BodyId, velocity: Vec3) {
        if let Some(rb) = self.rigid_body_mut(body) {
            rb.set_angvel(velocity.z, true);
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
        self.gravity = to_rapier(gravity);
    }

    fn cast_ray(&self, origin: Vec3, dir: Vec3, max_toi: f32) -> Option<RayHit> {
        let ray = Ray::new(to_rapier(origin), to_rapier(dir));
        let (collider, hit) = self.query_pipeline().cast_ray_and_get_normal(&ray, max_toi, true)?;
        // Removed colliders linger in the tree until the next step.
        let body = *self.body_by_collider.get(&collider)?;
        let point = ray.point_at(hit.time_of_impact);
        Some(RayHit {
            body,
            toi: hit.time_of_impact,
            point: from_rapier(point.x, point.y),
            normal: from_rapier(hit.normal.x, hit.normal.y),
        })
    }

    fn bodies_at_point(&self, point: Vec3) -> Vec<BodyId> {
        let mut hits: Vec<BodyId> = self
            .query_pipeline()
            .intersect_point(to_rapier(point))
            .filter_map(|(collider, _)| self.body_by_collider.get(&collider).copied())
            .collect();
        hits.sort();
        hits.dedup();
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(kind: BodyKind, shape: BodyShape, at: Vec3) -> BodyDesc {
        BodyDesc {
            kind,
            shape,
            pose: BodyPose::new(at, Quat::IDENTITY),
            friction: 0.5,
            density: 1.0,
            restitution: 0.0,
            is_sensor: false,
            fixed_rotation: false,
        }
    }

    #[test]
    fn dynamic_body_falls() {
        let mut backend = Rapier2dBackend::new();
        let body = backend
            .create_body(&desc(BodyKind::Dynamic, BodyShape::Ball { radius: 0.5 }, Vec3::new(0.0, 10.0, 3.0)))
            .unwrap();
        for _ in 0..30 {
            backend.step(1.0 / 60.0);
        }
        let pose = backend.body_pose(body).unwrap();
        assert!(pose.translation.y < 10.0);
        assert_eq!(pose.translation.z, 0.0);
        assert!(backend.linear_velocity(body).unwrap().y < 0.0);
    }

    #[test]
    fn overlapping_bodies_report_a_contact() {
        let mut backend = Rapier2dBackend::new();
        backend.set_gravity(Vec3::ZERO);
        let half = BodyShape::Cuboid {
            half_extents: Vec3::new(1.0, 1.0, 0.0),
        };
        let ground = backend.create_body(&desc(BodyKind::Static, half.clone(), Vec3::ZERO)).unwrap();
        let crate_ = backend
            .create_body(&desc(BodyKind::Dynamic, half, Vec3::new(0.0, 1.5, 0.0)))
            .unwrap();
        backend.step(1.0 / 60.0);
        let contacts = backend.contacts();
        assert!(contacts.iter().any(|c| {
            (c.body_a == ground && c.body_b == crate_) || (c.body_a == crate_ && c.body_b == ground)
        }));
    }

    #[test]
    fn destroyed_bodies_are_forgotten() {
        let mut backend = Rapier2dBackend::new();
        let body = backend
            .create_body(&desc(BodyKind::Static, BodyShape::Ball { radius: 1.0 }, Vec3::ZERO))
            .unwrap();
        backend.step(1.0 / 60.0);
        assert_eq!(backend.bodies_at_point(Vec3::new(0.5, 0.0, 0.0)), vec![body]);
        assert!(backend.destroy_body(body));
        assert!(backend.bodies_at_point(Vec3::new(0.5, 0.0, 0.0)).is_empty());
        assert!(backend.cast_ray(Vec3::new(-5.0, 0.0, 0.0), Vec3::X, 10.0).is_none());
        assert!(!backend.destroy_body(body));
        assert!(backend.body_pose(body).is_none());
        assert_eq!(backend.body_count(), 0);
    }

    #[test]
    fn degenerate_hull_is_refused() {
        let mut backend = Rapier2dBackend::new();
        let line = BodyShape::ConvexPolygon {
            points: vec![Vec3::ZERO, Vec3::X, Vec3::X * 2.0],
        };
        assert!(backend.create_body(&desc(BodyKind::Dynamic, line, Vec3::ZERO)).is_none());
    }

    #[test]
    fn rotated_box_is_queried_by_its_pose() {
        let mut backend = Rapier2dBackend::new();
        let mut at = desc(
            BodyKind::Static,
            BodyShape::Cuboid {
                half_extents: Vec3::new(2.0, 0.25, 0.0),
            },
            Vec3::new(5.0, 0.0, 0.0),
        );
        at.pose.rotation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let rod = backend.create_body(&at).unwrap();
        backend.step(1.0 / 60.0);

        assert_eq!(backend.bodies_at_point(Vec3::new(5.0, 1.5, 0.0)), vec![rod]);
        assert!(backend.bodies_at_point(Vec3::new(6.5, 0.0, 0.0)).is_empty());
        let hit = backend.cast_ray(Vec3::new(0.0, 1.5, 0.0), Vec3::X, 100.0).unwrap();
        assert_eq!(hit.body, rod);
        assert!((hit.toi - 4.75).abs() < 1e-3);
        assert!((hit.point - Vec3::new(4.75, 1.5, 0.0)).length() < 1e-3);
        assert!((hit.normal + Vec3::X).length() < 1e-3);
        assert!(backend.cast_ray(Vec3::new(0.0, 1.5, 0.0), Vec3::X, 4.0).is_none());
    }

    #[test]
    fn resting_contact_reports_impulse_without_friction() {
        let mut backend = Rapier2dBackend::new();
        let ground = backend
            .create_body(&desc(
                BodyKind::Static,
                BodyShape::Cuboid {
                    half_extents: Vec3::new(10.0, 0.5, 0.0),
                },
                Vec3::ZERO,
            ))
            .unwrap();
        let crate_ = backend
            .create_body(&desc(
                BodyKind::Dynamic,
                BodyShape::Cuboid {
                    half_extents: Vec3::new(0.5, 0.5, 0.0),
                },
                Vec3::new(0.0, 1.0, 0.0),
            ))
            .unwrap();
        for _ in 0..30 {
            backend.step(1.0 / 60.0);
        }
        let contacts = backend.contacts();
        let resting = contacts
            .iter()
            .find(|c| (c.body_a == ground && c.body_b == crate_) || (c.body_a == crate_ && c.body_b == ground))
            .unwrap();
        assert!(resting.impulse > 0.0);
        assert_eq!(resting.friction_impulse, 0.0);
    }

    mod scene {
        use super::super::Rapier2dBackend;
        use crate::config::PhysicsConfig;
        use crate::drawable::{Drawable, Mesh};
        use crate::graph::{Node, NodeId};
        use crate::math::{Quat, Vec2, Vec3};
        use crate::physics::{BodyParams, CollisionEvent, CollisionKind, PhysicsBackend, PhysicsScene, ShapeKind};
        use crate::scene::Scene;

        fn world(gravity: Vec3) -> PhysicsScene<Rapier2dBackend> {
            let config = PhysicsConfig {
                gravity,
                ..PhysicsConfig::default()
            };
            PhysicsScene::new(Scene::new(), Rapier2dBackend::new(), config)
        }

        fn slab(x: f32, y: f32, hx: f32, hy: f32) -> Node {
            let mut node = Node::new().with_position(x, y, 0.0);
            node.set_bbox(Vec3::new(hx, hy, 0.0));
            node
        }

        fn between(event: &CollisionEvent, a: NodeId, b: NodeId) -> bool {
            (event.entity_a == a && event.entity_b == b) || (event.entity_a == b && event.entity_b == a)
        }

        #[test]
        fn falling_box_lands_and_separates() {
            let mut world = world(Vec3::new(0.0, -9.81, 0.0));
            let ground = world.scene_mut().spawn(slab(0.0, 0.0, 10.0, 0.5));
            let crate_ = world.scene_mut().spawn(slab(0.0, 3.0, 0.5, 0.5));
            world.add_physics_child(ground, ShapeKind::Rect, BodyParams::fixed()).unwrap();
            world.add_physics_child(crate_, ShapeKind::Rect, BodyParams::dynamic()).unwrap();

            let mut events = Vec::new();
            for _ in 0..120 {
                world.step(1.0 / 60.0);
                events.extend(world.drain_events());
            }
            let y = world.scene().graph().combined_position(crate_).y;
            assert!((y - 1.0).abs() < 0.1, "crate rests on the ground, y = {y}");
            assert!(world.scene().node(crate_).unwrap().has_pure_matrix());
            assert!(
                events
                    .iter()
                    .any(|e| e.kind == CollisionKind::Begin && between(e, ground, crate_))
            );
            assert!(events.iter().any(|e| e.impact_strength > 0.0));
            assert!(events.iter().all(|e| e.friction_strength == 0.0));
            assert!(world.test_entity_collision(ground, crate_));

            world.warp(crate_, Vec3::new(0.0, 20.0, 0.0), Quat::IDENTITY);
            world.step(1.0 / 30.0);
            let events = world.drain_events();
            assert!(
                events
                    .iter()
                    .any(|e| e.kind == CollisionKind::End && between(e, ground, crate_))
            );
            assert!(!world.test_entity_collision(ground, crate_));
        }

        #[test]
        fn sensor_overlap_is_reported() {
            let mut world = world(Vec3::ZERO);
            let zone = world.scene_mut().spawn(slab(0.0, 0.0, 1.0, 1.0));
            let probe = world.scene_mut().spawn(slab(0.5, 0.0, 0.5, 0.5));
            world.add_physics_child(zone, ShapeKind::Rect, BodyParams::fixed().sensor()).unwrap();
            world.add_collision_child(probe, ShapeKind::Rect).unwrap();

            world.step(1.0 / 60.0);
            let events = world.drain_events();
            assert!(
                events
                    .iter()
                    .any(|e| e.kind == CollisionKind::Begin && between(e, zone, probe))
            );
        }

        #[test]
        fn collision_only_body_follows_its_node() {
            let mut world = world(Vec3::ZERO);
            let node = world.scene_mut().spawn(slab(0.0, 0.0, 0.5, 0.5));
            let body = world.add_collision_child(node, ShapeKind::Rect).unwrap();
            world.scene_mut().node_mut(node).unwrap().set_position(Vec3::new(3.0, 4.0, 0.0));
            world.step(1.0 / 60.0);
            let pose = world.backend().body_pose(body).unwrap();
            assert!((pose.translation - Vec3::new(3.0, 4.0, 0.0)).length() < 1e-4);
            assert!(!world.scene().node(node).unwrap().has_pure_matrix());
        }

        #[test]
        fn queries_hit_rotated_and_convex_shapes() {
            let mut world = world(Vec3::ZERO);
            let rod = world.scene_mut().spawn(slab(5.0, 0.0, 2.0, 0.25));
            world
                .scene_mut()
                .node_mut(rod)
                .unwrap()
                .set_rotation_quat(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
            let wedge = world.scene_mut().spawn(
                Node::new()
                    .with_position(-5.0, 0.0, 0.0)
                    .with_drawable(Drawable::mesh(Mesh::polygon(&[
                        Vec2::new(0.0, 0.0),
                        Vec2::new(2.0, 0.0),
                        Vec2::new(0.0, 2.0),
                    ]))),
            );
            world.add_physics_child(rod, ShapeKind::Rect, BodyParams::fixed()).unwrap();
            world.add_physics_child(wedge, ShapeKind::Mesh, BodyParams::fixed()).unwrap();
            world.step(1.0 / 60.0);

            assert_eq!(world.first_entity_in_ray(Vec3::new(0.0, 1.5, 0.0), Vec3::new(10.0, 1.5, 0.0)), Some(rod));
            assert_eq!(world.entity_at_position(Vec3::new(5.0, 1.5, 0.0)), Some(rod));
            assert_eq!(world.entity_at_position(Vec3::new(6.5, 0.0, 0.0)), None);

            assert_eq!(world.entity_at_position(Vec3::new(-4.6, 0.4, 0.0)), Some(wedge));
            assert_eq!(world.entity_at_position(Vec3::new(-6.5, -1.5, 0.0)), None);
            assert!(!world.test_entity_at_position(wedge, Vec3::new(-3.5, 1.5, 0.0)));
            assert_eq!(world.first_entity_in_ray(Vec3::new(-10.0, -1.0, 0.0), Vec3::new(-1.0, -1.0, 0.0)), None);
            assert_eq!(world.first_entity_in_ray(Vec3::new(-10.0, 1.0, 0.0), Vec3::new(-1.0, 1.0, 0.0)), Some(wedge));
        }
    }
}
