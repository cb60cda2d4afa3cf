//! Deterministic in-crate backend for bridge tests.
//!
//! Dynamic bodies integrate `v += (g + F/m)·dt; p += v·dt` with unit mass.
//! Contacts are whatever the test puts in [`ScriptedBackend::contacts`].
//! Ray and point queries run on the body shapes directly; convex polygons
//! are hulled in the XY plane.

use std::collections::BTreeMap;

use super::{BodyDesc, BodyId, BodyKind, BodyPose, BodyShape, Contact, PhysicsBackend, RayHit};
use crate::math::{Vec2, Vec3};

#[derive(Debug, Clone)]
pub(crate) struct ScriptedBody {
    pub desc: BodyDesc,
    pub pose: BodyPose,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub force: Vec3,
    pub sleeping: bool,
    pub kinematic_target: Option<BodyPose>,
}

#[derive(Debug, Default)]
pub(crate) struct ScriptedBackend {
    pub bodies: BTreeMap<BodyId, ScriptedBody>,
    pub contacts: Vec<Contact>,
    pub gravity: Vec3,
    pub steps: u32,
    /// Refuse every `create_body` call.
    pub reject_bodies: bool,
    next_id: u64,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(&self, id: BodyId) -> Option<&ScriptedBody> {
        self.bodies.get(&id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut ScriptedBody> {
        self.bodies.get_mut(&id)
    }

    fn shapes(&self) -> impl Iterator<Item = (BodyId, &BodyShape, BodyPose)> + '_ {
        self.bodies.iter().map(|(id, b)| (*id, &b.desc.shape, b.pose))
    }
}

impl PhysicsBackend for ScriptedBackend {
    fn create_body(&mut self, desc: &BodyDesc) -> Option<BodyId> {
        if self.reject_bodies {
            return None;
        }
        self.next_id += 1;
        let id = BodyId(self.next_id);
        self.bodies.insert(
            id,
            ScriptedBody {
                desc: desc.clone(),
                pose: desc.pose,
                velocity: Vec3::ZERO,
                angular_velocity: Vec3::ZERO,
                force: Vec3::ZERO,
                sleeping: false,
                kinematic_target: None,
            },
        );
        Some(id)
    }

    fn destroy_body(&mut self, body: BodyId) -> bool {
        self.contacts.retain(|c| c.body_a != body && c.body_b != body);
        self.bodies.remove(&body).is_some()
    }

    fn step(&mut self, dt: f32) {
        self.steps += 1;
        let gravity = self.gravity;
        for body in self.bodies.values_mut() {
            match body.desc.kind {
                BodyKind::Static => {}
                BodyKind::CollisionOnly => {
                    if let Some(target) = body.kinematic_target.take() {
                        body.pose = target;
                    }
                }
                BodyKind::Dynamic => {
                    if body.sleeping {
                        continue;
                    }
                    body.velocity += (gravity + body.force) * dt;
                    body.pose.translation += body.velocity * dt;
                    body.force = Vec3::ZERO;
                }
            }
        }
    }

    fn body_pose(&self, body: BodyId) -> Option<BodyPose> {
        self.bodies.get(&body).map(|b| b.pose)
    }

    fn set_body_pose(&mut self, body: BodyId, pose: BodyPose) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.pose = pose;
        }
    }

    fn set_kinematic_pose(&mut self, body: BodyId, pose: BodyPose) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.kinematic_target = Some(pose);
        }
    }

    fn contacts(&self) -> Vec<Contact> {
        self.contacts.clone()
    }

    fn apply_force(&mut self, body: BodyId, force: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.force += force;
        }
    }

    fn apply_impulse(&mut self, body: BodyId, impulse: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.velocity += impulse;
        }
    }

    fn set_linear_velocity(&mut self, body: BodyId, velocity: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.velocity = velocity;
        }
    }

    fn linear_velocity(&self, body: BodyId) -> Option<Vec3> {
        self.bodies.get(&body).map(|b| b.velocity)
    }

    fn set_angular_velocity(&mut self, body: BodyId, velocity: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.angular_velocity = velocity;
        }
    }

    fn wake_up(&mut self, body: BodyId) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.sleeping = false;
        }
    }

    fn is_sleeping(&self, body: BodyId) -> Option<bool> {
        self.bodies.get(&body).map(|b| b.sleeping)
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    fn cast_ray(&self, origin: Vec3, dir: Vec3, max_toi: f32) -> Option<RayHit> {
        cast_ray_over(self.shapes(), origin, dir, max_toi)
    }

    fn bodies_at_point(&self, point: Vec3) -> Vec<BodyId> {
        bodies_at_point_over(self.shapes(), point)
    }
}

// ── Shape queries ───────────────────────────────────────────────────────

/// Counter-clockwise hull of the XY projection, monotone chain.
fn planar_hull(points: &[Vec3]) -> Vec<Vec2> {
    let mut pts: Vec<Vec2> = points.iter().map(|p| p.truncate()).collect();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return Vec::new();
    }
    let cross = |o: Vec2, a: Vec2, b: Vec2| (a - o).perp_dot(b - o);
    let mut hull: Vec<Vec2> = Vec::with_capacity(pts.len() * 2);
    for pass in 0..2 {
        let start = hull.len();
        let iter: Box<dyn Iterator<Item = &Vec2>> = if pass == 0 {
            Box::new(pts.iter())
        } else {
            Box::new(pts.iter().rev())
        };
        for &p in iter {
            while hull.len() >= start + 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
                hull.pop();
            }
            hull.push(p);
        }
        hull.pop();
    }
    if hull.len() < 3 { Vec::new() } else { hull }
}

/// Edges of a counter-clockwise hull as `(start, outward normal)`.
fn hull_edges(hull: &[Vec2]) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
    (0..hull.len()).map(move |i| {
        let (a, b) = (hull[i], hull[(i + 1) % hull.len()]);
        let e = b - a;
        (a, Vec2::new(e.y, -e.x))
    })
}

fn contains_local(shape: &BodyShape, point: Vec3) -> bool {
    match shape {
        BodyShape::Ball { radius } => point.length_squared() <= radius * radius,
        BodyShape::Cuboid { half_extents } => point.abs().cmple(*half_extents).all(),
        BodyShape::ConvexPolygon { points } => {
            let hull = planar_hull(points);
            let p = point.truncate();
            !hull.is_empty() && hull_edges(&hull).all(|(a, n)| n.dot(p - a) <= 1e-6)
        }
    }
}

/// Ray hit in body-local space: `(toi, normal)` with `origin + dir * toi`
/// on the surface. A ray starting inside hits at `toi = 0`.
fn ray_cast(shape: &BodyShape, origin: Vec3, dir: Vec3, max_toi: f32) -> Option<(f32, Vec3)> {
    if contains_local(shape, origin) {
        return Some((0.0, -dir.normalize_or_zero()));
    }
    match shape {
        BodyShape::Ball { radius } => ray_ball(origin, dir, *radius, max_toi),
        BodyShape::Cuboid { half_extents } => ray_box(origin, dir, *half_extents, max_toi),
        BodyShape::ConvexPolygon { points } => ray_polygon(origin, dir, &planar_hull(points), max_toi),
    }
}

fn ray_ball(origin: Vec3, dir: Vec3, radius: f32, max_toi: f32) -> Option<(f32, Vec3)> {
    let a = dir.length_squared();
    if a <= f32::EPSILON {
        return None;
    }
    let b = origin.dot(dir);
    let c = origin.length_squared() - radius * radius;
    let disc = b * b - a * c;
    if disc < 0.0 {
        return None;
    }
    let t = (-b - disc.sqrt()) / a;
    (t >= 0.0 && t <= max_toi).then(|| (t, (origin + dir * t).normalize_or_zero()))
}

fn ray_box(origin: Vec3, dir: Vec3, half: Vec3, max_toi: f32) -> Option<(f32, Vec3)> {
    let mut t_min = 0.0_f32;
    let mut t_max = max_toi;
    let mut normal = Vec3::ZERO;
    for axis in 0..3 {
        let (o, d, h) = (origin[axis], dir[axis], half[axis]);
        if d.abs() <= f32::EPSILON {
            if o.abs() > h {
                return None;
            }
            continue;
        }
        let (mut t0, mut t1) = ((-h - o) / d, (h - o) / d);
        let mut sign = -1.0;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
            sign = 1.0;
        }
        if t0 > t_min {
            t_min = t0;
            normal = Vec3::ZERO;
            normal[axis] = sign;
        }
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }
    Some((t_min, normal))
}

/// Clips the ray against every edge half-plane of the hull.
fn ray_polygon(origin: Vec3, dir: Vec3, hull: &[Vec2], max_toi: f32) -> Option<(f32, Vec3)> {
    if hull.is_empty() {
        return None;
    }
    let (o, d) = (origin.truncate(), dir.truncate());
    let mut t_enter = 0.0_f32;
    let mut t_exit = max_toi;
    let mut normal = Vec2::ZERO;
    for (a, n) in hull_edges(hull) {
        let num = n.dot(a - o);
        let den = n.dot(d);
        if den.abs() <= f32::EPSILON {
            if num < 0.0 {
                return None;
            }
            continue;
        }
        let t = num / den;
        if den < 0.0 {
            if t > t_enter {
                t_enter = t;
                normal = n;
            }
        } else {
            t_exit = t_exit.min(t);
        }
        if t_enter > t_exit {
            return None;
        }
    }
    Some((t_enter, normal.normalize_or_zero().extend(0.0)))
}

fn cast_ray_over<'a>(
    bodies: impl Iterator<Item = (BodyId, &'a BodyShape, BodyPose)>,
    origin: Vec3,
    dir: Vec3,
    max_toi: f32,
) -> Option<RayHit> {
    let mut best: Option<RayHit> = None;
    for (body, shape, pose) in bodies {
        let local_origin = pose.to_local(origin);
        let local_dir = pose.rotation.inverse() * dir;
        let Some((toi, local_normal)) = ray_cast(shape, local_origin, local_dir, max_toi) else {
            continue;
        };
        if best.is_none_or(|hit| toi < hit.toi || (toi == hit.toi && body < hit.body)) {
            best = Some(RayHit {
                body,
                toi,
                point: origin + dir * toi,
                normal: pose.rotation * local_normal,
            });
        }
    }
    best
}

fn bodies_at_point_over<'a>(
    bodies: impl Iterator<Item = (BodyId, &'a BodyShape, BodyPose)>,
    point: Vec3,
) -> Vec<BodyId> {
    let mut hits: Vec<BodyId> = bodies
        .filter(|(_, shape, pose)| contains_local(shape, pose.to_local(point)))
        .map(|(id, _, _)| id)
        .collect();
    hits.sort();
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Quat;

    fn triangle() -> BodyShape {
        BodyShape::ConvexPolygon {
            points: vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0)],
        }
    }

    #[test]
    fn ball_ray() {
        let shape = BodyShape::Ball { radius: 1.0 };
        let (toi, normal) = ray_cast(&shape, Vec3::new(-5.0, 0.0, 0.0), Vec3::X, 10.0).unwrap();
        assert!((toi - 4.0).abs() < 1e-5);
        assert!((normal + Vec3::X).length() < 1e-5);
        assert!(ray_cast(&shape, Vec3::new(-5.0, 2.0, 0.0), Vec3::X, 10.0).is_none());
        assert!(ray_cast(&shape, Vec3::new(-5.0, 0.0, 0.0), Vec3::X, 3.0).is_none());
    }

    #[test]
    fn box_ray_and_containment() {
        let shape = BodyShape::Cuboid {
            half_extents: Vec3::new(1.0, 2.0, 1.0),
        };
        let (toi, normal) = ray_cast(&shape, Vec3::new(0.0, 10.0, 0.0), -Vec3::Y, 100.0).unwrap();
        assert!((toi - 8.0).abs() < 1e-5);
        assert_eq!(normal, Vec3::Y);
        assert!(contains_local(&shape, Vec3::new(0.5, -1.5, 0.0)));
        assert!(!contains_local(&shape, Vec3::new(1.5, 0.0, 0.0)));
        assert_eq!(ray_cast(&shape, Vec3::ZERO, Vec3::X, 1.0).map(|h| h.0), Some(0.0));
    }

    #[test]
    fn polygon_uses_its_own_outline() {
        let shape = triangle();
        assert!(contains_local(&shape, Vec3::new(0.4, 0.4, 0.0)));
        // Inside the mirrored box of the vertices but outside the triangle.
        assert!(!contains_local(&shape, Vec3::new(-1.5, -1.5, 0.0)));
        assert!(!contains_local(&shape, Vec3::new(1.5, 1.5, 0.0)));
        assert!(ray_cast(&shape, Vec3::new(-10.0, -1.0, 0.0), Vec3::X, 100.0).is_none());

        let (toi, normal) = ray_cast(&shape, Vec3::new(-10.0, 0.5, 0.0), Vec3::X, 100.0).unwrap();
        assert!((toi - 10.0).abs() < 1e-4);
        assert!((normal + Vec3::X).length() < 1e-4);
        // Hypotenuse, from beyond it.
        let (toi, normal) = ray_cast(&shape, Vec3::new(3.0, 3.0, 0.0), Vec3::new(-1.0, -1.0, 0.0), 100.0).unwrap();
        assert!((toi - 2.0).abs() < 1e-4);
        assert!((normal - Vec3::new(1.0, 1.0, 0.0).normalize()).length() < 1e-4);
    }

    #[test]
    fn collinear_polygon_has_no_inside() {
        let line = BodyShape::ConvexPolygon {
            points: vec![Vec3::ZERO, Vec3::X, Vec3::X * 2.0],
        };
        assert!(!contains_local(&line, Vec3::new(1.0, 0.0, 0.0)));
        assert!(ray_cast(&line, Vec3::new(1.0, -5.0, 0.0), Vec3::Y, 100.0).is_none());
    }

    #[test]
    fn queries_respect_pose() {
        let shape = BodyShape::Cuboid {
            half_extents: Vec3::new(2.0, 0.5, 0.5),
        };
        let pose = BodyPose::new(Vec3::new(10.0, 0.0, 0.0), Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        let bodies = [(BodyId(1), &shape, pose)];
        // Rotated upright: tall along Y now.
        assert_eq!(bodies_at_point_over(bodies.into_iter(), Vec3::new(10.0, 1.5, 0.0)), vec![BodyId(1)]);
        assert!(bodies_at_point_over(bodies.into_iter(), Vec3::new(11.5, 0.0, 0.0)).is_empty());

        let hit = cast_ray_over(bodies.into_iter(), Vec3::ZERO, Vec3::X, 100.0).unwrap();
        assert_eq!(hit.body, BodyId(1));
        assert!((hit.toi - 9.5).abs() < 1e-4);
    }

    #[test]
    fn scripted_backend_queries_polygons_by_outline() {
        let mut backend = ScriptedBackend::new();
        let body = backend
            .create_body(&BodyDesc {
                kind: BodyKind::Static,
                shape: triangle(),
                pose: BodyPose::new(Vec3::ZERO, Quat::IDENTITY),
                friction: 0.5,
                density: 1.0,
                restitution: 0.0,
                is_sensor: false,
                fixed_rotation: false,
            })
            .unwrap();
        assert!(backend.bodies_at_point(Vec3::new(-1.5, -1.5, 0.0)).is_empty());
        assert_eq!(backend.bodies_at_point(Vec3::new(0.5, 0.5, 0.0)), vec![body]);
        assert!(backend.cast_ray(Vec3::new(-10.0, -1.0, 0.0), Vec3::X, 100.0).is_none());
        assert_eq!(backend.cast_ray(Vec3::new(-10.0, 1.0, 0.0), Vec3::X, 100.0).map(|h| h.body), Some(body));
    }
}
