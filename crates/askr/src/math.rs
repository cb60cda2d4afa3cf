//! Math types and glam re-exports.
//!
//! We re-export [glam](https://docs.rs/glam) types so users don't need to
//! depend on it directly. On top of glam this module adds the few pieces the
//! scene graph needs: an RGBA [`Color`], Euler/quaternion conversion in the
//! engine's angle convention, the look-at basis with its degenerate-case
//! fallback, and a [`Ray`] for picking.
//!
//! ## Angle Convention
//!
//! Euler angles are stored in **degrees**:
//!
//! ```text
//! pitch → rotation about X
//! yaw   → rotation about Y
//! roll  → rotation about Z
//! ```
//!
//! and composed in YXZ order (`q = yaw * pitch * roll`), which is the order
//! that keeps yaw "level" for cameras and characters.

use serde::{Deserialize, Serialize};

pub use glam::{EulerRot, Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

/// Euler composition order used everywhere in the engine.
pub const EULER_ORDER: EulerRot = EulerRot::YXZ;

/// Squared length under which a direction is treated as zero.
const DEGENERATE_EPSILON: f32 = 1e-8;

// ── Color ───────────────────────────────────────────────────────────────

/// An RGBA color with float channels, normally in the 0.0–1.0 range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Self = Self::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::rgba(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::rgba(r, g, b, 1.0)
    }

    /// Build from 0–255 integer channels.
    pub fn from_u8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::rgba(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        )
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite() && self.a.is_finite()
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl std::ops::Mul for Color {
    type Output = Color;

    /// Channel-wise modulation, the way tints combine down a hierarchy.
    fn mul(self, rhs: Color) -> Color {
        Color::rgba(
            self.r * rhs.r,
            self.g * rhs.g,
            self.b * rhs.b,
            self.a * rhs.a,
        )
    }
}

// ── Euler <-> Quaternion ────────────────────────────────────────────────

/// Build a rotation from pitch/yaw/roll in degrees.
pub fn quat_from_euler_degrees(pitch: f32, yaw: f32, roll: f32) -> Quat {
    Quat::from_euler(
        EULER_ORDER,
        yaw.to_radians(),
        pitch.to_radians(),
        roll.to_radians(),
    )
}

/// Decompose a rotation into `(pitch, yaw, roll)` in degrees.
pub fn euler_degrees_from_quat(q: Quat) -> (f32, f32, f32) {
    let (yaw, pitch, roll) = q.to_euler(EULER_ORDER);
    (pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
}

// ── Look-at ─────────────────────────────────────────────────────────────

/// Orthonormal orientation whose +Z axis points from `eye` toward `target`.
///
/// The basis is right-handed:
///
/// ```text
/// forward = normalize(target - eye)
/// right   = normalize(up × forward)
/// up'     = forward × right
/// ```
///
/// When `up` is parallel to `forward` the cross product vanishes; a stable
/// secondary axis (world Z, or world X when forward already lies along Z)
/// stands in for `up` so the result never contains NaN.
///
/// Returns `None` only when `eye == target`, where no direction exists.
pub fn look_at_matrix(eye: Vec3, target: Vec3, up: Vec3) -> Option<Mat3> {
    let delta = target - eye;
    if !delta.is_finite() || delta.length_squared() < DEGENERATE_EPSILON {
        return None;
    }
    let forward = delta.normalize();

    let mut right = up.cross(forward);
    if !right.is_finite() || right.length_squared() < DEGENERATE_EPSILON {
        let secondary = if forward.dot(Vec3::Z).abs() < 0.999 {
            Vec3::Z
        } else {
            Vec3::X
        };
        right = secondary.cross(forward);
    }
    let right = right.normalize();
    let up = forward.cross(right);

    Some(Mat3::from_cols(right, up, forward))
}

/// Quaternion form of [`look_at_matrix`].
pub fn look_at_rotation(eye: Vec3, target: Vec3, up: Vec3) -> Option<Quat> {
    look_at_matrix(eye, target, up).map(|m| Quat::from_mat3(&m).normalize())
}

// ── Ray ─────────────────────────────────────────────────────────────────

/// A half-line used for picking and physics ray casts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction.
    pub direction: Vec3,
}

impl Ray {
    /// Create a ray; the direction is normalized (zero falls back to -Z).
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.try_normalize().unwrap_or(Vec3::NEG_Z),
        }
    }

    /// Ray starting at `from` heading toward `to`.
    pub fn between(from: Vec3, to: Vec3) -> Self {
        Self::new(from, to - from)
    }

    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Distance along the ray to the first hit of a sphere, if any.
    ///
    /// A ray starting inside the sphere reports `0.0`.
    pub fn intersect_sphere(&self, center: Vec3, radius: f32) -> Option<f32> {
        let oc = self.origin - center;
        let b = oc.dot(self.direction);
        let c = oc.length_squared() - radius * radius;
        if c <= 0.0 {
            return Some(0.0);
        }
        let disc = b * b - c;
        if disc < 0.0 || b > 0.0 {
            return None;
        }
        Some(-b - disc.sqrt())
    }
}

/// Largest absolute scale factor baked into a matrix.
pub fn max_scale(m: &Mat4) -> f32 {
    m.x_axis
        .truncate()
        .length()
        .max(m.y_axis.truncate().length())
        .max(m.z_axis.truncate().length())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_orthonormal(m: Mat3) {
        for axis in [m.x_axis, m.y_axis, m.z_axis] {
            assert!(axis.is_finite());
            assert!((axis.length() - 1.0).abs() < 1e-4);
        }
        assert!(m.x_axis.dot(m.y_axis).abs() < 1e-4);
        assert!(m.y_axis.dot(m.z_axis).abs() < 1e-4);
        assert!(m.z_axis.dot(m.x_axis).abs() < 1e-4);
        assert!((m.determinant() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn color_modulates_channel_wise() {
        let c = Color::rgba(0.5, 1.0, 0.25, 1.0) * Color::rgba(0.5, 0.5, 1.0, 0.5);
        assert_eq!(c, Color::rgba(0.25, 0.5, 0.25, 0.5));
    }

    #[test]
    fn euler_round_trip() {
        let q = quat_from_euler_degrees(30.0, 45.0, 10.0);
        let (p, y, r) = euler_degrees_from_quat(q);
        assert!((p - 30.0).abs() < 1e-3);
        assert!((y - 45.0).abs() < 1e-3);
        assert!((r - 10.0).abs() < 1e-3);
    }

    #[test]
    fn look_at_points_forward_at_target() {
        let m = look_at_matrix(Vec3::ZERO, Vec3::new(0.0, 0.0, 10.0), Vec3::Y).unwrap();
        assert_orthonormal(m);
        assert!((m.z_axis - Vec3::Z).length() < 1e-5);
        assert!((m.x_axis - Vec3::X).length() < 1e-5);
        assert!((m.y_axis - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn look_at_straight_up_is_not_nan() {
        // Target directly above, up vector equal to the forward direction.
        let m = look_at_matrix(Vec3::ZERO, Vec3::new(0.0, 5.0, 0.0), Vec3::Y).unwrap();
        assert_orthonormal(m);
        assert!((m.z_axis - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn look_at_along_z_with_z_up_uses_x_fallback() {
        let m = look_at_matrix(Vec3::ZERO, Vec3::new(0.0, 0.0, 3.0), Vec3::Z).unwrap();
        assert_orthonormal(m);
    }

    #[test]
    fn look_at_same_point_is_none() {
        assert!(look_at_matrix(Vec3::ONE, Vec3::ONE, Vec3::Y).is_none());
    }

    #[test]
    fn ray_hits_sphere_in_front() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let t = ray.intersect_sphere(Vec3::new(5.0, 0.0, 0.0), 1.0).unwrap();
        assert!((t - 4.0).abs() < 1e-5);
        assert!(ray.intersect_sphere(Vec3::new(-5.0, 0.0, 0.0), 1.0).is_none());
    }
}
