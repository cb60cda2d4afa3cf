//! # Transform Node: Local State and the Lazy Matrix Cache
//!
//! A [`Node`] holds its local position, scale and rotation, its color and
//! visibility flags, its bounds, and an optional [`Drawable`] payload and
//! [`Behavior`] hook. Parent/child links live here too but are managed by
//! the [`SceneGraph`](super::tree::SceneGraph).
//!
//! ## The Dirty Flag
//!
//! ```text
//! set_position / set_scale / set_pitch / set_rotation_quat / ...
//!        │
//!        ▼
//!   matrix_dirty = true          (nothing else happens, children untouched)
//!        │
//! transform_matrix()
//!        │  dirty? ── yes ──► rebuild from scale, quaternion, position
//!        ▼                     clear dirty
//!   cached matrix
//! ```
//!
//! Every matrix read goes through [`Node::transform_matrix`], so a stale
//! cache can never be observed together with fresh fields. The cache lives
//! in `Cell`s so reads work through `&Node`.
//!
//! ## Rotation: Last Writer Wins
//!
//! Rotation is stored twice: Euler angles in degrees and a quaternion.
//! Whichever representation was written last is authoritative and the other
//! is re-derived from it immediately:
//!
//! - Euler setters store the angles and rebuild the quaternion from them.
//! - [`Node::set_rotation_quat`] stores the normalized quaternion and
//!   decomposes it back into angles.
//!
//! The matrix is always built from the quaternion, so repeated reads never
//! depend on Euler decomposition.
//!
//! ## Pure Matrices
//!
//! Physics hands back a pose, not decomposed fields.
//! [`Node::set_transform_by_matrix_pure`] installs such a matrix directly
//! and leaves position/scale/rotation untouched. The next TRS setter
//! switches the node back to component-driven matrices.

use std::cell::Cell;
use std::fmt;

use super::id::NodeId;
use super::tree::SceneGraph;
use crate::drawable::{BlendMode, Drawable};
use crate::math::{Color, Mat4, Quat, Vec3, euler_degrees_from_quat, quat_from_euler_degrees};

/// Per-node update hook, run by the scene's update pass before the node's
/// matrix is rebuilt and before its children are visited.
///
/// The hook receives the whole graph so it can move itself, its children, or
/// anything else. While it runs, the hook is detached from its node.
pub trait Behavior {
    fn update(&mut self, node: NodeId, graph: &mut SceneGraph, dt: f32);
}

impl<F> Behavior for F
where
    F: FnMut(NodeId, &mut SceneGraph, f32),
{
    fn update(&mut self, node: NodeId, graph: &mut SceneGraph, dt: f32) {
        self(node, graph, dt)
    }
}

/// A user key/value property carried by a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeProp {
    pub name: String,
    pub value: String,
}

/// A transform node: local TRS, color, flags, bounds and payload.
pub struct Node {
    pub name: String,

    position: Vec3,
    scale: Vec3,
    pitch: f32,
    yaw: f32,
    roll: f32,
    rotation: Quat,

    /// Tint, multiplied into children when `color_affects_children` is set.
    pub color: Color,
    /// Disabled nodes are skipped, with their subtree, by update and render.
    pub enabled: bool,
    pub visible: bool,
    pub color_affects_children: bool,
    pub visibility_affects_children: bool,
    /// Use the local matrix as the world matrix.
    pub ignore_parent_matrix: bool,
    /// Always face the camera.
    pub billboard_mode: bool,
    /// Destroying this node destroys its children too (otherwise they are
    /// orphaned).
    pub owns_children: bool,

    pub blend_mode: BlendMode,
    pub depth_test: bool,
    pub depth_write: bool,
    pub backface_culled: bool,

    /// Free-form type tag used by scene lookups.
    pub custom_type: String,
    props: Vec<NodeProp>,

    bbox: Vec3,
    bbox_radius: f32,

    pub drawable: Drawable,
    pub(crate) behavior: Option<Box<dyn Behavior>>,

    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,

    matrix: Cell<Mat4>,
    matrix_dirty: Cell<bool>,
    pure_matrix: bool,
}

impl Node {
    /// A node with identity transform, opaque white, visible and enabled.
    pub fn new() -> Self {
        Self {
            name: String::new(),
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            pitch: 0.0,
            yaw: 0.0,
            roll: 0.0,
            rotation: Quat::IDENTITY,
            color: Color::WHITE,
            enabled: true,
            visible: true,
            color_affects_children: true,
            visibility_affects_children: true,
            ignore_parent_matrix: false,
            billboard_mode: false,
            owns_children: false,
            blend_mode: BlendMode::default(),
            depth_test: true,
            depth_write: true,
            backface_culled: true,
            custom_type: String::new(),
            props: Vec::new(),
            bbox: Vec3::ZERO,
            bbox_radius: 0.0,
            drawable: Drawable::None,
            behavior: None,
            parent: None,
            children: Vec::new(),
            matrix: Cell::new(Mat4::IDENTITY),
            matrix_dirty: Cell::new(false),
            pure_matrix: false,
        }
    }

    // ── Builders ────────────────────────────────────────────────────────

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::new()
        }
    }

    pub fn with_position(mut self, x: f32, y: f32, z: f32) -> Self {
        self.set_position(Vec3::new(x, y, z));
        self
    }

    pub fn with_scale(mut self, x: f32, y: f32, z: f32) -> Self {
        self.set_scale(Vec3::new(x, y, z));
        self
    }

    /// Rotation as pitch/yaw/roll in degrees.
    pub fn with_rotation(mut self, pitch: f32, yaw: f32, roll: f32) -> Self {
        self.set_rotation_euler(pitch, yaw, roll);
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.set_color(color);
        self
    }

    pub fn with_drawable(mut self, drawable: Drawable) -> Self {
        self.drawable = drawable;
        self.recalculate_bbox();
        self
    }

    pub fn with_bbox_radius(mut self, radius: f32) -> Self {
        self.set_bbox_radius(radius);
        self
    }

    pub fn with_custom_type(mut self, custom_type: impl Into<String>) -> Self {
        self.custom_type = custom_type.into();
        self
    }

    pub fn with_behavior(mut self, behavior: impl Behavior + 'static) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }

    // ── Position / scale ────────────────────────────────────────────────

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        if reject_non_finite("position", position) {
            return;
        }
        self.position = position;
        self.components_changed();
    }

    pub fn set_position_x(&mut self, x: f32) {
        self.set_position(Vec3::new(x, self.position.y, self.position.z));
    }

    pub fn set_position_y(&mut self, y: f32) {
        self.set_position(Vec3::new(self.position.x, y, self.position.z));
    }

    pub fn set_position_z(&mut self, z: f32) {
        self.set_position(Vec3::new(self.position.x, self.position.y, z));
    }

    /// Move by an offset in parent space.
    pub fn translate(&mut self, offset: Vec3) {
        self.set_position(self.position + offset);
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        if reject_non_finite("scale", scale) {
            return;
        }
        self.scale = scale;
        self.components_changed();
    }

    pub fn set_scale_x(&mut self, x: f32) {
        self.set_scale(Vec3::new(x, self.scale.y, self.scale.z));
    }

    pub fn set_scale_y(&mut self, y: f32) {
        self.set_scale(Vec3::new(self.scale.x, y, self.scale.z));
    }

    pub fn set_scale_z(&mut self, z: f32) {
        self.set_scale(Vec3::new(self.scale.x, self.scale.y, z));
    }

    /// Grow the current scale by an additive amount per axis.
    pub fn scale_by(&mut self, delta: Vec3) {
        self.set_scale(self.scale + delta);
    }

    // ── Rotation ────────────────────────────────────────────────────────

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn roll(&self) -> f32 {
        self.roll
    }

    pub fn rotation_quat(&self) -> Quat {
        self.rotation
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        self.set_rotation_euler(pitch, self.yaw, self.roll);
    }

    pub fn set_yaw(&mut self, yaw: f32) {
        self.set_rotation_euler(self.pitch, yaw, self.roll);
    }

    pub fn set_roll(&mut self, roll: f32) {
        self.set_rotation_euler(self.pitch, self.yaw, roll);
    }

    pub fn pitch_by(&mut self, degrees: f32) {
        self.set_pitch(self.pitch + degrees);
    }

    pub fn yaw_by(&mut self, degrees: f32) {
        self.set_yaw(self.yaw + degrees);
    }

    pub fn roll_by(&mut self, degrees: f32) {
        self.set_roll(self.roll + degrees);
    }

    /// Set all three Euler angles (degrees); the quaternion follows.
    pub fn set_rotation_euler(&mut self, pitch: f32, yaw: f32, roll: f32) {
        if reject_non_finite("rotation", Vec3::new(pitch, yaw, roll)) {
            return;
        }
        self.pitch = pitch;
        self.yaw = yaw;
        self.roll = roll;
        self.rotation = quat_from_euler_degrees(pitch, yaw, roll);
        self.components_changed();
    }

    /// Set the rotation quaternion; the Euler angles follow.
    ///
    /// A zero or non-finite quaternion is rejected.
    pub fn set_rotation_quat(&mut self, rotation: Quat) {
        if !rotation.is_finite() || rotation.length_squared() < 1e-12 {
            log::warn!("Node '{}': rejected degenerate rotation {:?}", self.name, rotation);
            return;
        }
        let rotation = rotation.normalize();
        let (pitch, yaw, roll) = euler_degrees_from_quat(rotation);
        self.rotation = rotation;
        self.pitch = pitch;
        self.yaw = yaw;
        self.roll = roll;
        self.components_changed();
    }

    // ── Matrix ──────────────────────────────────────────────────────────

    /// The local transform matrix, rebuilt first if any component changed.
    pub fn transform_matrix(&self) -> Mat4 {
        if self.matrix_dirty.get() {
            self.matrix.set(Mat4::from_scale_rotation_translation(
                self.scale,
                self.rotation,
                self.position,
            ));
            self.matrix_dirty.set(false);
        }
        self.matrix.get()
    }

    pub fn is_matrix_dirty(&self) -> bool {
        self.matrix_dirty.get()
    }

    /// `true` while the matrix was installed by
    /// [`set_transform_by_matrix_pure`](Node::set_transform_by_matrix_pure).
    pub fn has_pure_matrix(&self) -> bool {
        self.pure_matrix
    }

    /// Force a rebuild from components on the next read.
    pub fn mark_matrix_dirty(&mut self) {
        self.pure_matrix = false;
        self.matrix_dirty.set(true);
    }

    /// Install `matrix` as the local matrix without touching TRS fields.
    pub fn set_transform_by_matrix_pure(&mut self, matrix: Mat4) {
        if !matrix.is_finite() {
            log::warn!("Node '{}': rejected non-finite matrix", self.name);
            return;
        }
        self.matrix.set(matrix);
        self.matrix_dirty.set(false);
        self.pure_matrix = true;
    }

    /// Decompose `matrix` into position, rotation and scale and apply them.
    pub fn set_transform_by_matrix(&mut self, matrix: Mat4) {
        if !matrix.is_finite() {
            log::warn!("Node '{}': rejected non-finite matrix", self.name);
            return;
        }
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        self.set_scale(scale);
        self.set_position(translation);
        self.set_rotation_quat(rotation);
    }

    fn components_changed(&mut self) {
        self.pure_matrix = false;
        self.matrix_dirty.set(true);
    }

    // ── Color / bounds ──────────────────────────────────────────────────

    pub fn set_color(&mut self, color: Color) {
        if !color.is_finite() {
            log::warn!("Node '{}': rejected non-finite color", self.name);
            return;
        }
        self.color = color;
    }

    /// Half extents of the local bounding box.
    pub fn bbox(&self) -> Vec3 {
        self.bbox
    }

    pub fn bbox_radius(&self) -> f32 {
        self.bbox_radius
    }

    /// Set the bounding box half extents; the radius becomes the box's
    /// circumscribed sphere.
    pub fn set_bbox(&mut self, half_extents: Vec3) {
        if reject_non_finite("bounding box", half_extents) {
            return;
        }
        self.bbox = half_extents.abs();
        self.bbox_radius = self.bbox.length();
    }

    /// Negative or non-finite radii are clamped to zero ("no bounds").
    pub fn set_bbox_radius(&mut self, radius: f32) {
        self.bbox_radius = if radius.is_finite() { radius.max(0.0) } else { 0.0 };
    }

    /// Derive the bounding box from the payload geometry, if any.
    pub fn recalculate_bbox(&mut self) {
        if let Some(half) = self.drawable.half_extents() {
            self.set_bbox(half);
        }
    }

    // ── Properties / links ──────────────────────────────────────────────

    pub fn prop(&self, name: &str) -> Option<&str> {
        self.props
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn set_prop(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.props.iter_mut().find(|p| p.name == name) {
            Some(prop) => prop.value = value,
            None => self.props.push(NodeProp { name, value }),
        }
    }

    pub fn props(&self) -> &[NodeProp] {
        &self.props
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn has_behavior(&self) -> bool {
        self.behavior.is_some()
    }

    pub fn set_behavior(&mut self, behavior: impl Behavior + 'static) {
        self.behavior = Some(Box::new(behavior));
    }

    pub fn clear_behavior(&mut self) {
        self.behavior = None;
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("position", &self.position)
            .field("scale", &self.scale)
            .field("rotation", &self.rotation)
            .field("color", &self.color)
            .field("enabled", &self.enabled)
            .field("visible", &self.visible)
            .field("parent", &self.parent)
            .field("children", &self.children.len())
            .finish()
    }
}

fn reject_non_finite(what: &str, value: Vec3) -> bool {
    if value.is_finite() {
        false
    } else {
        log::warn!("Node: rejected non-finite {} {:?}", what, value);
        true
    }
}
