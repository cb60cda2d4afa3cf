//! # Scene Graph: Parent/Child Links and Compound Attributes
//!
//! The [`SceneGraph`] is an arena of [`Node`]s addressed by [`NodeId`]. It
//! owns every node; links between nodes are ids, never references, so the
//! tree can be mutated freely from update hooks and the physics bridge.
//!
//! ## Usage
//!
//! ```ignore
//! let mut graph = SceneGraph::new();
//! let root = graph.spawn(Node::new().with_position(5.0, 0.0, 0.0));
//! let child = graph.spawn_child(root, Node::new().with_position(1.0, 0.0, 0.0));
//!
//! // (6, 0, 0): parent matrix × child matrix, walked on demand.
//! let world = graph.concatenated_matrix(child).transform_point3(Vec3::ZERO);
//! ```
//!
//! ## Compound Attributes
//!
//! Everything here is recomputed on each call by walking the parent chain (or
//! the subtree, for bounds). Nothing is cached across reads, because any
//! ancestor may have moved since the last one.
//!
//! ```text
//! concatenated matrix  parent_concat × local      (local only if ignore_parent_matrix)
//! compound color       color × parent_compound    (only if parent.color_affects_children)
//! compound visibility  visible && (!parent.visibility_affects_children
//!                                  || parent_compound_visible)
//! compound radius      max(radius, max_child(|child origin| + child_compound_radius))
//! ```
//!
//! The color and visibility rules are deliberately asymmetric: a parent's tint
//! always flows down unless switched off, while a hidden parent hides its
//! children only when `visibility_affects_children` says so.
//!
//! ## Ownership
//!
//! [`SceneGraph::destroy`] consults the node's `owns_children` flag: owned
//! children are destroyed with it, otherwise they are orphaned and stay alive
//! as parentless nodes the caller can re-attach.

use std::collections::HashMap;

use super::id::{NodeAllocator, NodeId};
use super::node::{Behavior, Node};
use crate::diag::LogOnce;
use crate::math::{Color, Mat4, Quat, Vec3, euler_degrees_from_quat, look_at_rotation};

/// Arena owning all nodes of a scene.
pub struct SceneGraph {
    allocator: NodeAllocator,
    slots: Vec<Option<Node>>,
    log_once: LogOnce,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            allocator: NodeAllocator::new(),
            slots: Vec::new(),
            log_once: LogOnce::new(),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Insert a parentless node and return its id.
    pub fn spawn(&mut self, mut node: Node) -> NodeId {
        node.parent = None;
        node.children.clear();
        let id = self.allocator.allocate();
        let index = id.index as usize;
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index] = Some(node);
        id
    }

    /// Insert a node as the last child of `parent`.
    ///
    /// If `parent` is not alive the node is still created, parentless.
    pub fn spawn_child(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = self.spawn(node);
        self.add_child(parent, id);
        id
    }

    /// Destroy a node. Its children are destroyed too when the node
    /// `owns_children`; otherwise they are orphaned.
    ///
    /// Returns `false` if the id was stale.
    pub fn destroy(&mut self, id: NodeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.detach(id);
        let Some(node) = self.take_slot(id) else {
            return false;
        };
        let owns_children = node.owns_children;
        for child in node.children {
            if owns_children {
                self.destroy(child);
            } else if let Some(child) = self.get_mut(child) {
                child.parent = None;
            }
        }
        true
    }

    /// Destroy a node and its entire subtree, regardless of ownership flags.
    pub fn destroy_recursive(&mut self, id: NodeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.detach(id);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.take_slot(current) {
                stack.extend(node.children);
            }
        }
        true
    }

    fn take_slot(&mut self, id: NodeId) -> Option<Node> {
        if !self.allocator.deallocate(id) {
            return None;
        }
        self.slots.get_mut(id.index as usize)?.take()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.allocator.is_alive(id)
            && self
                .slots
                .get(id.index as usize)
                .is_some_and(|slot| slot.is_some())
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.allocator.alive_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if !self.contains(id) {
            return None;
        }
        self.slots.get(id.index as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if !self.contains(id) {
            return None;
        }
        self.slots.get_mut(id.index as usize)?.as_mut()
    }

    /// Iterate over all live nodes in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let node = slot.as_ref()?;
            // Occupied slots always hold the current generation.
            Some((self.allocator.current(index as u32)?, node))
        })
    }

    // ── Links ───────────────────────────────────────────────────────────

    /// Append `child` to `parent`'s children, detaching it from any previous
    /// parent first. Refuses links that would create a cycle.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.contains(parent) || !self.contains(child) {
            log::warn!("add_child: {} or {} is not alive", parent, child);
            return false;
        }
        if parent == child || self.is_ancestor(child, parent) {
            log::warn!("add_child: linking {} under {} would create a cycle", child, parent);
            return false;
        }
        self.detach(child);
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
        true
    }

    /// Remove `child` from `parent`'s children. The child stays alive and
    /// becomes parentless.
    ///
    /// Removing a node that is not a child of `parent` is a no-op that
    /// returns `false`, not an error.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let Some(node) = self.get_mut(parent) else {
            return false;
        };
        let Some(pos) = node.children.iter().position(|&c| c == child) else {
            return false;
        };
        node.children.remove(pos);
        if let Some(node) = self.get_mut(child) {
            node.parent = None;
        }
        true
    }

    /// Detach a node from its parent, if it has one.
    pub fn detach(&mut self, id: NodeId) -> bool {
        match self.parent(id) {
            Some(parent) => self.remove_child(parent, id),
            None => false,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    /// Children of a node; empty for stale ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    pub fn child_at(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).get(index).copied()
    }

    /// `true` if `ancestor` appears on `id`'s parent chain.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// `id` followed by all its descendants, depth-first, parents first.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    // ── Matrices ────────────────────────────────────────────────────────

    /// World matrix of a node: walks to the root and multiplies parent
    /// before child. Identity for stale ids.
    pub fn concatenated_matrix(&self, id: NodeId) -> Mat4 {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            let Some(node) = self.get(cur) else {
                break;
            };
            chain.push(node.transform_matrix());
            if node.ignore_parent_matrix {
                break;
            }
            current = node.parent;
        }
        chain
            .into_iter()
            .rev()
            .fold(Mat4::IDENTITY, |world, local| world * local)
    }

    /// World-space position of the node's origin.
    pub fn combined_position(&self, id: NodeId) -> Vec3 {
        self.concatenated_matrix(id).w_axis.truncate()
    }

    /// World-space rotation, extracted from the concatenated matrix.
    pub fn concatenated_rotation(&self, id: NodeId) -> Quat {
        let (_, rotation, _) = self.concatenated_matrix(id).to_scale_rotation_translation();
        rotation
    }

    /// World-space `(pitch, yaw, roll)` in degrees.
    pub fn combined_euler(&self, id: NodeId) -> (f32, f32, f32) {
        euler_degrees_from_quat(self.concatenated_rotation(id))
    }

    pub fn combined_pitch(&self, id: NodeId) -> f32 {
        self.combined_euler(id).0
    }

    pub fn combined_yaw(&self, id: NodeId) -> f32 {
        self.combined_euler(id).1
    }

    pub fn combined_roll(&self, id: NodeId) -> f32 {
        self.combined_euler(id).2
    }

    /// Product of scales along the parent chain.
    pub fn compound_scale(&self, id: NodeId) -> Vec3 {
        let mut scale = Vec3::ONE;
        let mut current = Some(id);
        while let Some(cur) = current {
            let Some(node) = self.get(cur) else {
                break;
            };
            scale *= node.scale();
            if node.ignore_parent_matrix {
                break;
            }
            current = node.parent;
        }
        scale
    }

    /// Express a world-space matrix in the node's parent space, the space
    /// its local matrix lives in.
    pub fn to_parent_space(&self, id: NodeId, world: Mat4) -> Mat4 {
        match self.get(id) {
            Some(node) if !node.ignore_parent_matrix => match node.parent {
                Some(parent) => self.concatenated_matrix(parent).inverse() * world,
                None => world,
            },
            _ => world,
        }
    }

    /// Install a world-space matrix on a node as its pure local matrix,
    /// converting through the parent's world matrix when parented.
    pub fn set_world_matrix_pure(&mut self, id: NodeId, world: Mat4) {
        let local = self.to_parent_space(id, world);
        if let Some(node) = self.get_mut(id) {
            node.set_transform_by_matrix_pure(local);
        }
    }

    /// Like [`set_world_matrix_pure`](SceneGraph::set_world_matrix_pure) but
    /// decomposes into the node's position, scale and rotation.
    pub fn set_world_matrix(&mut self, id: NodeId, world: Mat4) {
        let local = self.to_parent_space(id, world);
        if let Some(node) = self.get_mut(id) {
            node.set_transform_by_matrix(local);
        }
    }

    // ── Compound attributes ─────────────────────────────────────────────

    pub fn compound_color(&self, id: NodeId) -> Color {
        let Some(node) = self.get(id) else {
            return Color::WHITE;
        };
        match node.parent.and_then(|p| self.get(p).map(|n| (p, n))) {
            Some((parent, parent_node)) if parent_node.color_affects_children => {
                node.color * self.compound_color(parent)
            }
            _ => node.color,
        }
    }

    pub fn compound_visible(&self, id: NodeId) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        if !node.visible {
            return false;
        }
        match node.parent.and_then(|p| self.get(p).map(|n| (p, n))) {
            Some((parent, parent_node)) => {
                !parent_node.visibility_affects_children || self.compound_visible(parent)
            }
            None => true,
        }
    }

    /// Bounding radius covering the node and its whole subtree, measured
    /// from the node's origin in its local units.
    pub fn compound_bbox_radius(&self, id: NodeId) -> f32 {
        self.compound_bbox_radii(id).get(&id).copied().unwrap_or(0.0)
    }

    /// [`compound_bbox_radius`](Self::compound_bbox_radius) of every node
    /// under `root`, in one bottom-up pass.
    pub fn compound_bbox_radii(&self, root: NodeId) -> HashMap<NodeId, f32> {
        let order = self.subtree(root);
        let mut radii = HashMap::with_capacity(order.len());
        // Pre-order reversed: every child is done before its parent.
        for &id in order.iter().rev() {
            let Some(node) = self.get(id) else {
                continue;
            };
            let radius = node
                .children
                .iter()
                .filter_map(|child| {
                    let offset = self.get(*child)?.transform_matrix().w_axis.truncate().length();
                    Some(offset + radii.get(child).copied().unwrap_or(0.0))
                })
                .fold(node.bbox_radius(), f32::max);
            radii.insert(id, radius);
        }
        radii
    }

    // ── Orientation ─────────────────────────────────────────────────────

    /// Rotate a node so that its +Z axis faces the world-space `target`.
    ///
    /// Returns `false` (rotation unchanged) when the target coincides with
    /// the node's position.
    pub fn look_at(&mut self, id: NodeId, target: Vec3, up: Vec3) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        let parent = if node.ignore_parent_matrix { None } else { node.parent };
        let eye = self.combined_position(id);

        let Some(world_rotation) = look_at_rotation(eye, target, up) else {
            self.log_once.warn(format!("look_at:{id}"), || {
                format!("look_at: node {id} is already at its target {target:?}")
            });
            return false;
        };

        let local_rotation = match parent {
            Some(parent) => self.concatenated_rotation(parent).inverse() * world_rotation,
            None => world_rotation,
        };
        if let Some(node) = self.get_mut(id) {
            node.set_rotation_quat(local_rotation);
        }
        true
    }

    /// [`look_at`](SceneGraph::look_at) another node's world position.
    pub fn look_at_node(&mut self, id: NodeId, other: NodeId, up: Vec3) -> bool {
        if !self.contains(other) {
            return false;
        }
        let target = self.combined_position(other);
        self.look_at(id, target, up)
    }

    // ── Behaviors ───────────────────────────────────────────────────────

    /// Run a node's behavior with the extract/reinsert pattern: the hook is
    /// taken out of the node so it may borrow the whole graph mutably.
    pub(crate) fn run_behavior(&mut self, id: NodeId, dt: f32) {
        let Some(mut behavior) = self.get_mut(id).and_then(|n| n.behavior.take()) else {
            return;
        };
        behavior.update(id, self, dt);
        // The hook may have destroyed its own node or installed a new hook.
        if let Some(node) = self.get_mut(id) {
            if node.behavior.is_none() {
                node.behavior = Some(behavior);
            }
        }
    }

    /// Attach a behavior to a live node.
    pub fn set_behavior(&mut self, id: NodeId, behavior: impl Behavior + 'static) -> bool {
        match self.get_mut(id) {
            Some(node) => {
                node.set_behavior(behavior);
                true
            }
            None => false,
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Mat3;

    #[test]
    fn id_ahead_of_a_freed_slot_is_not_alive() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn(Node::named("a"));
        assert!(graph.destroy(a));
        let ahead = NodeId {
            index: a.index(),
            generation: a.generation() + 1,
        };
        assert!(!graph.contains(ahead));
        assert!(!graph.destroy(ahead));

        let b = graph.spawn(Node::named("b"));
        let c = graph.spawn(Node::named("c"));
        assert_ne!(b, c);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.get(b).unwrap().name, "b");
        assert_eq!(graph.get(c).unwrap().name, "c");
    }

    #[test]
    fn child_origin_lands_in_world_space() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(Node::new().with_position(5.0, 0.0, 0.0));
        let child = graph.spawn_child(root, Node::new().with_position(1.0, 0.0, 0.0));

        let world = graph.concatenated_matrix(child).transform_point3(Vec3::ZERO);
        assert!((world - Vec3::new(6.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn concatenation_is_parent_times_local() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn(Node::new().with_position(1.0, 2.0, 0.0).with_rotation(0.0, 30.0, 0.0));
        let b = graph.spawn_child(a, Node::new().with_scale(2.0, 1.0, 1.0).with_position(0.0, 3.0, 0.0));
        let c = graph.spawn_child(b, Node::new().with_rotation(10.0, 0.0, 45.0));

        let expected = graph.concatenated_matrix(b) * graph.get(c).unwrap().transform_matrix();
        assert!(graph.concatenated_matrix(c).abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn ignore_parent_matrix_uses_local_only() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(Node::new().with_position(100.0, 0.0, 0.0));
        let mut child = Node::new().with_position(1.0, 0.0, 0.0);
        child.ignore_parent_matrix = true;
        let child = graph.spawn_child(root, child);

        assert_eq!(
            graph.concatenated_matrix(child),
            graph.get(child).unwrap().transform_matrix()
        );
    }

    #[test]
    fn parent_moves_child_follows_without_notification() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(Node::new());
        let child = graph.spawn_child(root, Node::new().with_position(5.0, 0.0, 0.0));
        assert!((graph.combined_position(child).x - 5.0).abs() < 1e-5);

        graph.get_mut(root).unwrap().set_position(Vec3::new(50.0, 0.0, 0.0));
        assert!((graph.combined_position(child).x - 55.0).abs() < 1e-5);
    }

    #[test]
    fn color_flows_down_unless_switched_off() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(Node::new().with_color(Color::rgba(0.5, 0.5, 0.5, 1.0)));
        let child = graph.spawn_child(root, Node::new().with_color(Color::rgba(1.0, 0.0, 1.0, 1.0)));
        assert_eq!(graph.compound_color(child), Color::rgba(0.5, 0.0, 0.5, 1.0));

        graph.get_mut(root).unwrap().color_affects_children = false;
        assert_eq!(graph.compound_color(child), Color::rgba(1.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn visibility_rule() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(Node::new());
        let child = graph.spawn_child(root, Node::new());

        graph.get_mut(root).unwrap().visible = false;
        assert!(!graph.compound_visible(root));
        assert!(!graph.compound_visible(child));

        graph.get_mut(root).unwrap().visibility_affects_children = false;
        assert!(graph.compound_visible(child));

        graph.get_mut(child).unwrap().visible = false;
        assert!(!graph.compound_visible(child));
    }

    #[test]
    fn compound_radius_covers_children() {
        let mut graph = SceneGraph::new();
        let parent = graph.spawn(Node::new().with_bbox_radius(1.0));
        graph.spawn_child(parent, Node::new().with_position(3.0, 0.0, 0.0).with_bbox_radius(2.0));
        assert!((graph.compound_bbox_radius(parent) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn compound_radius_is_max_over_children() {
        let mut graph = SceneGraph::new();
        let parent = graph.spawn(Node::new().with_bbox_radius(10.0));
        graph.spawn_child(parent, Node::new().with_position(0.0, 4.0, 0.0).with_bbox_radius(1.0));
        graph.spawn_child(parent, Node::new().with_position(0.0, 0.0, -3.0).with_bbox_radius(0.5));
        assert_eq!(graph.compound_bbox_radius(parent), 10.0);

        let far = graph.spawn_child(parent, Node::new().with_position(6.0, 8.0, 0.0));
        graph.spawn_child(far, Node::new().with_position(0.0, 1.0, 0.0).with_bbox_radius(1.0));
        // |(6,8,0)| + (|(0,1,0)| + 1) = 10 + 2
        assert!((graph.compound_bbox_radius(parent) - 12.0).abs() < 1e-5);
    }

    #[test]
    fn compound_radii_cover_the_whole_subtree_at_once() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(Node::new().with_bbox_radius(1.0));
        let arm = graph.spawn_child(root, Node::new().with_position(3.0, 0.0, 0.0));
        let hand = graph.spawn_child(arm, Node::new().with_position(0.0, 4.0, 0.0).with_bbox_radius(0.5));
        let other = graph.spawn(Node::new().with_bbox_radius(9.0));

        let radii = graph.compound_bbox_radii(root);
        assert_eq!(radii.len(), 3);
        assert!(!radii.contains_key(&other));
        assert!((radii[&hand] - 0.5).abs() < 1e-5);
        assert!((radii[&arm] - 4.5).abs() < 1e-5);
        assert!((radii[&root] - 7.5).abs() < 1e-5);
        for id in [root, arm, hand] {
            assert_eq!(radii[&id], graph.compound_bbox_radius(id));
        }
        assert!(graph.compound_bbox_radii(NodeId { index: 99, generation: 0 }).is_empty());
    }

    #[test]
    fn remove_missing_child_is_noop() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn(Node::new());
        let b = graph.spawn(Node::new());
        assert!(!graph.remove_child(a, b));
        assert_eq!(graph.child_count(a), 0);
        assert!(graph.contains(b));
    }

    #[test]
    fn add_child_reparents_and_refuses_cycles() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn(Node::new());
        let b = graph.spawn_child(a, Node::new());
        let c = graph.spawn_child(b, Node::new());

        assert!(!graph.add_child(c, a));
        assert!(!graph.add_child(a, a));

        let d = graph.spawn(Node::new());
        assert!(graph.add_child(d, c));
        assert_eq!(graph.parent(c), Some(d));
        assert_eq!(graph.child_count(b), 0);
    }

    #[test]
    fn destroy_orphans_unowned_children() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(Node::new());
        let child = graph.spawn_child(root, Node::new());

        assert!(graph.destroy(root));
        assert!(!graph.contains(root));
        assert!(graph.contains(child));
        assert_eq!(graph.parent(child), None);
    }

    #[test]
    fn destroy_cascades_owned_children() {
        let mut graph = SceneGraph::new();
        let mut owner = Node::new();
        owner.owns_children = true;
        let root = graph.spawn(owner);
        let child = graph.spawn_child(root, Node::new());
        let grandchild = graph.spawn_child(child, Node::new());

        graph.destroy(root);
        assert!(!graph.contains(child));
        // The child did not own its children.
        assert!(graph.contains(grandchild));
        assert_eq!(graph.parent(grandchild), None);
    }

    #[test]
    fn destroy_detaches_from_parent() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(Node::new());
        let a = graph.spawn_child(root, Node::new());
        let _b = graph.spawn_child(root, Node::new());
        graph.destroy(a);
        assert_eq!(graph.child_count(root), 1);
    }

    #[test]
    fn destroy_recursive_removes_everything() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(Node::new());
        let child = graph.spawn_child(root, Node::new());
        graph.spawn_child(child, Node::new());
        assert_eq!(graph.len(), 3);
        graph.destroy_recursive(root);
        assert!(graph.is_empty());
    }

    #[test]
    fn stale_ids_are_harmless() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn(Node::new());
        graph.destroy(a);
        let b = graph.spawn(Node::new());
        assert_eq!(a.index(), b.index());
        assert!(graph.get(a).is_none());
        assert_eq!(graph.concatenated_matrix(a), Mat4::IDENTITY);
        assert!(!graph.destroy(a));
        assert!(graph.contains(b));
    }

    #[test]
    fn iter_reports_live_ids() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn(Node::named("a"));
        let b = graph.spawn(Node::named("b"));
        graph.destroy(a);
        let c = graph.spawn(Node::named("c"));
        let ids: Vec<_> = graph.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![c, b]);
    }

    #[test]
    fn look_at_faces_target() {
        let mut graph = SceneGraph::new();
        let node = graph.spawn(Node::new().with_position(0.0, 0.0, 0.0));
        assert!(graph.look_at(node, Vec3::new(10.0, 0.0, 0.0), Vec3::Y));
        let forward = graph.concatenated_matrix(node).transform_vector3(Vec3::Z);
        assert!((forward - Vec3::X).length() < 1e-4);
    }

    #[test]
    fn look_at_degenerate_up_stays_orthonormal() {
        let mut graph = SceneGraph::new();
        let node = graph.spawn(Node::new());
        assert!(graph.look_at(node, Vec3::new(0.0, 3.0, 0.0), Vec3::Y));
        let m = Mat3::from_quat(graph.get(node).unwrap().rotation_quat());
        assert!(m.is_finite());
        assert!((m.determinant() - 1.0).abs() < 1e-4);
        assert!((m.z_axis - Vec3::Y).length() < 1e-4);
    }

    #[test]
    fn look_at_in_parent_space() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(Node::new().with_rotation(0.0, 90.0, 0.0));
        let child = graph.spawn_child(root, Node::new());
        let target = Vec3::new(0.0, 0.0, 10.0);
        assert!(graph.look_at(child, target, Vec3::Y));
        let forward = graph.concatenated_matrix(child).transform_vector3(Vec3::Z);
        assert!((forward - Vec3::Z).length() < 1e-4);
    }

    #[test]
    fn look_at_own_position_is_refused() {
        let mut graph = SceneGraph::new();
        let node = graph.spawn(Node::new().with_rotation(0.0, 45.0, 0.0));
        assert!(!graph.look_at(node, Vec3::ZERO, Vec3::Y));
        assert_eq!(graph.get(node).unwrap().yaw(), 45.0);
    }

    #[test]
    fn behavior_can_mutate_graph() {
        let mut graph = SceneGraph::new();
        let node = graph.spawn(Node::new().with_behavior(|id: NodeId, g: &mut SceneGraph, dt: f32| {
            if let Some(n) = g.get_mut(id) {
                n.translate(Vec3::new(dt, 0.0, 0.0));
            }
        }));
        graph.run_behavior(node, 0.5);
        graph.run_behavior(node, 0.5);
        assert_eq!(graph.get(node).unwrap().position().x, 1.0);
        assert!(graph.get(node).unwrap().has_behavior());
    }

    #[test]
    fn world_matrix_pure_converts_to_parent_space() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(Node::new().with_position(10.0, 0.0, 0.0));
        let child = graph.spawn_child(root, Node::new());
        graph.set_world_matrix_pure(child, Mat4::from_translation(Vec3::new(12.0, 1.0, 0.0)));
        let local = graph.get(child).unwrap().transform_matrix().w_axis.truncate();
        assert!((local - Vec3::new(2.0, 1.0, 0.0)).length() < 1e-5);
        assert!((graph.combined_position(child) - Vec3::new(12.0, 1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn compound_scale_multiplies() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(Node::new().with_scale(2.0, 2.0, 2.0));
        let child = graph.spawn_child(root, Node::new().with_scale(3.0, 1.0, 1.0));
        assert_eq!(graph.compound_scale(child), Vec3::new(6.0, 2.0, 2.0));
    }
}
