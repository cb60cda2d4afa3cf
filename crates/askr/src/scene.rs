//! # Scene: the Frame-Level Container
//!
//! A [`Scene`] owns a [`SceneGraph`] and decides which parts of it take part
//! in a frame: an ordered list of root entities, static geometry, lights and
//! the active camera.
//!
//! ## Frame Cycle
//!
//! ```text
//!    Idle ──update(dt)──► Updating ──► Idle ──render(dispatch)──► Rendering ──► Idle
//!                          │                                        │
//!                 behaviors, parent                        cull, push, draw,
//!                 before child; dirty                      recurse, restore, pop
//!                 matrices rebuilt
//! ```
//!
//! ## Cameras
//!
//! The scene always has a default camera on an internal node. The active
//! camera slot either points at that default, holds a camera the scene owns,
//! or holds a shared `Rc<Camera>` the caller keeps. `owns_camera` mirrors
//! which setter was used last; [`Scene::remove_camera`] reverts to the
//! default without touching it, and a shared camera is never freed by the
//! scene.
//!
//! ## Entity Ownership
//!
//! Removing an entity from a scene that `owns_children` destroys its subtree.
//! Otherwise the subtree is only detached and stays alive in the graph for
//! the caller to reuse.

use std::rc::Rc;

use crate::camera::Camera;
use crate::config::SceneConfig;
use crate::diag::{FrameStats, LogOnce};
use crate::graph::{Node, NodeId, SceneGraph};
use crate::light::Light;
use crate::math::{Color, Mat4, Quat, Ray, Vec3, max_scale};
use crate::render::dispatch::{DrawState, Fog, RenderDispatch, SceneFrame};
use crate::render::traverse::{Inherited, Traversal};

/// Where the scene is within its frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePhase {
    #[default]
    Idle,
    Updating,
    Rendering,
}

enum CameraSlot {
    Default,
    Owned(Box<Camera>),
    Shared(Rc<Camera>),
}

pub struct Scene {
    graph: SceneGraph,
    roots: Vec<NodeId>,
    static_geometry: Vec<NodeId>,
    lights: Vec<Light>,
    default_camera: Camera,
    active_camera: CameraSlot,
    owns_camera: bool,

    pub enabled: bool,
    /// Offscreen-only scene; renders even without a reachable camera.
    pub virtual_scene: bool,
    pub owns_children: bool,
    pub clear_color: Option<Color>,
    pub ambient_color: Color,
    pub fog: Option<Fog>,
    pub lighting_enabled: bool,
    pub frustum_culling: bool,
    pub depth_sort: bool,

    phase: FramePhase,
    stats: FrameStats,
    log_once: LogOnce,
}

impl Scene {
    pub fn new() -> Self {
        Self::from_config(&SceneConfig::default())
    }

    pub fn from_config(config: &SceneConfig) -> Self {
        let mut graph = SceneGraph::new();
        let camera_node = graph.spawn(Node::named("default_camera"));
        Self {
            graph,
            roots: Vec::new(),
            static_geometry: Vec::new(),
            lights: Vec::new(),
            default_camera: Camera::new(camera_node),
            active_camera: CameraSlot::Default,
            owns_camera: false,
            enabled: true,
            virtual_scene: config.virtual_scene,
            owns_children: config.owns_children,
            clear_color: config.clear_color,
            ambient_color: config.ambient_color,
            fog: None,
            lighting_enabled: config.lighting_enabled,
            frustum_culling: config.frustum_culling,
            depth_sort: config.depth_sort,
            phase: FramePhase::Idle,
            stats: FrameStats::default(),
            log_once: LogOnce::new(),
        }
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.graph.get_mut(id)
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Counters from the most recent update and render.
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut FrameStats {
        &mut self.stats
    }

    // ── Entities ────────────────────────────────────────────────────────

    /// Create a node and add it as a root entity.
    pub fn spawn(&mut self, node: Node) -> NodeId {
        let id = self.graph.spawn(node);
        self.roots.push(id);
        id
    }

    /// Create a node as a child of an existing node.
    pub fn spawn_child(&mut self, parent: NodeId, node: Node) -> NodeId {
        self.graph.spawn_child(parent, node)
    }

    /// Track an existing node as a root entity, detaching it from any parent.
    pub fn add_entity(&mut self, id: NodeId) -> bool {
        if !self.graph.contains(id) {
            log::warn!("add_entity: {id} is not alive");
            return false;
        }
        if self.roots.contains(&id) {
            return false;
        }
        self.graph.detach(id);
        self.roots.push(id);
        true
    }

    /// Stop tracking an entity (a root or any tracked descendant). The
    /// subtree is destroyed when the scene `owns_children`, otherwise it is
    /// detached and left alive.
    pub fn remove_entity(&mut self, id: NodeId) -> bool {
        if !self.is_tracked(id) {
            log::warn!("remove_entity: {id} is not tracked by this scene");
            return false;
        }
        self.roots.retain(|&r| r != id);
        self.static_geometry.retain(|&s| s != id);
        if self.owns_children {
            self.graph.destroy_recursive(id);
        } else {
            self.graph.detach(id);
        }
        true
    }

    /// Root entities in insertion order.
    pub fn entities(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn entity_count(&self) -> usize {
        self.roots.len()
    }

    /// `true` if `id` is a root entity, static geometry or a descendant of
    /// either.
    pub fn is_tracked(&self, id: NodeId) -> bool {
        if !self.graph.contains(id) {
            return false;
        }
        let mut top = id;
        while let Some(parent) = self.graph.parent(top) {
            top = parent;
        }
        self.roots.contains(&top) || self.static_geometry.contains(&top)
    }

    /// Every tracked node: roots and static geometry with their descendants,
    /// parents first.
    pub fn tracked_entities(&self) -> Vec<NodeId> {
        self.static_geometry
            .iter()
            .chain(self.roots.iter())
            .flat_map(|&root| self.graph.subtree(root))
            .collect()
    }

    /// First tracked entity with the given custom type tag.
    pub fn custom_entity_by_type(&self, custom_type: &str) -> Option<NodeId> {
        self.tracked_entities()
            .into_iter()
            .find(|&id| self.graph.get(id).is_some_and(|n| n.custom_type == custom_type))
    }

    /// All tracked entities with the given custom type tag.
    pub fn custom_entities_by_type(&self, custom_type: &str) -> Vec<NodeId> {
        self.tracked_entities()
            .into_iter()
            .filter(|&id| self.graph.get(id).is_some_and(|n| n.custom_type == custom_type))
            .collect()
    }

    // ── Static geometry ─────────────────────────────────────────────────

    /// Track a node as static geometry. It is drawn before the entities
    /// and never run through behaviors.
    pub fn add_static_geometry(&mut self, id: NodeId) -> bool {
        if !self.graph.contains(id) || self.static_geometry.contains(&id) {
            return false;
        }
        self.graph.detach(id);
        self.roots.retain(|&r| r != id);
        self.static_geometry.push(id);
        true
    }

    pub fn static_geometry(&self, index: usize) -> Option<NodeId> {
        self.static_geometry.get(index).copied()
    }

    pub fn static_geometry_count(&self) -> usize {
        self.static_geometry.len()
    }

    // ── Lights ──────────────────────────────────────────────────────────

    /// Add a light and return its index.
    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    /// Remove the first light bound to `node`.
    pub fn remove_light(&mut self, node: NodeId) -> Option<Light> {
        let index = self.lights.iter().position(|l| l.node == node)?;
        Some(self.lights.remove(index))
    }

    pub fn light(&self, index: usize) -> Option<&Light> {
        self.lights.get(index)
    }

    pub fn light_mut(&mut self, index: usize) -> Option<&mut Light> {
        self.lights.get_mut(index)
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Closest light to a world position. Ties go to the light added first;
    /// lights whose node was destroyed are ignored.
    pub fn nearest_light(&self, position: Vec3) -> Option<&Light> {
        let mut best: Option<(&Light, f32)> = None;
        for light in &self.lights {
            if !self.graph.contains(light.node) {
                continue;
            }
            let distance = light.position(&self.graph).distance_squared(position);
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((light, distance));
            }
        }
        best.map(|(light, _)| light)
    }

    // ── Cameras ─────────────────────────────────────────────────────────

    pub fn default_camera(&self) -> &Camera {
        &self.default_camera
    }

    pub fn default_camera_mut(&mut self) -> &mut Camera {
        &mut self.default_camera
    }

    pub fn active_camera(&self) -> &Camera {
        match &self.active_camera {
            CameraSlot::Default => &self.default_camera,
            CameraSlot::Owned(camera) => camera,
            CameraSlot::Shared(camera) => camera,
        }
    }

    pub fn is_default_camera_active(&self) -> bool {
        matches!(self.active_camera, CameraSlot::Default)
    }

    /// Whether the scene owned the camera installed last.
    pub fn owns_camera(&self) -> bool {
        self.owns_camera
    }

    /// Install a camera the scene owns. A previously owned camera is dropped.
    pub fn set_active_camera(&mut self, camera: Camera) {
        self.active_camera = CameraSlot::Owned(Box::new(camera));
        self.owns_camera = true;
    }

    /// Install a camera the caller keeps ownership of.
    pub fn set_active_camera_shared(&mut self, camera: Rc<Camera>) {
        self.active_camera = CameraSlot::Shared(camera);
        self.owns_camera = false;
    }

    /// Revert to the default camera. An owned camera is dropped, a shared
    /// camera is only released. `owns_camera` is left as it was.
    ///
    /// Returns `false` (with a warning) when the default camera is already
    /// active, since the default camera cannot be removed.
    pub fn remove_camera(&mut self) -> bool {
        match std::mem::replace(&mut self.active_camera, CameraSlot::Default) {
            CameraSlot::Default => {
                log::warn!("remove_camera: the default camera cannot be removed");
                false
            }
            CameraSlot::Owned(camera) => {
                log::debug!("remove_camera: dropping owned camera on {}", camera.node);
                true
            }
            CameraSlot::Shared(camera) => {
                log::debug!("remove_camera: releasing shared camera on {}", camera.node);
                true
            }
        }
    }

    // ── Frame ───────────────────────────────────────────────────────────

    /// Run behaviors and rebuild dirty matrices, parent before child, for
    /// every enabled root.
    pub fn update(&mut self, elapsed: f32) {
        if !self.enabled {
            return;
        }
        self.phase = FramePhase::Updating;
        self.stats.reset_update();
        for root in self.roots.clone() {
            self.update_node(root, elapsed);
        }
        self.phase = FramePhase::Idle;
    }

    fn update_node(&mut self, id: NodeId, elapsed: f32) {
        if !self.graph.get(id).is_some_and(|n| n.enabled) {
            return;
        }
        self.graph.run_behavior(id, elapsed);
        let Some(node) = self.graph.get(id) else {
            // The behavior destroyed its own node.
            return;
        };
        node.transform_matrix();
        self.stats.nodes_updated += 1;
        for child in node.children().to_vec() {
            self.update_node(child, elapsed);
        }
    }

    /// Draw the scene through the active camera.
    ///
    /// Returns `false` when nothing was rendered: the scene is disabled, or
    /// it is not virtual and the camera's node no longer exists.
    pub fn render(&mut self, dispatch: &mut dyn RenderDispatch) -> bool {
        let camera = self.active_camera().clone();
        self.render_with_camera(dispatch, &camera)
    }

    pub fn render_with_camera(&mut self, dispatch: &mut dyn RenderDispatch, camera: &Camera) -> bool {
        if !self.enabled {
            return false;
        }
        let reachable = camera.is_reachable(&self.graph);
        if !reachable && !self.virtual_scene {
            self.log_once.warn("render:camera", || {
                format!("render: camera node {} is gone, skipping frame", camera.node)
            });
            return false;
        }

        self.phase = FramePhase::Rendering;
        self.stats.reset_render();

        let (view, projection, camera_position, camera_rotation, frustum) = if reachable {
            (
                camera.view_matrix(&self.graph),
                camera.projection_matrix(),
                camera.position(&self.graph),
                camera.rotation(&self.graph),
                self.frustum_culling.then(|| camera.frustum(&self.graph)),
            )
        } else {
            (Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO, Quat::IDENTITY, None)
        };

        let frame = SceneFrame {
            view,
            projection,
            camera_position,
            clear_color: self.clear_color,
            ambient_color: self.ambient_color,
            fog: self.fog,
            lighting_enabled: self.lighting_enabled,
            lights: self
                .lights
                .iter()
                .filter(|l| self.graph.contains(l.node))
                .map(|l| l.resolve(&self.graph))
                .collect(),
        };
        dispatch.begin_scene(&frame);
        let base_state = DrawState::default();
        base_state.apply_all(dispatch);

        let mut order = self.roots.clone();
        if self.depth_sort {
            let graph = &self.graph;
            let mut keyed: Vec<(NodeId, f32)> = order
                .iter()
                .map(|&id| (id, graph.combined_position(id).distance_squared(camera_position)))
                .collect();
            // Far to near; the sort is stable so equal distances keep insertion order.
            keyed.sort_by(|a, b| b.1.total_cmp(&a.1));
            order = keyed.into_iter().map(|(id, _)| id).collect();
        }

        let mut traversal = Traversal::new(&self.graph, frustum, camera_rotation, &mut self.stats);
        for &id in self.static_geometry.iter().chain(order.iter()) {
            traversal.visit(dispatch, id, Inherited::root(base_state));
        }

        dispatch.end_scene();
        log::trace!(
            "render: {} drawn, {} culled, {} draw calls",
            self.stats.nodes_drawn,
            self.stats.nodes_culled,
            self.stats.draw_calls
        );
        self.phase = FramePhase::Idle;
        true
    }

    // ── Picking ─────────────────────────────────────────────────────────

    /// Nearest tracked, enabled and visible entity whose compound bounding
    /// sphere the ray hits. Nodes without bounds are never picked.
    pub fn entity_at_ray(&self, ray: &Ray) -> Option<NodeId> {
        let mut best: Option<(NodeId, f32)> = None;
        for id in self.tracked_entities() {
            let Some(node) = self.graph.get(id) else {
                continue;
            };
            if !node.enabled || !self.graph.compound_visible(id) {
                continue;
            }
            let radius = self.graph.compound_bbox_radius(id);
            if radius <= 0.0 {
                continue;
            }
            let world = self.graph.concatenated_matrix(id);
            let Some(t) = ray.intersect_sphere(world.w_axis.truncate(), radius * max_scale(&world)) else {
                continue;
            };
            if best.is_none_or(|(_, best_t)| t < best_t) {
                best = Some((id, t));
            }
        }
        best.map(|(id, _)| id)
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
