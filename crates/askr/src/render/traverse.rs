//! # Render Traversal
//!
//! Depth-first walk from one root, parent before child, carrying the
//! parent's world matrix, inherited tint, visibility and draw state down the
//! recursion instead of re-walking the parent chain for every node.
//!
//! ```text
//! visit(node):
//!   disabled?                       → skip subtree
//!   compound sphere outside frustum → skip subtree (radius 0 = never culled)
//!   push_matrix
//!   set_transform(world)            (billboard: rotation ← camera rotation)
//!   if visible here:
//!     set_vertex_color(compound color)
//!     apply draw-state diff
//!     draw payload
//!   for child: visit(child)
//!   restore parent's draw state
//!   pop_matrix
//! ```
//!
//! A hidden node still pushes its matrix so its children can follow the
//! compound-visibility rule on their own.

use std::collections::HashMap;

use super::dispatch::{DrawState, RenderDispatch};
use crate::camera::Frustum;
use crate::diag::FrameStats;
use crate::drawable::{Drawable, Mesh};
use crate::graph::{Node, NodeId, SceneGraph};
use crate::math::{Color, Mat4, Quat, max_scale};

/// Values inherited from the parent during the walk.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Inherited {
    pub world: Mat4,
    /// Tint applied to this node; white when the parent does not pass color.
    pub tint: Color,
    /// `false` when an ancestor hides this subtree.
    pub visible: bool,
    pub state: DrawState,
}

impl Inherited {
    pub fn root(state: DrawState) -> Self {
        Self {
            world: Mat4::IDENTITY,
            tint: Color::WHITE,
            visible: true,
            state,
        }
    }
}

pub(crate) struct Traversal<'a> {
    pub graph: &'a SceneGraph,
    pub frustum: Option<Frustum>,
    pub camera_rotation: Quat,
    pub stats: &'a mut FrameStats,
    /// Compound radii, filled one root subtree at a time.
    radii: HashMap<NodeId, f32>,
}

impl<'a> Traversal<'a> {
    pub fn new(graph: &'a SceneGraph, frustum: Option<Frustum>, camera_rotation: Quat, stats: &'a mut FrameStats) -> Self {
        Self {
            graph,
            frustum,
            camera_rotation,
            stats,
            radii: HashMap::new(),
        }
    }

    pub fn visit(&mut self, dispatch: &mut dyn RenderDispatch, id: NodeId, inherited: Inherited) {
        let Some(node) = self.graph.get(id) else {
            return;
        };
        if !node.enabled {
            return;
        }

        let local = node.transform_matrix();
        let mut world = if node.ignore_parent_matrix {
            local
        } else {
            inherited.world * local
        };

        if let Some(frustum) = self.frustum {
            if self.is_culled(&frustum, id, &world) {
                self.stats.nodes_culled += 1;
                return;
            }
        }

        // Children inherit the billboard-free matrix.
        let child_world = world;
        if node.billboard_mode {
            let (scale, _, translation) = world.to_scale_rotation_translation();
            world = Mat4::from_scale_rotation_translation(scale, self.camera_rotation, translation);
        }

        dispatch.push_matrix();
        dispatch.set_transform(world);

        let visible_here = node.visible && inherited.visible;
        let color = node.color * inherited.tint;
        let state = draw_state_of(node);

        if visible_here {
            dispatch.set_vertex_color(color);
            state.apply_diff(&inherited.state, dispatch);
            self.draw_payload(dispatch, &node.drawable);
            self.stats.nodes_drawn += 1;
        }
        let active_state = if visible_here { state } else { inherited.state };

        let down = Inherited {
            world: child_world,
            tint: if node.color_affects_children {
                color
            } else {
                Color::WHITE
            },
            visible: !node.visibility_affects_children || visible_here,
            state: active_state,
        };
        for &child in node.children() {
            self.visit(dispatch, child, down);
        }

        inherited.state.apply_diff(&active_state, dispatch);
        dispatch.pop_matrix();
    }

    fn is_culled(&mut self, frustum: &Frustum, id: NodeId, world: &Mat4) -> bool {
        if !self.radii.contains_key(&id) {
            self.radii.extend(self.graph.compound_bbox_radii(id));
        }
        let radius = self.radii.get(&id).copied().unwrap_or(0.0);
        if radius <= 0.0 {
            return false;
        }
        let center = world.w_axis.truncate();
        !frustum.intersects_sphere(center, radius * max_scale(world))
    }

    fn draw_payload(&mut self, dispatch: &mut dyn RenderDispatch, drawable: &Drawable) {
        match drawable {
            Drawable::None => {}
            Drawable::Mesh(mesh) => self.draw_mesh(dispatch, mesh),
            Drawable::Image(image) => {
                let quad = Mesh::quad(image.size.x, image.size.y);
                dispatch.bind_texture(image.texture);
                dispatch.submit_vertices(&quad.vertices);
                dispatch.draw(quad.primitive, quad.vertices.len());
                self.stats.draw_calls += 1;
            }
            Drawable::Label(label) => {
                if let Some(layout) = &label.layout {
                    self.draw_mesh(dispatch, layout);
                }
            }
        }
    }

    fn draw_mesh(&mut self, dispatch: &mut dyn RenderDispatch, mesh: &Mesh) {
        if mesh.vertices.is_empty() {
            return;
        }
        dispatch.bind_texture(mesh.texture);
        dispatch.submit_vertices(&mesh.vertices);
        dispatch.draw(mesh.primitive, mesh.vertices.len());
        self.stats.draw_calls += 1;
    }
}

fn draw_state_of(node: &Node) -> DrawState {
    DrawState {
        blend_mode: node.blend_mode,
        depth_test: node.depth_test,
        depth_write: node.depth_write,
        backface_culled: node.backface_culled,
    }
}

/// Walk a single subtree without culling, as a standalone helper.
pub fn render_subtree(graph: &SceneGraph, dispatch: &mut dyn RenderDispatch, root: NodeId) -> FrameStats {
    let mut stats = FrameStats::default();
    let mut traversal = Traversal::new(graph, None, Quat::IDENTITY, &mut stats);
    let parent_world = graph
        .parent(root)
        .map(|p| graph.concatenated_matrix(p))
        .unwrap_or(Mat4::IDENTITY);
    traversal.visit(
        dispatch,
        root,
        Inherited {
            world: parent_world,
            ..Inherited::root(DrawState::default())
        },
    );
    stats
}
