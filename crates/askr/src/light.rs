//! Scene lights.
//!
//! Like cameras, lights are bound to a scene-graph node and take their
//! position and direction from its concatenated matrix. A directional or spot
//! light shines along the node's +Z axis.

use serde::{Deserialize, Serialize};

use crate::graph::{NodeId, SceneGraph};
use crate::math::{Color, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    Point,
    Directional,
    Spot {
        /// Full-intensity cone half angle, degrees.
        inner_angle: f32,
        /// Falloff cone half angle, degrees.
        outer_angle: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub node: NodeId,
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
    /// Attenuation range in world units. Ignored for directional lights.
    pub distance: f32,
}

impl Light {
    pub fn point(node: NodeId, color: Color, intensity: f32, distance: f32) -> Self {
        Self {
            node,
            kind: LightKind::Point,
            color,
            intensity,
            distance,
        }
    }

    pub fn directional(node: NodeId, color: Color, intensity: f32) -> Self {
        Self {
            node,
            kind: LightKind::Directional,
            color,
            intensity,
            distance: 0.0,
        }
    }

    pub fn spot(
        node: NodeId,
        color: Color,
        intensity: f32,
        distance: f32,
        inner_angle: f32,
        outer_angle: f32,
    ) -> Self {
        Self {
            node,
            kind: LightKind::Spot {
                inner_angle,
                outer_angle,
            },
            color,
            intensity,
            distance,
        }
    }

    pub fn position(&self, graph: &SceneGraph) -> Vec3 {
        graph.combined_position(self.node)
    }

    pub fn direction(&self, graph: &SceneGraph) -> Vec3 {
        (graph.concatenated_rotation(self.node) * Vec3::Z).normalize_or_zero()
    }

    /// Resolve this light into world space for the dispatcher.
    pub fn resolve(&self, graph: &SceneGraph) -> LightData {
        LightData {
            kind: self.kind,
            color: self.color,
            intensity: self.intensity,
            distance: self.distance,
            position: self.position(graph),
            direction: self.direction(graph),
        }
    }
}

/// A light flattened to world space, handed to
/// [`RenderDispatch::begin_scene`](crate::render::RenderDispatch::begin_scene).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightData {
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
    pub distance: f32,
    pub position: Vec3,
    pub direction: Vec3,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    #[test]
    fn resolves_through_parent() {
        let mut graph = SceneGraph::new();
        let rig = graph.spawn(Node::new().with_position(0.0, 10.0, 0.0));
        let node = graph.spawn_child(rig, Node::new().with_position(2.0, 0.0, 0.0).with_rotation(0.0, 90.0, 0.0));
        let light = Light::directional(node, Color::WHITE, 1.0);

        let data = light.resolve(&graph);
        assert!((data.position - Vec3::new(2.0, 10.0, 0.0)).length() < 1e-5);
        assert!((data.direction - Vec3::X).length() < 1e-5);
    }
}
