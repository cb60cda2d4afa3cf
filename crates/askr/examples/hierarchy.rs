//! Node hierarchies: a small solar system rendered into a recorder.
//!
//! Planets orbit the sun and moons orbit their planet, all through parent
//! transforms. The recorded command stream stands in for a real renderer.
//!
//! Run with: `cargo run -p askr --example hierarchy`

use askr::prelude::*;

fn main() {
    env_logger::init();

    let mut scene = Scene::from_config(&SceneConfig::default());
    let camera = scene.default_camera().node;
    if let Some(node) = scene.node_mut(camera) {
        node.set_position(Vec3::new(0.0, 0.0, -40.0));
    }

    let sun = scene.spawn(
        Node::named("sun")
            .with_drawable(Drawable::mesh(Mesh::quad(6.0, 6.0)))
            .with_color(Color::rgb(1.0, 0.9, 0.2))
            .with_behavior(|id: NodeId, graph: &mut SceneGraph, dt: f32| {
                if let Some(node) = graph.get_mut(id) {
                    node.roll_by(20.0 * dt);
                }
            }),
    );

    for (i, distance) in [10.0_f32, 16.0].into_iter().enumerate() {
        let planet = scene.spawn_child(
            sun,
            Node::named(format!("planet{i}"))
                .with_position(distance, 0.0, 0.0)
                .with_drawable(Drawable::mesh(Mesh::quad(2.0, 2.0)))
                .with_color(Color::rgb(0.3, 0.5, 1.0)),
        );
        scene.spawn_child(
            planet,
            Node::named(format!("moon{i}"))
                .with_position(2.5, 0.0, 0.0)
                .with_drawable(Drawable::mesh(Mesh::quad(0.5, 0.5))),
        );
    }

    let mut recorder = RecordingDispatch::new();
    for frame in 0..3 {
        scene.update(1.0);
        scene.render(&mut recorder);
        let stats = scene.stats();
        log::info!(
            "frame {frame}: updated {}, drawn {}, culled {}, max matrix depth {}",
            stats.nodes_updated,
            stats.nodes_drawn,
            stats.nodes_culled,
            recorder.max_depth()
        );
        for id in scene.tracked_entities() {
            if let Some(node) = scene.node(id) {
                let p = scene.graph().combined_position(id);
                println!("{:>10}  ({:7.2}, {:7.2}, {:7.2})", node.name, p.x, p.y, p.z);
            }
        }
        recorder.take();
    }
}
