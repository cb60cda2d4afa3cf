//! 2D physics: boxes fall onto a ground plane and report collisions.
//!
//! Run with: `cargo run -p askr --example physics_2d --features physics2d`

use std::time::Instant;

use askr::prelude::*;

fn main() {
    env_logger::init();

    let config = EngineConfig::default();
    let physics = PhysicsConfig {
        world_scale: 10.0,
        ..config.physics
    };
    let mut world = PhysicsScene::new(Scene::from_config(&config.scene), Rapier2dBackend::new(), physics);

    let ground = world.scene_mut().spawn(
        Node::named("ground")
            .with_position(0.0, -50.0, 0.0)
            .with_drawable(Drawable::mesh(Mesh::quad(400.0, 20.0))),
    );
    world.add_physics_child(ground, ShapeKind::Rect, BodyParams::fixed());

    for i in 0..3 {
        let crate_ = world.scene_mut().spawn(
            Node::named(format!("crate{i}"))
                .with_position(-30.0 + 30.0 * i as f32, 40.0 + 25.0 * i as f32, 0.0)
                .with_drawable(Drawable::mesh(Mesh::quad(10.0, 10.0))),
        );
        world.add_physics_child(crate_, ShapeKind::Rect, BodyParams::dynamic().with_restitution(0.2));
    }

    world.events_mut().subscribe(|event: &CollisionEvent| {
        if event.kind == CollisionKind::Begin {
            log::info!(
                "{} hit {} at {:?} (impact {:.2})",
                event.entity_a,
                event.entity_b,
                event.world_point,
                event.impact_strength
            );
        }
        false
    });

    let frames = 240;
    let started = Instant::now();
    for _ in 0..frames {
        world.update(1.0 / 60.0);
    }
    println!("{frames} frames in {:.3}s wall time", started.elapsed().as_secs_f32());

    let events = world.drain_events();
    println!("{} collision events", events.len());
    for entity in world.physics_entities() {
        let name = world.scene().node(entity.node).map(|n| n.name.clone()).unwrap_or_default();
        let p = world.scene().graph().combined_position(entity.node);
        println!("{name:>8}  ({:7.2}, {:7.2})  {:?}", p.x, p.y, world.body_state(entity.node));
    }
}
