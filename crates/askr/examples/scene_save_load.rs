//! Scene persistence: save a scene to JSON, load it into a fresh scene.
//!
//! Run with: `cargo run -p askr --example scene_save_load`

use askr::prelude::*;

fn main() -> askr::Result<()> {
    env_logger::init();

    let mut scene = Scene::new();
    let ship = scene.spawn(
        Node::named("ship")
            .with_position(1.0, 2.0, 3.0)
            .with_rotation(0.0, 45.0, 0.0)
            .with_custom_type("player"),
    );
    scene.spawn_child(ship, Node::named("turret").with_position(0.0, 1.0, 0.0));
    if let Some(node) = scene.node_mut(ship) {
        node.set_prop("health", "100");
    }
    scene.add_light(Light::point(ship, Color::rgb(1.0, 0.8, 0.6), 2.0, 25.0));

    let path = std::env::temp_dir().join("askr_scene_save_load.json");
    askr::scene_file::save_scene(&scene, &path)?;
    println!("saved to {}", path.display());

    let mut restored = Scene::new();
    let roots = askr::scene_file::load_scene(&mut restored, &path)?;
    for root in roots {
        for id in restored.graph().subtree(root) {
            let Some(node) = restored.node(id) else { continue };
            println!(
                "{} at {:?}, custom type '{}', props {:?}",
                node.name,
                restored.graph().combined_position(id),
                node.custom_type,
                node.props()
            );
        }
    }
    println!("{} light(s) restored", restored.light_count());
    Ok(())
}
