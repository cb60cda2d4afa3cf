//! # Persistence: Scene ⇄ Document
//!
//! Converts tracked entities (recursively), static geometry, lights and a few
//! scene settings to and from the generic [`Document`] tree. No file format
//! is involved here; see [`scene_file`](crate::scene_file) for JSON.
//!
//! ## Layout
//!
//! ```text
//! scene (container)
//! ├── settings         container: ambient/clear color, lighting, flags,
//! │                    fog, camera (projection, aspect, node transform)
//! ├── entities         array of "entity" containers
//! ├── static_geometry  array of "entity" containers
//! └── lights           array of "light" containers
//!
//! entity (container)
//! ├── name, custom_type
//! ├── px py pz · sx sy sz · pitch yaw roll
//! ├── color            container r g b a
//! ├── flags            enabled, visible, ... as bools
//! ├── blend_mode       string
//! ├── bbox_radius, hx hy hz
//! ├── drawable         container: kind + image/label fields
//! ├── props            array of string entries, name = key
//! └── children         array of "entity" containers
//! ```
//!
//! The camera entry describes the default camera. A custom active camera is
//! bound to one of the scene's own nodes and is not saved.
//!
//! A light refers to its node by index into the pre-order list of saved
//! entities. Lights bound to untracked nodes carry their own world position
//! and rotation, and get a fresh node on load.
//!
//! Loading parses the whole document before touching the scene, so a
//! malformed document leaves the scene unchanged. Mesh vertex data is asset
//! content and is not saved; a mesh-backed node loads as a bare transform.

use crate::camera::{Camera, Projection};
use crate::config::SceneConfig;
use crate::document::{Document, Entry, Value};
use crate::drawable::{BlendMode, Drawable, TextureId};
use crate::error::{Error, Result};
use crate::graph::{Node, NodeId, SceneGraph};
use crate::light::{Light, LightKind};
use crate::math::{Color, Vec2, Vec3, euler_degrees_from_quat};
use crate::render::dispatch::Fog;
use crate::scene::Scene;

// ── Save ────────────────────────────────────────────────────────────────

impl Scene {
    /// Snapshot the scene into a document.
    pub fn save_document(&self) -> Document {
        let graph = self.graph();
        let mut saved_order = Vec::new();

        let mut entities = Entry::array("entities");
        for &root in self.entities() {
            entities.push(save_node(graph, root, &mut saved_order));
        }
        let mut statics = Entry::array("static_geometry");
        for index in 0..self.static_geometry_count() {
            if let Some(id) = self.static_geometry(index) {
                statics.push(save_node(graph, id, &mut saved_order));
            }
        }

        let mut lights = Entry::array("lights");
        for light in self.lights() {
            if graph.contains(light.node) {
                lights.push(save_light(graph, light, &saved_order));
            }
        }

        let mut settings = Entry::container("settings")
            .with(color_entry("ambient_color", self.ambient_color))
            .with(Entry::bool("lighting_enabled", self.lighting_enabled))
            .with(Entry::bool("virtual_scene", self.virtual_scene))
            .with(Entry::bool("frustum_culling", self.frustum_culling))
            .with(Entry::bool("depth_sort", self.depth_sort));
        if let Some(clear) = self.clear_color {
            settings.push(color_entry("clear_color", clear));
        }
        if let Some(fog) = self.fog {
            settings.push(
                Entry::container("fog")
                    .with(color_entry("color", fog.color))
                    .with(Entry::float("start", fog.start))
                    .with(Entry::float("end", fog.end)),
            );
        }
        settings.push(save_camera(graph, self.default_camera()));

        let mut document = Document::new("scene");
        let root = document.root_mut();
        root.push(settings);
        root.push(entities);
        root.push(statics);
        root.push(lights);
        document
    }

    /// Append the document's contents to this scene. Returns the new root
    /// entities in document order.
    pub fn load_document(&mut self, document: &Document) -> Result<Vec<NodeId>> {
        let root = document.root();
        let entities = root
            .get_list("entities")?
            .iter()
            .map(parse_node)
            .collect::<Result<Vec<_>>>()?;
        let statics = match root.child("static_geometry") {
            Some(_) => root
                .get_list("static_geometry")?
                .iter()
                .map(parse_node)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        let lights = match root.child("lights") {
            Some(_) => root
                .get_list("lights")?
                .iter()
                .map(parse_light)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        let settings = match root.child("settings") {
            Some(entry) => Some(parse_settings(entry)?),
            None => None,
        };

        // Everything parsed; now mutate.
        let mut created_order = Vec::new();
        let mut roots = Vec::with_capacity(entities.len());
        for template in entities {
            let id = spawn_template(self.graph_mut(), template, &mut created_order);
            self.add_entity(id);
            roots.push(id);
        }
        for template in statics {
            let id = spawn_template(self.graph_mut(), template, &mut created_order);
            self.add_static_geometry(id);
        }
        for light in lights {
            let node = match light.target {
                LightTarget::Entity(index) => match created_order.get(index) {
                    Some(&id) => id,
                    None => {
                        log::warn!("load_document: light refers to missing entity {index}");
                        continue;
                    }
                },
                LightTarget::Free(node) => self.graph_mut().spawn(node),
            };
            self.add_light(Light {
                node,
                kind: light.kind,
                color: light.color,
                intensity: light.intensity,
                distance: light.distance,
            });
        }
        if let Some(settings) = settings {
            self.ambient_color = settings.ambient_color;
            self.lighting_enabled = settings.lighting_enabled;
            self.virtual_scene = settings.virtual_scene;
            self.frustum_culling = settings.frustum_culling;
            self.depth_sort = settings.depth_sort;
            if settings.clear_color.is_some() {
                self.clear_color = settings.clear_color;
            }
            if settings.fog.is_some() {
                self.fog = settings.fog;
            }
            if let Some(camera) = settings.camera {
                let default = self.default_camera_mut();
                default.projection = camera.projection;
                default.aspect = camera.aspect;
                let node = default.node;
                if let Some(node) = self.graph_mut().get_mut(node) {
                    node.set_position(camera.transform.position());
                    node.set_scale(camera.transform.scale());
                    node.set_rotation_euler(camera.transform.pitch(), camera.transform.yaw(), camera.transform.roll());
                }
            }
        }

        log::debug!("load_document: {} entities, {} nodes", roots.len(), created_order.len());
        Ok(roots)
    }
}

fn color_entry(name: &str, color: Color) -> Entry {
    Entry::container(name)
        .with(Entry::float("r", color.r))
        .with(Entry::float("g", color.g))
        .with(Entry::float("b", color.b))
        .with(Entry::float("a", color.a))
}

fn blend_mode_name(mode: BlendMode) -> &'static str {
    match mode {
        BlendMode::Opaque => "opaque",
        BlendMode::Alpha => "alpha",
        BlendMode::Additive => "additive",
        BlendMode::Multiply => "multiply",
    }
}

/// Local TRS of a node. Pure-matrix nodes are decomposed from their matrix.
fn local_trs(node: &Node) -> (Vec3, Vec3, (f32, f32, f32)) {
    if node.has_pure_matrix() {
        let (scale, rotation, translation) = node.transform_matrix().to_scale_rotation_translation();
        (translation, scale, euler_degrees_from_quat(rotation))
    } else {
        (node.position(), node.scale(), (node.pitch(), node.yaw(), node.roll()))
    }
}

fn push_transform(entry: &mut Entry, position: Vec3, scale: Vec3, euler: (f32, f32, f32)) {
    for (name, v) in [
        ("px", position.x),
        ("py", position.y),
        ("pz", position.z),
        ("sx", scale.x),
        ("sy", scale.y),
        ("sz", scale.z),
        ("pitch", euler.0),
        ("yaw", euler.1),
        ("roll", euler.2),
    ] {
        entry.push(Entry::float(name, v));
    }
}

fn save_camera(graph: &SceneGraph, camera: &Camera) -> Entry {
    let mut entry = Entry::container("camera");
    match camera.projection {
        Projection::Perspective {
            fov_y_degrees,
            near,
            far,
        } => {
            entry.push(Entry::string("projection", "perspective"));
            entry.push(Entry::float("fov_y", fov_y_degrees));
            entry.push(Entry::float("near", near));
            entry.push(Entry::float("far", far));
        }
        Projection::Orthographic { half_height, near, far } => {
            entry.push(Entry::string("projection", "orthographic"));
            entry.push(Entry::float("half_height", half_height));
            entry.push(Entry::float("near", near));
            entry.push(Entry::float("far", far));
        }
    }
    entry.push(Entry::float("aspect", camera.aspect));
    if let Some(node) = graph.get(camera.node) {
        let (position, scale, euler) = local_trs(node);
        push_transform(&mut entry, position, scale, euler);
    }
    entry
}

fn save_node(graph: &SceneGraph, id: NodeId, order: &mut Vec<NodeId>) -> Entry {
    let mut entry = Entry::container("entity");
    let Some(node) = graph.get(id) else {
        return entry;
    };
    order.push(id);

    entry.push(Entry::string("name", node.name.as_str()));
    entry.push(Entry::string("custom_type", node.custom_type.as_str()));
    let (position, scale, euler) = local_trs(node);
    push_transform(&mut entry, position, scale, euler);
    entry.push(color_entry("color", node.color));

    for (name, v) in [
        ("enabled", node.enabled),
        ("visible", node.visible),
        ("color_affects_children", node.color_affects_children),
        ("visibility_affects_children", node.visibility_affects_children),
        ("ignore_parent_matrix", node.ignore_parent_matrix),
        ("billboard_mode", node.billboard_mode),
        ("owns_children", node.owns_children),
        ("depth_test", node.depth_test),
        ("depth_write", node.depth_write),
        ("backface_culled", node.backface_culled),
    ] {
        entry.push(Entry::bool(name, v));
    }
    entry.push(Entry::string("blend_mode", blend_mode_name(node.blend_mode)));

    entry.push(Entry::float("bbox_radius", node.bbox_radius()));
    let bbox = node.bbox();
    entry.push(Entry::float("hx", bbox.x));
    entry.push(Entry::float("hy", bbox.y));
    entry.push(Entry::float("hz", bbox.z));

    entry.push(save_drawable(&node.drawable));

    let mut props = Entry::array("props");
    for prop in node.props() {
        props.push(Entry::string(prop.name.as_str(), prop.value.as_str()));
    }
    entry.push(props);

    let mut children = Entry::array("children");
    for &child in node.children() {
        children.push(save_node(graph, child, order));
    }
    entry.push(children);
    entry
}

fn save_drawable(drawable: &Drawable) -> Entry {
    let entry = Entry::container("drawable");
    match drawable {
        Drawable::None => entry.with(Entry::string("kind", "none")),
        Drawable::Mesh(_) => entry.with(Entry::string("kind", "mesh")),
        Drawable::Image(image) => entry
            .with(Entry::string("kind", "image"))
            .with(Entry::int(
                "texture",
                image.texture.map(|t| t.0 as i32).unwrap_or(-1),
            ))
            .with(Entry::float("width", image.size.x))
            .with(Entry::float("height", image.size.y)),
        Drawable::Label(label) => entry
            .with(Entry::string("kind", "label"))
            .with(Entry::string("text", label.text.as_str())),
    }
}

fn save_light(graph: &SceneGraph, light: &Light, order: &[NodeId]) -> Entry {
    let mut entry = Entry::container("light");
    match light.kind {
        LightKind::Point => entry.push(Entry::string("kind", "point")),
        LightKind::Directional => entry.push(Entry::string("kind", "directional")),
        LightKind::Spot {
            inner_angle,
            outer_angle,
        } => {
            entry.push(Entry::string("kind", "spot"));
            entry.push(Entry::float("inner_angle", inner_angle));
            entry.push(Entry::float("outer_angle", outer_angle));
        }
    }
    entry.push(color_entry("color", light.color));
    entry.push(Entry::float("intensity", light.intensity));
    entry.push(Entry::float("distance", light.distance));

    match order.iter().position(|&id| id == light.node) {
        Some(index) => entry.push(Entry::int("entity", index as i32)),
        None => {
            let world = graph.concatenated_matrix(light.node);
            let (_, rotation, translation) = world.to_scale_rotation_translation();
            push_transform(&mut entry, translation, Vec3::ONE, euler_degrees_from_quat(rotation));
        }
    }
    entry
}

// ── Load ────────────────────────────────────────────────────────────────

struct NodeTemplate {
    node: Node,
    children: Vec<NodeTemplate>,
}

enum LightTarget {
    Entity(usize),
    Free(Node),
}

struct LightTemplate {
    kind: LightKind,
    color: Color,
    intensity: f32,
    distance: f32,
    target: LightTarget,
}

struct CameraTemplate {
    projection: Projection,
    aspect: f32,
    /// Carries the camera node's local transform.
    transform: Node,
}

struct Settings {
    ambient_color: Color,
    lighting_enabled: bool,
    virtual_scene: bool,
    frustum_culling: bool,
    depth_sort: bool,
    clear_color: Option<Color>,
    fog: Option<Fog>,
    camera: Option<CameraTemplate>,
}

fn parse_color(entry: &Entry, name: &str, default: Color) -> Result<Color> {
    let Some(color) = entry.child(name) else {
        return Ok(default);
    };
    Ok(Color::rgba(
        color.get_float("r")?,
        color.get_float("g")?,
        color.get_float("b")?,
        color.float_or("a", 1.0)?,
    ))
}

fn parse_blend_mode(name: &str) -> Result<BlendMode> {
    match name {
        "opaque" => Ok(BlendMode::Opaque),
        "alpha" => Ok(BlendMode::Alpha),
        "additive" => Ok(BlendMode::Additive),
        "multiply" => Ok(BlendMode::Multiply),
        other => Err(Error::UnknownValue {
            kind: "blend mode",
            value: other.to_owned(),
        }),
    }
}

fn parse_transform(entry: &Entry, node: &mut Node) -> Result<()> {
    node.set_position(Vec3::new(
        entry.float_or("px", 0.0)?,
        entry.float_or("py", 0.0)?,
        entry.float_or("pz", 0.0)?,
    ));
    node.set_scale(Vec3::new(
        entry.float_or("sx", 1.0)?,
        entry.float_or("sy", 1.0)?,
        entry.float_or("sz", 1.0)?,
    ));
    node.set_rotation_euler(
        entry.float_or("pitch", 0.0)?,
        entry.float_or("yaw", 0.0)?,
        entry.float_or("roll", 0.0)?,
    );
    Ok(())
}

fn parse_drawable(entry: &Entry) -> Result<Drawable> {
    let Some(drawable) = entry.child("drawable") else {
        return Ok(Drawable::None);
    };
    match drawable.get_str("kind")? {
        "none" => Ok(Drawable::None),
        "mesh" => {
            log::debug!("load_document: mesh data is not stored, loading a bare node");
            Ok(Drawable::None)
        }
        "image" => {
            let texture = drawable.get_int("texture")?;
            Ok(Drawable::image(
                u32::try_from(texture).ok().map(TextureId),
                Vec2::new(drawable.get_float("width")?, drawable.get_float("height")?),
            ))
        }
        "label" => Ok(Drawable::label(drawable.get_str("text")?)),
        other => Err(Error::UnknownValue {
            kind: "drawable kind",
            value: other.to_owned(),
        }),
    }
}

fn parse_node(entry: &Entry) -> Result<NodeTemplate> {
    let mut node = Node::named(entry.str_or("name", "")?);
    node.custom_type = entry.str_or("custom_type", "")?.to_owned();
    parse_transform(entry, &mut node)?;
    node.color = parse_color(entry, "color", Color::WHITE)?;

    node.enabled = entry.bool_or("enabled", true)?;
    node.visible = entry.bool_or("visible", true)?;
    node.color_affects_children = entry.bool_or("color_affects_children", true)?;
    node.visibility_affects_children = entry.bool_or("visibility_affects_children", true)?;
    node.ignore_parent_matrix = entry.bool_or("ignore_parent_matrix", false)?;
    node.billboard_mode = entry.bool_or("billboard_mode", false)?;
    node.owns_children = entry.bool_or("owns_children", false)?;
    node.depth_test = entry.bool_or("depth_test", true)?;
    node.depth_write = entry.bool_or("depth_write", true)?;
    node.backface_culled = entry.bool_or("backface_culled", true)?;
    node.blend_mode = parse_blend_mode(entry.str_or("blend_mode", "alpha")?)?;

    node.drawable = parse_drawable(entry)?;
    node.set_bbox(Vec3::new(
        entry.float_or("hx", 0.0)?,
        entry.float_or("hy", 0.0)?,
        entry.float_or("hz", 0.0)?,
    ));
    node.set_bbox_radius(entry.float_or("bbox_radius", 0.0)?);

    if entry.child("props").is_some() {
        for prop in entry.get_list("props")? {
            let value = prop.as_str().ok_or_else(|| Error::WrongType {
                name: format!("props.{}", prop.name),
                expected: "string",
            })?;
            node.set_prop(prop.name.as_str(), value);
        }
    }

    let children = match entry.child("children") {
        Some(_) => entry
            .get_list("children")?
            .iter()
            .map(parse_node)
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };
    Ok(NodeTemplate { node, children })
}

fn parse_light(entry: &Entry) -> Result<LightTemplate> {
    let kind = match entry.get_str("kind")? {
        "point" => LightKind::Point,
        "directional" => LightKind::Directional,
        "spot" => LightKind::Spot {
            inner_angle: entry.get_float("inner_angle")?,
            outer_angle: entry.get_float("outer_angle")?,
        },
        other => {
            return Err(Error::UnknownValue {
                kind: "light kind",
                value: other.to_owned(),
            });
        }
    };
    let target = match entry.child("entity") {
        Some(_) => {
            let index = entry.get_int("entity")?;
            let index = usize::try_from(index).map_err(|_| Error::UnknownValue {
                kind: "light entity index",
                value: index.to_string(),
            })?;
            LightTarget::Entity(index)
        }
        None => {
            let mut node = Node::named("light");
            parse_transform(entry, &mut node)?;
            LightTarget::Free(node)
        }
    };
    Ok(LightTemplate {
        kind,
        color: parse_color(entry, "color", Color::WHITE)?,
        intensity: entry.float_or("intensity", 1.0)?,
        distance: entry.float_or("distance", 0.0)?,
        target,
    })
}

fn parse_settings(entry: &Entry) -> Result<Settings> {
    if !matches!(entry.value, Value::Container(_)) {
        return Err(Error::WrongType {
            name: entry.name.clone(),
            expected: "container",
        });
    }
    let defaults = SceneConfig::default();
    Ok(Settings {
        ambient_color: parse_color(entry, "ambient_color", defaults.ambient_color)?,
        lighting_enabled: entry.bool_or("lighting_enabled", defaults.lighting_enabled)?,
        virtual_scene: entry.bool_or("virtual_scene", defaults.virtual_scene)?,
        frustum_culling: entry.bool_or("frustum_culling", defaults.frustum_culling)?,
        depth_sort: entry.bool_or("depth_sort", defaults.depth_sort)?,
        clear_color: match entry.child("clear_color") {
            Some(_) => Some(parse_color(entry, "clear_color", Color::BLACK)?),
            None => None,
        },
        fog: match entry.child("fog") {
            Some(fog) => Some(Fog {
                color: parse_color(fog, "color", Color::WHITE)?,
                start: fog.get_float("start")?,
                end: fog.get_float("end")?,
            }),
            None => None,
        },
        camera: match entry.child("camera") {
            Some(camera) => Some(parse_camera(camera)?),
            None => None,
        },
    })
}

fn parse_camera(entry: &Entry) -> Result<CameraTemplate> {
    let near = entry.get_float("near")?;
    let far = entry.get_float("far")?;
    let projection = match entry.get_str("projection")? {
        "perspective" => Projection::Perspective {
            fov_y_degrees: entry.get_float("fov_y")?,
            near,
            far,
        },
        "orthographic" => Projection::Orthographic {
            half_height: entry.get_float("half_height")?,
            near,
            far,
        },
        other => {
            return Err(Error::UnknownValue {
                kind: "projection",
                value: other.to_owned(),
            });
        }
    };
    let mut transform = Node::new();
    parse_transform(entry, &mut transform)?;
    Ok(CameraTemplate {
        projection,
        aspect: entry.float_or("aspect", 16.0 / 9.0)?,
        transform,
    })
}

fn spawn_template(graph: &mut SceneGraph, template: NodeTemplate, order: &mut Vec<NodeId>) -> NodeId {
    let id = graph.spawn(template.node);
    order.push(id);
    for child in template.children {
        let child_id = spawn_template(graph, child, order);
        graph.add_child(id, child_id);
    }
    id
}
