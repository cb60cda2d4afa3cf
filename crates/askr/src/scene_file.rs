//! JSON codec for [`Document`]s.
//!
//! The only place scene documents meet `serde_json`. The core builds and
//! reads documents; this module turns them into text and back.
//!
//! ```ignore
//! let doc = scene.save_document();
//! scene_file::save(&doc, "level.json")?;
//!
//! let doc = scene_file::load("level.json")?;
//! let roots = scene.load_document(&doc)?;
//! ```

use std::path::Path;

use crate::document::Document;
use crate::error::Result;
use crate::graph::NodeId;
use crate::scene::Scene;

pub fn to_json_string(document: &Document) -> Result<String> {
    Ok(serde_json::to_string_pretty(document)?)
}

pub fn from_json_str(json: &str) -> Result<Document> {
    Ok(serde_json::from_str(json)?)
}

/// Write a document to a JSON file.
pub fn save(document: &Document, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, to_json_string(document)?)?;
    log::debug!("scene_file: wrote {}", path.display());
    Ok(())
}

/// Read a document from a JSON file.
pub fn load(path: impl AsRef<Path>) -> Result<Document> {
    let json = std::fs::read_to_string(path)?;
    from_json_str(&json)
}

/// Save a whole scene to a JSON file.
pub fn save_scene(scene: &Scene, path: impl AsRef<Path>) -> Result<()> {
    save(&scene.save_document(), path)
}

/// Load a JSON file into a scene, returning the new root entities.
pub fn load_scene(scene: &mut Scene, path: impl AsRef<Path>) -> Result<Vec<NodeId>> {
    let document = load(path)?;
    scene.load_document(&document)
}
