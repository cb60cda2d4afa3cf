//! # Askr: Scene Graph, Transform Propagation and Physics Bridge
//!
//! A tree of positioned, scaled, rotated, colored and visibility-flagged
//! nodes that computes world transforms lazily and renders itself parent
//! before child through a [`RenderDispatch`](render::RenderDispatch) seam,
//! plus a bridge that keeps nodes in sync with a rigid-body simulation.
//!
//! ```text
//! Scene::update(dt)     behaviors, parents before children
//!        │
//! PhysicsScene::step    push collision-only poses, step, pull dynamic poses,
//!        │              contact diff ──► CollisionEvent
//!        │
//! Scene::render         cull, sort, concatenate, draw
//! ```
//!
//! Start with `use askr::prelude::*`.

pub mod camera;
pub mod config;
pub mod diag;
pub mod document;
pub mod drawable;
pub mod error;
pub mod events;
pub mod graph;
pub mod light;
pub mod math;
mod persist;
pub mod physics;
pub mod prelude;
pub mod render;
pub mod scene;
pub mod scene_file;
pub mod time;

pub use error::{Error, Result};
