//! The transform hierarchy: nodes, their ids, and the arena that links them.

pub mod id;
pub mod node;
pub mod tree;

pub use id::NodeId;
pub use node::{Behavior, Node, NodeProp};
pub use tree::SceneGraph;
