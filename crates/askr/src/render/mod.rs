//! Rendering seam: the dispatcher trait the scene draws through, a recording
//! implementation, and the tree walk that drives them.

pub mod dispatch;
pub mod recorder;
pub(crate) mod traverse;

pub use dispatch::{DrawState, Fog, RenderDispatch, SceneFrame};
pub use recorder::{DrawCommand, RecordingDispatch};
pub use traverse::render_subtree;
