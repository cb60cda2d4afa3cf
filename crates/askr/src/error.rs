//! Error type for the few fallible, non-per-frame operations.
//!
//! Nothing on the per-frame path (update, render, physics step) returns an
//! error: those degrade to skipping a node and logging. Errors exist at the
//! edges of the crate, where configuration and scene documents are read.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required entry was absent from a scene document.
    #[error("missing document entry '{0}'")]
    MissingEntry(String),

    /// An entry was present but held a value of another type.
    #[error("document entry '{name}' should be {expected}")]
    WrongType { name: String, expected: &'static str },

    /// An enumerated value (light kind, blend mode, ...) was not recognized.
    #[error("unknown {kind} '{value}'")]
    UnknownValue { kind: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;
