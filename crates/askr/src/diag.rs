//! Diagnostics: per-frame counters and log de-duplication.
//!
//! The per-frame path must never fail, so anomalies (a destroyed camera, a
//! node that cannot be looked-at, a dead physics handle) are logged instead.
//! Logging the same anomaly sixty times a second drowns the log, so each
//! distinct anomaly goes through [`LogOnce`] and is reported a single time.

use std::collections::HashSet;

/// Counters collected during one update + render cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Nodes visited by the update pass.
    pub nodes_updated: u32,
    /// Nodes whose payload was submitted to the dispatcher.
    pub nodes_drawn: u32,
    /// Subtrees rejected by frustum culling.
    pub nodes_culled: u32,
    /// `draw` calls issued.
    pub draw_calls: u32,
    /// Fixed physics steps taken this frame.
    pub physics_steps: u32,
    /// Contact pairs reported by the backend after the last step.
    pub contacts: u32,
}

impl FrameStats {
    pub(crate) fn reset_update(&mut self) {
        self.nodes_updated = 0;
        self.physics_steps = 0;
        self.contacts = 0;
    }

    pub(crate) fn reset_render(&mut self) {
        self.nodes_drawn = 0;
        self.nodes_culled = 0;
        self.draw_calls = 0;
    }
}

/// Distinct keys remembered before the set starts over.
const MAX_KEYS: usize = 1024;

/// Remembers which warnings were already emitted. Holds at most
/// [`MAX_KEYS`] keys; when full it is cleared and starts over.
#[derive(Debug, Default)]
pub struct LogOnce {
    seen: HashSet<String>,
}

impl LogOnce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log `message` at warn level the first time `key` is seen.
    ///
    /// Returns `true` if the message was logged.
    pub fn warn(&mut self, key: impl Into<String>, message: impl FnOnce() -> String) -> bool {
        let key = key.into();
        if self.seen.contains(&key) {
            return false;
        }
        if self.seen.len() >= MAX_KEYS {
            self.seen.clear();
        }
        self.seen.insert(key);
        log::warn!("{}", message());
        true
    }

    /// Forget a key so that it can be reported again (e.g. after recovery).
    pub fn clear(&mut self, key: &str) {
        self.seen.remove(key);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warns_only_once_per_key() {
        let mut once = LogOnce::new();
        assert!(once.warn("camera", || "camera gone".into()));
        assert!(!once.warn("camera", || "camera gone".into()));
        assert!(once.warn("other", || "other".into()));
        once.clear("camera");
        assert!(once.warn("camera", || "camera gone".into()));
    }

    #[test]
    fn key_set_stays_bounded() {
        let mut once = LogOnce::new();
        for i in 0..MAX_KEYS * 3 {
            assert!(once.warn(format!("body:{i}"), String::new));
            assert!(once.len() <= MAX_KEYS);
        }
        assert!(!once.is_empty());
    }
}
