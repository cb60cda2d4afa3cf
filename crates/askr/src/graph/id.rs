//! # Node Ids: Generational Handles into the Scene Graph
//!
//! A [`NodeId`] is just a number. It doesn't "contain" a node; the
//! [`SceneGraph`](super::tree::SceneGraph) maps ids to node slots. Parent and
//! child links, scene root lists, lights, cameras and physics bridge entries
//! all hold `NodeId`s, so the arena stays the single owner of every node.
//!
//! ## Generational Indices
//!
//! Slots are recycled when nodes are destroyed. Each slot carries a
//! generation counter that is bumped on recycle, so a stale id held by, say,
//! the physics bridge is detected instead of silently aliasing a new node:
//!
//! ```text
//! NodeId { index: 5, generation: 0 }  ← original
//! NodeId { index: 5, generation: 1 }  ← after recycle
//! ```
//!
//! A slot is only alive while it is occupied. The generation alone is not
//! enough: a freed slot already carries the generation its next occupant
//! will get.

use std::fmt;

/// A lightweight handle to a node in a [`SceneGraph`](super::tree::SceneGraph).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    /// Slot index in the allocator. Recycled when the node is destroyed.
    pub(crate) index: u32,
    /// Bumped each time the slot is reused.
    pub(crate) generation: u32,
}

impl NodeId {
    /// Returns the raw index. Useful for diagnostics, not for general use.
    pub fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation. Useful for diagnostics.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Manages node id allocation and recycling.
///
/// ```text
/// entries:   [0 live, 1 free, 0 live, 2 free, 0 live]
/// free_list: [1, 3]             ← slots available for reuse
/// ```
pub(crate) struct NodeAllocator {
    entries: Vec<Entry>,
    free_list: Vec<u32>,
}

#[derive(Clone, Copy)]
struct Entry {
    generation: u32,
    alive: bool,
}

impl NodeAllocator {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Allocate an id, reusing a freed slot when one is available.
    pub fn allocate(&mut self) -> NodeId {
        if let Some(index) = self.free_list.pop() {
            // Generation was already bumped on deallocate.
            let entry = &mut self.entries[index as usize];
            entry.alive = true;
            NodeId {
                index,
                generation: entry.generation,
            }
        } else {
            let index = self.entries.len() as u32;
            self.entries.push(Entry {
                generation: 0,
                alive: true,
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    /// Free an id. Returns `false` if it was stale or never handed out.
    pub fn deallocate(&mut self, id: NodeId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let entry = &mut self.entries[id.index as usize];
        entry.generation += 1;
        entry.alive = false;
        self.free_list.push(id.index);
        true
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.entries
            .get(id.index as usize)
            .is_some_and(|entry| entry.alive && entry.generation == id.generation)
    }

    /// The live id occupying a slot index, if any.
    pub fn current(&self, index: u32) -> Option<NodeId> {
        let entry = self.entries.get(index as usize)?;
        entry.alive.then_some(NodeId {
            index,
            generation: entry.generation,
        })
    }

    pub fn alive_count(&self) -> usize {
        self.entries.len() - self.free_list.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_sequential() {
        let mut alloc = NodeAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert_eq!((a.index, b.index), (0, 1));
        assert_eq!((a.generation, b.generation), (0, 0));
    }

    #[test]
    fn recycle_bumps_generation() {
        let mut alloc = NodeAllocator::new();
        let a = alloc.allocate();
        assert!(alloc.deallocate(a));
        let reused = alloc.allocate();
        assert_eq!(reused.index, 0);
        assert_eq!(reused.generation, 1);
        assert!(!alloc.is_alive(a));
        assert!(alloc.is_alive(reused));
    }

    #[test]
    fn double_free_returns_false() {
        let mut alloc = NodeAllocator::new();
        let a = alloc.allocate();
        assert!(alloc.deallocate(a));
        assert!(!alloc.deallocate(a));
        assert_eq!(alloc.alive_count(), 0);
    }

    #[test]
    fn freed_slot_rejects_next_generation() {
        let mut alloc = NodeAllocator::new();
        let a = alloc.allocate();
        assert!(alloc.deallocate(a));
        let ahead = NodeId {
            index: a.index,
            generation: a.generation + 1,
        };
        assert!(!alloc.is_alive(ahead));
        assert!(!alloc.deallocate(ahead));
        assert!(alloc.current(a.index).is_none());

        let b = alloc.allocate();
        let c = alloc.allocate();
        assert_ne!(b, c);
        assert_eq!(alloc.alive_count(), 2);
    }
}
