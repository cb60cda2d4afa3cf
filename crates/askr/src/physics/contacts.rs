//! # Contact Diff
//!
//! Backends report which pairs touch *now*. Gameplay wants to know what
//! *changed*. [`ContactTracker`] keeps the previous step's pair set and
//! compares it against the current one:
//!
//! ```text
//! previous   current    emitted
//! ────────   ───────    ───────
//!   no         yes      Begin
//!   yes        yes      Persist   (normal, point, impulse of this step)
//!   yes        no       End       (data from the last step it touched)
//! ```
//!
//! Pairs are unordered: `(A, B)` and `(B, A)` are the same pair. Contacts are
//! stored with the lower body id first and the normal flipped to match.
//!
//! A missed End would leave a pair "touching" forever, so every way a body
//! can disappear goes through [`ContactTracker::remove_body`] or
//! [`ContactTracker::clear`], which end its live pairs immediately.

use std::collections::{HashMap, HashSet};

use super::{BodyId, Contact};

/// Unordered pair of bodies, stored lower id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyPair(BodyId, BodyId);

impl BodyPair {
    pub fn new(a: BodyId, b: BodyId) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    pub fn first(self) -> BodyId {
        self.0
    }

    pub fn second(self) -> BodyId {
        self.1
    }

    pub fn contains(self, body: BodyId) -> bool {
        self.0 == body || self.1 == body
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactPhase {
    Begin,
    Persist,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactChange {
    pub phase: ContactPhase,
    /// Normalized so `body_a` is the pair's first body.
    pub contact: Contact,
}

/// Orient a contact so `body_a < body_b`.
fn normalized(contact: &Contact) -> Contact {
    if contact.body_a <= contact.body_b {
        *contact
    } else {
        Contact {
            body_a: contact.body_b,
            body_b: contact.body_a,
            world_normal: -contact.world_normal,
            ..*contact
        }
    }
}

#[derive(Debug, Default)]
pub struct ContactTracker {
    live: HashMap<BodyPair, Contact>,
}

impl ContactTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff the current step's contacts against the previous step's.
    ///
    /// Begin/Persist changes follow the order pairs first appear in
    /// `current`; End changes follow pair order.
    pub fn update(&mut self, current: &[Contact]) -> Vec<ContactChange> {
        let mut order: Vec<BodyPair> = Vec::new();
        let mut merged: HashMap<BodyPair, Contact> = HashMap::new();
        for raw in current {
            if raw.body_a == raw.body_b {
                continue;
            }
            let contact = normalized(raw);
            let pair = BodyPair::new(contact.body_a, contact.body_b);
            match merged.get_mut(&pair) {
                // Several manifolds for one pair: keep the first geometry,
                // accumulate the impulses.
                Some(existing) => {
                    existing.impulse += contact.impulse;
                    existing.friction_impulse += contact.friction_impulse;
                }
                None => {
                    order.push(pair);
                    merged.insert(pair, contact);
                }
            }
        }

        let mut changes = Vec::with_capacity(order.len() + self.live.len());
        for pair in &order {
            let phase = if self.live.contains_key(pair) {
                ContactPhase::Persist
            } else {
                ContactPhase::Begin
            };
            changes.push(ContactChange {
                phase,
                contact: merged[pair],
            });
        }

        let current_pairs: HashSet<&BodyPair> = order.iter().collect();
        let mut ended: Vec<(BodyPair, Contact)> = self
            .live
            .iter()
            .filter(|(pair, _)| !current_pairs.contains(pair))
            .map(|(pair, contact)| (*pair, *contact))
            .collect();
        ended.sort_by_key(|(pair, _)| *pair);
        changes.extend(ended.into_iter().map(|(_, contact)| ContactChange {
            phase: ContactPhase::End,
            contact,
        }));

        self.live = merged;
        changes
    }

    /// End every live pair involving `body`.
    pub fn remove_body(&mut self, body: BodyId) -> Vec<ContactChange> {
        let mut ended: Vec<BodyPair> = self.live.keys().filter(|p| p.contains(body)).copied().collect();
        ended.sort();
        ended
            .into_iter()
            .filter_map(|pair| self.live.remove(&pair))
            .map(|contact| ContactChange {
                phase: ContactPhase::End,
                contact,
            })
            .collect()
    }

    /// End every live pair.
    pub fn clear(&mut self) -> Vec<ContactChange> {
        let mut ended: Vec<(BodyPair, Contact)> = self.live.drain().collect();
        ended.sort_by_key(|(pair, _)| *pair);
        ended
            .into_iter()
            .map(|(_, contact)| ContactChange {
                phase: ContactPhase::End,
                contact,
            })
            .collect()
    }

    pub fn is_touching(&self, a: BodyId, b: BodyId) -> bool {
        self.live.contains_key(&BodyPair::new(a, b))
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}
