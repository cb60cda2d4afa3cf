//! Event channel for notifications leaving the core.
//!
//! Two ways to consume events, usable together:
//!
//! - **Listeners** registered with [`EventDispatcher::subscribe`] run as each
//!   event is emitted, in subscription order. A listener returning `true`
//!   consumes the event and later listeners do not see it.
//! - **Polling**: every emitted event is also queued and stays there until
//!   [`EventDispatcher::drain`] hands the batch to the caller.

/// Receives events of type `E`. Return `true` to consume the event.
pub trait EventHandler<E> {
    fn on_event(&mut self, event: &E) -> bool;
}

impl<E, F> EventHandler<E> for F
where
    F: FnMut(&E) -> bool,
{
    fn on_event(&mut self, event: &E) -> bool {
        self(event)
    }
}

/// Handle returned by [`EventDispatcher::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u32);

pub struct EventDispatcher<E> {
    listeners: Vec<(ListenerId, Box<dyn EventHandler<E>>)>,
    queue: Vec<E>,
    next_id: u32,
}

impl<E> EventDispatcher<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            queue: Vec::new(),
            next_id: 0,
        }
    }

    pub fn subscribe(&mut self, handler: impl EventHandler<E> + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(handler)));
        id
    }

    /// Returns `false` if the listener was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver to listeners, then queue for polling.
    pub fn emit(&mut self, event: E) {
        for (_, listener) in self.listeners.iter_mut() {
            if listener.on_event(&event) {
                break;
            }
        }
        self.queue.push(event);
    }

    /// Events emitted since the last drain.
    pub fn pending(&self) -> &[E] {
        &self.queue
    }

    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.queue)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<E> Default for EventDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}
