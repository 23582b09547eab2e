//! Input events and the host event bus
//!
//! The host delivers pointer and key events one at a time. Listeners
//! register on an [`EventBus`] and get back a [`Subscription`]; dropping
//! the subscription removes the listener, so teardown happens on every
//! exit path without any explicit cleanup call.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Pointer event in editor-local coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Moved(Point),
    Pressed(Point),
    Dragged(Point),
    Released(Point),
}

/// Abstract key identity, independent of any host key-code encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    NextCorner,
    PreviousCorner,
    /// Held to switch nudging to the fast step
    Modifier,
    Other,
}

impl Key {
    /// Unit direction for arrow keys
    pub fn direction(self) -> Option<(f64, f64)> {
        match self {
            Key::Left => Some((-1.0, 0.0)),
            Key::Right => Some((1.0, 0.0)),
            Key::Up => Some((0.0, -1.0)),
            Key::Down => Some((0.0, 1.0)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Pressed(Key),
    Released(Key),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Pointer(PointerEvent),
    Key(KeyEvent),
}

impl InputEvent {
    pub fn channel(&self) -> Channel {
        match self {
            InputEvent::Pointer(_) => Channel::Pointer,
            InputEvent::Key(_) => Channel::Keyboard,
        }
    }
}

impl From<PointerEvent> for InputEvent {
    fn from(e: PointerEvent) -> Self {
        InputEvent::Pointer(e)
    }
}

impl From<KeyEvent> for InputEvent {
    fn from(e: KeyEvent) -> Self {
        InputEvent::Key(e)
    }
}

/// Which event stream a listener receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Pointer,
    Keyboard,
}

type Callback = Rc<RefCell<dyn FnMut(&InputEvent)>>;

struct Listener {
    id: u64,
    channel: Channel,
    callback: Callback,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<Listener>,
}

/// Single-threaded synchronous event bus standing in for the host's
/// input system.
#[derive(Default, Clone)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, channel: Channel, callback: F) -> Subscription
    where
        F: FnMut(&InputEvent) + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push(Listener {
            id,
            channel,
            callback: Rc::new(RefCell::new(callback)),
        });
        tracing::debug!(id, ?channel, "listener subscribed");

        Subscription {
            registry: Rc::downgrade(&self.registry),
            id,
            channel,
        }
    }

    /// Deliver `event` to every listener on its channel, returning how many
    /// received it.
    pub fn dispatch(&self, event: impl Into<InputEvent>) -> usize {
        let event = event.into();
        let channel = event.channel();

        // Snapshot first so callbacks may subscribe or unsubscribe freely
        let callbacks: Vec<Callback> = self
            .registry
            .borrow()
            .listeners
            .iter()
            .filter(|l| l.channel == channel)
            .map(|l| l.callback.clone())
            .collect();

        let mut delivered = 0;
        for callback in callbacks {
            // A listener re-entering dispatch does not receive its own event twice
            if let Ok(mut f) = callback.try_borrow_mut() {
                (&mut *f)(&event);
                delivered += 1;
            }
        }
        delivered
    }

    pub fn listener_count(&self, channel: Channel) -> usize {
        self.registry
            .borrow()
            .listeners
            .iter()
            .filter(|l| l.channel == channel)
            .count()
    }
}

/// Handle to a registered listener; unsubscribes on drop
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    registry: Weak<RefCell<Registry>>,
    id: u64,
    channel: Channel,
}

impl Subscription {
    /// Explicit form of dropping the handle
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // The bus may already be gone, in which case there is nothing to remove
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut registry) = registry.try_borrow_mut() {
                registry.listeners.retain(|l| l.id != self.id);
                tracing::debug!(id = self.id, channel = ?self.channel, "listener unsubscribed");
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .finish()
    }
}
