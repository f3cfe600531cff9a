//! Typed event routing with a has-listener fast path.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use parking_lot::Mutex;
use proto::bedrock::{GamePacket, PacketName};

/// What a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenKey {
    /// A specific packet by catalog name.
    Packet(PacketName),
    /// Every packet.
    Any,
}

/// Flags a listener can set on the packet it was handed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signal {
    /// The packet must not be forwarded or processed further.
    pub cancelled: bool,
    /// The packet was changed and needs re-serialisation.
    pub modified: bool,
}

type Listener = Box<dyn FnMut(&mut GamePacket, &mut Signal) + Send>;

/// A per-session event bus.
///
/// Listeners for a specific packet fire before the generic
/// [`ListenKey::Any`] listeners, each group in registration order.
/// [`Dispatcher::has_listeners`] is part of the contract: callers use it
/// to skip deserialisation entirely when nobody is interested.
#[derive(Default)]
pub struct Dispatcher {
    listeners: Mutex<HashMap<ListenKey, Vec<Listener>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for the given key.
    pub fn on<F>(&self, key: ListenKey, listener: F)
    where
        F: FnMut(&mut GamePacket, &mut Signal) + Send + 'static,
    {
        self.listeners.lock().entry(key).or_default().push(Box::new(listener));
    }

    /// Whether anything is subscribed to the given key.
    pub fn has_listeners(&self, key: ListenKey) -> bool {
        self.listeners.lock().get(&key).is_some_and(|listeners| !listeners.is_empty())
    }

    /// Whether the given packet name would reach any listener.
    pub fn observes(&self, name: Option<PacketName>) -> bool {
        name.is_some_and(|name| self.has_listeners(ListenKey::Packet(name)))
            || self.has_listeners(ListenKey::Any)
    }

    /// Fires all listeners for the packet and returns the combined signal.
    ///
    /// A panicking listener is logged and skipped; it never faults the
    /// session or the remaining listeners.
    pub fn dispatch(&self, packet: &mut GamePacket) -> Signal {
        let mut signal = Signal::default();

        let mut lock = self.listeners.lock();
        let name = packet.name();

        let keys = [name.map(ListenKey::Packet), Some(ListenKey::Any)];
        for key in keys.into_iter().flatten() {
            let Some(listeners) = lock.get_mut(&key) else {
                continue;
            };

            for listener in listeners {
                let result = catch_unwind(AssertUnwindSafe(|| listener(packet, &mut signal)));
                if result.is_err() {
                    tracing::error!("Packet listener panicked while handling {:?}", packet.name());
                }
            }
        }

        signal
    }
}
