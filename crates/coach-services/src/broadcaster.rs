//! Seat event broadcaster
//!
//! Connections join at most one room, keyed by vehicle instance. Each
//! connection owns a bounded queue; a publish never waits on a slow viewer,
//! it drops the event for that viewer and moves on. Connections whose receiver
//! is gone are pruned on the next publish that reaches them.

use coach_core::models::SeatEvent;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-connection queue depth
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Connection identifier
pub type ConnectionId = u64;

/// A registered connection's end of the event queue
pub struct Subscription {
    pub id: ConnectionId,
    pub receiver: mpsc::Receiver<SeatEvent>,
}

struct Connection {
    sender: mpsc::Sender<SeatEvent>,
    room: Option<Uuid>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<Uuid, HashSet<ConnectionId>>,
}

impl Registry {
    fn leave_room(&mut self, id: ConnectionId) -> Option<Uuid> {
        let room = self.connections.get_mut(&id)?.room.take()?;
        if let Some(members) = self.rooms.get_mut(&room) {
            members.remove(&id);
            if members.is_empty() {
                self.rooms.remove(&room);
            }
        }
        Some(room)
    }

    fn remove(&mut self, id: ConnectionId) -> bool {
        self.leave_room(id);
        self.connections.remove(&id).is_some()
    }
}

/// Room registry and fan-out of seat events
pub struct SeatBroadcaster {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
    capacity: usize,
}

impl SeatBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    /// Register a connection; it receives nothing until it joins a room
    pub fn connect(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.capacity);

        self.registry
            .lock()
            .connections
            .insert(id, Connection { sender, room: None });

        debug!("Connection {} registered", id);
        Subscription { id, receiver }
    }

    /// Move a connection into the room of `vehicle_id`, leaving any previous room.
    ///
    /// Returns false for an unknown (already disconnected) connection.
    pub fn join(&self, id: ConnectionId, vehicle_id: Uuid) -> bool {
        let mut registry = self.registry.lock();
        if !registry.connections.contains_key(&id) {
            return false;
        }

        registry.leave_room(id);
        registry.rooms.entry(vehicle_id).or_default().insert(id);
        if let Some(conn) = registry.connections.get_mut(&id) {
            conn.room = Some(vehicle_id);
        }

        debug!("Connection {} joined room {}", id, vehicle_id);
        true
    }

    /// Leave the current room; returns the room left
    pub fn leave(&self, id: ConnectionId) -> Option<Uuid> {
        self.registry.lock().leave_room(id)
    }

    /// Forget a connection; safe to call more than once
    pub fn disconnect(&self, id: ConnectionId) {
        if self.registry.lock().remove(id) {
            debug!("Connection {} disconnected", id);
        }
    }

    /// Deliver `event` to every connection in the room of `vehicle_id`.
    ///
    /// Returns how many connections accepted the event.
    pub fn publish(&self, vehicle_id: Uuid, event: &SeatEvent) -> usize {
        let mut registry = self.registry.lock();
        let members: Vec<ConnectionId> = match registry.rooms.get(&vehicle_id) {
            Some(members) => members.iter().copied().collect(),
            None => return 0,
        };

        let mut delivered = 0;
        let mut closed = Vec::new();

        for id in members {
            let Some(conn) = registry.connections.get(&id) else {
                continue;
            };
            match conn.sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Dropping {:?} for slow connection {}", event, id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(id),
            }
        }

        for id in closed {
            registry.remove(id);
            debug!("Pruned closed connection {}", id);
        }

        delivered
    }

    pub fn room_size(&self, vehicle_id: Uuid) -> usize {
        self.registry
            .lock()
            .rooms
            .get(&vehicle_id)
            .map_or(0, HashSet::len)
    }

    pub fn connection_count(&self) -> usize {
        self.registry.lock().connections.len()
    }
}

impl Default for SeatBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
