//! Connection roster for the server.
//!
//! The client manager turns transport events into [`Connection`]s, keeps
//! their activity timestamps current and sweeps out the ones that went quiet.
//! It runs entirely on the tick thread.

use crate::connection::Connection;
use crate::transport::{Transport, TransportEvent};
use log::{debug, info, warn};
use shared::ConnectionId;
use std::collections::HashMap;
use std::sync::Arc;

/// What the heartbeat saw, in arrival order.
#[derive(Debug)]
pub enum ConnectionEvent {
    Connected(Arc<Connection>),
    Received(Arc<Connection>, Vec<u8>),
    Disconnected(ConnectionId),
}

pub struct ClientManager {
    connections: HashMap<ConnectionId, Arc<Connection>>,
    max_clients: usize,
    inactivity_timeout_ms: u64,
}

impl ClientManager {
    pub fn new(max_clients: usize, inactivity_timeout_ms: u64) -> Self {
        Self {
            connections: HashMap::new(),
            max_clients,
            inactivity_timeout_ms,
        }
    }

    /// Drains every pending transport event.
    ///
    /// New connections beyond capacity are closed straight away. Data from a
    /// connection the manager no longer tracks is ignored.
    pub fn heartbeat(&mut self, transport: &mut dyn Transport, now: u64) -> Vec<ConnectionEvent> {
        let mut events = Vec::new();

        while let Some(event) = transport.poll_event() {
            match event {
                TransportEvent::Connected { id, remote, link } => {
                    if self.connections.len() >= self.max_clients {
                        warn!("Rejecting connection {} from {}: server full", id, remote);
                        link.close();
                        continue;
                    }
                    let conn = Arc::new(Connection::new(id, remote, link, now));
                    info!("Connection {} opened from {}", id, remote);
                    self.connections.insert(id, Arc::clone(&conn));
                    events.push(ConnectionEvent::Connected(conn));
                }
                TransportEvent::Received { id, data } => match self.connections.get(&id) {
                    Some(conn) => {
                        conn.touch(now);
                        events.push(ConnectionEvent::Received(Arc::clone(conn), data));
                    }
                    None => debug!("Dropping {} bytes from unknown connection {}", data.len(), id),
                },
                TransportEvent::Disconnected { id } => {
                    if self.connections.remove(&id).is_some() {
                        info!("Connection {} closed", id);
                        events.push(ConnectionEvent::Disconnected(id));
                    }
                }
            }
        }

        events
    }

    /// Closes and forgets every connection that has been silent longer than
    /// the inactivity timeout.
    pub fn remove_inactive(&mut self, now: u64) -> Vec<ConnectionId> {
        let timeout = self.inactivity_timeout_ms;
        let inactive: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|conn| conn.is_inactive(now, timeout))
            .map(|conn| conn.id())
            .collect();

        for id in &inactive {
            if let Some(conn) = self.connections.remove(id) {
                info!("Connection {} timed out", id);
                conn.disconnect();
            }
        }

        inactive
    }

    /// Closes a connection on the server's initiative.
    pub fn disconnect(&mut self, id: ConnectionId) -> bool {
        match self.connections.remove(&id) {
            Some(conn) => {
                conn.disconnect();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Arc<Connection>> {
        self.connections.get(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn disconnect_all(&mut self) {
        for (_, conn) in self.connections.drain() {
            conn.disconnect();
        }
    }
}
