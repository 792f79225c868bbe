//! Sources of connection events for the tick thread.
//!
//! A transport runs its I/O wherever it likes and hands the tick thread a
//! queue of [`TransportEvent`]s, drained without blocking by the heartbeat.

pub mod memory;
pub mod socket;

use crate::connection::PeerLink;
use shared::ConnectionId;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

pub enum TransportEvent {
    Connected {
        id: ConnectionId,
        remote: SocketAddr,
        link: Arc<dyn PeerLink>,
    },
    Received {
        id: ConnectionId,
        data: Vec<u8>,
    },
    Disconnected {
        id: ConnectionId,
    },
}

impl fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportEvent::Connected { id, remote, .. } => {
                write!(f, "Connected({id} from {remote})")
            }
            TransportEvent::Received { id, data } => {
                write!(f, "Received({id}, {} bytes)", data.len())
            }
            TransportEvent::Disconnected { id } => write!(f, "Disconnected({id})"),
        }
    }
}

pub trait Transport: Send {
    /// Returns the next pending event without blocking.
    fn poll_event(&mut self) -> Option<TransportEvent>;

    /// Stops accepting connections and tears down I/O.
    fn shutdown(&mut self) {}
}
