//! One live peer with a reliable and an unreliable channel.

use crate::error::TransportError;
use crate::send_queue::SendQueue;
use shared::ConnectionId;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Socket-side half of a connection, supplied by a transport.
pub trait PeerLink: Send + Sync {
    /// Sends `data` on the reliable (ordered) or unreliable (best-effort) channel.
    fn send(&self, data: &[u8], reliable: bool) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    /// Largest payload the peer accepts on the unreliable channel.
    fn max_unreliable_message_size(&self) -> usize;

    /// Closes the link. The transport reports the disconnect afterwards.
    fn close(&self);
}

/// A connected peer as seen by the server.
pub struct Connection {
    id: ConnectionId,
    remote: SocketAddr,
    link: Arc<dyn PeerLink>,
    unreliable: SendQueue,
    last_activity: AtomicU64,
}

impl Connection {
    pub fn new(id: ConnectionId, remote: SocketAddr, link: Arc<dyn PeerLink>, now: u64) -> Self {
        let unreliable = SendQueue::new(link.max_unreliable_message_size());
        Self {
            id,
            remote,
            link,
            unreliable,
            last_activity: AtomicU64::new(now),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Sends immediately on the chosen channel.
    pub fn send(&self, data: &[u8], reliable: bool) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }
        self.link.send(data, reliable)
    }

    /// Buffers `data` for the next unreliable flush.
    pub fn enqueue_unreliable(&self, data: &[u8]) -> bool {
        self.unreliable.enqueue(data)
    }

    pub fn pending_unreliable(&self) -> usize {
        self.unreliable.len()
    }

    /// Sends every buffered unreliable chunk and returns how many were sent.
    pub fn flush_unreliable(&self) -> Result<usize, TransportError> {
        if !self.is_connected() {
            self.unreliable.clear();
            return Err(TransportError::Closed);
        }

        let mut sent = 0;
        while let Some(chunk) = self.unreliable.dequeue() {
            self.link.send(&chunk, false)?;
            sent += 1;
        }
        Ok(sent)
    }

    pub fn touch(&self, now: u64) {
        self.last_activity.fetch_max(now, Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> u64 {
        self.last_activity.load(Ordering::Relaxed)
    }

    pub fn is_inactive(&self, now: u64, timeout_ms: u64) -> bool {
        now.saturating_sub(self.last_activity()) > timeout_ms
    }

    pub fn disconnect(&self) {
        self.unreliable.clear();
        self.link.close();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("remote", &self.remote)
            .field("connected", &self.is_connected())
            .finish()
    }
}
