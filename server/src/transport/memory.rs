//! In-process transport used by tests and tools that drive the server
//! without sockets.

use super::{Transport, TransportEvent};
use crate::connection::PeerLink;
use crate::error::TransportError;
use parking_lot::Mutex;
use shared::ConnectionId;
use std::collections::VecDeque;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

type EventQueue = Arc<Mutex<VecDeque<TransportEvent>>>;

struct LinkState {
    connected: AtomicBool,
    reliable: Mutex<Vec<Vec<u8>>>,
    unreliable: Mutex<Vec<Vec<u8>>>,
}

struct MemoryLink {
    id: ConnectionId,
    state: Arc<LinkState>,
    events: EventQueue,
    max_unreliable: usize,
}

impl PeerLink for MemoryLink {
    fn send(&self, data: &[u8], reliable: bool) -> Result<(), TransportError> {
        if !self.state.connected.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        if reliable {
            self.state.reliable.lock().push(data.to_vec());
        } else {
            if data.len() > self.max_unreliable {
                return Err(TransportError::TooLarge {
                    size: data.len(),
                    max: self.max_unreliable,
                });
            }
            self.state.unreliable.lock().push(data.to_vec());
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    fn max_unreliable_message_size(&self) -> usize {
        self.max_unreliable
    }

    fn close(&self) {
        if self.state.connected.swap(false, Ordering::AcqRel) {
            self.events
                .lock()
                .push_back(TransportEvent::Disconnected { id: self.id });
        }
    }
}

/// The client end of an in-memory connection.
pub struct MemoryPeer {
    id: ConnectionId,
    state: Arc<LinkState>,
    events: EventQueue,
}

impl MemoryPeer {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    /// Delivers `data` to the server as one receive buffer.
    pub fn send(&self, data: Vec<u8>) {
        if self.is_connected() {
            self.events
                .lock()
                .push_back(TransportEvent::Received { id: self.id, data });
        }
    }

    /// Everything the server sent reliably since the last call.
    pub fn take_reliable(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.state.reliable.lock())
    }

    /// Everything the server sent unreliably since the last call.
    pub fn take_unreliable(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.state.unreliable.lock())
    }

    /// Graceful close, reported to the server.
    pub fn disconnect(&self) {
        if self.state.connected.swap(false, Ordering::AcqRel) {
            self.events
                .lock()
                .push_back(TransportEvent::Disconnected { id: self.id });
        }
    }

    /// Marks the link dead without telling the server, like a vanished socket.
    pub fn drop_link(&self) {
        self.state.connected.store(false, Ordering::Release);
    }
}

/// Opens new in-memory connections on a [`MemoryTransport`], even after the
/// transport has been handed to a server.
#[derive(Clone)]
pub struct MemoryConnector {
    events: EventQueue,
    next_id: Arc<AtomicU32>,
    max_unreliable: usize,
}

impl MemoryConnector {
    pub fn connect(&self) -> MemoryPeer {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let state = Arc::new(LinkState {
            connected: AtomicBool::new(true),
            reliable: Mutex::new(Vec::new()),
            unreliable: Mutex::new(Vec::new()),
        });
        let link = MemoryLink {
            id,
            state: Arc::clone(&state),
            events: Arc::clone(&self.events),
            max_unreliable: self.max_unreliable,
        };
        let remote = SocketAddr::from((Ipv4Addr::LOCALHOST, 40_000 + (id.get() % 20_000) as u16));

        self.events.lock().push_back(TransportEvent::Connected {
            id,
            remote,
            link: Arc::new(link),
        });

        MemoryPeer {
            id,
            state,
            events: Arc::clone(&self.events),
        }
    }
}

pub struct MemoryTransport {
    connector: MemoryConnector,
}

impl MemoryTransport {
    pub fn new(max_unreliable: usize) -> Self {
        Self {
            connector: MemoryConnector {
                events: Arc::default(),
                next_id: Arc::new(AtomicU32::new(1)),
                max_unreliable,
            },
        }
    }

    pub fn connector(&self) -> MemoryConnector {
        self.connector.clone()
    }

    pub fn connect(&mut self) -> MemoryPeer {
        self.connector.connect()
    }
}

impl Transport for MemoryTransport {
    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.connector.events.lock().pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let mut transport = MemoryTransport::new(1200);
        let peer = transport.connect();
        peer.send(vec![1]);
        peer.disconnect();
        peer.send(vec![2]);

        assert!(matches!(
            transport.poll_event(),
            Some(TransportEvent::Connected { .. })
        ));
        assert!(matches!(
            transport.poll_event(),
            Some(TransportEvent::Received { data, .. }) if data == vec![1]
        ));
        assert!(matches!(
            transport.poll_event(),
            Some(TransportEvent::Disconnected { .. })
        ));
        assert!(transport.poll_event().is_none());
    }

    #[test]
    fn test_close_reports_disconnect_once() {
        let mut transport = MemoryTransport::new(1200);
        let peer = transport.connect();
        let Some(TransportEvent::Connected { link, .. }) = transport.poll_event() else {
            panic!("expected a connect event");
        };

        link.close();
        link.close();
        assert!(!peer.is_connected());
        assert!(matches!(
            transport.poll_event(),
            Some(TransportEvent::Disconnected { id }) if id == peer.id()
        ));
        assert!(transport.poll_event().is_none());
    }

    #[test]
    fn test_connector_outlives_transport_handoff() {
        let transport = MemoryTransport::new(1200);
        let connector = transport.connector();
        let mut boxed: Box<dyn Transport> = Box::new(transport);

        let first = connector.connect();
        let second = connector.connect();
        assert_ne!(first.id(), second.id());
        assert!(boxed.poll_event().is_some());
        assert!(boxed.poll_event().is_some());
    }
}
