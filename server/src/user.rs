//! Logged-in player sessions.

use crate::character::{Character, CharacterChange, CharacterListener};
use crate::connection::Connection;
use crate::inventory::{Equipment, Inventory};
use log::{debug, warn};
use shared::protocol::server as packets;
use shared::{ConnectionId, MapEntityIndex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A session's handle on its connection.
///
/// Any send that finds the connection gone schedules the session for
/// disposal instead of failing; the world disposes it at the end of the next
/// update.
#[derive(Clone)]
pub struct SessionLink {
    conn: Option<Arc<Connection>>,
    dispose: Arc<AtomicBool>,
}

impl SessionLink {
    pub fn new(conn: Option<Arc<Connection>>) -> Self {
        Self {
            conn,
            dispose: Arc::new(AtomicBool::new(false)),
        }
    }

    fn live_connection(&self) -> Option<&Arc<Connection>> {
        match &self.conn {
            Some(conn) if conn.is_connected() => Some(conn),
            _ => None,
        }
    }

    /// Sends on the reliable channel.
    pub fn send(&self, data: &[u8]) {
        let Some(conn) = self.live_connection() else {
            self.delayed_dispose();
            return;
        };
        if let Err(e) = conn.send(data, true) {
            warn!("Send to connection {} failed: {}", conn.id(), e);
            self.delayed_dispose();
        }
    }

    /// Buffers `data` for the next unreliable flush. Returns `false` when
    /// nothing was buffered: the connection is gone or `data` is larger
    /// than one datagram.
    pub fn send_unreliable_buffered(&self, data: &[u8]) -> bool {
        match self.live_connection() {
            Some(conn) => conn.enqueue_unreliable(data),
            None => {
                self.delayed_dispose();
                false
            }
        }
    }

    /// Sends everything buffered for the unreliable channel.
    pub fn flush(&self) -> usize {
        let Some(conn) = self.live_connection() else {
            self.delayed_dispose();
            return 0;
        };
        match conn.flush_unreliable() {
            Ok(sent) => sent,
            Err(e) => {
                warn!("Unreliable flush to connection {} failed: {}", conn.id(), e);
                self.delayed_dispose();
                0
            }
        }
    }

    pub fn delayed_dispose(&self) {
        if !self.dispose.swap(true, Ordering::AcqRel) {
            debug!("Session scheduled for disposal");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.dispose.load(Ordering::Acquire)
    }
}

/// Forwards character changes to the owning client.
struct StatNotifier {
    link: SessionLink,
}

impl CharacterListener for StatNotifier {
    fn on_change(&mut self, character: MapEntityIndex, change: CharacterChange) {
        match change {
            CharacterChange::Level { old, new } => {
                self.link.send(&packets::set_level(new));
                if new > old {
                    self.link.send(&packets::notify_level(character));
                }
            }
            CharacterChange::Exp { old, new } => {
                self.link.send(&packets::set_exp(new));
                if new > old {
                    self.link.send(&packets::notify_exp_cash(new - old, 0));
                }
            }
            CharacterChange::Cash { old, new } => {
                self.link.send(&packets::set_cash(new));
                if new > old {
                    self.link.send(&packets::notify_exp_cash(0, new - old));
                }
            }
            CharacterChange::StatPoints(points) => {
                self.link.send(&packets::set_stat_points(points));
            }
            CharacterChange::Stat { stat, value } => {
                self.link.send(&packets::update_stat(stat, value));
            }
        }
    }
}

pub struct User {
    connection_id: ConnectionId,
    account: String,
    link: SessionLink,
    pub character: Character,
    pub inventory: Inventory,
    pub equipment: Equipment,
}

impl User {
    pub fn new(
        connection_id: ConnectionId,
        account: impl Into<String>,
        link: SessionLink,
        mut character: Character,
    ) -> Self {
        character.add_listener(Box::new(StatNotifier { link: link.clone() }));
        Self {
            connection_id,
            account: account.into(),
            link,
            character,
            inventory: Inventory::default(),
            equipment: Equipment::default(),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn index(&self) -> MapEntityIndex {
        self.character.index()
    }

    pub fn name(&self) -> &str {
        self.character.name()
    }

    pub fn send(&self, data: &[u8]) {
        self.link.send(data);
    }

    pub fn send_unreliable_buffered(&self, data: &[u8]) -> bool {
        self.link.send_unreliable_buffered(data)
    }

    pub fn flush(&self) -> usize {
        self.link.flush()
    }

    pub fn delayed_dispose(&self) {
        self.link.delayed_dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.link.is_disposed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::{MemoryPeer, MemoryTransport};
    use crate::transport::{Transport, TransportEvent};
    use shared::protocol::ServerPacketId;
    use shared::{BitReader, CharacterId};

    fn session() -> (SessionLink, MemoryPeer) {
        let mut transport = MemoryTransport::new(8);
        let peer = transport.connect();
        let Some(TransportEvent::Connected { id, remote, link }) = transport.poll_event() else {
            panic!("expected a connect event");
        };
        let conn = Arc::new(Connection::new(id, remote, link, 0));
        (SessionLink::new(Some(conn)), peer)
    }

    #[test]
    fn test_flush_empty_buffer() {
        let (link, peer) = session();
        assert_eq!(link.flush(), 0);
        assert!(peer.take_unreliable().is_empty());
        assert!(!link.is_disposed());
    }

    #[test]
    fn test_buffered_sends_wait_for_flush() {
        let (link, peer) = session();
        link.send_unreliable_buffered(&[1, 2, 3]);
        link.send_unreliable_buffered(&[4, 5, 6]);
        link.send_unreliable_buffered(&[7, 8, 9]);
        assert!(peer.take_unreliable().is_empty());

        assert_eq!(link.flush(), 2);
        assert_eq!(
            peer.take_unreliable(),
            vec![vec![1, 2, 3, 4, 5, 6], vec![7, 8, 9]]
        );
    }

    #[test]
    fn test_buffering_reports_what_was_refused() {
        let (link, peer) = session();
        assert!(link.send_unreliable_buffered(&[1, 2]));
        assert!(!link.send_unreliable_buffered(&[0; 9]));
        assert!(!link.is_disposed());

        assert_eq!(link.flush(), 1);
        assert_eq!(peer.take_unreliable(), vec![vec![1, 2]]);

        peer.drop_link();
        assert!(!link.send_unreliable_buffered(&[3]));
        assert!(link.is_disposed());
    }

    #[test]
    fn test_missing_connection_disposes() {
        let link = SessionLink::new(None);
        assert_eq!(link.flush(), 0);
        assert!(link.is_disposed());
    }

    #[test]
    fn test_dead_connection_disposes_and_sends_nothing() {
        let (link, peer) = session();
        link.send_unreliable_buffered(&[1]);
        peer.drop_link();

        assert_eq!(link.flush(), 0);
        assert!(link.is_disposed());
        assert!(peer.take_unreliable().is_empty());
        assert!(peer.take_reliable().is_empty());
    }

    #[test]
    fn test_reliable_send_to_dead_connection_disposes() {
        let (link, peer) = session();
        peer.drop_link();
        link.send(&[9]);
        assert!(link.is_disposed());
    }

    #[test]
    fn test_character_changes_reach_the_client() {
        let (link, peer) = session();
        let character = Character::new(CharacterId::new(1), "Spodi", MapEntityIndex::new(2));
        let mut user = User::new(ConnectionId::new(1), "spodi", link, character);

        user.character.add_cash(25);
        let ids: Vec<ServerPacketId> = peer
            .take_reliable()
            .iter()
            .map(|data| BitReader::new(data).read::<ServerPacketId>().unwrap())
            .collect();
        assert_eq!(ids, vec![ServerPacketId::SetCash, ServerPacketId::NotifyExpCash]);
    }
}
