//! The server root: transport, connection roster and packet handling wired
//! into one [`TickHandler`].

use crate::client_manager::{ClientManager, ConnectionEvent};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::handlers::{ServerDispatcher, ServerPacketHandler};
use crate::transport::Transport;
use crate::tick::TickHandler;
use log::{debug, info, warn};
use shared::ConnectionId;
use std::collections::HashSet;

pub struct Server {
    clients: ClientManager,
    transport: Box<dyn Transport>,
    handler: ServerPacketHandler,
    dispatcher: ServerDispatcher,
}

impl Server {
    /// Builds the dispatch table; a registration error keeps the server from
    /// starting.
    pub fn new(
        config: &ServerConfig,
        transport: Box<dyn Transport>,
        handler: ServerPacketHandler,
    ) -> Result<Self, ServerError> {
        let dispatcher = ServerPacketHandler::dispatcher()?;
        info!("Registered {} packet handlers", dispatcher.len());
        Ok(Self {
            clients: ClientManager::new(
                config.max_clients,
                config.inactivity_timeout().as_millis() as u64,
            ),
            transport,
            handler,
            dispatcher,
        })
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    pub fn handler(&self) -> &ServerPacketHandler {
        &self.handler
    }

    fn drop_connection(&mut self, id: ConnectionId) {
        self.clients.disconnect(id);
        self.handler.connection_lost(id);
    }

    /// Saves every session and closes the network.
    pub fn shutdown(&mut self) {
        info!("Saving {} sessions", self.handler.world().user_count());
        self.handler.save_all();
        self.clients.disconnect_all();
        self.transport.shutdown();
    }
}

impl TickHandler for Server {
    fn prune_inactive(&mut self, now: u64) {
        for id in self.clients.remove_inactive(now) {
            self.handler.connection_lost(id);
        }
    }

    fn heartbeat(&mut self, now: u64) {
        let mut dropped = HashSet::new();
        for event in self.clients.heartbeat(self.transport.as_mut(), now) {
            match event {
                ConnectionEvent::Connected(_) => {}
                ConnectionEvent::Received(conn, _) if dropped.contains(&conn.id()) => {
                    debug!("Ignoring traffic from dropped connection {}", conn.id());
                }
                ConnectionEvent::Received(conn, data) => {
                    let summary = self.dispatcher.dispatch(&mut self.handler, &conn, &data);
                    if summary.is_corrupted() {
                        warn!("Dropping connection {} after a malformed packet", conn.id());
                        self.drop_connection(conn.id());
                        dropped.insert(conn.id());
                    }
                }
                ConnectionEvent::Disconnected(id) => self.handler.connection_lost(id),
            }
        }
    }

    fn update(&mut self, now: u64) {
        self.handler.update(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::FileAccountStore;
    use crate::transport::memory::MemoryTransport;
    use crate::world::World;
    use shared::protocol::{client, ServerPacketId};
    use shared::{BitReader, MapIndex};

    fn server(transport: MemoryTransport) -> Server {
        let handler = ServerPacketHandler::new(
            World::new(MapIndex::new(1)),
            Box::new(FileAccountStore::in_memory(true)),
        );
        Server::new(&ServerConfig::default(), Box::new(transport), handler).unwrap()
    }

    fn first_id(packets: &[Vec<u8>]) -> Option<ServerPacketId> {
        packets
            .first()
            .map(|data| BitReader::new(data).read::<ServerPacketId>().unwrap())
    }

    #[test]
    fn test_login_through_the_tick() {
        let transport = MemoryTransport::new(1200);
        let connector = transport.connector();
        let mut server = server(transport);

        let peer = connector.connect();
        peer.send(client::login("alice", "pw"));
        server.heartbeat(0);
        server.update(0);

        assert_eq!(first_id(&peer.take_reliable()), Some(ServerPacketId::LoginSuccessful));
        assert_eq!(server.handler().world().user_count(), 1);
    }

    #[test]
    fn test_corrupted_buffer_drops_the_connection() {
        let transport = MemoryTransport::new(1200);
        let connector = transport.connector();
        let mut server = server(transport);

        let peer = connector.connect();
        peer.send(client::login("alice", "pw"));
        server.heartbeat(0);
        // A Say whose length prefix runs past the end of the buffer.
        peer.send(vec![client::say("")[0], 0xFF, 0x00]);
        server.heartbeat(1);
        server.update(1);

        assert!(!peer.is_connected());
        assert_eq!(server.clients().len(), 0);
        assert_eq!(server.handler().world().user_count(), 0);
    }

    #[test]
    fn test_traffic_after_a_malformed_packet_is_ignored() {
        let transport = MemoryTransport::new(1200);
        let connector = transport.connector();
        let mut server = server(transport);

        let bad = connector.connect();
        let watcher = connector.connect();
        bad.send(client::login("mallory", "pw"));
        watcher.send(client::login("watcher", "pw"));
        server.heartbeat(0);
        server.update(0);
        watcher.take_reliable();

        bad.send(vec![client::say("")[0], 0xFF, 0x00]);
        bad.send(client::say("still here"));
        server.heartbeat(1);

        assert!(!bad.is_connected());
        let chat_says = watcher
            .take_reliable()
            .iter()
            .filter(|data| first_id(std::slice::from_ref(*data)) == Some(ServerPacketId::ChatSay))
            .count();
        assert_eq!(chat_says, 0);
    }

    #[test]
    fn test_inactive_connection_is_pruned_and_session_disposed() {
        let transport = MemoryTransport::new(1200);
        let connector = transport.connector();
        let mut server = server(transport);

        let peer = connector.connect();
        peer.send(client::login("alice", "pw"));
        server.heartbeat(0);

        server.prune_inactive(30_000);
        assert_eq!(server.clients().len(), 1);

        server.prune_inactive(30_001);
        server.heartbeat(30_001);
        server.update(30_001);
        assert_eq!(server.clients().len(), 0);
        assert_eq!(server.handler().world().user_count(), 0);
        assert!(!peer.is_connected());
    }

    #[test]
    fn test_disconnect_event_disposes_session() {
        let transport = MemoryTransport::new(1200);
        let connector = transport.connector();
        let mut server = server(transport);

        let peer = connector.connect();
        peer.send(client::login("alice", "pw"));
        server.heartbeat(0);
        peer.disconnect();
        server.heartbeat(5);
        server.update(5);
        assert_eq!(server.handler().world().user_count(), 0);
    }
}
