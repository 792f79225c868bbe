//! # Game Server Library
//!
//! The authoritative server for the side-view online RPG. It owns the map
//! simulation, accepts connections, routes incoming packets to their handlers
//! and pushes state back out over a reliable and an unreliable channel.
//!
//! ## Threads
//!
//! All simulation, packet handling and channel flushing run serially on the
//! tick thread, driven by [`tick::TickLoop`]. Socket I/O lives on a small
//! tokio runtime owned by [`transport::socket::SocketTransport`], which hands
//! the tick thread a queue of events. A console thread reads administrative
//! commands and can only clear the running flag.
//!
//! ## Module Organization
//!
//! - [`transport`]: event sources (TCP/UDP sockets, or in-memory for tests)
//! - [`connection`], [`send_queue`]: one peer with its two channels
//! - [`client_manager`]: connection roster, liveness and pruning
//! - [`handlers`]: the dispatch table and every client packet handler
//! - [`world`], [`user`], [`character`], [`inventory`]: game state
//! - [`accounts`]: file-backed account persistence
//! - [`tick`], [`console`], [`network`]: the loop and what it drives
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::accounts::FileAccountStore;
//! use server::config::ServerConfig;
//! use server::handlers::ServerPacketHandler;
//! use server::network::Server;
//! use server::tick::{GameClock, TickLoop};
//! use server::transport::socket::SocketTransport;
//! use server::world::World;
//! use shared::MapIndex;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let transport = SocketTransport::bind(
//!         &config.tcp_addr(),
//!         &config.udp_addr(),
//!         config.max_unreliable_size,
//!     )?;
//!     let handler = ServerPacketHandler::new(
//!         World::with_default_contents(MapIndex::new(1)),
//!         Box::new(FileAccountStore::in_memory(true)),
//!     );
//!     let mut server = Server::new(&config, Box::new(transport), handler)?;
//!
//!     let mut tick = TickLoop::new(
//!         GameClock::start(),
//!         config.tick_duration(),
//!         config.housekeeping_interval(),
//!     );
//!     tick.run(&mut server);
//!     server.shutdown();
//!     Ok(())
//! }
//! ```

pub mod accounts;
pub mod character;
pub mod client_manager;
pub mod config;
pub mod connection;
pub mod console;
pub mod error;
pub mod handlers;
pub mod inventory;
pub mod network;
pub mod say;
pub mod send_queue;
pub mod tick;
pub mod transport;
pub mod user;
pub mod world;
