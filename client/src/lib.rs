//! # Headless Game Client
//!
//! A console client for the game server. It connects the reliable TCP
//! channel, binds its UDP socket to the handshake token, logs in and then
//! mirrors what the server reports: entities on the map, the player's
//! character, inventory, equipment and chat.
//!
//! ## Module Organization
//!
//! - [`network`]: both channels and the session loop
//! - [`handlers`]: one handler per server packet, feeding the mirror
//! - [`game`]: the mirrored state
//! - [`input`]: console lines to client packets
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::GameClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GameClient::connect("127.0.0.1:44445", "127.0.0.1:44446").await?;
//!     client.run("alice", "secret").await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod game;
pub mod handlers;
pub mod input;
pub mod network;
