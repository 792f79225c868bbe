//! TCP + UDP transport running on its own tokio runtime.
//!
//! The reliable channel is a TCP stream of length-prefixed frames. On accept
//! the server sends a handshake frame holding a random connection token; the
//! client registers its UDP address by sending that token in a datagram, and
//! every later datagram is the token followed by the payload.

use super::{Transport, TransportEvent};
use crate::connection::PeerLink;
use crate::error::TransportError;
use log::{debug, info, warn};
use parking_lot::Mutex;
use shared::protocol::{encode_frame, FRAME_LENGTH_BYTES, MAX_FRAME_LENGTH, TOKEN_BYTES};
use shared::ConnectionId;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, watch};

const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Live peers indexed by their connection token.
#[derive(Default)]
struct PeerRegistry {
    peers: Mutex<HashMap<u32, Arc<SocketPeer>>>,
}

impl PeerRegistry {
    fn get(&self, token: u32) -> Option<Arc<SocketPeer>> {
        self.peers.lock().get(&token).cloned()
    }

    fn remove(&self, token: u32) {
        self.peers.lock().remove(&token);
    }
}

struct SocketPeer {
    id: ConnectionId,
    token: u32,
    remote: SocketAddr,
    frames: mpsc::UnboundedSender<Vec<u8>>,
    udp: Arc<UdpSocket>,
    udp_addr: Mutex<Option<SocketAddr>>,
    connected: AtomicBool,
    closed: watch::Sender<bool>,
    max_unreliable: usize,
}

impl SocketPeer {
    fn register_udp(&self, addr: SocketAddr) {
        let mut current = self.udp_addr.lock();
        if *current != Some(addr) {
            debug!("Connection {} registered UDP address {}", self.id, addr);
            *current = Some(addr);
        }
    }

    fn send_datagram(&self, data: &[u8], addr: SocketAddr) -> Result<(), TransportError> {
        match self.udp.try_send_to(data, addr) {
            Ok(_) => Ok(()),
            // Best effort: a full socket buffer loses the datagram.
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl PeerLink for SocketPeer {
    fn send(&self, data: &[u8], reliable: bool) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        if !reliable {
            if data.len() > self.max_unreliable {
                return Err(TransportError::TooLarge {
                    size: data.len(),
                    max: self.max_unreliable,
                });
            }
            let udp_addr = *self.udp_addr.lock();
            if let Some(addr) = udp_addr {
                return self.send_datagram(data, addr);
            }
        }

        if data.len() > MAX_FRAME_LENGTH {
            return Err(TransportError::TooLarge {
                size: data.len(),
                max: MAX_FRAME_LENGTH,
            });
        }
        self.frames
            .send(data.to_vec())
            .map_err(|_| TransportError::Closed)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn max_unreliable_message_size(&self) -> usize {
        self.max_unreliable
    }

    fn close(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            self.closed.send_replace(true);
        }
    }
}

pub struct SocketTransport {
    runtime: Option<Runtime>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    tcp_addr: SocketAddr,
    udp_addr: SocketAddr,
}

impl SocketTransport {
    /// Binds both sockets and starts the I/O tasks.
    pub fn bind(
        tcp_addr: &str,
        udp_addr: &str,
        max_unreliable: usize,
    ) -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("net-io")
            .enable_all()
            .build()?;

        let (listener, udp) = runtime.block_on(async {
            let listener = TcpListener::bind(tcp_addr).await?;
            let udp = UdpSocket::bind(udp_addr).await?;
            Ok::<_, std::io::Error>((listener, udp))
        })?;

        let tcp_local = listener.local_addr()?;
        let udp_local = udp.local_addr()?;
        let udp = Arc::new(udp);
        let peers = Arc::new(PeerRegistry::default());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        runtime.spawn(accept_connections(
            listener,
            Arc::clone(&udp),
            Arc::clone(&peers),
            events_tx.clone(),
            max_unreliable,
        ));
        runtime.spawn(receive_datagrams(udp, peers, events_tx));

        info!("Listening on TCP {} and UDP {}", tcp_local, udp_local);

        Ok(Self {
            runtime: Some(runtime),
            events: events_rx,
            tcp_addr: tcp_local,
            udp_addr: udp_local,
        })
    }

    pub fn tcp_addr(&self) -> SocketAddr {
        self.tcp_addr
    }

    pub fn udp_addr(&self) -> SocketAddr {
        self.udp_addr
    }

    /// Clears `running` when the process receives Ctrl+C.
    pub fn stop_on_ctrl_c(&self, running: Arc<AtomicBool>) {
        let Some(runtime) = &self.runtime else {
            return;
        };
        runtime.spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, shutting down");
                    running.store(false, Ordering::Release);
                }
                Err(e) => warn!("Cannot listen for Ctrl+C: {}", e),
            }
        });
    }
}

impl Transport for SocketTransport {
    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.events.try_recv().ok()
    }

    fn shutdown(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            info!("Shutting down network I/O");
            runtime.shutdown_background();
        }
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn accept_connections(
    listener: TcpListener,
    udp: Arc<UdpSocket>,
    peers: Arc<PeerRegistry>,
    events: mpsc::UnboundedSender<TransportEvent>,
    max_unreliable: usize,
) {
    let mut next_id: u32 = 1;

    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
                continue;
            }
        };

        let id = ConnectionId::new(next_id);
        next_id = next_id.wrapping_add(1).max(1);

        if events.is_closed() {
            break;
        }
        start_peer(id, stream, remote, &udp, &peers, &events, max_unreliable);
    }
}

fn start_peer(
    id: ConnectionId,
    stream: TcpStream,
    remote: SocketAddr,
    udp: &Arc<UdpSocket>,
    peers: &Arc<PeerRegistry>,
    events: &mpsc::UnboundedSender<TransportEvent>,
    max_unreliable: usize,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle for {}: {}", remote, e);
    }

    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let (closed_tx, closed_rx) = watch::channel(false);

    let peer = {
        let mut registry = peers.peers.lock();
        let token = loop {
            let token = rand::random::<u32>();
            if token != 0 && !registry.contains_key(&token) {
                break token;
            }
        };
        let peer = Arc::new(SocketPeer {
            id,
            token,
            remote,
            frames: frames_tx,
            udp: Arc::clone(udp),
            udp_addr: Mutex::new(None),
            connected: AtomicBool::new(true),
            closed: closed_tx,
            max_unreliable,
        });
        registry.insert(token, Arc::clone(&peer));
        peer
    };

    // The handshake is always the first frame on the stream.
    let _ = peer.frames.send(peer.token.to_be_bytes().to_vec());

    let (read_half, write_half) = stream.into_split();
    tokio::spawn(write_frames(write_half, frames_rx, closed_rx.clone()));

    debug!("Accepted connection {} from {}", id, remote);
    let _ = events.send(TransportEvent::Connected {
        id,
        remote,
        link: Arc::clone(&peer) as Arc<dyn PeerLink>,
    });

    tokio::spawn(read_frames(
        read_half,
        peer,
        Arc::clone(peers),
        events.clone(),
        closed_rx,
    ));
}

async fn read_frame(reader: &mut OwnedReadHalf) -> std::io::Result<Vec<u8>> {
    let mut length = [0u8; FRAME_LENGTH_BYTES];
    reader.read_exact(&mut length).await?;
    let mut data = vec![0u8; u16::from_be_bytes(length) as usize];
    reader.read_exact(&mut data).await?;
    Ok(data)
}

async fn read_frames(
    mut reader: OwnedReadHalf,
    peer: Arc<SocketPeer>,
    peers: Arc<PeerRegistry>,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut closed: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = closed.changed() => break,
            frame = read_frame(&mut reader) => match frame {
                Ok(data) => {
                    if events.send(TransportEvent::Received { id: peer.id, data }).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    if e.kind() != ErrorKind::UnexpectedEof {
                        debug!("Read error on connection {}: {}", peer.id, e);
                    }
                    break;
                }
            },
        }
    }

    peer.connected.store(false, Ordering::Release);
    peer.closed.send_replace(true);
    peers.remove(peer.token);
    let _ = events.send(TransportEvent::Disconnected { id: peer.id });
}

async fn write_frames(
    mut writer: OwnedWriteHalf,
    mut frames: mpsc::UnboundedReceiver<Vec<u8>>,
    mut closed: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = closed.changed() => {
                // Frames queued before the close still go out.
                while let Ok(frame) = frames.try_recv() {
                    if let Err(e) = writer.write_all(&encode_frame(&frame)).await {
                        debug!("Write error: {}", e);
                        break;
                    }
                }
                break;
            }
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = writer.write_all(&encode_frame(&frame)).await {
                    debug!("Write error: {}", e);
                    break;
                }
            }
        }
    }
    let _ = writer.shutdown().await;
}

async fn receive_datagrams(
    udp: Arc<UdpSocket>,
    peers: Arc<PeerRegistry>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        let (len, addr) = match udp.recv_from(&mut buffer).await {
            Ok(received) => received,
            Err(e) => {
                debug!("UDP receive error: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
                continue;
            }
        };

        if len < TOKEN_BYTES {
            continue;
        }
        let token = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]);
        let Some(peer) = peers.get(token) else {
            debug!("Datagram from {} with unknown token", addr);
            continue;
        };
        if addr.ip() != peer.remote.ip() {
            debug!("Datagram for connection {} from unexpected address {}", peer.id, addr);
            continue;
        }

        peer.register_udp(addr);
        if len > TOKEN_BYTES {
            let data = buffer[TOKEN_BYTES..len].to_vec();
            if events.send(TransportEvent::Received { id: peer.id, data }).is_err() {
                break;
            }
        }
    }
}
