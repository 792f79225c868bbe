//! Connection to the server: a TCP stream for the reliable channel and a UDP
//! socket, bound to the handshake token, for the unreliable one.

use crate::error::ClientError;
use crate::handlers::{ClientDispatcher, ClientPacketHandler};
use crate::input::Command;
use log::{debug, info, warn};
use shared::protocol::{client, encode_frame, FRAME_LENGTH_BYTES, TOKEN_BYTES};
use std::io::ErrorKind;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::interval;

const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Extrapolation step for the local mirror.
const PHYSICS_INTERVAL: Duration = Duration::from_millis(16);
/// Keeps the connection clear of the server's inactivity timeout.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

pub struct GameClient {
    handler: ClientPacketHandler,
    dispatcher: ClientDispatcher,
    token: u32,
    frames: mpsc::UnboundedReceiver<Vec<u8>>,
    writer: OwnedWriteHalf,
    udp: UdpSocket,
    datagram: Vec<u8>,
}

impl GameClient {
    /// Connects both channels and completes the token handshake.
    pub async fn connect(tcp_addr: &str, udp_addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(tcp_addr).await?;
        stream.set_nodelay(true)?;
        let local_ip = stream.local_addr()?.ip();
        let (mut reader, writer) = stream.into_split();

        let handshake = read_frame(&mut reader).await?;
        let token: [u8; TOKEN_BYTES] =
            handshake
                .as_slice()
                .try_into()
                .map_err(|_| ClientError::Handshake {
                    expected: TOKEN_BYTES,
                    actual: handshake.len(),
                })?;
        let token = u32::from_be_bytes(token);

        let udp = UdpSocket::bind((local_ip, 0)).await?;
        udp.connect(udp_addr).await?;
        udp.send(&token.to_be_bytes()).await?;
        info!("Connected to {} (token {:08x})", tcp_addr, token);

        let (frames_tx, frames) = mpsc::unbounded_channel();
        tokio::spawn(forward_frames(reader, frames_tx));

        Ok(Self {
            handler: ClientPacketHandler::new(),
            dispatcher: ClientPacketHandler::dispatcher()?,
            token,
            frames,
            writer,
            udp,
            datagram: vec![0u8; MAX_DATAGRAM_SIZE],
        })
    }

    pub fn handler(&self) -> &ClientPacketHandler {
        &self.handler
    }

    pub async fn send_reliable(&mut self, data: &[u8]) -> Result<(), ClientError> {
        self.writer.write_all(&encode_frame(data)).await?;
        Ok(())
    }

    pub async fn send_unreliable(&self, data: &[u8]) -> Result<(), ClientError> {
        let mut datagram = Vec::with_capacity(TOKEN_BYTES + data.len());
        datagram.extend_from_slice(&self.token.to_be_bytes());
        datagram.extend_from_slice(data);
        self.udp.send(&datagram).await?;
        Ok(())
    }

    pub async fn login(&mut self, name: &str, password: &str) -> Result<(), ClientError> {
        self.send_reliable(&client::login(name, password)).await
    }

    /// Waits for one buffer on either channel and applies it to the mirror.
    /// Returns `false` once the server has closed the stream.
    pub async fn receive_next(&mut self) -> Result<bool, ClientError> {
        let data = tokio::select! {
            frame = self.frames.recv() => match frame {
                Some(frame) => frame,
                None => return Ok(false),
            },
            received = self.udp.recv(&mut self.datagram) => {
                let len = received?;
                self.datagram[..len].to_vec()
            }
        };
        self.apply(&data)?;
        Ok(true)
    }

    fn apply(&mut self, data: &[u8]) -> Result<(), ClientError> {
        let summary = self.handler.handle(&self.dispatcher, data);
        if summary.unknown > 0 {
            debug!("Skipped an unknown packet from the server");
        }
        if summary.is_corrupted() {
            return Err(ClientError::Corrupted);
        }
        if let Some(reason) = self.handler.login_error() {
            return Err(ClientError::LoginRefused(reason.to_string()));
        }
        Ok(())
    }

    async fn execute(&mut self, command: &Command) -> Result<(), ClientError> {
        let Some(data) = command.packet(self.handler.now_ms()) else {
            return Ok(());
        };
        if command.is_reliable() {
            self.send_reliable(&data).await
        } else {
            self.send_unreliable(&data).await
        }
    }

    /// Logs in, then drives the session from stdin until `/quit`, end of
    /// input or the server going away.
    pub async fn run(mut self, name: &str, password: &str) -> Result<(), ClientError> {
        self.login(name, password).await?;
        info!("Type chat or a command; /help lists them");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut physics = interval(PHYSICS_INTERVAL);
        let mut keepalive = interval(KEEPALIVE_INTERVAL);
        let mut last_step = Instant::now();

        loop {
            tokio::select! {
                received = self.receive_next() => {
                    if !received? {
                        info!("Server closed the connection");
                        break;
                    }
                }
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match Command::parse(&line) {
                        Ok(Some(Command::Quit)) => break,
                        Ok(Some(Command::Help)) => info!("{}", Command::help()),
                        Ok(Some(command)) => self.execute(&command).await?,
                        Ok(None) => {}
                        Err(usage) => warn!("{}", usage),
                    }
                }
                _ = physics.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_step).as_secs_f32();
                    last_step = now;
                    self.handler.state.update_physics(dt);
                }
                _ = keepalive.tick() => {
                    let ping = client::ping(self.handler.now_ms());
                    self.send_reliable(&ping).await?;
                }
            }
        }

        let _ = self.writer.shutdown().await;
        Ok(())
    }
}

async fn read_frame(reader: &mut OwnedReadHalf) -> std::io::Result<Vec<u8>> {
    let mut length = [0u8; FRAME_LENGTH_BYTES];
    reader.read_exact(&mut length).await?;
    let mut data = vec![0u8; u16::from_be_bytes(length) as usize];
    reader.read_exact(&mut data).await?;
    Ok(data)
}

async fn forward_frames(mut reader: OwnedReadHalf, frames: mpsc::UnboundedSender<Vec<u8>>) {
    loop {
        match read_frame(&mut reader).await {
            Ok(frame) => {
                if frames.send(frame).is_err() {
                    break;
                }
            }
            Err(e) => {
                if e.kind() != ErrorKind::UnexpectedEof {
                    debug!("Read error: {}", e);
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    fn serve_once(frame: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(&encode_frame(&frame)).unwrap();
            // Hold the stream open until the client has read the handshake.
            thread::sleep(Duration::from_millis(200));
        });
        addr
    }

    #[test]
    fn test_short_handshake_is_rejected() {
        let addr = serve_once(vec![1, 2, 3]);
        let result = tokio_test::block_on(GameClient::connect(&addr, "127.0.0.1:9"));
        assert!(matches!(
            result,
            Err(ClientError::Handshake {
                expected: TOKEN_BYTES,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_token_handshake_completes() {
        let addr = serve_once(0xDEAD_BEEFu32.to_be_bytes().to_vec());
        let client = tokio_test::block_on(GameClient::connect(&addr, "127.0.0.1:9")).unwrap();
        assert_eq!(client.token, 0xDEAD_BEEF);
        assert!(!client.handler().state.logged_in);
    }
}
