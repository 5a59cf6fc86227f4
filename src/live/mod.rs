//! Live channel server.
//!
//! Accepts WebSocket connections from preview pages and pushes reload
//! notifications after successful builds.
//!
//! # Architecture
//!
//! ```text
//! accept thread ──spawn──▶ client thread (one per connection)
//!                               ▲ bounded(1) outbox
//! broadcast() ──try_send────────┘
//! ```
//!
//! Delivery is level-triggered: a client whose outbox still holds an
//! undelivered reload skips further ones, and nothing is replayed after a
//! reconnect.

use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{Sender, TrySendError};
use dashmap::DashMap;
use thiserror::Error;

mod client;
mod message;

pub use message::LiveMessage;

const ACCEPT_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

/// A connected preview client. Lives exactly as long as its connection.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    pub id: ClientId,
    outbox: Sender<LiveMessage>,
}

#[derive(Debug, Error)]
pub enum LiveError {
    #[error("failed to bind live reload server to {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("live reload server socket error")]
    Io(#[from] std::io::Error),
}

pub struct LiveServer {
    addr: SocketAddr,
    clients: Arc<DashMap<ClientId, ClientConnection>>,
    shutdown: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<()>>,
}

impl LiveServer {
    /// Bind `interface:port` and start accepting. Port 0 picks a free port.
    pub fn start(interface: &str, port: u16) -> Result<Self, LiveError> {
        let addr = format!("{interface}:{port}");
        let listener = TcpListener::bind(&addr).map_err(|source| LiveError::Bind {
            addr: addr.clone(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let clients = Arc::new(DashMap::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let acceptor = {
            let clients = Arc::clone(&clients);
            let shutdown = Arc::clone(&shutdown);
            std::thread::spawn(move || accept_loop(listener, clients, shutdown))
        };

        crate::debug!("live"; "listening on ws://{}", addr);
        Ok(Self {
            addr,
            clients,
            shutdown,
            acceptor: Some(acceptor),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Queue `message` for every connected client. Never blocks, never fails.
    ///
    /// Returns how many clients got it queued.
    pub fn broadcast(&self, message: LiveMessage) -> usize {
        let mut queued = 0;
        for entry in self.clients.iter() {
            match entry.outbox.try_send(message) {
                Ok(()) => queued += 1,
                // already has one waiting
                Err(TrySendError::Full(_)) => {
                    crate::debug!("live"; "client {} has a reload pending", entry.id.0);
                }
                // connection thread is on its way out
                Err(TrySendError::Disconnected(_)) => {}
            }
        }
        crate::debug!("live"; "reload queued for {}/{} clients", queued, self.clients.len());
        queued
    }

    /// Close every connection with a close frame and release the port.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.join();
        }
        self.clients.clear();
    }
}

impl Drop for LiveServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(
    listener: TcpListener,
    clients: Arc<DashMap<ClientId, ClientConnection>>,
    shutdown: Arc<AtomicBool>,
) {
    let mut next_id = 0u64;
    let mut threads: Vec<JoinHandle<()>> = Vec::new();

    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                next_id += 1;
                let id = ClientId(next_id);
                crate::debug!("live"; "connection {} from {}", id.0, peer);

                let clients = Arc::clone(&clients);
                let shutdown = Arc::clone(&shutdown);
                threads.push(std::thread::spawn(move || {
                    client::serve_client(id, stream, clients, shutdown);
                }));
                threads.retain(|t| !t.is_finished());
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL);
            }
            Err(e) => {
                crate::log!("live"; "accept error: {}", e);
                std::thread::sleep(ACCEPT_POLL);
            }
        }
    }

    // listener drops here; wait for clients to send their close frames
    drop(listener);
    for thread in threads {
        let _ = thread.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpStream;
    use std::time::Instant;
    use tungstenite::protocol::Message;
    use tungstenite::stream::MaybeTlsStream;

    type Client = tungstenite::WebSocket<MaybeTlsStream<TcpStream>>;

    fn connect(server: &LiveServer) -> Client {
        let (ws, _) = tungstenite::connect(format!("ws://{}", server.local_addr())).unwrap();
        ws
    }

    fn wait_for_clients(server: &LiveServer, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while server.client_count() != n {
            assert!(Instant::now() < deadline, "expected {n} clients");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn read_text(ws: &mut Client) -> String {
        loop {
            match ws.read().unwrap() {
                Message::Text(text) => return text.to_string(),
                _ => continue,
            }
        }
    }

    #[test]
    fn test_broadcast_reaches_client() {
        let server = LiveServer::start("127.0.0.1", 0).unwrap();
        let mut ws = connect(&server);
        wait_for_clients(&server, 1);

        assert_eq!(server.broadcast(LiveMessage::Reload), 1);
        assert_eq!(read_text(&mut ws), r#"{"type":"reload"}"#);
    }

    #[test]
    fn test_broadcast_without_clients() {
        let server = LiveServer::start("127.0.0.1", 0).unwrap();
        assert_eq!(server.broadcast(LiveMessage::Reload), 0);
    }

    #[test]
    fn test_dead_client_does_not_affect_others() {
        let server = LiveServer::start("127.0.0.1", 0).unwrap();
        let gone = connect(&server);
        let mut alive = connect(&server);
        wait_for_clients(&server, 2);

        // drop without a close handshake
        drop(gone);
        server.broadcast(LiveMessage::Reload);
        assert_eq!(read_text(&mut alive), r#"{"type":"reload"}"#);

        wait_for_clients(&server, 1);
        server.broadcast(LiveMessage::Reload);
        assert_eq!(read_text(&mut alive), r#"{"type":"reload"}"#);
    }

    #[test]
    fn test_client_close_removes_entry() {
        let server = LiveServer::start("127.0.0.1", 0).unwrap();
        let mut ws = connect(&server);
        wait_for_clients(&server, 1);
        assert_eq!(server.client_count(), 1);

        ws.close(None).unwrap();
        wait_for_clients(&server, 0);
    }

    #[test]
    fn test_stop_sends_close_and_restart_on_same_port() {
        let mut server = LiveServer::start("127.0.0.1", 0).unwrap();
        let port = server.port();
        let mut ws = connect(&server);
        wait_for_clients(&server, 1);

        server.stop();
        let closed = loop {
            match ws.read() {
                Ok(Message::Close(_)) => break true,
                Ok(_) => continue,
                Err(_) => break false,
            }
        };
        assert!(closed, "client should get a close frame");
        assert_eq!(server.client_count(), 0);

        let restarted = LiveServer::start("127.0.0.1", port).unwrap();
        assert_eq!(restarted.port(), port);
    }

    #[test]
    fn test_bind_conflict_is_reported() {
        let server = LiveServer::start("127.0.0.1", 0).unwrap();
        let err = LiveServer::start("127.0.0.1", server.port()).err().unwrap();
        assert!(matches!(err, LiveError::Bind { .. }));
    }
}
