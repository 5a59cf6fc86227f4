//! Per-client connection thread.
//!
//! Each client owns one thread doing the handshake, draining its outbox and
//! polling for close/ping frames. A slow or dead client only stalls itself.

use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, TryRecvError};
use dashmap::DashMap;
use tungstenite::protocol::Message;
use tungstenite::{Error as WsError, WebSocket};

use super::message::LiveMessage;
use super::{ClientConnection, ClientId};

/// Read timeout; also the latency of outbox delivery and shutdown
const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// A client that can't take a frame within this is dropped
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
/// Reads spent waiting for the peer's close reply on shutdown
const CLOSE_ATTEMPTS: usize = 10;

pub(super) fn serve_client(
    id: ClientId,
    stream: TcpStream,
    clients: Arc<DashMap<ClientId, ClientConnection>>,
    shutdown: Arc<AtomicBool>,
) {
    let Some(mut ws) = handshake(stream) else {
        return;
    };

    // capacity 1: a pending reload makes further ones redundant
    let (tx, rx) = channel::bounded(1);
    clients.insert(
        id,
        ClientConnection {
            id,
            outbox: tx,
        },
    );
    crate::debug!("live"; "client {} connected (total: {})", id.0, clients.len());

    let closed_by_server = pump(&mut ws, &rx, &shutdown);
    clients.remove(&id);

    if closed_by_server {
        close(&mut ws);
    }
    crate::debug!("live"; "client {} disconnected", id.0);
}

fn handshake(stream: TcpStream) -> Option<WebSocket<TcpStream>> {
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT));
    let _ = stream.set_write_timeout(Some(WRITE_TIMEOUT));

    match tungstenite::accept(stream) {
        Ok(ws) => {
            let _ = ws.get_ref().set_read_timeout(Some(POLL_INTERVAL));
            Some(ws)
        }
        Err(e) => {
            crate::debug!("live"; "handshake failed: {}", e);
            None
        }
    }
}

/// Run until the client goes away (`false`) or the server stops (`true`).
fn pump(ws: &mut WebSocket<TcpStream>, outbox: &Receiver<LiveMessage>, shutdown: &AtomicBool) -> bool {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return true;
        }

        match outbox.try_recv() {
            Ok(message) => {
                if let Err(e) = ws.send(Message::text(message.to_json())) {
                    crate::debug!("live"; "send failed: {}", e);
                    return false;
                }
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => return true,
        }

        match ws.read() {
            Ok(Message::Close(_)) => {
                // tungstenite queues the close reply; flush it
                let _ = ws.flush();
                return false;
            }
            // pings are answered by tungstenite on the next write/flush
            Ok(_) => {
                let _ = ws.flush();
            }
            Err(WsError::Io(ref e)) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(_) => return false,
        }
    }
}

/// Send a close frame and wait briefly for the peer's reply.
fn close(ws: &mut WebSocket<TcpStream>) {
    if ws.close(None).is_err() {
        return;
    }
    for _ in 0..CLOSE_ATTEMPTS {
        match ws.read() {
            Err(WsError::Io(ref e)) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Ok(_) => {}
            Err(_) => return,
        }
    }
}
