//! One live WebSocket connection: paired read and write pumps over a split
//! socket, with heartbeats and a bounded outbound queue.
//!
//! Exit choreography: the read pump exits on error, timeout, close frame, or
//! the shared close flag; it then unregisters the connection, which drops
//! the hub's queue sender.  The write pump observes the closed queue (or the
//! close flag), sends a Close frame, and exits.  The socket halves are
//! dropped exactly once, together.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::hub::{ConnectionHandle, OUTBOUND_QUEUE_CAP};
use crate::state::AppState;
use crate::ws_chat;

/// Server ping cadence; must leave room for a pong before `PONG_WAIT`.
pub const PING_PERIOD: Duration = Duration::from_secs(54);
/// Read deadline, reset by every inbound frame (pongs included).
pub const PONG_WAIT: Duration = Duration::from_secs(60);
/// Per-write deadline on the socket sink.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);
/// Inbound frames above this are rejected at the transport layer.
pub const MAX_FRAME_BYTES: usize = 512 * 1024;

pub struct Connection {
    pub conn_id: Uuid,
    pub user_id: Uuid,
    /// Clone held by the read pump for acks to this connection only.
    outbound_tx: mpsc::Sender<String>,
    outbound_rx: mpsc::Receiver<String>,
    closed: watch::Receiver<bool>,
}

impl Connection {
    /// Builds the connection-side state and the hub-side handle for one
    /// socket.  The queue is bounded; the hub enqueues without blocking.
    pub fn open(user_id: Uuid) -> (Self, ConnectionHandle) {
        let conn_id = Uuid::new_v4();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAP);
        let (closed_tx, closed_rx) = watch::channel(false);
        let connection = Self {
            conn_id,
            user_id,
            outbound_tx: outbound_tx.clone(),
            outbound_rx,
            closed: closed_rx,
        };
        let handle = ConnectionHandle {
            conn_id,
            user_id,
            sender: outbound_tx,
            closed: closed_tx,
            active_conversation: String::new(),
        };
        (connection, handle)
    }

    /// Runs both pumps to completion and unregisters on the way out.
    pub async fn run(self, socket: WebSocket, state: AppState) {
        let Self {
            conn_id,
            user_id,
            outbound_tx,
            outbound_rx,
            closed,
        } = self;

        let (sink, stream) = socket.split();
        let write_task = tokio::spawn(write_pump(sink, outbound_rx, closed.clone()));

        read_pump(stream, closed, state.clone(), user_id, conn_id, outbound_tx).await;

        state.hub.unregister(user_id, conn_id).await;
        let _ = write_task.await;
        debug!(user_id = %user_id, conn_id = %conn_id, "connection closed");
    }
}

async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    mut closed: watch::Receiver<bool>,
    state: AppState,
    user_id: Uuid,
    conn_id: Uuid,
    ack_tx: mpsc::Sender<String>,
) {
    loop {
        let received = tokio::select! {
            received = tokio::time::timeout(PONG_WAIT, stream.next()) => received,
            _ = closed.wait_for(|c| *c) => break,
        };
        match received {
            Err(_) => {
                warn!(user_id = %user_id, conn_id = %conn_id, "read deadline expired");
                break;
            }
            Ok(Some(Ok(Message::Text(text)))) => {
                ws_chat::dispatch_frame(&state, user_id, conn_id, &ack_tx, &text).await;
            }
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break,
            // Pings are answered by the transport; pongs and binary noise
            // only serve to reset the deadline.
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(e))) => {
                debug!(user_id = %user_id, conn_id = %conn_id, error = %e, "socket read error");
                break;
            }
        }
    }
}

async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<String>,
    mut closed: watch::Receiver<bool>,
) {
    let mut heartbeat = tokio::time::interval(PING_PERIOD);
    heartbeat.tick().await; // the first tick fires immediately

    enum Action {
        Send(String),
        Ping,
        Close,
    }

    loop {
        let action = tokio::select! {
            maybe_frame = outbound_rx.recv() => {
                match maybe_frame {
                    Some(frame) => Action::Send(frame),
                    // Queue closed by unregister or shutdown.
                    None => Action::Close,
                }
            }
            _ = heartbeat.tick() => Action::Ping,
            _ = closed.wait_for(|c| *c) => Action::Close,
        };

        match action {
            Action::Send(frame) => {
                match tokio::time::timeout(WRITE_WAIT, sink.send(Message::Text(frame))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(error = %e, "socket write error");
                        break;
                    }
                    Err(_) => {
                        warn!("write deadline expired");
                        break;
                    }
                }
            }
            Action::Ping => {
                let ping = sink.send(Message::Ping(Vec::new()));
                match tokio::time::timeout(WRITE_WAIT, ping).await {
                    Ok(Ok(())) => {}
                    _ => break,
                }
            }
            Action::Close => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_links_handle_queue_to_connection_receiver() {
        let user = Uuid::new_v4();
        let (mut conn, handle) = Connection::open(user);
        assert_eq!(conn.user_id, user);
        assert_eq!(conn.conn_id, handle.conn_id);

        handle.sender.try_send("hello".to_owned()).unwrap();
        assert_eq!(conn.outbound_rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn close_flag_reaches_both_receivers() {
        let (conn, handle) = Connection::open(Uuid::new_v4());
        let mut closed = conn.closed.clone();
        assert!(!*closed.borrow());
        let _ = handle.closed.send_replace(true);
        closed.wait_for(|c| *c).await.unwrap();
    }

    #[tokio::test]
    async fn queue_bound_matches_hub_capacity() {
        let (_conn, handle) = Connection::open(Uuid::new_v4());
        for i in 0..OUTBOUND_QUEUE_CAP {
            handle
                .sender
                .try_send(i.to_string())
                .expect("queue should hold the configured capacity");
        }
        assert!(handle.sender.try_send("overflow".to_owned()).is_err());
    }
}
