pub mod handlers;
pub mod keepalive;
mod session;

pub use session::Session;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, Stream, StreamExt},
};
use serde::Deserialize;
use std::fmt::Display;
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::connection::{Connection, Outbound, Outbox};
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::PlayerId;

/// Identity resolved by whatever authenticated the upgrade request
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub user_id: Option<PlayerId>,
    pub user_name: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!(
        "WebSocket connection request: user_id={:?}, user_name={:?}",
        params.user_id,
        params.user_name
    );

    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let identity = state.guests.resolve(params.user_id, params.user_name);
    let player = identity.id;
    let (conn, outbound) = Connection::new(identity);
    let (sender, receiver) = socket.split();

    tracing::info!("WebSocket connected for player {} ({})", player, conn.id);

    let mut send_task = tokio::spawn(write_loop(sender, outbound));
    let mut recv_task = tokio::spawn(read_loop(receiver, Session::new(state, conn)));

    tokio::select! {
        _ = &mut send_task => {
            // Socket is no longer writable; dropping the session cleans up
            recv_task.abort();
        }
        result = &mut recv_task => {
            if let Err(e) = result {
                if e.is_panic() {
                    tracing::error!("Read loop for player {} panicked", player);
                }
            }
            // The session closed the connection, so the writer drains and exits
            let _ = send_task.await;
        }
    }

    tracing::info!("WebSocket connection closed for player {}", player);
}

/// Serialize queued messages onto the socket until the queue closes
async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound: Outbox,
) {
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Message(msg) => {
                let json = match msg.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("Failed to serialize message: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    tracing::debug!("WebSocket send failed, stopping writer");
                    break;
                }
            }
            Outbound::Close => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }
}

/// Feed incoming frames to the session and keep the client alive with pings.
/// Ends when the client goes away or misses a pong deadline.
async fn read_loop<S, E>(mut receiver: S, mut session: Session)
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let keepalive = session.state().keepalive.clone();
    let mut ping_tick = interval_at(
        Instant::now() + keepalive.ping_interval,
        keepalive.ping_interval,
    );
    ping_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let pong_deadline = session.keepalive.deadline();

        tokio::select! {
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text.as_str());
                        handlers::handle_text(&mut session, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed by player {}", session.identity().id);
                        break;
                    }
                    // Protocol-level pings are answered by axum
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket error for player {}: {}", session.identity().id, e);
                        break;
                    }
                    None => break,
                }
            }

            _ = ping_tick.tick() => {
                let ping_id = session.keepalive.ping_sent(Instant::now());
                let ping = ServerMessage::Ping {
                    timestamp: chrono::Utc::now().timestamp_millis(),
                    ping_id,
                };
                if !session.send(ping) {
                    break;
                }
            }

            _ = keepalive::sleep_until(pong_deadline) => {
                tracing::warn!(
                    "Player {} missed pong deadline, closing connection",
                    session.identity().id
                );
                break;
            }
        }
    }

    session.finish().await;
}
