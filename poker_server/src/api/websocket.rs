//! The single WebSocket endpoint. Every connection goes through the same
//! state machine: a 10-second admission window where the first frame must be
//! `join` or `spectate` (§4.3), then either seated play or spectating until
//! the socket closes.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use poker_core::protocol::{ClientMessage, ErrorCode, ServerMessage};
use poker_core::{JoinOutcome, Lobby, PlayerSession};

use crate::logging::log_connection_event;

const JOIN_DEADLINE: Duration = Duration::from_secs(10);

enum Role {
    Player(usize),
    Spectator,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(lobby): State<Arc<Lobby>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, lobby))
}

async fn handle_socket(socket: WebSocket, lobby: Arc<Lobby>) {
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(32);

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let session = PlayerSession::new(outbound_tx);

    let role = match admit(&lobby, &session, &mut stream).await {
        Some(role) => role,
        None => {
            session.signal_disconnect();
            drop(session);
            let _ = writer.await;
            return;
        }
    };

    match role {
        Role::Player(seat) => log_connection_event("join", Some(seat), "player joined"),
        Role::Spectator => log_connection_event("spectate", None, "spectator connected"),
    }

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match decode_client_message(&text) {
                Ok(ClientMessage::Action { action }) => {
                    session.enqueue_action(ClientMessage::Action { action });
                }
                Ok(ClientMessage::Start {}) => {
                    if matches!(role, Role::Spectator) {
                        lobby.force_start().await;
                    }
                }
                Ok(_) => {
                    session
                        .send(&ServerMessage::error(
                            ErrorCode::BadAction,
                            "unexpected message after admission",
                        ))
                        .await;
                }
                Err(code) => {
                    session
                        .send(&ServerMessage::error(code, "could not decode message"))
                        .await;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }

    match role {
        Role::Player(seat) => {
            log_connection_event("disconnect", Some(seat), "player disconnected")
        }
        Role::Spectator => log_connection_event("disconnect", None, "spectator disconnected"),
    }

    session.signal_disconnect();
    drop(session);
    let _ = writer.await;
}

/// Runs the admission window: the first frame must arrive within
/// `JOIN_DEADLINE` and be a `join` or `spectate` record. Anything else
/// rejects and closes.
async fn admit(
    lobby: &Arc<Lobby>,
    session: &Arc<PlayerSession>,
    stream: &mut (futures_util::stream::SplitStream<WebSocket>),
) -> Option<Role> {
    let first = tokio::time::timeout(JOIN_DEADLINE, stream.next()).await;

    let text = match first {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) | Ok(None) => return None,
        Ok(Some(Ok(_))) => {
            session
                .send(&ServerMessage::error(
                    ErrorCode::BadJoin,
                    "first message must be join or spectate",
                ))
                .await;
            return None;
        }
        Ok(Some(Err(_))) => return None,
        Err(_) => {
            session
                .send(&ServerMessage::error(
                    ErrorCode::BadJoin,
                    "joined too late; admission window expired",
                ))
                .await;
            return None;
        }
    };

    match decode_client_message(&text) {
        Ok(ClientMessage::Join { name }) => match lobby.join(&name, session.clone()).await {
            JoinOutcome::Seated(seat) => Some(Role::Player(seat)),
            JoinOutcome::Rejected(code) => {
                session
                    .send(&ServerMessage::error(code, "join rejected"))
                    .await;
                None
            }
        },
        Ok(ClientMessage::Spectate {}) => {
            lobby.add_spectator(session.clone()).await;
            Some(Role::Spectator)
        }
        Ok(_) => {
            session
                .send(&ServerMessage::error(
                    ErrorCode::BadJoin,
                    "first message must be join or spectate",
                ))
                .await;
            None
        }
        Err(code) => {
            session
                .send(&ServerMessage::error(code, "could not decode message"))
                .await;
            None
        }
    }
}

/// Distinguishes genuinely malformed JSON (`BAD_JSON`) from well-formed JSON
/// carrying an unrecognized `type` (`UNKNOWN_TYPE`).
fn decode_client_message(text: &str) -> Result<ClientMessage, ErrorCode> {
    if serde_json::from_str::<serde_json::Value>(text).is_err() {
        return Err(ErrorCode::BadJson);
    }
    ClientMessage::from_frame(text).map_err(|_| ErrorCode::UnknownType)
}
