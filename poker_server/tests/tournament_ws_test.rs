//! End-to-end: two real WebSocket clients play a two-player freeze-out
//! tournament against the actual axum router and tournament driver, no
//! in-process shortcuts.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use poker_core::{run_tournament, Lobby, TournamentConfig};
use poker_server::api;

/// Joins, tracks its own seat from `game_start`'s arrival order, and replies
/// check if legal, else call, else fold, until `game_end`. Returns the
/// decoded `game_end` frame.
async fn play_bot(url: &str, name: &str) -> serde_json::Value {
    let (ws_stream, _) = connect_async(url).await.expect("bot should connect");
    let (mut write, mut read) = ws_stream.split();

    write
        .send(Message::Text(
            serde_json::json!({"type": "join", "name": name}).to_string().into(),
        ))
        .await
        .unwrap();

    let mut my_seat: Option<u64> = None;

    loop {
        let Some(Ok(Message::Text(text))) = read.next().await else {
            panic!("connection closed before game_end");
        };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        match value["type"].as_str().unwrap() {
            "hand_start" => {
                if my_seat.is_none() {
                    let names = value["player_names"].as_array().unwrap();
                    let pos = names.iter().position(|n| n == name).unwrap();
                    my_seat = Some(pos as u64);
                }
            }
            "action_request" => {
                if value["actor_seat"].as_u64() != my_seat {
                    continue;
                }
                let valid_actions = value["game_state"]["valid_actions"].as_array().unwrap();
                let action = if valid_actions.iter().any(|a| a["type"] == "check") {
                    serde_json::json!({"type": "check"})
                } else if valid_actions.iter().any(|a| a["type"] == "call") {
                    serde_json::json!({"type": "call"})
                } else {
                    serde_json::json!({"type": "fold"})
                };
                write
                    .send(Message::Text(
                        serde_json::json!({"type": "action", "action": action})
                            .to_string()
                            .into(),
                    ))
                    .await
                    .unwrap();
            }
            "game_end" => return value,
            _ => {}
        }
    }
}

#[tokio::test]
async fn two_player_tournament_runs_to_completion_over_real_sockets() {
    let mut tournament = TournamentConfig::default();
    tournament.min_players = 2;
    tournament.max_players = 2;
    tournament.starting_stack = 300;
    tournament.action_timeout_seconds = 5;
    tournament.lobby_wait_seconds = 1;

    let lobby = Arc::new(Lobby::new(tournament));
    let app = api::create_router(lobby.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(run_tournament(lobby));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let url = format!("ws://{addr}/ws");

    let outcome = tokio::time::timeout(Duration::from_secs(30), async {
        tokio::join!(play_bot(&url, "Alice"), play_bot(&url, "Bob"))
    })
    .await
    .expect("tournament should finish well within the timeout");

    let (alice_end, bob_end) = outcome;

    assert_eq!(alice_end["total_hands"], bob_end["total_hands"]);
    assert_eq!(alice_end["winner_seat"], bob_end["winner_seat"]);

    let final_stacks = alice_end["final_stacks"].as_array().unwrap();
    let total: i64 = final_stacks.iter().map(|s| s.as_i64().unwrap()).sum();
    assert_eq!(total, 600);

    let player_names: Vec<String> = alice_end["player_names"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n.as_str().unwrap().to_string())
        .collect();
    assert_eq!(player_names, vec!["Alice", "Bob"]);
}
