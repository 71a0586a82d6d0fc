//! Reference agent for an AlgoPoker tournament.
//!
//! Connects over the wire protocol, joins under a given name, and plays a
//! full tournament by picking a random legal action on every prompt. Run
//! several instances against one server to get a tournament going.

use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use log::{error, info, warn};
use pico_args::Arguments;
use rand::seq::IndexedRandom;
use serde_json::{json, Value};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const HELP: &str = "\
Play a full AlgoPoker tournament with a random-legal-action strategy

USAGE:
  poker_bot [OPTIONS]

OPTIONS:
  --name   NAME      Bot name, must be unique in the lobby  [default: RandomBot]
  --host   HOST      Server host                            [default: localhost]
  --port   PORT      Server port                             [default: 8765]

FLAGS:
  -h, --help         Print help information
";

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut pargs = Arguments::from_env();
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let name: String = pargs
        .opt_value_from_str("--name")?
        .unwrap_or_else(|| "RandomBot".to_string());
    let host: String = pargs
        .opt_value_from_str("--host")?
        .unwrap_or_else(|| "localhost".to_string());
    let port: u16 = pargs.opt_value_from_str("--port")?.unwrap_or(8765);

    run(name, host, port).await
}

async fn run(name: String, host: String, port: u16) -> Result<()> {
    let uri = format!("ws://{host}:{port}/ws");
    info!("connecting to {uri} as '{name}'");

    let (ws_stream, _) = connect_async(&uri)
        .await
        .with_context(|| format!("failed to connect to {uri}"))?;
    let (mut write, mut read) = ws_stream.split();

    let join = json!({"type": "join", "name": name});
    write.send(Message::Text(join.to_string().into())).await?;
    info!("joined. waiting for the tournament to start...");

    let mut my_seat: Option<usize> = None;

    while let Some(frame) = read.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                error!("transport error: {err}");
                break;
            }
        };
        let Message::Text(text) = frame else {
            continue;
        };
        let msg: Value = match serde_json::from_str(&text) {
            Ok(msg) => msg,
            Err(err) => {
                warn!("could not decode server frame: {err}");
                continue;
            }
        };

        if let Err(err) = handle_message(&mut write, &name, &mut my_seat, &msg).await {
            error!("error handling {:?}: {err}", msg.get("type"));
        }

        if msg.get("type").and_then(Value::as_str) == Some("game_end") {
            break;
        }
    }

    info!("connection closed");
    Ok(())
}

type WsWriter = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

async fn handle_message(
    write: &mut WsWriter,
    name: &str,
    my_seat: &mut Option<usize>,
    msg: &Value,
) -> Result<()> {
    match msg.get("type").and_then(Value::as_str) {
        Some("waiting") => {
            info!(
                "lobby: {}/{} players",
                msg["current_players"], msg["max_players"]
            );
        }
        Some("game_start") => {
            let player_names = msg["player_names"]
                .as_array()
                .ok_or_else(|| anyhow!("game_start missing player_names"))?;
            *my_seat = player_names
                .iter()
                .position(|n| n.as_str() == Some(name));
            info!("tournament starting, I am seat {:?}", my_seat);
        }
        Some("hand_start") => {
            info!(
                "hand #{} | dealer seat {} | blinds {}/{}",
                msg["hand_number"], msg["dealer_seat"], msg["sb_amount"], msg["bb_amount"]
            );
        }
        Some("action_request") => {
            let actor_seat = msg["actor_seat"].as_u64().map(|s| s as usize);
            if actor_seat != *my_seat {
                return Ok(());
            }
            let game_state = &msg["game_state"];
            let action = choose_action(game_state);
            info!("acting: {action}");
            let envelope = json!({"type": "action", "action": action});
            write.send(Message::Text(envelope.to_string().into())).await?;
        }
        Some("action_result") => {
            info!(
                "  {} (seat {}) -> {}{}",
                msg["player_name"],
                msg["actor_seat"],
                msg["action"]["type"].as_str().unwrap_or("?"),
                if msg["timed_out"].as_bool().unwrap_or(false) {
                    " [TIMEOUT]"
                } else {
                    ""
                },
            );
        }
        Some("hand_end") => {
            if let Some(winners) = msg["winners"].as_array() {
                for w in winners {
                    info!(
                        "hand #{} result: seat {} won {} chips",
                        msg["hand_number"], w["seat"], w["amount_won"]
                    );
                }
            }
        }
        Some("game_end") => {
            info!(
                "tournament over after {} hands. winner: {} (seat {})",
                msg["total_hands"], msg["winner"], msg["winner_seat"]
            );
        }
        Some("error") => {
            error!(
                "server error [{}]: {}",
                msg["code"].as_str().unwrap_or("?"),
                msg["message"].as_str().unwrap_or("?")
            );
        }
        other => {
            warn!("unhandled message type: {other:?}");
        }
    }
    Ok(())
}

/// Picks a random legal action from `game_state.valid_actions`. Raises the
/// table minimum when raising. Replace this with a real strategy.
fn choose_action(game_state: &Value) -> Value {
    let valid = match game_state["valid_actions"].as_array() {
        Some(valid) if !valid.is_empty() => valid,
        _ => return json!({"type": "fold"}),
    };

    let mut rng = rand::rng();
    let choice = valid
        .choose(&mut rng)
        .expect("valid_actions is non-empty here");

    match choice["type"].as_str() {
        Some("raise") => json!({
            "type": "raise",
            "amount": choice["min_amount"],
        }),
        Some(kind) => json!({"type": kind}),
        None => json!({"type": "fold"}),
    }
}
