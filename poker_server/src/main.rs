//! Single-table freeze-out tournament server.
//!
//! Hosts one `Lobby` over a WebSocket listener; once the tournament starts
//! no further joins are accepted and the process serves exactly one
//! tournament to completion.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use ctrlc::set_handler;
use log::info;
use pico_args::Arguments;
use poker_core::{run_tournament, Lobby};

use poker_server::api;
use poker_server::config::ServerConfig;
use poker_server::logging;

const HELP: &str = "\
Run a single-table no-limit hold'em freeze-out tournament server

USAGE:
  poker_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8765]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8765)
  MIN_PLAYERS              Minimum seats before the lobby-wait timer arms [default: 2]
  MAX_PLAYERS              Seat cap, also the immediate-start trigger     [default: 9]
  STARTING_STACK           Chips each player starts with                 [default: 10000]
  ACTION_TIMEOUT_SECONDS   Per-turn timeout before auto-fold              [default: 30]
  LOBBY_WAIT_SECONDS       Grace period after MIN_PLAYERS is reached      [default: 5]
  BLIND_SCHEDULE           hand:sb:bb pairs, comma-separated, overrides the built-in ladder
  (See .env file for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let bind_override: Option<SocketAddr> = pargs.value_from_str("--bind").ok();

    logging::init();

    let server_config =
        ServerConfig::from_env(bind_override).map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;
    server_config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    set_handler(|| std::process::exit(0))?;

    info!("starting tournament server at {}", server_config.bind);
    info!(
        "tournament config: min_players={} max_players={} starting_stack={} action_timeout_seconds={} lobby_wait_seconds={}",
        server_config.tournament.min_players,
        server_config.tournament.max_players,
        server_config.tournament.starting_stack,
        server_config.tournament.action_timeout_seconds,
        server_config.tournament.lobby_wait_seconds,
    );

    let lobby = Arc::new(Lobby::new(server_config.tournament.clone()));

    let tournament_handle = tokio::spawn(run_tournament(lobby.clone()));

    let app = api::create_router(lobby);

    let listener = tokio::net::TcpListener::bind(server_config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind to {}: {e}", server_config.bind))?;

    info!(
        "server is running at ws://{}/ws. Press Ctrl+C to stop.",
        server_config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))?;

    tournament_handle.abort();
    info!("shutting down server");

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
}
