//! # AlgoPoker core
//!
//! The server-side orchestration engine for a multiplayer no-limit Texas
//! Hold'em freeze-out tournament. Remote agents connect over a persistent
//! text-message transport, join a lobby, and then play a tournament driven
//! entirely by server-issued prompts; this crate owns the concurrency
//! coordination and the information-hiding invariant on every outbound
//! message. It does not implement the transport itself — a host binary
//! (see `poker_server`) supplies the socket and feeds frames in both
//! directions.
//!
//! ## Modules
//!
//! - [`protocol`]: the wire message taxonomy.
//! - [`cards`]: card/deck types and 7-card hand evaluation.
//! - [`rules`]: the pluggable rules-engine interface and its concrete
//!   no-limit hold'em implementation.
//! - [`session`]: per-connection outbound serialization and the single-slot
//!   inbound action mailbox.
//! - [`lobby`]: admission and tournament start triggers.
//! - [`handloop`]: the per-hand betting loop.
//! - [`tournament`]: the outer hand-sequencing loop.
//! - [`config`]: the tunables a host binary wires in.

pub mod cards;
pub mod config;
pub mod handloop;
pub mod lobby;
pub mod protocol;
pub mod rules;
pub mod session;
pub mod tournament;

pub use config::TournamentConfig;
pub use lobby::{JoinOutcome, Lobby, Player};
pub use session::PlayerSession;
pub use tournament::run_tournament;
