//! Wire message taxonomy: the closed set of typed records exchanged between
//! the server core and remote agents. Each record is a JSON object tagged by
//! a `type` discriminator.

use serde::{Deserialize, Serialize, Serializer};

/// An action as carried on the wire, either as a client's declared intent or
/// as the server's record of what was applied.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Fold,
    Check,
    Call,
    Raise { amount: i64 },
}

impl Action {
    pub fn type_str(&self) -> &'static str {
        match self {
            Action::Fold => "fold",
            Action::Check => "check",
            Action::Call => "call",
            Action::Raise { .. } => "raise",
        }
    }
}

/// §6: `amount` is always present on the wire, an integer or `null`. The
/// derived tagged-enum serialization would omit the key entirely for
/// non-raise variants, so this writes it explicitly instead.
impl Serialize for Action {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        struct Repr<'a> {
            #[serde(rename = "type")]
            kind: &'a str,
            amount: Option<i64>,
        }
        let repr = Repr {
            kind: self.type_str(),
            amount: match self {
                Action::Raise { amount } => Some(*amount),
                _ => None,
            },
        };
        repr.serialize(serializer)
    }
}

/// One entry of `valid_actions` in a `game_state`: what the actor may
/// legally do right now, with the amounts the engine would accept.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidAction {
    Fold,
    Check,
    Call { amount: i64 },
    Raise { min_amount: i64, max_amount: i64 },
}

/// One of the (possibly several) side-pots.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PotView {
    pub amount: i64,
    pub eligible_seats: Vec<usize>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PotsView {
    pub total: i64,
    pub pots: Vec<PotView>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Street {
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

/// One seat's worth of information in a personalized `game_state`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PlayerView {
    pub seat: usize,
    pub name: String,
    pub stack: i64,
    pub bet: i64,
    pub is_folded: bool,
    pub is_all_in: bool,
    pub is_eliminated: bool,
    /// Two card strings for the recipient's own seat; `"??"` placeholders
    /// for others once dealt; empty otherwise.
    pub hole_cards: Vec<String>,
    pub hole_cards_known: bool,
}

/// A fully personalized snapshot of hand state, shaped for exactly one
/// recipient. Never shared verbatim across recipients.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GameState {
    pub street: Street,
    pub hand_number: u64,
    pub community_cards: Vec<String>,
    pub pot: PotsView,
    pub players: Vec<PlayerView>,
    pub actor_seat: Option<usize>,
    pub valid_actions: Vec<ValidAction>,
    pub dealer_seat: usize,
    pub sb_seat: usize,
    pub bb_seat: usize,
    pub sb_amount: i64,
    pub bb_amount: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WinnerEntry {
    pub seat: usize,
    pub amount_won: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RevealedHand {
    pub seat: usize,
    pub hole_cards: Vec<String>,
}

/// Server -> client records. Every variant is broadcast personalized per
/// recipient; none are constructed once and fanned out verbatim.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Waiting {
        current_players: usize,
        min_players: usize,
        max_players: usize,
    },
    GameStart {
        player_names: Vec<String>,
        starting_stacks: Vec<i64>,
        small_blind: i64,
        big_blind: i64,
    },
    HandStart {
        hand_number: u64,
        dealer_seat: usize,
        sb_seat: usize,
        bb_seat: usize,
        sb_amount: i64,
        bb_amount: i64,
        player_names: Vec<String>,
        stacks: Vec<i64>,
        /// The recipient's own hole cards; empty for spectators.
        hole_cards: Vec<String>,
    },
    ActionRequest {
        actor_seat: usize,
        timeout_seconds: u64,
        game_state: GameState,
    },
    ActionResult {
        actor_seat: usize,
        player_name: String,
        action: Action,
        timed_out: bool,
        game_state: GameState,
    },
    HandEnd {
        hand_number: u64,
        winners: Vec<WinnerEntry>,
        hole_cards_revealed: Vec<RevealedHand>,
        community_cards: Vec<String>,
        final_stacks: Vec<i64>,
        player_names: Vec<String>,
        eliminated_seats: Vec<usize>,
    },
    GameEnd {
        winner: String,
        winner_seat: usize,
        final_stacks: Vec<i64>,
        player_names: Vec<String>,
        total_hands: u64,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadJoin,
    BadName,
    TournamentFull,
    TournamentStarted,
    BadJson,
    UnknownType,
    BadAction,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadJoin => "BAD_JOIN",
            ErrorCode::BadName => "BAD_NAME",
            ErrorCode::TournamentFull => "TOURNAMENT_FULL",
            ErrorCode::TournamentStarted => "TOURNAMENT_STARTED",
            ErrorCode::BadJson => "BAD_JSON",
            ErrorCode::UnknownType => "UNKNOWN_TYPE",
            ErrorCode::BadAction => "BAD_ACTION",
        }
    }
}

impl ServerMessage {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
        }
    }

    /// Encode as a single JSON text frame, the self-delimiting record shape
    /// the transport sends over the wire.
    pub fn to_frame(&self) -> String {
        serde_json::to_string(self).expect("ServerMessage always serializes")
    }
}

/// Client -> server records.
///
/// `Action`'s payload is decoded loosely (a bare JSON value, not the strict
/// [`Action`] type): a raise missing `amount`, or a `type` the server
/// doesn't recognize, must still decode into a `ClientMessage` so it reaches
/// `BAD_ACTION` shape validation in the hand loop (§4.6) rather than failing
/// at the transport-decode layer, where it would surface as `UNKNOWN_TYPE`
/// and never reach the actor's mailbox at all.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join { name: String },
    Spectate {},
    Action { action: serde_json::Value },
    Start {},
}

impl ClientMessage {
    pub fn from_frame(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }
}
