//! Noughts and crosses for exactly two players.
//!
//! Subtypes handled (all arriving as `Game/<subtype>`):
//!
//! - `PlayerGetGameSetupRequest`: broadcasts who plays which symbol and
//!   whose turn it is.
//! - `MakeMoveRequest{x, y}`: places the mover's symbol, then broadcasts the
//!   move followed by the winner, a draw, or the next turn.

use gamehall_lobby::{GameService, GameSink, ValidationError};
use gamehall_protocol::{Envelope, ErrorResponse, Message, PlayerId, decode_contents};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const NUM_PLAYERS: usize = 2;
const SIZE: usize = 3;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerGetGameSetupRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSymbolsBroadcast {
    pub player_nought: String,
    pub player_cross: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerTurnBroadcast {
    #[serde(rename = "playerID")]
    pub player_id: String,
}

/// Coordinates are signed so out-of-range input is a rejected move rather
/// than a decode error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakeMoveRequest {
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakeMoveResponse {
    pub status: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakeMoveBroadcast {
    pub x: i64,
    pub y: i64,
    #[serde(rename = "playerID")]
    pub player_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerBroadcast {
    #[serde(rename = "playerID")]
    pub player_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawBroadcast {}

macro_rules! game_message {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Message for $ty {
                const TYPE: &'static str = stringify!($ty);
            }
        )*
    };
}

game_message!(
    PlayerGetGameSetupRequest,
    PlayerSymbolsBroadcast,
    PlayerTurnBroadcast,
    MakeMoveRequest,
    MakeMoveResponse,
    MakeMoveBroadcast,
    WinnerBroadcast,
    DrawBroadcast,
);

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Empty,
    Nought,
    Cross,
}

#[derive(Debug)]
pub struct TicTacToeState {
    /// `[nought, cross]`.
    players: [PlayerId; NUM_PLAYERS],
    board: [[Cell; SIZE]; SIZE],
    /// Index into `players` of whoever moves next.
    turn: usize,
    finished: bool,
}

impl TicTacToeState {
    fn with_first_player(players: [PlayerId; NUM_PLAYERS], turn: usize) -> Self {
        Self {
            players,
            board: [[Cell::Empty; SIZE]; SIZE],
            turn: turn % NUM_PLAYERS,
            finished: false,
        }
    }

    fn current_player(&self) -> PlayerId {
        self.players[self.turn]
    }

    fn mark(&self) -> Cell {
        if self.turn == 0 { Cell::Nought } else { Cell::Cross }
    }

    /// The board cell for `(x, y)`, if it's on the board and empty.
    fn free_cell(&self, x: i64, y: i64) -> Option<(usize, usize)> {
        let x = usize::try_from(x).ok().filter(|x| *x < SIZE)?;
        let y = usize::try_from(y).ok().filter(|y| *y < SIZE)?;
        (self.board[x][y] == Cell::Empty).then_some((x, y))
    }

    fn is_winner(&self, mark: Cell) -> bool {
        let b = &self.board;
        (0..SIZE).any(|i| (0..SIZE).all(|j| b[i][j] == mark))
            || (0..SIZE).any(|j| (0..SIZE).all(|i| b[i][j] == mark))
            || (0..SIZE).all(|i| b[i][i] == mark)
            || (0..SIZE).all(|i| b[i][SIZE - 1 - i] == mark)
    }

    fn is_full(&self) -> bool {
        self.board.iter().flatten().all(|c| *c != Cell::Empty)
    }
}

// ---------------------------------------------------------------------------
// Game service
// ---------------------------------------------------------------------------

pub struct TicTacToe;

impl GameService for TicTacToe {
    const NAME: &'static str = "tictactoe";
    type State = TicTacToeState;

    fn new_state(players: &[PlayerId]) -> Result<TicTacToeState, ValidationError> {
        let players: [PlayerId; NUM_PLAYERS] = players.try_into().map_err(|_| {
            ValidationError::new(format!(
                "invalid number of players, should be {NUM_PLAYERS}"
            ))
        })?;
        let first = rand::rng().random_range(0..NUM_PLAYERS);
        Ok(TicTacToeState::with_first_player(players, first))
    }

    fn handle_request(
        sink: &mut GameSink,
        state: &mut TicTacToeState,
        player: PlayerId,
        subtype: &str,
        contents: Value,
    ) -> Option<Envelope> {
        if state.finished {
            return error("game has already ended");
        }

        match subtype {
            PlayerGetGameSetupRequest::TYPE => {
                let symbols = PlayerSymbolsBroadcast {
                    player_nought: state.players[0].to_string(),
                    player_cross: state.players[1].to_string(),
                };
                emit_all(sink, state, &symbols);
                emit_turn(sink, state);
                None
            }
            MakeMoveRequest::TYPE => {
                match decode_contents::<MakeMoveRequest>(MakeMoveRequest::TYPE, &contents) {
                    Ok(request) => make_move(sink, state, player, request),
                    Err(e) => error(e.to_string()),
                }
            }
            other => error(format!("Game/{other} is an invalid message type")),
        }
    }
}

fn make_move(
    sink: &mut GameSink,
    state: &mut TicTacToeState,
    player: PlayerId,
    request: MakeMoveRequest,
) -> Option<Envelope> {
    if player != state.current_player() {
        return error("not your turn");
    }
    let Some((x, y)) = state.free_cell(request.x, request.y) else {
        return reply(&MakeMoveResponse { status: false });
    };

    let mark = state.mark();
    state.board[x][y] = mark;

    emit(sink, [player], &MakeMoveResponse { status: true });
    emit_all(
        sink,
        state,
        &MakeMoveBroadcast {
            x: request.x,
            y: request.y,
            player_id: player.to_string(),
        },
    );

    if state.is_winner(mark) {
        state.finished = true;
        tracing::debug!(%player, "tictactoe won");
        emit_all(
            sink,
            state,
            &WinnerBroadcast {
                player_id: player.to_string(),
            },
        );
    } else if state.is_full() {
        state.finished = true;
        tracing::debug!("tictactoe drawn");
        emit_all(sink, state, &DrawBroadcast {});
    } else {
        state.turn = (state.turn + 1) % NUM_PLAYERS;
        emit_turn(sink, state);
    }
    None
}

fn emit_turn(sink: &mut GameSink, state: &TicTacToeState) {
    let turn = PlayerTurnBroadcast {
        player_id: state.current_player().to_string(),
    };
    emit_all(sink, state, &turn);
}

fn emit_all<M: Message>(sink: &mut GameSink, state: &TicTacToeState, message: &M) {
    emit(sink, state.players, message);
}

fn emit<M: Message>(
    sink: &mut GameSink,
    targets: impl IntoIterator<Item = PlayerId>,
    message: &M,
) {
    match Envelope::of(message) {
        Ok(envelope) => sink.emit(targets, envelope),
        Err(e) => tracing::error!(kind = M::TYPE, error = %e, "failed to encode game message"),
    }
}

/// A direct reply to the mover, namespaced like the broadcasts.
fn reply<M: Message>(message: &M) -> Option<Envelope> {
    Envelope::of(message)
        .ok()
        .map(|envelope| envelope.namespaced(gamehall_protocol::GAME_NAMESPACE))
}

fn error(reason: impl Into<String>) -> Option<Envelope> {
    Envelope::of(&ErrorResponse::new(reason)).ok()
}
