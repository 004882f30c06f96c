//! UCI command parsing.

use solaris_core::{Board, Move};

use crate::error::UciError;

/// Parameters accepted by the `go` command.
///
/// All fields are optional in UCI; absence of a field means "not specified"
/// rather than a numeric default, so the time controller can tell apart
/// "`go infinite`" from "`go wtime 1000`" from bare "`go`".
#[derive(Debug, Default, Clone, Copy)]
pub struct GoParams {
    /// `depth N` -- fixed search depth in plies.
    pub depth: Option<u8>,
    /// `movetime N` -- search for exactly N milliseconds.
    pub movetime: Option<u64>,
    /// `nodes N` -- stop after searching approximately N nodes.
    pub nodes: Option<u64>,
    /// `movestogo N` -- moves remaining until the next time control.
    pub movestogo: Option<u32>,
    /// `wtime N` -- White's remaining clock time, in milliseconds.
    pub wtime: Option<u64>,
    /// `btime N` -- Black's remaining clock time, in milliseconds.
    pub btime: Option<u64>,
    /// `winc N` -- White's increment per move, in milliseconds.
    pub winc: Option<u64>,
    /// `binc N` -- Black's increment per move, in milliseconds.
    pub binc: Option<u64>,
    /// `infinite` -- search until `stop`, ignoring all other limits.
    pub infinite: bool,
    /// `ponder` -- start searching the position the opponent is expected to reach.
    pub ponder: bool,
}

/// A parsed UCI command.
#[derive(Debug)]
pub enum Command {
    /// `uci` -- identify the engine.
    Uci,
    /// `isready` -- synchronization ping.
    IsReady,
    /// `ucinewgame` -- reset engine state.
    UciNewGame,
    /// `position` -- set up a board position with optional moves applied.
    Position {
        /// The resulting board after replaying `moves` from the base FEN/startpos.
        board: Board,
        /// Zobrist hash of the base position and of every position reached
        /// while replaying `moves`, in order -- seeds repetition detection
        /// with the full line, not just the final position.
        history: Vec<u64>,
    },
    /// `go [params...]` -- start a search.
    Go(GoParams),
    /// `stop` -- halt the current search.
    Stop,
    /// `ponderhit` -- the opponent played the pondered move; switch to normal timing.
    PonderHit,
    /// `setoption name <name> value <value>`.
    SetOption {
        /// Option name, e.g. "Hash" or "Ponder".
        name: String,
        /// Raw value string, e.g. "128" or "true".
        value: String,
    },
    /// `quit` -- exit the engine.
    Quit,
    /// Unrecognized command (silently ignored per UCI spec).
    Unknown(String),
}

/// Parse a single line of UCI input into a [`Command`].
pub fn parse_command(line: &str) -> Result<Command, UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(Command::Unknown(String::new()));
    }

    match tokens[0] {
        "uci" => Ok(Command::Uci),
        "isready" => Ok(Command::IsReady),
        "ucinewgame" => Ok(Command::UciNewGame),
        "stop" => Ok(Command::Stop),
        "ponderhit" => Ok(Command::PonderHit),
        "quit" => Ok(Command::Quit),
        "position" => parse_position(&tokens[1..]),
        "go" => parse_go(&tokens[1..]),
        "setoption" => parse_setoption(&tokens[1..]),
        _ => Ok(Command::Unknown(tokens[0].to_string())),
    }
}

/// Parse the `position` command arguments.
///
/// Supports:
/// - `position startpos [moves e2e4 d7d5 ...]`
/// - `position fen <fen-string> [moves e2e4 d7d5 ...]`
fn parse_position(tokens: &[&str]) -> Result<Command, UciError> {
    if tokens.is_empty() {
        return Err(UciError::MalformedPosition);
    }

    let (mut board, rest) = if tokens[0] == "startpos" {
        let rest = &tokens[1..];
        (Board::starting_position(), rest)
    } else if tokens[0] == "fen" {
        // FEN is 6 space-separated fields
        if tokens.len() < 7 {
            return Err(UciError::InvalidFen {
                fen: tokens[1..].join(" "),
            });
        }
        let fen = tokens[1..7].join(" ");
        let board: Board = fen
            .parse()
            .map_err(|_| UciError::InvalidFen { fen: fen.clone() })?;
        (board, &tokens[7..])
    } else {
        return Err(UciError::MalformedPosition);
    };

    // Apply moves if present: "moves e2e4 d7d5 ...", recording the hash of
    // every position along the way so repetition detection sees the full
    // line, not just the final position.
    let mut history = vec![board.hash()];
    if !rest.is_empty() && rest[0] == "moves" {
        for uci_str in &rest[1..] {
            let mv = Move::from_uci(uci_str, &board).ok_or_else(|| UciError::InvalidMove {
                uci_move: uci_str.to_string(),
            })?;
            board = board.make_move(mv);
            history.push(board.hash());
        }
    }

    Ok(Command::Position { board, history })
}

/// Parse the `go` command arguments into a [`GoParams`].
///
/// Supports `depth`, `movetime`, `nodes`, `movestogo`, `wtime`, `btime`,
/// `winc`, `binc`, `infinite` and `ponder`, in any order and combination,
/// per the UCI protocol.
fn parse_go(tokens: &[&str]) -> Result<Command, UciError> {
    let mut params = GoParams::default();

    let mut i = 0;
    while i < tokens.len() {
        macro_rules! take_u64 {
            ($field:expr, $name:literal) => {{
                let raw = tokens.get(i + 1).ok_or(UciError::MissingGoValue {
                    param: $name.to_string(),
                })?;
                $field = Some(raw.parse().map_err(|_| UciError::InvalidGoValue {
                    param: $name.to_string(),
                    value: raw.to_string(),
                })?);
                i += 2;
            }};
        }
        match tokens[i] {
            "depth" => {
                let raw = tokens.get(i + 1).ok_or(UciError::MissingGoValue {
                    param: "depth".to_string(),
                })?;
                params.depth = Some(raw.parse().map_err(|_| UciError::InvalidGoValue {
                    param: "depth".to_string(),
                    value: raw.to_string(),
                })?);
                i += 2;
            }
            "movetime" => take_u64!(params.movetime, "movetime"),
            "nodes" => take_u64!(params.nodes, "nodes"),
            "wtime" => take_u64!(params.wtime, "wtime"),
            "btime" => take_u64!(params.btime, "btime"),
            "winc" => take_u64!(params.winc, "winc"),
            "binc" => take_u64!(params.binc, "binc"),
            "movestogo" => {
                let raw = tokens.get(i + 1).ok_or(UciError::MissingGoValue {
                    param: "movestogo".to_string(),
                })?;
                params.movestogo = Some(raw.parse().map_err(|_| UciError::InvalidGoValue {
                    param: "movestogo".to_string(),
                    value: raw.to_string(),
                })?);
                i += 2;
            }
            "infinite" => {
                params.infinite = true;
                i += 1;
            }
            "ponder" => {
                params.ponder = true;
                i += 1;
            }
            _ => {
                // Unrecognized go subcommand (e.g. "searchmoves ...", "mate N");
                // skip the token rather than failing the whole command.
                i += 1;
            }
        }
    }

    Ok(Command::Go(params))
}

/// Parse `setoption name <name> value <value>`.
fn parse_setoption(tokens: &[&str]) -> Result<Command, UciError> {
    let name_pos = tokens.iter().position(|&t| t == "name").ok_or(UciError::MissingGoValue {
        param: "name".to_string(),
    })?;
    let value_pos = tokens.iter().position(|&t| t == "value");

    let end = value_pos.unwrap_or(tokens.len());
    let name = tokens[name_pos + 1..end].join(" ");
    let value = match value_pos {
        Some(vp) => tokens[vp + 1..].join(" "),
        None => String::new(),
    };

    Ok(Command::SetOption { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uci() {
        assert!(matches!(parse_command("uci").unwrap(), Command::Uci));
    }

    #[test]
    fn parse_isready() {
        assert!(matches!(parse_command("isready").unwrap(), Command::IsReady));
    }

    #[test]
    fn parse_quit() {
        assert!(matches!(parse_command("quit").unwrap(), Command::Quit));
    }

    #[test]
    fn parse_ponderhit() {
        assert!(matches!(parse_command("ponderhit").unwrap(), Command::PonderHit));
    }

    #[test]
    fn parse_ucinewgame() {
        assert!(matches!(
            parse_command("ucinewgame").unwrap(),
            Command::UciNewGame
        ));
    }

    #[test]
    fn parse_position_startpos() {
        let cmd = parse_command("position startpos").unwrap();
        assert!(matches!(cmd, Command::Position { .. }));
    }

    #[test]
    fn parse_position_startpos_with_moves() {
        let cmd = parse_command("position startpos moves e2e4 e7e5").unwrap();
        match cmd {
            Command::Position { history, .. } => assert_eq!(history.len(), 3),
            _ => panic!("expected Position"),
        }
    }

    #[test]
    fn parse_position_fen() {
        let cmd = parse_command(
            "position fen rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
        )
        .unwrap();
        assert!(matches!(cmd, Command::Position { .. }));
    }

    #[test]
    fn parse_position_records_repeated_hash() {
        // Four half-moves that return to the starting position's hash.
        let cmd = parse_command("position startpos moves g1f3 g8f6 f3g1 f6g8").unwrap();
        match cmd {
            Command::Position { board, history } => {
                assert_eq!(history.len(), 5);
                assert_eq!(history[0], history[4]);
                assert_eq!(board.hash(), history[4]);
            }
            _ => panic!("expected Position"),
        }
    }

    #[test]
    fn parse_go_depth() {
        let cmd = parse_command("go depth 6").unwrap();
        match cmd {
            Command::Go(p) => assert_eq!(p.depth, Some(6)),
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_bare_has_no_limits() {
        let cmd = parse_command("go").unwrap();
        match cmd {
            Command::Go(p) => {
                assert_eq!(p.depth, None);
                assert!(!p.infinite);
                assert!(!p.ponder);
            }
            _ => panic!("expected Go with no limits set"),
        }
    }

    #[test]
    fn parse_go_clock_params() {
        let cmd = parse_command("go wtime 60000 btime 55000 winc 1000 binc 1000 movestogo 30")
            .unwrap();
        match cmd {
            Command::Go(p) => {
                assert_eq!(p.wtime, Some(60000));
                assert_eq!(p.btime, Some(55000));
                assert_eq!(p.winc, Some(1000));
                assert_eq!(p.binc, Some(1000));
                assert_eq!(p.movestogo, Some(30));
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_infinite_and_ponder() {
        let cmd = parse_command("go infinite ponder").unwrap();
        match cmd {
            Command::Go(p) => {
                assert!(p.infinite);
                assert!(p.ponder);
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_movetime_and_nodes() {
        let cmd = parse_command("go movetime 500 nodes 100000").unwrap();
        match cmd {
            Command::Go(p) => {
                assert_eq!(p.movetime, Some(500));
                assert_eq!(p.nodes, Some(100000));
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_unknown_command() {
        let cmd = parse_command("foobar").unwrap();
        assert!(matches!(cmd, Command::Unknown(_)));
    }

    #[test]
    fn parse_empty_line() {
        let cmd = parse_command("").unwrap();
        assert!(matches!(cmd, Command::Unknown(_)));
    }

    #[test]
    fn parse_position_missing_keyword() {
        let result = parse_command("position");
        assert!(result.is_err());
    }

    #[test]
    fn parse_position_invalid_fen() {
        let result = parse_command("position fen invalid");
        assert!(result.is_err());
    }

    #[test]
    fn parse_stop() {
        assert!(matches!(parse_command("stop").unwrap(), Command::Stop));
    }

    #[test]
    fn parse_setoption_hash() {
        let cmd = parse_command("setoption name Hash value 256").unwrap();
        match cmd {
            Command::SetOption { name, value } => {
                assert_eq!(name, "Hash");
                assert_eq!(value, "256");
            }
            _ => panic!("expected SetOption"),
        }
    }

    #[test]
    fn parse_setoption_ponder() {
        let cmd = parse_command("setoption name Ponder value true").unwrap();
        match cmd {
            Command::SetOption { name, value } => {
                assert_eq!(name, "Ponder");
                assert_eq!(value, "true");
            }
            _ => panic!("expected SetOption"),
        }
    }
}
