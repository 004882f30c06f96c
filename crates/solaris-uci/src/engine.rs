//! Event-driven, multi-threaded UCI engine with pondering support.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use tracing::{debug, info, warn};

use solaris_core::Board;
use solaris_engine::search::negamax::{MATE_SCORE, MATE_THRESHOLD};
use solaris_engine::{limits_from_go, SearchControl, SearchResult, Searcher};

use crate::command::{parse_command, Command, GoParams};
use crate::error::UciError;

/// Default transposition table size, in megabytes.
const DEFAULT_HASH_MB: usize = 128;
/// Smallest accepted `Hash` option value.
const MIN_HASH_MB: usize = 8;
/// Largest accepted `Hash` option value.
const MAX_HASH_MB: usize = 2048;

/// Internal engine state — tracks whether the engine is idle, searching, or pondering.
enum EngineState {
    Idle,
    Searching,
    Pondering,
}

/// Events processed by the main engine loop.
enum EngineEvent {
    UciCommand(Result<Command, UciError>),
    SearchDone(SearchDone),
    InputClosed,
}

/// Payload returned by the search thread when it finishes.
struct SearchDone {
    result: SearchResult,
    searcher: Searcher,
}

/// The UCI engine, holding current board state and searcher.
///
/// Runs an event-driven loop on the main thread, dispatching searches
/// to a worker thread and processing UCI commands concurrently.
pub struct UciEngine {
    board: Board,
    searcher: Option<Searcher>,
    state: EngineState,
    stop_flag: Arc<AtomicBool>,
    control: Option<Arc<SearchControl>>,
    pending_clear_tt: bool,
    pending_hash_mb: Option<usize>,
    ponder: bool,
    /// Zobrist hashes of every position reached so far this game, in order,
    /// for repetition detection. Reset on `ucinewgame` and on each fresh
    /// `position` command.
    game_history: Vec<u64>,
}

impl UciEngine {
    /// Create a new engine with the starting position.
    pub fn new() -> Self {
        Self {
            board: Board::starting_position(),
            searcher: Some(Searcher::new()),
            state: EngineState::Idle,
            stop_flag: Arc::new(AtomicBool::new(false)),
            control: None,
            pending_clear_tt: false,
            pending_hash_mb: None,
            ponder: false,
            game_history: Vec::new(),
        }
    }

    /// Run the UCI event loop, reading from stdin until `quit` or input closes.
    pub fn run(mut self) -> Result<(), UciError> {
        let (tx, rx) = mpsc::channel::<EngineEvent>();

        // Spawn stdin reader thread
        let stdin_tx = tx.clone();
        std::thread::spawn(move || {
            let stdin = io::stdin();
            let reader = stdin.lock();
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        let trimmed = line.trim().to_string();
                        if trimmed.is_empty() {
                            continue;
                        }
                        debug!(cmd = %trimmed, "received UCI command");
                        let cmd = parse_command(&trimmed);
                        if stdin_tx.send(EngineEvent::UciCommand(cmd)).is_err() {
                            break;
                        }
                    }
                    Err(_) => {
                        let _ = stdin_tx.send(EngineEvent::InputClosed);
                        break;
                    }
                }
            }
            let _ = stdin_tx.send(EngineEvent::InputClosed);
        });

        for event in &rx {
            match event {
                EngineEvent::UciCommand(Ok(cmd)) => match cmd {
                    Command::Uci => self.handle_uci(),
                    Command::IsReady => self.handle_isready(),
                    Command::UciNewGame => self.handle_ucinewgame(),
                    Command::Position { board, history } => self.handle_position(board, history),
                    Command::Go(params) => self.handle_go(params, &tx),
                    Command::PonderHit => self.handle_ponderhit(),
                    Command::Stop => self.handle_stop(),
                    Command::SetOption { name, value } => self.handle_setoption(name, value),
                    Command::Quit => {
                        // Stop any active search and wait for it to finish
                        if !matches!(self.state, EngineState::Idle) {
                            self.handle_stop();
                            // Drain events until we get SearchDone
                            for ev in &rx {
                                if let EngineEvent::SearchDone(done) = ev {
                                    self.finish_search(done);
                                    break;
                                }
                            }
                        }
                        break;
                    }
                    Command::Unknown(_) => {}
                },
                EngineEvent::UciCommand(Err(e)) => {
                    warn!(error = %e, "UCI parse error");
                    println!("info string {e}");
                }
                EngineEvent::SearchDone(done) => {
                    self.finish_search(done);
                }
                EngineEvent::InputClosed => break,
            }
        }

        info!("solaris shutting down");
        Ok(())
    }

    fn handle_uci(&self) {
        println!("id name solaris");
        println!("id author Nicolas Lazaro");
        println!(
            "option name Hash type spin default {DEFAULT_HASH_MB} min {MIN_HASH_MB} max {MAX_HASH_MB}"
        );
        println!("option name Ponder type check default true");
        println!("uciok");
    }

    fn handle_isready(&self) {
        println!("readyok");
    }

    fn handle_ucinewgame(&mut self) {
        self.board = Board::starting_position();
        self.game_history.clear();
        if let Some(ref mut searcher) = self.searcher {
            searcher.clear_tt();
        } else {
            // Search thread owns the searcher — defer clear until it comes back
            self.pending_clear_tt = true;
        }
    }

    fn handle_position(&mut self, board: Board, history: Vec<u64>) {
        self.board = board;
        // The parser replays `moves` from the base FEN/startpos and hands back
        // the hash of every position along the way, so repetition detection
        // sees the whole line rather than just the final position.
        self.game_history = history;
    }

    fn handle_setoption(&mut self, name: String, value: String) {
        match name.as_str() {
            "Hash" => match value.parse::<usize>() {
                Ok(mb) if (MIN_HASH_MB..=MAX_HASH_MB).contains(&mb) => {
                    if let Some(ref mut searcher) = self.searcher {
                        searcher.resize_tt(mb);
                    } else {
                        self.pending_hash_mb = Some(mb);
                    }
                }
                Ok(mb) => {
                    let err = UciError::ResourceExhaustion {
                        name: name.clone(),
                        reason: format!("{mb} MB outside [{MIN_HASH_MB}, {MAX_HASH_MB}]"),
                    };
                    warn!(error = %err, "rejected setoption");
                    println!("info string {err}");
                }
                Err(_) => {
                    let err = UciError::ResourceExhaustion {
                        name: name.clone(),
                        reason: format!("not a number: {value}"),
                    };
                    warn!(error = %err, "rejected setoption");
                    println!("info string {err}");
                }
            },
            "Ponder" => {
                self.ponder = value.eq_ignore_ascii_case("true");
            }
            _ => {
                let err = UciError::UnknownOption { name };
                warn!(error = %err, "rejected setoption");
                println!("info string {err}");
            }
        }
    }

    fn handle_go(&mut self, params: GoParams, tx: &mpsc::Sender<EngineEvent>) {
        if !matches!(self.state, EngineState::Idle) {
            warn!("go received while not idle, ignoring");
            return;
        }

        // Reset stop flag
        self.stop_flag = Arc::new(AtomicBool::new(false));

        let side = self.board.side_to_move();
        let phase = solaris_engine::eval::phase::phase(&self.board);
        let control = Arc::new(limits_from_go(
            params.wtime.map(Duration::from_millis),
            params.btime.map(Duration::from_millis),
            params.winc.map(Duration::from_millis),
            params.binc.map(Duration::from_millis),
            params.movestogo,
            params.movetime.map(Duration::from_millis),
            params.infinite,
            params.ponder,
            params.depth,
            params.nodes,
            side,
            phase,
            Arc::clone(&self.stop_flag),
        ));

        let max_depth = params.depth.unwrap_or(solaris_engine::search::negamax::MAX_PLY as u8);

        // Take the searcher — the search thread will own it
        let mut searcher = self.searcher.take().unwrap_or_default();

        let board = self.board;
        let game_history = self.game_history.clone();
        let search_control = Arc::clone(&control);
        let tx = tx.clone();

        // Dedicated watcher thread: polls the budget independently of node
        // counts, so a move-time cutoff is honored even if the search is
        // stuck in a long quiescence burst between node-count-gated checks.
        let watcher_control = Arc::clone(&control);
        let watcher_stopped = Arc::clone(&self.stop_flag);
        std::thread::spawn(move || {
            while !watcher_stopped.load(Ordering::Acquire) {
                watcher_control.watcher_tick();
                std::thread::sleep(Duration::from_millis(64));
            }
        });

        std::thread::spawn(move || {
            let result = searcher.search(
                &board,
                max_depth,
                &game_history,
                &search_control,
                |depth, score, nodes, seldepth, hashfull, pv| {
                    let elapsed = search_control.elapsed();
                    let elapsed_ms = elapsed.as_millis().max(1);
                    let nps = (nodes as u128 * 1000) / elapsed_ms;

                    let pv_str: String = pv
                        .iter()
                        .filter(|m| !m.is_null())
                        .map(|m| m.to_uci())
                        .collect::<Vec<_>>()
                        .join(" ");

                    let score_str = if score.abs() > MATE_THRESHOLD {
                        let plies_to_mate = MATE_SCORE - score.abs();
                        let moves_to_mate = (plies_to_mate + 1) / 2;
                        let signed = if score > 0 { moves_to_mate } else { -moves_to_mate };
                        format!("mate {signed}")
                    } else {
                        format!("cp {score}")
                    };

                    println!(
                        "info depth {depth} seldepth {seldepth} score {score_str} nodes {nodes} nps {nps} time {elapsed_ms} hashfull {hashfull} multipv 1 pv {pv_str}"
                    );
                },
            );
            let _ = tx.send(EngineEvent::SearchDone(SearchDone { result, searcher }));
        });

        self.state = if params.ponder {
            EngineState::Pondering
        } else {
            EngineState::Searching
        };
        self.control = Some(control);
    }

    fn handle_ponderhit(&mut self) {
        if !matches!(self.state, EngineState::Pondering) {
            warn!("ponderhit received while not pondering, ignoring");
            return;
        }
        if let Some(ref control) = self.control {
            control.ponder_hit();
        }
        self.state = EngineState::Searching;
    }

    fn handle_stop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    fn finish_search(&mut self, done: SearchDone) {
        let mut searcher = done.searcher;

        if self.pending_clear_tt {
            searcher.clear_tt();
            self.pending_clear_tt = false;
        }
        if let Some(mb) = self.pending_hash_mb.take() {
            searcher.resize_tt(mb);
        }

        self.searcher = Some(searcher);
        self.control = None;

        let result = &done.result;
        if result.best_move.is_null() {
            println!("bestmove 0000");
        } else {
            match result.ponder_move {
                Some(pm) if !pm.is_null() => {
                    println!(
                        "bestmove {} ponder {}",
                        result.best_move.to_uci(),
                        pm.to_uci()
                    );
                }
                _ => {
                    println!("bestmove {}", result.best_move.to_uci());
                }
            }
        }

        self.state = EngineState::Idle;
    }
}

impl Default for UciEngine {
    fn default() -> Self {
        Self::new()
    }
}
