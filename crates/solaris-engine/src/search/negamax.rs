//! Negamax alpha-beta search with quiescence, PVS, LMR, null-move pruning,
//! mate-distance pruning, and check extension.

use solaris_core::{Board, Move, MoveKind, PieceKind, generate_legal_moves};

use crate::eval::evaluate;
use crate::eval::material::MATERIAL_VALUE;
use crate::search::control::SearchControl;
use crate::search::heuristics::{HistoryTable, KillerTable};
use crate::search::ordering::MovePicker;
use crate::search::tt::{Bound, TranspositionTable};

/// Score representing an unreachable upper/lower bound.
pub const INF: i32 = 30_000;

/// Base score for checkmate (adjusted by ply for mate distance).
pub const MATE_SCORE: i32 = 29_000;

/// Scores above this threshold indicate a forced mate.
pub const MATE_THRESHOLD: i32 = 28_000;

/// Maximum search depth (in plies) for array sizing and recursion limits.
pub const MAX_PLY: usize = 128;

/// Aspiration window growth sequence, indexed by consecutive fail count.
pub const ASP: [i32; 7] = [50, 97, 307, 965, 3_036, 9_546, INF];

/// Margin added to the captured piece's value for quiescence delta pruning.
fn delta_margin() -> i32 {
    200 + MATERIAL_VALUE[PieceKind::Queen.index()].mg() as i32
}

/// Parameters passed to each negamax call beyond alpha/beta.
#[derive(Clone, Copy)]
pub(super) struct NodeParams {
    pub depth: u8,
    pub ply: u8,
    /// Whether a null move may be tried at this node (false directly below
    /// another null move, to avoid two consecutive null moves).
    pub do_null: bool,
}

/// Check if the side to move has any non-pawn, non-king material.
///
/// Doubles as the "not in deep endgame" gate for null-move pruning — with
/// only pawns left, zugzwang makes the null-move assumption unsound.
fn has_non_pawn_material(board: &Board) -> bool {
    let us = board.side_to_move();
    let our_pieces = board.side(us);
    (board.pieces(PieceKind::Knight) & our_pieces).is_nonempty()
        || (board.pieces(PieceKind::Bishop) & our_pieces).is_nonempty()
        || (board.pieces(PieceKind::Rook) & our_pieces).is_nonempty()
        || (board.pieces(PieceKind::Queen) & our_pieces).is_nonempty()
}

fn is_quiet_move(board: &Board, mv: Move) -> bool {
    !board.is_capture(mv) && mv.kind() != MoveKind::Promotion
}

/// Negamax alpha-beta search with PVS, LMR, and mate/null-move pruning.
///
/// Returns the best score for the side to move. Serves as both `pv_search`
/// and `zw` — which one it behaves as falls out of whether `alpha+1 < beta`
/// (a proper window vs. a null window); the recursive shape is identical.
/// The principal variation is collected into `ctx.pv`, but only at nodes
/// searched with a proper window.
pub(super) fn negamax(
    board: &Board,
    alpha: i32,
    beta: i32,
    params: NodeParams,
    ctx: &mut SearchContext<'_>,
) -> i32 {
    let NodeParams { depth, ply, do_null } = params;
    let mut alpha = alpha;
    let mut beta = beta;
    let is_pv = alpha + 1 < beta;
    let is_root = ply == 0;

    ctx.pv.clear_ply(ply as usize);
    ctx.nodes += 1;
    ctx.seldepth = ctx.seldepth.max(ply);

    if ply as usize >= MAX_PLY {
        return evaluate(board);
    }

    // Cooperative cancellation: checked first in every frame. The root
    // driver discards the whole iteration's result when this has fired, so
    // the placeholder value returned here never reaches a committed score.
    if ctx.control.should_stop(ctx.nodes) {
        return 0;
    }

    if board.halfmove_clock() >= 100 || board.insufficient_material() {
        return 0;
    }
    if ctx.is_repetition(board, ply) {
        return 0;
    }

    // Mate-distance pruning.
    if !is_root {
        alpha = alpha.max(-MATE_SCORE + ply as i32);
        beta = beta.min(MATE_SCORE - ply as i32);
        if alpha >= beta {
            return alpha;
        }
    }

    if depth == 0 {
        return quiescence(board, ply, alpha, beta, ctx);
    }

    // TT probe — always looked up for move ordering, but only consulted for
    // an early return/window-narrow away from the root.
    let tt_entry = ctx.tt.probe(board.hash(), ply);
    let tt_move = tt_entry.as_ref().map_or(Move::NULL, |e| e.best_move);

    if !is_root
        && let Some(entry) = &tt_entry
        && entry.depth >= depth
    {
        match entry.bound {
            Bound::Exact => return entry.score,
            Bound::LowerBound => alpha = alpha.max(entry.score),
            Bound::UpperBound => beta = beta.min(entry.score),
            Bound::None => {}
        }
        if alpha >= beta {
            return alpha;
        }
    }

    let in_check = board.in_check();

    // Null-move reduction.
    if do_null
        && !is_pv
        && ply > 0
        && depth > 3
        && !in_check
        && has_non_pawn_material(board)
        && beta.abs() < MATE_THRESHOLD
    {
        let r: u8 = if depth > 6 { 4 } else { 3 };
        let null_board = board.make_null_move();
        ctx.history.push(board.hash());
        let null_score = -negamax(
            &null_board,
            -beta,
            -beta + 1,
            NodeParams { depth: depth.saturating_sub(r + 1), ply: ply + 1, do_null: false },
            ctx,
        );
        ctx.history.pop();
        if ctx.control.should_stop(ctx.nodes) {
            return 0;
        }
        if null_score >= beta {
            return null_score;
        }
    }

    let moves = generate_legal_moves(board);
    if moves.is_empty() {
        return if in_check { -(MATE_SCORE - ply as i32) } else { 0 };
    }

    let original_alpha = alpha;
    let mut best_score = -INF;
    let mut best_move = Move::NULL;
    let game_phase = crate::eval::phase::phase(board);
    let mut picker = MovePicker::new(
        &moves,
        board,
        ply as usize,
        tt_move,
        ctx.pv_hint(ply as usize),
        &ctx.killers,
        &ctx.history_table,
        game_phase,
    );

    let mut move_index: usize = 0;
    while let Some(mv) = picker.pick_next() {
        let quiet = is_quiet_move(board, mv);
        let child = board.make_move(mv);
        ctx.history.push(board.hash());

        let score = if move_index == 0 {
            let child_in_check = child.in_check();
            let child_depth = depth - 1 + if child_in_check { 1 } else { 0 };
            -negamax(
                &child,
                -beta,
                -alpha,
                NodeParams { depth: child_depth, ply: ply + 1, do_null: true },
                ctx,
            )
        } else {
            let reduced = depth > 3 && quiet && !ctx.killers.is_killer(ply as usize, mv) && !in_check;
            let reduced_depth = if reduced {
                let r = (move_index as f64).sqrt().floor() as u8;
                (depth - 1).saturating_sub(r)
            } else {
                depth - 1
            };
            let mut sc = -negamax(
                &child,
                -alpha - 1,
                -alpha,
                NodeParams { depth: reduced_depth, ply: ply + 1, do_null: true },
                ctx,
            );
            if sc > alpha && sc < beta {
                sc = -negamax(
                    &child,
                    -beta,
                    -alpha,
                    NodeParams { depth: depth - 1, ply: ply + 1, do_null: true },
                    ctx,
                );
            }
            sc
        };

        ctx.history.pop();
        move_index += 1;

        if ctx.control.should_stop(ctx.nodes) {
            return 0;
        }

        if score > best_score {
            best_score = score;
            best_move = mv;
            if score > alpha {
                alpha = score;
                if is_pv {
                    ctx.pv.update(ply as usize, mv);
                }
            }
        }

        if alpha >= beta {
            if quiet {
                ctx.killers.store(ply as usize, mv);
                let side = board.side_to_move();
                ctx.history_table.update_good(side, mv.source(), mv.dest(), depth);
            }
            best_score = score;
            break;
        }
    }

    let bound = if best_score <= original_alpha {
        Bound::UpperBound
    } else if best_score >= beta {
        Bound::LowerBound
    } else {
        Bound::Exact
    };
    ctx.tt.store(board.hash(), depth, best_score, best_score, best_move, bound, ply, is_pv);

    best_score
}

/// Aspiration-window search: wraps [`negamax`] at the root for one
/// iteration, re-searching with a widening window on fail-high/fail-low.
///
/// Uses a full window at shallow depths (`<= 4`), matching the teacher's own
/// cutoff for when a narrow window isn't worth the re-search risk.
pub(super) fn aspiration_search(
    board: &Board,
    depth: u8,
    prev_score: i32,
    ctx: &mut SearchContext<'_>,
) -> i32 {
    ctx.prev_pv = ctx.pv.root_pv().to_vec();

    let (mut alpha, mut beta) = if depth <= 4 {
        (-INF, INF)
    } else {
        (prev_score - ASP[0], prev_score + ASP[0])
    };

    let mut fail_count = 0usize;
    loop {
        let params = NodeParams { depth, ply: 0, do_null: true };
        let score = negamax(board, alpha, beta, params, ctx);

        if ctx.control.should_stop(ctx.nodes) {
            return score;
        }

        if score <= alpha {
            alpha = (alpha - ASP[fail_count]).max(-INF);
            fail_count = (fail_count + 1).min(ASP.len() - 1);
        } else if score >= beta {
            beta = (beta + ASP[fail_count]).min(INF);
            fail_count = (fail_count + 1).min(ASP.len() - 1);
        } else {
            return score;
        }
    }
}

/// Quiescence search — resolve tactical sequences before evaluating.
///
/// Only considers captures and promotions (via [`MovePicker::new_qsearch`])
/// to avoid the horizon effect. Uses delta-margin pruning instead of
/// static-exchange pruning to skip captures with no hope of raising alpha.
fn quiescence(board: &Board, ply: u8, mut alpha: i32, beta: i32, ctx: &mut SearchContext<'_>) -> i32 {
    ctx.nodes += 1;
    ctx.seldepth = ctx.seldepth.max(ply);

    if ctx.control.should_stop(ctx.nodes) {
        return 0;
    }
    if ply as usize >= MAX_PLY {
        return evaluate(board);
    }
    if board.insufficient_material() {
        return 0;
    }

    if let Some(entry) = ctx.tt.probe(board.hash(), ply) {
        let cutoff = match entry.bound {
            Bound::Exact => true,
            Bound::LowerBound => entry.score >= beta,
            Bound::UpperBound => entry.score <= alpha,
            Bound::None => false,
        };
        if cutoff {
            return entry.score;
        }
    }

    let stand_pat = evaluate(board);
    if stand_pat >= beta {
        return stand_pat;
    }
    if stand_pat > alpha {
        alpha = stand_pat;
    }

    let moves = generate_legal_moves(board);
    if moves.is_empty() {
        return if board.in_check() { -(MATE_SCORE - ply as i32) } else { 0 };
    }

    let game_phase = crate::eval::phase::phase(board);
    let mut picker = MovePicker::new_qsearch(&moves, board, game_phase);
    let margin = delta_margin();

    while let Some(mv) = picker.pick_next() {
        let captured_value = if mv.is_en_passant() {
            MATERIAL_VALUE[PieceKind::Pawn.index()].mg() as i32
        } else {
            board
                .piece_on(mv.dest())
                .map_or(0, |k| MATERIAL_VALUE[k.index()].mg() as i32)
        };
        if stand_pat + margin + captured_value <= alpha {
            continue;
        }

        let child = board.make_move(mv);
        let score = -quiescence(&child, ply + 1, -beta, -alpha, ctx);

        if ctx.control.should_stop(ctx.nodes) {
            return 0;
        }

        if score >= beta {
            return score;
        }
        if score > alpha {
            alpha = score;
        }
    }

    alpha
}

/// Triangular PV table for collecting principal variation lines.
///
/// Stored on the stack (~33 KB). Each row `ply` contains the PV
/// continuation from that ply onward.
pub struct PvTable {
    moves: [[Move; MAX_PLY]; MAX_PLY],
    len: [usize; MAX_PLY],
}

impl PvTable {
    /// Create a zeroed PV table.
    pub fn new() -> Self {
        Self {
            moves: [[Move::NULL; MAX_PLY]; MAX_PLY],
            len: [0; MAX_PLY],
        }
    }

    /// Clear the PV line at `ply` (called at the top of each node).
    pub fn clear_ply(&mut self, ply: usize) {
        if ply < MAX_PLY {
            self.len[ply] = 0;
        }
    }

    /// Update the PV at `ply`: set `mv` as the best move and copy
    /// the continuation from `ply + 1`.
    pub fn update(&mut self, ply: usize, mv: Move) {
        if ply >= MAX_PLY {
            return;
        }

        self.moves[ply][0] = mv;

        let child_ply = ply + 1;
        if child_ply < MAX_PLY {
            let child_len = self.len[child_ply];
            let copy_len = child_len.min(MAX_PLY - 1);

            if ply < child_ply {
                let (top, bottom) = self.moves.split_at_mut(child_ply);
                top[ply][1..1 + copy_len].copy_from_slice(&bottom[0][..copy_len]);
            }

            self.len[ply] = 1 + copy_len;
        } else {
            self.len[ply] = 1;
        }
    }

    /// Set a single move as the PV at `ply` (no continuation).
    pub fn set_single(&mut self, ply: usize, mv: Move) {
        if ply < MAX_PLY {
            self.moves[ply][0] = mv;
            self.len[ply] = 1;
        }
    }

    /// The principal variation from the root.
    pub fn root_pv(&self) -> &[Move] {
        &self.moves[0][..self.len[0]]
    }

    /// Length of the root PV line.
    pub fn root_len(&self) -> usize {
        self.len[0]
    }
}

impl Default for PvTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Search state threaded through negamax calls.
pub(super) struct SearchContext<'a> {
    /// Total nodes visited.
    pub nodes: u64,
    /// Transposition table (shared, lockless).
    pub tt: &'a TranspositionTable,
    /// Principal variation table.
    pub pv: PvTable,
    /// Search control (stop flag + time limits).
    pub control: &'a SearchControl,
    /// Killer move table.
    pub killers: KillerTable,
    /// History heuristic table.
    pub history_table: HistoryTable,
    /// Zobrist hashes of positions visited during this search, for
    /// repetition detection.
    pub history: Vec<u64>,
    /// Root PV line from the previous completed iteration, used as a move
    /// ordering hint (`pv_hint`) for the current iteration.
    pub prev_pv: Vec<Move>,
    /// Deepest ply reached this search, for UCI `seldepth`.
    pub seldepth: u8,
}

impl SearchContext<'_> {
    /// Repetition against positions visited earlier, scanned back only as
    /// far as the fifty-move counter allows.
    ///
    /// `history` seeds from the real game (ending with the root position's
    /// own hash), then gains one entry per ply the search descends. So at
    /// the root, the root's hash is always already present once — a single
    /// match there is the trivial self-match, not a repetition. Below the
    /// root, a single match means this node revisits a position already on
    /// the path (real or searched), which is enough to treat as a draw.
    fn is_repetition(&self, board: &Board, ply: u8) -> bool {
        let hash = board.hash();
        let lookback = (board.halfmove_clock() as usize).min(self.history.len());
        let start = self.history.len() - lookback;
        let occurrences = self.history[start..].iter().filter(|&&h| h == hash).count();
        if ply == 0 {
            occurrences >= 3
        } else {
            occurrences >= 1
        }
    }

    /// The previous iteration's PV move at `ply`, or `Move::NULL`.
    fn pv_hint(&self, ply: usize) -> Move {
        self.prev_pv.get(ply).copied().unwrap_or(Move::NULL)
    }
}
