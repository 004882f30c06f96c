//! Move ordering: TT move / PV hint / killers take absolute priority, then a
//! phase-aware composite heuristic (MVV-LVA, quiet history, check, pawn-push,
//! king-activity and pawn-attack terms) ranks everything else.

use solaris_core::{pawn_attacks, Board, Color, Move, MoveKind, MoveList, PieceKind};

use crate::eval::material::MATERIAL_VALUE;
use crate::search::heuristics::{HistoryTable, KillerTable};

/// Score added when a move matches the transposition-table best move.
const TT_MOVE_SCORE: i32 = 100_000_000;
/// Score added when a move matches the previous iteration's PV move at this ply.
const PV_HINT_SCORE: i32 = 1_000_000;
/// Score added for the primary killer slot at this ply.
const KILLER_0_SCORE: i32 = 10_000;
/// Score added for the secondary killer slot at this ply.
const KILLER_1_SCORE: i32 = 8_000;

fn material_value(kind: PieceKind) -> f64 {
    MATERIAL_VALUE[kind.index()].mg() as f64
}

/// Score a non-priority ("quiet-ish") move using the phase-aware composite
/// heuristic. TT/PV-hint/killer moves never reach this function in practice
/// since they are scored earlier in the cascade, but calling it on them is
/// harmless — it just adds an overlapping component.
fn composite_score(board: &Board, mv: Move, side: Color, game_phase: f64, history: &HistoryTable) -> f64 {
    let mover = board.piece_on(mv.source()).unwrap_or(PieceKind::Pawn);
    let pawn_value = material_value(PieceKind::Pawn);
    let phase_factor_sq = (game_phase + 1.0).powi(4);

    let mut score = 0.0;

    if board.is_capture(mv) {
        let victim = if mv.is_en_passant() {
            PieceKind::Pawn
        } else {
            board.piece_on(mv.dest()).unwrap_or(PieceKind::Pawn)
        };
        let mvv_lva = 10.0 * material_value(victim) - 5.0 * material_value(mover);
        score += mvv_lva * phase_factor_sq;
    } else {
        score += history.score(side, mv.source(), mv.dest()) as f64;
    }

    if game_phase > 0.6 && board.gives_check(mv) {
        score += pawn_value * (5.0 * game_phase + 1.0);
    }

    if mover == PieceKind::Pawn {
        score += pawn_value * (game_phase + 1.0).powi(4);
        if mv.kind() == MoveKind::Promotion {
            score += 5.0 * material_value(mv.promotion_piece().to_piece_kind());
        }
    }

    if mover == PieceKind::King {
        score += 20f64.powf(3.0 * game_phase);
    }

    if mover != PieceKind::Pawn {
        let enemy_pawns = board.pieces(PieceKind::Pawn) & board.side(side.flip());
        if (pawn_attacks(side, mv.dest()) & enemy_pawns).is_nonempty() {
            score -= 5.0 * material_value(mover) + 5.0 * pawn_value;
        }
    }

    score
}

/// Score a move for ordering purposes, given the priority hints
/// (TT move, previous-iteration PV move, killer slots) and the mutable
/// history/killer heuristic state.
pub fn score_move(
    board: &Board,
    mv: Move,
    ply: usize,
    tt_move: Move,
    pv_hint: Move,
    killers: &KillerTable,
    history: &HistoryTable,
    game_phase: f64,
) -> i32 {
    if mv == tt_move {
        return TT_MOVE_SCORE;
    }
    if mv == pv_hint {
        return PV_HINT_SCORE;
    }
    if killers.is_killer(ply, mv) {
        // Distinguish slot 0 from slot 1 — is_killer alone doesn't tell us
        // which, so re-derive it from the table's public probe.
        return if killers.primary(ply) == mv {
            KILLER_0_SCORE
        } else {
            KILLER_1_SCORE
        };
    }

    let side = board.side_to_move();
    composite_score(board, mv, side, game_phase, history).round() as i32
}

/// Incremental move picker using selection sort.
///
/// Yields moves in descending score order. For quiescence search,
/// only captures and promotions are yielded (`min_score` gate), and the
/// priority terms (TT/PV/killers) never apply since no ordering hints are
/// passed.
pub struct MovePicker {
    moves: [Move; 256],
    scores: [i32; 256],
    len: usize,
    cursor: usize,
    min_score: i32,
}

impl MovePicker {
    /// Create a picker that yields all legal moves, ordered by the full
    /// priority cascade described in [`score_move`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        moves: &MoveList,
        board: &Board,
        ply: usize,
        tt_move: Move,
        pv_hint: Move,
        killers: &KillerTable,
        history: &HistoryTable,
        game_phase: f64,
    ) -> Self {
        let mut picker = Self {
            moves: [Move::NULL; 256],
            scores: [0; 256],
            len: moves.len(),
            cursor: 0,
            min_score: i32::MIN,
        };
        for i in 0..moves.len() {
            picker.moves[i] = moves[i];
            picker.scores[i] =
                score_move(board, moves[i], ply, tt_move, pv_hint, killers, history, game_phase);
        }
        picker
    }

    /// Create a picker for quiescence search (captures and promotions only).
    pub fn new_qsearch(moves: &MoveList, board: &Board, game_phase: f64) -> Self {
        let history = HistoryTable::new();
        let killers = KillerTable::new();
        let mut picker = Self {
            moves: [Move::NULL; 256],
            scores: [0; 256],
            len: 0,
            cursor: 0,
            min_score: i32::MIN,
        };
        let mut len = 0;
        for i in 0..moves.len() {
            let mv = moves[i];
            if !board.is_capture(mv) && mv.kind() != MoveKind::Promotion {
                continue;
            }
            picker.moves[len] = mv;
            picker.scores[len] = score_move(
                board,
                mv,
                0,
                Move::NULL,
                Move::NULL,
                &killers,
                &history,
                game_phase,
            );
            len += 1;
        }
        picker.len = len;
        picker
    }

    /// Yield the next highest-scored move via selection sort.
    ///
    /// Returns `None` when all remaining moves score below `min_score`
    /// or all moves have been yielded.
    pub fn pick_next(&mut self) -> Option<Move> {
        if self.cursor >= self.len {
            return None;
        }

        // Find the index of the maximum score in cursor..len
        let mut best_idx = self.cursor;
        let mut best_score = self.scores[self.cursor];
        for i in (self.cursor + 1)..self.len {
            if self.scores[i] > best_score {
                best_score = self.scores[i];
                best_idx = i;
            }
        }

        // Check minimum score threshold
        if best_score < self.min_score {
            return None;
        }

        // Swap the best to cursor position
        self.moves.swap(self.cursor, best_idx);
        self.scores.swap(self.cursor, best_idx);

        let mv = self.moves[self.cursor];
        self.cursor += 1;
        Some(mv)
    }
}
