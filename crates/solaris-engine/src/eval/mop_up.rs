//! Mop-up evaluation: push a lost king to the edge and walk the winning king
//! toward it, once the position is a clear material win heading into the
//! endgame. Only active when `|eval| > 200` and the phase is past the
//! midpoint — cheap to skip otherwise.

use solaris_core::{Board, Color, Square};

use crate::eval::score::{Score, S};

/// Manhattan distance between two squares.
fn manhattan(a: Square, b: Square) -> i32 {
    let rank_diff = (a.rank().index() as i32 - b.rank().index() as i32).abs();
    let file_diff = (a.file().index() as i32 - b.file().index() as i32).abs();
    rank_diff + file_diff
}

/// Distance from `sq` to the nearest board edge, in king-moves — used to push
/// the losing king toward a corner/edge rather than the exact center.
fn center_manhattan_distance(sq: Square) -> i32 {
    let rank = sq.rank().index() as i32;
    let file = sq.file().index() as i32;
    let rank_dist = (rank - 3).abs().min((rank - 4).abs());
    let file_dist = (file - 3).abs().min((file - 4).abs());
    rank_dist + file_dist
}

/// Evaluate the mop-up term from White's perspective.
///
/// `material_eval` is the material+PST+mobility+pawn score computed so far,
/// used to decide which side is winning and whether the margin is large
/// enough to bother. `phase` is the normalized game phase in `[0, 1]`
/// (0 = opening, 1 = endgame).
pub fn evaluate_mop_up(board: &Board, material_eval: Score, phase: f64) -> Score {
    if phase <= 0.5 {
        return Score::ZERO;
    }
    let mg = material_eval.mg() as i32;
    if mg.abs() <= 200 {
        return Score::ZERO;
    }

    let winner = if mg > 0 { Color::White } else { Color::Black };
    let loser = winner.flip();

    let winner_king = board.king_square(winner);
    let loser_king = board.king_square(loser);

    let push_to_edge = 10 * center_manhattan_distance(loser_king);
    let pull_together = 4 * (14 - manhattan(winner_king, loser_king));
    let bonus = ((push_to_edge + pull_together) as f64 * phase) as i32;

    let signed = if winner == Color::White { bonus } else { -bonus };
    S(signed as i16, signed as i16)
}
