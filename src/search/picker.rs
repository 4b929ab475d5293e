//! Move ordering: score a generated list once, then hand out one best move
//! at a time by selection. Captures are ranked by MVV/LVA, quiet moves by
//! the killer slots (and, when enabled, the relative history heuristic);
//! the hash move always goes first.

use crate::board::{Board, Piece};
use crate::moves::types::{Move, MoveList};
use crate::search::MAX_PLY;

/// The relative history heuristic is wired up but off; orderings measured
/// slightly worse with it in self-play.
pub const USE_HISTORY_HEURISTIC: bool = false;

const KILLER_SCORE: i32 = 50;
const HASH_MOVE_BONUS: i32 = 1000;
const MAX_HISTORY_DEPTH: i32 = 5;
const MAX_HISTORY_SCORE: i32 = 250;

/// Victim weights for capture ordering; kings never appear as victims.
const MVV: [i32; 6] = [1, 2, 2, 3, 5, 0];

/// A move list with its ordering scores, selection-sorted lazily.
pub struct ScoredMoves {
    moves: MoveList,
    scores: [i32; crate::moves::types::MAX_MOVES],
}

impl ScoredMoves {
    pub fn new(moves: MoveList) -> ScoredMoves {
        ScoredMoves {
            moves,
            scores: [0; crate::moves::types::MAX_MOVES],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Move {
        self.moves[idx]
    }

    /// Swap the best-scored remaining move into `idx` and return it.
    pub fn pick_next(&mut self, idx: usize) -> Move {
        let mut best = idx;
        for i in idx + 1..self.moves.len() {
            if self.scores[i] > self.scores[best] {
                best = i;
            }
        }
        if best != idx {
            self.moves.swap(idx, best);
            self.scores.swap(idx, best);
        }
        self.moves[idx]
    }
}

pub struct MovePicker {
    killers: [[Move; 2]; MAX_PLY],
    /// `history[color][piece][to]`, updated on quiet beta cutoffs.
    history: [[[i32; 64]; 6]; 2],
}

impl Default for MovePicker {
    fn default() -> Self {
        Self::new()
    }
}

impl MovePicker {
    pub fn new() -> MovePicker {
        MovePicker {
            killers: [[Move::NONE; 2]; MAX_PLY],
            history: [[[0; 64]; 6]; 2],
        }
    }

    pub fn reset(&mut self) {
        self.killers = [[Move::NONE; 2]; MAX_PLY];
        self.history = [[[0; 64]; 6]; 2];
    }

    #[inline]
    pub fn is_killer(&self, m: Move, ply: usize) -> bool {
        self.killers[ply][0] == m || self.killers[ply][1] == m
    }

    /// Primary killer outranks the secondary one.
    #[inline]
    pub fn killer_score(&self, m: Move, ply: usize) -> i32 {
        if m == self.killers[ply][0] {
            KILLER_SCORE + KILLER_SCORE / 10
        } else if m == self.killers[ply][1] {
            KILLER_SCORE
        } else {
            0
        }
    }

    fn history_score(&self, board: &Board, m: Move) -> i32 {
        let (color, piece) = board
            .piece_at(m.from_sq())
            .expect("ordering a move with no mover");
        self.history[color as usize][piece as usize][m.to_sq().index() as usize]
    }

    /// Score the whole list for this node.
    pub fn score_moves(
        &self,
        board: &Board,
        list: &mut ScoredMoves,
        ply: usize,
        hash_move: Move,
    ) {
        for idx in 0..list.moves.len() {
            let m = list.moves[idx];
            let mut score;

            if let Some((_, victim)) = board.piece_at(m.to_sq()) {
                let (_, attacker) = board.piece_at(m.from_sq()).expect("mover exists");
                score = 24 * MVV[victim as usize] - 3 * MVV[attacker as usize];
                if m.is_promotion() {
                    score += 96 * MVV[m.promotion() as usize];
                }
            } else {
                score = self.killer_score(m, ply);
                if USE_HISTORY_HEURISTIC {
                    score += self.history_score(board, m);
                }
            }

            if m == hash_move {
                score += HASH_MOVE_BONUS;
            }
            list.scores[idx] = score;
        }
    }

    /// A quiet move refuted the node: promote it to killer and, with the
    /// history heuristic on, reward it and tax the quiets tried before it.
    pub fn register_cutoff(
        &mut self,
        board: &Board,
        list: &ScoredMoves,
        idx: usize,
        ply: usize,
        depth: i32,
    ) {
        let m = list.moves[idx];
        if board.piece_at(m.to_sq()).is_some() {
            return;
        }

        if self.killers[ply][0] != m {
            self.killers[ply][1] = self.killers[ply][0];
            self.killers[ply][0] = m;
        }

        if !USE_HISTORY_HEURISTIC {
            return;
        }

        let capped = depth.min(MAX_HISTORY_DEPTH) as f64;
        let x = capped.ln();
        let bonus = (x * x * x * (capped + 2.0)) as i32 + 1;

        let (color, piece) = board.piece_at(m.from_sq()).expect("mover exists");
        let slot =
            &mut self.history[color as usize][piece as usize][m.to_sq().index() as usize];
        *slot = (*slot + bonus).min(MAX_HISTORY_SCORE);

        for i in (0..idx).rev() {
            let earlier = list.moves[i];
            if board.piece_at(earlier.to_sq()).is_none() {
                if let Some((c, p)) = board.piece_at(earlier.from_sq()) {
                    self.history[c as usize][p as usize][earlier.to_sq().index() as usize] -=
                        bonus;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::movegen::generate_legal;
    use std::str::FromStr;

    fn scored_for(fen: &str, ply: usize, picker: &MovePicker, hash_move: Move) -> ScoredMoves {
        let board = Board::from_str(fen).unwrap();
        let mut list = MoveList::new();
        generate_legal(&board, &mut list);
        let mut scored = ScoredMoves::new(list);
        picker.score_moves(&board, &mut scored, ply, hash_move);
        scored
    }

    fn pick_all(mut scored: ScoredMoves) -> Vec<Move> {
        (0..scored.len()).map(|i| scored.pick_next(i)).collect()
    }

    // a middlegame position with captures, quiets and a hash move to order
    const BUSY: &str = "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4";

    #[test]
    fn hash_move_comes_first() {
        let picker = MovePicker::new();
        let board = Board::from_str(BUSY).unwrap();
        let mut list = MoveList::new();
        generate_legal(&board, &mut list);
        // pick a dull quiet move as the hash move
        let hash_move = *list.iter().find(|m| m.to_string() == "a2a3").unwrap();

        let scored = scored_for(BUSY, 0, &picker, hash_move);
        let ordered = pick_all(scored);
        assert_eq!(ordered[0], hash_move);
    }

    #[test]
    fn captures_before_non_killer_quiets() {
        let picker = MovePicker::new();
        let board = Board::from_str(BUSY).unwrap();
        let scored = scored_for(BUSY, 0, &picker, Move::NONE);
        let ordered = pick_all(scored);

        let first_quiet = ordered
            .iter()
            .position(|m| board.piece_at(m.to_sq()).is_none())
            .unwrap();
        assert!(
            ordered[first_quiet..]
                .iter()
                .all(|m| board.piece_at(m.to_sq()).is_none()),
            "a capture was ordered after a quiet move"
        );
    }

    #[test]
    fn killers_before_other_quiets() {
        let mut picker = MovePicker::new();
        let board = Board::from_str(BUSY).unwrap();
        let mut list = MoveList::new();
        generate_legal(&board, &mut list);
        let killer = *list.iter().find(|m| m.to_string() == "b1c3").unwrap();

        // register the quiet move as a cutoff at this ply
        let mut scored = ScoredMoves::new(list);
        picker.score_moves(&board, &mut scored, 3, Move::NONE);
        let idx = (0..scored.len()).find(|&i| scored.get(i) == killer).unwrap();
        picker.register_cutoff(&board, &scored, idx, 3, 4);
        assert!(picker.is_killer(killer, 3));

        let scored = scored_for(BUSY, 3, &picker, Move::NONE);
        let ordered = pick_all(scored);
        let killer_pos = ordered.iter().position(|&m| m == killer).unwrap();
        for (i, m) in ordered.iter().enumerate() {
            if board.piece_at(m.to_sq()).is_none() && *m != killer && !picker.is_killer(*m, 3) {
                assert!(killer_pos < i, "killer ordered after a plain quiet");
            }
        }
    }

    #[test]
    fn capture_cutoffs_do_not_become_killers() {
        let mut picker = MovePicker::new();
        let board = Board::from_str(BUSY).unwrap();
        let mut list = MoveList::new();
        generate_legal(&board, &mut list);
        // f3xe5 is a capture
        let capture = *list.iter().find(|m| m.to_string() == "f3e5").unwrap();
        let mut scored = ScoredMoves::new(list);
        picker.score_moves(&board, &mut scored, 0, Move::NONE);
        let idx = (0..scored.len()).find(|&i| scored.get(i) == capture).unwrap();
        picker.register_cutoff(&board, &scored, idx, 0, 4);
        assert!(!picker.is_killer(capture, 0));
    }

    #[test]
    fn killer_slots_shift() {
        let mut picker = MovePicker::new();
        let board = Board::from_str(BUSY).unwrap();
        let mut list = MoveList::new();
        generate_legal(&board, &mut list);
        let first = *list.iter().find(|m| m.to_string() == "b1c3").unwrap();
        let second = *list.iter().find(|m| m.to_string() == "d2d3").unwrap();

        let mut scored = ScoredMoves::new(list);
        picker.score_moves(&board, &mut scored, 0, Move::NONE);
        let i1 = (0..scored.len()).find(|&i| scored.get(i) == first).unwrap();
        picker.register_cutoff(&board, &scored, i1, 0, 2);
        let i2 = (0..scored.len()).find(|&i| scored.get(i) == second).unwrap();
        picker.register_cutoff(&board, &scored, i2, 0, 2);

        assert!(picker.killer_score(second, 0) > picker.killer_score(first, 0));
        assert!(picker.killer_score(first, 0) > 0);

        // re-registering the primary killer must not duplicate it
        let i2 = (0..scored.len()).find(|&i| scored.get(i) == second).unwrap();
        picker.register_cutoff(&board, &scored, i2, 0, 2);
        assert!(picker.killer_score(first, 0) > 0);
    }
}
