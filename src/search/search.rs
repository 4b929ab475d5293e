//! Iterative-deepening alpha-beta with principal-variation search,
//! null-move pruning, mate-distance pruning and draw detection. The
//! searcher owns its transposition table and mutates one borrowed board
//! through make/unmake for the lifetime of a search session.

use crate::bitboard::{DARK_SQUARES, LIGHT_SQUARES};
use crate::board::{Board, Color, Piece};
use crate::moves::movegen::generate_legal;
use crate::moves::types::{Move, MoveList};
use crate::search::MAX_PLY;
use crate::search::eval::static_eval;
use crate::search::picker::{MovePicker, ScoredMoves};
use crate::search::score::{DRAW_SCORE, MATE_SCORE, UNKNOWN_SCORE, is_mate_score};
use crate::search::tt::{ScoreBound, TranspositionTable};
use std::io::Write;
use std::time::Instant;

pub const NULL_MOVE_MIN_DEPTH: i32 = 3;
pub const NULL_MOVE_PRUNING_DEPTH: i32 = 2;

pub struct Searcher<'a, W: Write> {
    pos: &'a mut Board,
    pub tt: TranspositionTable,
    picker: MovePicker,
    out: W,
    nodes: u64,
    tthits: u64,
    /// Position keys from the game so far plus the search stack, for
    /// repetition detection. Indexed by `game_ply + ply`.
    hash_list: Vec<u64>,
    game_ply: usize,
    allow_null: [bool; MAX_PLY],
}

impl<'a, W: Write> Searcher<'a, W> {
    pub fn new(pos: &'a mut Board, out: W, log2_hash: u32) -> Searcher<'a, W> {
        Searcher {
            pos,
            tt: TranspositionTable::new(log2_hash),
            picker: MovePicker::new(),
            out,
            nodes: 0,
            tthits: 0,
            hash_list: Vec::new(),
            game_ply: 0,
            allow_null: [true; MAX_PLY],
        }
    }

    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    pub fn tt_hits(&self) -> u64 {
        self.tthits
    }

    pub fn reset(&mut self) {
        self.picker.reset();
    }

    /// Iterative deepening to `depth`. `game_hashes` holds the keys of the
    /// positions played so far (the current one last) so the search sees
    /// game history when testing repetitions.
    pub fn search(&mut self, depth: u32, game_hashes: &[u64]) -> (Move, i32) {
        self.reset();
        self.tt.inc_gen();
        self.hash_list = vec![0; game_hashes.len() + MAX_PLY];
        self.hash_list[..game_hashes.len()].copy_from_slice(game_hashes);
        self.game_ply = game_hashes.len();
        self.nodes = 0;
        self.tthits = 0;

        let mut list = MoveList::new();
        generate_legal(self.pos, &mut list);
        let mut root_moves: Vec<(Move, i32)> = list.iter().map(|&m| (m, 0)).collect();

        let mut best = (Move::NONE, -MATE_SCORE);
        let timer = Instant::now();

        for d in 1..=depth as i32 {
            best = (Move::NONE, -MATE_SCORE);
            self.allow_null = [true; MAX_PLY];

            for i in 0..root_moves.len() {
                let m = root_moves[i].0;
                let undo = self.pos.make_move(m);
                self.hash_list[self.game_ply] = self.pos.hash();
                let score = -self.alpha_beta(-MATE_SCORE, MATE_SCORE, d - 1, 1);
                self.pos.unmake_move(m, &undo);
                root_moves[i].1 = score;

                if score > best.1 {
                    best = (m, score);
                    let secs = timer.elapsed().as_secs_f64().max(1e-9);
                    let nps = (self.nodes as f64 / secs) as u64;
                    let pv = self.extract_pv(m);
                    let _ = writeln!(
                        self.out,
                        "info depth {} score cp {} nodes {} nps {} tthits {} pv {}",
                        d,
                        score / 10,
                        self.nodes,
                        nps,
                        self.tthits,
                        pv
                    );
                }
            }

            // the sort is stable: equal scores keep last iteration's order
            root_moves.sort_by(|a, b| b.1.cmp(&a.1));
        }

        let _ = writeln!(
            self.out,
            "bestmove {} nodes {}",
            if best.0 == Move::NONE {
                "0000".to_string()
            } else {
                best.0.to_string()
            },
            self.nodes
        );
        (best.0, best.1)
    }

    fn alpha_beta(&mut self, mut alpha: i32, mut beta: i32, depth: i32, ply: usize) -> i32 {
        self.nodes += 1;

        // mate-distance pruning: even a mate here cannot beat a shorter
        // mate already found
        beta = beta.min(MATE_SCORE - ply as i32 - 1);
        if alpha >= beta {
            return alpha;
        }

        let hash = self.pos.hash();
        let tte = self.tt.probe(hash);
        if let Some(e) = tte {
            if e.depth() >= depth {
                self.tthits += 1;
                let score = e.score(ply);
                match e.bound() {
                    ScoreBound::Exact => return score,
                    ScoreBound::BetaBound if score >= beta => return score,
                    ScoreBound::AlphaBound if score <= alpha => return score,
                    _ => {}
                }
            }
        }

        if self.is_draw(ply) {
            return DRAW_SCORE;
        }

        let eval = match tte {
            Some(e) if e.static_eval() != UNKNOWN_SCORE => e.static_eval(),
            Some(_) => {
                let v = static_eval(self.pos);
                self.tt.update_eval(hash, v);
                v
            }
            None => {
                let v = static_eval(self.pos);
                self.tt.record_eval(hash, v);
                v
            }
        };

        // horizon: no quiescence, the static eval stands
        if depth <= 0 || ply >= MAX_PLY - 1 {
            return eval;
        }

        // null-move pruning: hand the opponent a free move; if the reduced
        // search still fails high the node is safe to cut
        if self.allow_null[ply]
            && self.pos.checkers() == 0
            && !is_mate_score(beta)
            && eval >= beta
            && depth >= NULL_MOVE_MIN_DEPTH
            && self.pos.has_non_pawn_material(self.pos.side_to_move())
        {
            let mut do_null = true;
            // a stored upper bound below beta says the position is worse
            // than the null move would have to prove
            if let Some(e) = tte {
                if e.depth() >= depth - NULL_MOVE_PRUNING_DEPTH
                    && e.bound() != ScoreBound::BetaBound
                    && e.score(ply) < beta
                {
                    do_null = false;
                }
            }

            if do_null {
                self.allow_null[ply + 1] = false;
                let undo = self.pos.make_null_move();
                let score =
                    -self.alpha_beta(-beta, -beta + 1, depth - NULL_MOVE_PRUNING_DEPTH, ply + 1);
                self.pos.unmake_null_move(&undo);
                self.allow_null[ply + 1] = true;

                if score >= beta {
                    return if is_mate_score(score) { beta } else { score };
                }
            }
        }

        let mut list = MoveList::new();
        generate_legal(self.pos, &mut list);

        if list.is_empty() {
            let score = if self.pos.checkers() != 0 {
                -(MATE_SCORE - (ply as i32 + 1))
            } else {
                DRAW_SCORE
            };
            self.tt
                .record(hash, depth, score, eval, Move::NONE, ScoreBound::Exact, ply);
            return score;
        }

        if self.pos.halfmove_clock() >= 100 {
            return DRAW_SCORE;
        }

        // a fail-low entry's move is just the first move tried, not a best
        let hash_move = match tte {
            Some(e) if e.bound() != ScoreBound::AlphaBound => e.best_move(),
            _ => Move::NONE,
        };

        let first_move = list[0];
        let mut scored = ScoredMoves::new(list);
        self.picker.score_moves(self.pos, &mut scored, ply, hash_move);

        let mut pv_found = false;
        let mut best_move = Move::NONE;

        for idx in 0..scored.len() {
            let m = scored.pick_next(idx);
            let undo = self.pos.make_move(m);
            self.hash_list[self.game_ply + ply] = self.pos.hash();

            let score = if pv_found {
                let mut s = -self.alpha_beta(-(alpha + 1), -alpha, depth - 1, ply + 1);
                if s > alpha && s < beta {
                    s = -self.alpha_beta(-beta, -alpha, depth - 1, ply + 1);
                }
                s
            } else {
                -self.alpha_beta(-beta, -alpha, depth - 1, ply + 1)
            };

            self.pos.unmake_move(m, &undo);

            if score >= beta {
                self.picker
                    .register_cutoff(self.pos, &scored, idx, ply, depth);
                self.tt
                    .record(hash, depth, score, eval, m, ScoreBound::BetaBound, ply);
                return beta;
            }
            if score > alpha {
                alpha = score;
                pv_found = true;
                best_move = m;
            }
        }

        if !pv_found {
            best_move = first_move;
        }
        let bound = if pv_found {
            ScoreBound::Exact
        } else {
            ScoreBound::AlphaBound
        };
        self.tt.record(hash, depth, alpha, eval, best_move, bound, ply);
        alpha
    }

    /// Draw by insufficient material or repetition. Stalemate and the
    /// fifty-move rule are handled inside the node.
    pub fn is_draw(&self, ply: usize) -> bool {
        let pos = &self.pos;
        if pos.pawns(Color::White) | pos.pawns(Color::Black) == 0 {
            let heavy = pos.pieces(Piece::Rook, Color::White)
                | pos.pieces(Piece::Rook, Color::Black)
                | pos.pieces(Piece::Queen, Color::White)
                | pos.pieces(Piece::Queen, Color::Black);
            if heavy == 0 {
                if pos.occupied().count_ones() < 4 {
                    return true;
                }
                let knights = pos.pieces(Piece::Knight, Color::White)
                    | pos.pieces(Piece::Knight, Color::Black);
                if knights == 0 {
                    let bishops = pos.pieces(Piece::Bishop, Color::White)
                        | pos.pieces(Piece::Bishop, Color::Black);
                    if bishops & LIGHT_SQUARES == 0 || bishops & DARK_SQUARES == 0 {
                        return true;
                    }
                }
            }
        }

        // walk same-side positions back through the reversible window; the
        // current position sits at game_ply + ply - 1
        let here = self.game_ply as i64 + ply as i64 - 1;
        let stop = (here - pos.halfmove_clock() as i64).max(0);
        let mut reps = 1;
        let mut i = here - 2;
        while i >= stop {
            if self.hash_list[i as usize] == pos.hash() {
                reps += 1;
                if reps >= 3 {
                    return true;
                }
            }
            i -= 2;
        }
        false
    }

    /// Rebuild the principal variation by walking the table's best moves on
    /// a scratch copy of the position.
    fn extract_pv(&self, root_move: Move) -> String {
        let mut pv = root_move.to_string();
        let mut scratch = self.pos.clone();
        scratch.make_move(root_move);

        for _ in 0..MAX_PLY {
            let Some(e) = self.tt.probe(scratch.hash()) else {
                break;
            };
            let m = e.best_move();
            if m == Move::NONE {
                break;
            }
            // a key collision could smuggle in a foreign move
            let mut list = MoveList::new();
            generate_legal(&scratch, &mut list);
            if !list.contains(&m) {
                break;
            }
            pv.push(' ');
            pv.push_str(&m.to_string());
            scratch.make_move(m);
        }
        pv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::score::MATE_BOUND;
    use std::str::FromStr;

    fn run_search(fen: &str, depth: u32) -> (Move, i32, String) {
        let mut board = Board::from_str(fen).unwrap();
        let mut out = Vec::new();
        let hashes = vec![board.hash()];
        let mut searcher = Searcher::new(&mut board, &mut out, 16);
        let (m, score) = searcher.search(depth, &hashes);
        (m, score, String::from_utf8(out).unwrap())
    }

    #[test]
    fn finds_mate_in_one() {
        // back-rank: Ra1-a8 mates
        let (m, score, _) = run_search("6k1/5ppp/8/8/8/8/8/R3K3 w - - 0 1", 3);
        assert_eq!(m.to_string(), "a1a8");
        assert!(score >= MATE_BOUND, "score {}", score);
    }

    #[test]
    fn two_rooks_ladder_to_mate() {
        let (_, score, out) = run_search("7k/8/8/8/8/8/R7/1R5K w - - 0 1", 6);
        assert!(score >= MATE_BOUND, "score {}", score);
        assert!(out.contains("info depth"));
        assert!(out.contains(" pv "));
        assert!(out.contains("bestmove"));
    }

    #[test]
    fn takes_the_hanging_queen() {
        let (m, score, _) = run_search(
            "rnb1kbnr/pppp1ppp/8/4p1q1/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 0 3",
            4,
        );
        assert_eq!(m.to_string(), "f3g5");
        assert!(score > 5000);
    }

    #[test]
    fn insufficient_material_is_a_draw() {
        let mut board = Board::from_str("4k3/8/8/8/8/8/8/4KB2 w - - 0 1").unwrap();
        let searcher = Searcher::new(&mut board, Vec::new(), 8);
        assert!(searcher.is_draw(0));

        // opposite-colored bishops can still mate nobody: same-color only
        let mut board = Board::from_str("4k1b1/8/8/8/8/8/8/4KB2 w - - 0 1").unwrap();
        let searcher = Searcher::new(&mut board, Vec::new(), 8);
        // f1 is light, g8 is light
        assert!(searcher.is_draw(0));

        let mut board = Board::from_str("4kn2/8/8/8/8/8/8/4KB2 w - - 0 1").unwrap();
        let searcher = Searcher::new(&mut board, Vec::new(), 8);
        assert!(!searcher.is_draw(0));
    }

    #[test]
    fn repetition_in_the_game_history_draws() {
        let mut board = Board::new();
        let mut hashes = vec![board.hash()];

        // shuffle knights out and back twice: the third occurrence of the
        // start position arises inside the search history
        for mv_text in ["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8"] {
            let mut list = MoveList::new();
            generate_legal(&board, &mut list);
            let m = *list.iter().find(|m| m.to_string() == mv_text).unwrap();
            board.make_move(m);
            hashes.push(board.hash());
        }

        let mut searcher = Searcher::new(&mut board, Vec::new(), 8);
        searcher.hash_list = hashes.clone();
        searcher.hash_list.resize(hashes.len() + MAX_PLY, 0);
        searcher.game_ply = hashes.len();
        assert!(searcher.is_draw(0));
    }

    #[test]
    fn fifty_move_rule_draws_the_node() {
        let (_, score, _) = run_search("4k3/8/8/8/8/8/8/R3K3 w - - 100 80", 2);
        assert_eq!(score, DRAW_SCORE);
    }
}
