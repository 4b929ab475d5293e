//! The static evaluator: material and piece-square scores, pawn structure,
//! piece activity, king safety, threats and passed pawns, tapered between
//! middlegame and endgame by remaining non-pawn material.
//!
//! Evaluation is exactly color-symmetric: for every position,
//! `static_eval(b) == static_eval(b.flip())`.

use crate::bitboard::{BitboardExt, FILE_MASK, RANK_MASK, forward_fill, full_fill, shift};
use crate::board::{Board, Color, Piece};
use crate::moves::attacks::{AttackTables, tables};
use crate::search::psqt::psqt;
use crate::search::score::*;
use crate::square::Square;
use crate::utils::pop_lsb;
use std::fmt::Write;

const COLORS: [Color; 2] = [Color::White, Color::Black];
const NON_PAWN_ATTACKERS: [Piece; 4] =
    [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen];

/// Evaluate `board` for the side to move (positive = good for it).
pub fn static_eval(board: &Board) -> i32 {
    Evaluator::new(board).eval()
}

pub struct Evaluator<'a> {
    board: &'a Board,
    t: &'static AttackTables,
    /// `attacks_by[color][piece]`, filled as the piece terms run.
    attacks_by: [[u64; 6]; 2],
    all_attacks: [u64; 2],
    mobility_area: [u64; 2],
    king_zone: [u64; 2],
    passed_pawns: [u64; 2],
    non_pawn_material: i32,
}

impl<'a> Evaluator<'a> {
    pub fn new(board: &'a Board) -> Evaluator<'a> {
        let t = tables();
        let mut ev = Evaluator {
            board,
            t,
            attacks_by: [[0; 6]; 2],
            all_attacks: [0; 2],
            mobility_area: [0; 2],
            king_zone: [0; 2],
            passed_pawns: [0; 2],
            non_pawn_material: 0,
        };

        let wp = board.pawns(Color::White);
        let bp = board.pawns(Color::Black);
        ev.attacks_by[0][Piece::Pawn as usize] = shift(wp, 9) | shift(wp, 7);
        ev.attacks_by[1][Piece::Pawn as usize] = shift(bp, -9) | shift(bp, -7);

        for us in COLORS {
            let them = us.opposite();
            ev.mobility_area[us as usize] = !board.occupancy(us)
                & !ev.attacks_by[them as usize][Piece::Pawn as usize];

            // the ring around the king, extended one rank toward the enemy
            let zone = t.king_attacks(board.king_square(us));
            ev.king_zone[us as usize] = zone
                | if us == Color::White {
                    zone << 8
                } else {
                    zone >> 8
                };
        }

        ev
    }

    pub fn eval(&mut self) -> i32 {
        let mut total = Score::ZERO;

        total += self.eval_pawns(Color::White) - self.eval_pawns(Color::Black);
        for pt in NON_PAWN_ATTACKERS {
            total += self.eval_pieces(Color::White, pt) - self.eval_pieces(Color::Black, pt);
        }
        total += self.eval_king_safety(Color::White) - self.eval_king_safety(Color::Black);
        total += self.eval_threats(Color::White) - self.eval_threats(Color::Black);
        total += self.eval_passed_pawns(Color::White) - self.eval_passed_pawns(Color::Black);

        interpolate(
            total,
            self.non_pawn_material,
            self.board.side_to_move().is_black(),
        )
    }

    fn eval_pawns(&mut self, us: Color) -> Score {
        let board = self.board;
        let t = self.t;
        let them = us.opposite();
        let black = us.is_black();
        let one: i32 = if black { -1 } else { 1 };
        let mut score = Score::ZERO;

        // backward pawns sit on files whose stop squares only the enemy's
        // pawns will ever control
        let uncovered = self.attacks_by[them as usize][Piece::Pawn as usize]
            & !forward_fill(self.attacks_by[us as usize][Piece::Pawn as usize], black);
        let backward = (board.pawns(us) & full_fill(uncovered)).count_ones() as i32;
        score -= BACKWARD_PAWN_PENALTY * backward;

        let mut pawns = board.pawns(us);
        while pawns != 0 {
            let sq = Square::from_index(pop_lsb(&mut pawns));
            let idx = sq.index() as usize;
            let file = sq.file() as usize;
            let rank = sq.rank() as usize;
            let rel_rank = rank ^ if black { 7 } else { 0 };
            let behind_rank = t.rank_ex[(idx as i32 - 8 * one) as usize];

            score += psqt(Piece::Pawn, sq, black);

            let doubled = board.pawns(us)
                & t.front_squares[us as usize][idx]
                & t.file_ex[idx]
                != 0;
            let isolated = board.pawns(us) & t.neighbouring_files[file] == 0;
            let connected =
                board.pawns(us) & (t.pawn_attacks(them, sq) | t.rank_ex[idx]) != 0;
            let weak = board.pawns(us) & behind_rank == 0 && rel_rank != 1;
            let passer = board.pawns(them) & t.passed_pawn[us as usize][idx] == 0;

            if doubled {
                score -= DOUBLED_PAWN_PENALTY[file];
            }
            if isolated {
                score -= ISOLATED_PAWN_PENALTY[file];
            }
            if connected {
                score += CONNECTED_PAWN_BONUS[rel_rank];
            }
            if weak && !isolated {
                score -= WEAK_PAWN_PENALTY;
            }
            if passer && !doubled {
                self.passed_pawns[us as usize] |= sq.mask();
            }
        }

        score
    }

    fn eval_pieces(&mut self, us: Color, pt: Piece) -> Score {
        let board = self.board;
        let t = self.t;
        let them = us.opposite();
        let black = us.is_black();
        let pt_index = pt as usize - 1;
        let mut score = Score::ZERO;

        let mut bb = board.pieces(pt, us);
        while bb != 0 {
            let sq = Square::from_index(pop_lsb(&mut bb));
            let idx = sq.index() as usize;

            score += psqt(pt, sq, black);
            self.non_pawn_material += PIECE_VALUE[pt as usize].mg;

            let attacks = match pt {
                Piece::Knight => t.knight_attacks(sq),
                Piece::Bishop => t.bishop_attacks(sq, board.occupied()),
                Piece::Rook => t.rook_attacks(sq, board.occupied()),
                Piece::Queen => t.queen_attacks(sq, board.occupied()),
                _ => unreachable!(),
            };
            self.attacks_by[us as usize][pt as usize] |= attacks;

            let mobility = (attacks & self.mobility_area[us as usize]).count_ones() as usize;
            score += MOBILITY_BONUS[pt_index][mobility];

            if matches!(pt, Piece::Knight | Piece::Bishop)
                && t.pawn_attack_span[us as usize][idx] & board.pawns(them) == 0
            {
                score += OUTPOST_BONUS[pt_index][sq.relative(black).index() as usize];
            }

            if pt == Piece::Rook && board.pawns(us) & t.file_ex[idx] == 0 {
                score += if board.pawns(them) & t.file_ex[idx] != 0 {
                    ROOK_ON_SEMI_OPEN_FILE
                } else {
                    ROOK_ON_OPEN_FILE
                };
            }
        }

        if pt == Piece::Bishop && board.pieces(pt, us).more_than_one() {
            score += BISHOP_PAIR_BONUS;
        }

        score
    }

    fn eval_king_safety(&mut self, us: Color) -> Score {
        let board = self.board;
        let t = self.t;
        let them = us.opposite();
        let black = us.is_black();
        let one: i32 = if black { -1 } else { 1 };
        let mut score = Score::ZERO;

        let ksq = board.king_square(us);
        let rank = ksq.rank() as i32;
        let file = ksq.file() as usize;

        // pawn shelter on the king's file and its neighbours, three ranks out
        let shelter_mask = FILE_MASK[file] | t.neighbouring_files[file];
        let our_pawns = board.pawns(us) & shelter_mask;
        let enemy_pawns = board.pawns(them) & shelter_mask;
        let rel_rank = rank ^ if black { 7 } else { 0 };

        if rel_rank <= 3 {
            let mut shelter = 0;
            for (step, own_weight, enemy_weight) in [(1, 192, 256), (2, 96, 128), (3, 48, 64)] {
                let ranks = RANK_MASK[(rank + step * one) as usize];
                shelter += (our_pawns & ranks).count_ones() as i32 * own_weight;
                shelter -= (enemy_pawns & ranks).count_ones() as i32 * enemy_weight;
            }
            score.mg += shelter;
        }

        // weighted attacks into the king zone; squares also covered by a
        // cheaper defender count half
        let zone = self.king_zone[us as usize];
        let mut attack_units = 0i32;
        let mut defended = self.attacks_by[us as usize][Piece::Pawn as usize]
            | self.attacks_by[us as usize][Piece::Knight as usize]
            | self.attacks_by[us as usize][Piece::Bishop as usize];
        self.all_attacks[us as usize] = defended;

        let mut count_attacks = move |defended: &mut u64, attacks: u64, weight: i32| -> i32 {
            let zone_hits = attacks & zone;
            let covered = *defended;
            *defended &= !zone_hits;
            zone_hits.count_ones() as i32 * weight
                - ((zone_hits & covered).count_ones() as i32 * weight) / 2
        };

        attack_units += count_attacks(
            &mut defended,
            self.attacks_by[them as usize][Piece::Knight as usize],
            KING_ATTACK_WEIGHT[0],
        );
        attack_units += count_attacks(
            &mut defended,
            self.attacks_by[them as usize][Piece::Bishop as usize],
            KING_ATTACK_WEIGHT[1],
        );

        defended |= self.attacks_by[us as usize][Piece::Rook as usize]
            | self.attacks_by[us as usize][Piece::Queen as usize];
        self.all_attacks[us as usize] |= defended;

        attack_units += count_attacks(
            &mut defended,
            self.attacks_by[them as usize][Piece::Rook as usize],
            KING_ATTACK_WEIGHT[2],
        );
        attack_units += count_attacks(
            &mut defended,
            self.attacks_by[them as usize][Piece::Queen as usize],
            KING_ATTACK_WEIGHT[3],
        );

        score.mg -= SAFETY_TABLE[attack_units.clamp(0, 99) as usize];
        score
    }

    fn eval_threats(&self, us: Color) -> Score {
        let board = self.board;
        let them = us.opposite();
        let mut score = Score::ZERO;

        let their_pawn_cover = self.attacks_by[them as usize][Piece::Pawn as usize];
        let their_piece_cover = self.attacks_by[them as usize][Piece::Knight as usize]
            | self.attacks_by[them as usize][Piece::Bishop as usize]
            | self.attacks_by[them as usize][Piece::Rook as usize]
            | self.attacks_by[them as usize][Piece::Queen as usize];
        let our_piece_attacks = self.attacks_by[us as usize][Piece::Knight as usize]
            | self.attacks_by[us as usize][Piece::Bishop as usize]
            | self.attacks_by[us as usize][Piece::Rook as usize]
            | self.attacks_by[us as usize][Piece::Queen as usize];

        let defended = board.occupancy(them) & their_pawn_cover;
        let undefended = board.occupancy(them) & !their_pawn_cover;
        let hanging = undefended & !their_piece_cover & our_piece_attacks;

        for (targets, defended_flag) in [(undefended, 0usize), (defended, 1usize)] {
            if targets == 0 {
                continue;
            }
            for attacker in NON_PAWN_ATTACKERS {
                let mut hits = targets & self.attacks_by[us as usize][attacker as usize];
                while hits != 0 {
                    let sq = Square::from_index(pop_lsb(&mut hits));
                    let victim = board
                        .piece_type_at(sq)
                        .expect("threat target is occupied");
                    score +=
                        THREAT_BONUS[defended_flag][attacker as usize - 1][victim as usize];
                }
            }
        }

        score += HANGING_BONUS * hanging.count_ones() as i32;
        score
    }

    fn eval_passed_pawns(&self, us: Color) -> Score {
        let board = self.board;
        let t = self.t;
        let them = us.opposite();
        let black = us.is_black();
        let one: i32 = if black { -1 } else { 1 };
        let mut score = Score::ZERO;

        let our_king_reach = t.king_attacks(board.king_square(us));
        let their_king_reach = t.king_attacks(board.king_square(them));

        let mut passers = self.passed_pawns[us as usize];
        while passers != 0 {
            let sq = Square::from_index(pop_lsb(&mut passers));
            let idx = sq.index() as usize;
            let rel_rank = (sq.rank() ^ if black { 7 } else { 0 }) as i32;
            // deep passers scale sharply
            let surge = rel_rank * rel_rank * if rel_rank > 3 { rel_rank } else { 1 };

            score += PASSED_PAWN_BONUS[rel_rank as usize];

            // a pawn-phalanx passer counts double
            if t.pawn_attacks(them, sq) & board.pawns(us) != 0 {
                score += PASSED_PAWN_BONUS[rel_rank as usize];
            }

            let path = t.front_squares[us as usize][idx] & t.file_ex[idx];
            score.eg -=
                PASSER_PATH_OWN_PIECE * (path & board.occupancy(us)).count_ones() as i32;
            score.eg -=
                PASSER_PATH_ENEMY_PIECE * (path & board.occupancy(them)).count_ones() as i32;

            if (self.all_attacks[us as usize] | our_king_reach) & sq.mask() != 0 {
                score += SUPPORTED_PASSER_BONUS;
            }
            if their_king_reach & sq.mask() != 0 {
                score -= SUPPORTED_PASSER_BONUS * 4;
            }
            if their_king_reach & t.king_attacks(sq) != 0 {
                score -= SUPPORTED_PASSER_BONUS * 2;
            }

            let push = Square::from_index((idx as i32 + 8 * one) as u8);
            match board.piece_at(push) {
                None => {
                    score += PASSER_NOT_BLOCKED * surge;
                    if self.all_attacks[them as usize] & push.mask() == 0 {
                        score += PASSER_CAN_ADVANCE * rel_rank;
                    }
                    if (self.all_attacks[them as usize] & !self.all_attacks[us as usize])
                        & path
                        == 0
                    {
                        score += PASSER_PATH_CLEAR * surge;
                    }
                }
                Some((color, _)) if color == us => {
                    score += PASSER_BLOCKED * surge;
                }
                _ => {}
            }
        }

        score
    }

    /// The per-term table printed by the `eval` command.
    pub fn breakdown(&mut self) -> String {
        let cp = |v: i32| format!("{:7.2}", v as f64 / 1000.0);
        let mut out = String::new();
        let mut total = Score::ZERO;

        writeln!(
            out,
            "        Entity      White       |      Black       |      Total"
        )
        .unwrap();
        writeln!(out, "{}", "=".repeat(70)).unwrap();

        let mut row = |out: &mut String, name: &str, s1: Score, s2: Score| {
            writeln!(
                out,
                "{:>14}: {} {} | {} {} | {} {}",
                name,
                cp(s1.mg),
                cp(s1.eg),
                cp(s2.mg),
                cp(s2.eg),
                cp(s1.mg - s2.mg),
                cp(s1.eg - s2.eg)
            )
            .unwrap();
        };

        let (s1, s2) = (self.eval_pawns(Color::White), self.eval_pawns(Color::Black));
        total += s1 - s2;
        row(&mut out, "Pawns", s1, s2);

        for (name, pt) in [
            ("Knights", Piece::Knight),
            ("Bishops", Piece::Bishop),
            ("Rooks", Piece::Rook),
            ("Queens", Piece::Queen),
        ] {
            let (s1, s2) = (
                self.eval_pieces(Color::White, pt),
                self.eval_pieces(Color::Black, pt),
            );
            total += s1 - s2;
            row(&mut out, name, s1, s2);
        }

        let (s1, s2) = (
            self.eval_king_safety(Color::White),
            self.eval_king_safety(Color::Black),
        );
        total += s1 - s2;
        row(&mut out, "King Safety", s1, s2);

        let (s1, s2) = (
            self.eval_threats(Color::White),
            self.eval_threats(Color::Black),
        );
        total += s1 - s2;
        row(&mut out, "Threats", s1, s2);

        let (s1, s2) = (
            self.eval_passed_pawns(Color::White),
            self.eval_passed_pawns(Color::Black),
        );
        total += s1 - s2;
        row(&mut out, "Passed Pawns", s1, s2);

        writeln!(out, "{}", "=".repeat(70)).unwrap();
        writeln!(out, "Total: {} {}", cp(total.mg), cp(total.eg)).unwrap();
        writeln!(out, "Non Pawn Material: {}", cp(self.non_pawn_material)).unwrap();
        writeln!(
            out,
            "Final Eval: {}",
            cp(interpolate(
                total,
                self.non_pawn_material,
                self.board.side_to_move().is_black()
            ))
        )
        .unwrap();
        out
    }
}
