//! Fully legal move generation. Pin restrictions, check evasions and the
//! en-passant discovered-check probe are resolved during generation, so the
//! output needs no legality filter pass.

use crate::bitboard::{BitboardExt, RANK_MASK, UNIVERSE, shift};
use crate::board::{Board, Color, Piece};
use crate::moves::attacks::{AttackTables, tables};
use crate::moves::types::{Move, MoveFlag, MoveList};
use crate::square::Square;
use crate::utils::pop_lsb;

/// Generate every legal move for the side to move into `list`.
pub fn generate_legal(board: &Board, list: &mut MoveList) {
    list.clear();
    let movegen = MoveGen::new(board);
    if board.checkers() != 0 {
        movegen.generate_evasions(list);
    } else {
        let target = !board.occupancy(board.side_to_move());
        movegen.generate_all(target, list);
        movegen.gen_king_moves(target, false, list);
        movegen.gen_pawn_moves(UNIVERSE, list);
    }
}

struct MoveGen<'a> {
    board: &'a Board,
    t: &'static AttackTables,
    us: Color,
    ksq: Square,
    not_pinned: u64,
}

impl<'a> MoveGen<'a> {
    fn new(board: &'a Board) -> MoveGen<'a> {
        let us = board.side_to_move();
        MoveGen {
            board,
            t: tables(),
            us,
            ksq: board.king_square(us),
            not_pinned: !board.pinned(),
        }
    }

    #[inline(always)]
    fn rq(&self) -> u64 {
        self.board.pieces(Piece::Rook, self.us) | self.board.pieces(Piece::Queen, self.us)
    }

    #[inline(always)]
    fn bq(&self) -> u64 {
        self.board.pieces(Piece::Bishop, self.us) | self.board.pieces(Piece::Queen, self.us)
    }

    fn generate_all(&self, target: u64, list: &mut MoveList) {
        self.gen_slider_moves(Piece::Rook, self.rq(), target, list);
        self.gen_slider_moves(Piece::Bishop, self.bq(), target, list);
        self.gen_knight_moves(target, list);
    }

    fn generate_evasions(&self, list: &mut MoveList) {
        let board = self.board;
        self.gen_king_moves(!board.occupancy(self.us), true, list);

        if board.checkers().more_than_one() {
            // double check: only the king may move
            return;
        }

        let checker = Square::from_index(board.checkers().lsb());
        let target = self.t.sq_between(self.ksq, checker) | checker.mask();
        self.gen_slider_moves(Piece::Rook, self.rq() & self.not_pinned, target, list);
        self.gen_slider_moves(Piece::Bishop, self.bq() & self.not_pinned, target, list);
        self.gen_knight_moves(target, list);
        self.gen_pawn_moves(target, list);
    }

    #[inline(always)]
    fn slider_attacks(&self, pt: Piece, from: Square) -> u64 {
        let occ = self.board.occupied();
        match pt {
            Piece::Rook => self.t.rook_attacks(from, occ),
            Piece::Bishop => self.t.bishop_attacks(from, occ),
            _ => unreachable!("not a slider ray kind"),
        }
    }

    /// `pt` selects the ray kind; `pieces` holds that kind plus the queens.
    fn gen_slider_moves(&self, pt: Piece, pieces: u64, target: u64, list: &mut MoveList) {
        let mut free = pieces & self.not_pinned;
        while free != 0 {
            let from = Square::from_index(pop_lsb(&mut free));
            add_moves(from, self.slider_attacks(pt, from) & target, list);
        }

        // a pinned slider stays on the line through its king
        let mut pinned = pieces & self.board.pinned();
        while pinned != 0 {
            let from = Square::from_index(pop_lsb(&mut pinned));
            let attacks =
                self.slider_attacks(pt, from) & target & self.t.line_between(from, self.ksq);
            add_moves(from, attacks, list);
        }
    }

    fn gen_knight_moves(&self, target: u64, list: &mut MoveList) {
        // a pinned knight has no legal moves at all
        let mut knights = self.board.pieces(Piece::Knight, self.us) & self.not_pinned;
        while knights != 0 {
            let from = Square::from_index(pop_lsb(&mut knights));
            add_moves(from, self.t.knight_attacks(from) & target, list);
        }
    }

    fn gen_king_moves(&self, target: u64, in_check: bool, list: &mut MoveList) {
        let board = self.board;
        let them = self.us.opposite();
        let mut king_attacks = self.t.king_attacks(self.ksq) & target;

        if in_check {
            // the squares behind the king on a checking slider's ray stay
            // attacked once the king steps off; drop them up front
            let mut sliders = board.checkers()
                & !(board.pieces(Piece::Pawn, them) | board.pieces(Piece::Knight, them));
            while sliders != 0 {
                let csq = Square::from_index(pop_lsb(&mut sliders));
                king_attacks &= !(self.t.line_between(self.ksq, csq) ^ csq.mask());
            }
        }

        while king_attacks != 0 {
            let to = Square::from_index(pop_lsb(&mut king_attacks));
            if board.is_attacked(to, self.us) {
                continue;
            }
            list.push(Move::new(self.ksq, to));
        }

        if in_check {
            return;
        }
        let black = self.us.is_black();
        if board.can_castle_kingside(self.us) {
            list.push(Move::new_flagged(
                Square::E1.relative(black),
                Square::G1.relative(black),
                MoveFlag::Castling,
            ));
        }
        if board.can_castle_queenside(self.us) {
            list.push(Move::new_flagged(
                Square::E1.relative(black),
                Square::C1.relative(black),
                MoveFlag::Castling,
            ));
        }
    }

    fn gen_pawn_moves(&self, target: u64, list: &mut MoveList) {
        let board = self.board;
        let us = self.us;
        let them = us.opposite();
        let black = us.is_black();
        let one: i32 = if black { -1 } else { 1 };

        let free = !board.occupied();
        let cap_squares = board.occupancy(them) & target;
        let rank7 = if black { RANK_MASK[1] } else { RANK_MASK[6] };
        let rank3 = if black { RANK_MASK[5] } else { RANK_MASK[2] };
        let rank8 = if black { RANK_MASK[0] } else { RANK_MASK[7] };
        let all_pawns = board.pawns(us);

        // Promotions. Pinned pawns never promote by push or plain capture;
        // the pinned-capture path below covers capturing a pinner on the
        // back rank.
        if target & rank8 != 0 {
            let pawns = all_pawns & rank7 & self.not_pinned;
            if pawns != 0 {
                add_promotions(pawns, 9 * one, cap_squares, list);
                add_promotions(pawns, 7 * one, cap_squares, list);
                add_promotions(pawns, 8 * one, free & target, list);
            }
        }

        let non_promo = all_pawns & !rank7;
        let movable = non_promo & self.not_pinned;
        add_pawn_captures(movable, 9 * one, cap_squares, list);
        add_pawn_captures(movable, 7 * one, cap_squares, list);

        if target == UNIVERSE {
            // pinned pawns: pushes stay on the king's file
            let pinned_pawns = all_pawns & board.pinned();
            let file_push = shift(pinned_pawns & !rank7, 8 * one)
                & free
                & self.t.file_ex[self.ksq.index() as usize];
            add_single_pawn_move(file_push, 8 * one, list);
            add_single_pawn_move(shift(file_push & rank3, 8 * one) & free, 16 * one, list);

            // pinned captures land on the diagonal through the king; pawns
            // beside or behind the king can never capture legally
            let capturers = pinned_pawns & self.t.front_squares[us as usize][self.ksq.index() as usize];
            debug_assert!(capturers.count_ones() <= 3);
            add_pinned_pawn_capture(
                shift(capturers, 7 * one)
                    & cap_squares
                    & self.t.adiag_ex[self.ksq.index() as usize],
                7 * one,
                rank8,
                list,
            );
            add_pinned_pawn_capture(
                shift(capturers, 9 * one)
                    & cap_squares
                    & self.t.diag_ex[self.ksq.index() as usize],
                9 * one,
                rank8,
                list,
            );
        }

        // pushes
        let b1 = shift(movable, 8 * one) & free;
        let b2 = shift(b1 & rank3, 8 * one) & free;
        let mut push = b1 & target;
        while push != 0 {
            let to = pop_lsb(&mut push);
            list.push(Move::new(
                Square::from_index((to as i32 - 8 * one) as u8),
                Square::from_index(to),
            ));
        }
        let mut push = b2 & target;
        while push != 0 {
            let to = pop_lsb(&mut push);
            list.push(Move::new(
                Square::from_index((to as i32 - 16 * one) as u8),
                Square::from_index(to),
            ));
        }

        // En passant. In check it must capture the checking pawn or block
        // the ray; the slider probe below is the final arbiter either way.
        if let Some(ep) = board.en_passant() {
            let cap_sq = ep.behind(black);
            if target & (cap_sq.mask() | ep.mask()) == 0 {
                return;
            }
            let their_rq =
                board.pieces(Piece::Rook, them) | board.pieces(Piece::Queen, them);
            let their_bq =
                board.pieces(Piece::Bishop, them) | board.pieces(Piece::Queen, them);

            let mut candidates = non_promo & self.t.pawn_attacks(them, ep);
            while candidates != 0 {
                let from = Square::from_index(pop_lsb(&mut candidates));
                // verify no slider sees the king once both pawns are gone
                let occ =
                    (board.occupied() ^ from.mask() ^ cap_sq.mask()) | ep.mask();
                if self.t.rook_attacks(self.ksq, occ) & their_rq == 0
                    && self.t.bishop_attacks(self.ksq, occ) & their_bq == 0
                {
                    list.push(Move::new_flagged(from, ep, MoveFlag::EnPassant));
                }
            }
        }
    }
}

#[inline(always)]
fn add_moves(from: Square, mut attacks: u64, list: &mut MoveList) {
    while attacks != 0 {
        let to = pop_lsb(&mut attacks);
        list.push(Move::new(from, Square::from_index(to)));
    }
}

fn add_promotions(pawns: u64, dir: i32, target: u64, list: &mut MoveList) {
    let mut landing = shift(pawns, dir) & target;
    while landing != 0 {
        let to = Square::from_index(pop_lsb(&mut landing));
        let from = Square::from_index((to.index() as i32 - dir) as u8);
        list.push(Move::new_promotion(from, to, Piece::Queen));
        list.push(Move::new_promotion(from, to, Piece::Knight));
        list.push(Move::new_promotion(from, to, Piece::Rook));
        list.push(Move::new_promotion(from, to, Piece::Bishop));
    }
}

fn add_pawn_captures(pawns: u64, dir: i32, target: u64, list: &mut MoveList) {
    let mut landing = shift(pawns, dir) & target;
    while landing != 0 {
        let to = pop_lsb(&mut landing);
        list.push(Move::new(
            Square::from_index((to as i32 - dir) as u8),
            Square::from_index(to),
        ));
    }
}

/// At most one pinned pawn can push onto the king's file.
fn add_single_pawn_move(b: u64, dir: i32, list: &mut MoveList) {
    debug_assert!(!b.more_than_one());
    if b != 0 {
        let to = b.lsb();
        list.push(Move::new(
            Square::from_index((to as i32 - dir) as u8),
            Square::from_index(to),
        ));
    }
}

fn add_pinned_pawn_capture(b: u64, dir: i32, rank8: u64, list: &mut MoveList) {
    debug_assert!(!b.more_than_one());
    if b == 0 {
        return;
    }
    let to = Square::from_index(b.lsb());
    let from = Square::from_index((to.index() as i32 - dir) as u8);
    if b & rank8 != 0 {
        list.push(Move::new_promotion(from, to, Piece::Queen));
        list.push(Move::new_promotion(from, to, Piece::Knight));
        list.push(Move::new_promotion(from, to, Piece::Rook));
        list.push(Move::new_promotion(from, to, Piece::Bishop));
    } else {
        list.push(Move::new(from, to));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::types::MoveList;

    fn moves_of(fen: &str) -> Vec<String> {
        let board: Board = fen.parse().unwrap();
        let mut list = MoveList::new();
        generate_legal(&board, &mut list);
        let mut out: Vec<String> = list.iter().map(|m| m.to_string()).collect();
        out.sort();
        out
    }

    #[test]
    fn start_position_has_twenty_moves() {
        assert_eq!(moves_of(crate::board::START_FEN).len(), 20);
    }

    #[test]
    fn pinned_knight_is_frozen() {
        // knight d2 pinned by the rook on d8
        let moves = moves_of("3r4/8/8/7k/8/8/3N4/3K4 w - - 0 1");
        assert!(!moves.is_empty());
        assert!(moves.iter().all(|m| !m.starts_with("d2")));
    }

    #[test]
    fn pinned_rook_slides_on_the_pin_line() {
        // rook e4 pinned by the rook on e8: may slide the e-file only
        let moves = moves_of("4r3/7k/8/8/4R3/8/8/4K3 w - - 0 1");
        let rook_moves: Vec<_> = moves.iter().filter(|m| m.starts_with("e4")).collect();
        assert_eq!(rook_moves.len(), 6); // e2, e3, e5, e6, e7, e8
        assert!(rook_moves.iter().all(|m| m.as_bytes()[2] == b'e'));
    }

    #[test]
    fn double_check_forces_the_king() {
        // rook e8 and bishop h4 both give check
        let moves = moves_of("k3r3/8/8/8/7b/8/8/4K3 w - - 0 1");
        assert!(!moves.is_empty());
        assert!(moves.iter().all(|m| m.starts_with("e1")));
    }

    #[test]
    fn check_can_be_blocked_or_captured() {
        // rook e8 checks; Re2 blocks, the king steps aside
        let moves = moves_of("4r1k1/8/8/8/8/8/R7/4K3 w - - 0 1");
        assert!(moves.contains(&"a2e2".to_string()));
        assert!(moves.contains(&"e1d1".to_string()));
        assert!(moves.contains(&"e1f1".to_string()));
        // stepping straight back along the ray is illegal
        assert!(!moves.contains(&"e1e2".to_string()));
    }

    #[test]
    fn king_cannot_retreat_along_the_check_ray() {
        let moves = moves_of("8/8/8/8/3k4/8/8/3K3r w - - 0 1");
        assert!(moves.contains(&"d1d2".to_string()));
        assert!(!moves.contains(&"d1a1".to_string()));
        assert!(!moves.contains(&"d1b1".to_string()));
        assert!(!moves.contains(&"d1c1".to_string()));
    }

    #[test]
    fn en_passant_discovered_check_is_vetoed() {
        // dxe6 e.p. would expose the king on the fifth rank to the h5 rook
        let moves = moves_of("8/8/8/K2Pp2r/8/8/8/7k w - e6 0 1");
        assert!(moves.contains(&"d5d6".to_string()));
        assert!(!moves.contains(&"d5e6".to_string()));
    }

    #[test]
    fn en_passant_capture_of_a_checking_pawn() {
        // black just played d7d5+; exd6 e.p. removes the checker
        let moves = moves_of("8/8/8/3pP3/4K3/8/8/7k w - d6 0 1");
        assert!(moves.contains(&"e5d6".to_string()));
    }

    #[test]
    fn promotions_come_in_four_flavours() {
        let moves = moves_of("4k3/P7/8/8/8/8/8/4K3 w - - 0 1");
        for suffix in ["q", "n", "r", "b"] {
            assert!(moves.contains(&format!("a7a8{}", suffix)));
        }
    }

    #[test]
    fn promotion_can_capture_a_rank8_checker() {
        // knight d8 checks the king on c6; cxd8=Q is the only capture
        let moves = moves_of("3n4/2P5/2K5/8/8/8/8/7k w - - 0 1");
        assert!(moves.contains(&"c7d8q".to_string()));
        assert!(moves.contains(&"c7d8n".to_string()));
    }

    #[test]
    fn castling_generation() {
        let moves = moves_of("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        assert!(moves.contains(&"e1g1".to_string()));
        assert!(moves.contains(&"e1c1".to_string()));

        // black to move mirrors it
        let moves = moves_of("r3k2r/8/8/8/8/8/8/R3K2R b KQkq - 0 1");
        assert!(moves.contains(&"e8g8".to_string()));
        assert!(moves.contains(&"e8c8".to_string()));
    }

    #[test]
    fn castling_through_attack_is_illegal() {
        // rook f8 guards f1: no kingside castling, queenside fine
        let moves = moves_of("5r1k/8/8/8/8/8/8/R3K2R w KQ - 0 1");
        assert!(!moves.contains(&"e1g1".to_string()));
        assert!(moves.contains(&"e1c1".to_string()));
    }

    #[test]
    fn castling_with_attacked_b1_is_legal() {
        // only b1 is covered; queenside castling does not cross it
        let moves = moves_of("1r5k/8/8/8/8/8/8/R3K3 w Q - 0 1");
        assert!(moves.contains(&"e1c1".to_string()));
    }

    #[test]
    fn pinned_pawn_moves() {
        // pawn e2 pinned on the e-file: may push once or twice, not capture
        let moves = moves_of("4r2k/8/8/8/8/5p2/4P3/4K3 w - - 0 1");
        assert!(moves.contains(&"e2e3".to_string()));
        assert!(moves.contains(&"e2e4".to_string()));
        assert!(!moves.contains(&"e2f3".to_string()));

        // pawn d2 pinned on the c3-e1 diagonal: may capture the pinner only
        let moves = moves_of("4k3/8/8/8/8/2b5/3P4/4K3 w - - 0 1");
        assert!(moves.contains(&"d2c3".to_string()));
        assert!(!moves.contains(&"d2d3".to_string()));
        assert!(!moves.contains(&"d2d4".to_string()));
    }
}
