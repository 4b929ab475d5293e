//! Static Exchange Evaluation: the material outcome of a capture sequence
//! where each side always recaptures with its least valuable attacker, with
//! x-ray attackers discovered as front pieces vacate the line.

use crate::bitboard::BitboardExt;
use crate::board::{Board, Color, Piece};
use crate::moves::attacks::{AttackTables, tables};
use crate::moves::types::Move;
use crate::search::score::{MATE_SCORE, exchange_value};
use crate::square::Square;

pub trait SeeExt {
    /// Millipawn balance of the exchange started by `m`, from the mover's
    /// point of view. Either side may stop recapturing when continuing
    /// loses material.
    fn see(&self, m: Move) -> i32;
}

/// Attackers of both colors to `sq`, seen through `occupied`.
fn attackers_to_occ(board: &Board, t: &AttackTables, sq: Square, occupied: u64) -> u64 {
    let white_pawns = t.pawn_attacks(Color::Black, sq) & board.pieces(Piece::Pawn, Color::White);
    let black_pawns = t.pawn_attacks(Color::White, sq) & board.pieces(Piece::Pawn, Color::Black);
    let knights = t.knight_attacks(sq)
        & (board.pieces(Piece::Knight, Color::White) | board.pieces(Piece::Knight, Color::Black));
    let kings = t.king_attacks(sq)
        & (board.pieces(Piece::King, Color::White) | board.pieces(Piece::King, Color::Black));
    let diag = t.bishop_attacks(sq, occupied)
        & (board.pieces(Piece::Bishop, Color::White)
            | board.pieces(Piece::Bishop, Color::Black)
            | board.pieces(Piece::Queen, Color::White)
            | board.pieces(Piece::Queen, Color::Black));
    let orth = t.rook_attacks(sq, occupied)
        & (board.pieces(Piece::Rook, Color::White)
            | board.pieces(Piece::Rook, Color::Black)
            | board.pieces(Piece::Queen, Color::White)
            | board.pieces(Piece::Queen, Color::Black));

    (white_pawns | black_pawns | knights | kings | diag | orth) & occupied
}

/// The cheapest attacker among `attackers` belonging to `side`.
fn least_valuable(board: &Board, attackers: u64, side: Color) -> (Square, Piece) {
    for piece in crate::board::ALL_PIECES {
        let subset = attackers & board.pieces(piece, side);
        if subset != 0 {
            return (Square::from_index(subset.lsb()), piece);
        }
    }
    unreachable!("least_valuable called with no attacker")
}

impl SeeExt for Board {
    fn see(&self, m: Move) -> i32 {
        if m.is_castling() {
            return 0;
        }
        let t = tables();
        let from = m.from_sq();
        let to = m.to_sq();
        let us = self.side_to_move();

        let mut gain = [0i32; 32];
        let mut occupied = self.occupied() ^ from.mask();

        if m.is_en_passant() {
            gain[0] = exchange_value(Piece::Pawn);
            occupied ^= to.behind(us.is_black()).mask();
        } else {
            match self.piece_type_at(to) {
                Some(Piece::King) => return MATE_SCORE,
                Some(victim) => gain[0] = exchange_value(victim),
                None => gain[0] = 0,
            }
        }

        let mut next_victim = self
            .piece_type_at(from)
            .expect("exchange starts from an occupied square");
        let mut stm = us.opposite();
        let mut attackers = attackers_to_occ(self, t, to, occupied);
        let mut d = 0usize;

        loop {
            let side_attackers = attackers & self.occupancy(stm);
            if side_attackers == 0 || d + 1 >= gain.len() {
                break;
            }
            let (att_sq, att_piece) = least_valuable(self, side_attackers, stm);

            // the king may only conclude an exchange on an undefended square
            if att_piece == Piece::King
                && attackers & self.occupancy(stm.opposite()) != 0
            {
                break;
            }

            d += 1;
            gain[d] = exchange_value(next_victim) - gain[d - 1];
            next_victim = att_piece;
            occupied ^= att_sq.mask();
            attackers = attackers_to_occ(self, t, to, occupied);
            stm = stm.opposite();
        }

        while d > 0 {
            gain[d - 1] = -std::cmp::max(-gain[d - 1], gain[d]);
            d -= 1;
        }
        gain[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::movegen::generate_legal;
    use crate::moves::types::MoveList;
    use crate::search::score::{KNIGHT_VALUE, PAWN_VALUE, ROOK_VALUE};
    use std::str::FromStr;

    fn find_move(board: &Board, text: &str) -> Move {
        let mut list = MoveList::new();
        generate_legal(board, &mut list);
        *list
            .iter()
            .find(|m| m.to_string() == text)
            .unwrap_or_else(|| panic!("move {} not legal in {}", text, board.to_fen()))
    }

    #[test]
    fn free_pawn_is_a_pawn() {
        let board = Board::from_str("4k3/8/8/4p3/8/8/4R3/4K3 w - - 0 1").unwrap();
        assert_eq!(board.see(find_move(&board, "e2e5")), PAWN_VALUE.mg);
    }

    #[test]
    fn rook_takes_defended_pawn_loses_the_rook() {
        let board = Board::from_str("3r4/8/8/3p4/8/8/3R4/3RK3 w - - 0 1").unwrap();
        // RxP, RxR, RxR: pawn + rook - rook for us, but the first rook is
        // gone: net pawn - rook + rook... the ladder ends level on rooks
        let value = board.see(find_move(&board, "d2d5"));
        assert_eq!(value, PAWN_VALUE.mg);
    }

    #[test]
    fn rook_takes_pawn_defended_twice_is_losing() {
        let board = Board::from_str("3r4/3r4/8/3p4/8/8/3R4/3K4 w - - 0 1").unwrap();
        let value = board.see(find_move(&board, "d2d5"));
        assert_eq!(value, PAWN_VALUE.mg - ROOK_VALUE.mg);
    }

    #[test]
    fn knight_takes_pawn_recaptured_and_traded_back() {
        // NxP, NxN, RxN: the exchange ends a clean pawn up
        let board = Board::from_str("k7/3n4/8/4p3/8/3N4/4R3/K7 w - - 0 1").unwrap();
        assert_eq!(board.see(find_move(&board, "d3e5")), PAWN_VALUE.mg);
    }

    #[test]
    fn deep_exchange_with_xrays() {
        // the full cascade runs NxP NxN RxN BxR; the queens never come in
        // because both sides stand pat once recapturing turns losing
        let board =
            Board::from_str("1k1r3q/1ppn3p/p4b2/4p3/8/P2N2P1/1PP1R1BP/2K1Q3 w - - 0 1")
                .unwrap();
        let value = board.see(find_move(&board, "d3e5"));
        assert_eq!(value, PAWN_VALUE.mg - KNIGHT_VALUE.mg);
    }

    #[test]
    fn en_passant_counts_the_captured_pawn() {
        let board = Board::from_str("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 2").unwrap();
        assert_eq!(board.see(find_move(&board, "e5d6")), PAWN_VALUE.mg);
    }

    #[test]
    fn king_cannot_recapture_a_defended_piece() {
        // NxP with the rook behind: the black king may not recapture, so
        // the exchange ends a pawn up
        let board = Board::from_str("8/8/3k4/3p4/8/2N5/8/3R3K w - - 0 1").unwrap();
        let value = board.see(find_move(&board, "c3d5"));
        assert_eq!(value, PAWN_VALUE.mg);
    }

    #[test]
    fn quiet_move_to_a_guarded_square_loses_the_piece() {
        let board = Board::from_str("4k3/4r3/8/8/8/8/3N4/3K4 w - - 0 1").unwrap();
        let value = board.see(find_move(&board, "d2e4"));
        assert_eq!(value, -KNIGHT_VALUE.mg);
    }
}
