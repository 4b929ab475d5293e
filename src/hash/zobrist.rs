use once_cell::sync::OnceCell;
use rand::{RngCore, SeedableRng, rngs::StdRng};

/// Fixed seed so every run agrees on keys; positions hashed in one process
/// compare equal in the next (perft caches, recorded test keys).
const ZOBRIST_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

pub struct ZobristKeys {
    /// `[color][piece][square]` with {White=0, Black=1} and {P,N,B,R,Q,K}={0..5}
    pub piece: [[[u64; 64]; 6]; 2],
    /// XORed in when Black is to move.
    pub side_to_move: u64,
    /// Indexed by the whole 4-bit rights mask; toggle the old mask out and
    /// the new mask in on every rights change.
    pub castling: [u64; 16],
    /// Per-square en-passant keys (only rank 3/6 squares ever occur).
    pub en_passant: [u64; 64],
}

/// Global keys, initialized on first use.
pub fn zobrist_keys() -> &'static ZobristKeys {
    static KEYS: OnceCell<ZobristKeys> = OnceCell::new();
    KEYS.get_or_init(|| generate_keys(StdRng::seed_from_u64(ZOBRIST_SEED)))
}

fn generate_keys(mut rng: StdRng) -> ZobristKeys {
    #[inline]
    fn non_zero(r: &mut StdRng) -> u64 {
        // avoid zero keys to reduce degenerate collisions
        let mut v = r.next_u64();
        while v == 0 {
            v = r.next_u64();
        }
        v
    }

    let mut keys = ZobristKeys {
        piece: [[[0u64; 64]; 6]; 2],
        side_to_move: 0,
        castling: [0u64; 16],
        en_passant: [0u64; 64],
    };

    for color in 0..2 {
        for piece in 0..6 {
            for sq in 0..64 {
                keys.piece[color][piece][sq] = non_zero(&mut rng);
            }
        }
    }

    // Key 0 stands for "no rights" and must contribute nothing, so that an
    // empty rights mask hashes like the absence of the feature.
    for mask in 1..16 {
        keys.castling[mask] = non_zero(&mut rng);
    }

    for sq in 0..64 {
        keys.en_passant[sq] = non_zero(&mut rng);
    }

    keys.side_to_move = non_zero(&mut rng);
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_are_deterministic() {
        let a = zobrist_keys();
        let b = generate_keys(StdRng::seed_from_u64(ZOBRIST_SEED));
        assert_eq!(a.side_to_move, b.side_to_move);
        assert_eq!(a.piece[0][0][0], b.piece[0][0][0]);
        assert_eq!(a.piece[1][5][63], b.piece[1][5][63]);
        assert_eq!(a.castling[15], b.castling[15]);
    }

    #[test]
    fn keys_are_distinct() {
        let keys = zobrist_keys();
        let mut seen = HashSet::new();
        for color in 0..2 {
            for piece in 0..6 {
                for sq in 0..64 {
                    assert!(seen.insert(keys.piece[color][piece][sq]));
                }
            }
        }
        for mask in 1..16 {
            assert!(seen.insert(keys.castling[mask]));
        }
        for sq in 0..64 {
            assert!(seen.insert(keys.en_passant[sq]));
        }
        assert!(seen.insert(keys.side_to_move));
    }

    #[test]
    fn empty_rights_mask_is_silent() {
        assert_eq!(zobrist_keys().castling[0], 0);
    }
}
