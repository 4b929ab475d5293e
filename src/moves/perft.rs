//! Perft: full-width legal-move tree counts, the generator's ground truth.

use crate::board::Board;
use crate::moves::movegen::generate_legal;
use crate::moves::types::MoveList;
use std::io::Write;
use tracing::instrument;

/// Node counts keyed by position and depth, packed as `nodes << 6 | depth`.
/// Power-of-two sized, keep-larger replacement.
pub struct PerftHash {
    entries: Vec<(u64, u64)>,
    mask: usize,
}

impl PerftHash {
    pub fn new(log2_size: u32) -> PerftHash {
        assert!(log2_size < 32, "perft hash of 2^{} entries is absurd", log2_size);
        PerftHash {
            entries: vec![(0, 0); 1usize << log2_size],
            mask: (1usize << log2_size) - 1,
        }
    }

    #[inline]
    fn lookup(&self, key: u64, depth: u32) -> Option<u64> {
        let (stored_key, data) = self.entries[key as usize & self.mask];
        if stored_key == key && (data & 63) as u32 == depth {
            Some(data >> 6)
        } else {
            None
        }
    }

    #[inline]
    fn store(&mut self, key: u64, depth: u32, nodes: u64) {
        debug_assert!(nodes < 1 << 58);
        let entry = &mut self.entries[key as usize & self.mask];
        if nodes >= entry.1 >> 6 {
            *entry = (key, (nodes << 6) | depth as u64);
        }
    }
}

fn perft_inner(board: &mut Board, depth: u32, hash: &mut Option<&mut PerftHash>) -> u64 {
    if let Some(h) = hash {
        if let Some(nodes) = h.lookup(board.hash(), depth) {
            return nodes;
        }
    }

    let mut list = MoveList::new();
    generate_legal(board, &mut list);
    if depth == 1 {
        return list.len() as u64;
    }

    let mut nodes = 0;
    for &m in &list {
        let undo = board.make_move(m);
        nodes += perft_inner(board, depth - 1, hash);
        board.unmake_move(m, &undo);
    }

    if let Some(h) = hash {
        h.store(board.hash(), depth, nodes);
    }
    nodes
}

/// Count leaf positions of the legal-move tree to `depth`.
#[instrument(skip(board), fields(depth))]
pub fn perft(board: &mut Board, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    perft_inner(board, depth, &mut None)
}

/// Perft accelerated by a transposition hash of `2^log2_size` entries.
#[instrument(skip(board), fields(depth, log2_size))]
pub fn perft_hashed(board: &mut Board, depth: u32, log2_size: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let mut hash = PerftHash::new(log2_size);
    perft_inner(board, depth, &mut Some(&mut hash))
}

/// Perft with one line of output per root move, plus the total.
pub fn perft_divide(
    board: &mut Board,
    depth: u32,
    hash: Option<&mut PerftHash>,
    out: &mut dyn Write,
) -> std::io::Result<u64> {
    let mut list = MoveList::new();
    generate_legal(board, &mut list);

    let mut hash = hash;
    let mut total = 0;
    for &m in &list {
        let undo = board.make_move(m);
        let nodes = if depth <= 1 {
            1
        } else {
            perft_inner(board, depth - 1, &mut hash.as_deref_mut())
        };
        board.unmake_move(m, &undo);
        writeln!(out, "{}: {}", m, nodes)?;
        total += nodes;
    }
    writeln!(out, "Total: {}", total)?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shallow_start_position() {
        let mut board = Board::new();
        assert_eq!(perft(&mut board, 0), 1);
        assert_eq!(perft(&mut board, 1), 20);
        assert_eq!(perft(&mut board, 2), 400);
        assert_eq!(perft(&mut board, 3), 8_902);
    }

    #[test]
    fn hashed_perft_agrees_with_plain() {
        let mut board = Board::new();
        assert_eq!(perft_hashed(&mut board, 4, 16), perft(&mut board, 4));
    }

    #[test]
    fn divide_sums_to_the_total() {
        let mut board = Board::new();
        let mut sink = Vec::new();
        let total = perft_divide(&mut board, 3, None, &mut sink).unwrap();
        assert_eq!(total, 8_902);
        let text = String::from_utf8(sink).unwrap();
        assert!(text.contains("e2e4: 600"));
        assert!(text.trim_end().ends_with("Total: 8902"));
    }
}
