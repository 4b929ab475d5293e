//! "Fancy" magic bitboards for the sliding pieces.
//!
//! For every square the relevant-occupancy mask (the sliding reach minus the
//! board rim) is hashed through `((occ & mask) * magic) >> shift` into a
//! per-square attack table. Magics are found by a seeded sparse-random
//! search and verified collision-free over every subset of the mask, so the
//! tables are identical on every run.

use crate::bitboard::{FILE_A, FILE_H, RANK_MASK};
use crate::utils::square_index;
use rand::{RngCore, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::path::Path;

const MAGIC_SEED: u64 = 0xD1CE_B01D_FACE_0FF5;

/// A single magic entry: hashing constants plus the attack table they index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagicEntry {
    pub magic: u64,
    pub shift: u32,
    pub mask: u64,
    pub table: Box<[u64]>,
}

impl MagicEntry {
    #[inline(always)]
    pub fn attacks(&self, occupancy: u64) -> u64 {
        let index = ((occupancy & self.mask).wrapping_mul(self.magic) >> self.shift) as usize;
        self.table[index]
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MagicTables {
    pub rook: Vec<MagicEntry>,
    pub bishop: Vec<MagicEntry>,
}

/// Scan one ray, invoking `on_square` until it returns false or the edge.
fn scan_ray<F>(mut rank: isize, mut file: isize, step: F, mut on_square: impl FnMut(usize) -> bool)
where
    F: Fn(isize, isize) -> (isize, isize),
{
    while (0..=7).contains(&rank) && (0..=7).contains(&file) {
        let sq = square_index(rank as usize, file as usize);
        if !on_square(sq) {
            break;
        }
        let (r, f) = step(rank, file);
        rank = r;
        file = f;
    }
}

/// Rook attacks from `square` over `blockers`, by ray scan. Ground truth for
/// the magic tables; also used to build them.
pub fn rook_attacks_slow(square: usize, blockers: u64) -> u64 {
    let rank = (square / 8) as isize;
    let file = (square % 8) as isize;
    let mut attacks = 0u64;

    let mut add = |sq: usize| {
        attacks |= 1 << sq;
        (blockers >> sq) & 1 == 0 // stop behind a blocker
    };

    scan_ray(rank + 1, file, |r, f| (r + 1, f), &mut add);
    scan_ray(rank - 1, file, |r, f| (r - 1, f), &mut add);
    scan_ray(rank, file + 1, |r, f| (r, f + 1), &mut add);
    scan_ray(rank, file - 1, |r, f| (r, f - 1), &mut add);
    attacks
}

/// Bishop attacks from `square` over `blockers`, by ray scan.
pub fn bishop_attacks_slow(square: usize, blockers: u64) -> u64 {
    let rank = (square / 8) as isize;
    let file = (square % 8) as isize;
    let mut attacks = 0u64;

    let mut add = |sq: usize| {
        attacks |= 1 << sq;
        (blockers >> sq) & 1 == 0
    };

    scan_ray(rank + 1, file + 1, |r, f| (r + 1, f + 1), &mut add);
    scan_ray(rank - 1, file - 1, |r, f| (r - 1, f - 1), &mut add);
    scan_ray(rank + 1, file - 1, |r, f| (r + 1, f - 1), &mut add);
    scan_ray(rank - 1, file + 1, |r, f| (r - 1, f + 1), &mut add);
    attacks
}

/// Relevant-occupancy mask: the empty-board reach minus the rim squares a
/// blocker on which cannot change the attack set.
fn relevant_mask(square: usize, rook: bool) -> u64 {
    let empty_reach = if rook {
        rook_attacks_slow(square, 0)
    } else {
        bishop_attacks_slow(square, 0)
    };
    let mut mask = empty_reach;
    if square % 8 != 0 {
        mask &= !FILE_A;
    }
    if square % 8 != 7 {
        mask &= !FILE_H;
    }
    if square / 8 != 0 {
        mask &= !RANK_MASK[0];
    }
    if square / 8 != 7 {
        mask &= !RANK_MASK[7];
    }
    mask
}

/// Next subset of `mask` in the Carry-Rippler enumeration; 0 closes the cycle.
#[inline(always)]
fn next_subset(mask: u64, subset: u64) -> u64 {
    subset.wrapping_sub(mask) & mask
}

/// All subsets of `mask`, starting from the empty set.
fn subsets(mask: u64) -> Vec<u64> {
    let mut out = Vec::with_capacity(1 << mask.count_ones());
    let mut subset = 0u64;
    loop {
        out.push(subset);
        subset = next_subset(mask, subset);
        if subset == 0 {
            break;
        }
    }
    out
}

/// Sparse random candidate; few set bits keep hash collisions unlikely.
#[inline]
fn sparse_u64(rng: &mut StdRng) -> u64 {
    rng.next_u64() & rng.next_u64() & rng.next_u64()
}

fn is_magic_valid(blockers: &[u64], attacks: &[u64], magic: u64, shift: u32, table: &mut [u64]) -> bool {
    table.fill(0);
    for (&occ, &attack) in blockers.iter().zip(attacks) {
        let index = (occ.wrapping_mul(magic) >> shift) as usize;
        if table[index] == 0 {
            table[index] = attack;
        } else if table[index] != attack {
            return false;
        }
    }
    true
}

fn find_magic_for_square(
    blockers: &[u64],
    attacks: &[u64],
    shift: u32,
    rng: &mut StdRng,
    table: &mut [u64],
) -> u64 {
    for _ in 0..100_000_000u64 {
        let magic = sparse_u64(rng);
        // a usable magic maps the high bits of the mask product densely
        if (blockers.last().unwrap().wrapping_mul(magic) >> 56).count_ones() < 6 {
            continue;
        }
        if is_magic_valid(blockers, attacks, magic, shift, table) {
            return magic;
        }
    }
    unreachable!("no magic found; the search space makes this practically impossible")
}

fn build_entries(rook: bool, rng: &mut StdRng) -> Vec<MagicEntry> {
    let mut entries = Vec::with_capacity(64);
    for square in 0..64 {
        let mask = relevant_mask(square, rook);
        let bits = mask.count_ones();
        let shift = 64 - bits;

        let blockers = subsets(mask);
        let attacks: Vec<u64> = blockers
            .iter()
            .map(|&occ| {
                if rook {
                    rook_attacks_slow(square, occ)
                } else {
                    bishop_attacks_slow(square, occ)
                }
            })
            .collect();

        let mut table = vec![0u64; 1 << bits];
        let magic = find_magic_for_square(&blockers, &attacks, shift, rng, &mut table);
        // rebuild cleanly; the last validation pass left the table filled
        is_magic_valid(&blockers, &attacks, magic, shift, &mut table);

        entries.push(MagicEntry {
            magic,
            shift,
            mask,
            table: table.into_boxed_slice(),
        });
    }
    entries
}

impl MagicTables {
    /// Search magics for all 128 square/piece combinations. Deterministic:
    /// the RNG seed is fixed.
    pub fn generate() -> MagicTables {
        let mut rng = StdRng::seed_from_u64(MAGIC_SEED);
        MagicTables {
            rook: build_entries(true, &mut rng),
            bishop: build_entries(false, &mut rng),
        }
    }

    #[inline(always)]
    pub fn rook_attacks(&self, square: usize, occupancy: u64) -> u64 {
        self.rook[square].attacks(occupancy)
    }

    #[inline(always)]
    pub fn bishop_attacks(&self, square: usize, occupancy: u64) -> u64 {
        self.bishop[square].attacks(occupancy)
    }

    #[inline(always)]
    pub fn queen_attacks(&self, square: usize, occupancy: u64) -> u64 {
        self.rook_attacks(square, occupancy) | self.bishop_attacks(square, occupancy)
    }

    /// Serialize the tables so a later startup can skip the magic search.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let bytes = bincode::serialize(self).map_err(|e| e.to_string())?;
        std::fs::write(path, bytes).map_err(|e| e.to_string())
    }

    pub fn load(path: &Path) -> Result<MagicTables, String> {
        let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
        let tables: MagicTables = bincode::deserialize(&bytes).map_err(|e| e.to_string())?;
        if tables.rook.len() != 64 || tables.bishop.len() != 64 {
            return Err("magic table file is truncated".to_string());
        }
        Ok(tables)
    }

    /// Load the cache if present and well formed, else generate and cache.
    pub fn load_or_generate(path: &Path) -> MagicTables {
        if let Ok(tables) = MagicTables::load(path) {
            return tables;
        }
        let tables = MagicTables::generate();
        let _ = tables.save(path);
        tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subset_enumeration_is_complete() {
        let mask = 0b1011u64;
        let subs = subsets(mask);
        assert_eq!(subs.len(), 8);
        for s in &subs {
            assert_eq!(s & !mask, 0);
        }
    }

    #[test]
    fn relevant_masks_exclude_rim() {
        // rook on d4: 10 relevant squares (6 on the file, 4 more on the rank)
        let mask = relevant_mask(27, true);
        assert_eq!(mask.count_ones(), 10);
        // corner rook: 12 relevant squares
        assert_eq!(relevant_mask(0, true).count_ones(), 12);
        // bishop on d4: 9 relevant squares
        assert_eq!(relevant_mask(27, false).count_ones(), 9);
    }

    #[test]
    fn magic_lookup_matches_scan() {
        let tables = MagicTables::generate();
        let square = 27; // d4
        let blockers = (1u64 << 19) | (1u64 << 35) | (1u64 << 41) | (1u64 << 21);

        assert_eq!(
            tables.rook_attacks(square, blockers),
            rook_attacks_slow(square, blockers)
        );
        assert_eq!(
            tables.bishop_attacks(square, blockers),
            bishop_attacks_slow(square, blockers)
        );
        assert_eq!(
            tables.queen_attacks(square, blockers),
            rook_attacks_slow(square, blockers) | bishop_attacks_slow(square, blockers)
        );
    }

    #[test]
    fn magic_lookup_exhaustive_on_one_square() {
        let tables = MagicTables::generate();
        let square = 36; // e5
        let mask = relevant_mask(square, true);
        for occ in subsets(mask) {
            assert_eq!(
                tables.rook_attacks(square, occ),
                rook_attacks_slow(square, occ)
            );
        }
    }
}
