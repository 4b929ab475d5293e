//! Full-width node counts against the published reference values. Any
//! generator defect shows up here as an exact-count mismatch.

use meridian::board::{Board, START_FEN};
use meridian::moves::perft::{perft, perft_hashed};
use std::str::FromStr;
use std::time::Instant;

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
const CPW_POSITION_3: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
const PROMOTION_HEAVY: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RQk w kq - 0 1";

fn expect_nodes(fen: &str, depth: u32, expected: u64) {
    let mut board = Board::from_str(fen).expect("reference FEN parses");
    let start = Instant::now();
    let nodes = perft(&mut board, depth);
    let secs = start.elapsed().as_secs_f64().max(1e-9);
    println!(
        "{} d{}: {} nodes, {:.0} knps",
        fen,
        depth,
        nodes,
        nodes as f64 / secs / 1000.0
    );
    assert_eq!(
        nodes, expected,
        "perft({}) mismatch for {}: got {}, expected {}",
        depth, fen, nodes, expected
    );
}

#[test]
fn startpos_shallow() {
    expect_nodes(START_FEN, 1, 20);
    expect_nodes(START_FEN, 2, 400);
    expect_nodes(START_FEN, 3, 8_902);
    expect_nodes(START_FEN, 4, 197_281);
}

#[test]
fn startpos_depth_5() {
    expect_nodes(START_FEN, 5, 4_865_609);
}

#[test]
#[ignore = "119M nodes; run with --ignored for the full sweep"]
fn startpos_depth_6() {
    expect_nodes(START_FEN, 6, 119_060_324);
}

#[test]
fn kiwipete_shallow() {
    expect_nodes(KIWIPETE, 1, 48);
    expect_nodes(KIWIPETE, 2, 2_039);
    expect_nodes(KIWIPETE, 3, 97_862);
}

#[test]
fn kiwipete_depth_4() {
    expect_nodes(KIWIPETE, 4, 4_085_603);
}

#[test]
fn cpw_position_3_depth_5() {
    expect_nodes(CPW_POSITION_3, 4, 43_238);
    expect_nodes(CPW_POSITION_3, 5, 674_624);
}

#[test]
fn promotion_heavy_depth_5() {
    expect_nodes(PROMOTION_HEAVY, 3, 53_392);
    expect_nodes(PROMOTION_HEAVY, 5, 15_833_292);
}

#[test]
fn hashed_perft_matches_plain() {
    let mut board = Board::from_str(KIWIPETE).unwrap();
    assert_eq!(perft_hashed(&mut board, 3, 18), 97_862);
    let mut board = Board::from_str(CPW_POSITION_3).unwrap();
    assert_eq!(perft_hashed(&mut board, 5, 18), 674_624);
}

#[test]
fn en_passant_and_promotion_micro_positions() {
    // immediate en passant for White
    let mut board = Board::from_str("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 2").unwrap();
    assert_eq!(perft(&mut board, 1), 7); // 5 king moves, e5e6, e5xd6 e.p.
    // promotion-ready pawn
    let mut board = Board::from_str("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
    assert_eq!(perft(&mut board, 1), 9); // 5 king moves + 4 promotions
}
