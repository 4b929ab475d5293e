//! Line-oriented command loop driving the engine core: position setup,
//! move application, perft, evaluation and search, plus the file-driven
//! batch commands used for regression sweeps.

use meridian::board::{Board, START_FEN};
use meridian::moves::attacks;
use meridian::moves::movegen::generate_legal;
use meridian::moves::perft::{PerftHash, perft_divide};
use meridian::moves::types::{Move, MoveList};
use meridian::search::eval::Evaluator;
use meridian::search::search::Searcher;
use meridian::search::see::SeeExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

const NAME: &str = concat!("Meridian ", env!("CARGO_PKG_VERSION"));
const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
const MAGIC_CACHE: &str = "magic.bin";
const RULER: &str = "=============================================================";

struct Engine {
    board: Board,
    /// Keys of every position of the current game, the present one last.
    hash_list: Vec<u64>,
}

impl Engine {
    fn new() -> Engine {
        let board = Board::new();
        let hash_list = vec![board.hash()];
        Engine { board, hash_list }
    }

    fn set_board(&mut self, board: Board) {
        self.hash_list.clear();
        self.hash_list.push(board.hash());
        self.board = board;
    }

    fn find_move(&self, text: &str) -> Option<Move> {
        let mut list = MoveList::new();
        generate_legal(&self.board, &mut list);
        list.iter().copied().find(|m| m.to_string() == text)
    }

    fn apply_moves(&mut self, tokens: &[&str]) -> Result<(), String> {
        for &text in tokens {
            let m = self
                .find_move(text)
                .ok_or_else(|| format!("Unknown move: {}", text))?;
            self.board.make_move(m);
            self.hash_list.push(self.board.hash());
        }
        Ok(())
    }
}

fn main() {
    meridian::logger::init_logging("logs/meridian.log", "meridian=info");
    // building the sliding-piece tables dominates startup; cache them
    attacks::tables_with_cache(Path::new(MAGIC_CACHE));

    let mut engine = Engine::new();
    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }

        match tokens[0] {
            "uci" => {
                println!("id name {}", NAME);
                println!("id author the Meridian authors");
                println!("uciok");
            }
            "isready" => println!("readyok"),
            "ucinewgame" => engine.set_board(Board::new()),
            "position" => position(&mut engine, &tokens),
            "go" => {} // driven externally; nothing to do yet
            "stop" => {}
            "quit" => break,
            "d" => println!("{}", engine.board.pretty()),
            "moves" => moves(&engine),
            "move" => {
                if tokens.len() < 2 {
                    println!("No move specified");
                } else if let Err(e) = engine.apply_moves(&tokens[1..]) {
                    println!("{}", e);
                }
            }
            "eval" => print!("{}", Evaluator::new(&engine.board).breakdown()),
            "flip" => {
                let flipped = engine.board.flip();
                engine.set_board(flipped);
            }
            "SEE" => see(&engine, &tokens),
            "perft" => perft_cmd(&mut engine, &tokens),
            "bench" => batch(&mut engine, &tokens, Batch::Perft),
            "verify" => batch(&mut engine, &tokens, Batch::Verify),
            "testeval" => batch(&mut engine, &tokens, Batch::Eval),
            "testsearch" => test_search(&mut engine, &tokens),
            "search" => search(&mut engine, &tokens),
            other => println!("Unknown command: {}", other),
        }
    }
}

fn position(engine: &mut Engine, tokens: &[&str]) {
    if tokens.len() < 2 {
        println!("Usage: position (startpos | fen <fen> | kiwipete) [moves ...]");
        return;
    }

    let moves_at = tokens.iter().position(|&t| t == "moves");
    let fen = match tokens[1] {
        "startpos" => START_FEN.to_string(),
        "kiwipete" => KIWIPETE.to_string(),
        "fen" => tokens[2..moves_at.unwrap_or(tokens.len())].join(" "),
        other => {
            println!("Unknown token: {}", other);
            return;
        }
    };

    match fen.parse::<Board>() {
        Ok(board) => engine.set_board(board),
        Err(e) => {
            // a bad position leaves nothing sane to play from
            println!("FEN parse error: {}", e);
            std::process::exit(1);
        }
    }

    if let Some(at) = moves_at {
        if let Err(e) = engine.apply_moves(&tokens[at + 1..]) {
            println!("{}", e);
        }
    }
}

fn moves(engine: &Engine) {
    let mut list = MoveList::new();
    generate_legal(&engine.board, &mut list);
    for (i, m) in list.iter().enumerate() {
        if i > 0 {
            print!("{}", if i % 13 == 0 { "\n" } else { ", " });
        }
        print!("{}", m);
    }
    println!("\nTotal Size: {}", list.len());
}

fn see(engine: &Engine, tokens: &[&str]) {
    if tokens.len() != 2 {
        println!("Usage: SEE <move>");
        return;
    }
    match engine.find_move(tokens[1]) {
        Some(m) => println!("{}", engine.board.see(m)),
        None => println!("Unknown move: {}", tokens[1]),
    }
}

fn perft_cmd(engine: &mut Engine, tokens: &[&str]) {
    let Some(depth) = tokens.get(1).and_then(|t| t.parse::<u32>().ok()) else {
        println!("No depth provided");
        return;
    };
    let mut hash = match tokens.get(2).map(|t| t.parse::<u32>()) {
        Some(Ok(log2)) if log2 < 32 => Some(PerftHash::new(log2)),
        Some(_) => {
            println!("Bad hash size: {}", tokens[2]);
            return;
        }
        None => None,
    };

    let start = Instant::now();
    let mut out = io::stdout();
    let nodes = perft_divide(&mut engine.board, depth, hash.as_mut(), &mut out)
        .expect("stdout is writable");
    let ms = start.elapsed().as_millis().max(1);
    println!(
        "Took {} ms for {} nodes, {} KNPS",
        ms,
        nodes,
        nodes as u128 / ms
    );
}

fn search(engine: &mut Engine, tokens: &[&str]) {
    let (Some(depth), Some(log2_hash)) = (
        tokens.get(1).and_then(|t| t.parse::<u32>().ok()),
        tokens.get(2).and_then(|t| t.parse::<u32>().ok()),
    ) else {
        println!("Usage: search <depth> <log2-hash>");
        return;
    };
    if log2_hash >= 32 {
        println!("Too large hash size: {}", log2_hash);
        return;
    }
    let mut searcher = Searcher::new(&mut engine.board, io::stdout(), log2_hash);
    searcher.search(depth, &engine.hash_list);
}

/// One FEN per line; empty lines and `;` comments skipped.
fn read_fen_suite(path: &str) -> Result<Vec<String>, String> {
    let file = File::open(path).map_err(|e| format!("cannot open {}: {}", path, e))?;
    let mut fens = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| e.to_string())?;
        let line = line.trim();
        if line.len() < 10 || line.starts_with(';') {
            continue;
        }
        fens.push(line.to_string());
    }
    Ok(fens)
}

fn suite_progress(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("{pos}/{len} positions {wide_bar} {elapsed}")
            .expect("static template parses"),
    );
    bar
}

enum Batch {
    Perft,
    Verify,
    Eval,
}

fn batch(engine: &mut Engine, tokens: &[&str], kind: Batch) {
    if tokens.len() != 4 {
        println!(
            "Usage: {} <depth> <input filename (without spaces)> <output file>",
            tokens[0]
        );
        return;
    }
    let Ok(depth) = tokens[1].parse::<u32>() else {
        println!("Bad depth: {}", tokens[1]);
        return;
    };
    let fens = match read_fen_suite(tokens[2]) {
        Ok(f) => f,
        Err(e) => {
            println!("{}", e);
            return;
        }
    };
    let Ok(file) = File::create(tokens[3]) else {
        println!("Cannot create {}", tokens[3]);
        return;
    };
    let mut out = BufWriter::new(file);

    let bar = suite_progress(fens.len() as u64);
    let mut failures = 0u32;
    for (idx, fen_line) in fens.iter().enumerate() {
        let result = match kind {
            Batch::Perft => run_perft_position(engine, fen_line, depth, None, &mut out),
            Batch::Verify => {
                // the seventh whitespace field carries the expected count
                let expected = fen_line
                    .split_whitespace()
                    .nth(6)
                    .and_then(|t| t.parse::<u64>().ok());
                run_perft_position(engine, fen_line, depth, Some(expected), &mut out)
            }
            Batch::Eval => run_eval_position(engine, fen_line, depth, &mut out),
        };
        match result {
            Ok(ok) => {
                if !ok {
                    failures += 1;
                }
            }
            Err(e) => {
                let _ = writeln!(out, "Position #{}: {}", idx + 1, e);
                failures += 1;
            }
        }
        bar.inc(1);
    }
    bar.finish();
    let _ = out.flush();
    println!("Done, {} positions, {} failures", fens.len(), failures);
}

fn run_perft_position(
    engine: &mut Engine,
    fen_line: &str,
    depth: u32,
    expected: Option<Option<u64>>,
    out: &mut dyn Write,
) -> Result<bool, String> {
    let fen: String = fen_line
        .split_whitespace()
        .take(6)
        .collect::<Vec<_>>()
        .join(" ");
    let board: Board = fen.parse()?;
    engine.set_board(board);

    writeln!(out, "Position: {}", fen_line).map_err(|e| e.to_string())?;
    writeln!(out, "{}", RULER).map_err(|e| e.to_string())?;
    let start = Instant::now();
    let nodes =
        perft_divide(&mut engine.board, depth, None, out).map_err(|e| e.to_string())?;
    let ms = start.elapsed().as_millis().max(1);
    writeln!(
        out,
        "Took {} ms for {} nodes, {} KNPS",
        ms,
        nodes,
        nodes as u128 / ms
    )
    .map_err(|e| e.to_string())?;

    let mut ok = true;
    if let Some(expected) = expected {
        match expected {
            Some(want) if want == nodes => {}
            Some(want) => {
                ok = false;
                writeln!(out, "ERROR: Expected {} but got {} nodes.", want, nodes)
                    .map_err(|e| e.to_string())?;
            }
            None => {
                ok = false;
                writeln!(out, "ERROR: no expected node count on this line")
                    .map_err(|e| e.to_string())?;
            }
        }
    }
    writeln!(out, "{}\n", RULER).map_err(|e| e.to_string())?;
    Ok(ok)
}

/// Evaluate every position in the movegen tree to `depth`: the evaluator
/// must neither crash nor score a position differently from its mirror.
fn eval_tree(board: &mut Board, depth: u32, mismatches: &mut u64) -> u64 {
    let here = Evaluator::new(board).eval();
    if here != Evaluator::new(&board.flip()).eval() {
        *mismatches += 1;
    }
    if depth == 0 {
        return 1;
    }

    let mut list = MoveList::new();
    generate_legal(board, &mut list);
    let mut nodes = 1;
    for &m in &list {
        let undo = board.make_move(m);
        nodes += eval_tree(board, depth - 1, mismatches);
        board.unmake_move(m, &undo);
    }
    nodes
}

fn run_eval_position(
    engine: &mut Engine,
    fen_line: &str,
    depth: u32,
    out: &mut dyn Write,
) -> Result<bool, String> {
    let board: Board = fen_line.parse()?;
    engine.set_board(board);

    writeln!(out, "Position: {}", fen_line).map_err(|e| e.to_string())?;
    let start = Instant::now();
    let mut mismatches = 0;
    let nodes = eval_tree(&mut engine.board, depth, &mut mismatches);
    let ms = start.elapsed().as_millis().max(1);
    writeln!(
        out,
        "{} nodes in {} ms, {} symmetry mismatches",
        nodes, ms, mismatches
    )
    .map_err(|e| e.to_string())?;
    Ok(mismatches == 0)
}

fn test_search(engine: &mut Engine, tokens: &[&str]) {
    if tokens.len() != 5 {
        println!("Usage: testsearch <depth> <log2-hash> <input filename (without spaces)> <output file>");
        return;
    }
    let (Ok(depth), Ok(log2_hash)) = (tokens[1].parse::<u32>(), tokens[2].parse::<u32>())
    else {
        println!("Bad depth or hash size");
        return;
    };
    let fens = match read_fen_suite(tokens[3]) {
        Ok(f) => f,
        Err(e) => {
            println!("{}", e);
            return;
        }
    };
    let Ok(file) = File::create(tokens[4]) else {
        println!("Cannot create {}", tokens[4]);
        return;
    };
    let mut out = BufWriter::new(file);

    let bar = suite_progress(fens.len() as u64);
    let mut total_nodes = 0u64;
    let mut branching_sum = 0f64;
    let mut searched = 0u32;
    for (idx, fen_line) in fens.iter().enumerate() {
        let board: Board = match fen_line.parse() {
            Ok(b) => b,
            Err(e) => {
                let _ = writeln!(out, "Position #{}: {}", idx + 1, e);
                bar.inc(1);
                continue;
            }
        };
        engine.set_board(board);

        let _ = writeln!(out, "Position #{}: {}", idx + 1, fen_line);
        let _ = writeln!(out, "{}", RULER);
        let nodes = {
            let mut searcher = Searcher::new(&mut engine.board, &mut out, log2_hash);
            searcher.search(depth, &engine.hash_list);
            searcher.nodes()
        };
        total_nodes += nodes;
        let branching = (nodes as f64).powf(1.0 / depth.max(1) as f64);
        branching_sum += branching;
        searched += 1;
        let _ = writeln!(out, "Branching factor: {:.2}\n", branching);
        bar.inc(1);
    }
    bar.finish();

    let _ = writeln!(
        out,
        "\nTotal nodes: {}\tAverage branching factor: {:.2}",
        total_nodes,
        branching_sum / searched.max(1) as f64
    );
    let _ = out.flush();
    println!("Done");
}
