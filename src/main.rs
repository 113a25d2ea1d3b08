use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use std::cmp::Ordering;
use std::io::{stdin, stdout, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use connect4_solver::{
    bitboard::{BitBoard, Player},
    opening_book::{find_book_move, BookBuilder, BOOK_DEPTH, BOOK_PATH},
    solver::Solver,
    transposition_table::{TranspositionTable, DEFAULT_TABLE_MB},
    WIDTH,
};

mod benchmark;
mod display;
use display::*;

#[derive(Parser, Debug)]
#[command(name = "connect4")]
#[command(about = "Solve, analyse or play the game of Connect 4")]
struct Cli {
    /// Transposition table size in megabytes
    #[arg(long, global = true, default_value_t = DEFAULT_TABLE_MB)]
    table_mb: usize,

    /// Opening book file
    #[arg(long, global = true, default_value = BOOK_PATH)]
    book: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a game in the terminal
    Play {
        /// Which players the AI controls
        #[arg(long, value_enum, default_value_t = AiPlayers::Second)]
        ai: AiPlayers,
    },
    /// Solve a position given as a sequence of 1-indexed columns
    Solve {
        #[arg(default_value = "")]
        moves: String,

        /// Only find out whether the position is won, drawn or lost
        #[arg(long)]
        weak: bool,
    },
    /// Check the solver against a file of positions with known scores
    Bench {
        file: PathBuf,

        /// Only compare whether positions are won, drawn or lost
        #[arg(long)]
        weak: bool,
    },
    /// Build (or resume building) the opening book
    Book {
        /// Number of moves covered by the book
        #[arg(long, default_value_t = BOOK_DEPTH)]
        depth: usize,

        /// Position to build the book from, as 1-indexed columns
        #[arg(long, default_value = "")]
        moves: String,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum AiPlayers {
    Nobody,
    First,
    Second,
    Both,
}

impl AiPlayers {
    fn controls(self, player: Player) -> bool {
        match self {
            AiPlayers::Nobody => false,
            AiPlayers::First => player == Player::First,
            AiPlayers::Second => player == Player::Second,
            AiPlayers::Both => true,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Play { ai } => play(&cli, *ai),
        Command::Solve { moves, weak } => solve(&cli, moves, *weak),
        Command::Bench { file, weak } => bench(&cli, file, *weak),
        Command::Book { depth, moves } => build_book(&cli, *depth, moves),
    }
}

fn play(cli: &Cli, ai_players: AiPlayers) -> Result<()> {
    let mut solver = Solver::new_with_transposition_table(
        BitBoard::new(),
        Player::First,
        TranspositionTable::with_megabytes(cli.table_mb),
    );
    let stdin = stdin();

    println!("Welcome to Connect 4\n");

    // stop consulting the book after the first miss
    let mut in_book = cli.book.exists();
    if !in_book {
        info!(
            "Opening book {} not found, expect early AI moves to take a long time",
            cli.book.display()
        );
    }

    // game loop
    loop {
        display(solver.board())?;

        match GameState::of(solver.board()) {
            GameState::Playing => {}
            GameState::Won(player) => {
                println!("Player {} wins!", player_number(player));
                break;
            }
            GameState::Draw => {
                println!("Draw!");
                break;
            }
        }

        let column = if ai_players.controls(solver.player()) {
            println!("AI is thinking...");
            stdout().flush()?;

            // slow down play if both players are AI
            if ai_players == AiPlayers::Both {
                std::thread::sleep(Duration::from_secs(3));
            }
            ai_move(&mut solver, &cli.book, &mut in_book)?
        } else {
            print!("Move input > ");
            stdout().flush()?;
            let mut input_str = String::new();
            if stdin.read_line(&mut input_str)? == 0 {
                // end of input
                return Ok(());
            }

            match input_str.trim().parse::<usize>() {
                Ok(column) if column < WIDTH => column,
                _ => {
                    println!(
                        "Invalid move '{}', columns must be between 0 and {}",
                        input_str.trim(),
                        WIDTH - 1
                    );
                    continue;
                }
            }
        };

        if let Err(err) = solver.play(column) {
            println!("{}", err);
            // try the move again
            continue;
        }
    }
    Ok(())
}

fn ai_move(solver: &mut Solver, book: &Path, in_book: &mut bool) -> Result<usize> {
    let player = solver.player();

    if *in_book {
        match find_book_move(book, solver.board(), player) {
            Some(entry) => {
                println!("Book move: {}", entry.column);
                return Ok(entry.column);
            }
            None => *in_book = false,
        }
    }

    let (score, best_move) = solver.solve();
    let best_move = best_move.ok_or_else(|| anyhow!("no move left to play"))?;

    let win_distance = solver.score_to_win_distance(score);
    let move_string = if win_distance == 1 { "move" } else { "moves" };
    match score.cmp(&0) {
        Ordering::Greater => println!(
            "Player {} can force a win in at most {} {}.",
            player_number(player),
            win_distance,
            move_string
        ),
        Ordering::Less => println!(
            "Player {} can force a win in at most {} {}.",
            player_number(!player),
            win_distance,
            move_string
        ),
        Ordering::Equal => println!(
            "Player {} can at best force a draw, {} {} remaining",
            player_number(player),
            win_distance,
            move_string
        ),
    }

    println!("Best move: {}", best_move);
    Ok(best_move)
}

fn solve(cli: &Cli, moves: &str, weak: bool) -> Result<()> {
    let board = BitBoard::from_moves(moves)?;
    let player = board.side_to_move();
    let mut solver = Solver::new_with_transposition_table(
        board,
        player,
        TranspositionTable::with_megabytes(cli.table_mb),
    );

    let start_time = Instant::now();
    let (score, best_move) = if weak {
        solver.solve_weak()
    } else {
        solver.solve()
    };
    let time = start_time.elapsed();

    match best_move {
        Some(column) => println!("Score: {}, best move: {}", score, column),
        None => println!("Score: {}, the board is full", score),
    }
    println!(
        "Time: {:.6}s, No. of positions: {}, kpos/s: {:.1}",
        time.as_secs_f64(),
        solver.node_count(),
        solver.node_count() as f64 / (1000.0 * time.as_secs_f64())
    );
    Ok(())
}

fn bench(cli: &Cli, file: &Path, weak: bool) -> Result<()> {
    let cases = benchmark::load(file)?;
    if cases.is_empty() {
        bail!("no positions in {}", file.display());
    }

    let outcomes = benchmark::run(&cases, cli.table_mb, weak)?;

    let mut mismatches = 0;
    for outcome in outcomes.iter().filter(|o| o.calculated != o.expected) {
        println!(
            "{}: expected {}, calculated {}",
            outcome.moves, outcome.expected, outcome.calculated
        );
        mismatches += 1;
    }

    let count = outcomes.len();
    println!(
        "{}\nMean time: {:.6}ms, Mean no. of positions: {}, kpos/s: {:.1}",
        file.display(),
        (outcomes.iter().map(|o| o.time).sum::<Duration>() / count as u32).as_secs_f64()
            * 1000.0,
        outcomes.iter().map(|o| o.nodes).sum::<u64>() as f64 / count as f64,
        outcomes
            .iter()
            .map(|o| o.nodes as f64 / o.time.as_secs_f64().max(f64::EPSILON))
            .sum::<f64>()
            / (1000.0 * count as f64)
    );

    if mismatches > 0 {
        bail!("{} of {} positions scored incorrectly", mismatches, count);
    }
    Ok(())
}

fn build_book(cli: &Cli, depth: usize, moves: &str) -> Result<()> {
    let root = BitBoard::from_moves(moves)?;
    let player = root.side_to_move();

    info!(
        "Building opening book {} to depth {}",
        cli.book.display(),
        depth
    );
    let mut builder =
        BookBuilder::open(&cli.book, depth, TranspositionTable::with_megabytes(cli.table_mb))?
            .with_progress()?;
    let score = builder.build(root, player)?;

    println!("Root score: {}", score);
    Ok(())
}
