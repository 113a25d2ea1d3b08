//! Checks the solver against files of positions with known scores
//!
//! Each line holds a position as its 1-indexed moves, a space, and the
//! expected score of the position for the player to move.

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::{Duration, Instant};

use connect4_solver::{
    bitboard::{BitBoard, Player},
    solver::Solver,
    transposition_table::TranspositionTable,
};

pub struct TestCase {
    pub moves: String,
    pub board: BitBoard,
    pub expected: i32,
}

pub fn parse_line(line: &str) -> Result<TestCase> {
    let mut test_data = line.split_whitespace();
    let moves = test_data
        .next()
        .ok_or_else(|| anyhow!("invalid test data: '{}'", line))?;
    let expected = test_data
        .next()
        .ok_or_else(|| anyhow!("invalid test data: '{}'", line))?
        .parse::<i32>()?;

    Ok(TestCase {
        moves: moves.to_string(),
        board: BitBoard::from_moves(moves)?,
        expected,
    })
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<TestCase>> {
    let path = path.as_ref();
    let file = BufReader::new(
        File::open(path).with_context(|| format!("could not open {}", path.display()))?,
    );

    let mut cases = Vec::new();
    for (number, line) in file.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        cases.push(
            parse_line(&line)
                .with_context(|| format!("line {} of {}", number + 1, path.display()))?,
        );
    }
    Ok(cases)
}

pub struct Outcome {
    pub moves: String,
    pub expected: i32,
    pub calculated: i32,
    pub nodes: u64,
    pub time: Duration,
}

/// Solves every case, the cases split into one run per worker thread, each
/// with its own solver and table
pub fn run(cases: &[TestCase], table_mb: usize, weak: bool) -> Result<Vec<Outcome>> {
    let progress = ProgressBar::new(cases.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("Solving positions: {bar:40.cyan/blue} {pos}/{len} ~{eta} remaining")?
            .progress_chars("█▓▒░  "),
    );

    let chunk_size = cases.len().div_ceil(rayon::current_num_threads()).max(1);
    let outcomes: Vec<Outcome> = cases
        .par_chunks(chunk_size)
        .flat_map_iter(|chunk| {
            let mut solver = Solver::new_with_transposition_table(
                BitBoard::new(),
                Player::First,
                TranspositionTable::with_megabytes(table_mb),
            );
            chunk
                .iter()
                .map(|case| {
                    let outcome = solve_case(&mut solver, case, weak);
                    progress.inc(1);
                    outcome
                })
                .collect::<Vec<_>>()
        })
        .collect();

    progress.finish();
    Ok(outcomes)
}

fn solve_case(solver: &mut Solver, case: &TestCase, weak: bool) -> Outcome {
    solver.reset(case.board.clone(), case.board.side_to_move());

    let start_time = Instant::now();
    let (calculated, _) = if weak {
        solver.solve_weak()
    } else {
        solver.solve()
    };
    let time = start_time.elapsed();

    Outcome {
        moves: case.moves.clone(),
        expected: if weak {
            case.expected.signum()
        } else {
            case.expected
        },
        calculated,
        nodes: solver.node_count(),
        time,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_benchmark_lines() -> Result<()> {
        let case = parse_line("2252576253462244111563365343671351441 -1")?;
        assert_eq!(case.moves, "2252576253462244111563365343671351441");
        assert_eq!(case.expected, -1);
        assert_eq!(case.board.num_moves(), 37);
        assert_eq!(case.board.side_to_move(), Player::Second);
        Ok(())
    }

    #[test]
    fn solves_every_case_in_order() -> Result<()> {
        let lines = [
            "33656231135372652256375256677427 3",
            "744626722466615567112422355 -3",
            "57742321764621141566743641634237 0",
            "412352531631415334355445147 6",
            "7133337275633646611517255772 -6",
        ];
        let cases = lines
            .iter()
            .map(|line| parse_line(line))
            .collect::<Result<Vec<_>>>()?;

        let outcomes = run(&cases, 1, false)?;
        assert_eq!(outcomes.len(), cases.len());
        for (outcome, case) in outcomes.iter().zip(cases.iter()) {
            assert_eq!(outcome.moves, case.moves);
            assert_eq!(outcome.calculated, outcome.expected);
        }

        let outcomes = run(&cases, 1, true)?;
        for (outcome, case) in outcomes.iter().zip(cases.iter()) {
            assert_eq!(outcome.expected, case.expected.signum());
            assert_eq!(outcome.calculated, outcome.expected);
        }
        assert!(run(&[], 1, false)?.is_empty());
        Ok(())
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_line("").is_err());
        assert!(parse_line("4455").is_err());
        assert!(parse_line("4455 x").is_err());
        assert!(parse_line("4485 0").is_err());
        assert!(parse_line("4444444 0").is_err());
    }
}
