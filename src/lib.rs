//! An exact solver for the board game 'Connect 4'
//!
//! This agent uses an alpha-beta game tree search, driven by a series of
//! null-window searches, to find the mathematically exact outcome of any
//! position together with a move that achieves it.
//!
//! # Basic Usage
//!
//! ```
//! use connect4_solver::{solver::Solver, bitboard::BitBoard};
//!
//!# use std::error::Error;
//!# fn main() -> Result<(), Box<dyn Error>> {
//! let board = BitBoard::from_moves("112233")?;
//! let player = board.side_to_move();
//! let mut solver = Solver::new(board, player);
//! let (score, best_move) = solver.solve();
//!
//! assert!((score, best_move) == (18, Some(3)));
//!# Ok(())
//!# }
//! ```

use static_assertions::*;
pub use anyhow;

pub mod mersenne_twister;

pub mod zobrist;

pub mod transposition_table;

pub mod bitboard;

pub mod move_ordering;

pub mod solver;

pub mod opening_book;


/// The width of the game board in tiles
pub const WIDTH: usize = 7;

/// The height of the game board in tiles
pub const HEIGHT: usize = 6;

/// The number of tiles each player places on a full board
pub const MAX_STONES: usize = WIDTH * HEIGHT / 2;

// ensure that the given dimensions fit in a u64 for the bitboard representation
const_assert!(WIDTH * (HEIGHT + 1) < 64);
// both players must place the same number of tiles on a full board
const_assert!((WIDTH * HEIGHT) % 2 == 0);
