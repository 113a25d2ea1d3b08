//! Pre-solved scores and moves for the opening positions
//!
//! A book is a text file with one record per line:
//!
//! ```text
//! <first player's tiles> <second player's tiles> <column> <score>
//! ```
//!
//! The tile bitmaps are unsigned decimal integers in the `BitBoard` layout, the
//! column is 0-indexed and the score is from the point of view of the player to
//! move. The player to move is implied by the game having been started by the
//! first player: it is the first player when both have placed the same number
//! of tiles. Records are only ever appended.

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

use std::collections::HashMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, LineWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{
    bitboard::{BitBoard, Player},
    move_ordering::{move_order, non_losing_moves},
    solver::{immediate_outcome, solve},
    transposition_table::TranspositionTable,
    WIDTH,
};

pub const BOOK_PATH: &str = "opening_book.txt";
pub const BOOK_DEPTH: usize = 8;

/// The record key of a position with `player` to move
///
/// Records are keyed by the tiles of the player who started the game. When the
/// game was started by the second player the tiles are swapped, so a position
/// matches both its own record and the record of its player-swapped mirror.
pub fn book_key(board: &BitBoard, player: Player) -> (u64, u64) {
    let mover = board.stones(player);
    let waiting = board.stones(!player);
    if mover.count_ones() == waiting.count_ones() {
        (mover, waiting)
    } else {
        (waiting, mover)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BookEntry {
    pub first: u64,
    pub second: u64,
    pub column: usize,
    pub score: i32,
}

impl fmt::Display for BookEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.first, self.second, self.column, self.score)
    }
}

impl FromStr for BookEntry {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut fields = line.split_whitespace();
        let mut next_field = |name: &str| {
            fields
                .next()
                .ok_or_else(|| anyhow!("missing {} in book record '{}'", name, line))
        };

        let entry = Self {
            first: next_field("first player's tiles")?.parse()?,
            second: next_field("second player's tiles")?.parse()?,
            column: next_field("column")?.parse()?,
            score: next_field("score")?.parse()?,
        };
        if fields.next().is_some() {
            return Err(anyhow!("trailing data in book record '{}'", line));
        }
        if entry.column >= WIDTH {
            return Err(anyhow!("column {} out of range in book record", entry.column));
        }
        Ok(entry)
    }
}

// a stale or foreign book can point at a full column
fn playable_entry(entry: BookEntry, board: &BitBoard) -> Option<BookEntry> {
    if board.playable(entry.column) {
        Some(entry)
    } else {
        warn!(
            "Ignoring book record '{}': column {} is full",
            entry, entry.column
        );
        None
    }
}

/// Scans the book at `path` for the position with `player` to move
///
/// A book that can't be opened is treated as having no entry, as is a record
/// whose column can't be played.
pub fn find_book_move<P: AsRef<Path>>(path: P, board: &BitBoard, player: Player) -> Option<BookEntry> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            warn!("Could not open opening book {}: {}", path.display(), err);
            return None;
        }
    };

    let key = book_key(board, player);
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("Error reading opening book {}: {}", path.display(), err);
                return None;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<BookEntry>() {
            Ok(entry) if (entry.first, entry.second) == key => {
                return playable_entry(entry, board)
            }
            Ok(_) => {}
            Err(err) => warn!("Skipping line {} of {}: {}", number + 1, path.display(), err),
        }
    }
    None
}

/// An opening book held in memory
#[derive(Clone, Default)]
pub struct OpeningBook(Arc<HashMap<(u64, u64), (usize, i32)>>);

impl OpeningBook {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_entries(read_entries(path.as_ref())?))
    }

    pub fn from_entries<I: IntoIterator<Item = BookEntry>>(entries: I) -> Self {
        Self(Arc::new(
            entries
                .into_iter()
                .map(|entry| ((entry.first, entry.second), (entry.column, entry.score)))
                .collect(),
        ))
    }

    pub fn get(&self, board: &BitBoard, player: Player) -> Option<BookEntry> {
        let (first, second) = book_key(board, player);
        self.0
            .get(&(first, second))
            .and_then(|&(column, score)| {
                playable_entry(
                    BookEntry {
                        first,
                        second,
                        column,
                        score,
                    },
                    board,
                )
            })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn read_entries(path: &Path) -> Result<Vec<BookEntry>> {
    let file = File::open(path)
        .with_context(|| format!("could not open opening book {}", path.display()))?;
    parse_entries(BufReader::new(file), path)
}

fn parse_entries<R: BufRead>(reader: R, path: &Path) -> Result<Vec<BookEntry>> {
    let mut entries = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(
            line.parse()
                .with_context(|| format!("line {} of {}", number + 1, path.display()))?,
        );
    }
    Ok(entries)
}

/// Writes the book for every position within a fixed number of moves of a root
///
/// Positions at the depth limit are solved outright. Shallower positions are
/// scored from their children, exploring every move that doesn't lose at once,
/// so the book covers every position a game can reach, not just best play.
pub struct BookBuilder<W: Write> {
    board: BitBoard,
    table: TranspositionTable,
    depth: usize,
    // positions already written, each is written once
    known: HashMap<(u64, u64), (usize, i32)>,
    writer: W,
    progress: ProgressBar,
}

impl BookBuilder<LineWriter<File>> {
    /// Opens the book at `path` for appending, creating it if needed
    ///
    /// Positions already in the book are not solved again, so an interrupted
    /// build picks up where it stopped. A last record cut short by the
    /// interruption is removed from the file.
    pub fn open<P: AsRef<Path>>(path: P, depth: usize, table: TranspositionTable) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("could not open opening book {}", path.display()))?;

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        let complete = contents
            .iter()
            .rposition(|&byte| byte == b'\n')
            .map_or(0, |newline| newline + 1);
        if complete < contents.len() {
            warn!(
                "Dropping unterminated record '{}' at the end of {}",
                String::from_utf8_lossy(&contents[complete..]),
                path.display()
            );
            file.set_len(complete as u64)?;
        }

        let existing = parse_entries(&contents[..complete], path)?;
        if !existing.is_empty() {
            info!(
                "Resuming from {} positions stored in {}",
                existing.len(),
                path.display()
            );
        }

        let mut builder = Self::new(LineWriter::new(file), depth, table);
        builder.known = existing
            .into_iter()
            .map(|entry| ((entry.first, entry.second), (entry.column, entry.score)))
            .collect();
        Ok(builder)
    }
}

impl<W: Write> BookBuilder<W> {
    pub fn new(writer: W, depth: usize, table: TranspositionTable) -> Self {
        Self {
            board: BitBoard::new(),
            table,
            depth,
            known: HashMap::new(),
            writer,
            progress: ProgressBar::hidden(),
        }
    }

    /// Shows a spinner counting the positions written
    pub fn with_progress(mut self) -> Result<Self> {
        let progress = ProgressBar::new_spinner();
        progress.set_style(ProgressStyle::with_template(
            "{spinner:.cyan} [{elapsed_precise}] {pos} positions written ({per_sec})",
        )?);
        progress.enable_steady_tick(Duration::from_millis(100));
        self.progress = progress;
        Ok(self)
    }

    /// Builds the book from `root` with `player` to move, returning the root's score
    pub fn build(&mut self, root: BitBoard, player: Player) -> Result<i32> {
        let start = Instant::now();
        self.board = root;

        let score = self.build_node(player, self.depth)?;
        self.writer.flush()?;
        self.progress.finish_and_clear();

        info!(
            "Opening book complete in {:.1}s: {} positions, root score {}",
            start.elapsed().as_secs_f64(),
            self.known.len(),
            score
        );
        Ok(score)
    }

    fn build_node(&mut self, player: Player, depth: usize) -> Result<i32> {
        let key = book_key(&self.board, player);
        if let Some(&(_, score)) = self.known.get(&key) {
            return Ok(score);
        }

        let (score, column) = match immediate_outcome(&self.board, player) {
            Some(outcome) => outcome,
            None if depth == 0 => {
                // leaf positions are unrelated to each other
                self.table.clear();
                solve(&mut self.board, &mut self.table, player, false)
            }
            None => self.explore(player, depth)?,
        };

        if let Some(column) = column {
            let entry = BookEntry {
                first: key.0,
                second: key.1,
                column,
                score,
            };
            writeln!(self.writer, "{}", entry)?;
            self.known.insert(key, (column, score));
            self.progress.inc(1);
        }
        Ok(score)
    }

    fn explore(&mut self, player: Player, depth: usize) -> Result<(i32, Option<usize>)> {
        let non_losing_moves = non_losing_moves(&self.board, self.board.legal_moves(), player);

        let mut best_score = i32::MIN;
        let mut best_move = None;
        for &column in move_order().iter() {
            let move_bitmap = non_losing_moves & BitBoard::column_mask(column);
            if move_bitmap == 0 {
                continue;
            }

            self.board.apply_move(move_bitmap, player);
            let result = self.build_node(!player, depth - 1);
            // restore the board before passing on any error
            self.board.undo_move(move_bitmap, player);

            let score = -result?;
            if score > best_score {
                best_score = score;
                best_move = Some(column);
            }
        }
        Ok((best_score, best_move))
    }

    /// The positions written so far, as an in-memory book
    pub fn book(&self) -> OpeningBook {
        OpeningBook(Arc::new(self.known.clone()))
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}
