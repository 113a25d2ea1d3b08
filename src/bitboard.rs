use anyhow::{anyhow, Result};

use std::fmt;
use std::ops::{Deref, DerefMut, Not};
use std::sync::Arc;

use crate::{zobrist::ZobristKeys, HEIGHT, WIDTH};

pub mod static_masks {
    use crate::{HEIGHT, WIDTH};

    pub const fn bottom_mask() -> u64 {
        let mut mask = 0;
        let mut column = 0;
        while column < WIDTH {
            mask |= 1 << (column * (HEIGHT + 1));
            column += 1;
        }
        mask
    }
    pub const fn full_board_mask() -> u64 {
        bottom_mask() * ((1 << HEIGHT as u64) - 1)
    }
}

/// One of the two players, `First` being the player who moves on an empty board
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Player {
    First,
    Second,
}

impl Player {
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Player::First => 0,
            Player::Second => 1,
        }
    }

    #[inline]
    pub fn opponent(self) -> Self {
        match self {
            Player::First => Player::Second,
            Player::Second => Player::First,
        }
    }
}

impl Not for Player {
    type Output = Player;

    fn not(self) -> Self::Output {
        self.opponent()
    }
}

/// Returns a bitmap of the open cells that would complete an alignment of 4
/// for the owner of `position`
///
/// Cells outside the playing field (the guard bit on top of each column) are
/// masked out, so an alignment can never wrap from one column into the next.
pub fn winning_cells(position: u64, occupied: u64) -> u64 {
    // vertical
    // find the top ends of 3-alignemnts
    let mut r = (position << 1) & (position << 2) & (position << 3);

    // horizontal
    let mut p = (position << (HEIGHT + 1)) & (position << (2 * (HEIGHT + 1)));
    // find the right ends of 3-alignments
    r |= p & (position << (3 * (HEIGHT + 1)));
    // find holes of the type ...O O _ O...
    r |= p & (position >> (HEIGHT + 1));

    p = (position >> (HEIGHT + 1)) & (position >> (2 * (HEIGHT + 1)));
    // find the left ends of 3-alignments
    r |= p & (position >> (3 * (HEIGHT + 1)));
    // find holes of the type ...O _ O O...
    r |= p & (position << (HEIGHT + 1));

    // diagonal \
    p = (position << HEIGHT) & (position << (2 * HEIGHT));
    r |= p & (position << (3 * HEIGHT));
    r |= p & (position >> HEIGHT);

    p = (position >> HEIGHT) & (position >> (2 * HEIGHT));
    r |= p & (position >> (3 * HEIGHT));
    r |= p & (position << HEIGHT);

    // diagonal /
    p = (position << (HEIGHT + 2)) & (position << (2 * (HEIGHT + 2)));
    r |= p & (position << (3 * (HEIGHT + 2)));
    r |= p & (position >> (HEIGHT + 2));

    p = (position >> (HEIGHT + 2)) & (position >> (2 * (HEIGHT + 2)));
    r |= p & (position >> (3 * (HEIGHT + 2)));
    r |= p & (position << (HEIGHT + 2));

    r & static_masks::full_board_mask() & !occupied
}

/// A Connect 4 position
///
/// Each player's tiles are kept in their own bitmap. Bit `column * (HEIGHT + 1) + row`
/// is the cell in `column` at `row` (counted from the bottom); the extra bit on
/// top of every column is always empty.
///
/// The board also carries an incrementally updated Zobrist hash of its tiles,
/// and a count of the search nodes visited on it.
#[derive(Clone)]
pub struct BitBoard {
    // tiles of each player, indexed by `Player::index`
    stones: [u64; 2],
    hash: u64,
    nodes: u64,
    keys: Arc<ZobristKeys>,
}

impl BitBoard {
    pub fn new() -> Self {
        Self::with_keys(Arc::new(ZobristKeys::default()))
    }

    /// Creates an empty board hashing with the given key set
    pub fn with_keys(keys: Arc<ZobristKeys>) -> Self {
        Self {
            stones: [0, 0],
            hash: 0,
            nodes: 0,
            keys,
        }
    }

    /// Plays a sequence of 1-indexed columns, starting with `Player::First`
    pub fn from_moves<S: AsRef<str>>(moves: S) -> Result<Self> {
        let mut board = Self::new();

        for column_char in moves.as_ref().chars() {
            match column_char.to_digit(10).map(|c| c as usize) {
                Some(column @ 1..=WIDTH) => board.play_checked(column - 1)?,
                _ => return Err(anyhow!("could not parse '{}' as a valid move", column_char)),
            }
        }
        Ok(board)
    }

    /// Plays a sequence of 0-indexed columns, starting with `Player::First`
    pub fn from_slice(moves: &[usize]) -> Result<Self> {
        let mut board = Self::new();
        for &column in moves.iter() {
            if column >= WIDTH {
                return Err(anyhow!("Invalid move, column {} out of range", column));
            }
            board.play_checked(column)?;
        }
        Ok(board)
    }

    /// Creates a board from raw tile bitmaps, computing the hash from scratch
    pub fn from_masks(first: u64, second: u64) -> Self {
        Self::from_masks_with_keys(first, second, Arc::new(ZobristKeys::default()))
    }

    pub fn from_masks_with_keys(first: u64, second: u64, keys: Arc<ZobristKeys>) -> Self {
        let mut board = Self {
            stones: [first, second],
            hash: 0,
            nodes: 0,
            keys,
        };
        board.hash = board.compute_hash();
        board
    }

    fn play_checked(&mut self, column: usize) -> Result<()> {
        if !self.playable(column) {
            return Err(anyhow!("Invalid move, column {} full", column + 1));
        }
        let player = self.side_to_move();
        // abort if the position is won at any point
        if self.check_winning_move(column, player) {
            return Err(anyhow!("Invalid position, game is over"));
        }
        self.apply_move(self.move_in_column(column), player);
        Ok(())
    }

    pub fn top_mask(column: usize) -> u64 {
        1 << (column * (HEIGHT + 1) + (HEIGHT - 1))
    }

    pub fn bottom_mask(column: usize) -> u64 {
        1 << (column * (HEIGHT + 1))
    }

    pub fn column_mask(column: usize) -> u64 {
        ((1 << HEIGHT) - 1) << (column * (HEIGHT + 1))
    }

    pub fn column_from_move(move_bitmap: u64) -> usize {
        if move_bitmap == 0 {
            // WIDTH is always an invalid column
            return WIDTH;
        }
        move_bitmap.trailing_zeros() as usize / (HEIGHT + 1)
    }

    pub fn stones(&self, player: Player) -> u64 {
        self.stones[player.index()]
    }

    pub fn occupied(&self) -> u64 {
        self.stones[0] | self.stones[1]
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn num_moves(&self) -> usize {
        self.occupied().count_ones() as usize
    }

    pub fn num_stones(&self, player: Player) -> usize {
        self.stones(player).count_ones() as usize
    }

    /// The player to move if the game was started by `Player::First`
    pub fn side_to_move(&self) -> Player {
        if self.num_stones(Player::First) == self.num_stones(Player::Second) {
            Player::First
        } else {
            Player::Second
        }
    }

    /// Returns a bitmap with the lowest empty cell of every non-full column
    pub fn legal_moves(&self) -> u64 {
        (self.occupied() + static_masks::bottom_mask()) & static_masks::full_board_mask()
    }

    pub fn playable(&self, column: usize) -> bool {
        Self::top_mask(column) & self.occupied() == 0
    }

    /// The cell a tile dropped into `column` lands on, or 0 if the column is full
    pub fn move_in_column(&self, column: usize) -> u64 {
        self.legal_moves() & Self::column_mask(column)
    }

    /// Returns a bitmap of the legal moves that win immediately for `player`
    pub fn winning_moves(&self, player: Player) -> u64 {
        winning_cells(self.stones(player), self.occupied()) & self.legal_moves()
    }

    pub fn check_winning_move(&self, column: usize, player: Player) -> bool {
        self.winning_moves(player) & Self::column_mask(column) != 0
    }

    /// Toggles the tile at `move_bitmap` for `player`
    ///
    /// `move_bitmap` must be a single legal move; no check is made here.
    /// Applying the same move twice restores the previous position.
    #[inline]
    pub fn apply_move(&mut self, move_bitmap: u64, player: Player) {
        self.stones[player.index()] ^= move_bitmap;
        self.hash ^= self.keys.key(move_bitmap.trailing_zeros(), player);
    }

    #[inline]
    pub fn undo_move(&mut self, move_bitmap: u64, player: Player) {
        self.apply_move(move_bitmap, player);
    }

    /// Applies a move that is undone when the returned guard is dropped
    pub fn scoped_move(&mut self, move_bitmap: u64, player: Player) -> MoveGuard<'_> {
        self.apply_move(move_bitmap, player);
        MoveGuard {
            board: self,
            move_bitmap,
            player,
        }
    }

    /// Checks whether `player` has 4 tiles in a row
    pub fn is_aligned(&self, player: Player) -> bool {
        let pos = self.stones(player);

        // check horizontal alignment
        // mark all horizontal runs of 2
        let mut m = pos & (pos >> (HEIGHT + 1));
        // check for runs of 2 * (runs of 2)
        if m & (m >> (2 * (HEIGHT + 1))) != 0 {
            return true;
        }

        // check diagonal alignment 1
        m = pos & (pos >> HEIGHT);
        if m & (m >> (2 * HEIGHT)) != 0 {
            return true;
        }

        // check diagonal alignment 2
        m = pos & (pos >> (HEIGHT + 2));
        if m & (m >> (2 * (HEIGHT + 2))) != 0 {
            return true;
        }

        // check vertical alignment
        m = pos & (pos >> 1);
        if m & (m >> 2) != 0 {
            return true;
        }

        // no alignments
        false
    }

    /// Recomputes the hash from the tiles on the board
    pub fn compute_hash(&self) -> u64 {
        self.keys.hash_stones(self.stones[0], Player::First)
            ^ self.keys.hash_stones(self.stones[1], Player::Second)
    }

    /// The same position with the players' tiles exchanged
    pub fn swapped(&self) -> Self {
        Self::from_masks_with_keys(self.stones[1], self.stones[0], self.keys.clone())
    }

    /// Counts the move sequences of length `depth` from this position, with
    /// `player` to move. A winning move ends its sequence.
    pub fn perft(&mut self, player: Player, depth: usize) -> u64 {
        if depth == 0 {
            return 1;
        }
        let wins = self.winning_moves(player);
        let mut moves = self.legal_moves();
        let mut count = 0;
        while moves != 0 {
            let move_bitmap = moves & moves.wrapping_neg();
            moves ^= move_bitmap;

            if depth == 1 || move_bitmap & wins != 0 {
                count += 1;
            } else {
                let mut child = self.scoped_move(move_bitmap, player);
                count += child.perft(!player, depth - 1);
            }
        }
        count
    }

    /// The number of search nodes visited on this board (for diagnostics only)
    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    #[inline]
    pub(crate) fn count_node(&mut self) {
        self.nodes += 1;
    }
}

impl Default for BitBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for BitBoard {
    fn eq(&self, other: &Self) -> bool {
        self.stones == other.stones && self.hash == other.hash
    }
}

impl Eq for BitBoard {}

impl fmt::Debug for BitBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitBoard")
            .field("first", &format_args!("{:#x}", self.stones[0]))
            .field("second", &format_args!("{:#x}", self.stones[1]))
            .field("hash", &format_args!("{:#018x}", self.hash))
            .finish()
    }
}

/// A move applied to a borrowed board, undone when the guard goes out of scope
pub struct MoveGuard<'a> {
    board: &'a mut BitBoard,
    move_bitmap: u64,
    player: Player,
}

impl Deref for MoveGuard<'_> {
    type Target = BitBoard;

    fn deref(&self) -> &Self::Target {
        self.board
    }
}

impl DerefMut for MoveGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.board
    }
}

impl Drop for MoveGuard<'_> {
    fn drop(&mut self) {
        self.board.undo_move(self.move_bitmap, self.player);
    }
}
