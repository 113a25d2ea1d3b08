//! Threat analysis and move ordering for the tree search

use crate::{
    bitboard::{winning_cells, BitBoard, Player},
    WIDTH,
};

/// Ranking given to the best move remembered by the transposition table,
/// above any alignment count
const TABLE_HINT_SCORE: i32 = 1000;

/// Returns the columns ordered from the middle outwards, left before right,
/// as the middle columns are part of more alignments
pub const fn move_order() -> [usize; WIDTH] {
    let mut move_order = [0; WIDTH];
    let mut i = 0;
    while i < WIDTH {
        move_order[i] = (WIDTH / 2) + (1 - i % 2) * (i / 2) - (i % 2) * (i / 2 + 1);
        i += 1;
    }
    move_order
}

/// A fixed-capacity list of moves, yielded best score first
pub struct MoveSorter {
    size: usize,
    // move bitmap, column and score
    moves: [(u64, usize, i32); WIDTH],
}

impl MoveSorter {
    pub fn new() -> Self {
        Self {
            size: 0,
            moves: [(0, 0, 0); WIDTH],
        }
    }

    /// Inserts a move; among equal scores the move pushed last is yielded first
    pub fn push(&mut self, new_move: u64, column: usize, score: i32) {
        let mut pos = self.size;
        self.size += 1;
        while pos != 0 && self.moves[pos - 1].2 > score {
            self.moves[pos] = self.moves[pos - 1];
            pos -= 1;
        }
        self.moves[pos] = (new_move, column, score);
    }
}

impl Default for MoveSorter {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for MoveSorter {
    type Item = (u64, usize);

    fn next(&mut self) -> Option<Self::Item> {
        match self.size {
            0 => None,
            _ => {
                self.size -= 1;
                Some((self.moves[self.size].0, self.moves[self.size].1))
            }
        }
    }
}

/// Filters `moves` down to those that don't give the opponent an immediate win
///
/// Returns 0 when the opponent threatens two cells at once, or when every
/// move either leaves a threat open or fills the cell below one.
pub fn non_losing_moves(board: &BitBoard, moves: u64, player: Player) -> u64 {
    let mut possible_moves = moves;
    let opponent_winning_positions = winning_cells(board.stones(!player), board.occupied());
    let forced_moves = possible_moves & opponent_winning_positions;

    if forced_moves != 0 {
        // if more than one forced move exists, you can't prevent the opponent winning
        if forced_moves & (forced_moves - 1) != 0 {
            return 0;
        } else {
            possible_moves = forced_moves
        }
    }
    // avoid playing below an opponent's winning move
    possible_moves & !(opponent_winning_positions >> 1)
}

/// Scores a move by how many open ends of 3-alignments it leaves `player` with
pub fn move_score(board: &BitBoard, candidate: u64, player: Player) -> i32 {
    winning_cells(board.stones(player) | candidate, board.occupied() | candidate).count_ones()
        as i32
}

/// Orders the moves in `candidates` for exploration
///
/// The column remembered by the transposition table comes first, then the
/// rest by `move_score`, ties going to the column nearer the middle. Columns
/// without a candidate move are left out entirely.
pub fn rank_moves(
    board: &BitBoard,
    candidates: u64,
    player: Player,
    table_hint: Option<usize>,
) -> MoveSorter {
    let mut moves = MoveSorter::new();
    // pushing the edges first means ties are yielded middle first
    for &column in move_order().iter().rev() {
        let candidate = candidates & BitBoard::column_mask(column);
        if candidate == 0 {
            continue;
        }
        let score = if table_hint == Some(column) {
            TABLE_HINT_SCORE
        } else {
            move_score(board, candidate, player)
        };
        moves.push(candidate, column, score);
    }
    moves
}
