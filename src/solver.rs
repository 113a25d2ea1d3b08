//! An agent to solve the game of Connect 4

use log::debug;

use std::cmp::Ordering;

use crate::{
    bitboard::*, move_ordering::*, opening_book::OpeningBook, transposition_table::*,
    MAX_STONES, HEIGHT, WIDTH,
};

/// The score of winning with `player`'s next tile
pub fn win_score(board: &BitBoard, player: Player) -> i32 {
    (MAX_STONES - board.num_stones(player)) as i32
}

/// The score of losing to the opponent's next tile
pub fn loss_score(board: &BitBoard, player: Player) -> i32 {
    -((MAX_STONES - board.num_stones(!player)) as i32)
}

/// Scores the positions that are decided within one move: a full board, an
/// immediate win for `player`, or a position where every move hands the
/// opponent a win
///
/// Returns the score and a move achieving it, `None` for any other position.
pub fn immediate_outcome(board: &BitBoard, player: Player) -> Option<(i32, Option<usize>)> {
    let moves = board.legal_moves();
    if moves == 0 {
        return Some((0, None));
    }

    let winning_moves = board.winning_moves(player);
    if winning_moves != 0 {
        return Some((
            win_score(board, player),
            Some(BitBoard::column_from_move(winning_moves & winning_moves.wrapping_neg())),
        ));
    }

    if non_losing_moves(board, moves, player) == 0 {
        // all moves lose, return the first legal move found
        return Some((
            loss_score(board, player),
            Some(BitBoard::column_from_move(moves & moves.wrapping_neg())),
        ));
    }
    None
}

/// Performs game tree search
///
/// `player` must not have an immediate win available; `solve` checks this at
/// the root and the search keeps it true by only descending through moves that
/// don't give the opponent one.
///
/// If the result is at most `alpha` it is an upper bound of the score, if it is
/// at least `beta` it is a lower bound, otherwise it is the exact score.
pub fn negamax(
    board: &mut BitBoard,
    table: &mut TranspositionTable,
    player: Player,
    mut alpha: i32,
    mut beta: i32,
) -> i32 {
    board.count_node();

    // check for draw
    let moves = board.legal_moves();
    if moves == 0 {
        return 0;
    }

    // look for moves that don't give the opponent a next turn win
    let non_losing_moves = non_losing_moves(board, moves, player);
    if non_losing_moves == 0 {
        return loss_score(board, player);
    }

    // there is no win on this move, so the best case is a win with the tile after
    let max = win_score(board, player) - 1;
    if beta > max {
        // clamp beta to calculated upper bound
        beta = max;
        // if the upper bound is lower than alpha, we can prune the exploration
        if alpha >= beta {
            return beta;
        }
    }

    // try to fetch the score or a bound of it from the transposition table
    let hash = board.hash();
    let mut table_hint = None;
    if let Some(entry) = table.get(hash) {
        table_hint = entry.best_move.map(usize::from);
        let value = i32::from(entry.value);
        match entry.bound {
            Bound::Exact => return value,
            Bound::Upper => beta = beta.min(value),
            Bound::Lower => alpha = alpha.max(value),
        }
        if alpha >= beta {
            // prune the exploration
            return beta;
        }
    }
    let window_low = alpha;

    // search the next level of the tree
    let mut best_score = i32::MIN;
    let mut best_move = None;
    for (move_bitmap, column) in rank_moves(board, non_losing_moves, player, table_hint) {
        let score = {
            let mut next = board.scoped_move(move_bitmap, player);
            // the search window is flipped for the other player
            -negamax(&mut next, table, !player, -beta, -alpha)
        };
        if score > best_score {
            best_score = score;
            best_move = Some(column);
        }
        alpha = alpha.max(best_score);
        // a perfect opponent will not pick this branch
        if alpha >= beta {
            break;
        }
    }

    let bound = if best_score <= window_low {
        Bound::Upper
    } else if best_score >= beta {
        Bound::Lower
    } else {
        Bound::Exact
    };
    table.set(hash, best_score, best_move, bound);
    best_score
}

/// Performs a top-level search, bypassing the transposition table probe
///
/// Returns the score as `negamax` would, along with the move that produced it
fn search_root(
    board: &mut BitBoard,
    table: &mut TranspositionTable,
    player: Player,
    mut alpha: i32,
    beta: i32,
) -> (i32, Option<usize>) {
    board.count_node();

    let non_losing_moves = non_losing_moves(board, board.legal_moves(), player);

    // search the next level of the tree and keep track of the best move
    let mut best_score = i32::MIN;
    let mut best_move = None;
    for (move_bitmap, column) in rank_moves(board, non_losing_moves, player, None) {
        let score = {
            let mut next = board.scoped_move(move_bitmap, player);
            -negamax(&mut next, table, !player, -beta, -alpha)
        };
        if score > best_score {
            best_score = score;
            best_move = Some(column);
        }
        alpha = alpha.max(best_score);
        if alpha >= beta {
            break;
        }
    }
    (best_score, best_move)
}

/// Calculates the exact score of the position with `player` to move, and a
/// move that achieves it
///
/// The score is narrowed down with a series of null-window searches. The
/// transposition table is not cleared, so entries carry over between them
/// (and from any earlier solve of a related position).
///
/// With `weak` set only the sign of the score is determined: 1 for a win,
/// 0 for a draw and -1 for a loss. The move is `None` only on a full board.
pub fn solve(
    board: &mut BitBoard,
    table: &mut TranspositionTable,
    player: Player,
    weak: bool,
) -> (i32, Option<usize>) {
    if let Some((score, best_move)) = immediate_outcome(board, player) {
        return (if weak { score.signum() } else { score }, best_move);
    }

    let mut min = loss_score(board, player);
    let mut max = win_score(board, player) - 1;
    if weak {
        min = min.max(-1);
        max = max.min(1);
    }

    // stands unless a search proves a better lower bound
    let non_losing_moves = non_losing_moves(board, board.legal_moves(), player);
    let mut next_move = rank_moves(board, non_losing_moves, player, None)
        .next()
        .map(|(_, column)| column);

    // iteratively narrow the search window
    while min < max {
        let mut mid = min + (max - min) / 2;
        // tweak the search value for both negative and positive searches
        if mid <= 0 && min / 2 < mid {
            mid = min / 2
        } else if mid >= 0 && max / 2 > mid {
            mid = max / 2
        }

        debug!(
            "Search window: [{}, {}], testing {}, nodes so far: {}",
            min,
            max,
            mid,
            board.nodes()
        );

        // use a null-window to determine if the actual score is greater or less that mid
        let (r, best_move) = search_root(board, table, player, mid, mid + 1);

        // r is not necessarily the exact true score, but its value indicates
        // whether the true score is above or below the search target
        if r <= mid {
            // actual score <= mid
            max = r
        } else {
            // actual score > mid, and best_move reaches it
            min = r;
            next_move = best_move;
        }
    }
    // min and max should be equal here, unless only the sign was asked for
    (if weak { min.signum() } else { min }, next_move)
}

/// An agent to solve Connect 4 positions
///
/// # Notes
/// This agent uses a classical game tree search with various optimisations to
/// find the mathematically best move(s) in any position, thus 'solving' the game
///
/// # Position Scoring
/// A position is scored from the point of view of the player to move, by how
/// early a forced win comes. Winning with your final tile (your 21st in a 7x6
/// board) scores 1, winning with your 20th scores 2, and so on up to 18 for a
/// win with your 4th tile. Losses are scored the same way by the tile the
/// opponent wins with, negated. A drawn position has a score of 0
pub struct Solver {
    board: BitBoard,
    player: Player,
    transposition_table: TranspositionTable,
    opening_book: Option<OpeningBook>,
}

impl Solver {
    /// Creates a new `Solver` for a position with `player` to move
    pub fn new(board: BitBoard, player: Player) -> Self {
        Self::new_with_transposition_table(board, player, TranspositionTable::new())
    }

    /// Creates a new `Solver` for a position with a given transposition table
    pub fn new_with_transposition_table(
        board: BitBoard,
        player: Player,
        transposition_table: TranspositionTable,
    ) -> Self {
        Self {
            board,
            player,
            transposition_table,
            opening_book: None,
        }
    }

    /// Adds an opening book to an existing `Solver`, consulted before searching
    pub fn with_opening_book(mut self, opening_book: OpeningBook) -> Self {
        self.opening_book = Some(opening_book);
        self
    }

    pub fn board(&self) -> &BitBoard {
        &self.board
    }

    /// The player to move
    pub fn player(&self) -> Player {
        self.player
    }

    /// The number of nodes searched by this `Solver` so far (for diagnostics only)
    pub fn node_count(&self) -> u64 {
        self.board.nodes()
    }

    /// Calculate the exact score and a best move of the current position
    pub fn solve(&mut self) -> (i32, Option<usize>) {
        self._solve(false)
    }

    /// Calculate whether the current position is won (1), drawn (0) or lost (-1),
    /// and a move that achieves it
    pub fn solve_weak(&mut self) -> (i32, Option<usize>) {
        self._solve(true)
    }

    fn _solve(&mut self, weak: bool) -> (i32, Option<usize>) {
        if let Some(book) = &self.opening_book {
            if let Some(entry) = book.get(&self.board, self.player) {
                debug!("Opening book hit: score {}, column {}", entry.score, entry.column);
                let score = if weak { entry.score.signum() } else { entry.score };
                return (score, Some(entry.column));
            }
        }

        let start_nodes = self.board.nodes();
        let (score, best_move) = solve(
            &mut self.board,
            &mut self.transposition_table,
            self.player,
            weak,
        );
        debug!(
            "Solved: score {}, best move {:?}, {} nodes searched",
            score,
            best_move,
            self.board.nodes() - start_nodes
        );
        (score, best_move)
    }

    /// Plays `column` for the player to move and hands the turn over
    ///
    /// The transposition table is cleared, as it is whenever the position changes.
    pub fn play(&mut self, column: usize) -> anyhow::Result<()> {
        if column >= WIDTH || !self.board.playable(column) {
            return Err(anyhow::anyhow!("Invalid move, column {} not playable", column));
        }
        let move_bitmap = self.board.move_in_column(column);
        self.board.apply_move(move_bitmap, self.player);
        self.player = !self.player;
        self.transposition_table.clear();
        Ok(())
    }

    /// Replaces the position to solve, clearing the transposition table
    pub fn reset(&mut self, board: BitBoard, player: Player) {
        self.board = board;
        self.player = player;
        self.transposition_table.clear();
    }

    /// Converts a position score to a win distance in a single player's moves
    ///
    /// For a positive score this is the number of moves the player to move needs
    /// to win, for a negative score the number the opponent needs. A draw returns
    /// the number of empty cells left
    pub fn score_to_win_distance(&self, score: i32) -> usize {
        match score.cmp(&0) {
            Ordering::Equal => WIDTH * HEIGHT - self.board.num_moves(),
            Ordering::Greater => {
                (MAX_STONES + 1 - score as usize) - self.board.num_stones(self.player)
            }
            Ordering::Less => {
                (MAX_STONES + 1 - (-score) as usize) - self.board.num_stones(!self.player)
            }
        }
    }
}

impl std::ops::Deref for Solver {
    type Target = BitBoard;

    fn deref(&self) -> &Self::Target {
        &self.board
    }
}
