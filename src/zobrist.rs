//! Fixed random keys for incremental position hashing

use crate::{bitboard::Player, mersenne_twister::MersenneTwister64};

/// The seed all key sets are derived from. It is fixed so that hashes, and
/// with them transposition behaviour, are identical across runs.
pub const ZOBRIST_SEED: u64 = 0xdead_beef;

const CELLS: usize = 64;

/// One key per (cell, player) pair
pub struct ZobristKeys {
    keys: [u64; 2 * CELLS],
}

impl ZobristKeys {
    pub fn new(seed: u64) -> Self {
        let mut rng = MersenneTwister64::new(seed);
        let mut keys = [0; 2 * CELLS];
        for key in keys.iter_mut() {
            *key = rng.generate();
        }
        Self { keys }
    }

    /// The key of `player` occupying the cell at bit index `cell`
    #[inline]
    pub fn key(&self, cell: u32, player: Player) -> u64 {
        self.keys[cell as usize + CELLS * player.index()]
    }

    /// XOR of the keys of every set bit in `stones`, owned by `player`
    pub fn hash_stones(&self, mut stones: u64, player: Player) -> u64 {
        let mut hash = 0;
        while stones != 0 {
            hash ^= self.key(stones.trailing_zeros(), player);
            stones &= stones - 1;
        }
        hash
    }
}

impl Default for ZobristKeys {
    fn default() -> Self {
        Self::new(ZOBRIST_SEED)
    }
}
