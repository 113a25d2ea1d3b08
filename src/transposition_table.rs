//! A fixed-size, direct-mapped cache of search results
//!
//! Every position maps to exactly one slot (`hash % capacity`) and a store
//! always overwrites that slot. There is no probing and no replacement
//! priority, so a useful entry can be evicted by a less useful one whose hash
//! shares its slot. Lookups compare the full 64-bit hash, but two distinct
//! positions with the same hash are not told apart.

use std::mem::size_of;

/// The default memory budget of a table, in megabytes
pub const DEFAULT_TABLE_MB: usize = 64;

const MB_SIZE: usize = 1_000_000;

/// How a stored value relates to the true score of its position
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bound {
    /// The value is the exact score
    Exact,
    /// The search failed low, the score is at most the value
    Upper,
    /// The search failed high, the score is at least the value
    Lower,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub hash: u64,
    pub value: i8,
    /// The best column found by the search that stored this entry
    pub best_move: Option<u8>,
    pub bound: Bound,
}

#[derive(Clone)]
pub struct TranspositionTable {
    entries: Vec<Option<Entry>>,
}

impl TranspositionTable {
    pub fn new() -> Self {
        Self::with_megabytes(DEFAULT_TABLE_MB)
    }

    /// Creates a table filling (about) `megabytes` of memory
    pub fn with_megabytes(megabytes: usize) -> Self {
        let size = (megabytes * MB_SIZE / size_of::<Option<Entry>>()).max(1);
        Self {
            entries: vec![None; size],
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    fn index(&self, hash: u64) -> usize {
        (hash % self.entries.len() as u64) as usize
    }

    pub fn set(&mut self, hash: u64, value: i32, best_move: Option<usize>, bound: Bound) {
        let index = self.index(hash);
        self.entries[index] = Some(Entry {
            hash,
            value: value as i8,
            best_move: best_move.map(|column| column as u8),
            bound,
        });
    }

    pub fn get(&self, hash: u64) -> Option<Entry> {
        self.entries[self.index(hash)].filter(|entry| entry.hash == hash)
    }

    /// Empties every slot
    ///
    /// Entries stay valid across the searches of a single solve; callers that
    /// move on to an unrelated position are expected to clear the table first.
    pub fn clear(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry = None;
        }
    }
}

impl Default for TranspositionTable {
    fn default() -> Self {
        Self::new()
    }
}
