// Transposition table.
//
// Caches search results keyed by the 64-bit Zobrist hash so transposed
// lines are not searched twice. Replacement is depth-preferred: an entry
// is only overwritten by a search of greater or equal depth. The table is
// bounded; when it overflows, the older half of the entries (insertion
// order) is dropped in one sweep.

use chess::ChessMove;
use std::collections::{HashMap, VecDeque};

/// Maximum number of cached entries before the oldest half is evicted.
pub const TT_MAX_ENTRIES: usize = 200_000;

/// How a stored score relates to the true score of the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// The position was searched with a full window; the score is exact.
    Exact,
    /// A beta cutoff occurred; the true score is at least this value.
    Lower,
    /// Every move failed low; the true score is at most this value.
    Upper,
}

#[derive(Debug, Clone, Copy)]
pub struct TtEntry {
    pub score: i32,
    pub depth: u8,
    pub bound: Bound,
    /// Best move found at this node, if any; used to seed move ordering.
    pub best: Option<ChessMove>,
}

pub struct TranspositionTable {
    entries: HashMap<u64, TtEntry>,
    /// Hashes in insertion order, for the oldest-half sweep.
    order: VecDeque<u64>,
    capacity: usize,
}

impl TranspositionTable {
    pub fn new() -> Self {
        Self::with_capacity(TT_MAX_ENTRIES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity.min(65_536)),
            order: VecDeque::new(),
            capacity: capacity.max(2),
        }
    }

    pub fn probe(&self, hash: u64) -> Option<TtEntry> {
        self.entries.get(&hash).copied()
    }

    /// Store an entry unless a deeper one for the same hash already exists.
    pub fn store(&mut self, hash: u64, entry: TtEntry) {
        match self.entries.get_mut(&hash) {
            Some(existing) => {
                if existing.depth < entry.depth {
                    *existing = entry;
                }
            }
            None => {
                self.entries.insert(hash, entry);
                self.order.push_back(hash);
                if self.entries.len() > self.capacity {
                    self.evict_oldest_half();
                }
            }
        }
    }

    fn evict_oldest_half(&mut self) {
        let survivors = self.order.len() / 2;
        while self.order.len() > survivors {
            if let Some(hash) = self.order.pop_front() {
                self.entries.remove(&hash);
            }
        }
        log::debug!("transposition table swept, {} entries remain", self.entries.len());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

impl Default for TranspositionTable {
    fn default() -> Self {
        Self::new()
    }
}
