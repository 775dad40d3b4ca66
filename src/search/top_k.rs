//! Bounded collection of the best results seen so far.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::search::types::ResultEntry;

/// Keeps the `capacity` highest-scoring entries.
///
/// Entries are kept in a min-heap so the current worst result sits at the
/// top. Among equal scores the entry offered first wins.
#[derive(Debug)]
pub struct TopK {
    capacity: usize,
    heap: BinaryHeap<Ranked>,
    /// Number of entries offered so far.
    offered: usize,
}

/// An entry with its discovery sequence, for use in the heap.
#[derive(Debug, Clone)]
struct Ranked {
    entry: ResultEntry,
    seq: usize,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        // Worse entries compare greater: lower score, then later sequence.
        other
            .entry
            .combined()
            .total_cmp(&self.entry.combined())
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl TopK {
    pub fn new(capacity: usize) -> Self {
        TopK {
            capacity,
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1).min(1024)),
            offered: 0,
        }
    }

    /// Offer an entry. Returns true if it was retained.
    ///
    /// Once full, a new entry must strictly beat the current minimum.
    pub fn offer(&mut self, entry: ResultEntry) -> bool {
        let seq = self.offered;
        self.offered += 1;

        if self.capacity == 0 {
            return false;
        }
        if self.heap.len() < self.capacity {
            self.heap.push(Ranked { entry, seq });
            return true;
        }

        match self.heap.peek() {
            Some(worst) if entry.combined() > worst.entry.combined() => {
                self.heap.pop();
                self.heap.push(Ranked { entry, seq });
                true
            }
            _ => false,
        }
    }

    /// Lowest retained score, if any entry is held.
    pub fn min_score(&self) -> Option<f64> {
        self.heap.peek().map(|r| r.entry.combined())
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total entries offered, retained or not.
    pub fn offered(&self) -> usize {
        self.offered
    }

    /// Remove every entry, best first. The collection is left empty.
    pub fn drain(&mut self) -> Vec<ResultEntry> {
        // Ascending by `Ord` is best first, since worse compares greater.
        std::mem::take(&mut self.heap)
            .into_sorted_vec()
            .into_iter()
            .map(|r| r.entry)
            .collect()
    }

    /// Consume the collection, best first.
    pub fn into_sorted_vec(mut self) -> Vec<ResultEntry> {
        self.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::CandidateId;
    use crate::search::types::ScoreVector;
    use std::path::PathBuf;

    fn entry(name: &str, combined: f64) -> ResultEntry {
        ResultEntry::new(
            CandidateId::from(name),
            PathBuf::from(format!("/{name}.png")),
            ScoreVector {
                clip_sim: combined,
                color_sim: combined,
                phash_sim: combined,
                combined,
            },
        )
    }

    fn names(entries: &[ResultEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_keeps_best_entries() {
        let mut top = TopK::new(3);
        for (i, score) in [0.2, 0.9, 0.5, 0.7, 0.1, 0.8].iter().enumerate() {
            top.offer(entry(&format!("e{i}"), *score));
        }

        assert!(top.is_full());
        assert_eq!(top.min_score(), Some(0.7));
        assert_eq!(top.offered(), 6);
        let results = top.into_sorted_vec();
        assert_eq!(names(&results), vec!["e1", "e5", "e3"]);
    }

    #[test]
    fn test_ties_prefer_earlier_entries() {
        let mut top = TopK::new(2);
        assert!(top.offer(entry("first", 0.5)));
        assert!(top.offer(entry("second", 0.5)));
        assert!(!top.offer(entry("third", 0.5)));

        let results = top.into_sorted_vec();
        assert_eq!(names(&results), vec!["first", "second"]);
    }

    #[test]
    fn test_not_full() {
        let mut top = TopK::new(5);
        top.offer(entry("a", 0.3));
        top.offer(entry("b", 0.6));
        assert!(!top.is_full());
        assert_eq!(top.len(), 2);
        assert_eq!(names(&top.drain()), vec!["b", "a"]);
        assert!(top.is_empty());
        assert_eq!(top.min_score(), None);
    }

    #[test]
    fn test_zero_capacity() {
        let mut top = TopK::new(0);
        assert!(!top.offer(entry("a", 1.0)));
        assert!(top.is_empty());
        assert!(top.is_full());
        assert_eq!(top.min_score(), None);
    }
}
