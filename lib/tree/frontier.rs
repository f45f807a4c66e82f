//! The frontier holds every option which has been created but not yet picked
//! up for exploration.

use crate::tree::OptionId;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// Unevaluated options in insertion order, with their depths.
///
/// The frontier itself is not synchronized. Executors share it behind a
/// single `Mutex`.
#[derive(Clone, Debug, Default)]
pub struct Frontier {
    next_sequence: u64,
    entries: BTreeMap<u64, (OptionId, usize)>,
    sequences: FxHashMap<OptionId, u64>,
    // depth -> number of entries at that depth
    depths: BTreeMap<usize, usize>,
}

impl Frontier {
    pub fn new() -> Frontier {
        Frontier::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, option: OptionId) -> bool {
        self.sequences.contains_key(&option)
    }

    /// Insert `options`, all at `depth`. Options already present are left
    /// where they are.
    pub fn insert<I>(&mut self, depth: usize, options: I)
    where
        I: IntoIterator<Item = OptionId>,
    {
        for option in options {
            if self.sequences.contains_key(&option) {
                continue;
            }
            let sequence = self.next_sequence;
            self.next_sequence += 1;
            self.entries.insert(sequence, (option, depth));
            self.sequences.insert(option, sequence);
            *self.depths.entry(depth).or_insert(0) += 1;
        }
    }

    fn remove_sequence(&mut self, sequence: u64) -> Option<OptionId> {
        let (option, depth) = self.entries.remove(&sequence)?;
        self.sequences.remove(&option);
        if let Some(count) = self.depths.get_mut(&depth) {
            *count -= 1;
            if *count == 0 {
                self.depths.remove(&depth);
            }
        }
        Some(option)
    }

    /// Remove and return the oldest option.
    pub fn poll_first(&mut self) -> Option<OptionId> {
        let sequence = *self.entries.keys().next()?;
        self.remove_sequence(sequence)
    }

    /// Remove and return the newest option.
    pub fn poll_last(&mut self) -> Option<OptionId> {
        let sequence = *self.entries.keys().next_back()?;
        self.remove_sequence(sequence)
    }

    /// Remove and return the oldest option no deeper than `max_depth`.
    pub fn poll_first_within(&mut self, max_depth: usize) -> Option<OptionId> {
        match self.depths.keys().next() {
            Some(min) if *min <= max_depth => {}
            _ => return None,
        }
        let sequence = self
            .entries
            .iter()
            .find(|(_, (_, depth))| *depth <= max_depth)
            .map(|(sequence, _)| *sequence)?;
        self.remove_sequence(sequence)
    }

    /// Remove `option` if it is present. Returns true if it was.
    pub fn request(&mut self, option: OptionId) -> bool {
        match self.sequences.get(&option) {
            Some(sequence) => {
                let sequence = *sequence;
                self.remove_sequence(sequence).is_some()
            }
            None => false,
        }
    }

    /// The shallowest and deepest depths present, if any.
    pub fn min_max_depth(&self) -> Option<(usize, usize)> {
        let min = *self.depths.keys().next()?;
        let max = *self.depths.keys().next_back()?;
        Some((min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(range: std::ops::Range<usize>) -> Vec<OptionId> {
        range.map(OptionId::new).collect()
    }

    #[test]
    fn poll_order() {
        let mut frontier = Frontier::new();
        frontier.insert(1, ids(1..3));
        frontier.insert(2, ids(3..5));

        assert_eq!(frontier.poll_last(), Some(OptionId::new(4)));
        assert_eq!(frontier.poll_first(), Some(OptionId::new(1)));
        assert_eq!(frontier.poll_first(), Some(OptionId::new(2)));
        assert_eq!(frontier.poll_last(), Some(OptionId::new(3)));
        assert_eq!(frontier.poll_last(), None);
        assert_eq!(frontier.poll_first(), None);
    }

    #[test]
    fn options_are_returned_once() {
        let mut frontier = Frontier::new();
        frontier.insert(1, ids(1..4));
        // duplicate inserts are ignored
        frontier.insert(1, ids(1..2));
        assert_eq!(frontier.len(), 3);

        assert!(frontier.request(OptionId::new(2)));
        assert!(!frontier.request(OptionId::new(2)));
        assert_eq!(frontier.poll_first(), Some(OptionId::new(1)));
        assert_eq!(frontier.poll_first(), Some(OptionId::new(3)));
        assert!(frontier.is_empty());

        // a fresh insert makes an option available again
        frontier.insert(1, ids(2..3));
        assert!(frontier.request(OptionId::new(2)));
    }

    #[test]
    fn depth_bounds() {
        let mut frontier = Frontier::new();
        assert_eq!(frontier.min_max_depth(), None);

        frontier.insert(3, ids(1..3));
        frontier.insert(1, ids(3..4));
        frontier.insert(5, ids(4..5));
        assert_eq!(frontier.min_max_depth(), Some((1, 5)));

        assert_eq!(frontier.poll_first_within(0), None);
        assert_eq!(frontier.poll_first_within(3), Some(OptionId::new(1)));
        assert_eq!(frontier.poll_first_within(1), Some(OptionId::new(3)));
        assert_eq!(frontier.min_max_depth(), Some((3, 5)));

        assert!(frontier.request(OptionId::new(4)));
        assert_eq!(frontier.min_max_depth(), Some((3, 3)));
    }
}
