use std::slice;

use crate::{EngineError, Result};

/// Anything that can be placed on a [`Timeline`].
pub trait Timed {
    fn time(&self) -> f64;
}

#[derive(Debug, Clone)]
pub struct Timeline<T> {
    items: Vec<T>,
}

impl<T> Default for Timeline<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Timed> Timeline<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    /// Inserts `item` after every entry whose time is less than or equal to
    /// its own, so equal timestamps stay in insertion order.
    pub fn add(&mut self, item: T) -> Result<()> {
        let time = item.time();
        if !time.is_finite() {
            return Err(EngineError::InvalidValue {
                what: "timeline entry time",
                value: time,
            });
        }

        let index = self.upper_bound(time);
        self.items.insert(index, item);
        Ok(())
    }

    /// Removes the entry equal to `item`. Only entries sharing its timestamp
    /// are compared. Returns whether something was removed.
    pub fn remove(&mut self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let time = item.time();
        let lo = self.lower_bound(time);
        let hi = self.upper_bound(time);
        match self.items[lo..hi].iter().position(|candidate| candidate == item) {
            Some(offset) => {
                self.items.remove(lo + offset);
                true
            }
            None => false,
        }
    }

    /// Latest entry at or before `time`.
    pub fn get(&self, time: f64) -> Option<&T> {
        self.upper_bound(time)
            .checked_sub(1)
            .map(|index| &self.items[index])
    }

    /// Latest entry strictly before `time`.
    pub fn get_before(&self, time: f64) -> Option<&T> {
        self.lower_bound(time)
            .checked_sub(1)
            .map(|index| &self.items[index])
    }

    /// Earliest entry strictly after `time`.
    pub fn get_after(&self, time: f64) -> Option<&T> {
        self.items.get(self.upper_bound(time))
    }

    /// Entries with `lo <= time < hi`, ascending.
    pub fn between(&self, lo: f64, hi: f64) -> &[T] {
        let start = self.lower_bound(lo);
        let end = self.lower_bound(hi).max(start);
        &self.items[start..end]
    }

    /// Entries whose time equals `time` exactly.
    pub fn at_time(&self, time: f64) -> &[T] {
        let start = self.lower_bound(time);
        let end = self.upper_bound(time).max(start);
        &self.items[start..end]
    }

    /// Entries strictly before `time`.
    pub fn before(&self, time: f64) -> &[T] {
        &self.items[..self.lower_bound(time)]
    }

    /// Entries at or after `time`.
    pub fn starting_at(&self, time: f64) -> &[T] {
        &self.items[self.lower_bound(time)..]
    }

    pub fn for_each_between(&self, lo: f64, hi: f64, f: impl FnMut(&T)) {
        self.between(lo, hi).iter().for_each(f);
    }

    pub fn for_each_at_time(&self, time: f64, f: impl FnMut(&T)) {
        self.at_time(time).iter().for_each(f);
    }

    pub fn for_each_before(&self, time: f64, f: impl FnMut(&T)) {
        self.before(time).iter().for_each(f);
    }

    pub fn for_each_from(&self, time: f64, f: impl FnMut(&T)) {
        self.starting_at(time).iter().for_each(f);
    }

    /// Drops every entry at or after `time`.
    pub fn cancel(&mut self, time: f64) {
        let index = self.lower_bound(time);
        self.items.truncate(index);
    }

    /// Drops every entry strictly before `time`.
    pub fn cancel_before(&mut self, time: f64) {
        let index = self.lower_bound(time);
        self.items.drain(..index);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn lower_bound(&self, time: f64) -> usize {
        self.items.partition_point(|item| item.time() < time)
    }

    fn upper_bound(&self, time: f64) -> usize {
        self.items.partition_point(|item| item.time() <= time)
    }
}

impl<'a, T> IntoIterator for &'a Timeline<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Mark {
        time: f64,
        id: u32,
    }

    impl Timed for Mark {
        fn time(&self) -> f64 {
            self.time
        }
    }

    fn mark(time: f64, id: u32) -> Mark {
        Mark { time, id }
    }

    fn ids(items: &[Mark]) -> Vec<u32> {
        items.iter().map(|m| m.id).collect()
    }

    fn sample() -> Timeline<Mark> {
        let mut timeline = Timeline::new();
        for (time, id) in [(3.0, 1), (1.0, 2), (2.0, 3), (2.0, 4), (0.0, 5)] {
            timeline.add(mark(time, id)).unwrap();
        }
        timeline
    }

    #[test]
    fn keeps_entries_sorted_with_stable_ties() {
        let timeline = sample();
        let order: Vec<u32> = timeline.iter().map(|m| m.id).collect();
        assert_eq!(order, vec![5, 2, 3, 4, 1]);
    }

    #[test]
    fn point_lookups_respect_open_and_closed_bounds() {
        let timeline = sample();

        assert_eq!(timeline.get(2.0).map(|m| m.id), Some(4));
        assert_eq!(timeline.get(2.5).map(|m| m.id), Some(4));
        assert_eq!(timeline.get(-1.0), None);

        assert_eq!(timeline.get_before(2.0).map(|m| m.id), Some(2));
        assert_eq!(timeline.get_before(0.0), None);

        assert_eq!(timeline.get_after(2.0).map(|m| m.id), Some(1));
        assert_eq!(timeline.get_after(3.0), None);
    }

    #[test]
    fn range_queries_are_half_open() {
        let timeline = sample();

        assert_eq!(ids(timeline.between(1.0, 3.0)), vec![2, 3, 4]);
        assert_eq!(ids(timeline.between(3.0, 1.0)), Vec::<u32>::new());
        assert_eq!(ids(timeline.at_time(2.0)), vec![3, 4]);
        assert_eq!(ids(timeline.before(2.0)), vec![5, 2]);
        assert_eq!(ids(timeline.starting_at(2.0)), vec![3, 4, 1]);

        let mut visited = Vec::new();
        timeline.for_each_between(0.0, 2.0, |m| visited.push(m.id));
        assert_eq!(visited, vec![5, 2]);
    }

    #[test]
    fn removal_is_identity_based() {
        let mut timeline = sample();

        assert!(timeline.remove(&mark(2.0, 3)));
        assert!(!timeline.remove(&mark(2.0, 3)));
        assert!(!timeline.remove(&mark(1.5, 2)));
        assert_eq!(ids(timeline.at_time(2.0)), vec![4]);
        assert_eq!(timeline.len(), 4);
    }

    #[test]
    fn cancel_drops_entries_at_and_after_time() {
        let mut timeline = sample();
        timeline.cancel(2.0);
        assert_eq!(ids(timeline.starting_at(0.0)), vec![5, 2]);

        let mut timeline = sample();
        timeline.cancel_before(2.0);
        assert_eq!(ids(timeline.starting_at(0.0)), vec![3, 4, 1]);
    }

    #[test]
    fn rejects_non_finite_times() {
        let mut timeline = Timeline::new();
        assert!(timeline.add(mark(f64::NAN, 1)).is_err());
        assert!(timeline.add(mark(f64::INFINITY, 1)).is_err());
        assert!(timeline.is_empty());
    }
}
