//! Weekly time grid model.
//!
//! A [`TimeBlock`] is one atomic unit of the weekly grid: a day label plus
//! a `[start, end)` interval in wall-clock hours and minutes. Blocks are
//! loaded once and never mutated; all conflict detection reduces to the
//! overlap predicate defined here.
//!
//! # Day labels
//! Days are free-form strings compared case-sensitively. Callers must use a
//! consistent alphabet ("Monday" and "monday" are different days).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::graph::NodeId;

/// One block of the weekly time grid.
///
/// The interval is half-open: a block occupies `[start, end)` minutes of its
/// day, so back-to-back blocks (`a.end == b.start`) do not overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBlock {
    /// Internal node id of this block in the engine graph.
    pub id: NodeId,
    /// Day-of-week label.
    pub day: String,
    /// Start hour (0-23).
    pub start_hour: i32,
    /// Start minute (0-59).
    pub start_minute: i32,
    /// End hour (0-23).
    pub end_hour: i32,
    /// End minute (0-59).
    pub end_minute: i32,
}

impl TimeBlock {
    /// Creates a new time block.
    pub fn new(
        id: NodeId,
        day: impl Into<String>,
        start_hour: i32,
        start_minute: i32,
        end_hour: i32,
        end_minute: i32,
    ) -> Self {
        Self {
            id,
            day: day.into(),
            start_hour,
            start_minute,
            end_hour,
            end_minute,
        }
    }

    /// Start of the block as minutes from midnight.
    #[inline]
    pub fn start_offset_min(&self) -> i32 {
        self.start_hour * 60 + self.start_minute
    }

    /// End of the block as minutes from midnight.
    #[inline]
    pub fn end_offset_min(&self) -> i32 {
        self.end_hour * 60 + self.end_minute
    }

    /// Whether two blocks overlap in wall-clock time.
    ///
    /// Blocks on different days never overlap. On the same day, the
    /// half-open intervals must intersect; touching endpoints do not count.
    pub fn overlaps(&self, other: &TimeBlock) -> bool {
        if self.day != other.day {
            return false;
        }
        !(self.end_offset_min() <= other.start_offset_min()
            || other.end_offset_min() <= self.start_offset_min())
    }
}

impl fmt::Display for TimeBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:02}:{:02}-{:02}:{:02}",
            self.day, self.start_hour, self.start_minute, self.end_hour, self.end_minute
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minute_offsets() {
        let b = TimeBlock::new(0, "Monday", 7, 55, 8, 50);
        assert_eq!(b.start_offset_min(), 475);
        assert_eq!(b.end_offset_min(), 530);
    }

    #[test]
    fn test_overlap_same_day() {
        let a = TimeBlock::new(0, "Monday", 7, 0, 8, 0);
        let b = TimeBlock::new(1, "Monday", 7, 30, 8, 30);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn test_back_to_back_does_not_overlap() {
        let a = TimeBlock::new(0, "Monday", 7, 0, 7, 55);
        let b = TimeBlock::new(1, "Monday", 7, 55, 8, 50);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn test_different_days_never_overlap() {
        let a = TimeBlock::new(0, "Monday", 7, 0, 8, 0);
        let b = TimeBlock::new(1, "Tuesday", 7, 0, 8, 0);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_day_labels_case_sensitive() {
        let a = TimeBlock::new(0, "Monday", 7, 0, 8, 0);
        let b = TimeBlock::new(1, "monday", 7, 0, 8, 0);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_containment_overlaps() {
        let outer = TimeBlock::new(0, "Friday", 7, 0, 10, 0);
        let inner = TimeBlock::new(1, "Friday", 8, 0, 9, 0);
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn test_display() {
        let b = TimeBlock::new(0, "Monday", 7, 0, 7, 55);
        assert_eq!(b.to_string(), "Monday 07:00-07:55");
    }
}
