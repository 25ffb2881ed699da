//! Constraint store and admissibility checker.
//!
//! Holds the static constraint inputs (time grid, professor availability,
//! course prerequisites, course groups) keyed on internal node ids, and
//! answers the legality and quality queries the search engine asks on every
//! step. All checks run in O(existing assignments) and never fail: unknown
//! professors resolve to "not available" and unknown blocks to "invalid",
//! so malformed ids prune rather than panic.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::graph::NodeId;
use crate::models::TimeBlock;

/// One course hour placed on a block with a professor, in internal ids.
///
/// This is the unit of the search stack; results are converted to
/// external-id [`Assignment`](crate::models::Assignment)s afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    /// Internal course node id.
    pub course: NodeId,
    /// Internal block node id.
    pub block: NodeId,
    /// Internal professor node id.
    pub professor: NodeId,
}

impl Placement {
    /// Creates a new placement.
    pub fn new(course: NodeId, block: NodeId, professor: NodeId) -> Self {
        Self {
            course,
            block,
            professor,
        }
    }
}

/// Static constraint inputs plus the admissibility predicates over them.
#[derive(Debug, Clone, Default)]
pub struct ConstraintStore {
    blocks: BTreeMap<NodeId, TimeBlock>,
    professor_availability: HashMap<NodeId, Vec<NodeId>>,
    course_prerequisites: HashMap<NodeId, BTreeSet<NodeId>>,
    course_groups: HashMap<NodeId, i64>,
}

impl ConstraintStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a time block under its internal id.
    pub fn add_time_block(&mut self, block: TimeBlock) {
        self.blocks.insert(block.id, block);
    }

    /// Marks a block as teachable for a professor.
    ///
    /// The availability list preserves first-insertion order; repeated
    /// insertions are ignored.
    pub fn add_professor_availability(&mut self, professor: NodeId, block: NodeId) {
        let list = self.professor_availability.entry(professor).or_default();
        if !list.contains(&block) {
            list.push(block);
        }
    }

    /// Records a prerequisite relation between two courses.
    pub fn add_course_prerequisite(&mut self, course: NodeId, prerequisite: NodeId) {
        self.course_prerequisites
            .entry(course)
            .or_default()
            .insert(prerequisite);
    }

    /// Records the owning student group of a course.
    pub fn add_course_group(&mut self, course: NodeId, group: i64) {
        self.course_groups.insert(course, group);
    }

    /// Returns the block for an internal id.
    pub fn block(&self, id: NodeId) -> Option<&TimeBlock> {
        self.blocks.get(&id)
    }

    /// Returns the group a course belongs to.
    pub fn group_of(&self, course: NodeId) -> Option<i64> {
        self.course_groups.get(&course).copied()
    }

    /// Number of blocks a professor can teach.
    pub fn availability_count(&self, professor: NodeId) -> usize {
        self.professor_availability
            .get(&professor)
            .map_or(0, Vec::len)
    }

    /// Day label of a block.
    pub fn day_of(&self, block: NodeId) -> Option<&str> {
        self.blocks.get(&block).map(|b| b.day.as_str())
    }

    /// Start of a block as minutes from midnight.
    pub fn start_minute_of(&self, block: NodeId) -> Option<i32> {
        self.blocks.get(&block).map(TimeBlock::start_offset_min)
    }

    /// Whether a professor can teach in a block at all.
    pub fn professor_available(&self, professor: NodeId, block: NodeId) -> bool {
        self.professor_availability
            .get(&professor)
            .is_some_and(|list| list.contains(&block))
    }

    /// Whether placing a professor on a block collides with their existing
    /// assignments. Unknown blocks count as a collision.
    pub fn professor_conflict(
        &self,
        professor: NodeId,
        block: NodeId,
        existing: &[Placement],
    ) -> bool {
        let Some(candidate) = self.blocks.get(&block) else {
            return true;
        };
        existing
            .iter()
            .filter(|p| p.professor == professor)
            .any(|p| {
                self.blocks
                    .get(&p.block)
                    .is_some_and(|b| candidate.overlaps(b))
            })
    }

    /// Whether placing a course on a block collides with another course of
    /// the same group. Courses without a group never conflict.
    pub fn group_conflict(&self, course: NodeId, block: NodeId, existing: &[Placement]) -> bool {
        let Some(group) = self.group_of(course) else {
            return false;
        };
        let Some(candidate) = self.blocks.get(&block) else {
            return true;
        };
        existing
            .iter()
            .filter(|p| self.group_of(p.course) == Some(group))
            .any(|p| {
                self.blocks
                    .get(&p.block)
                    .is_some_and(|b| candidate.overlaps(b))
            })
    }

    /// Whether a prospective placement is admissible against the existing
    /// assignment set: the professor is available on the block, and neither
    /// the professor nor the course's group is double-booked.
    pub fn is_valid(&self, placement: &Placement, existing: &[Placement]) -> bool {
        self.professor_available(placement.professor, placement.block)
            && !self.professor_conflict(placement.professor, placement.block, existing)
            && !self.group_conflict(placement.course, placement.block, existing)
    }

    /// Whether every prerequisite of a course already appears in the
    /// assignment set.
    ///
    /// Exposed for external validation; the search itself does not order
    /// placements by prerequisite.
    pub fn check_prerequisites(&self, course: NodeId, existing: &[Placement]) -> bool {
        let Some(prerequisites) = self.course_prerequisites.get(&course) else {
            return true;
        };
        let placed: HashSet<NodeId> = existing.iter().map(|p| p.course).collect();
        prerequisites.iter().all(|p| placed.contains(p))
    }

    /// The professor's availability, minus blocks that clash with their
    /// existing assignments. Returned in availability insertion order.
    pub fn available_blocks(
        &self,
        _course: NodeId,
        professor: NodeId,
        existing: &[Placement],
    ) -> Vec<NodeId> {
        let Some(availability) = self.professor_availability.get(&professor) else {
            return Vec::new();
        };
        availability
            .iter()
            .copied()
            .filter(|&block| !self.professor_conflict(professor, block, existing))
            .collect()
    }

    /// The unique block on the same day that starts exactly when this one
    /// ends. `None` when no such block exists or several would tie.
    pub fn next_consecutive_block(&self, block: NodeId) -> Option<NodeId> {
        let current = self.blocks.get(&block)?;
        let mut found = None;
        for b in self.blocks.values() {
            if b.day == current.day && b.start_offset_min() == current.end_offset_min() {
                if found.is_some() {
                    return None;
                }
                found = Some(b.id);
            }
        }
        found
    }

    /// Longest run of back-to-back blocks the course occupies on a day.
    pub fn consecutive_hours_of_course(
        &self,
        course: NodeId,
        day: &str,
        assignments: &[Placement],
    ) -> usize {
        let mut intervals = self.course_intervals(course, day, assignments);
        intervals.sort_unstable();
        let mut longest = 0;
        let mut run = 0;
        let mut previous_end: Option<i32> = None;
        for (start, end) in intervals {
            run = match previous_end {
                Some(prev) if prev == start => run + 1,
                _ => 1,
            };
            longest = longest.max(run);
            previous_end = Some(end);
        }
        longest
    }

    /// Whether the course has two blocks on a day with an unoccupied grid
    /// block between them.
    pub fn has_gaps_in_course(&self, course: NodeId, day: &str, assignments: &[Placement]) -> bool {
        let mut intervals = self.course_intervals(course, day, assignments);
        intervals.sort_unstable();
        intervals.windows(2).any(|pair| {
            let (_, end) = pair[0];
            let (start, _) = pair[1];
            self.blocks.values().any(|b| {
                b.day == day && b.start_offset_min() >= end && b.end_offset_min() <= start
            })
        })
    }

    /// Idle hours inside the group's daily envelopes: grid blocks lying
    /// between the group's earliest and latest block of a day that no course
    /// of the group occupies. Time outside the envelopes does not count.
    pub fn free_hours_of_group(&self, group: i64, assignments: &[Placement]) -> usize {
        let occupied: HashSet<NodeId> = assignments
            .iter()
            .filter(|p| self.group_of(p.course) == Some(group))
            .map(|p| p.block)
            .collect();

        // Envelope per day: [earliest start, latest end) over occupied blocks.
        let mut envelopes: BTreeMap<&str, (i32, i32)> = BTreeMap::new();
        for &id in &occupied {
            if let Some(b) = self.blocks.get(&id) {
                let entry = envelopes
                    .entry(b.day.as_str())
                    .or_insert((b.start_offset_min(), b.end_offset_min()));
                entry.0 = entry.0.min(b.start_offset_min());
                entry.1 = entry.1.max(b.end_offset_min());
            }
        }

        let mut free = 0;
        for (day, (env_start, env_end)) in envelopes {
            for b in self.blocks.values() {
                if b.day == day
                    && b.start_offset_min() >= env_start
                    && b.end_offset_min() <= env_end
                    && !occupied.contains(&b.id)
                {
                    free += 1;
                }
            }
        }
        free
    }

    /// Removes all constraint data.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.professor_availability.clear();
        self.course_prerequisites.clear();
        self.course_groups.clear();
    }

    fn course_intervals(
        &self,
        course: NodeId,
        day: &str,
        assignments: &[Placement],
    ) -> Vec<(i32, i32)> {
        assignments
            .iter()
            .filter(|p| p.course == course)
            .filter_map(|p| self.blocks.get(&p.block))
            .filter(|b| b.day == day)
            .map(|b| (b.start_offset_min(), b.end_offset_min()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COURSE_A: NodeId = 100;
    const COURSE_B: NodeId = 101;
    const PROF: NodeId = 200;

    /// Five Monday blocks (07:00 through 11:35, 55 minutes each) and one
    /// Tuesday block, ids 1..=6.
    fn sample_store() -> ConstraintStore {
        let mut store = ConstraintStore::new();
        let times = [(7, 0, 7, 55), (7, 55, 8, 50), (8, 50, 9, 45), (9, 45, 10, 40), (10, 40, 11, 35)];
        for (i, (h1, m1, h2, m2)) in times.into_iter().enumerate() {
            store.add_time_block(TimeBlock::new(i + 1, "Monday", h1, m1, h2, m2));
        }
        store.add_time_block(TimeBlock::new(6, "Tuesday", 7, 0, 7, 55));
        for block in 1..=6 {
            store.add_professor_availability(PROF, block);
        }
        store.add_course_group(COURSE_A, 1);
        store.add_course_group(COURSE_B, 1);
        store
    }

    #[test]
    fn test_professor_availability() {
        let mut store = sample_store();
        assert!(store.professor_available(PROF, 1));
        assert!(!store.professor_available(PROF, 99));
        assert!(!store.professor_available(999, 1));
        assert_eq!(store.availability_count(PROF), 6);

        // Repeated insertion keeps the list stable.
        store.add_professor_availability(PROF, 1);
        assert_eq!(store.availability_count(PROF), 6);
    }

    #[test]
    fn test_is_valid_basic() {
        let store = sample_store();
        let placement = Placement::new(COURSE_A, 1, PROF);
        assert!(store.is_valid(&placement, &[]));

        // Unknown block and unknown professor both prune.
        assert!(!store.is_valid(&Placement::new(COURSE_A, 99, PROF), &[]));
        assert!(!store.is_valid(&Placement::new(COURSE_A, 1, 999), &[]));
    }

    #[test]
    fn test_professor_double_booking_rejected() {
        let store = sample_store();
        let existing = [Placement::new(COURSE_A, 1, PROF)];
        assert!(store.professor_conflict(PROF, 1, &existing));
        assert!(!store.is_valid(&Placement::new(COURSE_B, 1, PROF), &existing));
        // A different block of the same day is fine for the professor.
        assert!(!store.professor_conflict(PROF, 2, &existing));
    }

    #[test]
    fn test_group_conflict() {
        let store = sample_store();
        let existing = [Placement::new(COURSE_A, 1, PROF)];
        // Same group, same block: a clash even under a different professor.
        assert!(store.group_conflict(COURSE_B, 1, &existing));
        // A course with no registered group never clashes.
        assert!(!store.group_conflict(777, 1, &existing));
    }

    #[test]
    fn test_back_to_back_is_not_a_conflict() {
        let store = sample_store();
        let existing = [Placement::new(COURSE_A, 1, PROF)];
        assert!(!store.professor_conflict(PROF, 2, &existing));
        assert!(!store.group_conflict(COURSE_B, 2, &existing));
    }

    #[test]
    fn test_available_blocks_insertion_order() {
        let mut store = ConstraintStore::new();
        store.add_time_block(TimeBlock::new(1, "Monday", 7, 0, 7, 55));
        store.add_time_block(TimeBlock::new(2, "Monday", 7, 55, 8, 50));
        store.add_time_block(TimeBlock::new(3, "Monday", 8, 50, 9, 45));
        // Availability inserted out of grid order.
        store.add_professor_availability(PROF, 3);
        store.add_professor_availability(PROF, 1);
        store.add_professor_availability(PROF, 2);

        assert_eq!(store.available_blocks(COURSE_A, PROF, &[]), vec![3, 1, 2]);

        let existing = [Placement::new(COURSE_A, 1, PROF)];
        assert_eq!(
            store.available_blocks(COURSE_A, PROF, &existing),
            vec![3, 2]
        );
        assert!(store.available_blocks(COURSE_A, 999, &[]).is_empty());
    }

    #[test]
    fn test_next_consecutive_block() {
        let store = sample_store();
        assert_eq!(store.next_consecutive_block(1), Some(2));
        assert_eq!(store.next_consecutive_block(4), Some(5));
        // Last block of the day and unknown ids have no successor.
        assert_eq!(store.next_consecutive_block(5), None);
        assert_eq!(store.next_consecutive_block(99), None);
        // Tuesday block does not chain into Monday.
        assert_eq!(store.next_consecutive_block(6), None);
    }

    #[test]
    fn test_next_consecutive_block_ambiguous() {
        let mut store = sample_store();
        // A second block starting at 07:55 on Monday makes the successor
        // of block 1 ambiguous.
        store.add_time_block(TimeBlock::new(7, "Monday", 7, 55, 8, 50));
        assert_eq!(store.next_consecutive_block(1), None);
    }

    #[test]
    fn test_consecutive_hours() {
        let store = sample_store();
        let assignments = [
            Placement::new(COURSE_A, 1, PROF),
            Placement::new(COURSE_A, 2, PROF),
            Placement::new(COURSE_A, 4, PROF),
        ];
        assert_eq!(
            store.consecutive_hours_of_course(COURSE_A, "Monday", &assignments),
            2
        );
        assert_eq!(
            store.consecutive_hours_of_course(COURSE_A, "Tuesday", &assignments),
            0
        );
        assert_eq!(
            store.consecutive_hours_of_course(COURSE_B, "Monday", &assignments),
            0
        );
    }

    #[test]
    fn test_has_gaps() {
        let store = sample_store();
        // Blocks 1 and 3 leave block 2 idle in between.
        let gapped = [
            Placement::new(COURSE_A, 1, PROF),
            Placement::new(COURSE_A, 3, PROF),
        ];
        assert!(store.has_gaps_in_course(COURSE_A, "Monday", &gapped));

        let contiguous = [
            Placement::new(COURSE_A, 1, PROF),
            Placement::new(COURSE_A, 2, PROF),
        ];
        assert!(!store.has_gaps_in_course(COURSE_A, "Monday", &contiguous));
        assert!(!store.has_gaps_in_course(COURSE_A, "Monday", &[]));
    }

    #[test]
    fn test_free_hours_of_group() {
        let store = sample_store();
        // Group 1 occupies Monday blocks 1 and 3; block 2 is idle inside
        // the envelope, blocks 4 and 5 fall outside it.
        let assignments = [
            Placement::new(COURSE_A, 1, PROF),
            Placement::new(COURSE_B, 3, PROF),
        ];
        assert_eq!(store.free_hours_of_group(1, &assignments), 1);

        // Contiguous occupancy has no idle hours.
        let packed = [
            Placement::new(COURSE_A, 1, PROF),
            Placement::new(COURSE_B, 2, PROF),
        ];
        assert_eq!(store.free_hours_of_group(1, &packed), 0);
        assert_eq!(store.free_hours_of_group(9, &assignments), 0);
    }

    #[test]
    fn test_free_hours_span_multiple_days() {
        let store = sample_store();
        let assignments = [
            Placement::new(COURSE_A, 1, PROF),
            Placement::new(COURSE_A, 4, PROF),
            Placement::new(COURSE_B, 6, PROF),
        ];
        // Monday envelope covers blocks 1..4 with 2 and 3 idle; Tuesday has
        // a single block and no idle time.
        assert_eq!(store.free_hours_of_group(1, &assignments), 2);
    }

    #[test]
    fn test_check_prerequisites() {
        let mut store = sample_store();
        store.add_course_prerequisite(COURSE_B, COURSE_A);

        assert!(store.check_prerequisites(COURSE_A, &[]));
        assert!(!store.check_prerequisites(COURSE_B, &[]));

        let with_a = [Placement::new(COURSE_A, 1, PROF)];
        assert!(store.check_prerequisites(COURSE_B, &with_a));
    }

    #[test]
    fn test_clear() {
        let mut store = sample_store();
        store.clear();
        assert!(store.block(1).is_none());
        assert_eq!(store.availability_count(PROF), 0);
        assert!(store.group_of(COURSE_A).is_none());
    }
}
