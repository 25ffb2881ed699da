//! Schedule quality scoring.
//!
//! Maps an assignment set to a single number, higher is better. The engine
//! always prefers more assigned hours first; the score only breaks ties
//! between solutions of equal size. The function is a set function: the
//! result does not depend on the order of the assignment list.
//!
//! # Components
//!
//! | Term | Weight |
//! |------|--------|
//! | Assigned hour | +100 each |
//! | Start later than 07:00 | −50 per full hour past 07:00 |
//! | Group idle hour beyond the first | −200 each |
//! | Consecutive hours of one course beyond 3 | −500 each |
//! | Intra-day gap in a course | −30 per course and day |

use std::collections::BTreeSet;

use crate::constraints::{ConstraintStore, Placement};
use crate::graph::NodeId;

/// Minutes from midnight of the preferred earliest start (07:00).
const EARLY_START_MIN: i32 = 420;

/// Scores an assignment set. Higher is better.
pub fn score_assignments(store: &ConstraintStore, assignments: &[Placement]) -> i64 {
    let mut score = 100 * assignments.len() as i64;

    for p in assignments {
        if let Some(m) = store.start_minute_of(p.block) {
            if m > EARLY_START_MIN {
                score -= 50 * i64::from((m - EARLY_START_MIN) / 60);
            }
        }
    }

    let groups: BTreeSet<i64> = assignments
        .iter()
        .filter_map(|p| store.group_of(p.course))
        .collect();
    for group in groups {
        let free = store.free_hours_of_group(group, assignments) as i64;
        if free > 1 {
            score -= 200 * (free - 1);
        }
    }

    let courses: BTreeSet<NodeId> = assignments.iter().map(|p| p.course).collect();
    for course in courses {
        let days: BTreeSet<&str> = assignments
            .iter()
            .filter(|p| p.course == course)
            .filter_map(|p| store.day_of(p.block))
            .collect();
        for day in days {
            let run = store.consecutive_hours_of_course(course, day, assignments) as i64;
            if run > 3 {
                score -= 500 * (run - 3);
            }
            if store.has_gaps_in_course(course, day, assignments) {
                score -= 30;
            }
        }
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeBlock;

    const COURSE_A: NodeId = 100;
    const COURSE_B: NodeId = 101;
    const PROF: NodeId = 200;

    /// Six hour-aligned Monday blocks (07:00-13:00) and one Tuesday block.
    fn sample_store() -> ConstraintStore {
        let mut store = ConstraintStore::new();
        for i in 0..6 {
            let hour = 7 + i as i32;
            store.add_time_block(TimeBlock::new(i + 1, "Monday", hour, 0, hour + 1, 0));
        }
        store.add_time_block(TimeBlock::new(7, "Tuesday", 7, 0, 8, 0));
        store.add_course_group(COURSE_A, 1);
        store.add_course_group(COURSE_B, 1);
        store
    }

    #[test]
    fn test_empty_set_scores_zero() {
        let store = sample_store();
        assert_eq!(score_assignments(&store, &[]), 0);
    }

    #[test]
    fn test_single_early_hour() {
        let store = sample_store();
        let a = [Placement::new(COURSE_A, 1, PROF)];
        assert_eq!(score_assignments(&store, &a), 100);
    }

    #[test]
    fn test_late_start_penalty() {
        let store = sample_store();
        // 09:00 start is two full hours past 07:00.
        let a = [Placement::new(COURSE_A, 3, PROF)];
        assert_eq!(score_assignments(&store, &a), 100 - 50 * 2);
    }

    #[test]
    fn test_group_free_hours_penalty() {
        let store = sample_store();
        // Blocks 1 and 4 leave two idle hours in the group envelope; only
        // the second idle hour is penalized. Block 4 starts three hours
        // past 07:00.
        let a = [
            Placement::new(COURSE_A, 1, PROF),
            Placement::new(COURSE_B, 4, PROF),
        ];
        assert_eq!(score_assignments(&store, &a), 200 - 150 - 200);
    }

    #[test]
    fn test_long_run_penalty() {
        let store = sample_store();
        let a = [
            Placement::new(COURSE_A, 1, PROF),
            Placement::new(COURSE_A, 2, PROF),
            Placement::new(COURSE_A, 3, PROF),
            Placement::new(COURSE_A, 4, PROF),
        ];
        // 4 hours, late starts of 1+2+3 hours, one run of 4.
        assert_eq!(score_assignments(&store, &a), 400 - 300 - 500);
    }

    #[test]
    fn test_gap_penalty() {
        let store = sample_store();
        let a = [
            Placement::new(COURSE_A, 1, PROF),
            Placement::new(COURSE_A, 3, PROF),
        ];
        // One idle hour sits in the envelope (not beyond the first), the
        // 09:00 start costs two steps, and the course has a gap.
        assert_eq!(score_assignments(&store, &a), 200 - 100 - 30);
    }

    #[test]
    fn test_three_consecutive_hours_unpenalized() {
        let store = sample_store();
        let a = [
            Placement::new(COURSE_A, 1, PROF),
            Placement::new(COURSE_A, 2, PROF),
            Placement::new(COURSE_A, 3, PROF),
        ];
        assert_eq!(score_assignments(&store, &a), 300 - 50 - 100);
    }

    #[test]
    fn test_score_is_order_invariant() {
        let store = sample_store();
        let mut a = vec![
            Placement::new(COURSE_A, 1, PROF),
            Placement::new(COURSE_A, 3, PROF),
            Placement::new(COURSE_B, 4, PROF),
            Placement::new(COURSE_B, 7, PROF),
        ];
        let forward = score_assignments(&store, &a);
        a.reverse();
        assert_eq!(score_assignments(&store, &a), forward);
        a.swap(0, 2);
        assert_eq!(score_assignments(&store, &a), forward);
    }
}
