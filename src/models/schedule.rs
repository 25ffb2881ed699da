//! Schedule (solution) model.
//!
//! [`Assignment`] records one scheduled hour of a course in caller-facing
//! (external) ids; [`ScheduleResult`] is the full outcome of a generation
//! run, including diagnostics. A course appears in a result either with
//! exactly as many assignments as its weekly duration or not at all.

use serde::{Deserialize, Serialize};

/// One scheduled hour: a course placed on a time block with its professor.
///
/// All three ids are external (driver-supplied). Two assignments are equal
/// iff all three ids match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    /// External course id.
    pub course_id: i64,
    /// External time block id.
    pub block_id: i64,
    /// External professor id.
    pub professor_id: i64,
}

impl Assignment {
    /// Creates a new assignment.
    pub fn new(course_id: i64, block_id: i64, professor_id: i64) -> Self {
        Self {
            course_id,
            block_id,
            professor_id,
        }
    }
}

/// Outcome of one schedule generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleResult {
    /// Whether every course received its full weekly hours without the run
    /// being stopped or timing out.
    pub success: bool,
    /// The best assignment set found, in external ids.
    pub assignments: Vec<Assignment>,
    /// Empty on full success; otherwise a human-readable diagnostic.
    pub error_message: String,
    /// Number of search steps taken across all passes.
    pub backtrack_count: u64,
    /// Wall-clock time spent generating, in seconds.
    pub computation_time_seconds: f64,
}

impl ScheduleResult {
    /// Creates a failed result carrying only a diagnostic message.
    pub(crate) fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: message.into(),
            ..Self::default()
        }
    }

    /// Number of distinct courses in the result.
    pub fn course_count(&self) -> usize {
        let mut courses: Vec<i64> = self.assignments.iter().map(|a| a.course_id).collect();
        courses.sort_unstable();
        courses.dedup();
        courses.len()
    }
}
