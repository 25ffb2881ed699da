//! Backtracking descent with chunked placement.
//!
//! One [`SearchPass`] owns a mutable assignment stack and borrows the
//! constraint store immutably. Courses are visited in the order chosen by
//! the engine; each course's weekly hours are partitioned into chunks of up
//! to three consecutive blocks on one day, committed chunk by chunk and
//! popped on dead ends. A course that cannot be placed is skipped, never
//! fatal, so a pass always produces the best layout it reached.
//!
//! # Reference
//! Russell & Norvig (2020), "Artificial Intelligence: A Modern Approach",
//! Ch. 6: Constraint Satisfaction Problems

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::Strictness;
use crate::constraints::{ConstraintStore, Placement};
use crate::graph::NodeId;
use crate::scoring::score_assignments;

/// How often the deadline is consulted, in search steps.
const TIME_CHECK_INTERVAL: u64 = 1000;

/// Upper bound on consecutive blocks committed at once.
const MAX_CHUNK: usize = 3;

/// A course prepared for search: resolved professor and parsed duration.
pub(crate) struct CourseEntry {
    pub node: NodeId,
    pub name: String,
    pub professor: Option<NodeId>,
    pub duration: usize,
}

/// Best solution seen so far, across passes.
///
/// Primary criterion is assignment count; score breaks ties.
pub(crate) struct BestSolution {
    pub placements: Vec<Placement>,
    pub score: i64,
}

impl Default for BestSolution {
    fn default() -> Self {
        Self {
            placements: Vec::new(),
            score: i64::MIN,
        }
    }
}

impl BestSolution {
    /// Mid-search snapshot: replaces only on a strictly larger stack.
    pub fn offer_snapshot(&mut self, store: &ConstraintStore, candidate: &[Placement]) {
        if candidate.len() > self.placements.len() {
            self.placements = candidate.to_vec();
            self.score = score_assignments(store, candidate);
        }
    }

    /// End-of-pass comparison: larger stack wins, score breaks ties.
    pub fn offer_scored(&mut self, store: &ConstraintStore, candidate: &[Placement]) {
        if candidate.len() > self.placements.len() {
            self.placements = candidate.to_vec();
            self.score = score_assignments(store, candidate);
        } else if candidate.len() == self.placements.len() {
            let score = score_assignments(store, candidate);
            if score > self.score {
                self.placements = candidate.to_vec();
                self.score = score;
            }
        }
    }

    /// Number of distinct courses in the best solution.
    pub fn course_count(&self) -> usize {
        let courses: HashSet<NodeId> = self.placements.iter().map(|p| p.course).collect();
        courses.len()
    }
}

/// What one pass produced.
pub(crate) struct PassOutcome {
    pub assignments: Vec<Placement>,
    /// Every course received its full weekly hours.
    pub complete: bool,
    /// The deadline tripped during this pass.
    pub timed_out: bool,
}

/// One full descent over the ordered course list.
pub(crate) struct SearchPass<'a> {
    pub store: &'a ConstraintStore,
    pub courses: &'a [CourseEntry],
    pub strictness: Strictness,
    pub stop: &'a AtomicBool,
    pub deadline: Option<Instant>,
    /// `Some` on restart passes: candidate blocks are shuffled instead of
    /// sorted by start time.
    pub shuffle: Option<&'a mut StdRng>,
    pub backtracks: &'a mut u64,
    pub best: &'a mut BestSolution,
    pub on_progress: &'a mut dyn FnMut(usize, usize, &str),
    pub assignments: Vec<Placement>,
    pub timed_out: bool,
}

impl<'a> SearchPass<'a> {
    /// Runs the descent to completion, a dead end, or a stop signal.
    pub fn run(mut self) -> PassOutcome {
        let finished = self.descend(0);
        let placed: HashSet<NodeId> = self.assignments.iter().map(|p| p.course).collect();
        PassOutcome {
            complete: finished && placed.len() == self.courses.len(),
            assignments: self.assignments,
            timed_out: self.timed_out,
        }
    }

    fn descend(&mut self, index: usize) -> bool {
        *self.backtracks += 1;
        if self.should_stop() {
            return false;
        }
        if index >= self.courses.len() {
            return true;
        }
        if self.assignments.len() > self.best.placements.len() {
            self.best.offer_snapshot(self.store, &self.assignments);
        }

        let course = &self.courses[index];
        (self.on_progress)(
            index,
            self.courses.len(),
            &format!("Scheduling: {}", course.name),
        );

        let Some(professor) = course.professor else {
            // Unrouted course: leave it out of the schedule entirely.
            return self.descend(index + 1);
        };

        if self.place_course(index, professor, course.duration) {
            return true;
        }
        // Best effort: skip the course and keep what is already placed.
        self.descend(index + 1)
    }

    fn place_course(&mut self, index: usize, professor: NodeId, remaining: usize) -> bool {
        *self.backtracks += 1;
        if self.should_stop() {
            return false;
        }
        if remaining == 0 {
            return self.descend(index + 1);
        }

        let course = self.courses[index].node;
        let mut candidates = self
            .store
            .available_blocks(course, professor, &self.assignments);
        match self.shuffle.as_deref_mut() {
            Some(rng) => candidates.shuffle(rng),
            None => candidates.sort_by_key(|&b| self.store.start_minute_of(b).unwrap_or(i32::MAX)),
        }

        let cap = self.strictness.daily_cap();
        for start in candidates {
            let Some(day) = self.store.day_of(start).map(str::to_owned) else {
                continue;
            };
            let used_today = self
                .assignments
                .iter()
                .filter(|p| p.course == course && self.store.day_of(p.block) == Some(day.as_str()))
                .count();
            if used_today >= cap {
                continue;
            }
            if !self
                .store
                .is_valid(&Placement::new(course, start, professor), &self.assignments)
            {
                continue;
            }

            let max_chunk = remaining.min(cap - used_today).min(MAX_CHUNK);
            for size in (1..=max_chunk).rev() {
                let Some(chunk) = self.build_chunk(course, professor, start, size) else {
                    continue;
                };

                for &block in &chunk {
                    self.assignments.push(Placement::new(course, block, professor));
                }
                *self.backtracks += size as u64;

                if self.post_checks_pass(course, &day)
                    && self.place_course(index, professor, remaining - size)
                {
                    return true;
                }

                self.assignments.truncate(self.assignments.len() - chunk.len());
            }
        }

        false
    }

    /// Extends `start` into `size` consecutive blocks, all admissible
    /// against the current stack. `None` when the chain breaks.
    fn build_chunk(
        &self,
        course: NodeId,
        professor: NodeId,
        start: NodeId,
        size: usize,
    ) -> Option<Vec<NodeId>> {
        let mut chunk = vec![start];
        let mut cursor = start;
        for _ in 1..size {
            let next = self.store.next_consecutive_block(cursor)?;
            if !self
                .store
                .is_valid(&Placement::new(course, next, professor), &self.assignments)
            {
                return None;
            }
            cursor = next;
            chunk.push(next);
        }
        Some(chunk)
    }

    /// Constraints promoted to hard under Strict, evaluated after a chunk
    /// commit: bounded daily runs, at most one idle group hour, no
    /// intra-day gaps.
    fn post_checks_pass(&self, course: NodeId, day: &str) -> bool {
        if self.strictness != Strictness::Strict {
            return true;
        }
        if self
            .store
            .consecutive_hours_of_course(course, day, &self.assignments)
            > MAX_CHUNK
        {
            return false;
        }
        if let Some(group) = self.store.group_of(course) {
            if self.store.free_hours_of_group(group, &self.assignments) > 1 {
                return false;
            }
        }
        !self.store.has_gaps_in_course(course, day, &self.assignments)
    }

    fn should_stop(&mut self) -> bool {
        if self.stop.load(Ordering::Acquire) {
            return true;
        }
        if let Some(deadline) = self.deadline {
            if *self.backtracks % TIME_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
                self.timed_out = true;
                self.stop.store(true, Ordering::Release);
                return true;
            }
        }
        false
    }
}
