//! Schedule generation engine.
//!
//! [`ScheduleEngine`] is the single object a driver talks to: it is loaded
//! with time blocks, professors, and courses (in that order, since later
//! loaders reference earlier ids), courses are routed to professors, and
//! [`ScheduleEngine::generate_schedule`] runs the backtracking search under
//! a time budget with cooperative cancellation.
//!
//! External ids belong to the driver; the engine keeps bijections to its
//! internal graph ids and converts results back on the way out. The engine
//! never panics and never returns `Err`: every outcome, including bad
//! input, is reported through [`ScheduleResult`].

mod search;

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::constraints::ConstraintStore;
use crate::graph::{Graph, NodeId, NodeType};
use crate::models::{Assignment, ScheduleResult, TimeBlock};
use crate::validation::validate_input;

use search::{BestSolution, CourseEntry, SearchPass};

/// Option count assumed for courses that have no professor yet, so they
/// sort as maximally flexible under easiest-first ordering.
const UNROUTED_OPTIONS: usize = 1000;

/// Which soft constraints are promoted to hard ones during search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Strictness {
    /// Daily cap of 3, bounded runs, tight group envelopes, no gaps.
    Strict,
    /// Quality constraints influence the score but are not enforced.
    Relaxed,
    /// Only hard legality; first layout wins.
    Greedy,
    /// Same enforcement as greedy, for last-resort runs.
    Emergency,
}

impl Strictness {
    /// Maps a numeric level (1-4) to a strictness, clamping out-of-range
    /// values to the nearest end.
    pub fn from_level(level: i32) -> Self {
        match level {
            l if l <= 1 => Self::Strict,
            2 => Self::Relaxed,
            3 => Self::Greedy,
            _ => Self::Emergency,
        }
    }

    /// The numeric level of this strictness (1-4).
    pub fn level(self) -> i32 {
        match self {
            Self::Strict => 1,
            Self::Relaxed => 2,
            Self::Greedy => 3,
            Self::Emergency => 4,
        }
    }

    /// Most hours one course may occupy on a single day.
    pub(crate) fn daily_cap(self) -> usize {
        if self == Self::Strict {
            3
        } else {
            8
        }
    }
}

/// How courses are ordered before the descent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CourseOrdering {
    /// Courses with the most initially available blocks first, maximizing
    /// the number of courses a partial schedule covers.
    #[default]
    EasiestFirst,
    /// Prerequisite courses first (topological); falls back to load order
    /// when the prerequisite relation is cyclic.
    Prerequisite,
}

/// Parameters of one generation run.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Wall-clock budget in seconds; 0 means unbounded.
    pub time_limit_secs: u64,
    /// Constraint enforcement level.
    pub strictness: Strictness,
    /// Seed for restart-pass shuffling; equal seeds reproduce runs exactly.
    pub seed: u64,
    /// Course ordering strategy.
    pub ordering: CourseOrdering,
}

impl GenerateRequest {
    /// Creates a request with defaults: unbounded, strict, seed 0,
    /// easiest-first.
    pub fn new() -> Self {
        Self {
            time_limit_secs: 0,
            strictness: Strictness::Strict,
            seed: 0,
            ordering: CourseOrdering::EasiestFirst,
        }
    }

    /// Sets the time budget in seconds.
    pub fn with_time_limit(mut self, secs: u64) -> Self {
        self.time_limit_secs = secs;
        self
    }

    /// Sets the strictness level.
    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    /// Sets the shuffle seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the course ordering strategy.
    pub fn with_ordering(mut self, ordering: CourseOrdering) -> Self {
        self.ordering = ordering;
        self
    }
}

impl Default for GenerateRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle for cancelling a running generation from another
/// thread. The running search observes the signal within one search step.
#[derive(Debug, Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    /// Requests that the current generation stop.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

/// The timetable generation engine.
///
/// Owns the entity graph, the constraint store, and the external/internal
/// id bijections. The graph and store are read-only during search; the
/// search mutates only its own assignment stack.
#[derive(Debug, Default)]
pub struct ScheduleEngine {
    graph: Graph,
    store: ConstraintStore,
    course_ids: HashMap<i64, NodeId>,
    professor_ids: HashMap<i64, NodeId>,
    block_ids: HashMap<i64, NodeId>,
    external_ids: HashMap<NodeId, i64>,
    stop_flag: Arc<AtomicBool>,
}

impl ScheduleEngine {
    /// Creates an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a time block. Blocks must be loaded before the professors and
    /// courses that reference them.
    ///
    /// `day` is a free-form label compared case-sensitively everywhere.
    pub fn load_time_block(
        &mut self,
        id: i64,
        day: &str,
        start_hour: i32,
        start_minute: i32,
        end_hour: i32,
        end_minute: i32,
    ) {
        let node = self.graph.add_node(NodeType::TimeBlock, day);
        if let Some(n) = self.graph.node_mut(node) {
            n.set_attribute("id", id.to_string());
        }
        self.block_ids.insert(id, node);
        self.external_ids.insert(node, id);
        self.store.add_time_block(TimeBlock::new(
            node,
            day,
            start_hour,
            start_minute,
            end_hour,
            end_minute,
        ));
    }

    /// Loads a professor with the blocks they can teach. Block ids that
    /// were never loaded are dropped.
    pub fn load_professor(&mut self, id: i64, name: impl Into<String>, available_blocks: &[i64]) {
        let node = self.graph.add_node(NodeType::Professor, name);
        if let Some(n) = self.graph.node_mut(node) {
            n.set_attribute("id", id.to_string());
        }
        self.professor_ids.insert(id, node);
        self.external_ids.insert(node, id);
        for &block in available_blocks {
            match self.block_ids.get(&block) {
                Some(&block_node) => self.store.add_professor_availability(node, block_node),
                None => debug!("professor {id}: dropping unknown block id {block}"),
            }
        }
    }

    /// Loads a course. `enrollment` is stored for future use but does not
    /// influence the search. Prerequisite ids that were never loaded are
    /// dropped; `duration` is clamped to at least one block.
    pub fn load_course(
        &mut self,
        id: i64,
        name: impl Into<String>,
        enrollment: i32,
        prerequisites: &[i64],
        group_id: i64,
        duration: i32,
    ) {
        let duration = duration.max(1);
        let node = self.graph.add_node(NodeType::Course, name);
        if let Some(n) = self.graph.node_mut(node) {
            n.set_attribute("id", id.to_string());
            n.set_attribute("enrollment", enrollment.to_string());
            n.set_attribute("groupId", group_id.to_string());
            n.set_attribute("duration", duration.to_string());
        }
        self.course_ids.insert(id, node);
        self.external_ids.insert(node, id);
        self.store.add_course_group(node, group_id);

        for &prereq in prerequisites {
            match self.course_ids.get(&prereq) {
                Some(&prereq_node) => {
                    self.store.add_course_prerequisite(node, prereq_node);
                    let _ = self.graph.add_edge(node, prereq_node);
                }
                None => debug!("course {id}: dropping unresolved prerequisite {prereq}"),
            }
        }
    }

    /// Routes a course to its professor. Unknown ids are ignored.
    pub fn assign_professor_to_course(&mut self, course_id: i64, professor_id: i64) {
        let (Some(&course), Some(&professor)) = (
            self.course_ids.get(&course_id),
            self.professor_ids.get(&professor_id),
        ) else {
            debug!("ignoring assignment of professor {professor_id} to course {course_id}");
            return;
        };
        let _ = self.graph.add_edge(course, professor);
    }

    /// Generates a schedule without progress reporting.
    pub fn generate_schedule(&mut self, request: &GenerateRequest) -> ScheduleResult {
        self.generate_schedule_with_progress(request, |_, _, _| {})
    }

    /// Generates a schedule, reporting progress at every search frame.
    ///
    /// The callback receives `(current_course_index, course_total, message)`
    /// and is invoked synchronously on the calling thread.
    pub fn generate_schedule_with_progress(
        &mut self,
        request: &GenerateRequest,
        mut on_progress: impl FnMut(usize, usize, &str),
    ) -> ScheduleResult {
        let started = Instant::now();
        self.stop_flag.store(false, Ordering::Release);

        if let Err(errors) = validate_input(&self.graph) {
            let message = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            return ScheduleResult::failure(message);
        }

        let courses = self.order_courses(self.course_entries(), request.ordering);
        let total = courses.len();
        info!(
            "generating schedule: {total} courses, strictness {:?}, time limit {}s",
            request.strictness, request.time_limit_secs
        );
        on_progress(0, total, "Starting schedule generation...");

        let deadline = (request.time_limit_secs > 0)
            .then(|| started + Duration::from_secs(request.time_limit_secs));
        let mut rng = StdRng::seed_from_u64(request.seed);
        let mut best = BestSolution::default();
        let mut backtracks: u64 = 0;
        let mut timed_out = false;
        let mut use_random = false;
        let mut passes: u32 = 0;
        let mut completed = false;

        loop {
            passes += 1;
            let pass = SearchPass {
                store: &self.store,
                courses: &courses,
                strictness: request.strictness,
                stop: &self.stop_flag,
                deadline,
                shuffle: use_random.then_some(&mut rng),
                backtracks: &mut backtracks,
                best: &mut best,
                on_progress: &mut on_progress,
                assignments: Vec::new(),
                timed_out: false,
            };
            let outcome = pass.run();
            timed_out |= outcome.timed_out;
            best.offer_scored(&self.store, &outcome.assignments);
            debug!(
                "pass {passes}: {} placements, complete: {}",
                outcome.assignments.len(),
                outcome.complete
            );

            if self.stop_flag.load(Ordering::Acquire) {
                break;
            }
            if request.strictness >= Strictness::Greedy || outcome.complete {
                completed |= outcome.complete;
                break;
            }
            let Some(deadline) = deadline else {
                // Restarts only spend leftover budget; an unbounded run is
                // a single deterministic pass.
                break;
            };
            if Instant::now() >= deadline {
                timed_out = true;
                break;
            }
            use_random = true;
        }

        let placed = best.course_count();
        let user_stopped = self.stop_flag.load(Ordering::Acquire) && !timed_out;
        let success = completed && placed == total && !timed_out && !user_stopped;

        let assignments: Vec<Assignment> = best
            .placements
            .iter()
            .map(|p| {
                Assignment::new(
                    self.external_id(p.course),
                    self.external_id(p.block),
                    self.external_id(p.professor),
                )
            })
            .collect();

        let error_message = if success {
            String::new()
        } else if user_stopped {
            format!("Schedule generation stopped by user ({placed}/{total} courses placed).")
        } else if timed_out {
            format!(
                "Time limit of {}s reached ({placed}/{total} courses placed).",
                request.time_limit_secs
            )
        } else if !assignments.is_empty() {
            format!("Partial schedule generated ({placed}/{total} courses placed).")
        } else {
            "No valid schedule could be found with the given constraints.".to_string()
        };

        if success {
            on_progress(total, total, "Schedule generated successfully.");
        }
        info!(
            "generation finished after {passes} pass(es): {placed}/{total} courses, {} steps",
            backtracks
        );

        ScheduleResult {
            success,
            assignments,
            error_message,
            backtrack_count: backtracks,
            computation_time_seconds: started.elapsed().as_secs_f64(),
        }
    }

    /// Requests that the next generation stop. While a generation is
    /// running the engine is exclusively borrowed, so concurrent callers
    /// cancel through a [`ScheduleEngine::stop_handle`] taken beforehand.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    /// Returns a handle that can cancel a running generation from another
    /// thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flag: Arc::clone(&self.stop_flag),
        }
    }

    /// Clears all loaded data and search state.
    pub fn reset(&mut self) {
        self.graph.clear();
        self.store.clear();
        self.course_ids.clear();
        self.professor_ids.clear();
        self.block_ids.clear();
        self.external_ids.clear();
        self.stop_flag.store(false, Ordering::Release);
    }

    /// Whether any entity has been loaded.
    pub fn has_data(&self) -> bool {
        !self.graph.is_empty()
    }

    /// Checks that generation can be attempted. Returns an empty string
    /// when the data is sufficient, otherwise the joined problem list.
    pub fn validate_data(&self) -> String {
        match validate_input(&self.graph) {
            Ok(()) => String::new(),
            Err(errors) => errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Heuristic explanation of why a run did not complete: professors
    /// whose routed courses need more blocks than they can teach.
    pub fn analyze_failure(&self) -> String {
        let mut analysis = String::from("Failure analysis:\n");
        for professor in self.graph.nodes_by_type(NodeType::Professor) {
            let routed: Vec<NodeId> = self
                .graph
                .reverse_neighbors(professor)
                .into_iter()
                .filter(|&n| {
                    self.graph
                        .node(n)
                        .is_some_and(|node| node.node_type == NodeType::Course)
                })
                .collect();
            if routed.is_empty() {
                continue;
            }
            let hours_needed: usize = routed.iter().map(|&c| self.duration_of(c)).sum();
            let available = self.store.availability_count(professor);
            let name = self
                .graph
                .node(professor)
                .map(|n| n.name.clone())
                .unwrap_or_default();
            if hours_needed > available {
                let _ = writeln!(
                    analysis,
                    "- Professor {name} carries {} course(s) needing {hours_needed} blocks but is only available for {available}.",
                    routed.len()
                );
            } else {
                let _ = writeln!(
                    analysis,
                    "- Professor {name} carries {} course(s) needing {hours_needed} of {available} available blocks.",
                    routed.len()
                );
            }
        }
        analysis.push_str(
            "\nSuggestion: widen the availability of the professors listed above or route fewer courses to them.",
        );
        analysis
    }

    /// The entity graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The constraint store.
    pub fn store(&self) -> &ConstraintStore {
        &self.store
    }

    /// Internal node id of a course, by external id.
    pub fn course_node(&self, id: i64) -> Option<NodeId> {
        self.course_ids.get(&id).copied()
    }

    /// Internal node id of a professor, by external id.
    pub fn professor_node(&self, id: i64) -> Option<NodeId> {
        self.professor_ids.get(&id).copied()
    }

    /// Internal node id of a time block, by external id.
    pub fn block_node(&self, id: i64) -> Option<NodeId> {
        self.block_ids.get(&id).copied()
    }

    fn external_id(&self, node: NodeId) -> i64 {
        self.external_ids.get(&node).copied().unwrap_or(-1)
    }

    /// First professor the course is routed to, ignoring prerequisite
    /// edges that share the adjacency list.
    fn professor_of(&self, course: NodeId) -> Option<NodeId> {
        self.graph.neighbors(course).iter().copied().find(|&n| {
            self.graph
                .node(n)
                .is_some_and(|node| node.node_type == NodeType::Professor)
        })
    }

    /// Weekly duration parsed from the course node; malformed or missing
    /// values fall back to one block.
    fn duration_of(&self, course: NodeId) -> usize {
        self.graph
            .node(course)
            .and_then(|n| n.attribute("duration"))
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&d| d >= 1)
            .unwrap_or(1)
    }

    fn course_entries(&self) -> Vec<CourseEntry> {
        self.graph
            .nodes_by_type(NodeType::Course)
            .into_iter()
            .map(|node| CourseEntry {
                node,
                name: self
                    .graph
                    .node(node)
                    .map(|n| n.name.clone())
                    .unwrap_or_default(),
                professor: self.professor_of(node),
                duration: self.duration_of(node),
            })
            .collect()
    }

    fn order_courses(
        &self,
        entries: Vec<CourseEntry>,
        ordering: CourseOrdering,
    ) -> Vec<CourseEntry> {
        match ordering {
            CourseOrdering::EasiestFirst => {
                let mut scored: Vec<(usize, CourseEntry)> = entries
                    .into_iter()
                    .map(|entry| {
                        let options = match entry.professor {
                            Some(professor) => self
                                .store
                                .available_blocks(entry.node, professor, &[])
                                .len(),
                            None => UNROUTED_OPTIONS,
                        };
                        (options, entry)
                    })
                    .collect();
                // Stable sort: equally flexible courses keep load order.
                scored.sort_by(|a, b| b.0.cmp(&a.0));
                scored.into_iter().map(|(_, entry)| entry).collect()
            }
            CourseOrdering::Prerequisite => match self.graph.topological_sort() {
                Ok(order) => {
                    let position: HashMap<NodeId, usize> =
                        order.iter().enumerate().map(|(i, &n)| (n, i)).collect();
                    let mut entries = entries;
                    // Edges point course -> prerequisite, so the reversed
                    // topological position puts prerequisites first.
                    entries.sort_by_key(|e| std::cmp::Reverse(position[&e.node]));
                    entries
                }
                Err(_) => entries,
            },
        }
    }
}
