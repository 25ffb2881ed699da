//! Input validation for schedule generation.
//!
//! Checks that the loaded data can support a generation run at all.
//! Deeper structural degradations (cyclic prerequisites, courses without a
//! professor) are not errors: the engine handles them by falling back to
//! insertion order and by skipping the affected courses.

use crate::graph::{Graph, NodeType};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// No courses have been loaded.
    NoCourses,
    /// No professors have been loaded.
    NoProfessors,
    /// No time blocks have been loaded.
    NoTimeBlocks,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates that the graph holds enough data to attempt a schedule.
///
/// # Returns
/// `Ok(())` if generation can start, `Err(errors)` with all detected issues.
pub fn validate_input(graph: &Graph) -> ValidationResult {
    let mut errors = Vec::new();

    if graph.nodes_by_type(NodeType::Course).is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::NoCourses,
            "No courses loaded.",
        ));
    }
    if graph.nodes_by_type(NodeType::Professor).is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::NoProfessors,
            "No professors loaded.",
        ));
    }
    if graph.nodes_by_type(NodeType::TimeBlock).is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::NoTimeBlocks,
            "No time blocks loaded.",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
