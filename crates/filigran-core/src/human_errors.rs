// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-language error messages for the command line.
//
// Every error is mapped to a short summary plus an actionable suggestion. The
// severity drives the process exit code and whether the run summary is shown.

use crate::error::FiligranError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// One page was skipped; the run carried on.
    PageSkipped,
    /// The command line or an input file needs fixing before rerunning.
    ActionRequired,
    /// The run stopped part-way; it can be resumed from a page boundary.
    Resumable,
    /// Internal inconsistency; rerunning will not help.
    Bug,
}

/// A human-readable error with a plain summary and a suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    pub message: String,
    pub suggestion: String,
    pub severity: Severity,
}

impl HumanError {
    fn new(message: impl Into<String>, suggestion: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            severity,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self.severity {
            Severity::PageSkipped => 0,
            Severity::ActionRequired => 2,
            Severity::Resumable => 3,
            Severity::Bug => 70,
        }
    }
}

/// Convert a `FiligranError` into a `HumanError`.
pub fn humanize_error(err: &FiligranError) -> HumanError {
    use Severity::*;

    match err {
        FiligranError::InputFile(detail) => HumanError::new(
            "The input PDF could not be opened.",
            format!("Check the path and that the file is a readable, unencrypted PDF. ({detail})"),
            ActionRequired,
        ),

        FiligranError::PageRange {
            start,
            end,
            page_count,
        } => HumanError::new(
            format!("Pages {start} to {end} are not in this document."),
            format!(
                "Page numbers start at 0; this document has pages 0 to {}.",
                page_count.saturating_sub(1)
            ),
            ActionRequired,
        ),

        FiligranError::InvalidColor(value) => HumanError::new(
            format!("'{value}' is not a colour."),
            "Write colours as R,G,B with each value between 0 and 255, e.g. 200,200,200.",
            ActionRequired,
        ),

        FiligranError::InvalidTolerance(value) => HumanError::new(
            format!("Tolerance {value} is out of range."),
            "Use a value between 0 (exact colour only) and 1 (every colour). 0.1 is a good start.",
            ActionRequired,
        ),

        FiligranError::InvalidDpi(_) => HumanError::new(
            "The DPI must be a positive number.",
            "150-300 DPI suits most documents; higher values resolve thin strokes but use more memory.",
            ActionRequired,
        ),

        FiligranError::InvalidBatchSize(_) => HumanError::new(
            "The batch size must be at least 1.",
            "Lower batch sizes use less memory; 10 is the default.",
            ActionRequired,
        ),

        FiligranError::NoTargetColors => HumanError::new(
            "No watermark colours were given.",
            "Pass --colors with one or more R,G,B values. Run with --page N --color-mode to see a page's colours.",
            ActionRequired,
        ),

        FiligranError::PageRender { page, reason } => HumanError::new(
            format!("Page {page} was skipped because it could not be rendered."),
            format!("The page may be damaged or empty. ({reason})"),
            PageSkipped,
        ),

        FiligranError::BatchFailed {
            resume_from,
            reason,
            ..
        } => HumanError::new(
            "Processing stopped part-way through a batch.",
            format!(
                "Free some memory or lower --dpi/--batch-size, then rerun with --start-page {resume_from}. ({reason})"
            ),
            Resumable,
        ),

        FiligranError::Cancelled { resume_from } => HumanError::new(
            "Processing was cancelled.",
            format!("Rerun with --start-page {resume_from} to continue."),
            Resumable,
        ),

        FiligranError::OrderViolation { .. } => HumanError::new(
            "Pages were assembled out of order.",
            "This is a bug; please report it with the command line you used.",
            Bug,
        ),

        FiligranError::PatternArity { .. } => HumanError::new(
            "The pattern lists have different lengths.",
            "Give exactly one --text-patterns entry and one --descriptions entry per --add-patterns index.",
            ActionRequired,
        ),

        FiligranError::MalformedPatternFile(detail) => HumanError::new(
            "The pattern file could not be read.",
            format!("It must be a JSON array of {{id, text, structural_descriptor, description}} objects. ({detail})"),
            ActionRequired,
        ),

        FiligranError::DuplicateId(id) => HumanError::new(
            format!("A pattern with id {id} already exists."),
            "Remove the existing pattern or choose another id.",
            ActionRequired,
        ),

        FiligranError::UnknownPattern(id) => HumanError::new(
            format!("There is no pattern with id {id}."),
            "List the pattern file to see which ids exist.",
            ActionRequired,
        ),

        FiligranError::UnknownElement { page, index, available } => HumanError::new(
            format!("Element {index} does not exist on page {page}."),
            format!("That page has {available} elements; run with --page {page} to list them."),
            ActionRequired,
        ),

        FiligranError::NoPatterns => HumanError::new(
            "No watermark patterns are defined.",
            "Add patterns with --add-patterns or load them with --load-patterns.",
            ActionRequired,
        ),

        FiligranError::Pdf(_) => HumanError::new(
            "The PDF could not be processed.",
            "The file may be damaged. Try re-saving it with another PDF tool first.",
            ActionRequired,
        ),

        FiligranError::Image(_) => HumanError::new(
            "A page image could not be processed.",
            "Try a lower --dpi.",
            ActionRequired,
        ),

        FiligranError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError::new(
                "A file could not be found.",
                "Check the path and try again.",
                ActionRequired,
            ),
            std::io::ErrorKind::PermissionDenied => HumanError::new(
                "Permission was denied reading or writing a file.",
                "Check the file permissions or choose another output location.",
                ActionRequired,
            ),
            _ => HumanError::new(
                "There was a problem reading or writing a file.",
                "Check that the disk is not full and try again.",
                ActionRequired,
            ),
        },

        FiligranError::Serialization(_) => HumanError::new(
            "The pattern data could not be converted to JSON.",
            "Try again. If this keeps happening, please report it.",
            Bug,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_failures_do_not_fail_the_run() {
        let err = FiligranError::PageRender {
            page: 4,
            reason: "zero-size page".into(),
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::PageSkipped);
        assert_eq!(human.exit_code(), 0);
        assert!(human.message.contains('4'));
    }

    #[test]
    fn cancellation_suggests_resume_point() {
        let human = humanize_error(&FiligranError::Cancelled { resume_from: 20 });
        assert_eq!(human.severity, Severity::Resumable);
        assert!(human.suggestion.contains("--start-page 20"));
    }

    #[test]
    fn order_violation_is_a_bug() {
        let human = humanize_error(&FiligranError::OrderViolation { previous: 3, got: 2 });
        assert_eq!(human.severity, Severity::Bug);
        assert_ne!(human.exit_code(), 0);
    }

    #[test]
    fn page_range_lists_valid_pages() {
        let human = humanize_error(&FiligranError::PageRange {
            start: 0,
            end: 12,
            page_count: 10,
        });
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(human.suggestion.contains("0 to 9"));
    }
}
