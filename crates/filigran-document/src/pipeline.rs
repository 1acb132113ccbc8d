// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Removal pipeline — run a page transform through the batch scheduler into
// the assembler and summarise what happened.

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use filigran_core::error::{FiligranError, Result};
use filigran_core::types::PageRange;

use crate::batch::{
    BatchScheduler, CancelToken, PageContent, PageTransform, ProcessedPage, SkippedPage,
};
use crate::pattern::{PatternRegistry, filter};
use crate::pdf::assembler::DocumentAssembler;
use crate::pdf::source::PdfSource;

/// Pattern-mode page transform: drop every element a registered pattern
/// claims from the page's content stream.
pub struct PatternRemoval<'a> {
    source: &'a PdfSource,
    registry: &'a PatternRegistry,
}

impl<'a> PatternRemoval<'a> {
    /// Fails with `NoPatterns` when there is nothing to match against.
    pub fn new(source: &'a PdfSource, registry: &'a PatternRegistry) -> Result<Self> {
        if registry.is_empty() {
            return Err(FiligranError::NoPatterns);
        }
        Ok(Self { source, registry })
    }
}

impl PageTransform for PatternRemoval<'_> {
    fn transform(&mut self, page: u32) -> Result<ProcessedPage> {
        let contents = self.source.page_contents(page)?;
        let outcome = filter(&contents.elements, self.registry);
        if outcome.removed.is_empty() {
            return Ok(ProcessedPage {
                index: page,
                content: PageContent::Unchanged,
                changes: 0,
            });
        }

        for removed in &outcome.removed {
            debug!(
                page,
                element = removed.element.index,
                kind = %removed.element.kind,
                pattern = removed.pattern_id,
                "Element removed"
            );
        }

        let removed = outcome.removed_indices();
        let stream = contents
            .without(&removed)
            .map_err(|err| FiligranError::PageRender {
                page,
                reason: err.to_string(),
            })?;
        Ok(ProcessedPage {
            index: page,
            content: PageContent::Filtered(stream),
            changes: removed.len(),
        })
    }
}

/// What a run did.
#[derive(Debug)]
pub struct RunSummary {
    pub range: PageRange,
    /// Pages that went through their transform and into the output.
    pub processed: Vec<u32>,
    /// Pages left untouched, with the reason.
    pub skipped: Vec<SkippedPage>,
    /// Pixels replaced or elements removed, over all processed pages.
    pub changes: usize,
    /// Why the run stopped early (`Cancelled` or `BatchFailed`), if it did.
    pub interrupted: Option<FiligranError>,
    pub output_written: bool,
}

impl RunSummary {
    /// Every page was handled and at least one was processed.
    pub fn is_success(&self) -> bool {
        self.interrupted.is_none() && !self.processed.is_empty()
    }

    /// First page still to do, when the run was interrupted.
    pub fn resume_from(&self) -> Option<u32> {
        match self.interrupted {
            Some(FiligranError::Cancelled { resume_from })
            | Some(FiligranError::BatchFailed { resume_from, .. }) => Some(resume_from),
            _ => None,
        }
    }

    /// Save the assembled document, unless nothing was processed. Pages of
    /// completed batches are in it even after an interruption; the rest are
    /// the source pages unchanged.
    pub fn write_output(&mut self, assembler: DocumentAssembler, path: impl AsRef<Path>) -> Result<()> {
        if self.processed.is_empty() {
            warn!("No pages processed; output not written");
            return Ok(());
        }
        assembler.save(path)?;
        self.output_written = true;
        Ok(())
    }
}

/// Drive `transform` over the scheduler's batches, pushing each completed
/// batch into `assembler` before the next one starts.
///
/// Cancellation and batch failures end the run early and are reported in
/// the summary; assembler errors are returned.
#[instrument(skip_all, fields(range = %scheduler.range(), batch_size = scheduler.batch_size()))]
pub fn execute<T: PageTransform + ?Sized>(
    scheduler: &BatchScheduler,
    transform: &mut T,
    assembler: &mut DocumentAssembler,
    cancel: &CancelToken,
) -> Result<RunSummary> {
    let mut summary = RunSummary {
        range: scheduler.range(),
        processed: Vec::new(),
        skipped: Vec::new(),
        changes: 0,
        interrupted: None,
        output_written: false,
    };

    for outcome in scheduler.run(transform, cancel) {
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "Run interrupted");
                summary.interrupted = Some(err);
                break;
            }
        };

        summary.skipped.extend(outcome.skipped);
        for page in outcome.pages {
            let index = page.index;
            let changes = page.changes;
            assembler.push(page)?;
            summary.processed.push(index);
            summary.changes += changes;
        }
        info!(
            batch = outcome.batch.ordinal,
            done = summary.processed.len(),
            total = summary.range.len(),
            "Batch assembled"
        );
    }

    info!(
        processed = summary.processed.len(),
        skipped = summary.skipped.len(),
        changes = summary.changes,
        "Run finished"
    );
    Ok(summary)
}
