// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch scheduler — splits a page range into fixed-size batches and drives a
// page transform over them one batch at a time.
//
// Only one batch of processed pages exists at any moment: the caller receives
// each completed batch, hands it to the assembler, and drops it before asking
// for the next. Peak memory is therefore bounded by the batch size, not by
// the document length.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::RgbaImage;
use tracing::{debug, info, instrument, warn};

use filigran_core::error::{FiligranError, Result};
use filigran_core::types::{Batch, PageRange};

/// Output of transforming one page.
#[derive(Debug)]
pub enum PageContent {
    /// Replacement raster for the whole page.
    Raster(RgbaImage),
    /// Replacement content stream (decoded operators, re-encoded).
    Filtered(Vec<u8>),
    /// Nothing to change; the source page passes through.
    Unchanged,
}

/// A page that made it through its transform.
#[derive(Debug)]
pub struct ProcessedPage {
    /// 0-indexed page number in the source document.
    pub index: u32,
    pub content: PageContent,
    /// Pixels replaced or elements removed.
    pub changes: usize,
}

/// A page the run had to leave untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPage {
    pub index: u32,
    pub reason: String,
}

/// Per-page work driven by the scheduler.
///
/// Page-level failures ([`FiligranError::is_page_level`]) skip the page;
/// any other error fails the whole batch.
pub trait PageTransform {
    fn transform(&mut self, page: u32) -> Result<ProcessedPage>;
}

impl<F> PageTransform for F
where
    F: FnMut(u32) -> Result<ProcessedPage>,
{
    fn transform(&mut self, page: u32) -> Result<ProcessedPage> {
        self(page)
    }
}

/// Cooperative cancellation flag, checked between pages.
///
/// Clones share the flag, so one can be handed to another thread (a signal
/// handler, a UI) while the run holds the other.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything one batch produced, in page order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub batch: Batch,
    pub pages: Vec<ProcessedPage>,
    pub skipped: Vec<SkippedPage>,
}

/// Partitions a [`PageRange`] into batches of at most `batch_size` pages.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    range: PageRange,
    batch_size: usize,
    /// First page to process; always a batch boundary.
    from: u32,
}

impl BatchScheduler {
    pub fn new(range: PageRange, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(FiligranError::InvalidBatchSize(batch_size));
        }
        Ok(Self {
            range,
            batch_size,
            from: range.start(),
        })
    }

    pub fn range(&self) -> PageRange {
        self.range
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Restart at `page`, which must be the first page of one of this
    /// range's batches.
    pub fn resume_from(mut self, page: u32) -> Result<Self> {
        let offset = page.checked_sub(self.range.start());
        let on_boundary = offset.is_some_and(|o| o as usize % self.batch_size == 0);
        if !self.range.contains(page) || !on_boundary {
            return Err(FiligranError::PageRange {
                start: page,
                end: self.range.end(),
                page_count: self.range.end() + 1,
            });
        }
        self.from = page;
        Ok(self)
    }

    /// The batches still to run, lazily.
    pub fn batches(&self) -> Batches {
        let skipped = (self.from - self.range.start()) as usize / self.batch_size;
        Batches {
            next_start: Some(self.from),
            end: self.range.end(),
            batch_size: self.batch_size,
            ordinal: skipped,
        }
    }

    /// Drive `transform` over every remaining batch.
    ///
    /// The returned iterator yields one [`BatchOutcome`] per batch. It ends
    /// after the last batch, or after yielding an error: `Cancelled` when
    /// `cancel` fires (the interrupted batch is discarded) or `BatchFailed`
    /// when a page fails with a non-page-level error.
    #[instrument(skip_all, fields(range = %self.range, batch_size = self.batch_size))]
    pub fn run<'a, T: PageTransform + ?Sized>(
        &self,
        transform: &'a mut T,
        cancel: &'a CancelToken,
    ) -> BatchRun<'a, T> {
        info!(from = self.from, "Starting batched run");
        BatchRun {
            batches: self.batches(),
            transform,
            cancel,
            delivered: Vec::new(),
            finished: false,
        }
    }
}

/// Lazy iterator over the batches of a [`BatchScheduler`].
#[derive(Debug, Clone)]
pub struct Batches {
    next_start: Option<u32>,
    end: u32,
    batch_size: usize,
    ordinal: usize,
}

impl Iterator for Batches {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let start = self.next_start?;
        let span = self.batch_size as u64 - 1;
        let end = (start as u64).saturating_add(span).min(self.end as u64) as u32;
        self.next_start = if end < self.end { Some(end + 1) } else { None };
        let batch = Batch {
            ordinal: self.ordinal,
            start,
            end,
        };
        self.ordinal += 1;
        Some(batch)
    }
}

/// In-progress batched run; see [`BatchScheduler::run`].
pub struct BatchRun<'a, T: PageTransform + ?Sized> {
    batches: Batches,
    transform: &'a mut T,
    cancel: &'a CancelToken,
    delivered: Vec<u32>,
    finished: bool,
}

impl<T: PageTransform + ?Sized> BatchRun<'_, T> {
    /// Pages handed out in completed batches so far.
    pub fn delivered(&self) -> &[u32] {
        &self.delivered
    }

    fn stop(&mut self, err: FiligranError) -> Option<Result<BatchOutcome>> {
        self.finished = true;
        Some(Err(err))
    }
}

impl<T: PageTransform + ?Sized> Iterator for BatchRun<'_, T> {
    type Item = Result<BatchOutcome>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let batch = self.batches.next()?;
        debug!(batch = batch.ordinal, start = batch.start, end = batch.end, "Batch started");

        let mut pages = Vec::with_capacity(batch.len());
        let mut skipped = Vec::new();

        for page in batch.pages() {
            if self.cancel.is_cancelled() {
                info!(
                    batch = batch.ordinal,
                    discarded = pages.len(),
                    "Cancelled; discarding unfinished batch"
                );
                return self.stop(FiligranError::Cancelled {
                    resume_from: batch.start,
                });
            }

            match self.transform.transform(page) {
                Ok(processed) => pages.push(processed),
                Err(err) if err.is_page_level() => {
                    warn!(page, error = %err, "Skipping page");
                    skipped.push(SkippedPage {
                        index: page,
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    warn!(batch = batch.ordinal, page, error = %err, "Batch failed");
                    return self.stop(FiligranError::BatchFailed {
                        batch: batch.ordinal,
                        completed: self.delivered.clone(),
                        resume_from: batch.start,
                        reason: err.to_string(),
                    });
                }
            }
        }

        self.delivered.extend(pages.iter().map(|p| p.index));
        debug!(
            batch = batch.ordinal,
            processed = pages.len(),
            skipped = skipped.len(),
            "Batch complete"
        );
        Some(Ok(BatchOutcome {
            batch,
            pages,
            skipped,
        }))
    }
}
