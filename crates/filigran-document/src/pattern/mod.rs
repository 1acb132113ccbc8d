// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pattern module — watermark pattern registry and element filtering.

pub mod filter;
pub mod registry;

pub use filter::{FilterOutcome, RemovedElement, filter, pattern_matches};
pub use registry::PatternRegistry;
