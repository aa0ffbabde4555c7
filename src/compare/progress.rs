// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Loading progress reporting.
//!
//! The comparison engine publishes coarse progress while it fetches, unions,
//! and diffs. Front ends read it through [`Observable`] to drive a spinner or
//! progress bar, and to keep controls disabled while a comparison is busy.

use crate::state::Observable;

use serde::{Deserialize, Serialize};

pub(crate) const FETCH_SOURCE: &str = "Fetching source values";
pub(crate) const FETCH_TARGET: &str = "Fetching target values";
pub(crate) const UNION_KEYS: &str = "Merging keys";
pub(crate) const COUNT_KEYS: &str = "Counting keys";
pub(crate) const COMPUTE_DIFFS: &str = "Computing diffs";
pub(crate) const DONE: &str = "Done";

/// Progress of the current engine operation.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingProgress {
    /// Engine is running an operation.
    pub is_loading: bool,

    /// Completion percentage from 0 to 100.
    pub progress_value: u8,

    /// Short description of what the engine is currently doing.
    pub progress_label: String,
}

/// Interpolate per-item progress between 25 and 100.
///
/// Item `done` out of `total`, where zero items jumps straight to 100.
pub(crate) fn interpolate(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }

    let done = done.min(total);
    (25 + (75 * done) / total) as u8
}

/// Holds the loading flag up for as long as it lives.
///
/// # Invariant
///
/// - Loading flag is cleared on drop, whether the operation finished, failed
///   with an error, or its future was dropped mid-flight.
pub(crate) struct LoadingGuard<'a> {
    progress: &'a Observable<LoadingProgress>,
}

impl<'a> LoadingGuard<'a> {
    pub(crate) fn start(progress: &'a Observable<LoadingProgress>, label: &str) -> Self {
        progress.set(LoadingProgress {
            is_loading: true,
            progress_value: 0,
            progress_label: label.into(),
        });

        Self { progress }
    }

    pub(crate) fn report(&self, value: u8, label: &str) {
        self.progress.update(|progress| {
            // INVARIANT: Progress never moves backwards within one operation.
            progress.progress_value = value.max(progress.progress_value).min(100);
            if progress.progress_label != label {
                progress.progress_label = label.into();
            }
        });
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.progress.update(|progress| progress.is_loading = false);
    }
}
