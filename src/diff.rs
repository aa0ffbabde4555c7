// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Per-key diff computation.
//!
//! The comparison engine never diffs anything by itself. Instead, the caller
//! hands it a [`DiffFn`] that knows how to compare one record of the source
//! environment with the same record of the target environment. Records can be
//! missing on either side, which must show up as an addition or removal of the
//! whole record.
//!
//! # Diff Contract
//!
//! Every diff function must honor the following:
//!
//! - Never called with both values absent. Stock differs return
//!   [`DiffError::BothAbsent`] if that happens anyway.
//! - One value absent means the whole record was added or removed, so the
//!   result has differences.
//! - Identical values produce a result without differences, and an empty
//!   formatted diff.
//!
//! The engine only ever looks at [`DiffOutcome::has_differences`]. Everything
//! else about a result is for whoever renders it.
//!
//! # See Also
//!
//! 1. [`text`]
//! 2. [`fields`]

pub mod fields;
pub mod text;

use std::{fmt::Display, future::Future};

/// Outcome of diffing one key across two environments.
pub trait DiffOutcome<K> {
    /// Key that was diffed.
    fn key(&self) -> &K;

    /// Human readable patch. Empty if there are no differences.
    fn formatted_diff(&self) -> &str;

    /// Source and target values differ.
    fn has_differences(&self) -> bool;
}

/// Plain diff result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffResult<K> {
    /// Key that was diffed.
    pub key: K,

    /// Unified diff between source and target values.
    pub formatted_diff: String,

    /// Source and target values differ.
    pub has_differences: bool,
}

impl<K> DiffResult<K> {
    /// Result for a key whose values are identical.
    pub fn unchanged(key: K) -> Self {
        Self {
            key,
            formatted_diff: String::new(),
            has_differences: false,
        }
    }
}

impl<K> DiffOutcome<K> for DiffResult<K> {
    fn key(&self) -> &K {
        &self.key
    }

    fn formatted_diff(&self) -> &str {
        &self.formatted_diff
    }

    fn has_differences(&self) -> bool {
        self.has_differences
    }
}

/// Diff one key across two environments.
///
/// Implemented for any plain closure of shape
/// `Fn(&K, Option<&V>, Option<&V>) -> anyhow::Result<R>`, which covers most
/// synchronous differs. Implement it directly when diffing has to wait on
/// something.
pub trait DiffFn<K, V> {
    /// Result produced per key.
    type Output: DiffOutcome<K>;

    /// Diff `key` given its source and target values.
    fn diff(
        &self,
        key: &K,
        source: Option<&V>,
        target: Option<&V>,
    ) -> impl Future<Output = anyhow::Result<Self::Output>>;
}

impl<K, V, R, F> DiffFn<K, V> for F
where
    F: Fn(&K, Option<&V>, Option<&V>) -> anyhow::Result<R>,
    R: DiffOutcome<K>,
{
    type Output = R;

    fn diff(
        &self,
        key: &K,
        source: Option<&V>,
        target: Option<&V>,
    ) -> impl Future<Output = anyhow::Result<R>> {
        std::future::ready(self(key, source, target))
    }
}

/// Keep every diffed item.
pub fn all<K, V, R>() -> impl FnMut(&K, Option<&V>, Option<&V>, &R) -> anyhow::Result<bool> {
    |_: &K, _: Option<&V>, _: Option<&V>, _: &R| Ok(true)
}

/// Keep only items whose values differ.
pub fn changed_only<K, V, R>() -> impl FnMut(&K, Option<&V>, Option<&V>, &R) -> anyhow::Result<bool>
where
    R: DiffOutcome<K>,
{
    |_: &K, _: Option<&V>, _: Option<&V>, diff: &R| Ok(diff.has_differences())
}

/// Keep only items whose key contains `term`, ignoring case.
///
/// Empty search term keeps everything.
pub fn key_contains<K, V, R>(
    term: impl AsRef<str>,
) -> impl FnMut(&K, Option<&V>, Option<&V>, &R) -> anyhow::Result<bool>
where
    K: Display,
{
    let term = term.as_ref().to_lowercase();
    move |key: &K, _: Option<&V>, _: Option<&V>, _: &R| {
        Ok(term.is_empty() || key.to_string().to_lowercase().contains(&term))
    }
}

/// Diff computation error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum DiffError {
    /// Differ was asked to compare a key missing from both environments.
    #[error("key {key:?} is absent from both source and target")]
    BothAbsent { key: String },
}

/// Friendly result alias :3
pub type Result<T, E = DiffError> = std::result::Result<T, E>;
