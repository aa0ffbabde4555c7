// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Line-based diff of text values.
//!
//! Fits any record whose value is a blob of text: view definitions pulled from
//! an Oracle schema, values of a Consul key-value tree, and so on. Output is a
//! unified diff produced by the `similar` crate (Myers algorithm).

use crate::diff::{DiffError, DiffFn, DiffResult, Result};

use similar::TextDiff;
use std::{fmt::Display, future::Future};

/// Header used for the side of a diff where the record does not exist.
pub const ABSENT: &str = "/dev/null";

/// Default number of unchanged lines shown around each hunk.
pub const DEFAULT_CONTEXT_RADIUS: usize = 3;

/// Unified text differ.
///
/// Headers name each side as `<environment>/<key>`, so a rendered patch tells
/// where each line came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDiffer {
    source_label: String,
    target_label: String,
    context_radius: usize,
}

impl Default for TextDiffer {
    fn default() -> Self {
        Self {
            source_label: "source".into(),
            target_label: "target".into(),
            context_radius: DEFAULT_CONTEXT_RADIUS,
        }
    }
}

impl TextDiffer {
    /// Construct new text differ with default labels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name both sides of the diff after their environments.
    pub fn with_labels(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_label = source.into();
        self.target_label = target.into();
        self
    }

    /// Set number of unchanged lines shown around each hunk.
    pub fn with_context_radius(mut self, radius: usize) -> Self {
        self.context_radius = radius;
        self
    }

    /// Diff text of a key across source and target.
    ///
    /// # Errors
    ///
    /// - Return [`DiffError::BothAbsent`] if neither side has a value.
    pub fn diff_text<K>(
        &self,
        key: &K,
        source: Option<&str>,
        target: Option<&str>,
    ) -> Result<DiffResult<K>>
    where
        K: Clone + Display,
    {
        if source.is_none() && target.is_none() {
            return Err(DiffError::BothAbsent {
                key: key.to_string(),
            });
        }

        if source == target {
            return Ok(DiffResult::unchanged(key.clone()));
        }

        let old_header = header(&self.source_label, key, source);
        let new_header = header(&self.target_label, key, target);
        let formatted_diff = unified(
            source.unwrap_or_default(),
            target.unwrap_or_default(),
            &old_header,
            &new_header,
            self.context_radius,
        );

        Ok(DiffResult {
            key: key.clone(),
            formatted_diff,
            has_differences: true,
        })
    }
}

impl<K, V> DiffFn<K, V> for TextDiffer
where
    K: Clone + Display,
    V: AsRef<str>,
{
    type Output = DiffResult<K>;

    fn diff(
        &self,
        key: &K,
        source: Option<&V>,
        target: Option<&V>,
    ) -> impl Future<Output = anyhow::Result<Self::Output>> {
        let result = self.diff_text(key, source.map(AsRef::as_ref), target.map(AsRef::as_ref));
        std::future::ready(result.map_err(Into::into))
    }
}

fn header<K: Display>(label: &str, key: &K, value: Option<&str>) -> String {
    match value {
        Some(_) => format!("{label}/{key}"),
        None => ABSENT.into(),
    }
}

/// Render unified diff between two texts.
///
/// Always emits the `---`/`+++` header pair, so that adding or removing an
/// empty value still reads as a change.
pub(crate) fn unified(old: &str, new: &str, old_header: &str, new_header: &str, radius: usize) -> String {
    let diff = TextDiff::from_lines(old, new);
    let hunks = diff
        .unified_diff()
        .context_radius(radius)
        .missing_newline_hint(false)
        .iter_hunks()
        .map(|hunk| hunk.to_string())
        .collect::<String>();

    format!("--- {old_header}\n+++ {new_header}\n{hunks}")
}
