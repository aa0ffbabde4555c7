// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Field-by-field diff of flat records.
//!
//! Some records are better compared as a set of named fields than as one blob
//! of text, e.g., a localized message with one field per language, or the
//! metadata of an index (table, columns, uniqueness, tablespace). The result
//! lists which fields changed on top of the usual formatted patch.

use crate::diff::{text, DiffError, DiffFn, DiffOutcome, Result};

use std::{collections::BTreeMap, fmt::Display, future::Future};

/// Flat record of named fields.
pub type Record = BTreeMap<String, String>;

/// How a single field changed between source and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldChangeKind {
    /// Field only exists in target.
    Added,

    /// Field only exists in source.
    Removed,

    /// Field exists in both with different values.
    Modified,
}

/// Field that changed between source and target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: String,
    pub kind: FieldChangeKind,
}

/// Result of diffing a record field by field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiffResult<K> {
    /// Key that was diffed.
    pub key: K,

    /// Unified diff of the records rendered one field per line.
    pub formatted_diff: String,

    /// Source and target records differ.
    pub has_differences: bool,

    /// Fields that changed, in field name order.
    pub changed_fields: Vec<FieldChange>,

    /// Source record, if present.
    pub source: Option<Record>,

    /// Target record, if present.
    pub target: Option<Record>,
}

impl<K> DiffOutcome<K> for FieldDiffResult<K> {
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

/// Field-by-field record differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiffer {
    source_label: String,
    target_label: String,
    context_radius: usize,
}

impl Default for FieldDiffer {
    fn default() -> Self {
        Self {
            source_label: "source".into(),
            target_label: "target".into(),
            context_radius: text::DEFAULT_CONTEXT_RADIUS,
        }
    }
}

impl FieldDiffer {
    /// Construct new field differ with default labels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name both sides of the diff after their environments.
    pub fn with_labels(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_label = source.into();
        self.target_label = target.into();
        self
    }

    /// Set number of unchanged fields shown around each hunk.
    pub fn with_context_radius(mut self, radius: usize) -> Self {
        self.context_radius = radius;
        self
    }

    /// Diff record of a key across source and target.
    ///
    /// # Errors
    ///
    /// - Return [`DiffError::BothAbsent`] if neither side has a record.
    pub fn diff_record<K>(
        &self,
        key: &K,
        source: Option<&Record>,
        target: Option<&Record>,
    ) -> Result<FieldDiffResult<K>>
    where
        K: Clone + Display,
    {
        if source.is_none() && target.is_none() {
            return Err(DiffError::BothAbsent {
                key: key.to_string(),
            });
        }

        let changed_fields = changed_fields(source, target);
        let has_differences = source.is_none() || target.is_none() || !changed_fields.is_empty();

        let formatted_diff = if has_differences {
            let old_header = match source {
                Some(_) => format!("{}/{key}", self.source_label),
                None => text::ABSENT.into(),
            };
            let new_header = match target {
                Some(_) => format!("{}/{key}", self.target_label),
                None => text::ABSENT.into(),
            };
            text::unified(
                &render(source),
                &render(target),
                &old_header,
                &new_header,
                self.context_radius,
            )
        } else {
            String::new()
        };

        Ok(FieldDiffResult {
            key: key.clone(),
            formatted_diff,
            has_differences,
            changed_fields,
            source: source.cloned(),
            target: target.cloned(),
        })
    }
}

impl<K> DiffFn<K, Record> for FieldDiffer
where
    K: Clone + Display,
{
    type Output = FieldDiffResult<K>;

    fn diff(
        &self,
        key: &K,
        source: Option<&Record>,
        target: Option<&Record>,
    ) -> impl Future<Output = anyhow::Result<Self::Output>> {
        std::future::ready(self.diff_record(key, source, target).map_err(Into::into))
    }
}

fn changed_fields(source: Option<&Record>, target: Option<&Record>) -> Vec<FieldChange> {
    let empty = Record::new();
    let source = source.unwrap_or(&empty);
    let target = target.unwrap_or(&empty);

    let mut fields = source.keys().chain(target.keys()).collect::<Vec<_>>();
    fields.sort();
    fields.dedup();

    fields
        .into_iter()
        .filter_map(|field| {
            let kind = match (source.get(field), target.get(field)) {
                (Some(old), Some(new)) if old != new => FieldChangeKind::Modified,
                (Some(_), None) => FieldChangeKind::Removed,
                (None, Some(_)) => FieldChangeKind::Added,
                _ => return None,
            };

            Some(FieldChange {
                field: field.clone(),
                kind,
            })
        })
        .collect()
}

fn render(record: Option<&Record>) -> String {
    record
        .into_iter()
        .flatten()
        .map(|(field, value)| format!("{field}: {value}\n"))
        .collect()
}
