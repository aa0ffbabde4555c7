// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Side-by-side comparison of record sets across environments.
//!
//! Tugdiff reconciles two key-indexed record sets, e.g., the views of an
//! Oracle schema on "DEV" and "QA", the key-values of a Consul tree, or the
//! localized messages of a Mongo collection, into one pageable and filterable
//! listing of per-key diffs.
//!
//! The heart of the crate is the [`Comparison`] engine. It owns the fetched
//! source and target maps together with their key union, and lazily diffs only
//! the keys that land on the page being looked at. How values are fetched, and
//! how two values are diffed, is left to the caller through plain futures and
//! the [`DiffFn`] trait.
//!
//! # See Also
//!
//! 1. [`compare`]
//! 2. [`diff`]

pub mod compare;
pub mod config;
pub mod diff;
pub mod path;
pub mod state;

pub use compare::{Comparison, CompareError, TotalCount};
pub use diff::{DiffFn, DiffOutcome, DiffResult};
