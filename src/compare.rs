// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Environment comparison engine.
//!
//! A __comparison__ lines up the records of two environments, e.g., "DEV" as
//! the source and "QA" as the target, by their keys. The engine fetches both
//! record sets, merges their keys into one ordered __key union__, and then
//! serves that union one page at a time. Only keys that land on the requested
//! page are diffed, so a comparison over thousands of Consul keys stays cheap
//! to browse.
//!
//! # Lifecycle
//!
//! 1. [`Comparison::initialize`] fetches source and target records, and
//!    rebuilds the key union. Current page goes back to the first page, and
//!    every memoized diff is thrown away.
//! 2. [`Comparison::get_page`] slices the key union by current page and page
//!    size, diffs each key of that slice, filters the results, and commits
//!    them as the current page items.
//! 3. Navigation, i.e., [`Comparison::set_current_page`] and
//!    [`Comparison::set_page_size`], adjusts the window for the next
//!    [`Comparison::get_page`] call.
//!
//! Both operations take `&mut self`, so the borrow checker already rules out
//! running them concurrently on the same comparison.
//!
//! # Total Count
//!
//! By default the total count after [`Comparison::get_page`] is the number of
//! items on the processed page that passed the filter
//! ([`TotalCount::PageLocal`]). That keeps paging lazy, but it cannot tell a
//! front end how many filtered pages there are. [`TotalCount::FilteredSet`]
//! diffs and filters the whole key union instead, memoizing each diff until
//! the next initialization, and pages over the filtered items.
//!
//! # Failure
//!
//! The loading flag of [`LoadingProgress`] is always lowered once an operation
//! returns, be it through success, an error, cancellation, or the operation's
//! future being dropped. A failed page leaves the previous page items intact.
//! A failed initialization does __not__ roll back records that were already
//! fetched before the failure.

pub mod paging;
pub mod progress;
pub mod sources;

use crate::{
    compare::{
        paging::{PagedCollection, ZeroPageSize},
        progress::{interpolate, LoadingGuard, LoadingProgress},
        sources::DualSource,
    },
    diff::DiffFn,
    state::Observable,
};

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Debug,
    future::Future,
    pin::pin,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// What the total count reports after a page was computed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TotalCount {
    /// Count of items on the processed page that passed the filter.
    #[default]
    PageLocal,

    /// Count of items across the whole key union that passed the filter.
    FilteredSet,
}

/// Comparison of two environments.
///
/// Composed of the fetched records of both environments ([`DualSource`]),
/// the page being looked at ([`PagedCollection`]), and an optional memo of
/// diffs computed so far.
#[derive(Debug)]
pub struct Comparison<K, V, R>
where
    K: Ord,
{
    sources: DualSource<K, V>,
    paged: PagedCollection<R>,
    cache: BTreeMap<K, R>,
    memoize: bool,
    total_count: TotalCount,
    concurrency: usize,
    progress: Observable<LoadingProgress>,
}

impl<K, V, R> Default for Comparison<K, V, R>
where
    K: Ord,
{
    fn default() -> Self {
        Self {
            sources: DualSource::default(),
            paged: PagedCollection::default(),
            cache: BTreeMap::new(),
            memoize: false,
            total_count: TotalCount::default(),
            concurrency: 1,
            progress: Observable::default(),
        }
    }
}

impl<K, V, R> Comparison<K, V, R>
where
    K: Ord + Clone + Debug,
    R: Clone,
{
    /// Construct new empty comparison.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use given page size.
    ///
    /// # Errors
    ///
    /// - Return [`CompareError::PageSize`] if `page_size` is zero.
    pub fn with_page_size(mut self, page_size: usize) -> Result<Self> {
        self.paged.set_page_size(page_size)?;
        Ok(self)
    }

    /// Choose what the total count reports.
    pub fn with_total_count(mut self, total_count: TotalCount) -> Self {
        self.total_count = total_count;
        self
    }

    /// Remember diff results per key until the next initialization.
    ///
    /// Always on for [`TotalCount::FilteredSet`].
    pub fn with_memoize(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }

    /// Number of per-key diffs allowed to run at once.
    ///
    /// Results are still collected in key order. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Fetch records of both environments and rebuild the key union.
    ///
    /// Source is fetched first, then target. Progress moves to 25 after the
    /// source fetch, 50 after the target fetch, 75 after merging keys, and 100
    /// once the total count is set.
    ///
    /// # Errors
    ///
    /// - Return [`CompareError::FetchSource`] if source fetch fails.
    /// - Return [`CompareError::FetchTarget`] if target fetch fails.
    pub async fn initialize<S, T, SI, TI>(&mut self, fetch_source: S, fetch_target: T) -> Result<()>
    where
        S: Future<Output = anyhow::Result<SI>>,
        T: Future<Output = anyhow::Result<TI>>,
        SI: IntoIterator<Item = (K, V)>,
        TI: IntoIterator<Item = (K, V)>,
    {
        self.initialize_with(&CancellationToken::new(), fetch_source, fetch_target)
            .await
    }

    /// Same as [`Comparison::initialize`], but gives up as soon as `token` is
    /// cancelled.
    ///
    /// # Errors
    ///
    /// - Return [`CompareError::FetchSource`] if source fetch fails.
    /// - Return [`CompareError::FetchTarget`] if target fetch fails.
    /// - Return [`CompareError::Cancelled`] if `token` was cancelled.
    #[instrument(skip_all, level = "debug")]
    pub async fn initialize_with<S, T, SI, TI>(
        &mut self,
        token: &CancellationToken,
        fetch_source: S,
        fetch_target: T,
    ) -> Result<()>
    where
        S: Future<Output = anyhow::Result<SI>>,
        T: Future<Output = anyhow::Result<TI>>,
        SI: IntoIterator<Item = (K, V)>,
        TI: IntoIterator<Item = (K, V)>,
    {
        let guard = LoadingGuard::start(&self.progress, progress::FETCH_SOURCE);

        // INVARIANT: New key union means stale pages and stale diffs.
        self.cache.clear();
        self.paged.reset();
        self.paged.clear_items();

        let source = cancellable(token, fetch_source)
            .await?
            .map_err(CompareError::FetchSource)?;
        self.sources.set_source(source);
        debug!("fetched {} source records", self.sources.source().len());
        guard.report(25, progress::FETCH_TARGET);

        let target = cancellable(token, fetch_target)
            .await?
            .map_err(CompareError::FetchTarget)?;
        self.sources.set_target(target);
        debug!("fetched {} target records", self.sources.target().len());
        guard.report(50, progress::UNION_KEYS);

        self.sources.union_keys();
        guard.report(75, progress::COUNT_KEYS);

        self.paged.set_total_count(self.sources.keys().len());
        guard.report(100, progress::DONE);
        info!(
            "compare {} source records with {} target records over {} keys",
            self.sources.source().len(),
            self.sources.target().len(),
            self.sources.keys().len()
        );

        Ok(())
    }

    /// Diff and filter the current page.
    ///
    /// Diffs every key of the current page slice in key order, keeping those
    /// that pass `filter`. Progress moves from 25 to 100 as each key is done,
    /// or jumps straight to 100 if the slice is empty. Page items and total
    /// count only change if the whole page succeeds.
    ///
    /// # Errors
    ///
    /// - Return [`CompareError::Diff`] if `get_diff` fails for any key.
    /// - Return [`CompareError::Filter`] if `filter` fails for any key.
    pub async fn get_page<D, F>(&mut self, get_diff: &D, filter: F) -> Result<()>
    where
        D: DiffFn<K, V, Output = R>,
        F: FnMut(&K, Option<&V>, Option<&V>, &R) -> anyhow::Result<bool>,
    {
        self.get_page_with(&CancellationToken::new(), get_diff, filter)
            .await
    }

    /// Same as [`Comparison::get_page`], but gives up as soon as `token` is
    /// cancelled.
    ///
    /// # Errors
    ///
    /// - Return [`CompareError::Diff`] if `get_diff` fails for any key.
    /// - Return [`CompareError::Filter`] if `filter` fails for any key.
    /// - Return [`CompareError::Cancelled`] if `token` was cancelled.
    #[instrument(skip_all, fields(page = self.paged.current_page()), level = "debug")]
    pub async fn get_page_with<D, F>(
        &mut self,
        token: &CancellationToken,
        get_diff: &D,
        filter: F,
    ) -> Result<()>
    where
        D: DiffFn<K, V, Output = R>,
        F: FnMut(&K, Option<&V>, Option<&V>, &R) -> anyhow::Result<bool>,
    {
        let guard = LoadingGuard::start(&self.progress, progress::COMPUTE_DIFFS);
        let (skip, take) = self.paged.window();

        let run = PageRun {
            sources: &self.sources,
            cache: &self.cache,
            memoize: self.memoize || self.total_count == TotalCount::FilteredSet,
            concurrency: self.concurrency,
            guard: &guard,
            token,
        };

        let (items, total, fresh) = match self.total_count {
            TotalCount::PageLocal => {
                let keys = self.sources.slice(skip, take).collect::<Vec<_>>();
                let (items, fresh) = run.diff_and_filter(keys, get_diff, filter).await?;
                let total = items.len();
                (items, total, fresh)
            }
            TotalCount::FilteredSet => {
                let keys = self.sources.keys().iter().collect::<Vec<_>>();
                let (matched, fresh) = run.diff_and_filter(keys, get_diff, filter).await?;
                let total = matched.len();
                let items = matched.into_iter().skip(skip).take(take).collect();
                (items, total, fresh)
            }
        };

        if !fresh.is_empty() {
            debug!("memoize {} new diffs", fresh.len());
            self.cache.extend(fresh);
        }

        self.paged.commit(items, total);
        guard.report(100, progress::DONE);
        debug!(
            "page {} has {} items, total count {}",
            self.paged.current_page(),
            self.paged.items().len(),
            self.paged.total_count()
        );

        Ok(())
    }
}

impl<K, V, R> Comparison<K, V, R>
where
    K: Ord,
{
    /// Records of both environments.
    pub fn sources(&self) -> &DualSource<K, V> {
        &self.sources
    }

    /// Records fetched from the source environment.
    pub fn source_values(&self) -> &BTreeMap<K, V> {
        self.sources.source()
    }

    /// Records fetched from the target environment.
    pub fn target_values(&self) -> &BTreeMap<K, V> {
        self.sources.target()
    }

    /// Union of source and target keys.
    pub fn all_keys(&self) -> &BTreeSet<K> {
        self.sources.keys()
    }

    /// Page navigation state.
    pub fn paged(&self) -> &PagedCollection<R> {
        &self.paged
    }

    /// Items of the current page.
    pub fn page_items(&self) -> &[R] {
        self.paged.items()
    }

    /// Current 1-based page number.
    pub fn current_page(&self) -> usize {
        self.paged.current_page()
    }

    /// Number of keys per page.
    pub fn page_size(&self) -> usize {
        self.paged.page_size()
    }

    /// Total count as of the last initialization or page.
    pub fn total_count(&self) -> usize {
        self.paged.total_count()
    }

    /// Number of pages needed to show current total count.
    pub fn page_count(&self) -> usize {
        self.paged.page_count()
    }

    /// Number of memoized diffs.
    pub fn memoized(&self) -> usize {
        self.cache.len()
    }

    /// Change page size, going back to the first page.
    ///
    /// # Errors
    ///
    /// - Return [`CompareError::PageSize`] if `page_size` is zero.
    pub fn set_page_size(&mut self, page_size: usize) -> Result<()> {
        Ok(self.paged.set_page_size(page_size)?)
    }

    /// Jump to 1-based page.
    pub fn set_current_page(&mut self, page: usize) {
        self.paged.set_current_page(page);
    }

    /// Advance one page.
    pub fn next_page(&mut self) {
        self.paged.next_page();
    }

    /// Go back one page, stopping at the first.
    pub fn previous_page(&mut self) {
        self.paged.previous_page();
    }

    /// Current loading progress.
    pub fn progress(&self) -> LoadingProgress {
        self.progress.get()
    }

    /// Subscribe to loading progress updates.
    pub fn subscribe_progress(&self) -> watch::Receiver<LoadingProgress> {
        self.progress.subscribe()
    }
}

/// Borrowed view of a comparison for the duration of one page computation.
struct PageRun<'a, K, V, R>
where
    K: Ord,
{
    sources: &'a DualSource<K, V>,
    cache: &'a BTreeMap<K, R>,
    memoize: bool,
    concurrency: usize,
    guard: &'a LoadingGuard<'a>,
    token: &'a CancellationToken,
}

impl<'a, K, V, R> PageRun<'a, K, V, R>
where
    K: Ord + Clone + Debug,
    R: Clone,
{
    /// Diff `keys` in order and keep whatever passes `filter`.
    ///
    /// Returns kept results, along with freshly computed diffs that should be
    /// memoized.
    async fn diff_and_filter<D, F>(
        &self,
        keys: Vec<&'a K>,
        get_diff: &D,
        mut filter: F,
    ) -> Result<(Vec<R>, Vec<(K, R)>)>
    where
        D: DiffFn<K, V, Output = R>,
        F: FnMut(&K, Option<&V>, Option<&V>, &R) -> anyhow::Result<bool>,
    {
        let total = keys.len();
        self.guard.report(interpolate(0, total), progress::COMPUTE_DIFFS);

        let sources = self.sources;
        let cache = self.cache;
        let memoize = self.memoize;
        let diffs = futures::stream::iter(keys).map(move |key| async move {
            if memoize {
                if let Some(hit) = cache.get(key) {
                    return Ok((key, hit.clone(), false));
                }
            }

            let (source, target) = sources.get(key);
            get_diff
                .diff(key, source, target)
                .await
                .map(|diff| (key, diff, true))
                .map_err(|err| CompareError::Diff {
                    key: format!("{key:?}"),
                    source: err,
                })
        });
        let mut diffs = pin!(diffs.buffered(self.concurrency));

        let mut kept = Vec::new();
        let mut fresh = Vec::new();
        let mut done = 0;
        while let Some(next) = cancellable(self.token, diffs.next()).await? {
            let (key, diff, computed) = next?;
            let (source, target) = sources.get(key);
            let keep = filter(key, source, target, &diff).map_err(|err| CompareError::Filter {
                key: format!("{key:?}"),
                source: err,
            })?;

            if memoize && computed {
                fresh.push((key.clone(), diff.clone()));
            }

            if keep {
                kept.push(diff);
            }

            done += 1;
            self.guard
                .report(interpolate(done, total), progress::COMPUTE_DIFFS);
        }

        Ok((kept, fresh))
    }
}

async fn cancellable<F: Future>(token: &CancellationToken, future: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(CompareError::Cancelled),
        output = future => Ok(output),
    }
}

/// Comparison error types.
#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    /// Source records cannot be fetched.
    #[error("failed to fetch source values")]
    FetchSource(#[source] anyhow::Error),

    /// Target records cannot be fetched.
    #[error("failed to fetch target values")]
    FetchTarget(#[source] anyhow::Error),

    /// Diff function failed on a key.
    #[error("failed to diff key {key}")]
    Diff {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Filter predicate failed on a key.
    #[error("failed to filter key {key}")]
    Filter {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Page size is invalid.
    #[error(transparent)]
    PageSize(#[from] ZeroPageSize),

    /// Operation was cancelled before it could finish.
    #[error("comparison was cancelled")]
    Cancelled,
}

/// Friendly result alias :3
pub type Result<T, E = CompareError> = std::result::Result<T, E>;
