// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Page navigation state.

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Current page of a paged listing.
///
/// # Invariant
///
/// - Current page is 1-based and never zero.
/// - Page size is never zero.
/// - Changing page size sends the listing back to the first page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedCollection<R> {
    current_page: usize,
    page_size: usize,
    total_count: usize,
    items: Vec<R>,
}

impl<R> Default for PagedCollection<R> {
    fn default() -> Self {
        Self {
            current_page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            total_count: 0,
            items: Vec::new(),
        }
    }
}

impl<R> PagedCollection<R> {
    #[cfg(test)]
    pub(crate) fn with_page_size(page_size: usize) -> Result<Self, ZeroPageSize> {
        let mut paged = Self::default();
        paged.set_page_size(page_size)?;
        Ok(paged)
    }

    /// Current 1-based page number.
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// Number of keys taken per page.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Item count last computed by the engine.
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// Items of the current page.
    pub fn items(&self) -> &[R] {
        &self.items
    }

    /// Number of pages needed to show current total count.
    ///
    /// Always at least one, so an empty listing still has a first page.
    pub fn page_count(&self) -> usize {
        self.total_count.div_ceil(self.page_size).max(1)
    }

    /// Offset and length of current page.
    ///
    /// Offset saturates, so an absurdly large page is simply past the end.
    pub fn window(&self) -> (usize, usize) {
        let skip = (self.current_page - 1).saturating_mul(self.page_size);
        (skip, self.page_size)
    }

    /// Change page size, going back to the first page.
    ///
    /// # Errors
    ///
    /// - Return [`ZeroPageSize`] if `page_size` is zero.
    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), ZeroPageSize> {
        if page_size == 0 {
            return Err(ZeroPageSize);
        }

        self.page_size = page_size;
        self.reset();
        Ok(())
    }

    /// Jump to 1-based page, where zero is treated as the first page.
    pub fn set_current_page(&mut self, page: usize) {
        self.current_page = page.max(1);
    }

    /// Advance one page.
    pub fn next_page(&mut self) {
        self.current_page = self.current_page.saturating_add(1);
    }

    /// Go back one page, stopping at the first.
    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.saturating_sub(1).max(1);
    }

    /// Go back to the first page.
    pub(crate) fn reset(&mut self) {
        self.current_page = 1;
    }

    pub(crate) fn commit(&mut self, items: Vec<R>, total_count: usize) {
        self.items = items;
        self.total_count = total_count;
    }

    pub(crate) fn set_total_count(&mut self, total_count: usize) {
        self.total_count = total_count;
    }

    pub(crate) fn clear_items(&mut self) {
        self.items.clear();
    }
}

/// Page size of zero cannot slice anything.
#[derive(Clone, Debug, thiserror::Error)]
#[error("page size must be at least one")]
pub struct ZeroPageSize;
