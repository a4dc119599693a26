/// Paging position of the current session.
///
/// `current_page` is the last page whose response was applied (0 before the
/// first one lands). A failed load leaves it untouched, so the next attempt
/// asks for the same page again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    current_page: usize,
    page_size: usize,
    total_articles: usize,
    has_more: bool,
}

impl PageCursor {
    pub fn new(page_size: usize) -> Self {
        Self {
            current_page: 0,
            page_size: page_size.max(1),
            total_articles: 0,
            has_more: true,
        }
    }

    /// Back to the start of a fresh session
    pub fn reset(&mut self) {
        self.current_page = 0;
        self.total_articles = 0;
        self.has_more = true;
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn next_page(&self) -> usize {
        self.current_page + 1
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_articles(&self) -> usize {
        self.total_articles
    }

    pub fn total_pages(&self) -> usize {
        self.total_articles.div_ceil(self.page_size)
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn offset_for(&self, page: usize) -> usize {
        page.saturating_sub(1) * self.page_size
    }

    /// Record a successful response for `page` that returned `returned`
    /// rows out of `total`. Returns the new `has_more`.
    ///
    /// The session is exhausted once the page came back short or its end
    /// offset reached the total.
    pub fn record_page(&mut self, page: usize, returned: usize, total: usize) -> bool {
        let end = self.offset_for(page) + returned;
        self.current_page = page;
        self.total_articles = total;
        self.has_more = returned >= self.page_size && end < total;
        self.has_more
    }
}
