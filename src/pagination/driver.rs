//! Sequential page fetching for one stream instance

use super::types::{NextPage, PaginationState, Paginator};
use crate::decode::{Page, RecordDecoder};
use crate::error::Result;
use crate::http::{ApiRequest, Fetcher};
use tracing::debug;

/// Pull-based page driver
///
/// Each call to [`next_page`](Self::next_page) issues exactly one request,
/// built from the previous page's cursor, so requests of one instance never
/// overlap and only the current page is held in memory.
///
/// The driver is finished when the source reports no cursor, when the
/// caller calls [`stop`](Self::stop), when the page budget is spent, or
/// after a request fails.
pub struct PageDriver<'a> {
    fetcher: &'a dyn Fetcher,
    paginator: &'a dyn Paginator,
    decoder: &'a dyn RecordDecoder,
    request: ApiRequest,
    state: PaginationState,
    max_pages: Option<u32>,
    budget_exhausted: bool,
}

impl<'a> PageDriver<'a> {
    /// Create a driver for a base request
    pub fn new(
        fetcher: &'a dyn Fetcher,
        paginator: &'a dyn Paginator,
        decoder: &'a dyn RecordDecoder,
        request: ApiRequest,
    ) -> Self {
        Self {
            fetcher,
            paginator,
            decoder,
            request,
            state: PaginationState::new(),
            max_pages: None,
            budget_exhausted: false,
        }
    }

    /// Limit the number of requests this instance may issue
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Fetch the next page, `None` once the instance is finished
    pub async fn next_page(&mut self) -> Result<Option<Page>> {
        if self.state.done {
            return Ok(None);
        }

        if let Some(max) = self.max_pages {
            if self.state.page >= max {
                debug!(path = %self.request.path, max_pages = max, "Page budget reached");
                self.state.mark_done();
                self.budget_exhausted = true;
                return Ok(None);
            }
        }

        let mut request = self.request.clone();
        self.paginator.apply(&self.state, &mut request);

        let page = match self.fetch_page(&request).await {
            Ok(page) => page,
            Err(e) => {
                self.state.mark_done();
                return Err(e);
            }
        };

        self.state.next_page();

        if let NextPage::Done = self.paginator.process_page(&page, &mut self.state) {
            self.state.mark_done();
        }

        debug!(
            path = %self.request.path,
            page = self.state.page,
            records = page.len(),
            has_more = !self.state.done,
            "Fetched page"
        );

        Ok(Some(page))
    }

    async fn fetch_page(&self, request: &ApiRequest) -> Result<Page> {
        let body = self.fetcher.fetch(request).await?;
        self.decoder.decode(&body)
    }

    /// Stop before the next request (early stop)
    pub fn stop(&mut self) {
        self.state.mark_done();
    }

    /// Pages fetched so far
    pub fn pages_fetched(&self) -> u32 {
        self.state.page
    }

    /// Whether the page budget ended the walk while the source still had a cursor
    pub fn budget_exhausted(&self) -> bool {
        self.budget_exhausted
    }
}

impl std::fmt::Debug for PageDriver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageDriver")
            .field("path", &self.request.path)
            .field("state", &self.state)
            .field("max_pages", &self.max_pages)
            .field("budget_exhausted", &self.budget_exhausted)
            .finish_non_exhaustive()
    }
}
