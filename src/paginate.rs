//! Lazy pagination sequences
//!
//! Two finite, forward-only page sequences built atop arbitrary "fetch one
//! page" functions: descending-id ([`IdPages`]) and cursor-based
//! ([`CursorPages`]). Both are pull-based - each step performs one fetch and
//! yields the page - and terminate on the provider's exhaustion sentinel or
//! once the accumulated item count reaches the caller's budget. Cancellation
//! is simply the consumer ceasing to pull.
//!
//! The next request's parameters are derived solely from the prior page's
//! meta; a fresh parameter list is built for every page, so several streams
//! can share one template without aliasing.

use futures_util::stream::{self, Stream};
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

use crate::engine::CallError;
use crate::Params;

/// Pagination facts an endpoint adapter derives from one response.
///
/// The core consumes only this shape; how `max_id` or `next_cursor` are dug
/// out of a payload belongs to the endpoint adapter. For descending-id
/// endpoints the adapter reports `max_id` already decremented below the
/// smallest id seen, so requesting it yields strictly older items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageMeta {
    /// Number of items this page contributed
    pub count: usize,
    /// Highest id guaranteed already observed, pre-decremented by the adapter;
    /// `None` on an empty page
    pub max_id: Option<i64>,
    /// Provider cursor for the next page; `0` (or absent) means exhausted
    pub next_cursor: Option<i64>,
    /// HTTP status the page was served with, for inline error surfacing
    pub status_code: u16,
}

impl PageMeta {
    /// Meta for a descending-id page.
    pub fn for_ids(status_code: u16, count: usize, max_id: Option<i64>) -> Self {
        Self {
            count,
            max_id,
            next_cursor: None,
            status_code,
        }
    }

    /// Meta for a cursor page.
    pub fn for_cursor(status_code: u16, count: usize, next_cursor: Option<i64>) -> Self {
        Self {
            count,
            max_id: None,
            next_cursor,
            status_code,
        }
    }
}

/// One fetched page: the raw payload plus its pagination meta.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Decoded response payload
    pub payload: serde_json::Value,
    /// Pagination facts derived from the payload
    pub meta: PageMeta,
}

/// Boxed stream of pages, the adapter between pull-based iteration and
/// task-based consumers.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<Page, CallError>> + Send>>;

/// Descending-id page sequence.
///
/// Each subsequent request sets `max_id` to the prior meta's `max_id`.
/// Terminates when the meta reports no `max_id` (empty page), when `max_id`
/// fails to strictly decrease versus the previous request (a stale or
/// duplicate page would otherwise loop forever), or when the accumulated item
/// count reaches the budget. The page that trips a termination predicate is
/// still yielded.
pub struct IdPages<F> {
    fetch: F,
    base_params: Params,
    budget: usize,
    next_max_id: Option<i64>,
    yielded: usize,
    done: bool,
}

impl<F, Fut> IdPages<F>
where
    F: FnMut(Params) -> Fut,
    Fut: Future<Output = Result<Page, CallError>>,
{
    /// Start a sequence from the newest items.
    ///
    /// # Arguments
    /// * `fetch` - performs one page request with the given parameters
    /// * `base_params` - parameter template rebuilt fresh for every page
    /// * `budget` - stop once this many items have been yielded
    pub fn new(fetch: F, base_params: Params, budget: usize) -> Self {
        Self {
            fetch,
            base_params,
            budget,
            next_max_id: None,
            yielded: 0,
            done: false,
        }
    }

    /// Start (or restart) a sequence from an explicit `max_id`.
    ///
    /// This is the only way to resume mid-stream: hand back the last meta's
    /// `max_id` from a previous run.
    pub fn starting_at(fetch: F, base_params: Params, budget: usize, max_id: i64) -> Self {
        let mut pages = Self::new(fetch, base_params, budget);
        pages.next_max_id = Some(max_id);
        pages
    }

    /// Fetch and yield the next page, or `None` once the sequence is over.
    ///
    /// # Errors
    /// Propagates fatal fetch errors; the sequence is finished afterwards.
    pub async fn try_next(&mut self) -> Result<Option<Page>, CallError> {
        if self.done || self.yielded >= self.budget {
            return Ok(None);
        }

        let mut params = self.base_params.clone();
        if let Some(max_id) = self.next_max_id {
            params.push(("max_id".to_string(), max_id.to_string()));
        }

        let page = match (self.fetch)(params).await {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };

        self.yielded += page.meta.count;

        match page.meta.max_id {
            None => {
                debug!("id pagination complete: empty page after {} items", self.yielded);
                self.done = true;
            }
            Some(max_id) if self.next_max_id.is_some_and(|prev| max_id >= prev) => {
                debug!(
                    "id pagination complete: max_id {} did not decrease below {}",
                    max_id,
                    self.next_max_id.unwrap_or(i64::MAX)
                );
                self.done = true;
            }
            Some(max_id) => {
                self.next_max_id = Some(max_id);
            }
        }

        Ok(Some(page))
    }

    /// Number of items yielded so far.
    pub fn items_yielded(&self) -> usize {
        self.yielded
    }
}

impl<F, Fut> IdPages<F>
where
    F: FnMut(Params) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Page, CallError>> + Send,
{
    /// Adapt the sequence into a boxed [`Stream`] for task-based consumers.
    pub fn into_stream(self) -> PageStream {
        Box::pin(stream::unfold(self, |mut pages| async move {
            match pages.try_next().await {
                Ok(Some(page)) => Some((Ok(page), pages)),
                Ok(None) => None,
                Err(e) => Some((Err(e), pages)),
            }
        }))
    }
}

/// Cursor-based page sequence.
///
/// Each subsequent request sets `cursor` to the prior meta's `next_cursor`.
/// Terminates when the provider signals exhaustion with cursor `0` (an absent
/// cursor is treated the same) or when the accumulated item count reaches the
/// budget. Cursor semantics are trusted as-is; no duplicate detection is
/// performed.
pub struct CursorPages<F> {
    fetch: F,
    base_params: Params,
    budget: usize,
    cursor: Option<i64>,
    yielded: usize,
    done: bool,
}

impl<F, Fut> CursorPages<F>
where
    F: FnMut(Params) -> Fut,
    Fut: Future<Output = Result<Page, CallError>>,
{
    /// Start a sequence from the provider's first page.
    pub fn new(fetch: F, base_params: Params, budget: usize) -> Self {
        Self {
            fetch,
            base_params,
            budget,
            cursor: None,
            yielded: 0,
            done: false,
        }
    }

    /// Start (or restart) a sequence from an explicit cursor.
    pub fn starting_at(fetch: F, base_params: Params, budget: usize, cursor: i64) -> Self {
        let mut pages = Self::new(fetch, base_params, budget);
        pages.cursor = Some(cursor);
        pages
    }

    /// Fetch and yield the next page, or `None` once the sequence is over.
    ///
    /// # Errors
    /// Propagates fatal fetch errors; the sequence is finished afterwards.
    pub async fn try_next(&mut self) -> Result<Option<Page>, CallError> {
        if self.done || self.yielded >= self.budget {
            return Ok(None);
        }

        let mut params = self.base_params.clone();
        if let Some(cursor) = self.cursor {
            params.push(("cursor".to_string(), cursor.to_string()));
        }

        let page = match (self.fetch)(params).await {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };

        self.yielded += page.meta.count;

        match page.meta.next_cursor {
            None | Some(0) => {
                debug!(
                    "cursor pagination complete: exhausted after {} items",
                    self.yielded
                );
                self.done = true;
            }
            Some(next_cursor) => {
                self.cursor = Some(next_cursor);
            }
        }

        Ok(Some(page))
    }

    /// Number of items yielded so far.
    pub fn items_yielded(&self) -> usize {
        self.yielded
    }
}

impl<F, Fut> CursorPages<F>
where
    F: FnMut(Params) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Page, CallError>> + Send,
{
    /// Adapt the sequence into a boxed [`Stream`] for task-based consumers.
    pub fn into_stream(self) -> PageStream {
        Box::pin(stream::unfold(self, |mut pages| async move {
            match pages.try_next().await {
                Ok(Some(page)) => Some((Ok(page), pages)),
                Ok(None) => None,
                Err(e) => Some((Err(e), pages)),
            }
        }))
    }
}
