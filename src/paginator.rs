//! Client-side infinite-scroll feed.
//!
//! [`FeedPaginator`] accumulates pages of the global feed into a single list.
//! Pages are requested one at a time: the paginator hands out at most one
//! [`PageTicket`] and drops fetch triggers that arrive while it is outstanding.
//!
//! ```text
//! Empty --fetch--> Loading --ok, more--> Ready(true) --fetch--> Loading
//!                     |  \--ok, none--> Ready(false)
//!                     \--failure--> Error --retry--> Loading
//! ```
//!
//! Offsets shift when posts are created or deleted between page requests. A
//! re-fetched post is dropped by id; a post skipped because of a local delete
//! is not recovered.

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::Mutex;

use crate::client::ClientError;
use crate::models::{FeedPage, Page, Post, PostId};
use crate::store::PostStore;
use crate::validation::PostContent;

/// Fetches one page of the feed. Pages are 1-indexed.
pub trait PageFetcher {
    fn fetch_page(
        &self,
        page: u32,
    ) -> impl std::future::Future<Output = Result<FeedPage, ClientError>> + Send;
}

/// Reads pages straight from a store, for running the feed in-process.
#[derive(Clone)]
pub struct StoreFetcher<S> {
    store: Arc<Mutex<S>>,
    page_size: u32,
}

impl<S> StoreFetcher<S> {
    pub fn new(store: Arc<Mutex<S>>, page_size: u32) -> Self {
        StoreFetcher { store, page_size }
    }
}

impl<S: PostStore + Send + Sync> PageFetcher for StoreFetcher<S> {
    async fn fetch_page(&self, page: u32) -> Result<FeedPage, ClientError> {
        self.store
            .lock()
            .await
            .list_posts(Page::new(page, self.page_size))
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    Empty,
    Loading,
    Ready { has_more: bool },
    Error(ClientError),
}

/// What prompted a fetch. Only used for logging; every trigger goes through
/// the same in-flight guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedTrigger {
    Mount,
    NearBottom,
    Retry,
}

/// Permission to fetch one page. Responses are only applied for the ticket
/// the paginator is currently waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTicket {
    page: u32,
    generation: u64,
}

impl PageTicket {
    pub fn page(&self) -> u32 {
        self.page
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// `received` posts came back, `appended` of them were new.
    Appended {
        page: u32,
        received: usize,
        appended: usize,
    },
    Skipped(SkipReason),
    /// The response belonged to a ticket that is no longer current.
    Stale,
}

pub struct FeedPaginator<F> {
    fetcher: F,
    posts: Vec<Post>,
    seen: HashSet<PostId>,
    next_page: u32,
    has_more: bool,
    status: FeedStatus,
    generation: u64,
    in_flight: Option<PageTicket>,
}

impl<F: PageFetcher> FeedPaginator<F> {
    pub fn new(fetcher: F) -> Self {
        FeedPaginator {
            fetcher,
            posts: Vec::new(),
            seen: HashSet::new(),
            next_page: 1,
            has_more: true,
            status: FeedStatus::Empty,
            generation: 0,
            in_flight: None,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn status(&self) -> &FeedStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Page the next fetch will request.
    pub fn next_page(&self) -> u32 {
        self.next_page
    }

    pub fn pages_loaded(&self) -> u32 {
        self.next_page - 1
    }

    /// Claims the next page, unless a fetch is already outstanding or the
    /// feed is exhausted.
    pub fn begin_fetch(&mut self) -> Result<PageTicket, SkipReason> {
        if self.in_flight.is_some() {
            return Err(SkipReason::InFlight);
        }
        if !self.has_more {
            return Err(SkipReason::Exhausted);
        }
        let ticket = PageTicket {
            page: self.next_page,
            generation: self.generation,
        };
        self.in_flight = Some(ticket);
        self.status = FeedStatus::Loading;
        Ok(ticket)
    }

    pub fn trigger(&mut self, trigger: FeedTrigger) -> Option<PageTicket> {
        match self.begin_fetch() {
            Ok(ticket) => {
                debug!("{trigger:?} requested page {}", ticket.page);
                Some(ticket)
            }
            Err(reason) => {
                debug!("{trigger:?} ignored: {reason:?}");
                None
            }
        }
    }

    /// Applies the response for `ticket`. A failure leaves posts, cursor and
    /// `has_more` exactly as they were.
    pub fn complete_fetch(
        &mut self,
        ticket: PageTicket,
        result: Result<FeedPage, ClientError>,
    ) -> Result<FetchOutcome, ClientError> {
        if self.in_flight != Some(ticket) {
            debug!(
                "Dropping stale response for page {} (generation {})",
                ticket.page, ticket.generation
            );
            return Ok(FetchOutcome::Stale);
        }
        self.in_flight = None;

        let page = match result {
            Ok(page) => page,
            Err(error) => {
                warn!("Fetching page {} failed: {error}", ticket.page);
                self.status = FeedStatus::Error(error.clone());
                return Err(error);
            }
        };

        let received = page.posts.len();
        let mut appended = 0;
        for post in page.posts {
            if self.seen.insert(post.id.clone()) {
                self.posts.push(post);
                appended += 1;
            } else {
                debug!("Page {} repeated post {}", ticket.page, post.id);
            }
        }
        self.has_more = page.has_more;
        self.next_page += 1;
        self.status = FeedStatus::Ready {
            has_more: self.has_more,
        };

        Ok(FetchOutcome::Appended {
            page: ticket.page,
            received,
            appended,
        })
    }

    /// Requests the next page and appends it. A no-op while another fetch is
    /// outstanding or once the feed is exhausted.
    pub async fn fetch_next_page(&mut self) -> Result<FetchOutcome, ClientError> {
        let ticket = match self.begin_fetch() {
            Ok(ticket) => ticket,
            Err(reason) => return Ok(FetchOutcome::Skipped(reason)),
        };
        let result = self.fetcher.fetch_page(ticket.page).await;
        self.complete_fetch(ticket, result)
    }

    /// Starts over from page 1. Call after the current user creates a post:
    /// the new post shifts every later page, so appending would skip or repeat.
    pub async fn reset_after_mutation(&mut self) -> Result<FetchOutcome, ClientError> {
        self.generation += 1;
        self.in_flight = None;
        self.posts.clear();
        self.seen.clear();
        self.next_page = 1;
        self.has_more = true;
        self.status = FeedStatus::Empty;
        self.fetch_next_page().await
    }

    /// Replaces the content of a loaded post. Returns whether it was loaded.
    pub fn apply_local_edit(&mut self, id: &PostId, content: PostContent) -> bool {
        match self.posts.iter_mut().find(|post| &post.id == id) {
            Some(post) => {
                post.content = content;
                true
            }
            None => false,
        }
    }

    /// Drops a loaded post. Cursor and `has_more` are left alone.
    pub fn apply_local_delete(&mut self, id: &PostId) -> bool {
        let before = self.posts.len();
        self.posts.retain(|post| &post.id != id);
        self.posts.len() != before
    }
}
