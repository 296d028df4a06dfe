//! Scripted feed source
//!
//! Serves pre-built pages for tests and demos without network access.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{ContractError, FeedSource, MessageRecord, SourceId};
use tracing::trace;

#[derive(Default)]
struct FeedState {
    pages: VecDeque<Result<Vec<MessageRecord>, String>>,
    last_page: Vec<MessageRecord>,
    fetches: usize,
}

/// Feed answering from a queue of pages.
///
/// Once the queue is drained the last successful page is served again,
/// like a channel with no new posts. Clones share state.
#[derive(Clone, Default)]
pub struct ScriptedFeed {
    state: Arc<Mutex<FeedState>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed that serves `records` on every fetch
    pub fn with_page(records: Vec<MessageRecord>) -> Self {
        let feed = Self::new();
        feed.push_page(records);
        feed
    }

    /// Queue a page for the next fetch
    pub fn push_page(&self, records: Vec<MessageRecord>) {
        self.lock().pages.push_back(Ok(records));
    }

    /// Queue a failed fetch
    pub fn push_error(&self, message: impl Into<String>) {
        self.lock().pages.push_back(Err(message.into()));
    }

    /// Number of fetches served so far
    pub fn fetches(&self) -> usize {
        self.lock().fetches
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FeedSource for ScriptedFeed {
    async fn fetch(&self, source: &SourceId) -> Result<Vec<MessageRecord>, ContractError> {
        let mut state = self.lock();
        state.fetches += 1;
        trace!(source = %source, fetch = state.fetches, "scripted fetch");

        match state.pages.pop_front() {
            Some(Ok(page)) => {
                state.last_page = page.clone();
                Ok(page)
            }
            Some(Err(message)) => Err(ContractError::feed(source.as_str(), message)),
            None => Ok(state.last_page.clone()),
        }
    }
}
