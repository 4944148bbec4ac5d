use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::data::PostSource;
use crate::gif::{self, Gif};
use crate::pagination::{FillStatus, PaginationState};
use crate::query::Query;

pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillOutcome {
    pub gifs: Vec<Gif>,
    pub status: FillStatus,
    /// Index of the last fetch attempt made, starting at zero.
    pub last_attempt: usize,
}

/// Pulls listing pages until a page's worth of playable gifs has been found or
/// retrieval is abandoned.
pub struct PageFiller {
    source: Arc<dyn PostSource>,
    max_attempts: usize,
}

impl PageFiller {
    pub fn new(source: Arc<dyn PostSource>) -> Self {
        Self {
            source,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Runs one fill. Returns `None` when `cancel` was raised before the fill
    /// reached a terminal state; the completion handle is dropped in that case.
    pub fn fill(
        &self,
        query: &Query,
        mut state: PaginationState,
        cancel: &AtomicBool,
    ) -> Option<FillOutcome> {
        let mut required = query.per_page;
        let mut cursor = state.after.take();
        let mut gifs: Vec<Gif> = Vec::with_capacity(required);
        state.retries = 0;

        debug!(term = %query.term, sort = query.sort.as_str(), required, after = ?cursor, "fill: start");

        loop {
            if cancel.load(Ordering::SeqCst) {
                debug!(term = %query.term, attempt = state.retries, "fill: cancelled");
                return None;
            }

            let posts = match self.source.fetch_page(
                &query.term,
                query.sort,
                cursor.as_deref(),
                required,
            ) {
                Ok(posts) => posts,
                Err(err) => {
                    warn!(term = %query.term, attempt = state.retries, error = %err, "fill: fetch failed");
                    Vec::new()
                }
            };

            if cancel.load(Ordering::SeqCst) {
                debug!(term = %query.term, attempt = state.retries, "fill: cancelled");
                return None;
            }

            let valid: Vec<Gif> = posts.iter().filter_map(gif::normalize).collect();
            debug!(
                attempt = state.retries,
                raw = posts.len(),
                valid = valid.len(),
                required,
                "fill: page received"
            );

            if valid.len() >= required {
                gifs.extend(valid.into_iter().take(required));
                return Some(finish(state, gifs, FillStatus::Filled));
            }

            let got_valid = valid.len();
            gifs.extend(valid);

            let last = match posts.last() {
                Some(last) if state.retries < self.max_attempts => last,
                _ => return Some(finish(state, gifs, FillStatus::Exhausted)),
            };

            required -= got_valid;
            cursor = Some(last.name.clone());
            state.retries += 1;
        }
    }
}

fn finish(mut state: PaginationState, gifs: Vec<Gif>, status: FillStatus) -> FillOutcome {
    debug!(count = gifs.len(), attempts = state.retries + 1, ?status, "fill: done");
    if let Some(handle) = state.completion.take() {
        handle.complete(status);
    }
    FillOutcome {
        gifs,
        status,
        last_attempt: state.retries,
    }
}
