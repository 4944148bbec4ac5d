use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::data::PostSource;
use crate::filler::{FillOutcome, PageFiller, DEFAULT_MAX_ATTEMPTS};
use crate::gif::{Gif, GifView};
use crate::loading::LoadingTracker;
use crate::pagination::{CompletionHandle, FillStatus, PaginationState};
use crate::query::{Query, QueryController, DEFAULT_DEBOUNCE};
use crate::settings::{Settings, SettingsHandle};

/// What a sort or page size change does to the active feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SettingsChangePolicy {
    /// Start over exactly as if the term had changed.
    #[default]
    Reset,
    /// Keep the list; the new values apply from the next fetch on.
    Live,
}

#[derive(Debug, Clone, Copy)]
pub struct FeedOptions {
    pub debounce: Duration,
    pub max_attempts: usize,
    pub on_settings_change: SettingsChangePolicy,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            on_settings_change: SettingsChangePolicy::default(),
        }
    }
}

/// Ordered gifs gathered for the active query. Never deduplicates.
#[derive(Debug, Default, Clone)]
pub struct Accumulator {
    gifs: Vec<Gif>,
}

impl Accumulator {
    pub fn reset(&mut self) {
        self.gifs.clear();
    }

    pub fn append(&mut self, batch: Vec<Gif>) -> &[Gif] {
        self.gifs.extend(batch);
        &self.gifs
    }

    pub fn gifs(&self) -> &[Gif] {
        &self.gifs
    }

    pub fn len(&self) -> usize {
        self.gifs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gifs.is_empty()
    }
}

struct PendingFill {
    request_id: u64,
    cancel_flag: Arc<AtomicBool>,
    /// Signalled once the fill's result has been applied. Dropped unsignalled
    /// when the fill is superseded.
    completion: Option<CompletionHandle>,
}

struct FillResponse {
    request_id: u64,
    outcome: FillOutcome,
}

/// Owns the retrieval pipeline for one query at a time. Fills run on a worker
/// thread; their results are applied on the owner's thread by [`Feed::tick`],
/// [`Feed::poll`] or [`Feed::settle`].
pub struct Feed {
    filler: Arc<PageFiller>,
    settings: SettingsHandle,
    settings_rx: Receiver<Settings>,
    /// Settings the active query was last reset with.
    active_settings: Settings,
    policy: SettingsChangePolicy,
    controller: QueryController,
    term: Option<String>,
    accumulator: Accumulator,
    tracker: LoadingTracker,
    more_available: bool,
    response_tx: Sender<FillResponse>,
    response_rx: Receiver<FillResponse>,
    next_request_id: u64,
    pending: Option<PendingFill>,
    queued: VecDeque<PaginationState>,
}

impl Feed {
    pub fn new(source: Arc<dyn PostSource>, settings: SettingsHandle, options: FeedOptions) -> Self {
        let filler = PageFiller::new(source).with_max_attempts(options.max_attempts);
        let settings_rx = settings.subscribe();
        let active_settings = settings.current();
        let (response_tx, response_rx) = unbounded();
        Self {
            filler: Arc::new(filler),
            settings,
            settings_rx,
            active_settings,
            policy: options.on_settings_change,
            controller: QueryController::new(options.debounce),
            term: None,
            accumulator: Accumulator::default(),
            tracker: LoadingTracker::new(),
            more_available: true,
            response_tx,
            response_rx,
            next_request_id: 1,
            pending: None,
            queued: VecDeque::new(),
        }
    }

    /// Activates the feed with `term`, fetching the first page without waiting
    /// for the debounce window.
    pub fn start(&mut self, term: &str) {
        let term = self.controller.activate(term);
        self.reset(term);
    }

    /// Records term input. It takes effect on a later [`Feed::tick`] once the
    /// input has been quiet for the debounce window.
    pub fn set_term(&mut self, term: &str, now: Instant) {
        self.controller.input(term, now);
    }

    /// Applies debounced term changes, settings changes and finished fills.
    /// Returns true when the visible list or its flags may have changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = false;
        if let Some(term) = self.controller.poll(now) {
            self.reset(term);
            changed = true;
        }
        if self.drain_settings() {
            changed = true;
        }
        self.poll() || changed
    }

    /// Applies every finished fill without blocking.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(response) = self.response_rx.try_recv() {
            changed |= self.handle_response(response);
        }
        changed
    }

    /// Blocks until no fill is in flight or queued, or `timeout` elapses.
    /// Returns true when the feed went idle.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending.is_some() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) => {
                    self.handle_response(response);
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return false;
                }
            }
        }
        true
    }

    /// Requests the page after `after`, the name of the last gif held. The
    /// request runs behind any fill already in flight. The returned receiver
    /// gets the fill's status, or disconnects if the fill is superseded.
    pub fn load_more(&mut self, after: &str) -> Receiver<FillStatus> {
        let (handle, rx) = CompletionHandle::channel();
        if self.term.is_none() {
            return rx;
        }
        self.queued
            .push_back(PaginationState::next_page(after, Some(handle)));
        self.dispatch_next();
        rx
    }

    pub fn items(&self) -> Vec<GifView> {
        self.accumulator
            .gifs()
            .iter()
            .map(|gif| GifView {
                loading: self.tracker.is_loading(&gif.permalink),
                loaded: self.tracker.is_loaded(&gif.permalink),
                gif: gif.clone(),
            })
            .collect()
    }

    pub fn gifs(&self) -> &[Gif] {
        self.accumulator.gifs()
    }

    pub fn last_name(&self) -> Option<&str> {
        self.accumulator.gifs().last().map(|gif| gif.name.as_str())
    }

    pub fn more_available(&self) -> bool {
        self.more_available
    }

    pub fn term(&self) -> Option<&str> {
        self.term.as_deref()
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    pub fn set_loading(&mut self, permalink: &str) {
        self.tracker.set_loading(permalink);
    }

    pub fn set_loading_complete(&mut self, permalink: &str) {
        self.tracker.set_loading_complete(permalink);
    }

    fn reset(&mut self, term: String) {
        if let Some(pending) = self.pending.take() {
            pending.cancel_flag.store(true, Ordering::SeqCst);
        }
        let dropped = self.queued.len();
        self.queued.clear();
        self.accumulator.reset();
        self.more_available = true;
        self.active_settings = self.settings.current();
        info!(term = %term, dropped_requests = dropped, "feed: reset");
        self.term = Some(term);
        self.queued.push_back(PaginationState::first_page());
        self.dispatch_next();
    }

    fn drain_settings(&mut self) -> bool {
        let mut latest = None;
        while let Ok(settings) = self.settings_rx.try_recv() {
            latest = Some(settings);
        }
        let Some(latest) = latest else {
            return false;
        };
        if self.policy == SettingsChangePolicy::Live {
            return false;
        }
        if latest == self.active_settings {
            debug!(?latest, "feed: settings back to active values, keeping list");
            return false;
        }
        match self.term.clone() {
            Some(term) => {
                self.reset(term);
                true
            }
            None => false,
        }
    }

    fn dispatch_next(&mut self) {
        if self.pending.is_some() {
            return;
        }
        let Some(term) = self.term.clone() else {
            return;
        };
        let Some(mut state) = self.queued.pop_front() else {
            return;
        };

        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        let query = Query::new(term, self.settings.current());
        let cancel_flag = Arc::new(AtomicBool::new(false));
        self.pending = Some(PendingFill {
            request_id,
            cancel_flag: cancel_flag.clone(),
            completion: state.completion.take(),
        });

        let filler = self.filler.clone();
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let Some(outcome) = filler.fill(&query, state, &cancel_flag) else {
                return;
            };
            if cancel_flag.load(Ordering::SeqCst) {
                return;
            }
            let _ = tx.send(FillResponse {
                request_id,
                outcome,
            });
        });
    }

    fn handle_response(&mut self, response: FillResponse) -> bool {
        let FillResponse {
            request_id,
            outcome,
        } = response;
        let current = match &self.pending {
            Some(pending) => pending.request_id == request_id,
            None => false,
        };
        if !current {
            debug!(request_id, count = outcome.gifs.len(), "feed: discarding stale fill");
            return false;
        }
        let completion = self.pending.take().and_then(|pending| pending.completion);
        self.more_available = outcome.status.more_available();
        let total = self.accumulator.append(outcome.gifs).len();
        debug!(request_id, total, status = ?outcome.status, "feed: page appended");
        if let Some(handle) = completion {
            handle.complete(outcome.status);
        }
        self.dispatch_next();
        true
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel_flag.store(true, Ordering::SeqCst);
        }
    }
}
