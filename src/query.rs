use std::time::{Duration, Instant};

use crate::reddit::SortOption;
use crate::settings::Settings;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// The effective query a fill runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub term: String,
    pub sort: SortOption,
    pub per_page: usize,
}

impl Query {
    pub fn new(term: impl Into<String>, settings: Settings) -> Self {
        Self {
            term: term.into(),
            sort: settings.sort(),
            per_page: settings.per_page(),
        }
    }
}

/// Coalesces term input. A new term is released once no newer input has
/// arrived for the quiescence window, and only if it differs from the last
/// term released.
#[derive(Debug)]
pub struct QueryController {
    delay: Duration,
    current: Option<String>,
    pending: Option<Pending>,
}

#[derive(Debug)]
struct Pending {
    term: String,
    deadline: Instant,
}

impl QueryController {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            current: None,
            pending: None,
        }
    }

    /// Releases `initial` right away, skipping the quiescence window.
    pub fn activate(&mut self, initial: &str) -> String {
        self.pending = None;
        self.current = Some(initial.to_string());
        initial.to_string()
    }

    pub fn input(&mut self, term: &str, now: Instant) {
        self.pending = Some(Pending {
            term: term.to_string(),
            deadline: now + self.delay,
        });
    }

    pub fn poll(&mut self, now: Instant) -> Option<String> {
        let ready = matches!(&self.pending, Some(pending) if now >= pending.deadline);
        if !ready {
            return None;
        }
        let term = self.pending.take()?.term;
        if self.current.as_deref() == Some(term.as_str()) {
            return None;
        }
        self.current = Some(term.clone());
        Some(term)
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn time_until_ready(&self, now: Instant) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|pending| pending.deadline.saturating_duration_since(now))
    }
}

impl Default for QueryController {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn first_term_is_immediate() {
        let mut controller = QueryController::default();
        assert_eq!(controller.activate("gifs"), "gifs");
        assert_eq!(controller.current(), Some("gifs"));
        assert!(!controller.has_pending());
    }

    #[test]
    fn releases_after_quiet_window() {
        let start = Instant::now();
        let mut controller = QueryController::default();
        controller.activate("gifs");

        controller.input("aww", start);
        assert_eq!(controller.poll(start + ms(299)), None);
        assert_eq!(controller.time_until_ready(start + ms(100)), Some(ms(200)));
        assert_eq!(controller.poll(start + ms(300)), Some("aww".to_string()));
        assert_eq!(controller.poll(start + ms(900)), None);
    }

    #[test]
    fn newer_input_restarts_window() {
        let start = Instant::now();
        let mut controller = QueryController::default();
        controller.activate("gifs");

        controller.input("a", start);
        controller.input("aw", start + ms(200));
        assert_eq!(controller.poll(start + ms(350)), None);
        controller.input("aww", start + ms(400));
        assert_eq!(controller.poll(start + ms(699)), None);
        assert_eq!(controller.poll(start + ms(700)), Some("aww".to_string()));
    }

    #[test]
    fn unchanged_term_is_suppressed() {
        let start = Instant::now();
        let mut controller = QueryController::new(ms(50));
        controller.activate("gifs");

        controller.input("gif", start);
        controller.input("gifs", start + ms(10));
        assert_eq!(controller.poll(start + ms(100)), None);
        assert!(!controller.has_pending());
        assert_eq!(controller.current(), Some("gifs"));
    }

    #[test]
    fn query_reads_settings() {
        let settings = Settings::new(SortOption::Top, 4).unwrap();
        let query = Query::new("aww", settings);
        assert_eq!(query.sort, SortOption::Top);
        assert_eq!(query.per_page, 4);
    }
}
