use crossbeam_channel::{bounded, Receiver, Sender};

/// How a fill ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStatus {
    /// The page was filled; more may be requested.
    Filled,
    /// The upstream ran dry or the retry budget was spent.
    Exhausted,
}

impl FillStatus {
    pub fn more_available(self) -> bool {
        matches!(self, FillStatus::Filled)
    }
}

/// One-shot signal for whoever asked for a page. Dropping it unsignalled (for
/// example when the fill is superseded) disconnects the receiver.
#[derive(Debug)]
pub struct CompletionHandle {
    tx: Sender<FillStatus>,
}

impl CompletionHandle {
    pub fn channel() -> (Self, Receiver<FillStatus>) {
        let (tx, rx) = bounded(1);
        (Self { tx }, rx)
    }

    pub fn complete(self, status: FillStatus) {
        let _ = self.tx.send(status);
    }
}

#[derive(Debug, Default)]
pub struct PaginationState {
    pub after: Option<String>,
    pub retries: usize,
    pub completion: Option<CompletionHandle>,
}

impl PaginationState {
    pub fn first_page() -> Self {
        Self::default()
    }

    pub fn next_page(after: impl Into<String>, completion: Option<CompletionHandle>) -> Self {
        Self {
            after: Some(after.into()),
            retries: 0,
            completion,
        }
    }
}
