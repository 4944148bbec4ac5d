use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use crate::reddit::SortOption;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("settings: page size must be greater than zero")]
    InvalidPageSize,
    #[error("settings: unknown sort {0:?}")]
    UnknownSort(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    sort: SortOption,
    per_page: usize,
}

impl Settings {
    pub fn new(sort: SortOption, per_page: usize) -> Result<Self, SettingsError> {
        if per_page == 0 {
            return Err(SettingsError::InvalidPageSize);
        }
        Ok(Self { sort, per_page })
    }

    pub fn sort(&self) -> SortOption {
        self.sort
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sort: SortOption::Hot,
            per_page: 10,
        }
    }
}

pub fn sort_option_from_key(key: &str) -> Result<SortOption, SettingsError> {
    match key.trim().to_ascii_lowercase().as_str() {
        "hot" => Ok(SortOption::Hot),
        "new" => Ok(SortOption::New),
        "top" => Ok(SortOption::Top),
        "best" => Ok(SortOption::Best),
        "rising" => Ok(SortOption::Rising),
        _ => Err(SettingsError::UnknownSort(key.to_string())),
    }
}

/// Shared, observable settings value. Clones refer to the same value.
#[derive(Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<SettingsInner>,
}

#[derive(Default)]
struct SettingsInner {
    current: RwLock<Settings>,
    watchers: Mutex<Vec<Sender<Settings>>>,
}

impl SettingsHandle {
    pub fn new(initial: Settings) -> Self {
        Self {
            inner: Arc::new(SettingsInner {
                current: RwLock::new(initial),
                watchers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn current(&self) -> Settings {
        *self.inner.current.read()
    }

    /// Stores `next` and notifies subscribers. Storing an equal value is a no-op.
    pub fn save(&self, next: Settings) {
        {
            let mut current = self.inner.current.write();
            if *current == next {
                return;
            }
            *current = next;
        }
        tracing::debug!(sort = next.sort().as_str(), per_page = next.per_page(), "settings changed");
        self.inner
            .watchers
            .lock()
            .retain(|tx| tx.send(next).is_ok());
    }

    pub fn subscribe(&self) -> Receiver<Settings> {
        let (tx, rx) = unbounded();
        self.inner.watchers.lock().push(tx);
        rx
    }
}
