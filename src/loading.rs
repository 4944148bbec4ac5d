use std::collections::HashSet;

/// Tracks secondary loads per gif, keyed by permalink.
#[derive(Debug, Default, Clone)]
pub struct LoadingTracker {
    loading: HashSet<String>,
    loaded: HashSet<String>,
}

impl LoadingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starting a load again on a finished id clears its loaded mark.
    pub fn set_loading(&mut self, permalink: &str) {
        self.loaded.remove(permalink);
        self.loading.insert(permalink.to_string());
    }

    pub fn set_loading_complete(&mut self, permalink: &str) {
        self.loaded.insert(permalink.to_string());
        let loaded = &self.loaded;
        self.loading.retain(|id| !loaded.contains(id));
    }

    pub fn is_loading(&self, permalink: &str) -> bool {
        self.loading.contains(permalink)
    }

    pub fn is_loaded(&self, permalink: &str) -> bool {
        self.loaded.contains(permalink)
    }

    pub fn loading_count(&self) -> usize {
        self.loading.len()
    }
}
