use std::collections::HashSet;

/// Resume point and finalized-item ledger for one harvesting run.
///
/// `processed_urls` only grows, `current_page` never decreases and
/// `total_downloaded` counts successful items only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressState {
    current_page: u32,
    processed: Vec<String>,
    index: HashSet<String>,
    total_downloaded: u64,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressState {
    pub fn new() -> Self {
        Self {
            current_page: 1,
            processed: Vec::new(),
            index: HashSet::new(),
            total_downloaded: 0,
        }
    }

    /// Rebuild state from persisted parts. A page of 0 is clamped to 1 and
    /// repeated URLs keep their first position.
    pub fn from_parts(
        current_page: u32,
        processed_urls: impl IntoIterator<Item = String>,
        total_downloaded: u64,
    ) -> Self {
        let mut state = Self {
            current_page: current_page.max(1),
            total_downloaded,
            ..Self::new()
        };
        for url in processed_urls {
            state.insert(url);
        }
        state
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_downloaded(&self) -> u64 {
        self.total_downloaded
    }

    /// Processed URLs in the order they were finalized.
    pub fn processed_urls(&self) -> &[String] {
        &self.processed
    }

    pub fn is_processed(&self, url: &str) -> bool {
        self.index.contains(url)
    }

    /// Mark an item as downloaded. Returns `false` (and changes nothing) if the
    /// URL was already finalized.
    pub fn record_success(&mut self, url: &str) -> bool {
        if !self.insert(url.to_string()) {
            return false;
        }
        self.total_downloaded += 1;
        true
    }

    /// Mark an item as permanently skipped. Returns `false` if the URL was
    /// already finalized.
    pub fn record_skip(&mut self, url: &str) -> bool {
        self.insert(url.to_string())
    }

    /// Move the resume point past a fully handled page.
    pub fn advance_page(&mut self) {
        self.current_page = self.current_page.saturating_add(1);
    }

    pub fn target_reached(&self, target: u64) -> bool {
        self.total_downloaded >= target
    }

    fn insert(&mut self, url: String) -> bool {
        if self.index.contains(&url) {
            return false;
        }
        self.index.insert(url.clone());
        self.processed.push(url);
        true
    }
}
