use std::collections::HashSet;

use crate::ProgressState;

/// Read-only membership view over the processed set of a [`ProgressState`].
#[derive(Debug, Clone, Copy)]
pub struct DeduplicationIndex<'a> {
    state: &'a ProgressState,
}

impl<'a> DeduplicationIndex<'a> {
    pub fn new(state: &'a ProgressState) -> Self {
        Self { state }
    }

    pub fn is_new(&self, id: &str) -> bool {
        !self.state.is_processed(id)
    }

    /// Links that still need work, in the given order, each at most once.
    pub fn filter_new<'b, S: AsRef<str>>(&self, links: &'b [S]) -> Vec<&'b str> {
        let mut seen = HashSet::new();
        links
            .iter()
            .map(AsRef::as_ref)
            .filter(|link| self.is_new(link) && seen.insert(*link))
            .collect()
    }
}
