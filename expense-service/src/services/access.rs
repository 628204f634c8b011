//! Allow-list gate applied before the pipeline runs.

use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    allowed: HashSet<i64>,
}

impl AccessGate {
    /// An empty list admits every positive user id.
    pub fn new(allowed: impl IntoIterator<Item = i64>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn admits(&self, user_id: i64) -> bool {
        user_id > 0 && (self.allowed.is_empty() || self.allowed.contains(&user_id))
    }
}
