use serde::{Deserialize, Serialize};

/// Candidates processed so far in the current run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

impl Progress {
    pub fn start(total: usize) -> Self {
        Self { done: 0, total }
    }

    /// Record a progress report. `done` is clamped to `total` and never
    /// moves backwards within a run.
    pub fn update(&mut self, done: usize, total: usize) {
        self.total = total;
        self.done = done.max(self.done).min(total);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_complete(&self) -> bool {
        self.done == self.total
    }

    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.done as f32 / self.total as f32
    }

    pub fn label(&self) -> String {
        format!("{} / {}", self.done, self.total)
    }
}
