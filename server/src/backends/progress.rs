//! Pull progress estimation
//!
//! Counts layers seen waiting and layers completed. The resulting value is a coarse
//! heuristic, not a byte-accurate percentage. It starts at the `0.5` placeholder and
//! never decreases.

use std::collections::HashSet;

use crate::backends::runtime::PullEvent;

const INITIAL_PROGRESS: f32 = 0.5;

const WAITING: [&str; 2] = ["Waiting", "Pulling fs layer"];
const COMPLETED: [&str; 2] = ["Pull complete", "Already exists"];

#[derive(Debug, Clone)]
pub struct PullProgress {
    waiting: HashSet<String>,
    completed: HashSet<String>,
    value: f32,
}

impl PullProgress {
    pub fn new() -> Self {
        Self {
            waiting: HashSet::new(),
            completed: HashSet::new(),
            value: INITIAL_PROGRESS,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Feed one pull event. Returns the new value after a completion event.
    pub fn observe(&mut self, event: &PullEvent) -> Option<f32> {
        let id = event.id.as_ref()?;
        let status = event.status.as_str();

        if WAITING.contains(&status) {
            self.waiting.insert(id.clone());
            return None;
        }
        if !COMPLETED.contains(&status) {
            return None;
        }

        self.waiting.insert(id.clone());
        self.completed.insert(id.clone());

        let ratio = self.completed.len() as f32 / self.waiting.len().max(1) as f32;
        self.value = self.value.max(ratio.min(1.0));
        Some(self.value)
    }
}

impl Default for PullProgress {
    fn default() -> Self {
        Self::new()
    }
}
