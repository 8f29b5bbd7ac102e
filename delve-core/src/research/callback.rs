//! Progress callbacks for research runs.

use super::state::ResearchPhase;
use crate::error::ResearchError;
use std::sync::Mutex;

/// Callback trait for progressive research UI updates.
pub trait ResearchCallback: Send + Sync {
    /// Called when a phase begins.
    fn on_phase_change(&self, phase: ResearchPhase);
    /// Called with a short human-readable progress line.
    fn on_progress(&self, message: &str);
    /// Called when a phase failure forces a degraded report.
    fn on_degraded(&self, error: &ResearchError);
}

/// No-op callback for testing.
pub struct NoOpResearchCallback;

impl ResearchCallback for NoOpResearchCallback {
    fn on_phase_change(&self, _phase: ResearchPhase) {}
    fn on_progress(&self, _message: &str) {}
    fn on_degraded(&self, _error: &ResearchError) {}
}

/// Callback that records every event, for tests.
#[derive(Default)]
pub struct RecordingResearchCallback {
    phases: Mutex<Vec<ResearchPhase>>,
    progress: Mutex<Vec<String>>,
    degraded: Mutex<Vec<String>>,
}

impl RecordingResearchCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phases(&self) -> Vec<ResearchPhase> {
        self.phases.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<String> {
        self.progress.lock().unwrap().clone()
    }

    /// Display strings of the errors that degraded a run.
    pub fn degraded(&self) -> Vec<String> {
        self.degraded.lock().unwrap().clone()
    }
}

impl ResearchCallback for RecordingResearchCallback {
    fn on_phase_change(&self, phase: ResearchPhase) {
        self.phases.lock().unwrap().push(phase);
    }

    fn on_progress(&self, message: &str) {
        self.progress.lock().unwrap().push(message.to_string());
    }

    fn on_degraded(&self, error: &ResearchError) {
        self.degraded.lock().unwrap().push(error.to_string());
    }
}
