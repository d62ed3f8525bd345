//! Selections and results of one application session.

use crate::gallery::Gallery;
use crate::matcher::{CancelToken, DetectionJob, DetectionReport};
use crate::progress::Progress;
use crate::reference::ReferenceImage;
use crate::scan::CandidateSet;
use std::path::PathBuf;

/// All mutable state the application controller owns. Created at startup,
/// cleared by [`Session::reset`].
#[derive(Default)]
pub struct Session {
    pub reference: Option<ReferenceImage>,
    pub candidates: Option<CandidateSet>,
    pub report: Option<DetectionReport>,
    pub progress: Progress,
    pub gallery: Gallery,
    pub status: String,
    running: Option<CancelToken>,
}

impl Session {
    /// Snapshot of the selections for a new run. Clears previous results
    /// and hands back the token that cancels the run.
    pub fn begin_run(&mut self) -> (DetectionJob, CancelToken) {
        self.cancel_run();
        self.report = None;
        self.gallery.clear();
        self.progress = Progress::start(self.candidate_count());
        let token = CancelToken::new();
        self.running = Some(token.clone());
        let job = DetectionJob {
            reference: self.reference.clone(),
            candidates: self.candidates.clone(),
        };
        (job, token)
    }

    /// Store the finished run's report together with the thumbnails of its
    /// matches.
    pub fn finish_run(&mut self, report: DetectionReport, gallery: Gallery) {
        self.running = None;
        self.progress.update(report.processed, report.total);
        self.gallery = gallery;
        self.status = report.summary();
        self.report = Some(report);
    }

    /// Mark the current run as ended without a report.
    pub fn abort_run(&mut self, status: impl Into<String>) {
        self.running = None;
        self.status = status.into();
    }

    /// Ask the current run to stop. It stays running until its report
    /// arrives through [`Session::finish_run`].
    pub fn cancel_run(&self) {
        if let Some(token) = &self.running {
            token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// A run is still in progress but has been asked to stop.
    pub fn is_cancelling(&self) -> bool {
        self.running.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.as_ref().map_or(0, CandidateSet::len)
    }

    pub fn match_paths(&self) -> Vec<PathBuf> {
        self.report
            .as_ref()
            .map(DetectionReport::match_paths)
            .unwrap_or_default()
    }

    /// Back to the initial state with nothing selected. Cancels a run in
    /// progress.
    pub fn reset(&mut self) {
        self.cancel_run();
        *self = Self::default();
        tracing::info!("session reset");
    }

    pub fn is_empty(&self) -> bool {
        self.reference.is_none()
            && self.candidates.is_none()
            && self.report.is_none()
            && self.progress == Progress::default()
            && self.gallery.is_empty()
            && self.status.is_empty()
            && self.running.is_none()
    }
}
