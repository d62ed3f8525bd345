//! Sequential detection run over a candidate folder.

use crate::config::Settings;
use crate::face::{FaceService, RecognitionModel};
use crate::reference::{EmbeddingOutcome, ReferenceImage};
use crate::scan::CandidateSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that stop a run before any candidate is processed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    #[error("Please select both thief image and folder.")]
    NoReference,
    #[error("Please select both thief image and folder.")]
    NoFolder,
    #[error("No face detected in the thief image.")]
    NoReferenceFace,
    #[error("Thief image could not be analysed: {0}")]
    ReferenceUnavailable(String),
}

/// Cooperative cancellation flag, checked between candidates.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchSettings {
    pub model: RecognitionModel,
    /// A candidate matches only when the verification distance is at or
    /// below this value, regardless of the service's own verdict.
    pub distance_threshold: f32,
}

impl From<&Settings> for MatchSettings {
    fn from(s: &Settings) -> Self {
        Self {
            model: s.model,
            distance_threshold: s.distance_threshold,
        }
    }
}

impl Default for MatchSettings {
    fn default() -> Self {
        (&Settings::default()).into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedImage {
    pub path: PathBuf,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateErrorKind {
    /// The file could not be decoded as an image.
    Decode,
    /// Face extraction or verification failed.
    Service,
}

/// A candidate skipped because of an error. Never fatal to the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateError {
    pub path: PathBuf,
    pub kind: CandidateErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectionEvent {
    Started { total: usize },
    Progress { done: usize, total: usize },
    Matched(MatchedImage),
    CandidateFailed(CandidateError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionReport {
    /// Matches in encounter order.
    pub matches: Vec<MatchedImage>,
    pub errors: Vec<CandidateError>,
    pub processed: usize,
    pub total: usize,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl DetectionReport {
    pub fn match_paths(&self) -> Vec<PathBuf> {
        self.matches.iter().map(|m| m.path.clone()).collect()
    }

    pub fn decode_errors(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| e.kind == CandidateErrorKind::Decode)
            .count()
    }

    pub fn summary(&self) -> String {
        if self.cancelled {
            format!(
                "Stopped after {} of {} images, {} with thief.",
                self.processed,
                self.total,
                self.matches.len()
            )
        } else {
            format!("Detected {} images with thief.", self.matches.len())
        }
    }
}

/// Inputs of one detection run, snapshotted from the session.
#[derive(Clone, Default)]
pub struct DetectionJob {
    pub reference: Option<ReferenceImage>,
    pub candidates: Option<CandidateSet>,
}

pub struct MatchDriver {
    service: Arc<dyn FaceService>,
    settings: MatchSettings,
}

impl MatchDriver {
    pub fn new(service: Arc<dyn FaceService>, settings: MatchSettings) -> Self {
        Self { service, settings }
    }

    /// Run detection over every candidate in order. Blocks on the reference
    /// embedding, so call it off the UI thread.
    pub fn run<F>(
        &self,
        job: &DetectionJob,
        cancel: &CancelToken,
        mut on_event: F,
    ) -> Result<DetectionReport, DetectionError>
    where
        F: FnMut(DetectionEvent),
    {
        let Some(reference) = job.reference.as_ref() else {
            tracing::warn!("thief image not selected");
            return Err(DetectionError::NoReference);
        };
        let Some(candidates) = job.candidates.as_ref() else {
            tracing::warn!("image folder not selected");
            return Err(DetectionError::NoFolder);
        };

        match reference.embedding.wait() {
            EmbeddingOutcome::Ready(_) => {}
            EmbeddingOutcome::NoFace => {
                tracing::error!("no face detected in the thief image");
                return Err(DetectionError::NoReferenceFace);
            }
            EmbeddingOutcome::Failed(reason) => {
                tracing::error!("thief embedding unavailable: {reason}");
                return Err(DetectionError::ReferenceUnavailable(reason));
            }
        }

        let start = Instant::now();
        let total = candidates.len();
        tracing::info!(total, folder = %candidates.folder.display(), "starting thief detection");
        on_event(DetectionEvent::Started { total });

        let mut report = DetectionReport {
            total,
            ..DetectionReport::default()
        };
        for (idx, path) in candidates.images.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(processed = idx, total, "detection cancelled");
                report.cancelled = true;
                break;
            }
            match self.check_candidate(&reference.path, path) {
                Ok(Some(hit)) => {
                    tracing::info!(
                        distance = hit.distance,
                        "thief detected in image: {}",
                        path.display()
                    );
                    report.matches.push(hit.clone());
                    on_event(DetectionEvent::Matched(hit));
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!("error processing image {}: {}", path.display(), err.message);
                    report.errors.push(err.clone());
                    on_event(DetectionEvent::CandidateFailed(err));
                }
            }
            report.processed = idx + 1;
            on_event(DetectionEvent::Progress {
                done: idx + 1,
                total,
            });
        }

        report.elapsed = start.elapsed();
        tracing::info!(
            matches = report.matches.len(),
            processed = report.processed,
            errors = report.errors.len(),
            "detection complete in {:.1?}",
            report.elapsed
        );
        Ok(report)
    }

    fn check_candidate(
        &self,
        reference: &Path,
        candidate: &Path,
    ) -> Result<Option<MatchedImage>, CandidateError> {
        if let Err(e) = image::open(candidate) {
            return Err(candidate_error(candidate, CandidateErrorKind::Decode, e));
        }

        let faces = self
            .service
            .extract_faces(candidate)
            .map_err(|e| candidate_error(candidate, CandidateErrorKind::Service, e))?;
        if faces.is_empty() {
            tracing::debug!("no faces in {}", candidate.display());
            return Ok(None);
        }

        for _face in &faces {
            let verdict = self
                .service
                .verify(reference, candidate, self.settings.model)
                .map_err(|e| candidate_error(candidate, CandidateErrorKind::Service, e))?;
            tracing::debug!(
                verified = verdict.verified,
                distance = verdict.distance,
                "verified {}",
                candidate.display()
            );
            if verdict.distance <= self.settings.distance_threshold {
                return Ok(Some(MatchedImage {
                    path: candidate.to_path_buf(),
                    distance: verdict.distance,
                }));
            }
        }
        Ok(None)
    }
}

fn candidate_error(
    path: &Path,
    kind: CandidateErrorKind,
    err: impl std::fmt::Display,
) -> CandidateError {
    CandidateError {
        path: path.to_path_buf(),
        kind,
        message: err.to_string(),
    }
}
