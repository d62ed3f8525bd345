//! Reference ("thief") image and its asynchronously computed embedding.

use crate::face::{Embedding, FaceError, FaceService};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

/// Result of extracting the reference embedding.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingOutcome {
    Ready(Embedding),
    /// The service found no face in the reference image.
    NoFace,
    /// The service could not be asked or answered with an error.
    Failed(String),
}

impl EmbeddingOutcome {
    pub fn embedding(&self) -> Option<&Embedding> {
        match self {
            EmbeddingOutcome::Ready(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Slot {
    outcome: Mutex<Option<EmbeddingOutcome>>,
    ready: Condvar,
}

/// Promise for an [`EmbeddingOutcome`]. Resolves exactly once; clones share
/// the same slot.
#[derive(Clone, Default)]
pub struct EmbeddingHandle {
    slot: Arc<Slot>,
}

impl EmbeddingHandle {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn resolved(outcome: EmbeddingOutcome) -> Self {
        let handle = Self::pending();
        handle.resolve(outcome);
        handle
    }

    /// Publish the outcome. Later calls are ignored.
    pub fn resolve(&self, outcome: EmbeddingOutcome) {
        let mut guard = self.slot.outcome.lock().unwrap_or_else(|p| p.into_inner());
        if guard.is_none() {
            *guard = Some(outcome);
            self.slot.ready.notify_all();
        }
    }

    /// Non-blocking view of the outcome.
    pub fn try_get(&self) -> Option<EmbeddingOutcome> {
        self.slot
            .outcome
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.try_get().is_some()
    }

    /// Block until the outcome is available.
    pub fn wait(&self) -> EmbeddingOutcome {
        let mut guard = self.slot.outcome.lock().unwrap_or_else(|p| p.into_inner());
        loop {
            if let Some(outcome) = guard.as_ref() {
                return outcome.clone();
            }
            guard = self
                .slot
                .ready
                .wait(guard)
                .unwrap_or_else(|p| p.into_inner());
        }
    }
}

#[derive(Clone)]
pub struct ReferenceImage {
    pub path: PathBuf,
    pub embedding: EmbeddingHandle,
}

impl ReferenceImage {
    /// Store `path` and start extracting its embedding on a worker thread.
    /// An empty path (cancelled dialog) selects nothing.
    pub fn select(path: impl AsRef<Path>, service: Arc<dyn FaceService>) -> Option<Self> {
        Self::select_with(path, service, || {})
    }

    /// Like [`select`](Self::select), calling `on_ready` once the embedding
    /// outcome is published.
    pub fn select_with<F>(
        path: impl AsRef<Path>,
        service: Arc<dyn FaceService>,
        on_ready: F,
    ) -> Option<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return None;
        }
        tracing::info!("selected thief image: {}", path.display());

        let handle = EmbeddingHandle::pending();
        let worker_handle = handle.clone();
        let worker_path = path.to_path_buf();
        thread::spawn(move || {
            let outcome = extract_embedding(service.as_ref(), &worker_path);
            worker_handle.resolve(outcome);
            on_ready();
        });

        Some(Self {
            path: path.to_path_buf(),
            embedding: handle,
        })
    }
}

fn extract_embedding(service: &dyn FaceService, path: &Path) -> EmbeddingOutcome {
    match service.embed(path) {
        Ok(embedding) => {
            tracing::info!(dims = embedding.values.len(), "thief face representation obtained");
            EmbeddingOutcome::Ready(embedding)
        }
        Err(FaceError::NoFace(_)) => {
            tracing::error!("no face detected in the thief image");
            EmbeddingOutcome::NoFace
        }
        Err(e) => {
            tracing::error!("thief embedding failed: {e}");
            EmbeddingOutcome::Failed(e.to_string())
        }
    }
}
