//! Core of Thief Finder: find the candidate images that contain the face of
//! a reference photo, using an external face-recognition service.

pub mod archive;
pub mod config;
pub mod deepface;
pub mod face;
pub mod gallery;
pub mod matcher;
pub mod progress;
pub mod reference;
pub mod scan;
pub mod session;

pub use archive::{ArchiveOutcome, export_archive};
pub use config::Settings;
pub use deepface::DeepFaceClient;
pub use face::{Embedding, FaceError, FaceRegion, FaceService, RecognitionModel, Verification};
pub use gallery::{Gallery, GalleryEntry, make_thumbnail};
pub use matcher::{
    CancelToken, CandidateError, CandidateErrorKind, DetectionError, DetectionEvent, DetectionJob,
    DetectionReport, MatchDriver, MatchSettings, MatchedImage,
};
pub use progress::Progress;
pub use reference::{EmbeddingHandle, EmbeddingOutcome, ReferenceImage};
pub use scan::{CandidateSet, scan_candidates};
pub use session::Session;
