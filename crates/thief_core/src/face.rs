//! Contract with the external face-recognition service.
//!
//! The application never computes embeddings or distances itself; it only
//! asks a [`FaceService`] for them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaceError {
    #[error("no face detected in {0}")]
    NoFace(String),
    #[error("face service error: {0}")]
    Service(String),
    #[error("face service unreachable: {0}")]
    Transport(String),
    #[error("unexpected face service response: {0}")]
    InvalidResponse(String),
    #[error("cannot read image: {0}")]
    Io(#[from] std::io::Error),
}

/// Face embedding vector produced by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Recognition model that produced this embedding.
    pub model: RecognitionModel,
}

/// Region of an image in which the service found a face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f32,
}

/// Outcome of comparing two images.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    /// The service's own verdict under its default threshold.
    pub verified: bool,
    /// Dissimilarity score, lower is more similar.
    pub distance: f32,
}

/// Recognition models understood by DeepFace-compatible services.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecognitionModel {
    #[serde(rename = "VGG-Face")]
    VggFace,
    #[default]
    Facenet,
    Facenet512,
    OpenFace,
    DeepID,
    ArcFace,
    Dlib,
    SFace,
    GhostFaceNet,
}

impl RecognitionModel {
    pub const ALL: [RecognitionModel; 9] = [
        RecognitionModel::VggFace,
        RecognitionModel::Facenet,
        RecognitionModel::Facenet512,
        RecognitionModel::OpenFace,
        RecognitionModel::DeepID,
        RecognitionModel::ArcFace,
        RecognitionModel::Dlib,
        RecognitionModel::SFace,
        RecognitionModel::GhostFaceNet,
    ];

    /// Name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            RecognitionModel::VggFace => "VGG-Face",
            RecognitionModel::Facenet => "Facenet",
            RecognitionModel::Facenet512 => "Facenet512",
            RecognitionModel::OpenFace => "OpenFace",
            RecognitionModel::DeepID => "DeepID",
            RecognitionModel::ArcFace => "ArcFace",
            RecognitionModel::Dlib => "Dlib",
            RecognitionModel::SFace => "SFace",
            RecognitionModel::GhostFaceNet => "GhostFaceNet",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }
}

impl fmt::Display for RecognitionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Face embedding and verification backend.
///
/// Implementations are shared between the UI thread and workers, so they
/// must be `Send + Sync`. Calls block until the service answers.
pub trait FaceService: Send + Sync {
    /// Embedding of the most prominent face, with detection enforcement
    /// disabled. Returns [`FaceError::NoFace`] when nothing was found.
    fn embed(&self, image: &Path) -> Result<Embedding, FaceError>;

    /// All faces the service detects. An image without faces yields an
    /// empty list, not an error.
    fn extract_faces(&self, image: &Path) -> Result<Vec<FaceRegion>, FaceError>;

    /// Compare the faces in two images.
    fn verify(
        &self,
        reference: &Path,
        candidate: &Path,
        model: RecognitionModel,
    ) -> Result<Verification, FaceError>;
}
