//! Blocking client for a DeepFace-compatible REST service.

use crate::config::Settings;
use crate::face::{Embedding, FaceError, FaceRegion, FaceService, RecognitionModel, Verification};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use std::time::Duration;

const NO_FACE_MARKER: &str = "Face could not be detected";

/// [`FaceService`] backed by the DeepFace HTTP API (`/represent`, `/verify`).
pub struct DeepFaceClient {
    http: Client,
    base_url: String,
    model: RecognitionModel,
    detector_backend: String,
}

#[derive(Debug, Deserialize)]
struct RepresentResponse {
    results: Vec<RepresentResult>,
}

#[derive(Debug, Deserialize)]
struct RepresentResult {
    embedding: Vec<f32>,
    #[serde(default)]
    facial_area: Option<FacialArea>,
    #[serde(default)]
    face_confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct FacialArea {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    verified: bool,
    distance: f32,
}

impl DeepFaceClient {
    pub fn new(settings: &Settings) -> Result<Self, FaceError> {
        let timeout = match settings.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FaceError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: settings.service_url.trim_end_matches('/').to_string(),
            model: settings.model,
            detector_backend: settings.detector_backend.clone(),
        })
    }

    fn post(&self, route: &str, body: Value) -> Result<Value, FaceError> {
        let url = format!("{}/{route}", self.base_url);
        tracing::debug!(%url, "face service request");
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| FaceError::Transport(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| FaceError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(FaceError::Service(error_message(&text, status.as_u16())));
        }
        serde_json::from_str(&text).map_err(|e| FaceError::InvalidResponse(format!("{e}: {text}")))
    }

    fn represent(
        &self,
        image: &Path,
        enforce_detection: bool,
    ) -> Result<Vec<RepresentResult>, FaceError> {
        let body = json!({
            "img": image_data_uri(image)?,
            "model_name": self.model.as_str(),
            "detector_backend": self.detector_backend,
            "enforce_detection": enforce_detection,
        });
        parse_represent(self.post("represent", body)?)
    }
}

impl FaceService for DeepFaceClient {
    fn embed(&self, image: &Path) -> Result<Embedding, FaceError> {
        let results = self.represent(image, false)?;
        // Without enforced detection the service embeds the whole frame and
        // reports it with zero confidence.
        let first = results
            .into_iter()
            .next()
            .filter(|r| r.face_confidence != Some(0.0))
            .ok_or_else(|| FaceError::NoFace(image.display().to_string()))?;
        Ok(Embedding {
            values: first.embedding,
            model: self.model,
        })
    }

    fn extract_faces(&self, image: &Path) -> Result<Vec<FaceRegion>, FaceError> {
        match self.represent(image, true) {
            Ok(results) => Ok(results.iter().map(face_region).collect()),
            Err(FaceError::Service(msg)) if msg.contains(NO_FACE_MARKER) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn verify(
        &self,
        reference: &Path,
        candidate: &Path,
        model: RecognitionModel,
    ) -> Result<Verification, FaceError> {
        let body = json!({
            "img1": image_data_uri(reference)?,
            "img2": image_data_uri(candidate)?,
            "model_name": model.as_str(),
            "detector_backend": self.detector_backend,
            "enforce_detection": false,
        });
        let resp: VerifyResponse = serde_json::from_value(self.post("verify", body)?)
            .map_err(|e| FaceError::InvalidResponse(e.to_string()))?;
        Ok(Verification {
            verified: resp.verified,
            distance: resp.distance,
        })
    }
}

fn parse_represent(value: Value) -> Result<Vec<RepresentResult>, FaceError> {
    let resp: RepresentResponse =
        serde_json::from_value(value).map_err(|e| FaceError::InvalidResponse(e.to_string()))?;
    Ok(resp.results)
}

fn face_region(result: &RepresentResult) -> FaceRegion {
    let area = result.facial_area.as_ref();
    FaceRegion {
        x: area.map_or(0, |a| a.x),
        y: area.map_or(0, |a| a.y),
        width: area.map_or(0, |a| a.w),
        height: area.map_or(0, |a| a.h),
        confidence: result.face_confidence.unwrap_or(0.0),
    }
}

/// `error` field of a JSON error body, else the status and raw body.
fn error_message(body: &str, status: u16) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {status}: {}", body.trim()))
}

/// Inline an image file as a `data:` URI so the service need not share our filesystem.
fn image_data_uri(path: &Path) -> Result<String, FaceError> {
    let bytes = fs::read(path)?;
    let mime = match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "png",
        _ => "jpeg",
    };
    Ok(format!("data:image/{mime};base64,{}", STANDARD.encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::path::PathBuf;
    use std::thread;
    use tempfile::{TempDir, tempdir};

    /// Answers one request with `status` and `body`; joins to the JSON body
    /// the client sent.
    fn serve_once(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<Value>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request_body(&mut stream);
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            serde_json::from_slice(&request).unwrap_or(Value::Null)
        });
        (url, handle)
    }

    fn read_request_body(stream: &mut TcpStream) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                return Vec::new();
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let start = end + 4;
            if buf.len() >= start + len {
                return buf[start..start + len].to_vec();
            }
        }
    }

    fn client_for(url: String) -> DeepFaceClient {
        DeepFaceClient::new(&Settings {
            service_url: url,
            request_timeout_secs: 10,
            ..Settings::default()
        })
        .unwrap()
    }

    fn sample_image(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, b"abc").unwrap();
        path
    }

    #[test]
    fn parse_represent_reads_embeddings_and_areas() {
        let value = json!({
            "results": [
                {
                    "embedding": [0.25, -0.5, 1.0],
                    "facial_area": { "x": 10, "y": 20, "w": 30, "h": 40, "left_eye": null },
                    "face_confidence": 0.93
                },
                { "embedding": [0.0, 0.0, 0.0] }
            ]
        });
        let results = parse_represent(value).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].embedding, vec![0.25, -0.5, 1.0]);

        let region = face_region(&results[0]);
        assert_eq!((region.x, region.y, region.width, region.height), (10, 20, 30, 40));
        assert_relative_eq!(region.confidence, 0.93);

        let bare = face_region(&results[1]);
        assert_eq!(bare.width, 0);
        assert_relative_eq!(bare.confidence, 0.0);
    }

    #[test]
    fn parse_represent_rejects_malformed_body() {
        let err = parse_represent(json!({ "embedding": [1.0] })).unwrap_err();
        assert!(matches!(err, FaceError::InvalidResponse(_)));
    }

    #[test]
    fn verify_response_ignores_extra_fields() {
        let resp: VerifyResponse = serde_json::from_value(json!({
            "verified": true,
            "distance": 0.0042,
            "threshold": 0.4,
            "model": "Facenet",
            "similarity_metric": "cosine"
        }))
        .unwrap();
        assert!(resp.verified);
        assert_relative_eq!(resp.distance, 0.0042);
    }

    #[test]
    fn error_message_prefers_error_field() {
        let body = r#"{"error": "Exception while representing: Face could not be detected"}"#;
        assert!(error_message(body, 400).contains(NO_FACE_MARKER));
        assert_eq!(error_message(r#"{"x":1}"#, 500), r#"HTTP 500: {"x":1}"#);
        assert_eq!(
            error_message("<html>Bad Gateway</html>\n", 502),
            "HTTP 502: <html>Bad Gateway</html>"
        );
    }

    #[test]
    fn data_uri_uses_extension_for_mime() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let png = dir.path().join("a.png");
        let jpg = dir.path().join("b.jpg");
        fs::write(&png, b"abc")?;
        fs::write(&jpg, b"abc")?;
        assert_eq!(image_data_uri(&png)?, "data:image/png;base64,YWJj");
        assert_eq!(image_data_uri(&jpg)?, "data:image/jpeg;base64,YWJj");
        Ok(())
    }

    #[test]
    fn data_uri_reports_missing_file() {
        let dir = tempdir().unwrap();
        let err = image_data_uri(&dir.path().join("missing.png")).unwrap_err();
        assert!(matches!(err, FaceError::Io(_)));
    }

    #[test]
    fn client_strips_trailing_slash() {
        let settings = Settings {
            service_url: "http://localhost:5005/".into(),
            ..Settings::default()
        };
        let client = DeepFaceClient::new(&settings).unwrap();
        assert_eq!(client.base_url, "http://localhost:5005");
    }

    #[test]
    fn non_json_error_page_is_a_service_error() {
        let dir = tempdir().unwrap();
        let (url, server) = serve_once("502 Bad Gateway", "<html>Bad Gateway</html>");
        let err = client_for(url)
            .extract_faces(&sample_image(&dir, "a.png"))
            .unwrap_err();
        server.join().unwrap();
        match err {
            FaceError::Service(msg) => assert_eq!(msg, "HTTP 502: <html>Bad Gateway</html>"),
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[test]
    fn undetected_face_gives_empty_face_list() {
        let dir = tempdir().unwrap();
        let (url, server) = serve_once(
            "400 Bad Request",
            r#"{"error": "Exception while representing: Face could not be detected in numpy array."}"#,
        );
        let faces = client_for(url)
            .extract_faces(&sample_image(&dir, "a.jpg"))
            .unwrap();
        let request = server.join().unwrap();
        assert!(faces.is_empty());
        assert_eq!(request["enforce_detection"], json!(true));
        assert_eq!(request["detector_backend"], json!("opencv"));
    }

    #[test]
    fn other_service_errors_pass_through_extraction() {
        let dir = tempdir().unwrap();
        let (url, server) = serve_once("500 Internal Server Error", r#"{"error": "model not loaded"}"#);
        let err = client_for(url)
            .extract_faces(&sample_image(&dir, "a.jpg"))
            .unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, FaceError::Service(msg) if msg == "model not loaded"));
    }

    #[test]
    fn embed_without_results_is_no_face() {
        let dir = tempdir().unwrap();
        let (url, server) = serve_once("200 OK", r#"{"results": []}"#);
        let err = client_for(url).embed(&sample_image(&dir, "thief.png")).unwrap_err();
        let request = server.join().unwrap();
        assert!(matches!(err, FaceError::NoFace(_)));
        assert_eq!(request["enforce_detection"], json!(false));
        assert_eq!(request["model_name"], json!("Facenet"));
    }

    #[test]
    fn embed_of_whole_frame_fallback_is_no_face() {
        let dir = tempdir().unwrap();
        let (url, server) = serve_once(
            "200 OK",
            r#"{"results": [{"embedding": [0.1, 0.2], "facial_area": {"x": 0, "y": 0, "w": 640, "h": 480}, "face_confidence": 0}]}"#,
        );
        let err = client_for(url).embed(&sample_image(&dir, "thief.png")).unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, FaceError::NoFace(_)));
    }

    #[test]
    fn embed_returns_first_detected_face() {
        let dir = tempdir().unwrap();
        let (url, server) = serve_once(
            "200 OK",
            r#"{"results": [{"embedding": [0.1, 0.2], "face_confidence": 0.97}, {"embedding": [0.9, 0.9], "face_confidence": 0.5}]}"#,
        );
        let embedding = client_for(url).embed(&sample_image(&dir, "thief.png")).unwrap();
        server.join().unwrap();
        assert_eq!(embedding.values, vec![0.1, 0.2]);
        assert_eq!(embedding.model, RecognitionModel::Facenet);
    }

    #[test]
    fn verify_sends_model_and_lenient_detection() {
        let dir = tempdir().unwrap();
        let (url, server) = serve_once(
            "200 OK",
            r#"{"verified": false, "distance": 0.0031, "threshold": 0.68, "model": "ArcFace"}"#,
        );
        let reference = sample_image(&dir, "thief.png");
        let candidate = sample_image(&dir, "crowd.jpg");
        let verdict = client_for(url)
            .verify(&reference, &candidate, RecognitionModel::ArcFace)
            .unwrap();
        let request = server.join().unwrap();

        assert!(!verdict.verified);
        assert_relative_eq!(verdict.distance, 0.0031);
        assert_eq!(request["model_name"], json!("ArcFace"));
        assert_eq!(request["enforce_detection"], json!(false));
        assert_eq!(request["img1"], json!("data:image/png;base64,YWJj"));
        assert_eq!(request["img2"], json!("data:image/jpeg;base64,YWJj"));
    }

    #[test]
    fn unreachable_service_is_a_transport_error() {
        let dir = tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let err = client_for(url)
            .extract_faces(&sample_image(&dir, "a.png"))
            .unwrap_err();
        assert!(matches!(err, FaceError::Transport(_)));
    }
}
