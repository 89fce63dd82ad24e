// Remote face detection client. Detection runs on the scan thread, so the
// blocking reqwest client is used rather than the async one.
use photonest_core::{BoundingBox, Detection, Error, FaceDetector, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const DETECT_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// One face in the accelerator's detect response.
#[derive(Debug, Deserialize)]
struct WireFace {
    top: f32,
    left: f32,
    width: f32,
    height: f32,
    embedding: Vec<f32>,
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    faces: Vec<WireFace>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    status: String,
}

/// Client for a remote detection accelerator speaking the detect/health
/// protocol: `GET /` for health, `POST /detect` with the image bytes.
pub struct RemoteDetector {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl RemoteDetector {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(DETECT_TIMEOUT)
            .build()
            .map_err(|e| Error::Detection(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl FaceDetector for RemoteDetector {
    fn detect(&self, path: &Path) -> Result<Vec<Detection>> {
        let bytes = std::fs::read(path)?;
        debug!(url = %self.base_url, image = %path.display(), "sending image to detector");

        let response = self
            .client
            .post(format!("{}/detect", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .map_err(|e| Error::Detection(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::Detection(e.to_string()))?;

        let decoded: DetectResponse = response
            .json()
            .map_err(|e| Error::Detection(e.to_string()))?;

        Ok(decoded
            .faces
            .into_iter()
            .map(|f| Detection {
                bbox: BoundingBox::new(f.top, f.left, f.width, f.height),
                embedding: f.embedding,
                confidence: f.confidence,
            })
            .collect())
    }

    fn is_ready(&self) -> bool {
        let health = self
            .client
            .get(format!("{}/", self.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .and_then(|r| r.json::<HealthResponse>());
        matches!(health, Ok(h) if h.status == "healthy")
    }
}

/// Placeholder detector for deployments without an accelerator: never
/// ready, so scans are refused up front instead of failing per image.
pub struct UnconfiguredDetector;

impl FaceDetector for UnconfiguredDetector {
    fn detect(&self, _path: &Path) -> Result<Vec<Detection>> {
        Err(Error::Detection("no face detector configured".to_string()))
    }

    fn is_ready(&self) -> bool {
        false
    }
}
