use reqwest::{header, Method};

use crate::{ClientConfig, DetectOptions, DetectedFaces, Payload, Result, ServiceClient};

const DETECT_PATH: &str = "face/v1.0/detect";

/// Client for the face `detect` operation.
#[derive(Clone, Debug)]
pub struct FaceClient {
    inner: ServiceClient,
}

impl FaceClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            inner: ServiceClient::new(config)?,
        })
    }

    /// Detects faces in raw image bytes.
    pub async fn detect(
        &self,
        payload: &Payload,
        options: &DetectOptions,
    ) -> Result<DetectedFaces> {
        let url = self.inner.url(DETECT_PATH)?;
        let query = options.query_pairs();
        tracing::info!(
            bytes = payload.len(),
            detection_model = %options.detection_model,
            recognition_model = %options.recognition_model,
            "submitting image for face detection"
        );

        self.inner
            .send_json(Method::POST, url, |request| {
                request
                    .query(&query)
                    .header(header::CONTENT_TYPE, "application/octet-stream")
                    .body(payload.as_bytes().to_vec())
            })
            .await
    }
}
