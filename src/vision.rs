use reqwest::{header, Method};

use crate::{AnalysisOptions, ClientConfig, ImageAnalysisResult, Payload, Result, ServiceClient};

/// Image analysis REST API version.
pub const IMAGE_ANALYSIS_API_VERSION: &str = "2024-02-01";

const ANALYZE_PATH: &str = "computervision/imageanalysis:analyze";

/// Client for the image analysis `:analyze` operation.
#[derive(Clone, Debug)]
pub struct ImageAnalysisClient {
    inner: ServiceClient,
}

impl ImageAnalysisClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            inner: ServiceClient::new(config)?,
        })
    }

    /// Analyzes raw image bytes for the features selected in `options`.
    pub async fn analyze(
        &self,
        payload: &Payload,
        options: &AnalysisOptions,
    ) -> Result<ImageAnalysisResult> {
        let url = self.inner.url(ANALYZE_PATH)?;
        let query = options.query_pairs();
        tracing::info!(
            bytes = payload.len(),
            features = ?options.features(),
            "submitting image for analysis"
        );

        self.inner
            .send_json(Method::POST, url, |request| {
                request
                    .query(&[("api-version", IMAGE_ANALYSIS_API_VERSION)])
                    .query(&query)
                    .header(header::CONTENT_TYPE, "application/octet-stream")
                    .body(payload.as_bytes().to_vec())
            })
            .await
    }
}
