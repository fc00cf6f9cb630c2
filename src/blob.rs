use std::fmt;
use std::future::Future;

use reqwest::header::RANGE;
use reqwest::{Method, StatusCode, Url};

use crate::{
    decode::decode_listing_page, BlobVisionError, ClientConfig, Result, ServiceClient, TaggedBlob,
};

/// Storage REST API version sent with every request.
pub const STORAGE_API_VERSION: &str = "2021-08-06";

const VERSION_HEADER: &str = "x-ms-version";

/// Comparison operators accepted in blob tag filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagComparison {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl TagComparison {
    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Single-clause tag filter, rendered as `"name"<op>'value'`.
///
/// Values compare as plain strings on the service side; date-like values
/// only order correctly when they share a fixed-width format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagFilter {
    pub name: String,
    pub comparison: TagComparison,
    pub value: String,
}

impl TagFilter {
    pub fn new(
        name: impl Into<String>,
        comparison: TagComparison,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            comparison,
            value: value.into(),
        }
    }

    pub fn less_or_equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, TagComparison::Le, value)
    }

    /// Whether a tag value satisfies this filter, using the same string
    /// ordering as the service.
    pub fn matches(&self, value: &str) -> bool {
        let value = value.as_bytes();
        let bound = self.value.as_bytes();
        match self.comparison {
            TagComparison::Eq => value == bound,
            TagComparison::Lt => value < bound,
            TagComparison::Le => value <= bound,
            TagComparison::Gt => value > bound,
            TagComparison::Ge => value >= bound,
        }
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\"{}'{}'",
            self.name,
            self.comparison.symbol(),
            self.value
        )
    }
}

/// Source of find-by-tags listings; lets the listing endpoint run against
/// any backend.
pub trait TagLister: Clone + Send + Sync + 'static {
    fn list_by_tags(
        &self,
        filter: &TagFilter,
    ) -> impl Future<Output = Result<Vec<TaggedBlob>>> + Send;
}

/// Blob storage account client.
#[derive(Clone, Debug)]
pub struct BlobServiceClient {
    inner: ServiceClient,
}

impl BlobServiceClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            inner: ServiceClient::new(config)?,
        })
    }

    /// Starts downloading a blob; the body is left unread for chunked reads.
    ///
    /// `blob` may contain `/`-separated virtual directories. Every segment
    /// is percent-encoded, so names with `#` or `?` address the right blob.
    pub async fn download(&self, container: &str, blob: &str) -> Result<BlobDownload> {
        if container.trim().is_empty() || blob.trim().is_empty() {
            return Err(BlobVisionError::InvalidConfig(
                "container and blob name must not be empty".to_owned(),
            ));
        }
        let url = self
            .inner
            .url_from_segments(std::iter::once(container).chain(blob.split('/')))?;
        tracing::info!(container, blob, "downloading blob");

        let mut retries = 0u32;
        let response = self
            .inner
            .send_streaming(
                Method::GET,
                url.clone(),
                |request| request.header(VERSION_HEADER, STORAGE_API_VERSION),
                &mut retries,
            )
            .await?;

        Ok(BlobDownload {
            client: self.inner.clone(),
            url,
            response,
            received: 0,
            skip: 0,
            retries,
        })
    }

    /// Lists every blob in the account matching `filter`, following
    /// continuation markers until the last page.
    pub async fn find_blobs_by_tags(&self, filter: &TagFilter) -> Result<Vec<TaggedBlob>> {
        let expression = filter.to_string();
        let url = self.inner.url("")?;
        let mut blobs = Vec::new();
        let mut marker: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let body = self
                .inner
                .send_with_retry(Method::GET, url.clone(), |request| {
                    let request = request
                        .header(VERSION_HEADER, STORAGE_API_VERSION)
                        .query(&[("comp", "blobs"), ("where", expression.as_str())]);
                    match &marker {
                        Some(marker) => request.query(&[("marker", marker.as_str())]),
                        None => request,
                    }
                })
                .await?
                .text()
                .await
                .map_err(BlobVisionError::Transport)?;

            let page = decode_listing_page(&body)?;
            pages += 1;
            for blob in &page.blobs {
                tracing::info!(
                    container = %blob.container,
                    blob = %blob.blob,
                    "blob matched tag filter"
                );
            }
            blobs.extend(page.blobs);

            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        tracing::debug!(filter = %expression, pages, matched = blobs.len(), "tag listing finished");
        Ok(blobs)
    }
}

impl TagLister for BlobServiceClient {
    async fn list_by_tags(&self, filter: &TagFilter) -> Result<Vec<TaggedBlob>> {
        self.find_blobs_by_tags(filter).await
    }
}

/// Body of one blob download.
///
/// A broken stream is resumed with a `Range` request from the first byte
/// not yet delivered. Resumes share the retry budget of the initial request;
/// once it is spent the failure surfaces as a read error.
pub struct BlobDownload {
    client: ServiceClient,
    url: Url,
    response: reqwest::Response,
    received: u64,
    /// Bytes to discard when the service ignored the range and restarted.
    skip: u64,
    retries: u32,
}

impl fmt::Debug for BlobDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobDownload")
            .field("url", &self.url.as_str())
            .field("received", &self.received)
            .field("retries", &self.retries)
            .finish()
    }
}

impl BlobDownload {
    /// Bytes delivered so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Next piece of the body, or `None` once the blob is complete.
    pub async fn next_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            match self.response.chunk().await {
                Ok(Some(bytes)) => {
                    let pending_skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
                    let skipped = bytes.len().min(pending_skip);
                    self.skip -= skipped as u64;
                    let bytes = &bytes[skipped..];
                    if bytes.is_empty() {
                        continue;
                    }
                    self.received += bytes.len() as u64;
                    return Ok(Some(bytes.to_vec()));
                }
                Ok(None) => return Ok(None),
                Err(err) => self.resume(err).await?,
            }
        }
    }

    async fn resume(&mut self, cause: reqwest::Error) -> Result<()> {
        let policy = self.client.retry_policy();
        if !policy.allows_retry(self.retries) {
            return Err(BlobVisionError::Read(format!(
                "blob stream failed after {} bytes and {} retries: {cause}",
                self.received, self.retries
            )));
        }
        self.retries += 1;
        tracing::warn!(
            received = self.received,
            attempt = self.retries,
            error = %cause,
            "blob stream interrupted, resuming"
        );
        self.client
            .wait_before_retry(self.retries, &self.url, cause.to_string())
            .await;

        let range = format!("bytes={}-", self.received);
        let response = self
            .client
            .send_streaming(
                Method::GET,
                self.url.clone(),
                |request| {
                    request
                        .header(VERSION_HEADER, STORAGE_API_VERSION)
                        .header(RANGE, range.as_str())
                },
                &mut self.retries,
            )
            .await
            .map_err(|err| {
                BlobVisionError::Read(format!(
                    "resuming blob stream at byte {}: {err}",
                    self.received
                ))
            })?;

        self.skip = if response.status() == StatusCode::PARTIAL_CONTENT {
            0
        } else {
            self.received
        };
        self.response = response;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{TagComparison, TagFilter};

    #[test]
    fn renders_less_or_equal_filter() {
        let filter = TagFilter::less_or_equal("customModifiedDate", "2025-01-05");
        assert_eq!(filter.to_string(), "\"customModifiedDate\"<='2025-01-05'");
    }

    #[test]
    fn renders_every_operator() {
        let cases = [
            (TagComparison::Eq, "\"k\"='v'"),
            (TagComparison::Lt, "\"k\"<'v'"),
            (TagComparison::Gt, "\"k\">'v'"),
            (TagComparison::Ge, "\"k\">='v'"),
        ];
        for (comparison, expected) in cases {
            assert_eq!(TagFilter::new("k", comparison, "v").to_string(), expected);
        }
    }

    #[test]
    fn matching_is_literal_string_ordering() {
        let filter = TagFilter::less_or_equal("customModifiedDate", "2025-01-05");
        assert!(filter.matches("2025-01-05"));
        assert!(filter.matches("2024-12-31"));
        assert!(!filter.matches("2025-01-06"));
        // Not calendar aware: an unpadded month sorts after "0".
        assert!(!filter.matches("2025-1-01"));
    }
}
