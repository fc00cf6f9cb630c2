use std::fmt;

use reqwest::{Method, Url};
use serde::de::DeserializeOwned;

use tokio::time::sleep;

use crate::{BlobVisionError, ClientConfig, Result, RetryPolicy};

/// HTTP client bound to one service endpoint, credential and retry policy.
///
/// Construction performs no network I/O. Every request goes through
/// [`ServiceClient::send_with_retry`], so transient failures are absorbed
/// before callers observe anything.
#[derive(Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    endpoint: Url,
    config: ClientConfig,
}

impl fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("credential", &self.config.credential)
            .field("retry_policy", &self.config.retry_policy)
            .field("timeout", &self.config.timeout)
            .finish()
    }
}

impl ServiceClient {
    /// Creates a client, rejecting endpoints that are not absolute http(s) URLs.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let endpoint = parse_endpoint(&config.endpoint)?;
        config.credential.validate()?;
        let http = reqwest::Client::builder()
            .read_timeout(config.timeout)
            .build()
            .map_err(|err| BlobVisionError::InvalidConfig(format!("http client: {err}")))?;
        Ok(Self {
            http,
            endpoint,
            config,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.config.retry_policy
    }

    /// Resolves `path` (no leading slash) against the endpoint.
    pub fn url(&self, path: &str) -> Result<Url> {
        self.endpoint
            .join(path)
            .map_err(|err| BlobVisionError::InvalidConfig(format!("invalid path '{path}': {err}")))
    }

    /// Appends each segment to the endpoint path, percent-encoding `#`, `?`
    /// and every other reserved character.
    pub fn url_from_segments<I>(&self, segments: I) -> Result<Url>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| {
                BlobVisionError::InvalidConfig(format!(
                    "endpoint '{}' cannot be a base",
                    self.endpoint
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends a request built by `build`, retrying transient failures.
    ///
    /// `build` is invoked once per attempt so request bodies can be
    /// recreated. Returns the first successful response.
    pub async fn send_with_retry<F>(
        &self,
        method: Method,
        url: Url,
        build: F,
    ) -> Result<reqwest::Response>
    where
        F: Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder,
    {
        let mut retries = 0u32;
        self.send_attempts(method, url, build, Deadline::WholeRequest, &mut retries)
            .await
    }

    /// Like [`send_with_retry`](Self::send_with_retry), but the timeout only
    /// bounds each individual read so a long body can keep streaming.
    ///
    /// `retries` carries the budget already spent by earlier attempts for
    /// the same transfer and is updated in place.
    pub(crate) async fn send_streaming<F>(
        &self,
        method: Method,
        url: Url,
        build: F,
        retries: &mut u32,
    ) -> Result<reqwest::Response>
    where
        F: Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder,
    {
        self.send_attempts(method, url, build, Deadline::PerRead, retries)
            .await
    }

    async fn send_attempts<F>(
        &self,
        method: Method,
        url: Url,
        build: F,
        deadline: Deadline,
        retries: &mut u32,
    ) -> Result<reqwest::Response>
    where
        F: Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder,
    {
        let policy = self.config.retry_policy;
        loop {
            let request = self.http.request(method.clone(), url.clone());
            let request = match deadline {
                Deadline::WholeRequest => request.timeout(self.config.timeout),
                Deadline::PerRead => request,
            };
            let request = build(self.config.credential.apply(request));

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    if RetryPolicy::is_transient_status(status) && policy.allows_retry(*retries) {
                        *retries += 1;
                        self.wait_before_retry(*retries, &url, status.as_u16().to_string())
                            .await;
                        continue;
                    }

                    let body = response.text().await.map_err(BlobVisionError::Transport)?;
                    return Err(BlobVisionError::Http {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(err) => {
                    if RetryPolicy::is_transient_transport(&err) && policy.allows_retry(*retries) {
                        *retries += 1;
                        self.wait_before_retry(*retries, &url, err.to_string()).await;
                        continue;
                    }
                    return Err(BlobVisionError::Transport(err));
                }
            }
        }
    }

    /// Sends with retry and decodes a JSON response body.
    pub async fn send_json<T, F>(&self, method: Method, url: Url, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder,
    {
        let body = self
            .send_with_retry(method, url, build)
            .await?
            .text()
            .await
            .map_err(BlobVisionError::Transport)?;
        serde_json::from_str::<T>(&body).map_err(|err| {
            BlobVisionError::Decode(format!("invalid response JSON: {err}; body: {body}"))
        })
    }

    pub(crate) async fn wait_before_retry(&self, attempt: u32, url: &Url, cause: String) {
        let delay = self.config.retry_policy.delay_for(attempt);
        tracing::debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            url = %url,
            cause = %cause,
            "retrying request after transient failure"
        );
        sleep(delay).await;
    }
}

/// What the configured timeout bounds for one attempt.
#[derive(Clone, Copy, Debug)]
enum Deadline {
    /// Connect, headers and the full body.
    WholeRequest,
    /// Each read separately, through the client's read timeout.
    PerRead,
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let mut url = Url::parse(trimmed)
        .map_err(|err| {
            BlobVisionError::InvalidConfig(format!("invalid endpoint '{trimmed}': {err}"))
        })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(BlobVisionError::InvalidConfig(format!(
            "endpoint '{trimmed}' must use http or https"
        )));
    }
    // Url::join drops the last segment unless the base ends with '/'.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::{parse_endpoint, ServiceClient};
    use crate::{BlobVisionError, ClientConfig, Credential};

    #[test]
    fn endpoint_gains_trailing_slash() {
        let url = parse_endpoint("https://acct.blob.core.windows.net").expect("valid");
        assert_eq!(url.as_str(), "https://acct.blob.core.windows.net/");

        let url = parse_endpoint("https://host/prefix").expect("valid");
        assert_eq!(url.join("a/b").expect("join").as_str(), "https://host/prefix/a/b");
    }

    #[test]
    fn rejects_non_http_endpoints() {
        let err = parse_endpoint("ftp://host").expect_err("must fail");
        assert!(matches!(err, BlobVisionError::InvalidConfig(_)));
        let err = parse_endpoint("{Your Azure Storage Account}").expect_err("must fail");
        assert!(matches!(err, BlobVisionError::InvalidConfig(_)));
    }

    #[test]
    fn segments_are_percent_encoded() {
        let client = ServiceClient::new(ClientConfig::new(
            "https://acct.blob.core.windows.net/",
            Credential::api_key("key"),
        ))
        .expect("must build");

        let url = client
            .url_from_segments(["samplefiles", "photo#1.jpeg"])
            .expect("valid");
        assert_eq!(url.path(), "/samplefiles/photo%231.jpeg");
        assert_eq!(url.fragment(), None);

        let url = client
            .url_from_segments(["samplefiles", "what?.jpeg"])
            .expect("valid");
        assert_eq!(url.path(), "/samplefiles/what%3F.jpeg");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn segments_extend_an_endpoint_prefix() {
        let client = ServiceClient::new(ClientConfig::new(
            "https://host/prefix",
            Credential::api_key("key"),
        ))
        .expect("must build");
        let url = client
            .url_from_segments(["c", "dir", "b.png"])
            .expect("valid");
        assert_eq!(url.as_str(), "https://host/prefix/c/dir/b.png");
    }

    #[test]
    fn unusable_credential_fails_at_construction() {
        let err = ServiceClient::new(ClientConfig::new(
            "https://vision.example",
            Credential::ApiKey("key\n".to_owned()),
        ))
        .expect_err("must fail");
        assert!(matches!(err, BlobVisionError::InvalidConfig(_)));
    }

    #[test]
    fn debug_redacts_credential() {
        let client = ServiceClient::new(ClientConfig::new(
            "https://vision.example",
            Credential::bearer("secret-token"),
        ))
        .expect("must build");
        let debug = format!("{client:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-token"));
    }
}
