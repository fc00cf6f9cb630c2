//! Client construction inputs and environment-driven program configuration.
//!
//! Every service binding reads a prefixed set of variables:
//! - `<PREFIX>_ENDPOINT`: service base URL (required)
//! - `<PREFIX>_KEY` (subscription key) or `<PREFIX>_TOKEN` (bearer token)
//! - `<PREFIX>_MAX_RETRIES`, `<PREFIX>_BASE_DELAY_MS`, `<PREFIX>_MAX_DELAY_MS`
//! - `<PREFIX>_TIMEOUT_MS`: per-attempt request timeout

use std::env;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{self, HeaderValue};
use reqwest::RequestBuilder;

use crate::{BlobVisionError, Result, RetryPolicy};

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 120;

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Already-issued secret attached to every request.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Cognitive services subscription key.
    ApiKey(String),
    /// OAuth access token; `Bearer ` prefix is optional.
    Bearer(String),
}

impl Credential {
    pub fn api_key(key: impl AsRef<str>) -> Self {
        Self::ApiKey(key.as_ref().trim().to_owned())
    }

    pub fn bearer(token: impl AsRef<str>) -> Self {
        Self::Bearer(normalize_bearer_authorization(token.as_ref()))
    }

    /// Fails when the secret cannot travel as an HTTP header value, such as
    /// a key with an embedded newline.
    pub(crate) fn validate(&self) -> Result<()> {
        let (header_name, value) = match self {
            Self::ApiKey(key) => (SUBSCRIPTION_KEY_HEADER, key.as_str()),
            Self::Bearer(authorization) => ("Authorization", authorization.as_str()),
        };
        HeaderValue::from_str(value).map(|_| ()).map_err(|_| {
            BlobVisionError::InvalidConfig(format!(
                "credential is not a valid '{header_name}' header value"
            ))
        })
    }

    pub(crate) fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::ApiKey(key) => request.header(SUBSCRIPTION_KEY_HEADER, key),
            Self::Bearer(authorization) => request.header(header::AUTHORIZATION, authorization),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

/// Everything a [`crate::ServiceClient`] needs; consumed by exactly one client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub endpoint: String,
    pub credential: Credential,
    pub retry_policy: RetryPolicy,
    /// Per-attempt request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>, credential: Credential) -> Self {
        Self {
            endpoint: endpoint.into(),
            credential,
            retry_policy: RetryPolicy::default(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads `<PREFIX>_*` variables, see the module docs.
    pub fn from_env_prefix(prefix: &str) -> Result<Self> {
        let endpoint = env_required(&format!("{prefix}_ENDPOINT"))?;
        let credential = credential_from_env(prefix)?;

        let defaults = RetryPolicy::default();
        let max_retries = env_parse(
            &format!("{prefix}_MAX_RETRIES"),
            defaults.max_retries(),
        )?;
        let base_delay_ms = env_parse(
            &format!("{prefix}_BASE_DELAY_MS"),
            defaults.base_delay().as_millis() as u64,
        )?;
        let max_delay_ms = env_parse(
            &format!("{prefix}_MAX_DELAY_MS"),
            defaults.max_delay().as_millis() as u64,
        )?;
        let timeout_ms = env_parse(&format!("{prefix}_TIMEOUT_MS"), DEFAULT_TIMEOUT_MS)?;

        let policy = RetryPolicy::new(
            max_retries,
            Duration::from_millis(base_delay_ms),
            Duration::from_millis(max_delay_ms),
        )?;

        Ok(Self::new(endpoint, credential)
            .with_retry_policy(policy)
            .with_timeout(Duration::from_millis(timeout_ms)))
    }
}

fn credential_from_env(prefix: &str) -> Result<Credential> {
    if let Some(key) = env_non_empty(&format!("{prefix}_KEY")) {
        return Ok(Credential::api_key(key));
    }
    if let Some(token) = env_non_empty(&format!("{prefix}_TOKEN")) {
        return Ok(Credential::bearer(token));
    }
    Err(BlobVisionError::InvalidConfig(format!(
        "either {prefix}_KEY or {prefix}_TOKEN must be set"
    )))
}

/// Trait for configuration that can be loaded from environment variables.
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self>;
}

/// Returns the variable, or `default` when unset.
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Returns the variable, failing when it is unset or blank.
pub fn env_required(key: &str) -> Result<String> {
    env_non_empty(key).ok_or_else(|| {
        BlobVisionError::InvalidConfig(format!(
            "environment variable '{key}' is required but not set"
        ))
    })
}

/// Trimmed value, or `None` when unset or blank.
fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env_non_empty(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|err| {
            BlobVisionError::InvalidConfig(format!("failed to parse '{key}'='{raw}': {err}"))
        }),
    }
}

/// Deployment environment, selected with `APP_ENV`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        if env_or_default("APP_ENV", "development").eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Inputs of the `analyze-image` program.
#[derive(Clone, Debug)]
pub struct AnalyzeImageConfig {
    pub blob: ClientConfig,
    pub container: String,
    pub blob_name: String,
    pub vision: ClientConfig,
    pub report_path: PathBuf,
    pub call_timeout: Duration,
}

impl FromEnv for AnalyzeImageConfig {
    /// Reads `BLOB_*`, `VISION_*`, `BLOB_CONTAINER` (default `samplefiles`),
    /// `BLOB_NAME`, `REPORT_PATH` (default `vision.json`) and
    /// `CALL_TIMEOUT_SECS`.
    fn from_env() -> Result<Self> {
        Ok(Self {
            blob: ClientConfig::from_env_prefix("BLOB")?,
            container: env_or_default("BLOB_CONTAINER", "samplefiles"),
            blob_name: env_required("BLOB_NAME")?,
            vision: ClientConfig::from_env_prefix("VISION")?,
            report_path: env_or_default("REPORT_PATH", "vision.json").into(),
            call_timeout: call_timeout_from_env()?,
        })
    }
}

/// Inputs of the `detect-faces` program.
#[derive(Clone, Debug)]
pub struct DetectFacesConfig {
    pub face: ClientConfig,
    pub image_path: PathBuf,
    pub report_path: PathBuf,
    pub call_timeout: Duration,
}

impl FromEnv for DetectFacesConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            face: ClientConfig::from_env_prefix("FACE")?,
            image_path: env_required("FACE_IMAGE_PATH")?.into(),
            report_path: env_or_default("REPORT_PATH", "face_detection_results.json").into(),
            call_timeout: call_timeout_from_env()?,
        })
    }
}

fn call_timeout_from_env() -> Result<Duration> {
    env_parse("CALL_TIMEOUT_SECS", DEFAULT_CALL_TIMEOUT_SECS).map(Duration::from_secs)
}

/// Bind address of the tag listing server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED.to_string(),
            port: 8080,
        }
    }
}

impl FromEnv for ServerConfig {
    /// Reads `HOST` (default `0.0.0.0`) and `PORT` (default `8080`).
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: env_or_default("HOST", &defaults.host),
            port: env_parse("PORT", defaults.port)?,
        })
    }
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const VISION_VARS: [&str; 7] = [
        "VISION_ENDPOINT",
        "VISION_KEY",
        "VISION_TOKEN",
        "VISION_MAX_RETRIES",
        "VISION_BASE_DELAY_MS",
        "VISION_MAX_DELAY_MS",
        "VISION_TIMEOUT_MS",
    ];

    fn vision_vars(
        set: &[(&'static str, &'static str)],
    ) -> Vec<(&'static str, Option<&'static str>)> {
        VISION_VARS
            .iter()
            .map(|key| {
                let value = set.iter().find(|(name, _)| name == key).map(|(_, v)| *v);
                (*key, value)
            })
            .collect()
    }

    #[test]
    fn normalize_bearer_adds_prefix_when_missing() {
        assert_eq!(normalize_bearer_authorization("abc123"), "Bearer abc123");
    }

    #[test]
    fn normalize_bearer_keeps_existing_prefix() {
        assert_eq!(
            normalize_bearer_authorization("bEaReR abc123"),
            "bEaReR abc123"
        );
    }

    #[test]
    fn credential_debug_is_redacted() {
        let debug = format!("{:?}", Credential::api_key("secret-key"));
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-key"));
    }

    #[test]
    fn from_env_prefix_uses_defaults() {
        let vars = vision_vars(&[
            ("VISION_ENDPOINT", "https://vision.example"),
            ("VISION_KEY", "k"),
        ]);
        temp_env::with_vars(vars, || {
            let config = ClientConfig::from_env_prefix("VISION").expect("must load");
            assert_eq!(config.endpoint, "https://vision.example");
            assert_eq!(config.credential, Credential::ApiKey("k".to_owned()));
            assert_eq!(config.retry_policy, RetryPolicy::default());
            assert_eq!(config.timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
        });
    }

    #[test]
    fn from_env_prefix_reads_retry_overrides_and_token() {
        let vars = vision_vars(&[
            ("VISION_ENDPOINT", "https://vision.example"),
            ("VISION_TOKEN", "tok"),
            ("VISION_MAX_RETRIES", "5"),
            ("VISION_BASE_DELAY_MS", "100"),
            ("VISION_MAX_DELAY_MS", "800"),
        ]);
        temp_env::with_vars(vars, || {
            let config = ClientConfig::from_env_prefix("VISION").expect("must load");
            assert_eq!(config.credential, Credential::Bearer("Bearer tok".to_owned()));
            assert_eq!(config.retry_policy.max_retries(), 5);
            assert_eq!(config.retry_policy.base_delay(), Duration::from_millis(100));
            assert_eq!(config.retry_policy.max_delay(), Duration::from_millis(800));
        });
    }

    #[test]
    fn from_env_prefix_rejects_invalid_retry_window() {
        let vars = vision_vars(&[
            ("VISION_ENDPOINT", "https://vision.example"),
            ("VISION_KEY", "k"),
            ("VISION_BASE_DELAY_MS", "5000"),
            ("VISION_MAX_DELAY_MS", "10"),
        ]);
        temp_env::with_vars(vars, || {
            let err = ClientConfig::from_env_prefix("VISION").expect_err("must fail");
            assert!(matches!(err, BlobVisionError::InvalidConfig(_)));
        });
    }

    #[test]
    fn from_env_prefix_trims_credentials_and_endpoint() {
        let vars = vision_vars(&[
            ("VISION_ENDPOINT", " https://vision.example\n"),
            ("VISION_KEY", "secret-key\r\n"),
        ]);
        temp_env::with_vars(vars, || {
            let config = ClientConfig::from_env_prefix("VISION").expect("must load");
            assert_eq!(config.endpoint, "https://vision.example");
            assert_eq!(config.credential, Credential::ApiKey("secret-key".to_owned()));
            assert!(config.credential.validate().is_ok());
        });
    }

    #[test]
    fn credential_with_control_characters_is_invalid_config() {
        let err = Credential::ApiKey("bad\nkey".to_owned())
            .validate()
            .expect_err("must fail");
        assert!(matches!(err, BlobVisionError::InvalidConfig(_)));
        assert!(err.to_string().contains("Ocp-Apim-Subscription-Key"));

        let err = Credential::Bearer("Bearer a\u{7f}b".to_owned())
            .validate()
            .expect_err("must fail");
        assert!(err.to_string().contains("Authorization"));
    }

    #[test]
    fn from_env_prefix_requires_a_credential() {
        let vars = vision_vars(&[("VISION_ENDPOINT", "https://vision.example")]);
        temp_env::with_vars(vars, || {
            let err = ClientConfig::from_env_prefix("VISION").expect_err("must fail");
            assert!(err.to_string().contains("VISION_KEY"));
        });
    }

    #[test]
    fn env_required_missing_names_the_variable() {
        temp_env::with_var_unset("MISSING_REQUIRED", || {
            let err = env_required("MISSING_REQUIRED").expect_err("must fail");
            assert!(err.to_string().contains("MISSING_REQUIRED"));
        });
    }

    #[test]
    fn env_parse_reports_bad_numbers() {
        temp_env::with_var("PORT", Some("not_a_number"), || {
            let err = ServerConfig::from_env().expect_err("must fail");
            assert!(err.to_string().contains("PORT"));
        });
    }

    #[test]
    fn server_config_defaults() {
        temp_env::with_vars([("HOST", None::<&str>), ("PORT", None::<&str>)], || {
            let config = ServerConfig::from_env().expect("must load");
            assert_eq!(config.address(), "0.0.0.0:8080");
        });
    }

    #[test]
    fn environment_is_case_insensitive() {
        temp_env::with_var("APP_ENV", Some("PRODUCTION"), || {
            assert!(Environment::from_env().is_production());
        });
        temp_env::with_var("APP_ENV", Some("staging"), || {
            assert_eq!(Environment::from_env(), Environment::Development);
        });
    }
}
