use serde::Deserialize;

/// Body of a `?comp=blobs&where=...` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnumerationResults {
    #[serde(default)]
    pub blobs: Blobs,
    #[serde(default)]
    pub next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Blobs {
    #[serde(rename = "Blob", default)]
    pub items: Vec<BlobEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlobEntry {
    pub name: String,
    pub container_name: String,
}

/// Storage error body, e.g. `<Error><Code>BlobNotFound</Code>...</Error>`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StorageError {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Cognitive services error body: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Deserialize)]
pub struct ServiceErrorEnvelope {
    pub error: ServiceErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ServiceErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}
