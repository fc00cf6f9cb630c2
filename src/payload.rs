//! Chunked loading of request payloads from blobs or local files.
//!
//! A [`ChunkStream`] owns its file handle or HTTP response, so the source is
//! released on every exit path, early failures included.

use std::fmt;
use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::{BlobDownload, BlobServiceClient, BlobVisionError, Result};

/// Chunk size used by the sample programs.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024;

/// Where payload bytes come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PayloadSource {
    Blob { container: String, blob: String },
    File(PathBuf),
}

impl fmt::Display for PayloadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blob { container, blob } => write!(f, "{container}/{blob}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl PayloadSource {
    pub fn blob(container: impl Into<String>, blob: impl Into<String>) -> Self {
        Self::Blob {
            container: container.into(),
            blob: blob.into(),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Opens the source. Blob sources need `blobs`; file sources ignore it.
    pub async fn open(
        &self,
        blobs: Option<&BlobServiceClient>,
        chunk_size: usize,
    ) -> Result<ChunkStream> {
        if chunk_size == 0 {
            return Err(BlobVisionError::InvalidConfig(
                "chunk size must be greater than zero".to_owned(),
            ));
        }

        let reader = match self {
            Self::File(path) => {
                let file = File::open(path)
                    .await
                    .map_err(|err| BlobVisionError::source_unavailable(self, err))?;
                Reader::File(file)
            }
            Self::Blob { container, blob } => {
                let client = blobs.ok_or_else(|| {
                    BlobVisionError::InvalidConfig(format!(
                        "blob source '{self}' requires a blob service client"
                    ))
                })?;
                let download = client
                    .download(container, blob)
                    .await
                    .map_err(|err| BlobVisionError::source_unavailable(self, err))?;
                Reader::Blob(download)
            }
        };

        tracing::debug!(source = %self, chunk_size, "payload source opened");
        Ok(ChunkStream {
            reader,
            chunk_size,
            pending: Vec::with_capacity(chunk_size),
            exhausted: false,
        })
    }

    /// Opens the source and concatenates every chunk.
    pub async fn load(
        &self,
        blobs: Option<&BlobServiceClient>,
        chunk_size: usize,
    ) -> Result<Payload> {
        self.open(blobs, chunk_size).await?.collect().await
    }
}

enum Reader {
    File(File),
    Blob(BlobDownload),
}

impl Reader {
    /// Reads whatever is available next; an empty vector means end of input.
    async fn read_some(&mut self, hint: usize) -> Result<Vec<u8>> {
        match self {
            Self::File(file) => {
                let mut buf = vec![0u8; hint];
                let read = file
                    .read(&mut buf)
                    .await
                    .map_err(|err| BlobVisionError::Read(err.to_string()))?;
                buf.truncate(read);
                Ok(buf)
            }
            Self::Blob(download) => Ok(download.next_bytes().await?.unwrap_or_default()),
        }
    }
}

/// Lazy, finite sequence of fixed-size chunks; the last may be shorter.
///
/// Not restartable: once consumed, reopen the [`PayloadSource`].
pub struct ChunkStream {
    reader: Reader,
    chunk_size: usize,
    pending: Vec<u8>,
    exhausted: bool,
}

impl fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkStream")
            .field("chunk_size", &self.chunk_size)
            .field("pending", &self.pending.len())
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

impl ChunkStream {
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Next chunk, or `None` at end of input.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        while self.pending.len() < self.chunk_size && !self.exhausted {
            let bytes = self.reader.read_some(self.chunk_size).await?;
            if bytes.is_empty() {
                self.exhausted = true;
            } else {
                self.pending.extend_from_slice(&bytes);
            }
        }

        if self.pending.is_empty() {
            return Ok(None);
        }

        let take = self.pending.len().min(self.chunk_size);
        let rest = self.pending.split_off(take);
        Ok(Some(std::mem::replace(&mut self.pending, rest)))
    }

    /// Drains the stream into one contiguous buffer.
    pub async fn collect(mut self) -> Result<Payload> {
        let mut bytes = Vec::new();
        let mut chunks = 0usize;
        while let Some(chunk) = self.next_chunk().await? {
            bytes.extend_from_slice(&chunk);
            chunks += 1;
        }
        tracing::debug!(chunks, len = bytes.len(), "payload assembled");
        Ok(Payload(bytes))
    }
}

/// Owned request body assembled from a [`ChunkStream`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({} bytes)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{PayloadSource, DEFAULT_CHUNK_SIZE};
    use crate::{BlobVisionError, ErrorKind};

    fn temp_file_with(len: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("must create temp file");
        let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        file.write_all(&bytes).expect("must write");
        file.flush().expect("must flush");
        file
    }

    #[tokio::test]
    async fn ten_thousand_bytes_yield_three_chunks() {
        let file = temp_file_with(10_000);
        let source = PayloadSource::file(file.path());
        let mut stream = source
            .open(None, DEFAULT_CHUNK_SIZE)
            .await
            .expect("must open");

        let mut sizes = Vec::new();
        let mut all = Vec::new();
        while let Some(chunk) = stream.next_chunk().await.expect("must read") {
            sizes.push(chunk.len());
            all.extend(chunk);
        }

        assert_eq!(sizes, vec![4096, 4096, 1808]);
        assert_eq!(all.len(), 10_000);
        assert_eq!(all[9_999], (9_999 % 251) as u8);
        assert!(stream.next_chunk().await.expect("must read").is_none());
    }

    #[tokio::test]
    async fn load_concatenates_chunks() {
        let file = temp_file_with(10_000);
        let payload = PayloadSource::file(file.path())
            .load(None, 4096)
            .await
            .expect("must load");
        assert_eq!(payload.len(), 10_000);
        assert_eq!(payload.as_bytes()[4096], (4096 % 251) as u8);
    }

    #[tokio::test]
    async fn exact_multiple_has_no_trailing_empty_chunk() {
        let file = temp_file_with(8192);
        let mut stream = PayloadSource::file(file.path())
            .open(None, 4096)
            .await
            .expect("must open");
        let mut count = 0;
        while let Some(chunk) = stream.next_chunk().await.expect("must read") {
            assert_eq!(chunk.len(), 4096);
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn empty_file_yields_empty_payload() {
        let file = temp_file_with(0);
        let payload = PayloadSource::file(file.path())
            .load(None, 4096)
            .await
            .expect("must load");
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_source_unavailable() {
        let dir = tempfile::tempdir().expect("must create dir");
        let err = PayloadSource::file(dir.path().join("nope.jpg"))
            .load(None, 4096)
            .await
            .expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
        assert!(err.to_string().contains("nope.jpg"));
    }

    #[tokio::test]
    async fn zero_chunk_size_is_invalid() {
        let file = temp_file_with(10);
        let err = PayloadSource::file(file.path())
            .open(None, 0)
            .await
            .expect_err("must fail");
        assert!(matches!(err, BlobVisionError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn blob_source_without_client_is_invalid() {
        let err = PayloadSource::blob("samplefiles", "a.jpeg")
            .open(None, 4096)
            .await
            .expect_err("must fail");
        assert!(matches!(err, BlobVisionError::InvalidConfig(_)));
    }
}
