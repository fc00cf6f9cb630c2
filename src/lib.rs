//! `blobvision-http` calls Azure Blob Storage, Image Analysis and Face
//! detection over HTTP with a shared exponential-backoff retry policy.
//!
//! The building blocks, leaves first:
//! - [`RetryPolicy`]: backoff schedule and transient-failure classification
//! - [`ServiceClient`]: endpoint + credential + retry, built from [`ClientConfig`]
//! - [`PayloadSource`]: chunked loading of blob or file bytes into a [`Payload`]
//! - [`CallBridge`]: one async call turned into one blocking [`CallOutcome`]
//! - [`Reporter`]: report lines plus a persisted JSON artifact
//!
//! Service bindings: [`BlobServiceClient`], [`ImageAnalysisClient`],
//! [`FaceClient`], and the [`server`] tag listing endpoint.

mod blob;
mod bridge;
mod client;
mod decode;
mod error;
mod face;
mod options;
mod payload;
mod report;
mod retry;
mod types;
mod vision;
mod wire;

pub mod config;
pub mod server;
pub mod telemetry;

pub use blob::{
    BlobDownload, BlobServiceClient, TagComparison, TagFilter, TagLister, STORAGE_API_VERSION,
};
pub use bridge::{
    completion_gate, CallBridge, CallError, CallOutcome, CallState, CompletionGate,
    CompletionSignal, PendingCall,
};
pub use client::ServiceClient;
pub use config::{
    AnalyzeImageConfig, ClientConfig, Credential, DetectFacesConfig, Environment, FromEnv,
    ServerConfig,
};
pub use error::{BlobVisionError, ErrorKind};
pub use face::FaceClient;
pub use options::{AnalysisOptions, DetectOptions, FaceAttribute, VisualFeature};
pub use payload::{ChunkStream, Payload, PayloadSource, DEFAULT_CHUNK_SIZE};
pub use report::{write_json, Report, ReportSummary, Reporter};
pub use retry::RetryPolicy;
pub use types::{
    Accessory, Blur, BoundingBox, Caption, CropRegion, DenseCaption, DenseCaptions, DetectedFaces,
    DetectedObject, DetectedPerson, Exposure, FaceAttributes, FaceDetectionResult, FaceRectangle,
    HeadPose, ImageAnalysisResult, ImageMetadata, Mask, Noise, Objects, Occlusion, People, Point,
    ReadResult, SmartCrops, Tag, TaggedBlob, Tags, TextBlock, TextLine, TextWord,
};
pub use vision::{ImageAnalysisClient, IMAGE_ANALYSIS_API_VERSION};

pub type Result<T> = std::result::Result<T, BlobVisionError>;
