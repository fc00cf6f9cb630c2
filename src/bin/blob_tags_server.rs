//! Serves `GET /blob/listBlobsByTag` backed by blob storage.

use blobvision_http::{
    server, telemetry, BlobServiceClient, ClientConfig, Environment, FromEnv, ServerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing(Environment::from_env());

    let blobs = BlobServiceClient::new(ClientConfig::from_env_prefix("BLOB")?)?;
    let config = ServerConfig::from_env()?;

    let app = server::router(blobs, server::default_tag_filter());
    server::serve(app, &config).await?;
    Ok(())
}
