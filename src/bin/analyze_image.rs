//! Downloads an image blob in fixed-size chunks, analyzes it, prints the
//! report and saves the full result as JSON.

use std::process::ExitCode;

use blobvision_http::{
    telemetry, AnalysisOptions, AnalyzeImageConfig, BlobServiceClient, CallBridge, CallError,
    Environment, FromEnv, ImageAnalysisClient, PayloadSource, Reporter, Result, VisualFeature,
    DEFAULT_CHUNK_SIZE,
};

fn analysis_options() -> Result<AnalysisOptions> {
    Ok(AnalysisOptions::new(VisualFeature::ALL)?
        .with_language("en")
        .with_gender_neutral_caption(true)
        .with_smart_crops_aspect_ratios(vec![0.9, 1.33])
        .with_model_version("latest"))
}

fn run() -> Result<bool> {
    let config = AnalyzeImageConfig::from_env()?;
    let blobs = BlobServiceClient::new(config.blob)?;
    let vision = ImageAnalysisClient::new(config.vision)?;
    let options = analysis_options()?;
    let bridge = CallBridge::new()?;

    let source = PayloadSource::blob(config.container, config.blob_name);
    let payload = bridge.block_on(source.load(Some(&blobs), DEFAULT_CHUNK_SIZE))?;

    let outcome = bridge.call(
        async move { vision.analyze(&payload, &options).await },
        Some(config.call_timeout),
    );

    let summary = Reporter::new(config.report_path).render(&outcome);
    summary.print();
    Ok(outcome.is_success())
}

fn main() -> ExitCode {
    telemetry::init_tracing(Environment::from_env());
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            println!("Aborted: {}", CallError::from(err));
            ExitCode::FAILURE
        }
    }
}
