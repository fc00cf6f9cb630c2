//! Detects faces in a local image, prints the report and saves the result
//! as JSON.

use std::process::ExitCode;

use blobvision_http::{
    telemetry, CallBridge, CallError, DetectFacesConfig, DetectOptions, Environment,
    FaceAttribute, FaceClient, FromEnv, PayloadSource, Reporter, Result, DEFAULT_CHUNK_SIZE,
};

fn detect_options() -> DetectOptions {
    DetectOptions {
        return_face_id: true,
        return_recognition_model: true,
        face_id_time_to_live_secs: 120,
        ..DetectOptions::default()
    }
    .with_attributes([
        FaceAttribute::HeadPose,
        FaceAttribute::Mask,
        FaceAttribute::Blur,
        FaceAttribute::QualityForRecognition,
    ])
}

fn run() -> Result<bool> {
    let config = DetectFacesConfig::from_env()?;
    let client = FaceClient::new(config.face)?;
    let options = detect_options();
    let bridge = CallBridge::new()?;

    let payload =
        bridge.block_on(PayloadSource::file(config.image_path).load(None, DEFAULT_CHUNK_SIZE))?;

    let outcome = bridge.call(
        async move { client.detect(&payload, &options).await },
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
