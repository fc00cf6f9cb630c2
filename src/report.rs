//! Human-readable reports and persisted JSON artifacts for call outcomes.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{
    BlobVisionError, BoundingBox, CallOutcome, DetectedFaces, FaceDetectionResult,
    ImageAnalysisResult, Point, Result,
};

/// A result that can be rendered as report lines.
///
/// Implementations emit one section per populated field and nothing at all
/// for absent fields.
pub trait Report: Serialize {
    fn report_lines(&self) -> Vec<String>;
}

/// What [`Reporter::render`] produced for one outcome.
#[derive(Debug)]
pub struct ReportSummary {
    pub lines: Vec<String>,
    /// Path of the JSON artifact, when one was written.
    pub saved_to: Option<PathBuf>,
    /// Non-fatal failure while writing the JSON artifact.
    pub warning: Option<BlobVisionError>,
}

impl ReportSummary {
    /// Prints lines to stdout and the save status to stdout/stderr.
    pub fn print(&self) {
        for line in &self.lines {
            println!("{line}");
        }
        if let Some(path) = &self.saved_to {
            println!("Results saved to {}", path.display());
        }
        if let Some(warning) = &self.warning {
            eprintln!("Failed to save results as JSON: {warning}");
        }
    }
}

/// Renders outcomes and writes the JSON artifact to a fixed path.
#[derive(Clone, Debug)]
pub struct Reporter {
    json_path: PathBuf,
}

impl Reporter {
    pub fn new(json_path: impl Into<PathBuf>) -> Self {
        Self {
            json_path: json_path.into(),
        }
    }

    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    /// Success: report lines plus a JSON artifact (write failures become a
    /// warning). Failure: exactly one error line and no artifact.
    pub fn render<T: Report>(&self, outcome: &CallOutcome<T>) -> ReportSummary {
        match outcome {
            CallOutcome::Success(result) => {
                let lines = result.report_lines();
                match write_json(result, &self.json_path) {
                    Ok(()) => {
                        tracing::info!(path = %self.json_path.display(), "results saved");
                        ReportSummary {
                            lines,
                            saved_to: Some(self.json_path.clone()),
                            warning: None,
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to save results as JSON");
                        ReportSummary {
                            lines,
                            saved_to: None,
                            warning: Some(err),
                        }
                    }
                }
            }
            CallOutcome::Failure(err) => ReportSummary {
                lines: vec![format!("Call failed: {err}")],
                saved_to: None,
                warning: None,
            },
        }
    }
}

/// Writes `value` as pretty-printed UTF-8 JSON, replacing any existing file.
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)
        .map_err(|err| BlobVisionError::Serialization(err.to_string()))?;
    bytes.push(b'\n');
    fs::write(path, bytes)
        .map_err(|err| BlobVisionError::Serialization(format!("{}: {err}", path.display())))
}

fn confidence(value: f64) -> String {
    format!("{value:.4}")
}

fn polygon(points: &[Point]) -> String {
    let points = points
        .iter()
        .map(Point::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{points}]")
}

fn boxed(bounding_box: &BoundingBox) -> String {
    bounding_box.to_string()
}

impl Report for ImageAnalysisResult {
    fn report_lines(&self) -> Vec<String> {
        let mut lines = vec!["Image analysis results:".to_owned()];

        if let Some(caption) = &self.caption_result {
            lines.push(" Caption:".to_owned());
            lines.push(format!(
                "   \"{}\", Confidence {}",
                caption.text,
                confidence(caption.confidence)
            ));
        }

        if let Some(dense) = &self.dense_captions_result {
            lines.push(" Dense Captions:".to_owned());
            for caption in &dense.values {
                lines.push(format!(
                    "   \"{}\", Bounding box {}, Confidence {}",
                    caption.text,
                    boxed(&caption.bounding_box),
                    confidence(caption.confidence)
                ));
            }
        }

        if let Some(read) = &self.read_result {
            lines.push(" Read:".to_owned());
            for line in read.blocks.iter().flat_map(|block| &block.lines) {
                lines.push(format!(
                    "   Line: '{}', Bounding polygon {}",
                    line.text,
                    polygon(&line.bounding_polygon)
                ));
                for word in &line.words {
                    lines.push(format!(
                        "     Word: '{}', Bounding polygon {}, Confidence {}",
                        word.text,
                        polygon(&word.bounding_polygon),
                        confidence(word.confidence)
                    ));
                }
            }
        }

        if let Some(tags) = &self.tags_result {
            lines.push(" Tags:".to_owned());
            for tag in &tags.values {
                lines.push(format!(
                    "   \"{}\", Confidence {}",
                    tag.name,
                    confidence(tag.confidence)
                ));
            }
        }

        if let Some(objects) = &self.objects_result {
            lines.push(" Objects:".to_owned());
            for object in &objects.values {
                lines.push(match object.tags.first() {
                    Some(tag) => format!(
                        "   \"{}\", Bounding box {}, Confidence {}",
                        tag.name,
                        boxed(&object.bounding_box),
                        confidence(tag.confidence)
                    ),
                    None => format!("   Bounding box {}", boxed(&object.bounding_box)),
                });
            }
        }

        if let Some(people) = &self.people_result {
            lines.push(" People:".to_owned());
            for person in &people.values {
                lines.push(format!(
                    "   Bounding box {}, Confidence {}",
                    boxed(&person.bounding_box),
                    confidence(person.confidence)
                ));
            }
        }

        if let Some(crops) = &self.smart_crops_result {
            lines.push(" Crop Suggestions:".to_owned());
            for crop in &crops.values {
                lines.push(format!(
                    "   Aspect ratio {}: Bounding box {}",
                    crop.aspect_ratio,
                    boxed(&crop.bounding_box)
                ));
            }
        }

        if let Some(metadata) = &self.metadata {
            lines.push(format!(" Image height = {}", metadata.height));
            lines.push(format!(" Image width = {}", metadata.width));
        }

        if let Some(version) = &self.model_version {
            lines.push(format!(" Model version = {version}"));
        }

        lines
    }
}

fn level(name: &str, level: &str, value: f64) -> String {
    format!("   {name}: {level} ({})", confidence(value))
}

fn face_lines(index: usize, face: &FaceDetectionResult, lines: &mut Vec<String>) {
    lines.push(format!(" Face {}:", index + 1));
    if let Some(face_id) = &face.face_id {
        lines.push(format!("   Face id: {face_id}"));
    }
    if let Some(model) = &face.recognition_model {
        lines.push(format!("   Recognition model: {model}"));
    }
    lines.push(format!("   Face rectangle: {}", face.face_rectangle));

    let Some(attributes) = &face.face_attributes else {
        return;
    };
    if let Some(pose) = &attributes.head_pose {
        lines.push(format!(
            "   Head pose: pitch {}, roll {}, yaw {}",
            confidence(pose.pitch),
            confidence(pose.roll),
            confidence(pose.yaw)
        ));
    }
    if let Some(glasses) = &attributes.glasses {
        lines.push(format!("   Glasses: {glasses}"));
    }
    if let Some(occlusion) = &attributes.occlusion {
        lines.push(format!(
            "   Occlusion: forehead {}, eyes {}, mouth {}",
            occlusion.forehead_occluded, occlusion.eye_occluded, occlusion.mouth_occluded
        ));
    }
    if let Some(accessories) = &attributes.accessories {
        let listed = accessories
            .iter()
            .map(|accessory| format!("{} ({})", accessory.kind, confidence(accessory.confidence)))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("   Accessories: [{listed}]"));
    }
    if let Some(blur) = &attributes.blur {
        lines.push(level("Blur", &blur.blur_level, blur.value));
    }
    if let Some(exposure) = &attributes.exposure {
        lines.push(level("Exposure", &exposure.exposure_level, exposure.value));
    }
    if let Some(noise) = &attributes.noise {
        lines.push(level("Noise", &noise.noise_level, noise.value));
    }
    if let Some(mask) = &attributes.mask {
        lines.push(format!(
            "   Mask: {}, nose and mouth covered {}",
            mask.kind, mask.nose_and_mouth_covered
        ));
    }
    if let Some(quality) = &attributes.quality_for_recognition {
        lines.push(format!("   Quality for recognition: {quality}"));
    }
}

impl Report for DetectedFaces {
    fn report_lines(&self) -> Vec<String> {
        let mut lines = vec!["Face detection results:".to_owned()];
        if self.0.is_empty() {
            lines.push(" No faces detected".to_owned());
        }
        for (index, face) in self.0.iter().enumerate() {
            face_lines(index, face, &mut lines);
        }
        lines
    }
}
