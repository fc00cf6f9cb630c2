use crate::{BlobVisionError, Result};

/// Analysis capability requested from the image analysis service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VisualFeature {
    Caption,
    DenseCaptions,
    Objects,
    People,
    Read,
    SmartCrops,
    Tags,
}

impl VisualFeature {
    pub const ALL: [VisualFeature; 7] = [
        Self::Caption,
        Self::DenseCaptions,
        Self::Objects,
        Self::People,
        Self::Read,
        Self::SmartCrops,
        Self::Tags,
    ];

    /// Name used in the `features` query parameter.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Caption => "caption",
            Self::DenseCaptions => "denseCaptions",
            Self::Objects => "objects",
            Self::People => "people",
            Self::Read => "read",
            Self::SmartCrops => "smartCrops",
            Self::Tags => "tags",
        }
    }
}

/// Feature selection plus per-request settings for image analysis.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisOptions {
    features: Vec<VisualFeature>,
    /// Language of captions and tags, e.g. `en`.
    pub language: Option<String>,
    pub gender_neutral_caption: bool,
    /// Aspect ratios for smart crop suggestions.
    pub smart_crops_aspect_ratios: Vec<f64>,
    pub model_version: Option<String>,
}

impl AnalysisOptions {
    /// Builds options for `features`; duplicates are dropped.
    pub fn new(features: impl IntoIterator<Item = VisualFeature>) -> Result<Self> {
        let mut features: Vec<VisualFeature> = features.into_iter().collect();
        features.sort();
        features.dedup();
        if features.is_empty() {
            return Err(BlobVisionError::InvalidConfig(
                "at least one visual feature must be selected".to_owned(),
            ));
        }
        Ok(Self {
            features,
            language: None,
            gender_neutral_caption: false,
            smart_crops_aspect_ratios: Vec::new(),
            model_version: None,
        })
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_gender_neutral_caption(mut self, enabled: bool) -> Self {
        self.gender_neutral_caption = enabled;
        self
    }

    pub fn with_smart_crops_aspect_ratios(mut self, ratios: impl Into<Vec<f64>>) -> Self {
        self.smart_crops_aspect_ratios = ratios.into();
        self
    }

    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = Some(version.into());
        self
    }

    pub fn features(&self) -> &[VisualFeature] {
        &self.features
    }

    pub fn contains(&self, feature: VisualFeature) -> bool {
        self.features.contains(&feature)
    }

    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let features = self
            .features
            .iter()
            .map(|feature| feature.wire_name())
            .collect::<Vec<_>>()
            .join(",");

        let mut pairs = vec![("features", features)];
        if let Some(language) = &self.language {
            pairs.push(("language", language.clone()));
        }
        if self.gender_neutral_caption {
            pairs.push(("gender-neutral-caption", "true".to_owned()));
        }
        if !self.smart_crops_aspect_ratios.is_empty() {
            let ratios = self
                .smart_crops_aspect_ratios
                .iter()
                .map(|ratio| ratio.to_string())
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("smartcrops-aspect-ratios", ratios));
        }
        if let Some(version) = &self.model_version {
            pairs.push(("model-version", version.clone()));
        }
        pairs
    }
}

/// Face attribute requested from the face detection service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FaceAttribute {
    HeadPose,
    Glasses,
    Occlusion,
    Accessories,
    Blur,
    Exposure,
    Noise,
    Mask,
    QualityForRecognition,
}

impl FaceAttribute {
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::HeadPose => "headPose",
            Self::Glasses => "glasses",
            Self::Occlusion => "occlusion",
            Self::Accessories => "accessories",
            Self::Blur => "blur",
            Self::Exposure => "exposure",
            Self::Noise => "noise",
            Self::Mask => "mask",
            Self::QualityForRecognition => "qualityForRecognition",
        }
    }
}

/// Settings for one face detection request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectOptions {
    pub detection_model: String,
    pub recognition_model: String,
    pub return_face_id: bool,
    pub return_recognition_model: bool,
    pub face_id_time_to_live_secs: u32,
    /// Sent in [`FaceAttribute`] variant order with duplicates dropped.
    pub attributes: Vec<FaceAttribute>,
}

impl DetectOptions {
    pub fn with_attributes(mut self, attributes: impl IntoIterator<Item = FaceAttribute>) -> Self {
        self.attributes = attributes.into_iter().collect();
        self
    }

    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("detectionModel", self.detection_model.clone()),
            ("recognitionModel", self.recognition_model.clone()),
            ("returnFaceId", self.return_face_id.to_string()),
            ("returnRecognitionModel", self.return_recognition_model.to_string()),
            ("faceIdTimeToLive", self.face_id_time_to_live_secs.to_string()),
        ];
        if !self.attributes.is_empty() {
            let mut attributes = self.attributes.clone();
            attributes.sort();
            attributes.dedup();
            let attributes = attributes
                .iter()
                .map(|attribute| attribute.wire_name())
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("returnFaceAttributes", attributes));
        }
        pairs
    }
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            detection_model: "detection_03".to_owned(),
            recognition_model: "recognition_04".to_owned(),
            return_face_id: false,
            return_recognition_model: false,
            face_id_time_to_live_secs: 86_400,
            attributes: Vec::new(),
        }
    }
}
