//! PPE compliance annotation model.
//!
//! Annotation files are JSON objects keyed by a zero-padded 5-digit
//! annotation frame index. The detector runs at half the video frame rate,
//! so two consecutive video frames share one annotation frame.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;
use crate::types::FrameNumber;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of video frames covered by one annotation frame.
pub const VIDEO_FRAMES_PER_ANNOTATION: u32 = 2;

/// Width of the zero-padded annotation frame key.
pub const ANNOTATION_KEY_WIDTH: usize = 5;

// ---------------------------------------------------------------------------
// File model
// ---------------------------------------------------------------------------

/// A whole annotation document.
pub type AnnotationFile = HashMap<String, AnnotationFrame>;

/// All detections for one annotation frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationFrame {
    #[serde(default)]
    pub objects: Vec<DetectedObject>,
}

/// One tracked person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub id: ObjectId,
    pub bbox: BoundingBox,
    #[serde(default)]
    pub attributes: PpeAttributes,
}

/// Stable tracker id. Files carry it either as a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
            Float(f64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => ObjectId(s),
            Raw::Int(n) => ObjectId(n.to_string()),
            Raw::Float(f) => ObjectId(f.to_string()),
        })
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        ObjectId(s.to_string())
    }
}

/// Box corners in source video pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}

/// Raw PPE state codes as written by the detector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PpeAttributes {
    #[serde(default)]
    pub gown: Option<String>,
    #[serde(default)]
    pub mask: Option<String>,
    #[serde(default)]
    pub eyewear: Option<String>,
    #[serde(default)]
    pub gloves_left: Option<String>,
    #[serde(default)]
    pub gloves_right: Option<String>,
}

// ---------------------------------------------------------------------------
// Compliance classes
// ---------------------------------------------------------------------------

/// A non-compliant PPE state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComplianceClass {
    #[serde(rename = "ga")]
    GownAbsent,
    #[serde(rename = "gi")]
    GownImproper,
    #[serde(rename = "ma")]
    MaskAbsent,
    #[serde(rename = "mi")]
    MaskImproper,
    #[serde(rename = "rc")]
    MaskRemoved,
    #[serde(rename = "ea")]
    EyewearAbsent,
    #[serde(rename = "ha")]
    GlovesAbsent,
}

/// All valid class code strings.
const VALID_CLASS_CODES: &[&str] = &["ga", "gi", "ma", "mi", "rc", "ea", "ha"];

impl ComplianceClass {
    /// Return the class as its two-letter code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::GownAbsent => "ga",
            Self::GownImproper => "gi",
            Self::MaskAbsent => "ma",
            Self::MaskImproper => "mi",
            Self::MaskRemoved => "rc",
            Self::EyewearAbsent => "ea",
            Self::GlovesAbsent => "ha",
        }
    }

    /// Parse a class from its two-letter code.
    pub fn from_code(s: &str) -> Result<Self, CoreError> {
        match s {
            "ga" => Ok(Self::GownAbsent),
            "gi" => Ok(Self::GownImproper),
            "ma" => Ok(Self::MaskAbsent),
            "mi" => Ok(Self::MaskImproper),
            "rc" => Ok(Self::MaskRemoved),
            "ea" => Ok(Self::EyewearAbsent),
            "ha" => Ok(Self::GlovesAbsent),
            _ => Err(CoreError::Validation(format!(
                "Invalid compliance class '{s}'. Must be one of: {}",
                VALID_CLASS_CODES.join(", ")
            ))),
        }
    }

    /// Short human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::GownAbsent => "Gown Absent",
            Self::GownImproper => "Gown Improper",
            Self::MaskAbsent => "Mask Absent",
            Self::MaskImproper => "Mask Improper",
            Self::MaskRemoved => "Mask Removed",
            Self::EyewearAbsent => "Eyewear Absent",
            Self::GlovesAbsent => "Gloves Absent",
        }
    }

    /// Longer explanation shown in the per-person detail panel.
    pub fn description(&self) -> &'static str {
        match self {
            Self::GownAbsent => "Gown Absent - Missing protective gown",
            Self::GownImproper => "Gown Improper - Incorrectly worn protective gown",
            Self::MaskAbsent => "Mask Absent - Missing face mask",
            Self::MaskImproper => "Mask Improper - Incorrectly worn face mask",
            Self::MaskRemoved => "Mask Removed - Face mask has been removed",
            Self::EyewearAbsent => "Eyewear Absent - Missing protective eyewear",
            Self::GlovesAbsent => "Gloves Absent - Missing protective gloves",
        }
    }
}

/// Collect the non-compliant classes for one detection.
///
/// Order is fixed (gown, mask, eyewear, gloves) so the first entry is a
/// stable primary class. Gloves count once when either hand is bare.
pub fn classify(attrs: &PpeAttributes) -> Vec<ComplianceClass> {
    let mut classes = Vec::new();

    match attrs.gown.as_deref() {
        Some("GA") => classes.push(ComplianceClass::GownAbsent),
        Some("GI") => classes.push(ComplianceClass::GownImproper),
        _ => {}
    }
    match attrs.mask.as_deref() {
        Some("MA") => classes.push(ComplianceClass::MaskAbsent),
        Some("MI") => classes.push(ComplianceClass::MaskImproper),
        Some("RC") => classes.push(ComplianceClass::MaskRemoved),
        _ => {}
    }
    if attrs.eyewear.as_deref() == Some("EA") {
        classes.push(ComplianceClass::EyewearAbsent);
    }
    if attrs.gloves_left.as_deref() == Some("HA") || attrs.gloves_right.as_deref() == Some("HA") {
        classes.push(ComplianceClass::GlovesAbsent);
    }

    classes
}

// ---------------------------------------------------------------------------
// Frame mapping
// ---------------------------------------------------------------------------

/// Map a 1-based video frame to its 1-based annotation frame index.
pub fn annotation_frame_index(video_frame: FrameNumber) -> u32 {
    video_frame.saturating_sub(1) / VIDEO_FRAMES_PER_ANNOTATION + 1
}

/// Zero-padded key for an annotation frame index (`3` -> `"00003"`).
pub fn annotation_frame_key(index: u32) -> String {
    format!("{index:0width$}", width = ANNOTATION_KEY_WIDTH)
}

// ---------------------------------------------------------------------------
// Detections
// ---------------------------------------------------------------------------

/// A detection with its compliance classes resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub id: ObjectId,
    /// Source-pixel rectangle: `(x, y, w, h)`.
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    /// First non-compliant class, if any.
    pub primary: Option<ComplianceClass>,
    pub classes: Vec<ComplianceClass>,
}

impl Detection {
    pub fn from_object(obj: &DetectedObject) -> Self {
        let classes = classify(&obj.attributes);
        Self {
            id: obj.id.clone(),
            x: obj.bbox.xmin,
            y: obj.bbox.ymin,
            w: obj.bbox.width(),
            h: obj.bbox.height(),
            primary: classes.first().copied(),
            classes,
        }
    }

    pub fn is_compliant(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.classes.iter().map(ComplianceClass::label).collect()
    }
}

/// Resolve the detections shown on `video_frame`. Missing frames yield an
/// empty list.
pub fn detections_for_video_frame(file: &AnnotationFile, video_frame: FrameNumber) -> Vec<Detection> {
    let key = annotation_frame_key(annotation_frame_index(video_frame));
    file.get(&key)
        .map(|frame| frame.objects.iter().map(Detection::from_object).collect())
        .unwrap_or_default()
}

/// Per-frame compliance counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComplianceSummary {
    pub total: usize,
    pub non_compliant: usize,
    /// Percentage of compliant detections, `None` when nothing was detected.
    pub rate: Option<f64>,
}

pub fn summarize(detections: &[Detection]) -> ComplianceSummary {
    let total = detections.len();
    let non_compliant = detections.iter().filter(|d| !d.is_compliant()).count();
    let rate = (total > 0).then(|| (total - non_compliant) as f64 / total as f64 * 100.0);
    ComplianceSummary {
        total,
        non_compliant,
        rate,
    }
}

/// Parse an annotation document.
pub fn parse_annotation_file(bytes: &[u8]) -> Result<AnnotationFile, CoreError> {
    serde_json::from_slice(bytes)
        .map_err(|e| CoreError::Validation(format!("Malformed annotation file: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
