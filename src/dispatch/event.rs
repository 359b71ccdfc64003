use serde::{Deserialize, Serialize};

/// Unit convention for depth values reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepthUnit {
    Centimeters,
    Meters,
    /// Relative depth in 0.0..=1.0
    Normalized,
}

impl DepthUnit {
    /// Human-readable depth, e.g. `45cm`, `0.45m`, `0.45`
    pub fn format(&self, value: f64) -> String {
        match self {
            DepthUnit::Centimeters => format!("{:.0}cm", value),
            DepthUnit::Meters => format!("{:.2}m", value),
            DepthUnit::Normalized => format!("{:.2}", value),
        }
    }
}

/// Coarse horizontal placement of a detection in the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalPosition {
    Left,
    Center,
    Right,
}

impl HorizontalPosition {
    /// Thirds of a normalized frame, split at 0.33 and 0.66
    pub fn from_normalized_center(center_x: f64) -> Self {
        if center_x < 0.33 {
            HorizontalPosition::Left
        } else if center_x > 0.66 {
            HorizontalPosition::Right
        } else {
            HorizontalPosition::Center
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HorizontalPosition::Left => "left",
            HorizontalPosition::Center => "center",
            HorizontalPosition::Right => "right",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedObject {
    pub id: u64,
    pub class: String,
    /// Normalized `[x1, y1, x2, y2]`
    pub bbox: [f64; 4],
    pub confidence: f64,
    pub position: HorizontalPosition,
    /// Display label, `class (87%)` with an optional depth suffix
    pub label: Option<String>,
}

impl TrackedObject {
    pub fn center_x(&self) -> f64 {
        (self.bbox[0] + self.bbox[2]) / 2.0
    }
}

/// A decoded result from the inference server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum InboundEvent {
    /// Detection text in the session's target language
    TranslatedText(String),
    /// Untranslated detection text
    Detection(String),
    Depth {
        value: f64,
        unit: DepthUnit,
    },
    BoundingBox {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        label: Option<String>,
    },
    TrackedObjectList(Vec<TrackedObject>),
    /// Base64 JPEG with the server's detections drawn in
    AnnotatedFrame(String),
}

impl InboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::TranslatedText(_) => "translated_text",
            InboundEvent::Detection(_) => "detection",
            InboundEvent::Depth { .. } => "depth",
            InboundEvent::BoundingBox { .. } => "bounding_box",
            InboundEvent::TrackedObjectList(_) => "tracking_results",
            InboundEvent::AnnotatedFrame(_) => "image",
        }
    }

    /// Left or right half of a frame `frame_width` wide, for bounding boxes in pixels
    pub fn position_in(&self, frame_width: f64) -> Option<HorizontalPosition> {
        match self {
            InboundEvent::BoundingBox { x1, x2, .. } => {
                let center_x = (x1 + x2) / 2.0;
                if center_x < frame_width / 2.0 {
                    Some(HorizontalPosition::Left)
                } else {
                    Some(HorizontalPosition::Right)
                }
            }
            _ => None,
        }
    }
}
