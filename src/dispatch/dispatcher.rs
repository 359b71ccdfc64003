use super::event::{DepthUnit, HorizontalPosition, InboundEvent, TrackedObject};
use super::proximity::{ProximityChanged, ProximityState};
use crate::config::ProximityConfig;
use crate::error::ParseError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::trace;

#[derive(Debug, Deserialize)]
struct WireBoundingBox {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireTrackedObject {
    id: u64,
    class: String,
    bbox: [f64; 4],
    confidence: f64,
}

/// Everything decoded from one inbound message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dispatch {
    pub events: Vec<InboundEvent>,
    pub proximity: Option<ProximityChanged>,
    /// Known fields that failed to decode and were treated as absent
    pub field_errors: Vec<ParseError>,
}

impl Dispatch {
    /// No events and no proximity edge; field errors do not count
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.proximity.is_none()
    }
}

/// Decodes inbound JSON into typed events and tracks proximity across messages
#[derive(Debug, Clone)]
pub struct ResultDispatcher {
    proximity: ProximityState,
    unit: DepthUnit,
    annotate_tracked_objects: bool,
    last_depth: Option<f64>,
}

impl ResultDispatcher {
    pub fn new(threshold: f64, unit: DepthUnit, annotate_tracked_objects: bool) -> Self {
        Self {
            proximity: ProximityState::new(threshold),
            unit,
            annotate_tracked_objects,
            last_depth: None,
        }
    }

    pub fn from_config(config: &ProximityConfig) -> Self {
        Self::new(config.threshold, config.unit, config.annotate_tracked_objects)
    }

    pub fn is_object_close(&self) -> bool {
        self.proximity.is_object_close()
    }

    pub fn last_depth(&self) -> Option<f64> {
        self.last_depth
    }

    pub fn unit(&self) -> DepthUnit {
        self.unit
    }

    /// Forget proximity and depth history, e.g. when the stream is restarted by the user
    pub fn reset(&mut self) {
        self.proximity.reset();
        self.last_depth = None;
    }

    /// Parse one inbound payload. Unknown fields are ignored and `null` counts as absent.
    /// A known field with the wrong shape is reported in `field_errors` and skipped, so the
    /// rest of the message still dispatches. Only non-JSON and non-object payloads fail.
    pub fn on_message(&mut self, raw: &[u8]) -> Result<Dispatch, ParseError> {
        let value: Value = serde_json::from_slice(raw).map_err(|e| ParseError::InvalidJson {
            details: e.to_string(),
        })?;
        let Value::Object(fields) = value else {
            return Err(ParseError::NotAnObject);
        };

        let mut dispatch = Dispatch::default();
        let errors = &mut dispatch.field_errors;

        let translated_text: Option<String> = field(&fields, "translated_text", errors);
        let text: Option<String> = field(&fields, "text", errors);
        let depth: Option<f64> = field(&fields, "depth", errors);
        let bounding_box: Option<WireBoundingBox> = field(&fields, "bounding_box", errors);
        let tracking: Option<Vec<WireTrackedObject>> = field(&fields, "tracking_results", errors);
        let image: Option<String> = field(&fields, "image", errors);

        if let Some(text) = translated_text.filter(|t| !t.is_empty()) {
            dispatch.events.push(InboundEvent::TranslatedText(text));
        }

        if let Some(text) = text.filter(|t| !t.is_empty()) {
            dispatch.events.push(InboundEvent::Detection(text));
        }

        if let Some(depth) = depth {
            self.last_depth = Some(depth);
            dispatch.proximity = self.proximity.update(depth);
            dispatch.events.push(InboundEvent::Depth {
                value: depth,
                unit: self.unit,
            });
        }

        if let Some(bbox) = bounding_box {
            dispatch.events.push(InboundEvent::BoundingBox {
                x1: bbox.x1,
                y1: bbox.y1,
                x2: bbox.x2,
                y2: bbox.y2,
                label: bbox.label,
            });
        }

        if let Some(objects) = tracking {
            let objects = objects
                .into_iter()
                .map(|object| self.tracked_object(object))
                .collect();
            dispatch.events.push(InboundEvent::TrackedObjectList(objects));
        }

        if let Some(image) = image.filter(|i| !i.is_empty()) {
            dispatch.events.push(InboundEvent::AnnotatedFrame(image));
        }

        trace!(
            "Dispatched {} events (proximity edge: {})",
            dispatch.events.len(),
            dispatch.proximity.is_some()
        );

        Ok(dispatch)
    }

    fn tracked_object(&self, object: WireTrackedObject) -> TrackedObject {
        let center_x = (object.bbox[0] + object.bbox[2]) / 2.0;
        let mut label = format!(
            "{} ({:.0}%)",
            object.class,
            (object.confidence * 100.0).round()
        );
        if self.annotate_tracked_objects {
            if let Some(depth) = self.last_depth {
                label.push_str(" - ");
                label.push_str(&self.unit.format(depth));
            }
        }

        TrackedObject {
            id: object.id,
            class: object.class,
            bbox: object.bbox,
            confidence: object.confidence,
            position: HorizontalPosition::from_normalized_center(center_x),
            label: Some(label),
        }
    }
}

fn field<T: DeserializeOwned>(
    fields: &Map<String, Value>,
    name: &'static str,
    errors: &mut Vec<ParseError>,
) -> Option<T> {
    let value = match fields.get(name) {
        None | Some(Value::Null) => return None,
        Some(value) => value,
    };

    match serde_json::from_value(value.clone()) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            errors.push(ParseError::InvalidField {
                field: name,
                details: e.to_string(),
            });
            None
        }
    }
}
