use super::*;
use crate::error::ParseError;

fn dispatcher(threshold: f64) -> ResultDispatcher {
    ResultDispatcher::new(threshold, DepthUnit::Centimeters, true)
}

#[test]
fn test_translated_text_with_close_depth() {
    let mut dispatcher = ResultDispatcher::new(0.1, DepthUnit::Normalized, true);
    let dispatch = dispatcher
        .on_message(br#"{"translated_text":"Chair ahead","depth":0.08}"#)
        .unwrap();

    assert_eq!(
        dispatch.events[0],
        InboundEvent::TranslatedText("Chair ahead".to_string())
    );
    assert_eq!(
        dispatch.events[1],
        InboundEvent::Depth {
            value: 0.08,
            unit: DepthUnit::Normalized
        }
    );
    assert_eq!(
        dispatch.proximity,
        Some(ProximityChanged {
            close: true,
            depth: 0.08
        })
    );
    assert!(dispatcher.is_object_close());
}

#[test]
fn test_server_reply_shape() {
    let mut dispatcher = dispatcher(75.0);
    let raw = br#"{
        "text": "chair, person | Distance: 120cm",
        "translated_text": "chair, person | Distance: 120cm",
        "image": "/9j/AA==",
        "language": "en",
        "depth": 120.0
    }"#;

    let dispatch = dispatcher.on_message(raw).unwrap();
    let kinds: Vec<&str> = dispatch.events.iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec!["translated_text", "detection", "depth", "image"]);
    assert!(dispatch.proximity.is_none());
}

#[test]
fn test_null_and_unknown_fields_are_absent() {
    let mut dispatcher = dispatcher(10.0);
    let dispatch = dispatcher
        .on_message(br#"{"depth":null,"translated_text":"","future_field":{"a":1}}"#)
        .unwrap();
    assert!(dispatch.is_empty());
    assert_eq!(dispatcher.last_depth(), None);
}

#[test]
fn test_malformed_payloads() {
    let mut dispatcher = dispatcher(10.0);

    assert!(matches!(
        dispatcher.on_message(b"not json"),
        Err(ParseError::InvalidJson { .. })
    ));
    assert_eq!(
        dispatcher.on_message(b"[1,2,3]").unwrap_err(),
        ParseError::NotAnObject
    );

    // A wrongly shaped known field is skipped, not fatal
    let dispatch = dispatcher.on_message(br#"{"depth":"near"}"#).unwrap();
    assert!(dispatch.is_empty());
    assert!(matches!(
        dispatch.field_errors.as_slice(),
        [ParseError::InvalidField { field: "depth", .. }]
    ));

    // A bad message leaves proximity state untouched
    assert!(dispatcher.on_message(br#"{"depth":3}"#).unwrap().proximity.is_some());
    assert!(dispatcher.on_message(b"{").is_err());
    assert!(dispatcher.is_object_close());
}

#[test]
fn test_bad_field_keeps_other_fields() {
    let mut dispatcher = dispatcher(75.0);
    let dispatch = dispatcher
        .on_message(
            br#"{"translated_text":"Chair ahead","depth":40,"tracking_results":[{"id":1,"class":"chair","bbox":[0,0,1,1]}]}"#,
        )
        .unwrap();

    assert_eq!(
        dispatch.events,
        vec![
            InboundEvent::TranslatedText("Chair ahead".to_string()),
            InboundEvent::Depth {
                value: 40.0,
                unit: DepthUnit::Centimeters
            },
        ]
    );
    assert_eq!(
        dispatch.proximity,
        Some(ProximityChanged {
            close: true,
            depth: 40.0
        })
    );
    assert!(matches!(
        dispatch.field_errors.as_slice(),
        [ParseError::InvalidField { field: "tracking_results", .. }]
    ));
}

#[test]
fn test_bounding_box() {
    let mut dispatcher = dispatcher(10.0);
    let dispatch = dispatcher
        .on_message(br#"{"bounding_box":{"x1":10,"y1":20,"x2":110,"y2":220,"label":"door"}}"#)
        .unwrap();

    let event = &dispatch.events[0];
    assert_eq!(
        *event,
        InboundEvent::BoundingBox {
            x1: 10.0,
            y1: 20.0,
            x2: 110.0,
            y2: 220.0,
            label: Some("door".to_string())
        }
    );
    assert_eq!(event.position_in(640.0), Some(HorizontalPosition::Left));
    assert_eq!(event.position_in(100.0), Some(HorizontalPosition::Right));
}

#[test]
fn test_tracked_objects_annotated_with_depth() {
    let mut dispatcher = dispatcher(10.0);
    let raw = br#"{
        "depth": 45,
        "tracking_results": [
            {"id": 1, "class": "chair", "bbox": [0.1, 0.2, 0.3, 0.6], "confidence": 0.87},
            {"id": 2, "class": "person", "bbox": [0.7, 0.1, 0.9, 0.9], "confidence": 0.5}
        ]
    }"#;

    let dispatch = dispatcher.on_message(raw).unwrap();
    let InboundEvent::TrackedObjectList(objects) = &dispatch.events[1] else {
        panic!("expected tracked objects, got {:?}", dispatch.events);
    };

    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0].label.as_deref(), Some("chair (87%) - 45cm"));
    assert_eq!(objects[0].position, HorizontalPosition::Left);
    assert_eq!(objects[1].label.as_deref(), Some("person (50%) - 45cm"));
    assert_eq!(objects[1].position, HorizontalPosition::Right);
}

#[test]
fn test_tracked_objects_use_last_known_depth() {
    let mut dispatcher = dispatcher(10.0);
    dispatcher.on_message(br#"{"depth": 200}"#).unwrap();

    let dispatch = dispatcher
        .on_message(
            br#"{"tracking_results":[{"id":3,"class":"table","bbox":[0.4,0.4,0.6,0.6],"confidence":0.9}]}"#,
        )
        .unwrap();
    let InboundEvent::TrackedObjectList(objects) = &dispatch.events[0] else {
        panic!("expected tracked objects");
    };
    assert_eq!(objects[0].label.as_deref(), Some("table (90%) - 200cm"));
    assert_eq!(objects[0].position, HorizontalPosition::Center);
}

#[test]
fn test_annotation_disabled_or_unknown_depth() {
    let raw =
        br#"{"tracking_results":[{"id":3,"class":"table","bbox":[0.4,0.4,0.6,0.6],"confidence":0.9}]}"#;

    let mut no_depth = dispatcher(10.0);
    let dispatch = no_depth.on_message(raw).unwrap();
    let InboundEvent::TrackedObjectList(objects) = &dispatch.events[0] else {
        panic!("expected tracked objects");
    };
    assert_eq!(objects[0].label.as_deref(), Some("table (90%)"));

    let mut disabled = ResultDispatcher::new(10.0, DepthUnit::Meters, false);
    disabled.on_message(br#"{"depth": 1.5}"#).unwrap();
    let dispatch = disabled.on_message(raw).unwrap();
    let InboundEvent::TrackedObjectList(objects) = &dispatch.events[0] else {
        panic!("expected tracked objects");
    };
    assert_eq!(objects[0].label.as_deref(), Some("table (90%)"));
}

#[test]
fn test_proximity_edges_across_messages() {
    let mut dispatcher = dispatcher(10.0);
    let fired: Vec<usize> = [20, 5, 4, 16, 3]
        .iter()
        .enumerate()
        .filter_map(|(i, depth)| {
            let raw = format!(r#"{{"depth":{}}}"#, depth);
            dispatcher
                .on_message(raw.as_bytes())
                .unwrap()
                .proximity
                .map(|_| i)
        })
        .collect();
    assert_eq!(fired, vec![1, 4]);
}

#[test]
fn test_reset_clears_history() {
    let mut dispatcher = dispatcher(10.0);
    dispatcher.on_message(br#"{"depth": 2}"#).unwrap();
    dispatcher.reset();
    assert!(!dispatcher.is_object_close());
    assert_eq!(dispatcher.last_depth(), None);
}

#[test]
fn test_depth_unit_formatting() {
    assert_eq!(DepthUnit::Centimeters.format(45.4), "45cm");
    assert_eq!(DepthUnit::Meters.format(0.456), "0.46m");
    assert_eq!(DepthUnit::Normalized.format(0.1), "0.10");
}
