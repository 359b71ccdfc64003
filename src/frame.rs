use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// How captured frames are framed on the socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameEncoding {
    /// Base64 JPEG as a text message
    Base64,
    /// `{"frame": "<base64>", "shouldProcess": true}` as a text message
    Envelope,
    /// Raw JPEG bytes as a binary message
    Binary,
}

/// Frame data produced by a frame source
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Sequence number assigned by the source
    pub id: u64,
    /// Timestamp when the frame was captured
    pub timestamp: SystemTime,
    /// Encoded image bytes (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
}

impl CapturedFrame {
    pub fn new(id: u64, data: Vec<u8>) -> Self {
        Self {
            id,
            timestamp: SystemTime::now(),
            data: Arc::new(data),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check for JPEG SOI and EOI markers
    pub fn is_jpeg(&self) -> bool {
        let data = self.data.as_slice();
        data.len() >= 4
            && data[0] == 0xFF
            && data[1] == 0xD8
            && data[data.len() - 2] == 0xFF
            && data[data.len() - 1] == 0xD9
    }
}

#[derive(Serialize)]
struct FrameEnvelope<'a> {
    frame: &'a str,
    #[serde(rename = "shouldProcess")]
    should_process: bool,
}

/// A message ready for the socket writer
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Text(String),
    Binary(Vec<u8>),
}

impl OutboundFrame {
    /// Encode a captured frame the way the server expects it
    pub fn encode(frame: &CapturedFrame, encoding: FrameEncoding) -> Self {
        match encoding {
            FrameEncoding::Base64 => OutboundFrame::Text(STANDARD.encode(frame.data.as_slice())),
            FrameEncoding::Envelope => {
                let encoded = STANDARD.encode(frame.data.as_slice());
                let envelope = FrameEnvelope {
                    frame: &encoded,
                    should_process: true,
                };
                // A struct of a str and a bool always serializes
                let json = serde_json::to_string(&envelope).unwrap_or_default();
                OutboundFrame::Text(json)
            }
            FrameEncoding::Binary => OutboundFrame::Binary(frame.data.as_ref().clone()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            OutboundFrame::Text(text) => text.len(),
            OutboundFrame::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg_frame() -> CapturedFrame {
        CapturedFrame::new(7, vec![0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9])
    }

    #[test]
    fn test_jpeg_marker_detection() {
        assert!(jpeg_frame().is_jpeg());
        assert!(!CapturedFrame::new(1, vec![1, 2, 3]).is_jpeg());
        assert!(CapturedFrame::new(1, Vec::new()).is_empty());
    }

    #[test]
    fn test_base64_encoding() {
        let frame = jpeg_frame();
        let encoded = OutboundFrame::encode(&frame, FrameEncoding::Base64);
        assert_eq!(encoded, OutboundFrame::Text("/9gBAv/Z".to_string()));
    }

    #[test]
    fn test_envelope_encoding() {
        let frame = jpeg_frame();
        let OutboundFrame::Text(json) = OutboundFrame::encode(&frame, FrameEncoding::Envelope)
        else {
            panic!("envelope must be a text message");
        };

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["frame"], "/9gBAv/Z");
        assert_eq!(value["shouldProcess"], true);
    }

    #[test]
    fn test_binary_encoding() {
        let frame = jpeg_frame();
        let encoded = OutboundFrame::encode(&frame, FrameEncoding::Binary);
        assert_eq!(encoded, OutboundFrame::Binary(frame.data.as_ref().clone()));
        assert_eq!(encoded.len(), 6);
    }
}
