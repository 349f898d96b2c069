use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// One object reported by the external detector for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DetectionRecord", into = "DetectionRecord")]
pub struct Detection {
    pub bbox: Rect,
    /// Detection confidence in [0, 1]
    pub confidence: f32,
    /// Class label, e.g. `"person"`
    pub class_name: String,
    /// Frame the detection came from; stamped by the engine on ingestion.
    pub frame_id: u64,
}

impl Detection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class_name: impl Into<String>) -> Self {
        Self {
            bbox: Rect::from_tlbr(x1, y1, x2, y2),
            confidence,
            class_name: class_name.into(),
            frame_id: 0,
        }
    }

    pub fn from_rect(bbox: Rect, confidence: f32, class_name: impl Into<String>) -> Self {
        Self {
            bbox,
            confidence,
            class_name: class_name.into(),
            frame_id: 0,
        }
    }

    /// Usable by the tracker: valid box and finite confidence.
    pub fn is_valid(&self) -> bool {
        self.bbox.is_valid() && self.confidence.is_finite()
    }
}

/// Wire layout: `{"bbox": [x1, y1, x2, y2], "confidence": 0.9, "class": "person"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DetectionRecord {
    bbox: [f32; 4],
    confidence: f32,
    #[serde(rename = "class", alias = "class_name")]
    class_name: String,
    #[serde(default)]
    frame_id: u64,
}

impl From<DetectionRecord> for Detection {
    fn from(r: DetectionRecord) -> Self {
        let [x1, y1, x2, y2] = r.bbox;
        Self {
            bbox: Rect::from_tlbr(x1, y1, x2, y2),
            confidence: r.confidence,
            class_name: r.class_name,
            frame_id: r.frame_id,
        }
    }
}

impl From<Detection> for DetectionRecord {
    fn from(d: Detection) -> Self {
        Self {
            bbox: d.bbox.to_tlbr(),
            confidence: d.confidence,
            class_name: d.class_name,
            frame_id: d.frame_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let det: Detection = serde_json::from_str(
            r#"{"bbox": [100, 100, 160, 250], "confidence": 0.9, "class": "person"}"#,
        )
        .unwrap();
        assert_eq!(det.bbox, Rect::from_tlbr(100.0, 100.0, 160.0, 250.0));
        assert_eq!(det.class_name, "person");
        assert_eq!(det.frame_id, 0);

        let json = serde_json::to_value(&det).unwrap();
        assert_eq!(json["class"], "person");
        assert_eq!(json["bbox"][2], 160.0);
    }

    #[test]
    fn test_class_name_alias() {
        let det: Detection = serde_json::from_str(
            r#"{"bbox": [0, 0, 1, 1], "confidence": 0.5, "class_name": "car"}"#,
        )
        .unwrap();
        assert_eq!(det.class_name, "car");
    }

    #[test]
    fn test_validity() {
        assert!(Detection::new(0.0, 0.0, 10.0, 10.0, 0.9, "person").is_valid());
        assert!(!Detection::new(10.0, 0.0, 0.0, 10.0, 0.9, "person").is_valid());
        assert!(!Detection::new(0.0, 0.0, 10.0, 10.0, f32::NAN, "person").is_valid());
    }
}
