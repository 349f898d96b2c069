//! Per-frame input and output of the [`Engine`](crate::Engine).

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::analytics::{DwellEvent, FenceConfig, FenceEvent, ProximityPair, SafetyMetrics};
use crate::detection::Detection;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameInput {
    /// Monotonically increasing frame number.
    pub frame_id: u64,
    pub detections: Vec<Detection>,
    /// Decoded frame for appearance descriptors. Without it association runs
    /// on motion and geometry alone.
    #[serde(skip)]
    pub image: Option<RgbImage>,
    /// `(width, height)`; taken from `image` when that is present.
    #[serde(default)]
    pub image_size: Option<(u32, u32)>,
    #[serde(default)]
    pub fence: Option<FenceConfig>,
}

impl FrameInput {
    pub fn new(frame_id: u64, detections: Vec<Detection>) -> Self {
        Self {
            frame_id,
            detections,
            ..Default::default()
        }
    }

    pub fn with_image(mut self, image: RgbImage) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_image_size(mut self, width: u32, height: u32) -> Self {
        self.image_size = Some((width, height));
        self
    }

    pub fn with_fence(mut self, fence: FenceConfig) -> Self {
        self.fence = Some(fence);
        self
    }

    pub(crate) fn resolved_image_size(&self) -> Option<(u32, u32)> {
        self.image
            .as_ref()
            .map(|img| img.dimensions())
            .or(self.image_size)
    }
}

/// A detection annotated with tracking results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedDetection {
    #[serde(flatten)]
    pub detection: Detection,
    /// Set only once the detection's track is confirmed.
    pub track_id: Option<u64>,
    /// Frames since the track was first seen, for confirmed tracks.
    pub dwell_time: Option<u64>,
    /// Attached to a pre-existing identity (matched or recovered).
    pub matched: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FrameOutput {
    pub frame_id: u64,
    pub tracked_detections: Vec<TrackedDetection>,
    pub dwell_events: Vec<DwellEvent>,
    pub fence_events: Vec<FenceEvent>,
    pub proximity_pairs: Vec<ProximityPair>,
    pub safety_metrics: SafetyMetrics,
}

impl FrameOutput {
    /// Ids of the confirmed tracks among the detections.
    pub fn track_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.tracked_detections.iter().filter_map(|d| d.track_id)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_input_from_json() {
        let json = r#"{
            "frame_id": 7,
            "detections": [{"bbox": [1, 2, 11, 22], "confidence": 0.8, "class": "person"}],
            "image_size": [640, 480]
        }"#;
        let input: FrameInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.frame_id, 7);
        assert_eq!(input.detections.len(), 1);
        assert_eq!(input.resolved_image_size(), Some((640, 480)));
        assert!(input.fence.is_none());
    }

    #[test]
    fn test_image_size_prefers_image() {
        let input = FrameInput::new(1, vec![])
            .with_image_size(10, 10)
            .with_image(RgbImage::new(4, 3));
        assert_eq!(input.resolved_image_size(), Some((4, 3)));
    }

    #[test]
    fn test_tracked_detection_json_is_flat() {
        let det = TrackedDetection {
            detection: Detection::new(0.0, 0.0, 10.0, 20.0, 0.9, "person"),
            track_id: Some(3),
            dwell_time: Some(12),
            matched: true,
        };
        let value = serde_json::to_value(&det).unwrap();
        assert_eq!(value["class"], "person");
        assert_eq!(value["track_id"], 3);
        assert_eq!(value["bbox"][3], 20.0);
    }
}
