//! TrackerPipeline for combining detection with tracking.

use crate::analytics::FenceConfig;
use crate::appearance::AppearanceExtractor;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::ConfigError;
use crate::frame::{FrameInput, FrameOutput};

use super::DetectionSource;

/// A detector bundled with an [`Engine`].
///
/// The raw frame goes to the detector and, as an RGB image, to the engine
/// for appearance descriptors.
pub struct TrackerPipeline<D: DetectionSource> {
    detector: D,
    engine: Engine,
}

impl<D: DetectionSource> TrackerPipeline<D> {
    pub fn new(detector: D, config: EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            detector,
            engine: Engine::new(config)?,
        })
    }

    pub fn with_engine(detector: D, engine: Engine) -> Self {
        Self { detector, engine }
    }

    /// Detect and track one frame.
    ///
    /// # Arguments
    /// * `input` - Packed RGB8 pixels
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    /// * `frame_id` - Monotonic frame number
    /// * `fence` - Optional fence for this frame
    ///
    /// Only the detector can fail; tracking itself never does.
    pub fn process_frame(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
        frame_id: u64,
        fence: Option<FenceConfig>,
    ) -> Result<FrameOutput, D::Error> {
        let detections = self.detector.detect(input, width, height)?;

        let mut frame = FrameInput::new(frame_id, detections).with_image_size(width, height);
        if let Some(image) = AppearanceExtractor::image_from_raw(input, width, height) {
            frame = frame.with_image(image);
        }
        frame.fence = fence;

        Ok(self.engine.process_frame(frame))
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Detection;

    struct MockDetector {
        detections: Vec<Detection>,
    }

    impl DetectionSource for MockDetector {
        type Error = std::convert::Infallible;

        fn detect(
            &mut self,
            _input: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<Vec<Detection>, Self::Error> {
            Ok(self.detections.clone())
        }
    }

    struct BrokenDetector;

    impl DetectionSource for BrokenDetector {
        type Error = String;

        fn detect(&mut self, _: &[u8], _: u32, _: u32) -> Result<Vec<Detection>, Self::Error> {
            Err("model not loaded".into())
        }
    }

    #[test]
    fn test_tracker_pipeline() {
        let detector = MockDetector {
            detections: vec![Detection::new(10.0, 20.0, 50.0, 80.0, 0.9, "person")],
        };
        let mut pipeline = TrackerPipeline::new(detector, EngineConfig::default()).unwrap();

        let frame = vec![128u8; 64 * 96 * 3];
        let mut last = None;
        for frame_id in 1..=3 {
            let out = pipeline.process_frame(&frame, 64, 96, frame_id, None).unwrap();
            last = out.tracked_detections.first().and_then(|d| d.track_id);
        }
        // confirmed on the third frame
        assert_eq!(last, Some(1));
        assert!(pipeline.engine().tracker().track(1).unwrap().has_appearance());
    }

    #[test]
    fn test_bad_buffer_still_tracks() {
        let detector = MockDetector {
            detections: vec![Detection::new(10.0, 20.0, 50.0, 80.0, 0.9, "person")],
        };
        let mut pipeline = TrackerPipeline::new(detector, EngineConfig::default()).unwrap();
        let out = pipeline.process_frame(&[0u8; 7], 64, 96, 1, None).unwrap();
        assert_eq!(out.tracked_detections.len(), 1);
        assert!(!pipeline.engine().tracker().track(1).unwrap().has_appearance());
    }

    #[test]
    fn test_detector_error_propagates() {
        let mut pipeline = TrackerPipeline::new(BrokenDetector, EngineConfig::default()).unwrap();
        assert_eq!(
            pipeline.process_frame(&[], 0, 0, 1, None).unwrap_err(),
            "model not loaded"
        );
    }
}
