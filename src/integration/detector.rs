//! Trait for object detection inference backends.

use crate::detection::Detection;

/// An object detector.
///
/// Implement this trait to feed any detection model into a
/// [`TrackerPipeline`](super::TrackerPipeline).
///
/// # Example
///
/// ```ignore
/// use safetrack::{Detection, DetectionSource};
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl DetectionSource for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, input: &[u8], width: u32, height: u32) -> Result<Vec<Detection>, Self::Error> {
///         // Run inference, then NMS, and return boxes with class labels
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectionSource {
    /// Error type for detection failures.
    type Error;

    /// Run inference on one frame.
    ///
    /// # Arguments
    /// * `input` - Packed RGB8 pixels, row-major
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    fn detect(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, Self::Error>;
}

/// Conversion from a model-specific output format.
pub trait IntoDetections {
    fn into_detections(self) -> Vec<Detection>;
}

impl IntoDetections for Vec<Detection> {
    fn into_detections(self) -> Vec<Detection> {
        self
    }
}

/// `(x1, y1, x2, y2, confidence, class)` rows, the usual post-NMS layout.
impl<S: Into<String>> IntoDetections for Vec<([f32; 4], f32, S)> {
    fn into_detections(self) -> Vec<Detection> {
        self.into_iter()
            .map(|([x1, y1, x2, y2], confidence, class)| {
                Detection::new(x1, y1, x2, y2, confidence, class)
            })
            .collect()
    }
}
