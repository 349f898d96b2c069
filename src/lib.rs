//! Multi-object tracking for video safety monitoring.
//!
//! Detections from an external detector are turned into persistent track
//! identities (Kalman motion model, fused motion/appearance cost, optimal
//! assignment, occlusion-tolerant lifecycle with ID recovery). Confirmed
//! tracks then feed dwell-time, geofence and crowding analytics.
//!
//! ```ignore
//! use safetrack::{Detection, Engine, EngineConfig, FrameInput};
//!
//! let mut engine = Engine::new(EngineConfig::default())?;
//! let dets = vec![Detection::new(100.0, 100.0, 160.0, 250.0, 0.9, "person")];
//! let out = engine.process_frame(FrameInput::new(1, dets));
//! for det in &out.tracked_detections {
//!     println!("{:?} -> {:?}", det.detection.bbox, det.track_id);
//! }
//! ```

pub mod analytics;
pub mod appearance;
pub mod config;
mod detection;
mod engine;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod integration;
pub mod tracker;

pub use analytics::{FenceConfig, FenceEvent, FenceEventType, TriggerMode};
pub use config::{EngineConfig, TrackerConfig};
pub use detection::Detection;
pub use engine::Engine;
pub use error::ConfigError;
pub use frame::{FrameInput, FrameOutput, TrackedDetection};
pub use geometry::{Point, Polygon, Rect};
pub use integration::{DetectionBuilder, DetectionSource, IntoDetections, TrackerPipeline};
pub use tracker::{TrackManager, TrackState};
