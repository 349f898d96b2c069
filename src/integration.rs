//! Glue between an object detector and the tracking [`Engine`](crate::Engine).
//!
//! Any model that can turn raw frame bytes into [`Detection`](crate::Detection)s
//! plugs in through [`DetectionSource`]; the engine never sees the model.

mod builder;
mod detector;
mod pipeline;

pub use builder::DetectionBuilder;
pub use detector::{DetectionSource, IntoDetections};
pub use pipeline::TrackerPipeline;
