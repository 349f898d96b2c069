//! Per-frame analytics over confirmed tracks.
//!
//! Analyzers only ever see tracks through shared references; the
//! [`TrackManager`](crate::tracker::TrackManager) stays the sole owner.

mod crowding;
mod dwell;
mod geofence;
mod safety;

pub use crowding::{CrowdingAnalyzer, ProximityPair};
pub use dwell::{DwellAnalyzer, DwellEvent};
pub use geofence::{
    BottomCenter, BoxCenter, ClassAwareKeyPoint, FenceConfig, FenceEvent, FenceEventType,
    FenceObservation, GeofenceEvaluator, KeyPointPolicy, TriggerMode,
};
pub use safety::{CrowdSafetyPolicy, SafetyInput, SafetyMetrics, SafetyPolicy};
