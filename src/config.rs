//! Tunable knobs for the tracker and the analytics.
//!
//! Every struct deserializes with `#[serde(default)]`, so a JSON document only
//! needs to name the values it overrides. Call [`EngineConfig::validate`]
//! (done by [`Engine::new`](crate::Engine::new)) before use.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which assignment solver the tracker uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociatorKind {
    /// Jonker-Volgenant optimal assignment, greedy on solver failure.
    #[default]
    Optimal,
    /// Greedy ascending-cost assignment only.
    Greedy,
}

/// Weights of the fused association cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationWeights {
    pub iou: f32,
    pub center: f32,
    pub size: f32,
    pub appearance: f32,
}

impl Default for AssociationWeights {
    fn default() -> Self {
        Self {
            iou: 0.3,
            center: 0.4,
            size: 0.15,
            appearance: 0.15,
        }
    }
}

/// Weights of the similarity used when re-identifying a recently deleted track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryWeights {
    pub position: f32,
    pub size: f32,
    pub appearance: f32,
}

impl Default for RecoveryWeights {
    fn default() -> Self {
        Self {
            position: 0.5,
            size: 0.2,
            appearance: 0.3,
        }
    }
}

/// Configuration for the [`TrackManager`](crate::tracker::TrackManager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Updates needed before a tentative track is confirmed.
    pub min_hits: u32,
    /// Missed frames a confirmed track survives before deletion.
    pub max_age: u32,
    /// Pairs overlapping less than this need a close center to stay eligible.
    pub iou_threshold: f32,
    /// Center distance (pixels) normalizing the center cost.
    pub center_distance_threshold: f32,
    /// Relative area deviation treated as a pose change rather than a mismatch.
    pub size_change_tolerance: f32,
    /// Similarity floor for ID recovery.
    pub appearance_similarity_threshold: f32,
    /// Frames a deleted track stays in the recovery buffer.
    pub max_disappeared: u32,
    /// Detections below this confidence never reach the tracker.
    pub min_confidence_for_track: f32,
    /// Fused costs at or above this are never matched.
    pub reject_threshold: f32,
    /// Detections overlapping another detection above this IoU are scored
    /// with an extra position-history term.
    pub overlap_threshold: f32,
    /// Weight of the position-history term for overlapping detections.
    pub overlap_weight: f32,
    /// Distance (pixels) normalizing the position-history term.
    pub overlap_distance: f32,
    pub weights: AssociationWeights,
    pub recovery_weights: RecoveryWeights,
    /// Center distance (pixels) normalizing the recovery position similarity.
    pub recovery_distance: f32,
    pub enable_id_recovery: bool,
    pub bbox_history_len: usize,
    pub appearance_history_len: usize,
    pub size_history_len: usize,
    pub associator: AssociatorKind,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_hits: 3,
            max_age: 15,
            iou_threshold: 0.3,
            center_distance_threshold: 80.0,
            size_change_tolerance: 0.6,
            appearance_similarity_threshold: 0.6,
            max_disappeared: 15,
            min_confidence_for_track: 0.5,
            reject_threshold: 0.7,
            overlap_threshold: 0.7,
            overlap_weight: 0.2,
            overlap_distance: 100.0,
            weights: AssociationWeights::default(),
            recovery_weights: RecoveryWeights::default(),
            recovery_distance: 200.0,
            enable_id_recovery: true,
            bbox_history_len: 30,
            appearance_history_len: 5,
            size_history_len: 10,
            associator: AssociatorKind::Optimal,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("min_hits", self.min_hits as f64)?;
        positive("max_age", self.max_age as f64)?;
        unit_range("iou_threshold", self.iou_threshold)?;
        positive("center_distance_threshold", self.center_distance_threshold as f64)?;
        positive("size_change_tolerance", self.size_change_tolerance as f64)?;
        unit_range(
            "appearance_similarity_threshold",
            self.appearance_similarity_threshold,
        )?;
        unit_range("min_confidence_for_track", self.min_confidence_for_track)?;
        positive("reject_threshold", self.reject_threshold as f64)?;
        unit_range("overlap_threshold", self.overlap_threshold)?;
        non_negative("overlap_weight", self.overlap_weight)?;
        positive("overlap_distance", self.overlap_distance as f64)?;
        positive("max_disappeared", self.max_disappeared as f64)?;
        positive("recovery_distance", self.recovery_distance as f64)?;
        positive("bbox_history_len", self.bbox_history_len as f64)?;
        positive("appearance_history_len", self.appearance_history_len as f64)?;
        positive("size_history_len", self.size_history_len as f64)?;

        let w = &self.weights;
        for (name, value) in [
            ("weights.iou", w.iou),
            ("weights.center", w.center),
            ("weights.size", w.size),
            ("weights.appearance", w.appearance),
        ] {
            non_negative(name, value)?;
        }
        if w.iou + w.center + w.size + w.appearance <= 0.0 {
            return Err(ConfigError::ZeroWeights);
        }

        let r = &self.recovery_weights;
        for (name, value) in [
            ("recovery_weights.position", r.position),
            ("recovery_weights.size", r.size),
            ("recovery_weights.appearance", r.appearance),
        ] {
            non_negative(name, value)?;
        }
        if r.position + r.size <= 0.0 {
            return Err(ConfigError::ZeroWeights);
        }

        Ok(())
    }
}

/// Configuration for dwell, crowding and geofence analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub enable_dwell_analysis: bool,
    /// Dwell time (frames) from which a dwell event is emitted.
    pub dwell_threshold: u64,
    /// Used only to report dwell time in seconds.
    pub frame_rate: f32,
    pub enable_crowding_analysis: bool,
    /// Center distance (pixels) below which two tracks form a proximity pair.
    pub crowding_distance_threshold: f32,
    /// Class labels considered by the crowding analyzer.
    pub monitored_classes: Vec<String>,
    /// Confirmed-track count above which the default safety policy raises level 2.
    pub max_count_alert: usize,
    /// Frames after an enter/exit during which a track still satisfies the
    /// fence trigger mode.
    pub fence_recent_window: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enable_dwell_analysis: true,
            dwell_threshold: 30,
            frame_rate: 30.0,
            enable_crowding_analysis: true,
            crowding_distance_threshold: 100.0,
            monitored_classes: vec!["person".to_string()],
            max_count_alert: 10,
            fence_recent_window: 5,
        }
    }
}

impl AnalyticsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("dwell_threshold", self.dwell_threshold as f64)?;
        positive("frame_rate", self.frame_rate as f64)?;
        positive(
            "crowding_distance_threshold",
            self.crowding_distance_threshold as f64,
        )?;
        Ok(())
    }
}

/// Top-level configuration of an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tracker: TrackerConfig,
    pub analytics: AnalyticsConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tracker.validate()?;
        self.analytics.validate()
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

fn non_negative(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value: value as f64,
            min: 0.0,
            max: f64::INFINITY,
        })
    }
}

fn unit_range(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value: value as f64,
            min: 0.0,
            max: 1.0,
        })
    }
}
