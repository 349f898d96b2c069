use serde::Serialize;

use crate::config::AnalyticsConfig;
use crate::tracker::Track;

/// Two tracks closer than the crowding threshold. `track_a < track_b`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityPair {
    pub track_a: u64,
    pub track_b: u64,
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct CrowdingAnalyzer {
    distance_threshold: f32,
    monitored_classes: Vec<String>,
}

impl CrowdingAnalyzer {
    pub fn new(distance_threshold: f32, monitored_classes: Vec<String>) -> Self {
        Self {
            distance_threshold,
            monitored_classes,
        }
    }

    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(
            config.crowding_distance_threshold,
            config.monitored_classes.clone(),
        )
    }

    pub fn is_monitored(&self, class_name: &str) -> bool {
        self.monitored_classes.iter().any(|c| c == class_name)
    }

    /// All pairs of monitored tracks whose last observed centers are closer
    /// than the threshold. Quadratic in the number of tracks.
    pub fn analyze<'a>(&self, tracks: impl IntoIterator<Item = &'a Track>) -> Vec<ProximityPair> {
        let monitored: Vec<&Track> = tracks
            .into_iter()
            .filter(|t| self.is_monitored(t.class_name()))
            .collect();

        let mut pairs = Vec::new();
        for (i, a) in monitored.iter().enumerate() {
            for b in &monitored[i + 1..] {
                let distance = a.last_bbox().center_distance(&b.last_bbox());
                if distance < self.distance_threshold {
                    let (track_a, track_b) = if a.track_id() < b.track_id() {
                        (a.track_id(), b.track_id())
                    } else {
                        (b.track_id(), a.track_id())
                    };
                    pairs.push(ProximityPair {
                        track_a,
                        track_b,
                        distance,
                    });
                }
            }
        }
        pairs
    }
}
