use serde::Serialize;

use crate::config::AnalyticsConfig;
use crate::tracker::Track;

/// A confirmed track that has stayed in view for at least the dwell threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DwellEvent {
    pub track_id: u64,
    pub class_name: String,
    /// Last observed box, `[x1, y1, x2, y2]`
    pub bbox: [f32; 4],
    /// Frames since the track was first seen
    pub dwell_time: u64,
    pub dwell_seconds: f32,
    pub first_seen_frame: u64,
    pub last_seen_frame: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct DwellAnalyzer {
    threshold: u64,
    frame_rate: f32,
}

impl DwellAnalyzer {
    pub fn new(threshold: u64, frame_rate: f32) -> Self {
        Self {
            threshold,
            frame_rate,
        }
    }

    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(config.dwell_threshold, config.frame_rate)
    }

    /// `current_frame - first_seen_frame`, never negative.
    pub fn dwell_time(track: &Track, current_frame: u64) -> u64 {
        current_frame.saturating_sub(track.first_seen_frame())
    }

    pub fn seconds(&self, dwell_time: u64) -> f32 {
        if self.frame_rate > 0.0 {
            dwell_time as f32 / self.frame_rate
        } else {
            0.0
        }
    }

    /// One event per track whose dwell time reached the threshold. Callers
    /// pass the confirmed tracks surfaced this frame.
    pub fn analyze<'a>(
        &self,
        tracks: impl IntoIterator<Item = &'a Track>,
        current_frame: u64,
    ) -> Vec<DwellEvent> {
        tracks
            .into_iter()
            .filter_map(|track| {
                let dwell_time = Self::dwell_time(track, current_frame);
                (dwell_time >= self.threshold).then(|| DwellEvent {
                    track_id: track.track_id(),
                    class_name: track.class_name().to_string(),
                    bbox: track.last_bbox().to_tlbr(),
                    dwell_time,
                    dwell_seconds: self.seconds(dwell_time),
                    first_seen_frame: track.first_seen_frame(),
                    last_seen_frame: track.last_seen_frame(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::detection::Detection;
    use crate::tracker::TrackManager;

    #[test]
    fn test_dwell_threshold() {
        let config = TrackerConfig {
            min_hits: 1,
            ..Default::default()
        };
        let mut manager = TrackManager::new(config).unwrap();
        let det = Detection::new(100.0, 100.0, 160.0, 250.0, 0.9, "person");
        for frame in 5..=15 {
            manager.update(frame, &[det.clone()], &[]);
        }
        let analyzer = DwellAnalyzer::new(10, 30.0);

        let events = analyzer.analyze(manager.confirmed_tracks(), 15);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].dwell_time, 10);
        assert_eq!(events[0].first_seen_frame, 5);
        assert!((events[0].dwell_seconds - 10.0 / 30.0).abs() < 1e-6);

        assert!(analyzer.analyze(manager.confirmed_tracks(), 14).is_empty());
    }

    #[test]
    fn test_dwell_time_never_negative() {
        let mut manager = TrackManager::new(TrackerConfig::default()).unwrap();
        let det = Detection::new(100.0, 100.0, 160.0, 250.0, 0.9, "person");
        manager.update(10, &[det], &[]);
        let track = manager.track(1).unwrap();
        assert_eq!(DwellAnalyzer::dwell_time(track, 3), 0);
        assert_eq!(DwellAnalyzer::dwell_time(track, 10), 0);
    }

    #[test]
    fn test_zero_frame_rate_reports_zero_seconds() {
        assert_eq!(DwellAnalyzer::new(1, 0.0).seconds(30), 0.0);
        assert_eq!(DwellAnalyzer::new(1, 15.0).seconds(30), 2.0);
    }
}
