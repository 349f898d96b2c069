//! The per-frame entry point: detections in, tracked detections and events out.

use tracing::{debug, warn};

use crate::analytics::{
    ClassAwareKeyPoint, CrowdSafetyPolicy, CrowdingAnalyzer, DwellAnalyzer, GeofenceEvaluator,
    KeyPointPolicy, SafetyInput, SafetyPolicy,
};
use crate::appearance::{AppearanceExtractor, Descriptor};
use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::frame::{FrameInput, FrameOutput, TrackedDetection};
use crate::tracker::{AssignmentKind, Associator, Track, TrackManager, TrackerStats};

/// Tracking and analytics for one video stream.
///
/// Frames must arrive in order. Independent streams need independent engines;
/// nothing is shared between instances.
pub struct Engine {
    config: EngineConfig,
    tracker: TrackManager,
    extractor: AppearanceExtractor,
    dwell: DwellAnalyzer,
    crowding: CrowdingAnalyzer,
    geofence: GeofenceEvaluator,
    key_points: Box<dyn KeyPointPolicy>,
    safety: Box<dyn SafetyPolicy>,
}

impl Engine {
    /// Validates `config`; a bad configuration is the only fatal error.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let analytics = &config.analytics;
        Ok(Self {
            tracker: TrackManager::new(config.tracker.clone())?,
            extractor: AppearanceExtractor::new(),
            dwell: DwellAnalyzer::from_config(analytics),
            crowding: CrowdingAnalyzer::from_config(analytics),
            geofence: GeofenceEvaluator::new(analytics.fence_recent_window),
            key_points: Box::new(ClassAwareKeyPoint::default()),
            safety: Box::new(CrowdSafetyPolicy::new(analytics.max_count_alert)),
            config,
        })
    }

    pub fn with_safety_policy(mut self, policy: impl SafetyPolicy + 'static) -> Self {
        self.safety = Box::new(policy);
        self
    }

    pub fn with_key_point_policy(mut self, policy: impl KeyPointPolicy + 'static) -> Self {
        self.key_points = Box::new(policy);
        self
    }

    pub fn with_associator(mut self, associator: Box<dyn Associator>) -> Self {
        self.tracker = self.tracker.with_associator(associator);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tracker(&self) -> &TrackManager {
        &self.tracker
    }

    pub fn stats(&self) -> TrackerStats {
        self.tracker.stats()
    }

    /// Process one frame. Never fails: bad detections are dropped, bad crops
    /// get neutral descriptors and an unusable fence is ignored.
    pub fn process_frame(&mut self, input: FrameInput) -> FrameOutput {
        let frame_id = input.frame_id;
        let image_size = input.resolved_image_size();
        let FrameInput {
            mut detections,
            image,
            fence,
            ..
        } = input;

        for det in &mut detections {
            det.frame_id = frame_id;
        }

        let descriptors: Vec<Option<Descriptor>> = match &image {
            Some(image) => detections
                .iter()
                .map(|d| d.is_valid().then(|| self.extractor.extract(image, &d.bbox)))
                .collect(),
            None => Vec::new(),
        };

        let update = self.tracker.update(frame_id, &detections, &descriptors);

        let visible: Vec<&Track> = self
            .tracker
            .confirmed_tracks()
            .filter(|t| t.last_seen_frame() == frame_id)
            .collect();

        let analytics = &self.config.analytics;
        let dwell_events = if analytics.enable_dwell_analysis {
            self.dwell.analyze(visible.iter().copied(), frame_id)
        } else {
            Vec::new()
        };
        let proximity_pairs = if analytics.enable_crowding_analysis {
            self.crowding.analyze(visible.iter().copied())
        } else {
            Vec::new()
        };

        let fence = fence.filter(|f| f.is_active());
        let polygons = fence.as_ref().and_then(|f| {
            let resolved = f.resolve(image_size);
            if resolved.is_none() {
                warn!(frame_id, "fence configuration unusable, skipping fence");
            }
            resolved
        });

        let min_confidence = self.config.tracker.min_confidence_for_track;
        let mut tracked_detections = Vec::with_capacity(detections.len());
        let mut fence_events = Vec::new();
        for (index, detection) in detections.into_iter().enumerate() {
            if !detection.is_valid() || detection.confidence < min_confidence {
                continue;
            }
            let assignment = update.track_for(index);
            let assigned = assignment.and_then(|a| self.tracker.track(a.track_id));
            let track = assigned.filter(|t| t.is_confirmed());
            let track_id = track.map(Track::track_id);

            if let (Some(polygons), Some(fence)) = (&polygons, &fence) {
                let point = self.key_points.key_point(&detection);
                // tentative tracks are followed too, so a crossing made before
                // confirmation is still reported once
                let triggered = match assigned {
                    Some(t) => {
                        let obs = self.geofence.observe(
                            t.track_id(),
                            point,
                            polygons,
                            fence.trigger_mode,
                            frame_id,
                            t.is_confirmed(),
                        );
                        fence_events.extend(obs.event);
                        obs.triggered
                    }
                    None => GeofenceEvaluator::matches_mode(polygons, point, fence.trigger_mode),
                };
                if !triggered {
                    continue;
                }
            }

            tracked_detections.push(TrackedDetection {
                track_id,
                dwell_time: track.map(|t| DwellAnalyzer::dwell_time(t, frame_id)),
                matched: assignment.is_some_and(|a| a.kind != AssignmentKind::Created),
                detection,
            });
        }

        let tracker = &self.tracker;
        self.geofence.retain(|id| tracker.is_known(id));

        let safety_metrics = self.safety.assess(&SafetyInput {
            frame_id,
            count: visible.len(),
            dwell_events: &dwell_events,
            fence_events: &fence_events,
            proximity_pairs: &proximity_pairs,
        });

        debug!(
            frame_id,
            detections = tracked_detections.len(),
            confirmed = visible.len(),
            dwell = dwell_events.len(),
            fence = fence_events.len(),
            alert_level = safety_metrics.alert_level,
            "frame processed"
        );

        FrameOutput {
            frame_id,
            tracked_detections,
            dwell_events,
            fence_events,
            proximity_pairs,
            safety_metrics,
        }
    }

    /// Drop all per-stream state. Track ids are not reused afterwards.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.geofence.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{FenceConfig, SafetyMetrics, TriggerMode};
    use crate::config::TrackerConfig;
    use crate::detection::Detection;
    use crate::geometry::{Point, Polygon};

    fn person(x: f32) -> Detection {
        Detection::new(x, 100.0, x + 60.0, 250.0, 0.9, "person")
    }

    fn quick_config() -> EngineConfig {
        EngineConfig {
            tracker: TrackerConfig {
                min_hits: 1,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let mut config = EngineConfig::default();
        config.analytics.frame_rate = 0.0;
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn test_track_id_hidden_until_confirmed() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        for frame in 1..=3u64 {
            let out = engine.process_frame(FrameInput::new(frame, vec![person(100.0)]));
            assert_eq!(out.tracked_detections.len(), 1);
            let det = &out.tracked_detections[0];
            assert_eq!(det.track_id.is_some(), frame == 3);
            assert_eq!(det.matched, frame > 1);
            assert_eq!(det.detection.frame_id, frame);
        }
    }

    #[test]
    fn test_rejected_detections_not_reported() {
        let mut engine = Engine::new(quick_config()).unwrap();
        let weak = Detection::new(0.0, 0.0, 10.0, 10.0, 0.1, "person");
        let out = engine.process_frame(FrameInput::new(1, vec![weak, person(200.0)]));
        assert_eq!(out.tracked_detections.len(), 1);
        assert_eq!(out.tracked_detections[0].track_id, Some(1));
    }

    #[test]
    fn test_fence_filters_detections() {
        let mut engine = Engine::new(quick_config()).unwrap();
        let zone = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(300.0, 0.0),
            Point::new(300.0, 300.0),
            Point::new(0.0, 300.0),
        ]);
        let fence = FenceConfig::new(vec![zone], TriggerMode::Inside);
        let out = engine.process_frame(
            FrameInput::new(1, vec![person(100.0), person(500.0)]).with_fence(fence),
        );
        assert_eq!(out.tracked_detections.len(), 1);
        assert_eq!(out.tracked_detections[0].track_id, Some(1));
    }

    #[test]
    fn test_invalid_fence_is_skipped() {
        let mut engine = Engine::new(quick_config()).unwrap();
        let fence = FenceConfig::new(
            vec![Polygon::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)])],
            TriggerMode::Inside,
        );
        let out = engine.process_frame(FrameInput::new(1, vec![person(500.0)]).with_fence(fence));
        assert_eq!(out.tracked_detections.len(), 1);
        assert!(out.fence_events.is_empty());
    }

    #[test]
    fn test_custom_safety_policy() {
        struct Always;
        impl SafetyPolicy for Always {
            fn assess(&self, input: &SafetyInput<'_>) -> SafetyMetrics {
                SafetyMetrics {
                    count: input.count,
                    alert_level: 2,
                    alert_triggered: true,
                    description: "always".into(),
                }
            }
        }
        let mut engine = Engine::new(quick_config()).unwrap().with_safety_policy(Always);
        let out = engine.process_frame(FrameInput::new(1, vec![person(100.0)]));
        assert_eq!(out.safety_metrics.count, 1);
        assert_eq!(out.safety_metrics.description, "always");
    }

    #[test]
    fn test_image_enables_descriptors() {
        let mut engine = Engine::new(quick_config()).unwrap();
        let image = image::RgbImage::from_fn(320, 320, |x, _| image::Rgb([(x % 256) as u8, 80, 160]));
        engine.process_frame(FrameInput::new(1, vec![person(100.0)]).with_image(image));
        assert!(engine.tracker().track(1).unwrap().has_appearance());
    }

    #[test]
    fn test_reset() {
        let mut engine = Engine::new(quick_config()).unwrap();
        engine.process_frame(FrameInput::new(1, vec![person(100.0)]));
        engine.reset();
        assert_eq!(engine.stats().active_tracks, 0);
        let out = engine.process_frame(FrameInput::new(1, vec![person(100.0)]));
        assert_eq!(out.tracked_detections[0].track_id, Some(2));
    }
}
