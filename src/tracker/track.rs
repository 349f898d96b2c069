//! Single object track.

use std::collections::VecDeque;

use crate::appearance::Descriptor;
use crate::detection::Detection;
use crate::geometry::Rect;
use crate::tracker::kalman_filter::{KalmanFilter, MotionPredictor};
use crate::tracker::track_state::TrackState;

/// Capacities of the per-track ring buffers.
#[derive(Debug, Clone, Copy)]
pub struct HistoryLimits {
    pub bbox: usize,
    pub appearance: usize,
    pub size: usize,
}

/// A persistent identity for one physical object.
///
/// Only the [`TrackManager`](crate::tracker::TrackManager) mutates tracks;
/// everyone else sees them through shared references.
#[derive(Debug, Clone)]
pub struct Track {
    track_id: u64,
    state: TrackState,
    class_name: String,
    confidence: f32,
    predictor: MotionPredictor,
    /// Box predicted for the current frame, before any correction
    predicted: Rect,
    bbox_history: VecDeque<Rect>,
    appearance_history: VecDeque<Descriptor>,
    size_history: VecDeque<f32>,
    limits: HistoryLimits,
    hits: u32,
    age: u64,
    time_since_update: u32,
    first_seen_frame: u64,
    last_seen_frame: u64,
}

impl Track {
    pub(crate) fn new(
        track_id: u64,
        detection: &Detection,
        descriptor: Option<Descriptor>,
        kalman_filter: &KalmanFilter,
        frame_id: u64,
        limits: HistoryLimits,
    ) -> Self {
        let mut track = Self {
            track_id,
            state: TrackState::Tentative,
            class_name: detection.class_name.clone(),
            confidence: detection.confidence,
            predictor: kalman_filter.initiate(&detection.bbox),
            predicted: detection.bbox,
            bbox_history: VecDeque::with_capacity(limits.bbox),
            appearance_history: VecDeque::with_capacity(limits.appearance),
            size_history: VecDeque::with_capacity(limits.size),
            limits,
            hits: 0,
            age: 0,
            time_since_update: 0,
            first_seen_frame: frame_id,
            last_seen_frame: frame_id,
        };
        track.record(detection, descriptor, frame_id);
        track
    }

    /// Advance the motion model by one frame. Every live track is predicted
    /// once per frame, detection or not.
    pub(crate) fn predict(&mut self, kalman_filter: &KalmanFilter) {
        self.predicted = self.predictor.predict(kalman_filter);
        self.age += 1;
    }

    /// Apply a matched detection. Returns `true` if this update confirmed the
    /// track.
    pub(crate) fn update(
        &mut self,
        detection: &Detection,
        descriptor: Option<Descriptor>,
        kalman_filter: &KalmanFilter,
        frame_id: u64,
        min_hits: u32,
    ) -> bool {
        self.predictor.update(kalman_filter, &detection.bbox);
        self.record(detection, descriptor, frame_id);
        self.promote(min_hits)
    }

    /// Tentative -> Confirmed once `hits` reaches `min_hits`.
    pub(crate) fn promote(&mut self, min_hits: u32) -> bool {
        if self.state == TrackState::Tentative && self.hits >= min_hits {
            self.state = TrackState::Confirmed;
            return true;
        }
        false
    }

    /// Bring a deleted track back under its old id. The motion model restarts
    /// at the new observation since the old estimate is stale.
    pub(crate) fn re_activate(
        &mut self,
        detection: &Detection,
        descriptor: Option<Descriptor>,
        kalman_filter: &KalmanFilter,
        frame_id: u64,
    ) {
        self.predictor = kalman_filter.initiate(&detection.bbox);
        self.predicted = detection.bbox;
        self.state = TrackState::Confirmed;
        self.age = frame_id.saturating_sub(self.first_seen_frame);
        self.record(detection, descriptor, frame_id);
    }

    pub(crate) fn mark_missed(&mut self) {
        self.time_since_update += 1;
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.state = TrackState::Deleted;
    }

    fn record(&mut self, detection: &Detection, descriptor: Option<Descriptor>, frame_id: u64) {
        self.hits += 1;
        self.time_since_update = 0;
        self.last_seen_frame = frame_id;
        self.confidence = detection.confidence;

        push_bounded(&mut self.bbox_history, detection.bbox, self.limits.bbox);
        push_bounded(&mut self.size_history, detection.bbox.area(), self.limits.size);
        if let Some(descriptor) = descriptor.filter(Descriptor::is_valid) {
            push_bounded(&mut self.appearance_history, descriptor, self.limits.appearance);
        }
    }

    pub fn track_id(&self) -> u64 {
        self.track_id
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Confidence of the last matched detection.
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Successful updates since creation, the first detection included.
    pub fn hits(&self) -> u32 {
        self.hits
    }

    /// Frames since creation.
    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn time_since_update(&self) -> u32 {
        self.time_since_update
    }

    pub fn first_seen_frame(&self) -> u64 {
        self.first_seen_frame
    }

    pub fn last_seen_frame(&self) -> u64 {
        self.last_seen_frame
    }

    /// Whether the track was matched on the most recent frame.
    pub fn is_updated(&self) -> bool {
        self.time_since_update == 0
    }

    /// Motion-model prediction for the current frame.
    pub fn predicted_bbox(&self) -> Rect {
        self.predicted
    }

    /// Current state estimate.
    pub fn bbox(&self) -> Rect {
        self.predictor.bbox()
    }

    /// Last observed (detected) box.
    pub fn last_bbox(&self) -> Rect {
        self.bbox_history.back().copied().unwrap_or(self.predicted)
    }

    pub fn bbox_history(&self) -> impl DoubleEndedIterator<Item = &Rect> {
        self.bbox_history.iter()
    }

    pub fn appearance_history(&self) -> impl Iterator<Item = &Descriptor> {
        self.appearance_history.iter()
    }

    pub fn has_appearance(&self) -> bool {
        !self.appearance_history.is_empty()
    }

    /// Mean area over the size history.
    pub fn mean_area(&self) -> f32 {
        if self.size_history.is_empty() {
            return self.last_bbox().area();
        }
        self.size_history.iter().sum::<f32>() / self.size_history.len() as f32
    }

    pub fn velocity(&self) -> (f32, f32) {
        self.predictor.velocity()
    }
}

fn push_bounded<T>(buf: &mut VecDeque<T>, item: T, cap: usize) {
    while buf.len() >= cap.max(1) {
        buf.pop_front();
    }
    buf.push_back(item);
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: HistoryLimits = HistoryLimits {
        bbox: 3,
        appearance: 2,
        size: 2,
    };

    fn det(x: f32) -> Detection {
        Detection::new(x, 100.0, x + 60.0, 250.0, 0.9, "person")
    }

    #[test]
    fn test_new_track_is_tentative_with_one_hit() {
        let kf = KalmanFilter::new();
        let t = Track::new(7, &det(100.0), None, &kf, 1, LIMITS);
        assert_eq!(t.track_id(), 7);
        assert_eq!(t.state(), TrackState::Tentative);
        assert_eq!(t.hits(), 1);
        assert_eq!(t.age(), 0);
        assert_eq!(t.first_seen_frame(), 1);
        assert!(t.is_updated());
    }

    #[test]
    fn test_confirmed_exactly_at_min_hits() {
        let kf = KalmanFilter::new();
        let mut t = Track::new(1, &det(100.0), None, &kf, 1, LIMITS);
        t.predict(&kf);
        assert!(!t.update(&det(105.0), None, &kf, 2, 3));
        assert_eq!(t.state(), TrackState::Tentative);
        t.predict(&kf);
        assert!(t.update(&det(110.0), None, &kf, 3, 3));
        assert_eq!(t.state(), TrackState::Confirmed);
        t.predict(&kf);
        assert!(!t.update(&det(115.0), None, &kf, 4, 3));
        assert_eq!(t.hits(), 4);
    }

    #[test]
    fn test_missed_frames_accumulate() {
        let kf = KalmanFilter::new();
        let mut t = Track::new(1, &det(100.0), None, &kf, 1, LIMITS);
        for _ in 0..3 {
            t.predict(&kf);
            t.mark_missed();
        }
        assert_eq!(t.time_since_update(), 3);
        assert_eq!(t.age(), 3);
        assert!(!t.is_updated());
        t.predict(&kf);
        t.update(&det(100.0), None, &kf, 5, 3);
        assert_eq!(t.time_since_update(), 0);
    }

    #[test]
    fn test_histories_are_bounded() {
        let kf = KalmanFilter::new();
        let mut t = Track::new(1, &det(0.0), Some(Descriptor::neutral()), &kf, 1, LIMITS);
        for i in 1..10 {
            t.predict(&kf);
            t.update(&det(i as f32), None, &kf, 1 + i as u64, 3);
        }
        assert_eq!(t.bbox_history().count(), 3);
        assert_eq!(t.last_bbox(), det(9.0).bbox);
        // neutral descriptors are never stored
        assert!(!t.has_appearance());
    }

    #[test]
    fn test_re_activate_age_spans_long_streams() {
        let kf = KalmanFilter::new();
        let mut t = Track::new(1, &det(100.0), None, &kf, 1, LIMITS);
        t.mark_deleted();
        let frame = u32::MAX as u64 + 10;
        t.re_activate(&det(100.0), None, &kf, frame);
        assert_eq!(t.age(), frame - 1);
        assert!(t.is_confirmed());
        assert_eq!(t.first_seen_frame(), 1);
    }

    #[test]
    fn test_mean_area_tracks_recent_sizes() {
        let kf = KalmanFilter::new();
        let mut t = Track::new(1, &Detection::new(0.0, 0.0, 10.0, 10.0, 0.9, "person"), None, &kf, 1, LIMITS);
        t.update(&Detection::new(0.0, 0.0, 20.0, 10.0, 0.9, "person"), None, &kf, 2, 3);
        t.update(&Detection::new(0.0, 0.0, 40.0, 10.0, 0.9, "person"), None, &kf, 3, 3);
        // size history keeps the last two: 200 and 400
        assert!((t.mean_area() - 300.0).abs() < 1e-3);
    }
}
