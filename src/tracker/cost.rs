//! Fused track-to-detection association cost.

use ndarray::Array2;

use crate::appearance::Descriptor;
use crate::config::TrackerConfig;
use crate::detection::Detection;
use crate::geometry::{Rect, iou_batch};
use crate::tracker::track::Track;

/// Cost assigned to pairs that must never be matched.
pub const INFEASIBLE: f32 = 1e6;

/// `1 - IoU`.
#[inline]
pub fn iou_cost(iou: f32) -> f32 {
    1.0 - iou
}

/// Center distance normalized by `max_distance`, saturating at 1.
#[inline]
pub fn center_cost(predicted: &Rect, detection: &Rect, max_distance: f32) -> f32 {
    (predicted.center_distance(detection) / max_distance).min(1.0)
}

/// Penalty for an area that deviates from the track's mean area.
///
/// Deviations within `tolerance` (crouching, bending, partial occlusion) are
/// penalized lightly; larger ones grow faster and saturate at 1.
pub fn size_cost(mean_area: f32, area: f32, tolerance: f32) -> f32 {
    if mean_area <= 0.0 {
        return 0.0;
    }
    let ratio = (area - mean_area).abs() / mean_area;
    if ratio <= tolerance {
        ratio * 0.5
    } else {
        (ratio * 0.8).min(1.0)
    }
}

/// `1 - best similarity` against the track's descriptor history, or `None`
/// when either side has no usable descriptor.
pub fn appearance_cost(track: &Track, descriptor: Option<&Descriptor>) -> Option<f32> {
    let descriptor = descriptor?;
    if !track.has_appearance() {
        return None;
    }
    descriptor
        .best_similarity(track.appearance_history())
        .map(|sim| 1.0 - sim)
}

/// Distance between a detection and the spot the track's last two observed
/// centers extrapolate to, normalized by `max_distance` and saturating at 1.
///
/// Tracks with fewer than two observations score 0.5.
pub fn position_cost(track: &Track, detection: &Rect, max_distance: f32) -> f32 {
    let mut recent = track.bbox_history().rev();
    let (Some(last), Some(prev)) = (recent.next(), recent.next()) else {
        return 0.5;
    };
    let (lx, ly) = last.center();
    let (px, py) = prev.center();
    let (ex, ey) = (2.0 * lx - px, 2.0 * ly - py);
    let (dx, dy) = detection.center();
    (((dx - ex).powi(2) + (dy - ey).powi(2)).sqrt() / max_distance).min(1.0)
}

/// Marks detections that overlap at least one other detection by more than
/// `threshold` IoU.
pub fn overlapping(detections: &[Rect], threshold: f32) -> Vec<bool> {
    let ious = iou_batch(detections, detections);
    (0..detections.len())
        .map(|i| (0..detections.len()).any(|j| i != j && ious[[i, j]] > threshold))
        .collect()
}

/// Builds the (tracks x detections) cost matrix.
#[derive(Debug, Clone, Copy)]
pub struct CostMatrixBuilder<'a> {
    config: &'a TrackerConfig,
}

impl<'a> CostMatrixBuilder<'a> {
    pub fn new(config: &'a TrackerConfig) -> Self {
        Self { config }
    }

    /// Row `i` is `tracks[i]`, column `j` is `detections[j]`.
    ///
    /// `descriptors` is either empty (no image this frame) or parallel to
    /// `detections`. Ineligible pairs hold [`INFEASIBLE`]. Detections that
    /// overlap each other also pay for straying from each track's recent
    /// path, which keeps identities apart while people cross.
    pub fn build(
        &self,
        tracks: &[Track],
        detections: &[Detection],
        descriptors: &[Option<Descriptor>],
    ) -> Array2<f32> {
        let predicted: Vec<Rect> = tracks.iter().map(Track::predicted_bbox).collect();
        let det_boxes: Vec<Rect> = detections.iter().map(|d| d.bbox).collect();
        let ious = iou_batch(&predicted, &det_boxes);
        let crowded = overlapping(&det_boxes, self.config.overlap_threshold);

        let mut costs = Array2::from_elem((tracks.len(), detections.len()), INFEASIBLE);
        for (i, track) in tracks.iter().enumerate() {
            for (j, det) in detections.iter().enumerate() {
                let descriptor = descriptors.get(j).and_then(Option::as_ref);
                costs[[i, j]] = self.pair_cost(
                    track,
                    &predicted[i],
                    det,
                    ious[[i, j]],
                    descriptor,
                    crowded[j],
                );
            }
        }
        costs
    }

    fn pair_cost(
        &self,
        track: &Track,
        predicted: &Rect,
        det: &Detection,
        iou: f32,
        descriptor: Option<&Descriptor>,
        crowded: bool,
    ) -> f32 {
        let cfg = self.config;
        if track.class_name() != det.class_name {
            return INFEASIBLE;
        }

        let distance = predicted.center_distance(&det.bbox);
        if iou < cfg.iou_threshold && distance > cfg.center_distance_threshold {
            return INFEASIBLE;
        }

        let w = &cfg.weights;
        let mut cost = w.iou * iou_cost(iou)
            + w.center * center_cost(predicted, &det.bbox, cfg.center_distance_threshold)
            + w.size * size_cost(track.mean_area(), det.bbox.area(), cfg.size_change_tolerance);

        let total = w.iou + w.center + w.size + w.appearance;
        match appearance_cost(track, descriptor) {
            Some(app) => cost += w.appearance * app,
            None => {
                // Spread the appearance weight over the remaining terms.
                let used = total - w.appearance;
                cost = if used > 0.0 {
                    cost * total / used
                } else {
                    iou_cost(iou) * total
                };
            }
        }

        if crowded {
            cost += cfg.overlap_weight * position_cost(track, &det.bbox, cfg.overlap_distance);
        }

        if !cost.is_finite() || cost >= cfg.reject_threshold {
            INFEASIBLE
        } else {
            cost
        }
    }
}
