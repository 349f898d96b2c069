//! Track lifecycle: predict, associate, update, delete, recover, create.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::appearance::Descriptor;
use crate::config::TrackerConfig;
use crate::detection::Detection;
use crate::error::ConfigError;
use crate::tracker::cost::CostMatrixBuilder;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{Associator, AssignmentResult, GreedyAssociator, associator_for};
use crate::tracker::recovery::RecoveryBuffer;
use crate::tracker::track::{HistoryLimits, Track};
use crate::tracker::track_state::TrackState;
use crate::tracker::track_table::TrackTable;

/// How a detection was attached to its track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    /// Matched to a live track.
    Matched,
    /// Re-identified as a recently deleted track.
    Recovered,
    /// Started a new tentative track.
    Created,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    /// Index into the detection slice passed to [`TrackManager::update`].
    pub detection_index: usize,
    pub track_id: u64,
    pub kind: AssignmentKind,
}

/// What one call to [`TrackManager::update`] did.
#[derive(Debug, Clone, Default)]
pub struct TrackUpdate {
    pub frame_id: u64,
    pub assignments: Vec<Assignment>,
    /// Tracks deleted this frame.
    pub deleted: Vec<u64>,
    /// Tracks that left the recovery buffer for good this frame.
    pub expired: Vec<u64>,
    /// Detections dropped for an invalid box or low confidence.
    pub rejected: usize,
}

impl TrackUpdate {
    /// Track the given detection was assigned to, if any.
    pub fn track_for(&self, detection_index: usize) -> Option<&Assignment> {
        self.assignments
            .iter()
            .find(|a| a.detection_index == detection_index)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    pub frames_processed: u64,
    pub current_frame: u64,
    pub active_tracks: usize,
    pub confirmed_tracks: usize,
    pub tentative_tracks: usize,
    pub buffered_tracks: usize,
    pub next_track_id: u64,
}

/// Owns every track of one video stream.
///
/// Frames must be fed in order. Nothing here is shared, so independent
/// streams use independent managers.
pub struct TrackManager {
    config: TrackerConfig,
    kalman_filter: KalmanFilter,
    associator: Box<dyn Associator>,
    tracks: TrackTable,
    recovery: RecoveryBuffer,
    next_id: u64,
    frame_id: u64,
    frames_processed: u64,
}

impl TrackManager {
    pub fn new(config: TrackerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let associator = associator_for(config.associator);
        Ok(Self {
            config,
            kalman_filter: KalmanFilter::new(),
            associator,
            tracks: TrackTable::new(),
            recovery: RecoveryBuffer::new(),
            next_id: 1,
            frame_id: 0,
            frames_processed: 0,
        })
    }

    /// Replace the assignment solver.
    pub fn with_associator(mut self, associator: Box<dyn Associator>) -> Self {
        self.associator = associator;
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Process one frame.
    ///
    /// `descriptors` is either empty or parallel to `detections`. Every live
    /// track is predicted even when `detections` is empty.
    pub fn update(
        &mut self,
        frame_id: u64,
        detections: &[Detection],
        descriptors: &[Option<Descriptor>],
    ) -> TrackUpdate {
        if frame_id <= self.frame_id && self.frames_processed > 0 {
            warn!(frame_id, last = self.frame_id, "frame id did not advance");
        }
        self.frame_id = frame_id;
        self.frames_processed += 1;

        let mut out = TrackUpdate {
            frame_id,
            ..Default::default()
        };

        let eligible: Vec<usize> = detections
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_valid() && d.confidence >= self.config.min_confidence_for_track)
            .map(|(i, _)| i)
            .collect();
        out.rejected = detections.len() - eligible.len();
        if out.rejected > 0 {
            debug!(frame_id, rejected = out.rejected, "dropped detections");
        }

        let dets: Vec<Detection> = eligible.iter().map(|&i| detections[i].clone()).collect();
        let descs: Vec<Option<Descriptor>> = if descriptors.is_empty() {
            Vec::new()
        } else {
            eligible
                .iter()
                .map(|&i| descriptors.get(i).cloned().flatten())
                .collect()
        };

        for track in self.tracks.iter_mut() {
            track.predict(&self.kalman_filter);
        }

        let AssignmentResult {
            matches,
            unmatched_tracks,
            unmatched_detections,
        } = self.associate(&dets, &descs);

        // Rows follow the table's slot order, which mutation below disturbs.
        let row_ids: Vec<u64> = self.tracks.iter().map(Track::track_id).collect();

        for (row, col) in matches {
            let track_id = row_ids[row];
            let descriptor = descs.get(col).cloned().flatten();
            if let Some(track) = self.tracks.get_mut(track_id) {
                let confirmed = track.update(
                    &dets[col],
                    descriptor,
                    &self.kalman_filter,
                    frame_id,
                    self.config.min_hits,
                );
                if confirmed {
                    info!(track_id, frame_id, "track confirmed");
                }
            }
            out.assignments.push(Assignment {
                detection_index: eligible[col],
                track_id,
                kind: AssignmentKind::Matched,
            });
        }

        for row in unmatched_tracks {
            let track_id = row_ids[row];
            if self.miss(track_id, frame_id) {
                out.deleted.push(track_id);
            }
        }

        for col in unmatched_detections {
            let descriptor = descs.get(col).cloned().flatten();
            let (track_id, kind) = self.recover_or_create(&dets[col], descriptor, frame_id);
            out.assignments.push(Assignment {
                detection_index: eligible[col],
                track_id,
                kind,
            });
        }

        out.expired = self.recovery.prune(frame_id, self.config.max_disappeared);
        if !out.expired.is_empty() {
            debug!(frame_id, expired = ?out.expired, "recovery buffer pruned");
        }
        out.assignments.sort_by_key(|a| a.detection_index);
        out
    }

    fn associate(&self, dets: &[Detection], descs: &[Option<Descriptor>]) -> AssignmentResult {
        let costs = CostMatrixBuilder::new(&self.config).build(self.tracks.as_slice(), dets, descs);
        let thresh = self.config.reject_threshold;
        match self.associator.solve(&costs, thresh) {
            Ok(result) => result,
            Err(err) => {
                warn!(solver = self.associator.name(), %err, "assignment failed, using greedy");
                GreedyAssociator.solve(&costs, thresh).unwrap_or_default()
            }
        }
    }

    /// Register a missed frame. Returns `true` if the track was deleted.
    fn miss(&mut self, track_id: u64, frame_id: u64) -> bool {
        let Some(track) = self.tracks.get_mut(track_id) else {
            return false;
        };
        track.mark_missed();

        let expired = match track.state() {
            TrackState::Tentative => true,
            TrackState::Confirmed => track.time_since_update() > self.config.max_age,
            TrackState::Deleted => true,
        };
        if !expired {
            return false;
        }

        let Some(mut track) = self.tracks.remove(track_id) else {
            return false;
        };
        let was_confirmed = track.is_confirmed();
        track.mark_deleted();
        if was_confirmed && self.config.enable_id_recovery {
            info!(track_id, frame_id, "track deleted, kept for recovery");
            self.recovery.push(track, frame_id);
        } else {
            debug!(track_id, frame_id, confirmed = was_confirmed, "track deleted");
        }
        true
    }

    fn recover_or_create(
        &mut self,
        det: &Detection,
        descriptor: Option<Descriptor>,
        frame_id: u64,
    ) -> (u64, AssignmentKind) {
        if self.config.enable_id_recovery {
            let recovered =
                self.recovery
                    .recover(det, descriptor.as_ref(), frame_id, &self.config);
            if let Some(mut track) = recovered {
                let track_id = track.track_id();
                track.re_activate(det, descriptor, &self.kalman_filter, frame_id);
                self.tracks.insert(track);
                info!(track_id, frame_id, "track recovered");
                return (track_id, AssignmentKind::Recovered);
            }
        }

        let track_id = self.next_id;
        self.next_id += 1;
        let mut track = Track::new(
            track_id,
            det,
            descriptor,
            &self.kalman_filter,
            frame_id,
            self.history_limits(),
        );
        if track.promote(self.config.min_hits) {
            info!(track_id, frame_id, "track confirmed");
        }
        debug!(track_id, frame_id, class = %det.class_name, "track created");
        self.tracks.insert(track);
        (track_id, AssignmentKind::Created)
    }

    fn history_limits(&self) -> HistoryLimits {
        HistoryLimits {
            bbox: self.config.bbox_history_len,
            appearance: self.config.appearance_history_len,
            size: self.config.size_history_len,
        }
    }

    pub fn track(&self, track_id: u64) -> Option<&Track> {
        self.tracks.get(track_id)
    }

    /// Every live track, tentative ones included.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    /// Tracks visible to downstream consumers.
    pub fn confirmed_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| t.is_confirmed())
    }

    /// Whether the id is live or still recoverable.
    pub fn is_known(&self, track_id: u64) -> bool {
        self.tracks.contains(track_id) || self.recovery.contains(track_id)
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn stats(&self) -> TrackerStats {
        let confirmed = self.confirmed_tracks().count();
        TrackerStats {
            frames_processed: self.frames_processed,
            current_frame: self.frame_id,
            active_tracks: self.tracks.len(),
            confirmed_tracks: confirmed,
            tentative_tracks: self.tracks.len() - confirmed,
            buffered_tracks: self.recovery.len(),
            next_track_id: self.next_id,
        }
    }

    /// Forget all tracks. Ids keep increasing so they are never reused.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.recovery.clear();
        self.frame_id = 0;
        self.frames_processed = 0;
        info!(next_id = self.next_id, "tracker reset");
    }
}
