//! Short-lived buffer of deleted tracks that may be re-identified.

use tracing::debug;

use crate::appearance::Descriptor;
use crate::config::TrackerConfig;
use crate::detection::Detection;
use crate::tracker::track::Track;

#[derive(Debug, Clone)]
struct Disappeared {
    track: Track,
    deleted_at: u64,
}

/// Deleted confirmed tracks, kept for `max_disappeared` frames.
#[derive(Debug, Clone, Default)]
pub struct RecoveryBuffer {
    entries: Vec<Disappeared>,
}

impl RecoveryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, track_id: u64) -> bool {
        self.entries.iter().any(|e| e.track.track_id() == track_id)
    }

    pub fn track_ids(&self) -> impl Iterator<Item = u64> {
        self.entries.iter().map(|e| e.track.track_id())
    }

    pub(crate) fn push(&mut self, track: Track, frame_id: u64) {
        self.entries.push(Disappeared {
            track,
            deleted_at: frame_id,
        });
    }

    /// Drop entries deleted more than `max_disappeared` frames ago; returns
    /// their ids.
    pub(crate) fn prune(&mut self, frame_id: u64, max_disappeared: u32) -> Vec<u64> {
        let mut expired = Vec::new();
        self.entries.retain(|e| {
            let keep = frame_id.saturating_sub(e.deleted_at) <= max_disappeared as u64;
            if !keep {
                expired.push(e.track.track_id());
            }
            keep
        });
        expired
    }

    /// Take the buffered track that best explains `detection`, if any clears
    /// the similarity floor. Only tracks deleted within the last
    /// `max_disappeared / 2` frames are candidates. When both sides carry
    /// descriptors, the best appearance match must clear the floor as well.
    pub(crate) fn recover(
        &mut self,
        detection: &Detection,
        descriptor: Option<&Descriptor>,
        frame_id: u64,
        config: &TrackerConfig,
    ) -> Option<Track> {
        let window = (config.max_disappeared / 2) as u64;
        let floor = config.appearance_similarity_threshold;

        let (slot, similarity) = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| frame_id.saturating_sub(e.deleted_at) <= window)
            .filter(|(_, e)| e.track.class_name() == detection.class_name)
            .filter(|(_, e)| appearance_agrees(&e.track, descriptor, config))
            .map(|(slot, e)| (slot, recovery_similarity(&e.track, detection, descriptor, config)))
            .filter(|&(_, sim)| sim > floor)
            .max_by(|a, b| a.1.total_cmp(&b.1))?;

        let entry = self.entries.swap_remove(slot);
        debug!(
            track_id = entry.track.track_id(),
            similarity,
            gap = frame_id.saturating_sub(entry.deleted_at),
            "recovered track"
        );
        Some(entry.track)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Weighted position, size and (when both sides have descriptors) appearance
/// similarity between a deleted track's last observation and a detection,
/// normalized to [0, 1].
pub fn recovery_similarity(
    track: &Track,
    detection: &Detection,
    descriptor: Option<&Descriptor>,
    config: &TrackerConfig,
) -> f32 {
    let last = track.last_bbox();
    let w = &config.recovery_weights;

    let position = 1.0 - (last.center_distance(&detection.bbox) / config.recovery_distance).min(1.0);
    let size = size_similarity(last.area(), detection.bbox.area());

    let appearance = descriptor.and_then(|d| d.best_similarity(track.appearance_history()));
    match appearance {
        Some(app) if w.appearance > 0.0 => {
            (w.position * position + w.size * size + w.appearance * app)
                / (w.position + w.size + w.appearance)
        }
        _ => (w.position * position + w.size * size) / (w.position + w.size),
    }
}

/// False only when appearance is weighted and a comparable descriptor pair
/// falls below the similarity floor.
fn appearance_agrees(track: &Track, descriptor: Option<&Descriptor>, config: &TrackerConfig) -> bool {
    if config.recovery_weights.appearance <= 0.0 {
        return true;
    }
    descriptor
        .and_then(|d| d.best_similarity(track.appearance_history()))
        .is_none_or(|sim| sim >= config.appearance_similarity_threshold)
}

fn size_similarity(a: f32, b: f32) -> f32 {
    if a <= 0.0 || b <= 0.0 {
        return 0.0;
    }
    a.min(b) / a.max(b)
}
