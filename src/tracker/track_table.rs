use std::collections::HashMap;

use crate::tracker::track::Track;

/// Dense array of live tracks plus an id -> slot index.
///
/// Removal swaps the last slot into the hole, so iteration order is not
/// creation order.
#[derive(Debug, Default, Clone)]
pub struct TrackTable {
    tracks: Vec<Track>,
    index: HashMap<u64, usize>,
}

impl TrackTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn contains(&self, track_id: u64) -> bool {
        self.index.contains_key(&track_id)
    }

    pub fn insert(&mut self, track: Track) {
        let id = track.track_id();
        if let Some(&slot) = self.index.get(&id) {
            self.tracks[slot] = track;
            return;
        }
        self.index.insert(id, self.tracks.len());
        self.tracks.push(track);
    }

    pub fn get(&self, track_id: u64) -> Option<&Track> {
        self.index.get(&track_id).map(|&slot| &self.tracks[slot])
    }

    pub(crate) fn get_mut(&mut self, track_id: u64) -> Option<&mut Track> {
        let slot = *self.index.get(&track_id)?;
        self.tracks.get_mut(slot)
    }

    pub(crate) fn remove(&mut self, track_id: u64) -> Option<Track> {
        let slot = self.index.remove(&track_id)?;
        let track = self.tracks.swap_remove(slot);
        if let Some(moved) = self.tracks.get(slot) {
            self.index.insert(moved.track_id(), slot);
        }
        Some(track)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.tracks.iter_mut()
    }

    /// Slot-ordered slice, the row order of the cost matrix.
    pub fn as_slice(&self) -> &[Track] {
        &self.tracks
    }

    pub(crate) fn clear(&mut self) {
        self.tracks.clear();
        self.index.clear();
    }
}
