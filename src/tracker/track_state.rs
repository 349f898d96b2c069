use serde::Serialize;

/// Track state enumeration for object tracking lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    /// Newly created track, not yet confirmed
    #[default]
    Tentative,
    /// Seen on enough frames to be reported downstream
    Confirmed,
    /// Removed from tracking
    Deleted,
}
