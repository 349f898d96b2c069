mod cost;
mod kalman_filter;
mod manager;
mod matching;
mod recovery;
mod track;
mod track_state;
mod track_table;

pub use cost::{
    CostMatrixBuilder, INFEASIBLE, appearance_cost, center_cost, iou_cost, overlapping, position_cost,
    size_cost,
};
pub use kalman_filter::{KalmanFilter, MotionPredictor};
pub use manager::{Assignment, AssignmentKind, TrackManager, TrackUpdate, TrackerStats};
pub use matching::{
    AssignmentError, AssignmentResult, Associator, FallbackAssociator, GreedyAssociator,
    OptimalAssociator, associator_for,
};
pub use recovery::{RecoveryBuffer, recovery_similarity};
pub use track::{HistoryLimits, Track};
pub use track_state::TrackState;
pub use track_table::TrackTable;
