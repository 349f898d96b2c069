//! Polygon fences: membership, enter/exit events and trigger-mode filtering.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::detection::Detection;
use crate::geometry::{Point, Polygon};

/// Which side of the fence keeps a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    #[default]
    Inside,
    Outside,
}

/// Caller-supplied fence for one frame.
///
/// JSON layout: `{"enabled": true, "polygons": [[{"x":0,"y":0}, ...]],
/// "trigger_mode": "inside"}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FenceConfig {
    pub enabled: bool,
    pub polygons: Vec<Polygon>,
    pub trigger_mode: TriggerMode,
    /// Points are fractions of the image size rather than pixels.
    pub normalized: bool,
}

impl FenceConfig {
    pub fn new(polygons: Vec<Polygon>, trigger_mode: TriggerMode) -> Self {
        Self {
            enabled: true,
            polygons,
            trigger_mode,
            normalized: false,
        }
    }

    pub fn normalized(mut self) -> Self {
        self.normalized = true;
        self
    }

    pub fn is_active(&self) -> bool {
        self.enabled && !self.polygons.is_empty()
    }

    /// Pixel-space polygons, or `None` if any polygon is degenerate or the
    /// fence is normalized and the image size is unknown.
    pub fn resolve(&self, image_size: Option<(u32, u32)>) -> Option<Vec<Polygon>> {
        if let Some(bad) = self.polygons.iter().position(|p| !p.is_valid()) {
            warn!(polygon = bad, "fence polygon needs at least 3 finite points");
            return None;
        }
        if !self.normalized {
            return Some(self.polygons.clone());
        }
        let Some((width, height)) = image_size else {
            warn!("normalized fence without an image size");
            return None;
        };
        Some(
            self.polygons
                .iter()
                .map(|p| p.scaled(width as f32, height as f32))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FenceEventType {
    Enter,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FenceEvent {
    pub track_id: u64,
    pub event_type: FenceEventType,
    pub point: Point,
    pub frame_id: u64,
}

/// Maps a detection to the point tested against fences.
pub trait KeyPointPolicy: Send {
    fn key_point(&self, detection: &Detection) -> Point;
}

impl<F> KeyPointPolicy for F
where
    F: Fn(&Detection) -> Point + Send,
{
    fn key_point(&self, detection: &Detection) -> Point {
        self(detection)
    }
}

/// Middle of the bottom edge, where a standing person touches the ground.
#[derive(Debug, Clone, Copy, Default)]
pub struct BottomCenter;

impl KeyPointPolicy for BottomCenter {
    fn key_point(&self, detection: &Detection) -> Point {
        detection.bbox.bottom_center().into()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BoxCenter;

impl KeyPointPolicy for BoxCenter {
    fn key_point(&self, detection: &Detection) -> Point {
        detection.bbox.center().into()
    }
}

/// Bottom-center for the listed classes, box center for everything else.
#[derive(Debug, Clone)]
pub struct ClassAwareKeyPoint {
    pub bottom_center_classes: Vec<String>,
}

impl Default for ClassAwareKeyPoint {
    fn default() -> Self {
        Self {
            bottom_center_classes: vec!["person".to_string()],
        }
    }
}

impl KeyPointPolicy for ClassAwareKeyPoint {
    fn key_point(&self, detection: &Detection) -> Point {
        if self
            .bottom_center_classes
            .iter()
            .any(|c| *c == detection.class_name)
        {
            BottomCenter.key_point(detection)
        } else {
            BoxCenter.key_point(detection)
        }
    }
}

#[derive(Debug, Clone)]
struct FenceState {
    inside: bool,
    last_enter: Option<u64>,
    last_exit: Option<u64>,
    /// Crossing made while the track was tentative, not yet reported.
    pending: Option<FenceEvent>,
}

/// Result of observing one track against the fence.
#[derive(Debug, Clone, PartialEq)]
pub struct FenceObservation {
    pub inside: bool,
    /// Set only on the frame the track crossed the boundary.
    pub event: Option<FenceEvent>,
    /// Whether the track satisfies the trigger mode.
    pub triggered: bool,
}

/// Remembers which side of the fence every track was on last frame.
#[derive(Debug, Clone, Default)]
pub struct GeofenceEvaluator {
    states: HashMap<u64, FenceState>,
    recent_window: u64,
}

impl GeofenceEvaluator {
    pub fn new(recent_window: u64) -> Self {
        Self {
            states: HashMap::new(),
            recent_window,
        }
    }

    /// Inside if any polygon contains the point.
    pub fn is_inside(polygons: &[Polygon], point: Point) -> bool {
        polygons.iter().any(|p| p.contains(point))
    }

    /// Stateless trigger check, for detections without a track.
    pub fn matches_mode(polygons: &[Polygon], point: Point, mode: TriggerMode) -> bool {
        let inside = Self::is_inside(polygons, point);
        match mode {
            TriggerMode::Inside => inside,
            TriggerMode::Outside => !inside,
        }
    }

    /// Update a track's side of the fence.
    ///
    /// The first observation of a track only records its side. Afterwards
    /// every change of side yields exactly one event. Tentative tracks are
    /// followed from their first frame, but their crossings are held back and
    /// reported on the first frame the track is observed as confirmed. A
    /// crossing undone before confirmation is never reported.
    pub fn observe(
        &mut self,
        track_id: u64,
        point: Point,
        polygons: &[Polygon],
        mode: TriggerMode,
        frame_id: u64,
        confirmed: bool,
    ) -> FenceObservation {
        let inside = Self::is_inside(polygons, point);

        let state = self.states.entry(track_id).or_insert(FenceState {
            inside,
            last_enter: None,
            last_exit: None,
            pending: None,
        });
        if state.inside != inside {
            state.inside = inside;
            let event_type = if inside {
                state.last_enter = Some(frame_id);
                FenceEventType::Enter
            } else {
                state.last_exit = Some(frame_id);
                FenceEventType::Exit
            };
            debug!(track_id, frame_id, ?event_type, confirmed, "fence crossing");
            state.pending = match state.pending.take() {
                Some(_) => None,
                None => Some(FenceEvent {
                    track_id,
                    event_type,
                    point,
                    frame_id,
                }),
            };
        }

        let event = if confirmed {
            state.pending.take().map(|e| FenceEvent { frame_id, ..e })
        } else {
            None
        };

        let recent = |at: Option<u64>| at.is_some_and(|f| frame_id.saturating_sub(f) <= self.recent_window);
        let triggered = match mode {
            TriggerMode::Inside => inside || recent(state.last_enter),
            TriggerMode::Outside => !inside || recent(state.last_exit),
        };

        FenceObservation {
            inside,
            event,
            triggered,
        }
    }

    /// Drop state of tracks for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(u64) -> bool) {
        self.states.retain(|&id, _| keep(id));
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}
