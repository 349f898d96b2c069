//! Frame-level safety summary. The rules are a pluggable policy; the engine
//! only supplies the counts and events it produced.

use serde::Serialize;

use crate::analytics::{DwellEvent, FenceEvent, FenceEventType, ProximityPair};

/// What a [`SafetyPolicy`] gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct SafetyInput<'a> {
    pub frame_id: u64,
    /// Confirmed tracks seen this frame.
    pub count: usize,
    pub dwell_events: &'a [DwellEvent],
    pub fence_events: &'a [FenceEvent],
    pub proximity_pairs: &'a [ProximityPair],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SafetyMetrics {
    pub count: usize,
    /// 0 = normal, 1 = warning, 2 = alarm
    pub alert_level: u8,
    pub alert_triggered: bool,
    pub description: String,
}

pub trait SafetyPolicy: Send {
    fn assess(&self, input: &SafetyInput<'_>) -> SafetyMetrics;
}

/// Default policy: too many objects is an alarm; lingering, crowding and
/// fence entries are warnings.
#[derive(Debug, Clone, Copy)]
pub struct CrowdSafetyPolicy {
    pub max_count: usize,
}

impl CrowdSafetyPolicy {
    pub fn new(max_count: usize) -> Self {
        Self { max_count }
    }
}

impl SafetyPolicy for CrowdSafetyPolicy {
    fn assess(&self, input: &SafetyInput<'_>) -> SafetyMetrics {
        let mut level = 0u8;
        let mut reasons = Vec::new();

        if input.count > self.max_count {
            level = 2;
            reasons.push(format!("{} objects exceed the limit of {}", input.count, self.max_count));
        }
        if !input.dwell_events.is_empty() {
            level = level.max(1);
            reasons.push(format!("{} lingering", input.dwell_events.len()));
        }
        if !input.proximity_pairs.is_empty() {
            level = level.max(1);
            reasons.push(format!("{} close pairs", input.proximity_pairs.len()));
        }
        let entries = input
            .fence_events
            .iter()
            .filter(|e| e.event_type == FenceEventType::Enter)
            .count();
        if entries > 0 {
            level = level.max(1);
            reasons.push(format!("{entries} fence entries"));
        }

        let description = if reasons.is_empty() {
            format!("{} objects, normal", input.count)
        } else {
            reasons.join("; ")
        };

        SafetyMetrics {
            count: input.count,
            alert_level: level,
            alert_triggered: level > 0,
            description,
        }
    }
}
