use safetrack::tracker::AssignmentKind;
use safetrack::{Detection, Engine, EngineConfig, FrameInput, TrackManager, TrackState, TrackerConfig};

fn walker(frame: u64) -> Detection {
    let x = 100.0 + 5.0 * (frame - 1) as f32;
    Detection::new(x, 100.0, x + 60.0, 250.0, 0.9, "person")
}

#[test]
fn test_basic_tracking() {
    let mut tracker = TrackManager::new(TrackerConfig::default()).unwrap();

    // Frame 1: new tentative track
    let up = tracker.update(1, &[walker(1)], &[]);
    assert_eq!(up.assignments[0].kind, AssignmentKind::Created);
    let id = up.assignments[0].track_id;
    assert_eq!(tracker.confirmed_tracks().count(), 0);

    // Frames 2-3: matched, confirmed on the third hit
    for frame in 2..=3 {
        let up = tracker.update(frame, &[walker(frame)], &[]);
        assert_eq!(up.assignments[0].kind, AssignmentKind::Matched);
        assert_eq!(up.assignments[0].track_id, id);
    }
    assert_eq!(tracker.track(id).unwrap().state(), TrackState::Confirmed);

    // Frame 4: missed, the track survives
    let up = tracker.update(4, &[], &[]);
    assert!(up.deleted.is_empty());
    assert_eq!(tracker.track(id).unwrap().time_since_update(), 1);

    // Frame 5: seen again on the predicted path
    let up = tracker.update(5, &[walker(5)], &[]);
    assert_eq!(up.assignments[0].kind, AssignmentKind::Matched);
    assert_eq!(up.assignments[0].track_id, id);
}

#[test]
fn test_no_id_switch_for_smooth_motion() {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    let mut ids = Vec::new();
    for frame in 1..=40 {
        let out = engine.process_frame(FrameInput::new(frame, vec![walker(frame)]));
        assert_eq!(out.tracked_detections.len(), 1);
        ids.extend(out.tracked_detections[0].track_id);
    }
    assert_eq!(ids.len(), 38);
    assert!(ids.iter().all(|&id| id == 1));
    assert_eq!(engine.stats().next_track_id, 2);
}

#[test]
fn test_confirmed_at_frame_three_and_dwell_at_forty() {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    let mut confirmed_at = None;
    let mut last_dwell = 0;
    for frame in 1..=40 {
        let out = engine.process_frame(FrameInput::new(frame, vec![walker(frame)]));
        let det = &out.tracked_detections[0];
        if confirmed_at.is_none() && det.track_id.is_some() {
            confirmed_at = Some(frame);
        }
        if let Some(dwell) = det.dwell_time {
            assert!(dwell >= last_dwell, "dwell went backwards at frame {frame}");
            last_dwell = dwell;
        }
    }
    assert_eq!(confirmed_at, Some(3));

    let track = engine.tracker().track(1).unwrap();
    assert_eq!(track.first_seen_frame(), 1);
    assert_eq!(last_dwell, 40 - track.first_seen_frame());
}

#[test]
fn test_deleted_after_max_age() {
    let config = TrackerConfig {
        max_age: 15,
        ..Default::default()
    };
    let mut tracker = TrackManager::new(config).unwrap();
    for frame in 1..=20 {
        tracker.update(frame, &[walker(frame)], &[]);
    }

    let mut deleted_at = None;
    for frame in 21..=40 {
        let up = tracker.update(frame, &[], &[]);
        if up.deleted.contains(&1) {
            deleted_at = Some(frame);
            break;
        }
        assert_eq!(tracker.track(1).unwrap().state(), TrackState::Confirmed);
    }
    assert_eq!(deleted_at, Some(36));
    assert!(tracker.track(1).is_none());
}

#[test]
fn test_tracks_age_without_detections() {
    let mut tracker = TrackManager::new(TrackerConfig::default()).unwrap();
    for frame in 1..=3 {
        tracker.update(frame, &[walker(frame)], &[]);
    }
    let age = tracker.track(1).unwrap().age();
    tracker.update(4, &[], &[]);
    tracker.update(5, &[], &[]);
    assert_eq!(tracker.track(1).unwrap().age(), age + 2);
}

#[test]
fn test_id_recovery_after_deletion() {
    let config = TrackerConfig {
        max_age: 1,
        ..Default::default()
    };
    let mut tracker = TrackManager::new(config).unwrap();
    for frame in 1..=18 {
        tracker.update(frame, &[walker(frame)], &[]);
    }
    tracker.update(19, &[], &[]);
    let up = tracker.update(20, &[], &[]);
    assert_eq!(up.deleted, vec![1]);

    for frame in 21..=23 {
        tracker.update(frame, &[], &[]);
    }
    let up = tracker.update(24, &[walker(24)], &[]);
    assert_eq!(up.assignments[0].kind, AssignmentKind::Recovered);
    assert_eq!(up.assignments[0].track_id, 1);
    assert!(tracker.track(1).unwrap().is_confirmed());
    assert_eq!(tracker.stats().next_track_id, 2);
}

#[test]
fn test_no_recovery_after_window() {
    let config = TrackerConfig {
        max_age: 1,
        ..Default::default()
    };
    let mut tracker = TrackManager::new(config).unwrap();
    for frame in 1..=18 {
        tracker.update(frame, &[walker(frame)], &[]);
    }
    for frame in 19..=28 {
        tracker.update(frame, &[], &[]);
    }
    // deleted at 20, window is max_disappeared / 2 = 7 frames
    let up = tracker.update(29, &[walker(29)], &[]);
    assert_eq!(up.assignments[0].kind, AssignmentKind::Created);
    assert_eq!(up.assignments[0].track_id, 2);
}

#[test]
fn test_short_occlusion_keeps_id() {
    let mut tracker = TrackManager::new(TrackerConfig::default()).unwrap();
    for frame in 1..=30 {
        let dets = if (10..15).contains(&frame) {
            vec![]
        } else {
            vec![walker(frame)]
        };
        let up = tracker.update(frame, &dets, &[]);
        if let Some(a) = up.assignments.first() {
            assert_eq!(a.track_id, 1, "frame {frame}");
        }
    }
    assert_eq!(tracker.stats().active_tracks, 1);
}

#[test]
fn test_crouch_and_stand_keeps_id() {
    let standing = Detection::new(200.0, 150.0, 260.0, 300.0, 0.9, "person");
    let crouching = Detection::new(190.0, 190.0, 270.0, 270.0, 0.85, "person");
    let mut tracker = TrackManager::new(TrackerConfig::default()).unwrap();
    for frame in 1..=15 {
        let det = if (6..=10).contains(&frame) {
            crouching.clone()
        } else {
            standing.clone()
        };
        let up = tracker.update(frame, &[det], &[]);
        assert_eq!(up.assignments[0].track_id, 1, "frame {frame}");
    }
}

#[test]
fn test_two_walkers_in_opposite_lanes() {
    let mut tracker = TrackManager::new(TrackerConfig::default()).unwrap();
    for frame in 1..=20u64 {
        let dx = 4.0 * frame as f32;
        let east = Detection::new(50.0 + dx, 100.0, 110.0 + dx, 250.0, 0.9, "person");
        let west = Detection::new(500.0 - dx, 300.0, 560.0 - dx, 450.0, 0.9, "person");
        let up = tracker.update(frame, &[east, west], &[]);
        assert_eq!(up.track_for(0).unwrap().track_id, 1);
        assert_eq!(up.track_for(1).unwrap().track_id, 2);
    }
}

#[test]
fn test_crossing_walkers_keep_their_ids() {
    // paths meet at frame 15, where the boxes overlap with IoU 0.875
    let mut tracker = TrackManager::new(TrackerConfig::default()).unwrap();
    for frame in 1..=30u64 {
        let dx = 10.0 * frame as f32;
        let east = Detection::new(100.0 + dx, 100.0, 160.0 + dx, 250.0, 0.9, "person");
        let west = Detection::new(400.0 - dx, 110.0, 460.0 - dx, 260.0, 0.9, "person");
        let up = tracker.update(frame, &[east, west], &[]);
        assert_eq!(up.track_for(0).unwrap().track_id, 1, "frame {frame}");
        assert_eq!(up.track_for(1).unwrap().track_id, 2, "frame {frame}");
    }
    assert_eq!(tracker.stats().next_track_id, 3);
}

#[test]
fn test_independent_streams() {
    let mut a = Engine::new(EngineConfig::default()).unwrap();
    let mut b = Engine::new(EngineConfig::default()).unwrap();
    for frame in 1..=3 {
        a.process_frame(FrameInput::new(frame, vec![walker(frame)]));
    }
    let out = b.process_frame(FrameInput::new(1, vec![walker(1)]));
    assert!(out.tracked_detections[0].track_id.is_none());
    assert_eq!(b.stats().next_track_id, 2);
    assert_eq!(a.stats().confirmed_tracks, 1);
}
