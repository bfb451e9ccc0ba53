//! Gesture classification and event emission
//!
//! A pure decision function maps one 21-landmark hand pose to one of a
//! closed set of gesture labels, and each recognized gesture is emitted
//! as a single-line JSON record on stdout.

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::hand::{landmark_ids::*, HandPose};

/// Thumb-to-index distance below which the pose reads as a pinch.
/// Absolute frame pixels, exclusive bound.
pub const PINCH_MAX_DISTANCE: f64 = 50.0;
/// Thumb-to-index distance above which the pose reads as an open palm.
/// Absolute frame pixels, exclusive bound.
pub const OPEN_PALM_MIN_DISTANCE: f64 = 200.0;

/// The closed set of recognized hand gestures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    Pinch,
    OpenPalm,
    #[serde(rename = "V_sign")]
    VSign,
    Fist,
}

impl Gesture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gesture::Pinch => "pinch",
            Gesture::OpenPalm => "open_palm",
            Gesture::VSign => "V_sign",
            Gesture::Fist => "fist",
        }
    }
}

/// One recognized gesture with the wall-clock time it was seen.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct GestureEvent {
    pub gesture: Gesture,
    /// Seconds since the Unix epoch, monotonic within one run.
    pub timestamp: f64,
}

impl GestureEvent {
    /// Stamp a gesture with the current wall-clock time.
    pub fn now(gesture: Gesture) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Self { gesture, timestamp }
    }
}

/// Classify one hand pose. Pure and total: identical landmark
/// coordinates always yield the identical label, or `None` when no rule
/// matches.
///
/// Rules are evaluated in a deliberate priority order: the finger-shape
/// rules (V sign, fist) override the thumb-to-index distance rules
/// (pinch, open palm) when both match.
pub fn classify(pose: &HandPose) -> Option<Gesture> {
    // A finger is extended iff its tip sits above its second joint on
    // screen (smaller y).
    let extended = |tip: usize, pip: usize| pose.point(tip).y < pose.point(pip).y;
    let index_up = extended(INDEX_FINGER_TIP, INDEX_FINGER_PIP);
    let middle_up = extended(MIDDLE_FINGER_TIP, MIDDLE_FINGER_PIP);
    let ring_up = extended(RING_FINGER_TIP, RING_FINGER_PIP);
    let pinky_up = extended(PINKY_TIP, PINKY_PIP);

    let dist = pose
        .point(THUMB_TIP)
        .distance_to(pose.point(INDEX_FINGER_TIP));

    let mut gesture = None;
    if dist < PINCH_MAX_DISTANCE {
        gesture = Some(Gesture::Pinch);
    } else if dist > OPEN_PALM_MIN_DISTANCE {
        gesture = Some(Gesture::OpenPalm);
    }

    if index_up && middle_up && !ring_up {
        gesture = Some(Gesture::VSign);
    } else if !(index_up || middle_up || ring_up || pinky_up) {
        gesture = Some(Gesture::Fist);
    }

    gesture
}

/// Destination for recognized gestures. Implemented by the stdout writer
/// and by capturing fakes in tests.
pub trait EventSink {
    fn emit(&mut self, event: &GestureEvent);
}

/// Writes each event as one JSON line on stdout, suitable for
/// line-oriented downstream consumption.
#[derive(Default)]
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn emit(&mut self, event: &GestureEvent) {
        match serde_json::to_string(event) {
            Ok(line) => {
                let mut out = std::io::stdout().lock();
                if let Err(e) = writeln!(out, "{line}") {
                    log::warn!("Failed to write gesture event: {}", e);
                }
            }
            Err(e) => log::warn!("Failed to serialize gesture event: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::Landmark;

    /// Builds a pose where every landmark defaults to (0, 0), then applies
    /// the given (id, x, y) overrides.
    fn pose(overrides: &[(usize, u32, u32)]) -> HandPose {
        let mut points = [Landmark::default(); 21];
        for &(id, x, y) in overrides {
            points[id] = Landmark::new(x, y);
        }
        HandPose::new(points)
    }

    /// Pinky tip above its second joint, everything else folded. Keeps
    /// both finger-shape rules from matching without disturbing the
    /// thumb-to-index distance.
    const PINKY_ONLY_UP: [(usize, u32, u32); 2] = [(PINKY_TIP, 400, 50), (PINKY_PIP, 400, 100)];

    #[test]
    fn close_thumb_and_index_is_a_pinch() {
        let mut lms = vec![(THUMB_TIP, 100, 100), (INDEX_FINGER_TIP, 110, 105)];
        lms.extend(PINKY_ONLY_UP);
        // Index tip at y=105 with its joint above it, so index is folded.
        lms.push((INDEX_FINGER_PIP, 110, 100));
        assert_eq!(classify(&pose(&lms)), Some(Gesture::Pinch));
    }

    #[test]
    fn far_thumb_and_index_is_an_open_palm() {
        let mut lms = vec![(THUMB_TIP, 0, 100), (INDEX_FINGER_TIP, 300, 100)];
        lms.extend(PINKY_ONLY_UP);
        lms.push((INDEX_FINGER_PIP, 300, 50));
        assert_eq!(classify(&pose(&lms)), Some(Gesture::OpenPalm));
    }

    #[test]
    fn index_and_middle_up_without_ring_is_a_v_sign() {
        let lms = [
            (INDEX_FINGER_TIP, 120, 50),
            (INDEX_FINGER_PIP, 120, 100),
            (MIDDLE_FINGER_TIP, 140, 55),
            (MIDDLE_FINGER_PIP, 140, 110),
            (RING_FINGER_TIP, 160, 150),
            (RING_FINGER_PIP, 160, 90),
        ];
        assert_eq!(classify(&pose(&lms)), Some(Gesture::VSign));
    }

    #[test]
    fn v_sign_overrides_pinch_distance() {
        // Thumb and index tips 5px apart, well inside pinch range.
        let lms = [
            (THUMB_TIP, 120, 52),
            (INDEX_FINGER_TIP, 125, 50),
            (INDEX_FINGER_PIP, 125, 100),
            (MIDDLE_FINGER_TIP, 140, 55),
            (MIDDLE_FINGER_PIP, 140, 110),
            (RING_FINGER_TIP, 160, 150),
            (RING_FINGER_PIP, 160, 90),
        ];
        assert_eq!(classify(&pose(&lms)), Some(Gesture::VSign));
    }

    #[test]
    fn v_sign_overrides_open_palm_distance() {
        let lms = [
            (THUMB_TIP, 500, 300),
            (INDEX_FINGER_TIP, 125, 50),
            (INDEX_FINGER_PIP, 125, 100),
            (MIDDLE_FINGER_TIP, 140, 55),
            (MIDDLE_FINGER_PIP, 140, 110),
            (RING_FINGER_TIP, 160, 150),
            (RING_FINGER_PIP, 160, 90),
        ];
        assert_eq!(classify(&pose(&lms)), Some(Gesture::VSign));
    }

    #[test]
    fn fist_overrides_open_palm_distance() {
        // All four tips below their joints, thumb 300px from index tip.
        let lms = [
            (THUMB_TIP, 0, 100),
            (INDEX_FINGER_TIP, 300, 100),
            (INDEX_FINGER_PIP, 300, 50),
            (MIDDLE_FINGER_TIP, 320, 100),
            (MIDDLE_FINGER_PIP, 320, 50),
            (RING_FINGER_TIP, 340, 100),
            (RING_FINGER_PIP, 340, 50),
            (PINKY_TIP, 360, 100),
            (PINKY_PIP, 360, 50),
        ];
        assert_eq!(classify(&pose(&lms)), Some(Gesture::Fist));
    }

    #[test]
    fn fist_overrides_pinch_distance() {
        let lms = [
            (THUMB_TIP, 100, 100),
            (INDEX_FINGER_TIP, 110, 100),
            (INDEX_FINGER_PIP, 110, 50),
            (MIDDLE_FINGER_TIP, 320, 100),
            (MIDDLE_FINGER_PIP, 320, 50),
            (RING_FINGER_TIP, 340, 100),
            (RING_FINGER_PIP, 340, 50),
            (PINKY_TIP, 360, 100),
            (PINKY_PIP, 360, 50),
        ];
        assert_eq!(classify(&pose(&lms)), Some(Gesture::Fist));
    }

    #[test]
    fn pinch_wins_when_no_shape_rule_matches() {
        // One ambiguous finger up (ring only): neither V sign nor fist.
        let lms = [
            (THUMB_TIP, 100, 100),
            (INDEX_FINGER_TIP, 105, 108),
            (INDEX_FINGER_PIP, 105, 100),
            (RING_FINGER_TIP, 340, 50),
            (RING_FINGER_PIP, 340, 100),
        ];
        assert_eq!(classify(&pose(&lms)), Some(Gesture::Pinch));
    }

    #[test]
    fn distance_of_exactly_fifty_is_not_a_pinch() {
        let mut lms = vec![(THUMB_TIP, 100, 100), (INDEX_FINGER_TIP, 150, 100)];
        lms.extend(PINKY_ONLY_UP);
        lms.push((INDEX_FINGER_PIP, 150, 50));
        assert_eq!(classify(&pose(&lms)), None);
    }

    #[test]
    fn distance_of_exactly_two_hundred_is_not_an_open_palm() {
        let mut lms = vec![(THUMB_TIP, 100, 100), (INDEX_FINGER_TIP, 300, 100)];
        lms.extend(PINKY_ONLY_UP);
        lms.push((INDEX_FINGER_PIP, 300, 50));
        assert_eq!(classify(&pose(&lms)), None);
    }

    #[test]
    fn middle_distance_with_no_shape_rule_is_no_gesture() {
        let mut lms = vec![(THUMB_TIP, 0, 100), (INDEX_FINGER_TIP, 125, 100)];
        lms.extend(PINKY_ONLY_UP);
        lms.push((INDEX_FINGER_PIP, 125, 50));
        assert_eq!(classify(&pose(&lms)), None);
    }

    #[test]
    fn classification_is_deterministic() {
        let lms = [
            (THUMB_TIP, 100, 100),
            (INDEX_FINGER_TIP, 110, 105),
            (INDEX_FINGER_PIP, 110, 100),
            (PINKY_TIP, 400, 50),
            (PINKY_PIP, 400, 100),
        ];
        let p = pose(&lms);
        let first = classify(&p);
        for _ in 0..100 {
            assert_eq!(classify(&p), first);
        }
    }

    #[test]
    fn events_serialize_as_single_json_records() {
        let event = GestureEvent {
            gesture: Gesture::Pinch,
            timestamp: 12.5,
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"gesture":"pinch","timestamp":12.5}"#
        );

        let event = GestureEvent {
            gesture: Gesture::VSign,
            timestamp: 0.25,
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"gesture":"V_sign","timestamp":0.25}"#
        );
    }

    #[test]
    fn gesture_names_match_their_wire_form() {
        for g in [
            Gesture::Pinch,
            Gesture::OpenPalm,
            Gesture::VSign,
            Gesture::Fist,
        ] {
            assert_eq!(
                serde_json::to_string(&g).unwrap(),
                format!("\"{}\"", g.as_str())
            );
        }
    }

    #[test]
    fn now_produces_nondecreasing_timestamps() {
        let a = GestureEvent::now(Gesture::Fist);
        let b = GestureEvent::now(Gesture::Fist);
        assert!(b.timestamp >= a.timestamp);
        assert!(a.timestamp > 0.0);
    }
}
