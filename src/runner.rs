//! The gesture classifier loop
//!
//! Drives the per-frame cycle: capture, mirror, detect, classify, emit,
//! overlay, present. All collaborators come in through trait seams so the
//! loop can be exercised in tests without a camera or a window.

use std::time::Instant;

use crate::camera::{CameraError, CameraSource};
use crate::display::{Display, Key};
use crate::gesture::{classify, EventSink, GestureEvent};
use crate::hand::LandmarkProvider;

/// Screen position of the FPS readout, in frame pixels.
const FPS_POSITION: (u32, u32) = (10, 70);

/// Per-run loop state. The only value carried between iterations is the
/// previous frame's instant, used for the FPS readout.
#[derive(Default)]
pub struct GestureLoop {
    prev_frame: Option<Instant>,
}

impl GestureLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run until the operator requests termination or the camera fails.
    ///
    /// A capture failure is the one fatal condition: it is not retried
    /// and ends the run with an error. Zero detected hands and unmatched
    /// poses are normal no-event iterations. Collaborator handles are
    /// owned by the caller, so every exit path releases them on drop.
    pub fn run<C, L, D, S>(
        &mut self,
        camera: &mut C,
        detector: &mut L,
        display: &mut D,
        sink: &mut S,
    ) -> Result<(), CameraError>
    where
        C: CameraSource,
        L: LandmarkProvider,
        D: Display,
        S: EventSink,
    {
        loop {
            let mut frame = camera.read()?;

            // Mirror for a natural operator view; landmarks come from the
            // mirrored frame, so classification is consistent.
            frame.flip_horizontal();

            let rgb = frame.to_rgb();
            let hands = detector.detect(&rgb, frame.width, frame.height);

            for pose in &hands {
                display.draw_landmarks(pose);

                if let Some(gesture) = classify(pose) {
                    let event = GestureEvent::now(gesture);
                    log::debug!("Recognized gesture: {}", gesture.as_str());
                    sink.emit(&event);
                }
            }

            let now = Instant::now();
            let fps = match self.prev_frame {
                Some(prev) => {
                    let delta = now.duration_since(prev).as_secs_f64();
                    if delta > 0.0 {
                        1.0 / delta
                    } else {
                        0.0
                    }
                }
                None => 0.0,
            };
            self.prev_frame = Some(now);

            display.put_text(&format!("FPS: {}", fps as u32), FPS_POSITION);
            display.show(&frame);

            if let Some(Key::Quit) = display.poll_key() {
                log::info!("Quit key received");
                return Ok(());
            }
        }
    }
}
