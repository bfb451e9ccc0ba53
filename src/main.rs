//! Gesture Cam - main entry point
//!
//! Opens the default webcam, runs the hand landmark model on each frame
//! and prints every recognized gesture as a JSON line on stdout, with a
//! live preview window showing the hand skeleton and FPS.

use gesture_cam::{
    DetectorConfig, GestureLoop, HandLandmarker, NokhwaCamera, StdoutSink, WindowDisplay,
};

const WINDOW_TITLE: &str = "AI Vision Assistant - Gesture Detection";
/// System default camera.
const CAMERA_INDEX: u32 = 0;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Gesture Cam v0.1.0");

    let mut camera = match NokhwaCamera::open(CAMERA_INDEX) {
        Ok(camera) => camera,
        Err(e) => {
            log::error!("{}", e);
            return;
        }
    };

    let mut detector = match HandLandmarker::new(DetectorConfig::default()) {
        Ok(detector) => detector,
        Err(e) => {
            log::error!("Failed to initialize hand landmark detector: {}", e);
            return;
        }
    };

    let mut display = match WindowDisplay::open(WINDOW_TITLE) {
        Ok(display) => display,
        Err(e) => {
            log::error!("Failed to open preview window: {}", e);
            return;
        }
    };

    let mut sink = StdoutSink;

    log::info!("Press Q or Escape to exit");

    let result = GestureLoop::new().run(&mut camera, &mut detector, &mut display, &mut sink);
    match result {
        Ok(()) => log::info!("Shutting down"),
        Err(e) => log::error!("Capture failed, shutting down: {}", e),
    }
}
