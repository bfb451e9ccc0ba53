//! Gesture Cam - library root
//!
//! Webcam hand-gesture detection: captures frames, runs a hand-landmark
//! model, classifies a small set of static poses and emits each one as a
//! timestamped JSON event on stdout.

pub mod camera;
pub mod display;
pub mod gesture;
pub mod hand;
pub mod runner;

pub use camera::{CameraError, CameraFrame, CameraSource, NokhwaCamera};
pub use display::{Display, Key, WindowDisplay};
pub use gesture::{classify, EventSink, Gesture, GestureEvent, StdoutSink};
pub use hand::{DetectorConfig, HandLandmarker, HandPose, Landmark, LandmarkProvider};
pub use runner::GestureLoop;
