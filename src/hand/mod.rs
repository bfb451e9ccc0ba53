//! Hand landmark detection
//!
//! Data model for the 21-point hand skeleton (MediaPipe landmark
//! convention) and an ONNX-Runtime-backed landmark provider compatible
//! with the MediaPipe hand landmark models from the PINTO Model Zoo.

use std::path::PathBuf;

use ndarray::Array4;

/// Landmark indices, fixed by the upstream model convention.
/// See: https://google.github.io/mediapipe/solutions/hands.html
pub mod landmark_ids {
    pub const WRIST: usize = 0;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_FINGER_PIP: usize = 6;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const MIDDLE_FINGER_PIP: usize = 10;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_PIP: usize = 14;
    pub const RING_FINGER_TIP: usize = 16;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_TIP: usize = 20;
}

/// Skeleton edges between landmark indices, used when drawing a detected
/// hand over the preview frame.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (5, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (9, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (13, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    (0, 17),
];

/// One tracked anatomical point, in whole frame pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Landmark {
    pub x: u32,
    pub y: u32,
}

impl Landmark {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Euclidean pixel distance to another landmark.
    pub fn distance_to(&self, other: Landmark) -> f64 {
        let dx = self.x as f64 - other.x as f64;
        let dy = self.y as f64 - other.y as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

/// The full 21-landmark set for one detected hand in one frame. The
/// fixed-size array makes a partial landmark set unrepresentable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandPose {
    points: [Landmark; 21],
}

impl HandPose {
    pub fn new(points: [Landmark; 21]) -> Self {
        Self { points }
    }

    /// Landmark at the given anatomical index (see [`landmark_ids`]).
    pub fn point(&self, id: usize) -> Landmark {
        self.points[id]
    }

    pub fn points(&self) -> &[Landmark; 21] {
        &self.points
    }
}

/// Provider configuration, fixed at construction.
#[derive(Clone, Copy, Debug)]
pub struct DetectorConfig {
    /// Maximum simultaneous hands reported per frame.
    pub max_hands: usize,
    /// Detections scoring below this are not returned at all.
    pub min_detection_confidence: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_hands: 1,
            min_detection_confidence: 0.7,
        }
    }
}

/// Source of hand poses for the gesture loop. Implemented by the ONNX
/// model runner and by scripted fakes in tests.
pub trait LandmarkProvider {
    /// Detect hands in a tightly packed RGB frame. Returns zero or more
    /// complete poses; detection failure is modeled as an empty result,
    /// never an error.
    fn detect(&mut self, rgb: &[u8], width: u32, height: u32) -> Vec<HandPose>;
}

/// Model input edge length (MediaPipe hand landmark models take a square
/// 224x224 RGB crop).
const INPUT_SIZE: u32 = 224;
/// Landmark output element count: 21 points x (x, y, z).
const LANDMARK_ELEMS: usize = 63;

/// ONNX-Runtime-backed hand landmark provider.
pub struct HandLandmarker {
    session: ort::session::Session,
    config: DetectorConfig,
}

impl HandLandmarker {
    /// Initialize ONNX Runtime and load the hand landmark model from the
    /// `models/` directory.
    pub fn new(config: DetectorConfig) -> Result<Self, String> {
        let model_dir = Self::find_model_dir()?;
        log::info!("Model directory: {:?}", model_dir);

        let model_path = model_dir.join("hand_landmark.onnx");
        if !model_path.exists() {
            return Err(format!("Hand landmark model not found: {:?}", model_path));
        }

        ort::init()
            .with_name("GestureCam")
            .commit()
            .map_err(|e| format!("Failed to initialize ORT: {}", e))?;

        let session = ort::session::Session::builder()
            .map_err(|e| format!("Failed to create session builder: {}", e))?
            .with_intra_threads(2)
            .map_err(|e| format!("Failed to set threads: {}", e))?
            .commit_from_file(&model_path)
            .map_err(|e| format!("Failed to load hand landmark model: {}", e))?;

        log::info!("Loaded hand landmark model from {:?}", model_path);

        Ok(Self { session, config })
    }

    /// Find the models directory, relative to the executable or the
    /// current directory.
    fn find_model_dir() -> Result<PathBuf, String> {
        if let Ok(exe_path) = std::env::current_exe() {
            let mut dir = exe_path.parent().map(PathBuf::from);
            // Walk a few levels up to cover cargo's target/debug layout.
            for _ in 0..3 {
                if let Some(d) = dir {
                    let model_dir = d.join("models");
                    if model_dir.exists() {
                        return Ok(model_dir);
                    }
                    dir = d.parent().map(PathBuf::from);
                } else {
                    break;
                }
            }
        }

        let cwd = std::env::current_dir().map_err(|e| e.to_string())?;
        let model_dir = cwd.join("models");
        if model_dir.exists() {
            return Ok(model_dir);
        }

        Err("Models directory not found. Create a 'models' directory with hand_landmark.onnx."
            .to_string())
    }

    /// Resize the RGB frame to the model input square and scale to [0, 1],
    /// NHWC layout.
    fn preprocess(rgb: &[u8], width: u32, height: u32) -> Vec<f32> {
        let mut output = vec![0.0f32; (INPUT_SIZE * INPUT_SIZE * 3) as usize];

        let x_ratio = width as f32 / INPUT_SIZE as f32;
        let y_ratio = height as f32 / INPUT_SIZE as f32;

        for y in 0..INPUT_SIZE {
            for x in 0..INPUT_SIZE {
                let src_x = (x as f32 * x_ratio) as u32;
                let src_y = (y as f32 * y_ratio) as u32;
                let src_idx = ((src_y * width + src_x) * 3) as usize;

                if src_idx + 2 < rgb.len() {
                    let out_idx = ((y * INPUT_SIZE + x) * 3) as usize;
                    output[out_idx] = rgb[src_idx] as f32 / 255.0;
                    output[out_idx + 1] = rgb[src_idx + 1] as f32 / 255.0;
                    output[out_idx + 2] = rgb[src_idx + 2] as f32 / 255.0;
                }
            }
        }

        output
    }

    /// Run the model on one frame. Errors are reported to the caller so
    /// `detect` can log and degrade to "no hands".
    fn run_inference(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<Vec<HandPose>, String> {
        let input = Self::preprocess(rgb, width, height);

        let input_array = Array4::from_shape_vec(
            (1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3),
            input,
        )
        .map_err(|e| format!("Failed to create input array: {}", e))?;

        let input_tensor = ort::value::Tensor::from_array(input_array)
            .map_err(|e| format!("Failed to create tensor: {}", e))?;

        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| format!("Inference failed: {}", e))?;

        // The model reports 63 landmark coordinates and a scalar hand
        // presence score; match outputs by element count rather than by
        // name, which varies between model exports.
        let mut coords: Option<Vec<f32>> = None;
        let mut score: Option<f32> = None;
        for (_name, value) in outputs.iter() {
            let (_shape, data) = value
                .try_extract_tensor::<f32>()
                .map_err(|e| format!("Failed to extract output: {}", e))?;
            match data.len() {
                LANDMARK_ELEMS => coords = Some(data.to_vec()),
                1 if score.is_none() => score = Some(data[0]),
                _ => {}
            }
        }

        let coords = coords.ok_or("No landmark output from model")?;
        let score = score.ok_or("No presence score output from model")?;

        if score < self.config.min_detection_confidence {
            return Ok(Vec::new());
        }

        // Landmark coordinates are in model-input pixel space; scale back
        // to frame pixels and clamp to the frame bounds.
        let x_scale = width as f32 / INPUT_SIZE as f32;
        let y_scale = height as f32 / INPUT_SIZE as f32;

        let mut points = [Landmark::default(); 21];
        for (i, point) in points.iter_mut().enumerate() {
            let x = coords[i * 3] * x_scale;
            let y = coords[i * 3 + 1] * y_scale;
            point.x = (x.max(0.0) as u32).min(width.saturating_sub(1));
            point.y = (y.max(0.0) as u32).min(height.saturating_sub(1));
        }

        Ok(vec![HandPose::new(points)])
    }
}

impl LandmarkProvider for HandLandmarker {
    fn detect(&mut self, rgb: &[u8], width: u32, height: u32) -> Vec<HandPose> {
        match self.run_inference(rgb, width, height) {
            Ok(mut hands) => {
                hands.truncate(self.config.max_hands);
                hands
            }
            Err(e) => {
                log::warn!("Inference error: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = Landmark::new(0, 0);
        let b = Landmark::new(3, 4);
        assert_eq!(a.distance_to(b), 5.0);
        assert_eq!(b.distance_to(a), 5.0);
    }

    #[test]
    fn pose_indexing_follows_anatomical_ids() {
        let mut points = [Landmark::default(); 21];
        points[landmark_ids::THUMB_TIP] = Landmark::new(100, 100);
        points[landmark_ids::INDEX_FINGER_TIP] = Landmark::new(110, 105);
        let pose = HandPose::new(points);
        assert_eq!(pose.point(landmark_ids::THUMB_TIP), Landmark::new(100, 100));
        assert_eq!(
            pose.point(landmark_ids::INDEX_FINGER_TIP),
            Landmark::new(110, 105)
        );
    }

    #[test]
    fn default_config_matches_provider_contract() {
        let config = DetectorConfig::default();
        assert_eq!(config.max_hands, 1);
        assert_eq!(config.min_detection_confidence, 0.7);
    }

    #[test]
    fn connections_stay_within_the_skeleton() {
        for (a, b) in HAND_CONNECTIONS {
            assert!(a < 21 && b < 21);
        }
    }

    #[test]
    fn preprocess_produces_full_input_square() {
        let rgb = vec![255u8; (64 * 48 * 3) as usize];
        let input = HandLandmarker::preprocess(&rgb, 64, 48);
        assert_eq!(input.len(), (INPUT_SIZE * INPUT_SIZE * 3) as usize);
        assert!(input.iter().all(|&v| (v - 1.0).abs() < f32::EPSILON));
    }
}
