//! Camera capture module
//!
//! Cross-platform webcam capture using the nokhwa crate. Frames are read
//! synchronously on the caller's thread: the gesture loop is deliberately
//! single-threaded and blocks on each capture.

use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use thiserror::Error;

/// The one fatal failure kind: the camera could not be opened or read.
/// Everything else in the pipeline degrades to "no event this frame".
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera capture unavailable: {0}")]
    CaptureUnavailable(String),
}

/// One captured frame, RGBA pixel data in row-major order.
#[derive(Clone)]
pub struct CameraFrame {
    /// RGBA pixel data
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl CameraFrame {
    /// Mirror the frame horizontally in place, so the operator sees
    /// themselves as in a mirror. Landmarks are detected on the mirrored
    /// frame, so classification is unaffected.
    pub fn flip_horizontal(&mut self) {
        let stride = (self.width * 4) as usize;
        for row in self.data.chunks_exact_mut(stride) {
            let pixels = self.width as usize;
            for x in 0..pixels / 2 {
                let a = x * 4;
                let b = (pixels - 1 - x) * 4;
                for c in 0..4 {
                    row.swap(a + c, b + c);
                }
            }
        }
    }

    /// Convert to tightly packed RGB, the format the landmark model expects.
    pub fn to_rgb(&self) -> Vec<u8> {
        let mut rgb = Vec::with_capacity((self.width * self.height * 3) as usize);
        for px in self.data.chunks_exact(4) {
            rgb.extend_from_slice(&px[..3]);
        }
        rgb
    }
}

/// Source of frames for the gesture loop. Implemented by the real webcam
/// and by scripted fakes in tests.
pub trait CameraSource {
    /// Block until the next frame is available. A failure here is fatal to
    /// the loop and is not retried.
    fn read(&mut self) -> Result<CameraFrame, CameraError>;
}

/// Webcam-backed camera source.
pub struct NokhwaCamera {
    camera: Camera,
}

impl NokhwaCamera {
    /// Open the camera at `camera_index` (0 for the system default) and
    /// start its stream. Tries progressively less demanding formats, the
    /// same fallback chain drivers tend to need in practice.
    pub fn open(camera_index: u32) -> Result<Self, CameraError> {
        let index = CameraIndex::Index(camera_index);

        let requested =
            RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestResolution);

        let mut camera = match Camera::new(index.clone(), requested) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Failed to open camera with highest resolution: {:?}", e);

                let requested2 = RequestedFormat::new::<RgbAFormat>(
                    RequestedFormatType::HighestResolution(nokhwa::utils::Resolution::new(
                        640, 480,
                    )),
                );

                match Camera::new(index.clone(), requested2) {
                    Ok(c) => c,
                    Err(e2) => {
                        log::warn!("Failed with HighestResolution: {:?}", e2);

                        let requested3 =
                            RequestedFormat::new::<RgbAFormat>(RequestedFormatType::None);
                        Camera::new(index, requested3).map_err(|e3| {
                            CameraError::CaptureUnavailable(format!(
                                "all format attempts failed: {e3}"
                            ))
                        })?
                    }
                }
            }
        };

        camera
            .open_stream()
            .map_err(|e| CameraError::CaptureUnavailable(format!("open_stream failed: {e}")))?;

        log::info!(
            "Camera opened: {} ({}x{})",
            camera.info().human_name(),
            camera.resolution().width(),
            camera.resolution().height()
        );

        Ok(Self { camera })
    }

    /// Camera resolution as reported by the driver.
    pub fn resolution(&self) -> (u32, u32) {
        let res = self.camera.resolution();
        (res.width(), res.height())
    }
}

impl CameraSource for NokhwaCamera {
    fn read(&mut self) -> Result<CameraFrame, CameraError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| CameraError::CaptureUnavailable(format!("frame read failed: {e}")))?;

        let image = buffer
            .decode_image::<RgbAFormat>()
            .map_err(|e| CameraError::CaptureUnavailable(format!("frame decode failed: {e}")))?;

        Ok(CameraFrame {
            width: buffer.resolution().width(),
            height: buffer.resolution().height(),
            data: image.into_raw(),
        })
    }
}

impl Drop for NokhwaCamera {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            log::warn!("Failed to stop camera stream: {:?}", e);
        }
        log::info!("Camera released");
    }
}
