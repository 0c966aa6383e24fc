// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Which way the camera points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LensFacing {
    /// World-facing camera (default for survey capture)
    #[default]
    Back,
    /// User-facing camera
    Front,
    /// External camera (USB webcam, capture card)
    External,
}

impl LensFacing {
    /// The facing selected when the user flips the camera
    pub fn flipped(&self) -> Self {
        match self {
            LensFacing::Back => LensFacing::Front,
            LensFacing::Front => LensFacing::Back,
            LensFacing::External => LensFacing::External,
        }
    }
}

impl std::fmt::Display for LensFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LensFacing::Back => write!(f, "back"),
            LensFacing::Front => write!(f, "front"),
            LensFacing::External => write!(f, "external"),
        }
    }
}

/// Pixel format of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGB24 - 24-bit RGB (3 bytes per pixel)
    Rgb24,
    /// YUYV - packed 4:2:2 (Y0 U Y1 V interleaved), common raw webcam format
    Yuyv,
    /// Motion-JPEG - each frame is a complete JPEG image
    Mjpeg,
}

impl PixelFormat {
    /// True for formats whose frames are already a compressed image
    pub fn is_compressed(&self) -> bool {
        matches!(self, PixelFormat::Mjpeg)
    }

    /// Average bytes per pixel (accounting for chroma subsampling);
    /// meaningless for compressed formats
    pub fn bytes_per_pixel(&self) -> f32 {
        match self {
            PixelFormat::Rgb24 => 3.0,
            PixelFormat::Yuyv => 2.0,
            PixelFormat::Mjpeg => 0.0,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelFormat::Rgb24 => write!(f, "RGB24"),
            PixelFormat::Yuyv => write!(f, "YUYV"),
            PixelFormat::Mjpeg => write!(f, "MJPG"),
        }
    }
}

/// Device information from V4L2 capability
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    /// Name of the device (V4L2 card)
    pub card: String,
    /// Driver name (V4L2 driver)
    pub driver: String,
    /// Device path (e.g., /dev/video0)
    pub path: String,
}

/// Represents a camera device known to the provider
#[derive(Debug, Clone)]
pub struct CameraDescriptor {
    pub name: String,
    pub path: String,
    pub facing: LensFacing,
    /// V4L2 device information when enumerated from hardware
    pub device_info: Option<DeviceInfo>,
}

/// Camera format specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    /// Frames per second; None when the device does not report one
    pub framerate: Option<u32>,
    pub pixel_format: PixelFormat,
}

impl std::fmt::Display for CameraFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(fps) = self.framerate {
            write!(f, "{}x{} @ {}fps", self.width, self.height, fps)
        } else {
            write!(f, "{}x{}", self.width, self.height)
        }
    }
}

/// A single frame from the camera
///
/// Pixel data is reference-counted so frames can be passed through the
/// capture pipeline without copying.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Raw bytes in `format` layout; a complete JPEG for `Mjpeg`
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Timestamp when the frame was captured (for latency diagnostics)
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Decode this frame into an RGB image
    ///
    /// MJPEG frames are decoded with the image crate, YUYV frames are
    /// converted in software, RGB24 frames are wrapped as-is.
    pub fn to_rgb_image(&self) -> BackendResult<image::RgbImage> {
        match self.format {
            PixelFormat::Mjpeg => {
                let decoded = image::load_from_memory(&self.data)
                    .map_err(|e| BackendError::DecodeFailed(e.to_string()))?;
                Ok(decoded.to_rgb8())
            }
            PixelFormat::Yuyv => yuyv_to_rgb(self.width, self.height, &self.data),
            PixelFormat::Rgb24 => {
                let expected = (self.width * self.height * 3) as usize;
                if self.data.len() < expected {
                    return Err(BackendError::DecodeFailed(format!(
                        "RGB24 frame too short: {} < {}",
                        self.data.len(),
                        expected
                    )));
                }
                image::RgbImage::from_raw(self.width, self.height, self.data[..expected].to_vec())
                    .ok_or_else(|| {
                        BackendError::DecodeFailed("RGB24 buffer rejected".to_string())
                    })
            }
        }
    }
}

/// Convert a packed YUYV 4:2:2 buffer to an RGB image
///
/// BT.601 full-range conversion; each 4-byte group carries two pixels.
fn yuyv_to_rgb(width: u32, height: u32, data: &[u8]) -> BackendResult<image::RgbImage> {
    let expected = (width * height * 2) as usize;
    if data.len() < expected {
        return Err(BackendError::DecodeFailed(format!(
            "YUYV frame too short: {} < {}",
            data.len(),
            expected
        )));
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in data[..expected].chunks_exact(4) {
        let y0 = chunk[0] as f32;
        let u = chunk[1] as f32 - 128.0;
        let y1 = chunk[2] as f32;
        let v = chunk[3] as f32 - 128.0;

        for y in [y0, y1] {
            let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
            let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
            let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
            rgb.push(r);
            rgb.push(g);
            rgb.push(b);
        }
    }

    image::RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| BackendError::DecodeFailed("YUYV conversion rejected".to_string()))
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Failed to initialize backend
    InitializationFailed(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Format not supported
    FormatNotSupported(String),
    /// Frame decoding/conversion failed
    DecodeFailed(String),
    /// No frame was delivered in time
    FrameTimeout,
    /// General I/O error
    IoError(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::DecodeFailed(msg) => write!(f, "Frame decode failed: {}", msg),
            BackendError::FrameTimeout => write!(f, "No frame delivered in time"),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lens_facing_flip() {
        assert_eq!(LensFacing::Back.flipped(), LensFacing::Front);
        assert_eq!(LensFacing::Front.flipped(), LensFacing::Back);
        assert_eq!(LensFacing::External.flipped(), LensFacing::External);
    }

    #[test]
    fn test_yuyv_conversion_dimensions() {
        // 2x2 gray frame: Y=128, U=V=128 (no chroma)
        let data = vec![128u8, 128, 128, 128, 128, 128, 128, 128];
        let img = yuyv_to_rgb(2, 2, &data).unwrap();
        assert_eq!(img.dimensions(), (2, 2));
        let px = img.get_pixel(0, 0);
        assert_eq!(px.0, [128, 128, 128]);
    }

    #[test]
    fn test_rgb24_frame_roundtrip() {
        let frame = CameraFrame {
            width: 2,
            height: 1,
            data: Arc::from(vec![255u8, 0, 0, 0, 255, 0].into_boxed_slice()),
            format: PixelFormat::Rgb24,
            captured_at: Instant::now(),
        };
        let img = frame.to_rgb_image().unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(img.get_pixel(1, 0).0, [0, 255, 0]);
    }
}
