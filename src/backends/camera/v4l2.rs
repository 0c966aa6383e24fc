// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera backend
//!
//! Opens capture devices through the `v4l` crate. Each capture owns its own
//! device handle and memory-mapped stream; the backend itself only stores
//! the negotiated format, so single-shot captures and streaming never hold
//! the device open between requests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use super::CameraBackend;
use super::types::{
    BackendError, BackendResult, CameraDescriptor, CameraFormat, CameraFrame, DeviceInfo,
    LensFacing, PixelFormat,
};
use crate::constants::capture;

/// Formats we can consume, in preference order
const PREFERRED_FOURCCS: &[(&[u8; 4], PixelFormat)] = &[
    (b"MJPG", PixelFormat::Mjpeg),
    (b"YUYV", PixelFormat::Yuyv),
    (b"RGB3", PixelFormat::Rgb24),
];

/// Target capture resolution requested from the device
const TARGET_WIDTH: u32 = 1280;
const TARGET_HEIGHT: u32 = 720;

/// Enumerate V4L2 capture devices
///
/// Scans /dev/video* and keeps nodes that answer a capture-format query;
/// metadata-only nodes (common with UVC cameras) are filtered out.
pub fn enumerate_cameras() -> Vec<CameraDescriptor> {
    let Ok(entries) = std::fs::read_dir("/dev") else {
        return Vec::new();
    };

    let mut device_paths: Vec<_> = entries
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with("video"))
        .map(|e| e.path())
        .collect();
    device_paths.sort();

    let mut cameras = Vec::new();
    for device_path in device_paths {
        let path = device_path.to_string_lossy().to_string();

        let Ok(device) = Device::with_path(&device_path) else {
            continue;
        };
        // Nodes without a capture format are metadata/output nodes
        if device.format().is_err() {
            continue;
        }

        let caps = device.query_caps().ok();
        let card = caps
            .as_ref()
            .map(|c| c.card.clone())
            .unwrap_or_else(|| path.clone());

        let facing = infer_facing(&card, cameras.len());
        debug!(path = %path, card = %card, facing = %facing, "Found V4L2 camera");

        cameras.push(CameraDescriptor {
            name: card.clone(),
            path: path.clone(),
            facing,
            device_info: caps.map(|c| DeviceInfo {
                card: c.card,
                driver: c.driver,
                path,
            }),
        });
    }

    cameras
}

/// Guess the lens facing from the device name
///
/// Laptops and phones report "front"/"rear" in the card string; otherwise
/// the first enumerated camera is treated as the world-facing one.
fn infer_facing(card: &str, index: usize) -> LensFacing {
    let lower = card.to_lowercase();
    if lower.contains("front") {
        LensFacing::Front
    } else if lower.contains("back") || lower.contains("rear") {
        LensFacing::Back
    } else if index == 0 {
        LensFacing::Back
    } else {
        LensFacing::External
    }
}

/// V4L2-backed camera
pub struct V4l2Backend {
    descriptor: CameraDescriptor,
    format: CameraFormat,
}

impl V4l2Backend {
    /// Open a camera and negotiate a capture format
    pub fn open(descriptor: CameraDescriptor) -> BackendResult<Self> {
        let device = Device::with_path(&descriptor.path)
            .map_err(|e| BackendError::DeviceNotFound(format!("{}: {}", descriptor.path, e)))?;

        let format = negotiate_format(&device)?;
        info!(
            camera = %descriptor.name,
            format = %format,
            pixel_format = %format.pixel_format,
            "Camera bound"
        );

        Ok(Self { descriptor, format })
    }

    /// Open the device and apply the negotiated format
    fn open_configured(&self) -> BackendResult<Device> {
        let device = Device::with_path(&self.descriptor.path)
            .map_err(|e| BackendError::DeviceNotFound(format!("{}: {}", self.descriptor.path, e)))?;

        let mut fmt = device
            .format()
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?;
        fmt.width = self.format.width;
        fmt.height = self.format.height;
        fmt.fourcc = pixel_format_fourcc(self.format.pixel_format);
        device
            .set_format(&fmt)
            .map_err(|e| BackendError::FormatNotSupported(e.to_string()))?;

        Ok(device)
    }
}

impl CameraBackend for V4l2Backend {
    fn descriptor(&self) -> &CameraDescriptor {
        &self.descriptor
    }

    fn format(&self) -> &CameraFormat {
        &self.format
    }

    fn capture_frame(&self) -> BackendResult<CameraFrame> {
        let device = self.open_configured()?;
        let mut stream = MmapStream::with_buffers(&device, Type::VideoCapture, 4)
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?;

        // Let auto-exposure settle before keeping a frame
        let start = Instant::now();
        let mut frame = None;
        while start.elapsed() < capture::FRAME_TIMEOUT {
            let (buf, meta) = stream
                .next()
                .map_err(|e| BackendError::IoError(e.to_string()))?;
            let used = (meta.bytesused as usize).min(buf.len());
            if used == 0 {
                continue;
            }
            frame = Some(self.make_frame(&buf[..used]));
            if start.elapsed() >= capture::WARMUP {
                break;
            }
        }

        frame.ok_or(BackendError::FrameTimeout)
    }

    fn start_stream(
        &self,
        sender: tokio::sync::mpsc::Sender<CameraFrame>,
        stop: Arc<AtomicBool>,
    ) -> BackendResult<()> {
        let device = self.open_configured()?;
        let format = self.format.clone();
        let name = self.descriptor.name.clone();

        std::thread::Builder::new()
            .name("v4l2-stream".to_string())
            .spawn(move || {
                let mut stream = match MmapStream::with_buffers(&device, Type::VideoCapture, 4) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(camera = %name, error = %e, "Failed to start capture stream");
                        return;
                    }
                };

                while !stop.load(Ordering::SeqCst) {
                    let (buf, meta) = match stream.next() {
                        Ok(f) => f,
                        Err(e) => {
                            warn!(camera = %name, error = %e, "Capture stream error");
                            break;
                        }
                    };
                    let used = (meta.bytesused as usize).min(buf.len());
                    if used == 0 {
                        continue;
                    }

                    let frame = CameraFrame {
                        width: format.width,
                        height: format.height,
                        data: Arc::from(buf[..used].to_vec().into_boxed_slice()),
                        format: format.pixel_format,
                        captured_at: Instant::now(),
                    };
                    if sender.blocking_send(frame).is_err() {
                        // Receiver gone, recording finished
                        break;
                    }
                }
                debug!(camera = %name, "Capture stream stopped");
            })
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?;

        Ok(())
    }
}

impl V4l2Backend {
    fn make_frame(&self, data: &[u8]) -> CameraFrame {
        CameraFrame {
            width: self.format.width,
            height: self.format.height,
            data: Arc::from(data.to_vec().into_boxed_slice()),
            format: self.format.pixel_format,
            captured_at: Instant::now(),
        }
    }
}

fn pixel_format_fourcc(format: PixelFormat) -> FourCC {
    match format {
        PixelFormat::Mjpeg => FourCC::new(b"MJPG"),
        PixelFormat::Yuyv => FourCC::new(b"YUYV"),
        PixelFormat::Rgb24 => FourCC::new(b"RGB3"),
    }
}

/// Pick a pixel format the device accepts, preferring compressed frames
fn negotiate_format(device: &Device) -> BackendResult<CameraFormat> {
    let current = device
        .format()
        .map_err(|e| BackendError::InitializationFailed(e.to_string()))?;

    for (fourcc, pixel_format) in PREFERRED_FOURCCS {
        let mut fmt = current.clone();
        fmt.width = TARGET_WIDTH;
        fmt.height = TARGET_HEIGHT;
        fmt.fourcc = FourCC::new(fourcc);

        let Ok(actual) = device.set_format(&fmt) else {
            continue;
        };
        if actual.fourcc != FourCC::new(fourcc) {
            continue;
        }

        let framerate = device
            .params()
            .ok()
            .map(|p| p.interval)
            .filter(|i| i.numerator > 0)
            .map(|i| i.denominator / i.numerator)
            .filter(|fps| *fps > 0);

        return Ok(CameraFormat {
            width: actual.width,
            height: actual.height,
            framerate,
            pixel_format: *pixel_format,
        });
    }

    Err(BackendError::FormatNotSupported(
        "device accepts none of MJPG/YUYV/RGB3".to_string(),
    ))
}
