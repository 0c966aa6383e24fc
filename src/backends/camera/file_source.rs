// SPDX-License-Identifier: GPL-3.0-only

//! File-backed camera source
//!
//! Serves frames decoded from an image file, or a generated test pattern
//! when no file is given. Used to run the capture pipeline over imported
//! photos and to exercise it in tests without camera hardware.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

use super::CameraBackend;
use super::types::{
    BackendError, BackendResult, CameraDescriptor, CameraFormat, CameraFrame, LensFacing,
    PixelFormat,
};
use crate::constants::capture;

/// Camera backend that replays a fixed image
pub struct FileSource {
    descriptor: CameraDescriptor,
    format: CameraFormat,
    data: Arc<[u8]>,
}

impl FileSource {
    /// Create a source from an image file on disk
    pub fn from_image(path: &Path) -> BackendResult<Self> {
        let decoded = image::open(path)
            .map_err(|e| BackendError::DecodeFailed(format!("{}: {}", path.display(), e)))?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();

        debug!(path = %path.display(), width, height, "File source ready");

        Ok(Self {
            descriptor: CameraDescriptor {
                name: format!("file:{}", path.display()),
                path: path.to_string_lossy().to_string(),
                facing: LensFacing::External,
                device_info: None,
            },
            format: CameraFormat {
                width,
                height,
                framerate: Some(capture::DEFAULT_FPS),
                pixel_format: PixelFormat::Rgb24,
            },
            data: Arc::from(rgb.into_raw().into_boxed_slice()),
        })
    }

    /// Create a source emitting a generated gradient pattern
    pub fn test_pattern(width: u32, height: u32) -> Self {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push((x * 255 / width.max(1)) as u8);
                data.push((y * 255 / height.max(1)) as u8);
                data.push(96);
            }
        }

        Self {
            descriptor: CameraDescriptor {
                name: "test pattern".to_string(),
                path: String::new(),
                facing: LensFacing::External,
                device_info: None,
            },
            format: CameraFormat {
                width,
                height,
                framerate: Some(capture::DEFAULT_FPS),
                pixel_format: PixelFormat::Rgb24,
            },
            data: Arc::from(data.into_boxed_slice()),
        }
    }

    fn frame(&self) -> CameraFrame {
        CameraFrame {
            width: self.format.width,
            height: self.format.height,
            data: Arc::clone(&self.data),
            format: self.format.pixel_format,
            captured_at: Instant::now(),
        }
    }
}

impl CameraBackend for FileSource {
    fn descriptor(&self) -> &CameraDescriptor {
        &self.descriptor
    }

    fn format(&self) -> &CameraFormat {
        &self.format
    }

    fn capture_frame(&self) -> BackendResult<CameraFrame> {
        Ok(self.frame())
    }

    fn start_stream(
        &self,
        sender: tokio::sync::mpsc::Sender<CameraFrame>,
        stop: Arc<AtomicBool>,
    ) -> BackendResult<()> {
        let frame = self.frame();
        let fps = self.format.framerate.unwrap_or(capture::DEFAULT_FPS).max(1);
        let interval = Duration::from_secs(1) / fps;

        std::thread::Builder::new()
            .name("file-source-stream".to_string())
            .spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    let mut next = frame.clone();
                    next.captured_at = Instant::now();
                    if sender.blocking_send(next).is_err() {
                        break;
                    }
                    std::thread::sleep(interval);
                }
            })
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_dimensions() {
        let source = FileSource::test_pattern(64, 48);
        let frame = source.capture_frame().unwrap();
        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 48);
        assert_eq!(frame.data.len(), 64 * 48 * 3);
        assert!(frame.to_rgb_image().is_ok());
    }

    #[tokio::test]
    async fn test_stream_emits_and_stops() {
        let source = FileSource::test_pattern(8, 8);
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let stop = Arc::new(AtomicBool::new(false));

        source.start_stream(tx, Arc::clone(&stop)).unwrap();

        let first = rx.recv().await.expect("stream should deliver a frame");
        assert_eq!(first.width, 8);

        stop.store(true, Ordering::SeqCst);
        // Drain until the stream thread exits and drops the sender
        while rx.recv().await.is_some() {}
    }
}
