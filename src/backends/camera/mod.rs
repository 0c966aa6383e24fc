// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! A backend produces frames from some source: a V4L2 capture device for
//! real hardware, or a file-backed source for imports and tests. The
//! provider is an explicitly owned handle that enumerates devices and opens
//! backends; there is no process-global camera state.

pub mod file_source;
pub mod types;
pub mod v4l2;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use types::{BackendError, BackendResult, CameraDescriptor, CameraFormat, CameraFrame, LensFacing};

/// A bound camera able to deliver frames
pub trait CameraBackend: Send + Sync {
    /// Identity of the underlying device
    fn descriptor(&self) -> &CameraDescriptor;

    /// Negotiated capture format
    fn format(&self) -> &CameraFormat;

    /// Grab a single frame (blocking; includes sensor warm-up for hardware
    /// backends)
    fn capture_frame(&self) -> BackendResult<CameraFrame>;

    /// Start a frame stream on a dedicated thread
    ///
    /// Frames are pushed into `sender` until `stop` is set or the receiver
    /// is dropped. Returns once the stream thread is running.
    fn start_stream(
        &self,
        sender: tokio::sync::mpsc::Sender<CameraFrame>,
        stop: Arc<AtomicBool>,
    ) -> BackendResult<()>;
}

/// Owned handle for discovering and opening cameras
///
/// The controller holds exactly one provider; switching camera facing tears
/// down the bound backend and asks the provider for the other one.
#[derive(Debug, Default)]
pub struct CameraProvider;

impl CameraProvider {
    pub fn new() -> Self {
        Self
    }

    /// Enumerate all capture devices visible to the system
    pub fn enumerate(&self) -> Vec<CameraDescriptor> {
        v4l2::enumerate_cameras()
    }

    /// Open the camera matching the requested facing
    ///
    /// Falls back to the first available device when no device advertises
    /// the requested facing.
    pub fn open_facing(&self, facing: LensFacing) -> BackendResult<Box<dyn CameraBackend>> {
        let cameras = self.enumerate();
        if cameras.is_empty() {
            return Err(BackendError::DeviceNotFound(
                "no capture devices present".to_string(),
            ));
        }

        let descriptor = cameras
            .iter()
            .find(|c| c.facing == facing)
            .unwrap_or(&cameras[0])
            .clone();

        self.open(&descriptor)
    }

    /// Open a specific enumerated camera
    pub fn open(&self, descriptor: &CameraDescriptor) -> BackendResult<Box<dyn CameraBackend>> {
        let backend = v4l2::V4l2Backend::open(descriptor.clone())?;
        Ok(Box::new(backend))
    }
}
