// SPDX-License-Identifier: GPL-3.0-only

//! Capture controller
//!
//! Owns the camera binding and sequences the capture pipelines:
//!
//! ```text
//! photo:  capture → save → resolve location → overlay → geotag → index
//! video:  toggle → stream frames → mux → finalize → index
//! ```
//!
//! The controller is an explicit state machine over
//! `{Idle, Bound, CapturingPhoto, Recording}`; the recording toggle is a
//! state transition, so a second start request while recording stops the
//! current recording instead of racing it.
//!
//! The photo pipeline runs in a spawned task: dropping the caller's future
//! does not cancel outstanding steps, a capture either finishes or fails on
//! its own.

pub mod recorder;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::backends::camera::types::{CameraFrame, LensFacing};
use crate::backends::camera::{CameraBackend, CameraProvider};
use crate::errors::{AppError, CameraError, PhotoError, RecordingError};
use crate::exif;
use crate::gallery::MediaIndexer;
use crate::location::{Coordinates, LocationResolver};
use crate::overlay::OverlayRenderer;
use crate::session::MediaItem;
use crate::storage;
use recorder::VideoRecorder;

/// JPEG quality for the initially saved capture
const CAPTURE_JPEG_QUALITY: u8 = 95;

/// Camera use-case state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No camera bound
    Idle,
    /// Camera bound, ready to capture
    Bound,
    /// A photo pipeline is in flight
    CapturingPhoto,
    /// A video recording is in flight
    Recording,
}

/// Outcome of a recording toggle request
#[derive(Debug)]
pub enum RecordingToggle {
    /// A new recording was started
    Started,
    /// The in-flight recording was stopped and finalized
    Stopped(MediaItem),
}

/// Metadata captured when a recording starts, applied at finalize
struct ActiveRecording {
    recorder: VideoRecorder,
    session_name: String,
    timestamp: String,
    location: String,
}

/// Sequences captures against one exclusively-owned camera
pub struct CaptureController {
    provider: CameraProvider,
    backend: Option<Arc<dyn CameraBackend>>,
    facing: LensFacing,
    state: Arc<Mutex<ControllerState>>,
    resolver: Arc<LocationResolver>,
    indexer: Arc<dyn MediaIndexer>,
    overlay: OverlayRenderer,
    media_root: PathBuf,
    recording: Option<ActiveRecording>,
}

impl CaptureController {
    pub fn new(
        provider: CameraProvider,
        resolver: LocationResolver,
        indexer: Arc<dyn MediaIndexer>,
        media_root: PathBuf,
    ) -> Self {
        Self {
            provider,
            backend: None,
            facing: LensFacing::default(),
            state: Arc::new(Mutex::new(ControllerState::Idle)),
            resolver: Arc::new(resolver),
            indexer,
            overlay: OverlayRenderer::default(),
            media_root,
            recording: None,
        }
    }

    pub fn with_overlay(mut self, overlay: OverlayRenderer) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock().expect("state lock poisoned")
    }

    pub fn is_recording(&self) -> bool {
        self.state() == ControllerState::Recording
    }

    pub fn facing(&self) -> LensFacing {
        self.facing
    }

    /// Bind the camera matching the preferred facing
    pub fn bind(&mut self, facing: LensFacing) -> Result<(), CameraError> {
        if self.state() == ControllerState::Recording {
            return Err(CameraError::Busy);
        }

        let backend = self
            .provider
            .open_facing(facing)
            .map_err(|e| CameraError::InitializationFailed(e.to_string()))?;

        info!(camera = %backend.descriptor().name, facing = %facing, "Camera bound");
        self.facing = facing;
        self.backend = Some(Arc::from(backend));
        *self.state.lock().expect("state lock poisoned") = ControllerState::Bound;
        Ok(())
    }

    /// Bind an already-opened backend (file sources, tests)
    pub fn bind_backend(&mut self, backend: Arc<dyn CameraBackend>) {
        self.facing = backend.descriptor().facing;
        self.backend = Some(backend);
        *self.state.lock().expect("state lock poisoned") = ControllerState::Bound;
    }

    /// Flip between front and back cameras
    ///
    /// Tears down the current binding and rebinds through the provider.
    pub fn switch_camera(&mut self) -> Result<(), CameraError> {
        if self.state() == ControllerState::Recording {
            return Err(CameraError::Busy);
        }

        let facing = self.facing.flipped();
        self.backend = None;
        *self.state.lock().expect("state lock poisoned") = ControllerState::Idle;
        self.bind(facing)
    }

    /// Capture a photo and run it through the full pipeline
    ///
    /// `fallback_location` is stamped when location resolution fails
    /// mid-pipeline; the capture itself never aborts for location reasons.
    pub async fn capture_photo(
        &self,
        session_name: &str,
        timestamp: &str,
        fallback_location: &str,
    ) -> Result<MediaItem, AppError> {
        let backend = {
            let mut state = self.state.lock().expect("state lock poisoned");
            match *state {
                ControllerState::Bound => {}
                ControllerState::Idle => return Err(CameraError::NotBound.into()),
                _ => return Err(CameraError::Busy.into()),
            }
            let backend = self.backend.clone().ok_or(CameraError::NotBound)?;
            *state = ControllerState::CapturingPhoto;
            backend
        };

        let state = Arc::clone(&self.state);
        let resolver = Arc::clone(&self.resolver);
        let indexer = Arc::clone(&self.indexer);
        let overlay = self.overlay;
        let media_root = self.media_root.clone();
        let session = session_name.to_string();
        let timestamp = timestamp.to_string();
        let fallback = fallback_location.to_string();

        // The pipeline keeps running even if the caller is cancelled
        let task = tokio::spawn(async move {
            let result = photo_pipeline(
                backend, resolver, indexer, overlay, media_root, session, timestamp, fallback,
            )
            .await;
            *state.lock().expect("state lock poisoned") = ControllerState::Bound;
            result
        });

        task.await
            .unwrap_or_else(|e| Err(AppError::Photo(PhotoError::CaptureFailed(e.to_string()))))
    }

    /// Toggle video recording
    ///
    /// `Bound` starts a recording; `Recording` stops the one in flight.
    pub async fn toggle_recording(
        &mut self,
        session_name: &str,
        timestamp: &str,
        location: &str,
    ) -> Result<RecordingToggle, AppError> {
        match self.state() {
            ControllerState::Recording => {
                let item = self.stop_recording().await?;
                Ok(RecordingToggle::Stopped(item))
            }
            ControllerState::Bound => {
                self.start_recording(session_name, timestamp, location)?;
                Ok(RecordingToggle::Started)
            }
            ControllerState::Idle => Err(CameraError::NotBound.into()),
            ControllerState::CapturingPhoto => Err(CameraError::Busy.into()),
        }
    }

    fn start_recording(
        &mut self,
        session_name: &str,
        timestamp: &str,
        location: &str,
    ) -> Result<(), AppError> {
        let backend = self.backend.as_ref().ok_or(CameraError::NotBound)?;

        let session_dir = storage::create_session_dir(&self.media_root, session_name)?;
        let stem = session_dir.join(storage::video_file_stem(storage::epoch_millis()));

        let recorder = VideoRecorder::start(backend.as_ref(), &stem)?;
        self.recording = Some(ActiveRecording {
            recorder,
            session_name: session_name.to_string(),
            timestamp: timestamp.to_string(),
            location: location.to_string(),
        });
        *self.state.lock().expect("state lock poisoned") = ControllerState::Recording;
        Ok(())
    }

    /// Stop the in-flight recording and finalize its file
    pub async fn stop_recording(&mut self) -> Result<MediaItem, AppError> {
        let active = self
            .recording
            .take()
            .ok_or(RecordingError::NotRecording)?;

        let result = active.recorder.stop().await;
        *self.state.lock().expect("state lock poisoned") = ControllerState::Bound;

        let path = result?;
        if let Err(e) = self.indexer.index_file(&path).await {
            warn!(path = %path.display(), error = %e, "Index request failed");
        }

        Ok(MediaItem::new(
            path,
            true,
            active.timestamp,
            active.location,
            active.session_name,
        ))
    }

    /// Path of a session's folder under this controller's media root
    pub fn session_folder_path(&self, session_name: &str) -> PathBuf {
        storage::session_dir(&self.media_root, session_name)
    }

    /// Media files captured into a session folder, newest first
    pub async fn session_media_files(&self, session_name: &str) -> Vec<PathBuf> {
        storage::session_media_files(&self.media_root, session_name).await
    }
}

/// The photo pipeline: capture → save → resolve → overlay → geotag → index
#[allow(clippy::too_many_arguments)]
async fn photo_pipeline(
    backend: Arc<dyn CameraBackend>,
    resolver: Arc<LocationResolver>,
    indexer: Arc<dyn MediaIndexer>,
    overlay: OverlayRenderer,
    media_root: PathBuf,
    session_name: String,
    timestamp: String,
    fallback_location: String,
) -> Result<MediaItem, AppError> {
    let session_dir = storage::create_session_dir(&media_root, &session_name)?;

    // Hardware capture errors are fatal to this capture
    let capture_backend = Arc::clone(&backend);
    let frame = tokio::task::spawn_blocking(move || capture_backend.capture_frame())
        .await
        .map_err(|e| PhotoError::CaptureFailed(e.to_string()))?
        .map_err(|e| PhotoError::CaptureFailed(e.to_string()))?;

    let photo_path = session_dir.join(storage::photo_file_name(storage::epoch_millis()));
    save_frame_as_jpeg(frame, photo_path.clone()).await?;
    info!(path = %photo_path.display(), "Photo saved");

    // Location failures degrade to the caller-supplied fallback text
    let (coordinates, location_text) = match resolver.resolve().await {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!(error = %e, "Location resolution failed, using fallback text");
            (Coordinates::ZERO, fallback_location)
        }
    };

    // Overlay re-encodes the image, so the GPS tags go into the stamped
    // file afterwards
    let stamp_session = session_name.clone();
    let stamp_timestamp = timestamp.clone();
    let stamp_location = location_text.clone();
    let stamped_path = tokio::task::spawn_blocking(move || {
        let stamped = overlay.stamp(&photo_path, &stamp_session, &stamp_timestamp, &stamp_location);
        exif::geotag_best_effort(&stamped, coordinates);
        stamped
    })
    .await
    .map_err(|e| PhotoError::SaveFailed(e.to_string()))?;

    if let Err(e) = indexer.index_file(&stamped_path).await {
        warn!(path = %stamped_path.display(), error = %e, "Index request failed");
    }

    Ok(MediaItem::new(
        stamped_path,
        false,
        timestamp,
        location_text,
        session_name,
    ))
}

/// Encode a camera frame to JPEG and write it to disk
async fn save_frame_as_jpeg(frame: CameraFrame, path: PathBuf) -> Result<(), AppError> {
    tokio::task::spawn_blocking(move || {
        // MJPEG frames are already a complete JPEG
        if frame.format.is_compressed() {
            std::fs::write(&path, &frame.data).map_err(PhotoError::from)?;
            return Ok(());
        }

        let image = frame
            .to_rgb_image()
            .map_err(|e| PhotoError::EncodingFailed(e.to_string()))?;

        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, CAPTURE_JPEG_QUALITY);
        encoder
            .encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| PhotoError::EncodingFailed(e.to_string()))?;

        std::fs::write(&path, &buffer).map_err(PhotoError::from)?;
        Ok::<(), PhotoError>(())
    })
    .await
    .map_err(|e| PhotoError::SaveFailed(e.to_string()))?
    .map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::file_source::FileSource;
    use crate::gallery::NullIndexer;
    use crate::location::geocoder::{Address, NoGeocoder, StaticGeocoder};
    use crate::location::provider::StaticProvider;

    fn controller(tmp: &std::path::Path) -> CaptureController {
        let resolver = LocationResolver::new(
            Box::new(StaticProvider::at(51.5007, -0.1246)),
            Box::new(StaticGeocoder::new(Address {
                locality: Some("Porthaven".to_string()),
                ..Default::default()
            })),
        );
        let mut controller = CaptureController::new(
            CameraProvider::new(),
            resolver,
            Arc::new(NullIndexer),
            tmp.to_path_buf(),
        );
        controller.bind_backend(Arc::new(FileSource::test_pattern(160, 120)));
        controller
    }

    #[tokio::test]
    async fn test_capture_photo_full_pipeline() {
        let tmp = tempfile::tempdir().unwrap();
        let controller = controller(tmp.path());

        let item = controller
            .capture_photo("bridge-north", "2026-08-07 10:00:00", "fallback")
            .await
            .unwrap();

        assert!(!item.is_video);
        assert_eq!(item.session_name, "bridge-north");
        assert_eq!(item.location, "Porthaven");
        assert!(item.file.exists());
        assert!(
            item.file
                .file_name()
                .unwrap()
                .to_string_lossy()
                .ends_with("_watermarked.jpg")
        );
        // The stamped file carries the GPS position
        let coords = exif::read_gps_position(&item.file).expect("stamped file should be geotagged");
        assert!((coords.latitude - 51.5007).abs() < 1e-3);
        // Pipeline is done, controller is ready again
        assert_eq!(controller.state(), ControllerState::Bound);
    }

    #[tokio::test]
    async fn test_capture_photo_location_failure_uses_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = LocationResolver::new(
            Box::new(StaticProvider::new(None)),
            Box::new(NoGeocoder),
        );
        let mut controller = CaptureController::new(
            CameraProvider::new(),
            resolver,
            Arc::new(NullIndexer),
            tmp.path().to_path_buf(),
        );
        controller.bind_backend(Arc::new(FileSource::test_pattern(64, 48)));

        let item = controller
            .capture_photo("s1", "2026-08-07 10:00:00", "Depot yard")
            .await
            .unwrap();

        // No fix at all resolves to the sentinel text, not an abort
        assert_eq!(item.location, "Location unavailable");
        assert!(item.file.exists());
    }

    #[tokio::test]
    async fn test_capture_requires_bound_state() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver =
            LocationResolver::new(Box::new(StaticProvider::new(None)), Box::new(NoGeocoder));
        let controller = CaptureController::new(
            CameraProvider::new(),
            resolver,
            Arc::new(NullIndexer),
            tmp.path().to_path_buf(),
        );

        let result = controller.capture_photo("s1", "t", "l").await;
        assert!(matches!(
            result,
            Err(AppError::Camera(CameraError::NotBound))
        ));
    }

    #[tokio::test]
    async fn test_recording_toggle_start_then_stop() {
        let tmp = tempfile::tempdir().unwrap();
        let mut controller = controller(tmp.path());

        let first = controller
            .toggle_recording("s1", "2026-08-07 10:00:00", "Porthaven")
            .await
            .unwrap();
        assert!(matches!(first, RecordingToggle::Started));
        assert!(controller.is_recording());

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;

        let second = controller
            .toggle_recording("s1", "2026-08-07 10:00:05", "Porthaven")
            .await
            .unwrap();
        let RecordingToggle::Stopped(item) = second else {
            panic!("second toggle must stop the recording");
        };
        assert!(item.is_video);
        assert!(item.file.exists());
        assert_eq!(item.timestamp, "2026-08-07 10:00:00", "metadata from start");
        assert_eq!(controller.state(), ControllerState::Bound);
    }

    #[tokio::test]
    async fn test_no_photo_while_recording() {
        let tmp = tempfile::tempdir().unwrap();
        let mut controller = controller(tmp.path());

        controller.toggle_recording("s1", "t", "l").await.unwrap();
        let result = controller.capture_photo("s1", "t", "l").await;
        assert!(matches!(result, Err(AppError::Camera(CameraError::Busy))));

        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        controller.stop_recording().await.unwrap();
    }

    #[tokio::test]
    async fn test_session_media_files_listing() {
        let tmp = tempfile::tempdir().unwrap();
        let controller = controller(tmp.path());

        controller
            .capture_photo("s1", "2026-08-07 10:00:00", "fallback")
            .await
            .unwrap();

        let files = controller.session_media_files("s1").await;
        assert_eq!(files.len(), 1);
        assert_eq!(
            controller.session_folder_path("s1"),
            tmp.path().join("s1")
        );
    }
}
