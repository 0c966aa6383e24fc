// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the survey camera

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera-related errors
    Camera(CameraError),
    /// Recording-related errors
    Recording(RecordingError),
    /// Photo capture errors
    Photo(PhotoError),
    /// Location resolution errors
    Location(LocationError),
    /// Session/media store errors
    Store(StoreError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Camera-specific errors
#[derive(Debug, Clone)]
pub enum CameraError {
    /// No camera devices found
    NoCameraFound,
    /// No camera matching the requested facing
    NoCameraForFacing(String),
    /// Camera initialization failed
    InitializationFailed(String),
    /// No camera is bound to the controller
    NotBound,
    /// Camera is busy (e.g., a recording is in progress)
    Busy,
}

/// Recording-specific errors
#[derive(Debug, Clone)]
pub enum RecordingError {
    /// Failed to start recording
    StartFailed(String),
    /// Failed to stop recording
    StopFailed(String),
    /// Recording already in progress
    AlreadyRecording,
    /// No recording in progress
    NotRecording,
    /// Container muxing failed
    MuxerError(String),
    /// Finalizing the output file failed; the partial file has been removed
    FinalizeFailed(String),
}

/// Photo capture errors
#[derive(Debug, Clone)]
pub enum PhotoError {
    /// No frame available for capture
    NoFrameAvailable,
    /// Capture failed
    CaptureFailed(String),
    /// Encoding failed
    EncodingFailed(String),
    /// Save failed
    SaveFailed(String),
    /// Embedded metadata read/write failed
    MetadataFailed(String),
}

/// Location resolution errors
#[derive(Debug, Clone)]
pub enum LocationError {
    /// Location service could not be reached
    ServiceUnavailable(String),
    /// No position fix was delivered before the deadline
    Timeout,
    /// Reverse geocoding failed
    GeocodeFailed(String),
}

/// Session/media store errors
#[derive(Debug, Clone)]
pub enum StoreError {
    /// Opening the database failed
    OpenFailed(String),
    /// A query or statement failed
    QueryFailed(String),
    /// The blocking task running the query was cancelled or panicked
    TaskFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Recording(e) => write!(f, "Recording error: {}", e),
            AppError::Photo(e) => write!(f, "Photo error: {}", e),
            AppError::Location(e) => write!(f, "Location error: {}", e),
            AppError::Store(e) => write!(f, "Store error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::NoCameraFound => write!(f, "No camera devices found"),
            CameraError::NoCameraForFacing(facing) => {
                write!(f, "No camera with {} facing found", facing)
            }
            CameraError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            CameraError::NotBound => write!(f, "No camera bound"),
            CameraError::Busy => write!(f, "Camera is busy"),
        }
    }
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::StartFailed(msg) => write!(f, "Failed to start recording: {}", msg),
            RecordingError::StopFailed(msg) => write!(f, "Failed to stop recording: {}", msg),
            RecordingError::AlreadyRecording => write!(f, "Recording already in progress"),
            RecordingError::NotRecording => write!(f, "No recording in progress"),
            RecordingError::MuxerError(msg) => write!(f, "Muxer error: {}", msg),
            RecordingError::FinalizeFailed(msg) => {
                write!(f, "Failed to finalize recording: {}", msg)
            }
        }
    }
}

impl fmt::Display for PhotoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhotoError::NoFrameAvailable => write!(f, "No frame available for capture"),
            PhotoError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            PhotoError::EncodingFailed(msg) => write!(f, "Encoding failed: {}", msg),
            PhotoError::SaveFailed(msg) => write!(f, "Save failed: {}", msg),
            PhotoError::MetadataFailed(msg) => write!(f, "Metadata update failed: {}", msg),
        }
    }
}

impl fmt::Display for LocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationError::ServiceUnavailable(msg) => {
                write!(f, "Location service unavailable: {}", msg)
            }
            LocationError::Timeout => write!(f, "Timed out waiting for a position fix"),
            LocationError::GeocodeFailed(msg) => write!(f, "Reverse geocoding failed: {}", msg),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::OpenFailed(msg) => write!(f, "Failed to open database: {}", msg),
            StoreError::QueryFailed(msg) => write!(f, "Query failed: {}", msg),
            StoreError::TaskFailed(msg) => write!(f, "Store task failed: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for RecordingError {}
impl std::error::Error for PhotoError {}
impl std::error::Error for LocationError {}
impl std::error::Error for StoreError {}

// Conversions from sub-errors to AppError
impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<RecordingError> for AppError {
    fn from(err: RecordingError) -> Self {
        AppError::Recording(err)
    }
}

impl From<PhotoError> for AppError {
    fn from(err: PhotoError) -> Self {
        AppError::Photo(err)
    }
}

impl From<LocationError> for AppError {
    fn from(err: LocationError) -> Self {
        AppError::Location(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::QueryFailed(err.to_string())
    }
}

// Conversions for I/O errors
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for PhotoError {
    fn from(err: std::io::Error) -> Self {
        PhotoError::SaveFailed(err.to_string())
    }
}

impl From<std::io::Error> for RecordingError {
    fn from(err: std::io::Error) -> Self {
        RecordingError::MuxerError(err.to_string())
    }
}
