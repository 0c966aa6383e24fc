// SPDX-License-Identifier: GPL-3.0-only

//! Storage layout for session media files
//!
//! All captured media lives under `<Pictures>/SurveyApp/<sessionName>/`,
//! with epoch-millisecond file names:
//! `IMG_<ms>.jpg`, `IMG_<ms>_watermarked.jpg`, `VID_<ms>.<ext>`.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::constants::{APP_FOLDER_NAME, media_formats};

/// Root directory for all survey media
///
/// Falls back to the home directory, then the current directory, when the
/// platform reports no Pictures directory.
pub fn app_media_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(APP_FOLDER_NAME)
}

/// Directory for one session's media under the given media root
pub fn session_dir(media_root: &Path, session_name: &str) -> PathBuf {
    media_root.join(session_name)
}

/// Create the session directory if it does not exist yet
pub fn create_session_dir(media_root: &Path, session_name: &str) -> std::io::Result<PathBuf> {
    let dir = session_dir(media_root, session_name);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        debug!(path = %dir.display(), "Session folder created");
    }
    Ok(dir)
}

/// Current time as epoch milliseconds, used for media file names
pub fn epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// File name for a freshly captured photo
pub fn photo_file_name(epoch_ms: i64) -> String {
    format!("IMG_{}.jpg", epoch_ms)
}

/// File name for a watermarked photo
pub fn stamped_file_name(epoch_ms: i64) -> String {
    format!("IMG_{}_watermarked.jpg", epoch_ms)
}

/// File stem for a video recording; the recorder appends the container
/// extension
pub fn video_file_stem(epoch_ms: i64) -> String {
    format!("VID_{}", epoch_ms)
}

/// List media files in a session folder, newest first
///
/// Non-media files are skipped. A missing folder yields an empty list.
pub async fn session_media_files(media_root: &Path, session_name: &str) -> Vec<PathBuf> {
    let dir = session_dir(media_root, session_name);

    tokio::task::spawn_blocking(move || list_media_files(&dir))
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Media listing task failed");
            Vec::new()
        })
}

fn list_media_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<_> = entries
        .flatten()
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map(|ext| media_formats::is_media_extension(&ext.to_string_lossy()))
                .unwrap_or(false)
        })
        .collect();

    // Newest first
    files.sort_by_key(|e| {
        e.metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(std::cmp::Reverse)
    });

    files.into_iter().map(|e| e.path()).collect()
}
