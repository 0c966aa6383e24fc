// SPDX-License-Identifier: GPL-3.0-only

//! Session and media data model
//!
//! A session is a named collection of captured media from one survey visit.
//! Media items reference their session by name only; the name is the join
//! key throughout the store.

pub mod repository;
pub mod view_model;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Crop rectangle attached to a media item after capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropData {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One captured photo or video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Stable identifier assigned at capture time
    pub id: String,
    /// Absolute path of the media file
    pub file: PathBuf,
    /// file:// URI of the media file
    pub uri: String,
    pub is_video: bool,
    /// Human-readable capture timestamp
    pub timestamp: String,
    /// Address text resolved at capture time
    pub location: String,
    /// Owning session, by name
    pub session_name: String,
    /// Selection flag for the save-session flow
    pub is_selected: bool,
    pub crop: Option<CropData>,
}

impl MediaItem {
    pub fn new(
        file: PathBuf,
        is_video: bool,
        timestamp: impl Into<String>,
        location: impl Into<String>,
        session_name: impl Into<String>,
    ) -> Self {
        let uri = file_uri(&file);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file,
            uri,
            is_video,
            timestamp: timestamp.into(),
            location: location.into(),
            session_name: session_name.into(),
            is_selected: false,
            crop: None,
        }
    }
}

/// Named collection of captured media
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub name: String,
    pub media: Vec<MediaItem>,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            media: Vec::new(),
        }
    }
}

/// file:// URI for a local path
pub fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}
