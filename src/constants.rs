// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Folder created under the user's Pictures directory; one subfolder per
/// survey session lives inside it.
pub const APP_FOLDER_NAME: &str = "SurveyApp";

/// Format string for the human-readable capture timestamp burned into the
/// watermark and stored on each media item.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Watermark overlay geometry
pub mod overlay {
    /// Horizontal margin for the top-left timestamp and top-right session name
    pub const SIDE_MARGIN: u32 = 20;

    /// Vertical offset of the top text row
    pub const TOP_MARGIN: u32 = 20;

    /// Gap between the lowest location line and the bottom edge
    pub const BOTTOM_MARGIN: u32 = 15;

    /// Vertical spacing between wrapped location lines
    pub const LINE_SPACING: u32 = 6;

    /// Total horizontal inset subtracted from the image width to get the
    /// wrap width for the location text
    pub const WRAP_INSET: u32 = 60;

    /// Integer upscale factor applied to the 8x8 font glyphs
    pub const TEXT_SCALE: u32 = 4;

    /// Pixel offset of the black drop shadow behind the white text
    pub const SHADOW_OFFSET: u32 = 2;

    /// JPEG quality used when re-encoding the stamped image
    pub const JPEG_QUALITY: u8 = 95;
}

/// Location resolution constants
pub mod location {
    use std::time::Duration;

    /// A fix with accuracy worse than this falls back to the last known
    /// location
    pub const ACCURACY_THRESHOLD_M: f64 = 50.0;

    /// How long to wait for the location service to deliver a fix
    pub const FIX_TIMEOUT: Duration = Duration::from_secs(10);

    /// Poll interval while waiting for the service to publish a position
    pub const FIX_POLL_INTERVAL: Duration = Duration::from_millis(500);

    /// Address used when no fix could be obtained at all
    pub const UNAVAILABLE_TEXT: &str = "Location unavailable";

    /// Address used when geocoding succeeds but every component is blank
    pub const UNKNOWN_TEXT: &str = "Unknown Location";
}

/// Capture constants
pub mod capture {
    use std::time::Duration;

    /// Time to let the sensor settle before grabbing a single-shot frame
    pub const WARMUP: Duration = Duration::from_millis(500);

    /// Give up on a single-shot capture after this long without a frame
    pub const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

    /// Nominal framerate for the built-in recorder when the camera does not
    /// report one
    pub const DEFAULT_FPS: u32 = 30;
}

/// Media file formats recognized when listing a session folder
pub mod media_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

    /// Supported video file extensions
    pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }

    /// Check if a file extension is a supported video format
    pub fn is_video_extension(ext: &str) -> bool {
        VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }

    /// Check if a file extension is any supported media format
    pub fn is_media_extension(ext: &str) -> bool {
        is_image_extension(ext) || is_video_extension(ext)
    }
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
