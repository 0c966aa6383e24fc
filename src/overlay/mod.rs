// SPDX-License-Identifier: GPL-3.0-only

//! Watermark overlay rendering
//!
//! Stamps the capture timestamp (top left), session name (top right) and
//! word-wrapped location text (bottom center) onto a photo, producing an
//! `IMG_<ms>_watermarked.jpg` next to the original. The original is removed
//! only after the stamped file has been written; any failure leaves the
//! original untouched and returns its path unchanged.

pub mod font;

use std::path::{Path, PathBuf};

use image::Rgb;
use tracing::{debug, warn};

use crate::constants::overlay as overlay_constants;
use crate::errors::PhotoError;
use crate::storage;
use font::TextPainter;

const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const SHADOW_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Renders the burned-in watermark
#[derive(Debug, Clone, Copy)]
pub struct OverlayRenderer {
    painter: TextPainter,
    jpeg_quality: u8,
}

impl OverlayRenderer {
    pub fn new(text_scale: u32, jpeg_quality: u8) -> Self {
        Self {
            painter: TextPainter::new(text_scale),
            jpeg_quality,
        }
    }

    /// Stamp the watermark onto `original`
    ///
    /// Returns the path of the stamped file, or the original path when
    /// stamping fails for any reason (decode, draw, write). Stamping is
    /// CPU-bound and blocking; call from a blocking task.
    pub fn stamp(
        &self,
        original: &Path,
        session_name: &str,
        timestamp: &str,
        location: &str,
    ) -> PathBuf {
        match self.try_stamp(original, session_name, timestamp, location) {
            Ok(stamped) => {
                debug!(path = %stamped.display(), "Overlay stamped");
                stamped
            }
            Err(e) => {
                warn!(path = %original.display(), error = %e, "Overlay failed, keeping original");
                original.to_path_buf()
            }
        }
    }

    fn try_stamp(
        &self,
        original: &Path,
        session_name: &str,
        timestamp: &str,
        location: &str,
    ) -> Result<PathBuf, PhotoError> {
        let decoded = image::open(original)
            .map_err(|e| PhotoError::EncodingFailed(format!("decode: {}", e)))?;
        let mut image = decoded.to_rgb8();
        let (width, height) = image.dimensions();

        let margin = overlay_constants::SIDE_MARGIN;
        let shadow_offset = overlay_constants::SHADOW_OFFSET;

        // Top left: timestamp
        self.painter.draw_text_with_shadow(
            &mut image,
            timestamp,
            margin as i64,
            overlay_constants::TOP_MARGIN as i64,
            TEXT_COLOR,
            SHADOW_COLOR,
            shadow_offset,
        );

        // Top right: session name
        let session_width = self.painter.text_width(session_name);
        let session_x = width.saturating_sub(session_width + margin) as i64;
        self.painter.draw_text_with_shadow(
            &mut image,
            session_name,
            session_x,
            overlay_constants::TOP_MARGIN as i64,
            TEXT_COLOR,
            SHADOW_COLOR,
            shadow_offset,
        );

        // Bottom center: wrapped location text
        let wrap_width = width.saturating_sub(overlay_constants::WRAP_INSET);
        let lines = wrap_text(location, wrap_width, |s| self.painter.text_width(s));

        let line_advance = self.painter.line_height() + overlay_constants::LINE_SPACING;
        let total_height = lines.len() as u32 * line_advance;
        let mut line_y =
            height.saturating_sub(total_height + overlay_constants::BOTTOM_MARGIN) as i64;

        for line in &lines {
            let line_width = self.painter.text_width(line);
            let line_x = (width.saturating_sub(line_width) / 2) as i64;
            self.painter.draw_text_with_shadow(
                &mut image,
                line,
                line_x,
                line_y,
                TEXT_COLOR,
                SHADOW_COLOR,
                shadow_offset,
            );
            line_y += line_advance as i64;
        }

        // Write the stamped file before touching the original
        let parent = original
            .parent()
            .ok_or_else(|| PhotoError::SaveFailed("original has no parent dir".to_string()))?;
        let stamped_path = parent.join(storage::stamped_file_name(storage::epoch_millis()));

        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, self.jpeg_quality);
        encoder
            .encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| PhotoError::EncodingFailed(e.to_string()))?;

        std::fs::write(&stamped_path, &buffer)?;

        // Clean up the original only after the stamped file exists
        if stamped_path != original && original.exists() {
            if let Err(e) = std::fs::remove_file(original) {
                warn!(path = %original.display(), error = %e, "Failed to remove original");
            }
        }

        Ok(stamped_path)
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(
            overlay_constants::TEXT_SCALE,
            overlay_constants::JPEG_QUALITY,
        )
    }
}

/// Greedy word wrap using cumulative text measurement
///
/// Words are packed onto a line while the measured line fits `max_width`.
/// A single word wider than the limit gets its own overflowing line.
/// Joining the returned lines with single spaces reconstructs the input
/// (modulo repeated whitespace).
pub fn wrap_text(text: &str, max_width: u32, measure: impl Fn(&str) -> u32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };

        if measure(&candidate) <= max_width {
            current = candidate;
        } else if current.is_empty() {
            // Single word wider than the limit: emit it whole
            lines.push(word.to_string());
        } else {
            lines.push(current);
            current = word.to_string();
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(text.to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Width model: 8 px per character
    fn measure(s: &str) -> u32 {
        s.chars().count() as u32 * 8
    }

    #[test]
    fn test_wrap_reconstructs_input() {
        let inputs = [
            "12 Harbour Road, Docklands, Porthaven, Westshire PH1 2AB, United Kingdom",
            "short",
            "a b c d e f g h i j k l m n o p",
        ];
        for input in inputs {
            let lines = wrap_text(input, 20 * 8, measure);
            assert_eq!(lines.join(" "), input, "wrap must not lose words");
        }
    }

    #[test]
    fn test_wrap_respects_width() {
        let lines = wrap_text("one two three four five", 9 * 8, measure);
        for line in &lines {
            assert!(measure(line) <= 9 * 8, "line too wide: {:?}", line);
        }
    }

    #[test]
    fn test_wrap_single_word_overflow() {
        let lines = wrap_text("incomprehensibilities", 5 * 8, measure);
        assert_eq!(lines, vec!["incomprehensibilities".to_string()]);
    }

    #[test]
    fn test_wrap_empty_input() {
        let lines = wrap_text("", 80, measure);
        assert_eq!(lines, vec![String::new()]);
    }

    #[test]
    fn test_stamp_produces_new_file_and_removes_original() {
        let tmp = tempfile::tempdir().unwrap();
        let original = tmp.path().join("IMG_1.jpg");
        image::RgbImage::from_pixel(320, 240, Rgb([40, 80, 120]))
            .save(&original)
            .unwrap();

        let renderer = OverlayRenderer::default();
        let stamped = renderer.stamp(&original, "bridge-north", "2026-08-07 10:00:00", "Porthaven");

        assert_ne!(stamped, original);
        assert!(stamped.exists());
        assert!(!original.exists(), "original must be removed on success");
        assert!(
            stamped
                .file_name()
                .unwrap()
                .to_string_lossy()
                .ends_with("_watermarked.jpg")
        );
        // Stamped file must still decode with the same dimensions
        let reloaded = image::open(&stamped).unwrap().to_rgb8();
        assert_eq!(reloaded.dimensions(), (320, 240));
    }

    #[test]
    fn test_stamp_failure_returns_original() {
        let tmp = tempfile::tempdir().unwrap();
        let original = tmp.path().join("IMG_1.jpg");
        std::fs::write(&original, b"not a jpeg").unwrap();

        let renderer = OverlayRenderer::default();
        let result = renderer.stamp(&original, "s", "t", "l");

        assert_eq!(result, original);
        assert!(original.exists(), "failure must not destroy the original");
        assert_eq!(std::fs::read(&original).unwrap(), b"not a jpeg");
    }
}
