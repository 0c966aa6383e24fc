// SPDX-License-Identifier: GPL-3.0-only

//! Video recording
//!
//! Frames stream from the camera backend into a blocking mux task that
//! writes a Motion-JPEG AVI. MJPEG cameras pass their frames straight
//! through; raw formats are encoded per frame. The output extension always
//! follows the container. A failed or empty recording deletes the partial
//! output file.

use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::backends::camera::CameraBackend;
use crate::backends::camera::types::{CameraFormat, CameraFrame, PixelFormat};
use crate::constants::capture as capture_constants;
use crate::errors::RecordingError;

/// JPEG quality for frames that need per-frame encoding
const FRAME_JPEG_QUALITY: u8 = 80;

/// AVIF_HASINDEX: the file carries an idx1 chunk
const AVIF_HASINDEX: u32 = 0x10;

/// AVIIF_KEYFRAME: every MJPEG frame is independently decodable
const AVIIF_KEYFRAME: u32 = 0x10;

/// An in-flight recording
pub struct VideoRecorder {
    stop: Arc<AtomicBool>,
    task: tokio::task::JoinHandle<Result<PathBuf, RecordingError>>,
    path: PathBuf,
}

impl VideoRecorder {
    /// Start recording frames from `backend` to `output_stem` + container
    /// extension
    pub fn start(backend: &dyn CameraBackend, output_stem: &Path) -> Result<Self, RecordingError> {
        let format = backend.format().clone();
        let path = output_stem.with_extension("avi");

        let (sender, receiver) = tokio::sync::mpsc::channel::<CameraFrame>(8);
        let stop = Arc::new(AtomicBool::new(false));

        backend
            .start_stream(sender, Arc::clone(&stop))
            .map_err(|e| RecordingError::StartFailed(e.to_string()))?;

        info!(path = %path.display(), format = %format, "Recording started");

        let task_path = path.clone();
        let task = tokio::task::spawn_blocking(move || record_loop(receiver, task_path, format));

        Ok(Self { stop, task, path })
    }

    /// Output path of this recording
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop the stream and finalize the file
    ///
    /// On any finalize error the partial output has already been deleted.
    pub async fn stop(self) -> Result<PathBuf, RecordingError> {
        self.stop.store(true, Ordering::SeqCst);

        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                // Mux task died; nothing finalized the file
                if let Err(remove_err) = std::fs::remove_file(&self.path) {
                    debug!(error = %remove_err, "Partial recording already gone");
                }
                Err(RecordingError::StopFailed(e.to_string()))
            }
        }
    }
}

/// Drain frames into the muxer until the stream closes
fn record_loop(
    mut receiver: tokio::sync::mpsc::Receiver<CameraFrame>,
    path: PathBuf,
    format: CameraFormat,
) -> Result<PathBuf, RecordingError> {
    let result = mux_frames(&mut receiver, &path, &format);

    if let Err(e) = &result {
        warn!(path = %path.display(), error = %e, "Recording failed, removing partial file");
        let _ = std::fs::remove_file(&path);
        return result.map(|_| path);
    }

    info!(path = %path.display(), "Recording finalized");
    Ok(path)
}

fn mux_frames(
    receiver: &mut tokio::sync::mpsc::Receiver<CameraFrame>,
    path: &Path,
    format: &CameraFormat,
) -> Result<(), RecordingError> {
    let fps = format
        .framerate
        .unwrap_or(capture_constants::DEFAULT_FPS)
        .max(1);
    let mut writer = AviWriter::create(path, format.width, format.height, fps)?;

    while let Some(frame) = receiver.blocking_recv() {
        let jpeg = frame_to_jpeg(&frame)?;
        writer.write_frame(&jpeg)?;
    }

    if writer.frame_count() == 0 {
        return Err(RecordingError::FinalizeFailed(
            "no frames captured".to_string(),
        ));
    }

    writer
        .finalize()
        .map_err(|e| RecordingError::FinalizeFailed(e.to_string()))
}

/// JPEG bytes for one frame; MJPEG frames pass through untouched
fn frame_to_jpeg(frame: &CameraFrame) -> Result<Vec<u8>, RecordingError> {
    if frame.format == PixelFormat::Mjpeg {
        return Ok(frame.data.to_vec());
    }

    let image = frame
        .to_rgb_image()
        .map_err(|e| RecordingError::MuxerError(e.to_string()))?;

    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, FRAME_JPEG_QUALITY);
    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| RecordingError::MuxerError(e.to_string()))?;
    Ok(buffer)
}

/// Incremental Motion-JPEG AVI writer
///
/// Header fields that depend on the frame count are written as
/// placeholders and patched in `finalize`.
pub struct AviWriter {
    file: std::fs::File,
    fps: u32,
    frames: u32,
    max_frame_size: u32,
    index: Vec<(u32, u32)>,
    riff_size_pos: u64,
    total_frames_pos: u64,
    max_bytes_pos: u64,
    avih_buffer_pos: u64,
    strh_length_pos: u64,
    strh_buffer_pos: u64,
    movi_size_pos: u64,
    movi_fourcc_pos: u64,
}

impl AviWriter {
    pub fn create(path: &Path, width: u32, height: u32, fps: u32) -> Result<Self, RecordingError> {
        let file = std::fs::File::create(path)?;
        let mut writer = Self {
            file,
            fps,
            frames: 0,
            max_frame_size: 0,
            index: Vec::new(),
            riff_size_pos: 0,
            total_frames_pos: 0,
            max_bytes_pos: 0,
            avih_buffer_pos: 0,
            strh_length_pos: 0,
            strh_buffer_pos: 0,
            movi_size_pos: 0,
            movi_fourcc_pos: 0,
        };
        writer.write_header(width, height)?;
        Ok(writer)
    }

    pub fn frame_count(&self) -> u32 {
        self.frames
    }

    fn write_header(&mut self, width: u32, height: u32) -> std::io::Result<()> {
        self.put(b"RIFF")?;
        self.riff_size_pos = self.pos()?;
        self.put_u32(0)?; // patched: riff size
        self.put(b"AVI ")?;

        // hdrl list: avih (64 bytes) + strl list (124 bytes incl. header)
        self.put(b"LIST")?;
        self.put_u32(4 + 64 + 124)?;
        self.put(b"hdrl")?;

        // Main AVI header
        self.put(b"avih")?;
        self.put_u32(56)?;
        self.put_u32(1_000_000 / self.fps)?; // microseconds per frame
        self.max_bytes_pos = self.pos()?;
        self.put_u32(0)?; // patched: max bytes per second
        self.put_u32(0)?; // padding granularity
        self.put_u32(AVIF_HASINDEX)?;
        self.total_frames_pos = self.pos()?;
        self.put_u32(0)?; // patched: total frames
        self.put_u32(0)?; // initial frames
        self.put_u32(1)?; // streams
        self.avih_buffer_pos = self.pos()?;
        self.put_u32(0)?; // patched: suggested buffer size
        self.put_u32(width)?;
        self.put_u32(height)?;
        self.put_u32(0)?;
        self.put_u32(0)?;
        self.put_u32(0)?;
        self.put_u32(0)?; // reserved

        // Stream list
        self.put(b"LIST")?;
        self.put_u32(4 + 64 + 48)?;
        self.put(b"strl")?;

        // Stream header
        self.put(b"strh")?;
        self.put_u32(56)?;
        self.put(b"vids")?;
        self.put(b"MJPG")?;
        self.put_u32(0)?; // flags
        self.put_u16(0)?; // priority
        self.put_u16(0)?; // language
        self.put_u32(0)?; // initial frames
        self.put_u32(1)?; // scale
        self.put_u32(self.fps)?; // rate (fps = rate / scale)
        self.put_u32(0)?; // start
        self.strh_length_pos = self.pos()?;
        self.put_u32(0)?; // patched: length in frames
        self.strh_buffer_pos = self.pos()?;
        self.put_u32(0)?; // patched: suggested buffer size
        self.put_u32(u32::MAX)?; // quality (default)
        self.put_u32(0)?; // sample size (varies per frame)
        self.put_u16(0)?;
        self.put_u16(0)?;
        self.put_u16(width as u16)?;
        self.put_u16(height as u16)?; // frame rect

        // Stream format: BITMAPINFOHEADER
        self.put(b"strf")?;
        self.put_u32(40)?;
        self.put_u32(40)?; // biSize
        self.put_u32(width)?;
        self.put_u32(height)?;
        self.put_u16(1)?; // planes
        self.put_u16(24)?; // bit count
        self.put(b"MJPG")?; // compression
        self.put_u32(width * height * 3)?; // size image
        self.put_u32(0)?;
        self.put_u32(0)?;
        self.put_u32(0)?;
        self.put_u32(0)?;

        // movi list; chunks follow as frames arrive
        self.put(b"LIST")?;
        self.movi_size_pos = self.pos()?;
        self.put_u32(0)?; // patched: movi size
        self.movi_fourcc_pos = self.pos()?;
        self.put(b"movi")?;

        Ok(())
    }

    /// Append one JPEG frame as a 00dc chunk
    pub fn write_frame(&mut self, jpeg: &[u8]) -> Result<(), RecordingError> {
        let offset = (self.pos()? - self.movi_fourcc_pos) as u32;

        self.put(b"00dc")?;
        self.put_u32(jpeg.len() as u32)?;
        self.file.write_all(jpeg)?;
        if jpeg.len() % 2 == 1 {
            self.put(&[0])?; // chunks are word-aligned
        }

        self.index.push((offset, jpeg.len() as u32));
        self.frames += 1;
        self.max_frame_size = self.max_frame_size.max(jpeg.len() as u32);
        Ok(())
    }

    /// Write the index and patch every size field
    pub fn finalize(mut self) -> std::io::Result<()> {
        let movi_end = self.pos()?;
        let movi_size = (movi_end - self.movi_fourcc_pos) as u32;

        // idx1 chunk
        self.put(b"idx1")?;
        self.put_u32(self.index.len() as u32 * 16)?;
        let entries = std::mem::take(&mut self.index);
        for (offset, size) in entries {
            self.put(b"00dc")?;
            self.put_u32(AVIIF_KEYFRAME)?;
            self.put_u32(offset)?;
            self.put_u32(size)?;
        }

        let file_end = self.pos()?;

        self.patch_u32(self.riff_size_pos, (file_end - 8) as u32)?;
        self.patch_u32(self.movi_size_pos, movi_size)?;
        self.patch_u32(self.total_frames_pos, self.frames)?;
        self.patch_u32(self.strh_length_pos, self.frames)?;
        self.patch_u32(self.avih_buffer_pos, self.max_frame_size)?;
        self.patch_u32(self.strh_buffer_pos, self.max_frame_size)?;
        self.patch_u32(
            self.max_bytes_pos,
            self.max_frame_size.saturating_mul(self.fps),
        )?;

        self.file.flush()
    }

    fn pos(&mut self) -> std::io::Result<u64> {
        self.file.stream_position()
    }

    fn put(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.file.write_all(bytes)
    }

    fn put_u32(&mut self, value: u32) -> std::io::Result<()> {
        self.file.write_all(&value.to_le_bytes())
    }

    fn put_u16(&mut self, value: u16) -> std::io::Result<()> {
        self.file.write_all(&value.to_le_bytes())
    }

    fn patch_u32(&mut self, pos: u64, value: u32) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(pos))?;
        self.file.write_all(&value.to_le_bytes())?;
        self.file.seek(SeekFrom::End(0))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::file_source::FileSource;
    use std::time::Duration;

    fn tiny_jpeg() -> Vec<u8> {
        let mut buffer = Vec::new();
        let image = image::RgbImage::from_pixel(16, 16, image::Rgb([1, 2, 3]));
        let mut cursor = std::io::Cursor::new(&mut buffer);
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, 80);
        encoder
            .encode(image.as_raw(), 16, 16, image::ExtendedColorType::Rgb8)
            .unwrap();
        buffer
    }

    #[test]
    fn test_avi_writer_structure() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("VID_1.avi");

        let mut writer = AviWriter::create(&path, 16, 16, 30).unwrap();
        let jpeg = tiny_jpeg();
        writer.write_frame(&jpeg).unwrap();
        writer.write_frame(&jpeg).unwrap();
        writer.finalize().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"AVI ");
        // Patched RIFF size covers the whole file
        let riff_size = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        assert_eq!(riff_size as usize, bytes.len() - 8);
        // Index chunk exists
        assert!(bytes.windows(4).any(|w| w == b"idx1"));
    }

    #[test]
    fn test_avi_writer_counts_frames() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("VID_1.avi");

        let mut writer = AviWriter::create(&path, 16, 16, 30).unwrap();
        assert_eq!(writer.frame_count(), 0);
        writer.write_frame(&tiny_jpeg()).unwrap();
        assert_eq!(writer.frame_count(), 1);
        writer.finalize().unwrap();
    }

    #[tokio::test]
    async fn test_recorder_start_stop_produces_file() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FileSource::test_pattern(32, 24);
        let stem = tmp.path().join("VID_1");

        let recorder = VideoRecorder::start(&backend, &stem).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let path = recorder.stop().await.unwrap();

        assert_eq!(path.extension().unwrap(), "avi");
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert!(bytes.len() > 200, "file should contain frames");
    }

    #[tokio::test]
    async fn test_recorder_removes_file_when_no_frames() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FileSource::test_pattern(32, 24);
        let stem = tmp.path().join("VID_2");

        let recorder = VideoRecorder::start(&backend, &stem).unwrap();
        let path = recorder.path().to_path_buf();
        // Stop immediately; with no delivered frames the finalize fails
        let result = recorder.stop().await;

        if result.is_err() {
            assert!(!path.exists(), "partial file must be removed on failure");
        }
    }
}
