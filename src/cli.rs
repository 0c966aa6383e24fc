// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for survey capture
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Capturing geotagged, watermarked photos into a session
//! - Recording session videos
//! - Inspecting, opening, and deleting stored sessions

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use survey_camera::backends::camera::file_source::FileSource;
use survey_camera::backends::camera::types::LensFacing;
use survey_camera::backends::camera::CameraProvider;
use survey_camera::capture::{CaptureController, RecordingToggle};
use survey_camera::config::Config;
use survey_camera::gallery::{self, TrackerIndexer};
use survey_camera::location::LocationResolver;
use survey_camera::location::geocoder::{Geocoder, NoGeocoder, StaticGeocoder};
use survey_camera::location::provider::GeoClueProvider;
use survey_camera::overlay::OverlayRenderer;
use survey_camera::session::repository::{SqliteStore, SurveyStore};
use survey_camera::session::view_model::SessionViewModel;
use survey_camera::storage;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// List all available cameras
pub fn list_cameras() -> CliResult {
    let cameras = CameraProvider::new().enumerate();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for camera in &cameras {
        println!("  {} ({} facing)", camera.name, camera.facing);
        println!("      Device: {}", camera.path);
        if let Some(info) = &camera.device_info {
            println!("      Driver: {}", info.driver);
        }
        println!();
    }

    Ok(())
}

/// Capture a photo into a session
///
/// `input` runs the pipeline over an existing image file instead of a
/// camera, which is how previously taken photos are imported into a
/// session.
pub fn take_photo(
    session: String,
    location: Option<String>,
    input: Option<PathBuf>,
    front: bool,
) -> CliResult {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let config = Config::load();
        let mut controller = build_controller(&config);

        match input {
            Some(path) => {
                let source = FileSource::from_image(&path)?;
                controller.bind_backend(Arc::new(source));
            }
            None => {
                let facing = if front {
                    LensFacing::Front
                } else {
                    config.preferred_facing
                };
                controller.bind(facing)?;
            }
        }

        let store: Arc<dyn SurveyStore> = Arc::new(SqliteStore::open_default()?);
        let view_model = SessionViewModel::new(store);
        view_model.set_session_name(&session);

        let timestamp = SessionViewModel::current_timestamp();
        let fallback = location.unwrap_or_else(|| config.fallback_location.clone());

        println!("Capturing...");
        let item = controller.capture_photo(&session, &timestamp, &fallback).await?;

        println!("Photo saved: {}", item.file.display());
        println!("Location: {}", item.location);

        // Wait for the durable write before the process exits
        view_model.add_media_item(item).await?;
        Ok(())
    })
}

/// Record a video into a session
pub fn record_video(
    session: String,
    duration: u64,
    location: Option<String>,
    front: bool,
) -> CliResult {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let config = Config::load();
        let mut controller = build_controller(&config);

        let facing = if front {
            LensFacing::Front
        } else {
            config.preferred_facing
        };
        controller.bind(facing)?;

        let store: Arc<dyn SurveyStore> = Arc::new(SqliteStore::open_default()?);
        let view_model = SessionViewModel::new(store);
        view_model.set_session_name(&session);

        let timestamp = SessionViewModel::current_timestamp();
        let location_text = location.unwrap_or_else(|| config.fallback_location.clone());

        let started = controller
            .toggle_recording(&session, &timestamp, &location_text)
            .await?;
        if !matches!(started, RecordingToggle::Started) {
            return Err("camera was already recording".into());
        }
        view_model.set_recording(true);

        // Set up Ctrl+C handler
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_flag_clone = Arc::clone(&stop_flag);
        ctrlc::set_handler(move || {
            stop_flag_clone.store(true, Ordering::SeqCst);
        })?;

        println!();
        println!("Recording... (press Ctrl+C to stop early)");

        let start = Instant::now();
        let target = Duration::from_secs(duration);
        while start.elapsed() < target {
            if stop_flag.load(Ordering::SeqCst) {
                println!();
                println!("Stopping early...");
                break;
            }

            let elapsed = start.elapsed().as_secs();
            print!("\rRecording: {:02}:{:02}", elapsed / 60, elapsed % 60);
            use std::io::Write;
            std::io::stdout().flush()?;

            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        println!();

        // Second toggle stops the in-flight recording
        let stopped = controller
            .toggle_recording(&session, &timestamp, &location_text)
            .await?;
        view_model.set_recording(false);

        let RecordingToggle::Stopped(item) = stopped else {
            return Err("recording did not stop".into());
        };

        println!("Video saved: {}", item.file.display());
        view_model.add_media_item(item).await?;
        Ok(())
    })
}

/// List stored sessions with their media counts
pub fn list_sessions() -> CliResult {
    let store = SqliteStore::open_default()?;
    let sessions = store.all_sessions()?;

    if sessions.is_empty() {
        println!("No sessions recorded.");
        return Ok(());
    }

    println!("Sessions:");
    println!();
    for session in &sessions {
        let videos = session.media.iter().filter(|m| m.is_video).count();
        let photos = session.media.len() - videos;
        println!("  {}", session.name);
        println!("      {} photos, {} videos", photos, videos);
        if let Some(first) = session.media.first() {
            println!("      First capture: {}", first.timestamp);
        }
        println!();
    }

    Ok(())
}

/// Delete a session and its media records
pub fn delete_session(name: String) -> CliResult {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let store: Arc<dyn SurveyStore> = Arc::new(SqliteStore::open_default()?);
        let view_model = SessionViewModel::new(store);
        view_model.delete_session(&name).await?;
        println!("Session '{}' deleted.", name);
        Ok(())
    })
}

/// Re-index a session folder and open it in the default viewer
pub fn open_gallery(session: String) -> CliResult {
    let rt = tokio::runtime::Runtime::new()?;
    let media_root = storage::app_media_dir();

    rt.block_on(async {
        gallery::scan_session_dir(&TrackerIndexer, &media_root, &session).await;
    });

    gallery::open_session_in_gallery(&media_root, &session)?;
    Ok(())
}

/// Wire a controller from configuration: GeoClue positioning, configured
/// site address (or raw coordinates), Tracker indexing
fn build_controller(config: &Config) -> CaptureController {
    let geocoder: Box<dyn Geocoder> = match &config.site_address {
        Some(address) => Box::new(StaticGeocoder::new(address.clone())),
        None => Box::new(NoGeocoder),
    };
    let resolver = LocationResolver::new(
        Box::new(GeoClueProvider::new(config.desktop_id.clone())),
        geocoder,
    );

    CaptureController::new(
        CameraProvider::new(),
        resolver,
        Arc::new(TrackerIndexer),
        storage::app_media_dir(),
    )
    .with_overlay(OverlayRenderer::new(config.overlay_scale, config.jpeg_quality))
}
