// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end capture pipeline tests
//!
//! Drive a full capture with a file-backed camera, a static location
//! provider, and an in-memory store: capture → watermark → geotag →
//! view-model → persistence.

use std::sync::Arc;

use survey_camera::backends::camera::CameraProvider;
use survey_camera::backends::camera::file_source::FileSource;
use survey_camera::capture::{CaptureController, ControllerState, RecordingToggle};
use survey_camera::gallery::NullIndexer;
use survey_camera::location::LocationResolver;
use survey_camera::location::geocoder::{Address, StaticGeocoder};
use survey_camera::location::provider::StaticProvider;
use survey_camera::session::repository::{SqliteStore, SurveyStore};
use survey_camera::session::view_model::SessionViewModel;
use survey_camera::{exif, storage};

fn test_controller(media_root: &std::path::Path) -> CaptureController {
    let resolver = LocationResolver::new(
        Box::new(StaticProvider::at(51.5007, -0.1246)),
        Box::new(StaticGeocoder::new(Address {
            street_number: Some("12".to_string()),
            street: Some("Harbour Road".to_string()),
            locality: Some("Porthaven".to_string()),
            ..Default::default()
        })),
    );

    let mut controller = CaptureController::new(
        CameraProvider::new(),
        resolver,
        Arc::new(NullIndexer),
        media_root.to_path_buf(),
    );
    controller.bind_backend(Arc::new(FileSource::test_pattern(320, 240)));
    controller
}

#[tokio::test]
async fn test_photo_capture_reaches_store() {
    let media_dir = tempfile::tempdir().unwrap();
    let controller = test_controller(media_dir.path());

    let store: Arc<SqliteStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let view_model = SessionViewModel::new(Arc::clone(&store) as Arc<dyn SurveyStore>);
    view_model.set_session_name("bridge-north");

    let timestamp = SessionViewModel::current_timestamp();
    let item = controller
        .capture_photo("bridge-north", &timestamp, "fallback text")
        .await
        .unwrap();

    // Stamped file exists in the session folder, original removed
    assert!(item.file.starts_with(media_dir.path().join("bridge-north")));
    assert!(item.file.exists());
    assert_eq!(item.location, "12 Harbour Road, Porthaven");

    // GPS position survived the overlay re-encode
    let coords = exif::read_gps_position(&item.file).expect("geotag expected");
    assert!((coords.latitude - 51.5007).abs() < 1e-3);
    assert!((coords.longitude + 0.1246).abs() < 1e-3);

    // Persist through the view-model and read back from the store
    view_model.add_media_item(item.clone()).await.unwrap();
    let sessions = store.all_sessions().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].name, "bridge-north");
    assert_eq!(sessions[0].media[0].id, item.id);
}

#[tokio::test]
async fn test_video_toggle_roundtrip() {
    let media_dir = tempfile::tempdir().unwrap();
    let mut controller = test_controller(media_dir.path());

    let started = controller
        .toggle_recording("bridge-north", "2026-08-07 10:00:00", "Porthaven")
        .await
        .unwrap();
    assert!(matches!(started, RecordingToggle::Started));
    assert_eq!(controller.state(), ControllerState::Recording);

    tokio::time::sleep(std::time::Duration::from_millis(400)).await;

    let stopped = controller
        .toggle_recording("bridge-north", "ignored", "ignored")
        .await
        .unwrap();
    let RecordingToggle::Stopped(item) = stopped else {
        panic!("toggle while recording must stop");
    };

    assert!(item.is_video);
    assert!(item.file.exists());
    let bytes = std::fs::read(&item.file).unwrap();
    assert_eq!(&bytes[0..4], b"RIFF", "recorder output is an AVI container");

    // Listing picks up the recording
    let files = storage::session_media_files(media_dir.path(), "bridge-north").await;
    assert!(files.contains(&item.file));
}

#[tokio::test]
async fn test_import_runs_pipeline_on_existing_image() {
    let media_dir = tempfile::tempdir().unwrap();
    let import_dir = tempfile::tempdir().unwrap();

    // An existing photo, as if taken earlier on another device
    let source_path = import_dir.path().join("old-photo.jpg");
    image::RgbImage::from_pixel(200, 150, image::Rgb([90, 90, 90]))
        .save(&source_path)
        .unwrap();

    let resolver = LocationResolver::new(
        Box::new(StaticProvider::at(48.8584, 2.2945)),
        Box::new(StaticGeocoder::new(Address {
            locality: Some("Paris".to_string()),
            ..Default::default()
        })),
    );
    let mut controller = CaptureController::new(
        CameraProvider::new(),
        resolver,
        Arc::new(NullIndexer),
        media_dir.path().to_path_buf(),
    );
    controller.bind_backend(Arc::new(FileSource::from_image(&source_path).unwrap()));

    let item = controller
        .capture_photo("imports", "2026-08-07 11:00:00", "fallback")
        .await
        .unwrap();

    assert!(item.file.exists());
    assert_eq!(item.location, "Paris");
    // The import source itself is untouched
    assert!(source_path.exists());
}
