// SPDX-License-Identifier: GPL-3.0-only

//! Gallery integration
//!
//! Desktop media indexers pick files up lazily; an explicit index request
//! per produced file makes captures show up in gallery apps right away.
//! Indexing is best-effort: failures are reported to the caller and logged,
//! never fatal to a capture.

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::storage;

/// Requests indexing of produced media files
pub trait MediaIndexer: Send + Sync {
    /// Ask the platform indexer to pick up one file
    fn index_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<(), AppError>>;
}

/// Tracker3 indexer reached over the session D-Bus
///
/// Uses the miner's IndexLocation method, the same request `tracker3 index`
/// issues. Absent Tracker (non-GNOME desktops) the call fails and the
/// caller logs it.
pub struct TrackerIndexer;

impl MediaIndexer for TrackerIndexer {
    fn index_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<(), AppError>> {
        Box::pin(async move {
            let service_err = |e: &dyn std::fmt::Display| AppError::Other(e.to_string());

            let connection = zbus::Connection::session()
                .await
                .map_err(|e| service_err(&e))?;

            let proxy = zbus::Proxy::new(
                &connection,
                "org.freedesktop.Tracker3.Miner.Files",
                "/org/freedesktop/Tracker3/Miner/Files/Index",
                "org.freedesktop.Tracker3.Miner.Files.Index",
            )
            .await
            .map_err(|e| service_err(&e))?;

            let uri = format!("file://{}", path.display());
            let _: () = proxy
                .call("IndexLocation", &(uri.as_str(), Vec::<&str>::new(), Vec::<&str>::new()))
                .await
                .map_err(|e| service_err(&e))?;

            debug!(uri = %uri, "Index request sent");
            Ok(())
        })
    }
}

/// Indexer that does nothing; used in tests and on systems without an
/// indexing service
pub struct NullIndexer;

impl MediaIndexer for NullIndexer {
    fn index_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<(), AppError>> {
        debug!(path = %path.display(), "Index request skipped (null indexer)");
        Box::pin(async { Ok(()) })
    }
}

/// Request indexing for every media file in a session folder
pub async fn scan_session_dir(indexer: &dyn MediaIndexer, media_root: &Path, session_name: &str) {
    let files = storage::session_media_files(media_root, session_name).await;
    info!(session = session_name, files = files.len(), "Scanning session folder");
    for file in files {
        if let Err(e) = indexer.index_file(&file).await {
            warn!(path = %file.display(), error = %e, "Index request failed");
        }
    }
}

/// Open a session folder in the default file/gallery viewer
///
/// A missing or empty folder is a no-op.
pub fn open_session_in_gallery(media_root: &Path, session_name: &str) -> Result<(), AppError> {
    let dir: PathBuf = storage::session_dir(media_root, session_name);

    let has_files = std::fs::read_dir(&dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);
    if !has_files {
        debug!(session = session_name, "Nothing to show in gallery");
        return Ok(());
    }

    open::that(&dir).map_err(|e| AppError::Storage(format!("open gallery: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_indexer_accepts_any_path() {
        let indexer = NullIndexer;
        assert!(indexer.index_file(Path::new("/nowhere/IMG_1.jpg")).await.is_ok());
    }

    #[test]
    fn test_open_empty_session_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        // Folder does not exist at all
        assert!(open_session_in_gallery(tmp.path(), "nope").is_ok());
        // Folder exists but is empty
        std::fs::create_dir_all(tmp.path().join("empty")).unwrap();
        assert!(open_session_in_gallery(tmp.path(), "empty").is_ok());
    }
}
