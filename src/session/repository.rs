// SPDX-License-Identifier: GPL-3.0-only

//! Session/media persistence
//!
//! `SurveyStore` is a blocking trait; callers dispatch it through
//! `spawn_blocking`. The SQLite implementation serializes access behind a
//! mutex and publishes every change on a watch channel, which is the
//! all-sessions stream the view-model observes.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{Connection, params};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{CropData, MediaItem, Session};
use crate::errors::StoreError;
use crate::storage;

/// Persistence surface consumed by the view-model
pub trait SurveyStore: Send + Sync {
    /// All sessions with their media, capture order preserved
    fn all_sessions(&self) -> Result<Vec<Session>, StoreError>;

    /// Stream of session lists; a new value is published after every change
    fn watch_sessions(&self) -> watch::Receiver<Vec<Session>>;

    fn insert_session(&self, session: &Session) -> Result<(), StoreError>;

    fn insert_media(&self, item: &MediaItem) -> Result<(), StoreError>;

    /// Insert a media item, creating its session row when missing
    fn insert_media_with_session(&self, item: &MediaItem) -> Result<(), StoreError>;

    fn delete_media(&self, id: &str) -> Result<(), StoreError>;

    /// Delete a session and all its media
    fn delete_session(&self, name: &str) -> Result<(), StoreError>;
}

/// SQLite-backed store
pub struct SqliteStore {
    conn: Mutex<Connection>,
    sessions_tx: watch::Sender<Vec<Session>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::OpenFailed(format!("{}: {}", parent.display(), e)))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| StoreError::OpenFailed(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Database opened");

        Self::with_connection(conn)
    }

    /// Open the database at the default per-user data path
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(&default_db_path())
    }

    /// In-memory store for tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        let store = Self {
            conn: Mutex::new(conn),
            sessions_tx: watch::Sender::new(Vec::new()),
        };
        store.publish()?;
        Ok(store)
    }

    /// Reload the session list and publish it to watchers
    fn publish(&self) -> Result<(), StoreError> {
        let sessions = self.all_sessions()?;
        self.sessions_tx.send_replace(sessions);
        Ok(())
    }
}

/// Per-user database location
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("survey-camera")
        .join("survey.db")
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            name        TEXT PRIMARY KEY
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS media (
            id           TEXT PRIMARY KEY,
            file         TEXT NOT NULL,
            uri          TEXT NOT NULL,
            is_video     INTEGER NOT NULL,
            timestamp    TEXT NOT NULL,
            location     TEXT NOT NULL,
            session_name TEXT NOT NULL,
            is_selected  INTEGER NOT NULL DEFAULT 0,
            crop_x       INTEGER,
            crop_y       INTEGER,
            crop_width   INTEGER,
            crop_height  INTEGER,
            created_at   INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_media_session ON media(session_name)",
        [],
    )?;

    debug!("Database schema initialized");
    Ok(())
}

fn row_to_media(row: &rusqlite::Row<'_>) -> rusqlite::Result<MediaItem> {
    let crop = match (
        row.get::<_, Option<u32>>(8)?,
        row.get::<_, Option<u32>>(9)?,
        row.get::<_, Option<u32>>(10)?,
        row.get::<_, Option<u32>>(11)?,
    ) {
        (Some(x), Some(y), Some(width), Some(height)) => Some(CropData {
            x,
            y,
            width,
            height,
        }),
        _ => None,
    };

    Ok(MediaItem {
        id: row.get(0)?,
        file: PathBuf::from(row.get::<_, String>(1)?),
        uri: row.get(2)?,
        is_video: row.get(3)?,
        timestamp: row.get(4)?,
        location: row.get(5)?,
        session_name: row.get(6)?,
        is_selected: row.get(7)?,
        crop,
    })
}

const MEDIA_COLUMNS: &str =
    "id, file, uri, is_video, timestamp, location, session_name, is_selected, \
     crop_x, crop_y, crop_width, crop_height";

impl SqliteStore {
    fn insert_media_row(conn: &Connection, item: &MediaItem) -> Result<(), StoreError> {
        conn.execute(
            "INSERT OR REPLACE INTO media
                (id, file, uri, is_video, timestamp, location, session_name, is_selected,
                 crop_x, crop_y, crop_width, crop_height, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                item.id,
                item.file.to_string_lossy().into_owned(),
                item.uri,
                item.is_video,
                item.timestamp,
                item.location,
                item.session_name,
                item.is_selected,
                item.crop.map(|c| c.x),
                item.crop.map(|c| c.y),
                item.crop.map(|c| c.width),
                item.crop.map(|c| c.height),
                storage::epoch_millis(),
            ],
        )?;
        Ok(())
    }
}

impl SurveyStore for SqliteStore {
    fn all_sessions(&self) -> Result<Vec<Session>, StoreError> {
        let conn = self.conn.lock().expect("store lock poisoned");

        let mut names_stmt = conn.prepare("SELECT name FROM sessions ORDER BY name")?;
        let names: Vec<String> = names_stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;

        let mut media_stmt = conn.prepare(&format!(
            "SELECT {} FROM media WHERE session_name = ?1 ORDER BY created_at",
            MEDIA_COLUMNS
        ))?;

        let mut sessions = Vec::with_capacity(names.len());
        for name in names {
            let media: Vec<MediaItem> = media_stmt
                .query_map(params![name], row_to_media)?
                .collect::<rusqlite::Result<_>>()?;
            sessions.push(Session { name, media });
        }

        Ok(sessions)
    }

    fn watch_sessions(&self) -> watch::Receiver<Vec<Session>> {
        self.sessions_tx.subscribe()
    }

    fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        {
            let conn = self.conn.lock().expect("store lock poisoned");
            conn.execute(
                "INSERT OR IGNORE INTO sessions (name) VALUES (?1)",
                params![session.name],
            )?;
        }
        self.publish()
    }

    fn insert_media(&self, item: &MediaItem) -> Result<(), StoreError> {
        {
            let conn = self.conn.lock().expect("store lock poisoned");
            Self::insert_media_row(&conn, item)?;
        }
        self.publish()
    }

    fn insert_media_with_session(&self, item: &MediaItem) -> Result<(), StoreError> {
        {
            let conn = self.conn.lock().expect("store lock poisoned");
            conn.execute(
                "INSERT OR IGNORE INTO sessions (name) VALUES (?1)",
                params![item.session_name],
            )?;
            Self::insert_media_row(&conn, item)?;
        }
        self.publish()
    }

    fn delete_media(&self, id: &str) -> Result<(), StoreError> {
        {
            let conn = self.conn.lock().expect("store lock poisoned");
            conn.execute("DELETE FROM media WHERE id = ?1", params![id])?;
        }
        self.publish()
    }

    fn delete_session(&self, name: &str) -> Result<(), StoreError> {
        {
            let conn = self.conn.lock().expect("store lock poisoned");
            // Denormalized cascade: media rows join by session name
            conn.execute("DELETE FROM media WHERE session_name = ?1", params![name])?;
            conn.execute("DELETE FROM sessions WHERE name = ?1", params![name])?;
        }
        warn!(session = name, "Session deleted with media");
        self.publish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(session: &str, file: &str) -> MediaItem {
        MediaItem::new(
            PathBuf::from(file),
            false,
            "2026-08-07 10:00:00",
            "Porthaven",
            session,
        )
    }

    #[test]
    fn test_insert_media_with_session_creates_session() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_media_with_session(&item("s1", "/a.jpg")).unwrap();

        let sessions = store.all_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].name, "s1");
        assert_eq!(sessions[0].media.len(), 1);
    }

    #[test]
    fn test_media_order_is_capture_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = item("s1", "/a.jpg");
        let second = item("s1", "/b.jpg");
        store.insert_media_with_session(&first).unwrap();
        store.insert_media_with_session(&second).unwrap();

        let sessions = store.all_sessions().unwrap();
        assert_eq!(sessions[0].media[0].id, first.id);
        assert_eq!(sessions[0].media[1].id, second.id);
    }

    #[test]
    fn test_delete_session_cascades() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_media_with_session(&item("s1", "/a.jpg")).unwrap();
        store.insert_media_with_session(&item("s2", "/b.jpg")).unwrap();

        store.delete_session("s1").unwrap();

        let sessions = store.all_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].name, "s2");
    }

    #[test]
    fn test_delete_media_by_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        let kept = item("s1", "/a.jpg");
        let removed = item("s1", "/b.jpg");
        store.insert_media_with_session(&kept).unwrap();
        store.insert_media_with_session(&removed).unwrap();

        store.delete_media(&removed.id).unwrap();

        let sessions = store.all_sessions().unwrap();
        assert_eq!(sessions[0].media.len(), 1);
        assert_eq!(sessions[0].media[0].id, kept.id);
    }

    #[test]
    fn test_crop_data_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut media = item("s1", "/a.jpg");
        media.crop = Some(CropData {
            x: 10,
            y: 20,
            width: 300,
            height: 200,
        });
        store.insert_media_with_session(&media).unwrap();

        let sessions = store.all_sessions().unwrap();
        assert_eq!(sessions[0].media[0].crop, media.crop);
    }

    #[test]
    fn test_watch_publishes_changes() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rx = store.watch_sessions();
        assert!(rx.borrow().is_empty());

        store.insert_media_with_session(&item("s1", "/a.jpg")).unwrap();
        assert_eq!(rx.borrow().len(), 1);

        store.delete_session("s1").unwrap();
        assert!(rx.borrow().is_empty());
    }
}
