// SPDX-License-Identifier: GPL-3.0-only

//! Session view-model
//!
//! Holds the three observable collections the UI binds to: the current UI
//! state, the pending captured media list, and the all-sessions list fed
//! from the store. Captured media updates are optimistic: the in-memory
//! list changes immediately and the durable write runs as a separate task;
//! a failed write inverts the in-memory change.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::repository::SurveyStore;
use super::{CropData, MediaItem, Session};
use crate::constants::TIMESTAMP_FORMAT;
use crate::errors::StoreError;

/// UI state observed by the capture screen
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiState {
    pub session_name: String,
    pub is_recording: bool,
    pub show_preview: bool,
}

/// View-model mediating UI state and persistence
pub struct SessionViewModel {
    store: Arc<dyn SurveyStore>,
    ui_state: Arc<watch::Sender<UiState>>,
    captured_media: Arc<watch::Sender<Vec<MediaItem>>>,
    all_sessions: Arc<watch::Sender<Vec<Session>>>,
}

impl SessionViewModel {
    /// Create the view-model and start observing the store's session stream
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(store: Arc<dyn SurveyStore>) -> Self {
        let ui_state = Arc::new(watch::Sender::new(UiState::default()));
        let captured_media = Arc::new(watch::Sender::new(Vec::new()));
        let all_sessions = Arc::new(watch::Sender::new(Vec::new()));

        // Mirror the store's session stream into our observable list
        let mut store_rx = store.watch_sessions();
        let sessions_tx = Arc::clone(&all_sessions);
        tokio::spawn(async move {
            loop {
                let current = store_rx.borrow_and_update().clone();
                sessions_tx.send_replace(current);
                if store_rx.changed().await.is_err() {
                    break;
                }
            }
        });

        Self {
            store,
            ui_state,
            captured_media,
            all_sessions,
        }
    }

    // Observables

    pub fn subscribe_ui_state(&self) -> watch::Receiver<UiState> {
        self.ui_state.subscribe()
    }

    pub fn subscribe_captured_media(&self) -> watch::Receiver<Vec<MediaItem>> {
        self.captured_media.subscribe()
    }

    pub fn subscribe_sessions(&self) -> watch::Receiver<Vec<Session>> {
        self.all_sessions.subscribe()
    }

    pub fn ui_state(&self) -> UiState {
        self.ui_state.borrow().clone()
    }

    pub fn captured_media(&self) -> Vec<MediaItem> {
        self.captured_media.borrow().clone()
    }

    pub fn all_sessions(&self) -> Vec<Session> {
        self.all_sessions.borrow().clone()
    }

    // UI state

    pub fn set_session_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.ui_state.send_modify(|state| state.session_name = name);
    }

    pub fn set_recording(&self, is_recording: bool) {
        self.ui_state
            .send_modify(|state| state.is_recording = is_recording);
    }

    pub fn set_preview_visible(&self, visible: bool) {
        self.ui_state
            .send_modify(|state| state.show_preview = visible);
    }

    /// Capture timestamp in the format stamped onto media
    pub fn current_timestamp() -> String {
        chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
    }

    // Captured media

    /// Add a captured item: the list updates immediately, persistence runs
    /// as a separate task, and a persistence failure rolls the addition
    /// back.
    ///
    /// The returned handle resolves when the durable write settles; callers
    /// may ignore it.
    pub fn add_media_item(&self, item: MediaItem) -> JoinHandle<()> {
        self.captured_media
            .send_modify(|media| media.push(item.clone()));

        let store = Arc::clone(&self.store);
        let captured_media = Arc::clone(&self.captured_media);
        tokio::spawn(async move {
            let to_persist = item.clone();
            let result = tokio::task::spawn_blocking(move || {
                store.insert_media_with_session(&to_persist)
            })
            .await
            .unwrap_or_else(|e| Err(StoreError::TaskFailed(e.to_string())));

            if let Err(e) = result {
                warn!(id = %item.id, error = %e, "Persisting capture failed, rolling back");
                captured_media.send_modify(|media| media.retain(|m| m.id != item.id));
            }
        })
    }

    /// Remove an item from the pending list; the store delete is
    /// best-effort
    pub fn remove_media_item(&self, id: &str) -> JoinHandle<()> {
        let id = id.to_string();
        self.captured_media
            .send_modify(|media| media.retain(|m| m.id != id));

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let delete_id = id.clone();
            let result = tokio::task::spawn_blocking(move || store.delete_media(&delete_id))
                .await
                .unwrap_or_else(|e| Err(StoreError::TaskFailed(e.to_string())));
            if let Err(e) = result {
                warn!(id = %id, error = %e, "Deleting media failed");
            }
        })
    }

    pub fn toggle_media_selection(&self, id: &str) {
        self.captured_media.send_modify(|media| {
            if let Some(item) = media.iter_mut().find(|m| m.id == id) {
                item.is_selected = !item.is_selected;
            }
        });
    }

    pub fn update_crop_data(&self, id: &str, crop: CropData) {
        self.captured_media.send_modify(|media| {
            if let Some(item) = media.iter_mut().find(|m| m.id == id) {
                item.crop = Some(crop);
            }
        });
    }

    pub fn clear_captured_media(&self) {
        self.captured_media.send_modify(Vec::clear);
    }

    pub fn selected_media(&self) -> Vec<MediaItem> {
        self.captured_media
            .borrow()
            .iter()
            .filter(|m| m.is_selected)
            .cloned()
            .collect()
    }

    // Sessions

    /// Commit the selected captures under the current session name
    ///
    /// An empty session name or an empty selection performs no store writes
    /// and is not an error.
    pub async fn save_session(&self) -> Result<(), StoreError> {
        let session_name = self.ui_state.borrow().session_name.clone();
        let selected = self.selected_media();

        if session_name.is_empty() || selected.is_empty() {
            debug!(
                session = %session_name,
                selected = selected.len(),
                "Nothing to save"
            );
            return Ok(());
        }

        let session = Session {
            name: session_name,
            media: selected.clone(),
        };

        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            store.insert_session(&session)?;
            for item in &session.media {
                store.insert_media(item)?;
            }
            Ok::<(), StoreError>(())
        })
        .await
        .unwrap_or_else(|e| Err(StoreError::TaskFailed(e.to_string())))?;

        self.clear_captured_media();
        Ok(())
    }

    /// Delete a session and its media records
    pub async fn delete_session(&self, name: &str) -> Result<(), StoreError> {
        let store = Arc::clone(&self.store);
        let session_name = name.to_string();
        tokio::task::spawn_blocking(move || store.delete_session(&session_name))
            .await
            .unwrap_or_else(|e| Err(StoreError::TaskFailed(e.to_string())))
    }

    pub fn session_by_name(&self, name: &str) -> Option<Session> {
        self.all_sessions
            .borrow()
            .iter()
            .find(|s| s.name == name)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::repository::SqliteStore;
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn item(session: &str) -> MediaItem {
        MediaItem::new(
            PathBuf::from("/tmp/IMG_1.jpg"),
            false,
            "2026-08-07 10:00:00",
            "Porthaven",
            session,
        )
    }

    /// Store double that records calls and can be told to fail inserts
    struct ScriptedStore {
        fail_inserts: bool,
        calls: Mutex<Vec<&'static str>>,
        sessions_tx: watch::Sender<Vec<Session>>,
    }

    impl ScriptedStore {
        fn new(fail_inserts: bool) -> Self {
            Self {
                fail_inserts,
                calls: Mutex::new(Vec::new()),
                sessions_tx: watch::Sender::new(Vec::new()),
            }
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn failure(&self) -> Result<(), StoreError> {
            if self.fail_inserts {
                Err(StoreError::QueryFailed("disk full".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl SurveyStore for ScriptedStore {
        fn all_sessions(&self) -> Result<Vec<Session>, StoreError> {
            Ok(Vec::new())
        }

        fn watch_sessions(&self) -> watch::Receiver<Vec<Session>> {
            self.sessions_tx.subscribe()
        }

        fn insert_session(&self, _session: &Session) -> Result<(), StoreError> {
            self.record("insert_session");
            self.failure()
        }

        fn insert_media(&self, _item: &MediaItem) -> Result<(), StoreError> {
            self.record("insert_media");
            self.failure()
        }

        fn insert_media_with_session(&self, _item: &MediaItem) -> Result<(), StoreError> {
            self.record("insert_media_with_session");
            self.failure()
        }

        fn delete_media(&self, _id: &str) -> Result<(), StoreError> {
            self.record("delete_media");
            Ok(())
        }

        fn delete_session(&self, _name: &str) -> Result<(), StoreError> {
            self.record("delete_session");
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_add_media_item_is_optimistic() {
        let vm = SessionViewModel::new(Arc::new(ScriptedStore::new(false)));
        let media = item("s1");

        let handle = vm.add_media_item(media.clone());
        // Visible immediately, before persistence settles
        assert_eq!(vm.captured_media().len(), 1);

        handle.await.unwrap();
        assert_eq!(vm.captured_media().len(), 1);
    }

    #[tokio::test]
    async fn test_add_media_item_rolls_back_on_failure() {
        let vm = SessionViewModel::new(Arc::new(ScriptedStore::new(true)));
        let media = item("s1");

        let handle = vm.add_media_item(media.clone());
        handle.await.unwrap();

        assert!(
            vm.captured_media().is_empty(),
            "failed persistence must revert the in-memory addition"
        );
    }

    #[tokio::test]
    async fn test_save_session_empty_name_writes_nothing() {
        let store = Arc::new(ScriptedStore::new(false));
        let vm = SessionViewModel::new(Arc::clone(&store) as Arc<dyn SurveyStore>);

        let mut media = item("s1");
        media.is_selected = true;
        vm.add_media_item(media).await.unwrap();

        // Session name left empty
        vm.save_session().await.unwrap();
        assert!(
            !store.calls().contains(&"insert_session"),
            "empty name must be a silent no-op"
        );
    }

    #[tokio::test]
    async fn test_save_session_no_selection_writes_nothing() {
        let store = Arc::new(ScriptedStore::new(false));
        let vm = SessionViewModel::new(Arc::clone(&store) as Arc<dyn SurveyStore>);

        vm.set_session_name("bridge-north");
        vm.add_media_item(item("bridge-north")).await.unwrap();

        vm.save_session().await.unwrap();
        assert!(
            !store.calls().contains(&"insert_session"),
            "no selection must be a silent no-op"
        );
    }

    #[tokio::test]
    async fn test_save_session_commits_selected_only() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let vm = SessionViewModel::new(Arc::clone(&store) as Arc<dyn SurveyStore>);
        vm.set_session_name("bridge-north");

        let selected = item("bridge-north");
        let unselected = item("bridge-north");
        vm.add_media_item(selected.clone()).await.unwrap();
        vm.add_media_item(unselected.clone()).await.unwrap();
        vm.toggle_media_selection(&selected.id);

        vm.save_session().await.unwrap();

        // Pending list is cleared after a save
        assert!(vm.captured_media().is_empty());

        let sessions = store.all_sessions().unwrap();
        let session = sessions.iter().find(|s| s.name == "bridge-north").unwrap();
        let saved = session.media.iter().find(|m| m.id == selected.id).unwrap();
        assert!(saved.is_selected);
    }

    #[tokio::test]
    async fn test_toggle_and_crop_update() {
        let vm = SessionViewModel::new(Arc::new(ScriptedStore::new(false)));
        let media = item("s1");
        vm.add_media_item(media.clone()).await.unwrap();

        vm.toggle_media_selection(&media.id);
        assert_eq!(vm.selected_media().len(), 1);
        vm.toggle_media_selection(&media.id);
        assert!(vm.selected_media().is_empty());

        let crop = CropData {
            x: 1,
            y: 2,
            width: 3,
            height: 4,
        };
        vm.update_crop_data(&media.id, crop);
        assert_eq!(vm.captured_media()[0].crop, Some(crop));
    }

    #[tokio::test]
    async fn test_sessions_stream_reaches_view_model() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let vm = SessionViewModel::new(Arc::clone(&store) as Arc<dyn SurveyStore>);

        let mut rx = vm.subscribe_sessions();
        vm.add_media_item(item("s1")).await.unwrap();

        // The store publishes, the forwarding task mirrors it here
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            loop {
                if !rx.borrow().is_empty() {
                    break;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("session stream should deliver the new session");

        assert_eq!(vm.session_by_name("s1").unwrap().name, "s1");
    }
}
