use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::orientation::domain::direction::Direction;
use crate::session::domain::session::{capture_file_name, ScreenshotRecord, Session};
use crate::session::domain::session_store::{SessionStore, StoreError};
use crate::shared::constants::APP_DIR_NAME;

/// Session document on disk: the session row plus its captures.
#[derive(Debug, Serialize, Deserialize)]
struct SessionDocument {
    session: Session,
    screenshots: Vec<ScreenshotRecord>,
}

/// Stores sessions as JSON documents and captures as PNG files.
///
/// Layout under `root`:
/// - `sessions/{session_id}.json`
/// - `captures/{user_id}/{session_id}/{DIRECTION}_{timestamp}.png`
pub struct FileSessionStore {
    root: PathBuf,
    // Serializes read-modify-write of session documents.
    lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join("sessions"))?;
        fs::create_dir_all(root.join("captures"))?;
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    /// `dirs::data_dir()/Headwatch`, if the platform has one.
    pub fn default_root() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join(APP_DIR_NAME))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, session_id: &str) -> PathBuf {
        self.root
            .join("sessions")
            .join(format!("{}.json", path_component(session_id)))
    }

    fn read(&self, session_id: &str) -> Result<Option<SessionDocument>, StoreError> {
        let path = self.document_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn write(&self, doc: &SessionDocument) -> Result<(), StoreError> {
        let path = self.document_path(&doc.session.id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(doc)?)?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    /// Loads, mutates and saves one session document under the store lock.
    fn update<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut SessionDocument) -> T,
    ) -> Result<T, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = self
            .read(session_id)?
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        let out = f(&mut doc);
        self.write(&doc)?;
        Ok(out)
    }
}

impl SessionStore for FileSessionStore {
    fn create_session(&self, user_id: &str) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let doc = SessionDocument {
            session: Session::start(id.clone(), user_id.to_string(), Utc::now()),
            screenshots: Vec::new(),
        };
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.write(&doc)?;
        log::info!("Session created: {id}");
        Ok(id)
    }

    fn finish_session(&self, session_id: &str) -> Result<(), StoreError> {
        self.update(session_id, |doc| doc.session.finish(Utc::now()))?;
        log::info!("Session finished: {session_id}");
        Ok(())
    }

    fn persist_capture(
        &self,
        session_id: &str,
        user_id: &str,
        image: &[u8],
        direction: Direction,
        captured_at: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        if self.read(session_id)?.is_none() {
            return Err(StoreError::NotFound(session_id.to_string()));
        }

        let dir = self
            .root
            .join("captures")
            .join(path_component(user_id))
            .join(path_component(session_id));
        fs::create_dir_all(&dir)?;
        let path = dir.join(capture_file_name(direction, captured_at));
        fs::write(&path, image)?;
        let url = format!("file://{}", path.display());

        let record = ScreenshotRecord {
            session_id: session_id.to_string(),
            image_url: url.clone(),
            direction,
            captured_at,
        };
        self.update(session_id, |doc| doc.screenshots.push(record))?;
        Ok(url)
    }

    fn set_preview_if_absent(&self, session_id: &str, url: &str) -> Result<(), StoreError> {
        self.update(session_id, |doc| {
            if doc.session.preview_image.is_none() {
                doc.session.preview_image = Some(url.to_string());
            }
        })
    }

    fn session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.read(session_id)?.map(|doc| doc.session))
    }

    fn screenshots(&self, session_id: &str) -> Result<Vec<ScreenshotRecord>, StoreError> {
        let mut shots = self
            .read(session_id)?
            .map(|doc| doc.screenshots)
            .unwrap_or_default();
        shots.sort_by_key(|s| s.captured_at);
        Ok(shots)
    }

    fn sessions_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<Session>, StoreError> {
        let mut sessions = Vec::new();
        for entry in fs::read_dir(self.root.join("sessions"))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let doc: SessionDocument = serde_json::from_str(&fs::read_to_string(&path)?)?;
            if doc.session.user_id == user_id {
                sessions.push(doc.session);
            }
        }
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    fn delete_session(&self, session_id: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let doc = self
            .read(session_id)?
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;

        let captures = self
            .root
            .join("captures")
            .join(path_component(&doc.session.user_id))
            .join(path_component(session_id));
        if captures.exists() {
            fs::remove_dir_all(&captures)?;
        }
        fs::remove_file(self.document_path(session_id))?;
        log::info!(
            "Session deleted: {session_id} ({} captures)",
            doc.screenshots.len()
        );
        Ok(())
    }
}

/// Restricts an id to characters safe for a single path component.
fn path_component(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::domain::session::SessionStatus;

    fn store() -> (tempfile::TempDir, FileSessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_create_session_is_active() {
        let (_dir, store) = store();
        let id = store.create_session("user-1").unwrap();
        let session = store.session(&id).unwrap().unwrap();
        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.ended_at.is_none());
        assert!(session.preview_image.is_none());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let (_dir, store) = store();
        let a = store.create_session("u").unwrap();
        let b = store.create_session("u").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_finish_session_sets_end_time() {
        let (_dir, store) = store();
        let id = store.create_session("u").unwrap();
        store.finish_session(&id).unwrap();
        let session = store.session(&id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Finished);
        assert!(session.ended_at.is_some());
    }

    #[test]
    fn test_finish_unknown_session_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.finish_session("missing"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_persist_capture_writes_file_and_record() {
        let (dir, store) = store();
        let id = store.create_session("user-1").unwrap();
        let at = Utc::now();
        let url = store
            .persist_capture(&id, "user-1", b"png-bytes", Direction::Left, at)
            .unwrap();

        let expected = dir
            .path()
            .join("captures")
            .join("user-1")
            .join(&id)
            .join(capture_file_name(Direction::Left, at));
        assert_eq!(url, format!("file://{}", expected.display()));
        assert_eq!(fs::read(&expected).unwrap(), b"png-bytes");

        let shots = store.screenshots(&id).unwrap();
        assert_eq!(shots.len(), 1);
        assert_eq!(shots[0].direction, Direction::Left);
        assert_eq!(shots[0].image_url, url);
    }

    #[test]
    fn test_persist_capture_for_unknown_session_fails() {
        let (_dir, store) = store();
        let result = store.persist_capture("nope", "u", b"x", Direction::Right, Utc::now());
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_preview_is_only_set_once() {
        let (_dir, store) = store();
        let id = store.create_session("u").unwrap();
        store.set_preview_if_absent(&id, "first").unwrap();
        store.set_preview_if_absent(&id, "second").unwrap();
        let session = store.session(&id).unwrap().unwrap();
        assert_eq!(session.preview_image.as_deref(), Some("first"));
    }

    #[test]
    fn test_screenshots_are_ordered_by_capture_time() {
        let (_dir, store) = store();
        let id = store.create_session("u").unwrap();
        let later = Utc::now();
        let earlier = later - chrono::Duration::seconds(10);
        store
            .persist_capture(&id, "u", b"b", Direction::Right, later)
            .unwrap();
        store
            .persist_capture(&id, "u", b"a", Direction::Left, earlier)
            .unwrap();
        let dirs: Vec<Direction> = store
            .screenshots(&id)
            .unwrap()
            .iter()
            .map(|s| s.direction)
            .collect();
        assert_eq!(dirs, vec![Direction::Left, Direction::Right]);
    }

    #[test]
    fn test_unknown_session_reads_as_absent() {
        let (_dir, store) = store();
        assert!(store.session("missing").unwrap().is_none());
        assert!(store.screenshots("missing").unwrap().is_empty());
    }

    #[test]
    fn test_sessions_for_user_newest_first_and_limited() {
        let (_dir, store) = store();
        let first = store.create_session("u").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store.create_session("u").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let third = store.create_session("u").unwrap();
        store.create_session("someone-else").unwrap();

        let ids: Vec<String> = store
            .sessions_for_user("u", 10)
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![third.clone(), second, first]);

        let limited = store.sessions_for_user("u", 1).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, third);
        assert!(store.sessions_for_user("nobody", 10).unwrap().is_empty());
    }

    #[test]
    fn test_delete_session_removes_document_and_captures() {
        let (dir, store) = store();
        let id = store.create_session("user-1").unwrap();
        let keep = store.create_session("user-1").unwrap();
        store
            .persist_capture(&id, "user-1", b"png", Direction::Left, Utc::now())
            .unwrap();
        let captures = dir.path().join("captures").join("user-1").join(&id);
        assert!(captures.exists());

        store.delete_session(&id).unwrap();
        assert!(store.session(&id).unwrap().is_none());
        assert!(!captures.exists());
        assert!(store.session(&keep).unwrap().is_some());
        assert_eq!(store.sessions_for_user("user-1", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_unknown_session_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.delete_session("missing"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_path_component_strips_traversal() {
        assert_eq!(path_component("../etc"), "___etc");
        assert_eq!(path_component("a-b_c9"), "a-b_c9");
        assert_eq!(path_component(""), "_");
    }
}
