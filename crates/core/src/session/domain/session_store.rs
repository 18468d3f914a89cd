use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::orientation::domain::direction::Direction;
use crate::session::domain::session::{ScreenshotRecord, Session};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed store document: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("unexpected store response: {0}")]
    UnexpectedResponse(String),
    #[error("missing store setting {0}")]
    MissingSetting(&'static str),
}

/// Persistence for sessions and their captures.
///
/// Calls block; async callers go through `spawn_blocking`.
pub trait SessionStore: Send + Sync {
    /// Records a new active session and returns its id.
    fn create_session(&self, user_id: &str) -> Result<String, StoreError>;

    /// Marks the session finished with the current time.
    fn finish_session(&self, session_id: &str) -> Result<(), StoreError>;

    /// Uploads an encoded capture, records it against the session and
    /// returns the capture's URL.
    fn persist_capture(
        &self,
        session_id: &str,
        user_id: &str,
        image: &[u8],
        direction: Direction,
        captured_at: DateTime<Utc>,
    ) -> Result<String, StoreError>;

    /// Sets the session's preview image unless one is already set.
    fn set_preview_if_absent(&self, session_id: &str, url: &str) -> Result<(), StoreError>;

    fn session(&self, session_id: &str) -> Result<Option<Session>, StoreError>;

    /// Captures of a session, oldest first.
    fn screenshots(&self, session_id: &str) -> Result<Vec<ScreenshotRecord>, StoreError>;

    /// A user's sessions, newest first, at most `limit` of them.
    fn sessions_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<Session>, StoreError>;

    /// Removes a session together with its capture records and images.
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id.
    fn delete_session(&self, session_id: &str) -> Result<(), StoreError>;
}
