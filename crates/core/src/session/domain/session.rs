use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::orientation::domain::direction::Direction;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Finished,
}

/// One monitoring run as persisted by a [`SessionStore`](super::session_store::SessionStore).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// URL of the first capture, set once.
    pub preview_image: Option<String>,
}

impl Session {
    pub fn start(id: String, user_id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            status: SessionStatus::Active,
            started_at,
            ended_at: None,
            preview_image: None,
        }
    }

    pub fn finish(&mut self, ended_at: DateTime<Utc>) {
        self.status = SessionStatus::Finished;
        self.ended_at = Some(ended_at);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotRecord {
    pub session_id: String,
    pub image_url: String,
    pub direction: Direction,
    pub captured_at: DateTime<Utc>,
}

/// `LEFT_20240501_142233_017.png`: direction plus millisecond timestamp.
pub fn capture_file_name(direction: Direction, captured_at: DateTime<Utc>) -> String {
    format!(
        "{direction}_{}.png",
        captured_at.format("%Y%m%d_%H%M%S_%3f")
    )
}

/// Object key of a capture: `{user_id}/{session_id}/{file_name}`.
pub fn capture_object_path(user_id: &str, session_id: &str, file_name: &str) -> String {
    format!("{user_id}/{session_id}/{file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 14, 22, 33).unwrap()
            + chrono::Duration::milliseconds(17)
    }

    #[test]
    fn test_capture_file_name_format() {
        assert_eq!(
            capture_file_name(Direction::Left, at()),
            "LEFT_20240501_142233_017.png"
        );
        assert_eq!(
            capture_file_name(Direction::Right, at()),
            "RIGHT_20240501_142233_017.png"
        );
    }

    #[test]
    fn test_capture_object_path() {
        assert_eq!(
            capture_object_path("u1", "s1", "LEFT_x.png"),
            "u1/s1/LEFT_x.png"
        );
    }

    #[test]
    fn test_session_lifecycle() {
        let mut session = Session::start("s1".into(), "u1".into(), at());
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.ended_at.is_none());

        session.finish(at());
        assert_eq!(session.status, SessionStatus::Finished);
        assert_eq!(session.ended_at, Some(at()));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Active).unwrap(),
            "\"active\""
        );
        assert_eq!(
            serde_json::to_string(&SessionStatus::Finished).unwrap(),
            "\"finished\""
        );
    }
}
