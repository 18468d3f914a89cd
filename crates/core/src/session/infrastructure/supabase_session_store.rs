//! Session store backed by a Supabase project's REST endpoints.
//!
//! Rows go through PostgREST (`/rest/v1`), capture images through the
//! Storage API (`/storage/v1`) into a public bucket.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::orientation::domain::direction::Direction;
use crate::session::domain::session::{
    capture_file_name, capture_object_path, ScreenshotRecord, Session,
};
use crate::session::domain::session_store::{SessionStore, StoreError};
use crate::shared::constants::SCREENSHOT_BUCKET;

pub const URL_ENV: &str = "SUPABASE_URL";
pub const KEY_ENV: &str = "SUPABASE_ANON_KEY";

#[derive(Clone, Debug, PartialEq)]
pub struct SupabaseConfig {
    pub url: String,
    pub api_key: String,
    pub bucket: String,
}

impl SupabaseConfig {
    /// Reads the project URL and key from `SUPABASE_URL` / `SUPABASE_ANON_KEY`.
    pub fn from_env() -> Result<Self, StoreError> {
        let url = std::env::var(URL_ENV).map_err(|_| StoreError::MissingSetting(URL_ENV))?;
        let api_key = std::env::var(KEY_ENV).map_err(|_| StoreError::MissingSetting(KEY_ENV))?;
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            api_key,
            bucket: SCREENSHOT_BUCKET.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.url)
    }

    fn upload_url(&self, object_path: &str) -> String {
        format!("{}/storage/v1/object/{}/{object_path}", self.url, self.bucket)
    }

    fn bucket_url(&self) -> String {
        format!("{}/storage/v1/object/{}", self.url, self.bucket)
    }

    /// Object key of a public capture URL issued by this project.
    fn object_path(&self, public_url: &str) -> Option<String> {
        public_url
            .strip_prefix(&self.public_url(""))
            .filter(|path| !path.is_empty())
            .map(str::to_string)
    }

    fn public_url(&self, object_path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{object_path}",
            self.url, self.bucket
        )
    }
}

pub struct SupabaseSessionStore {
    config: SupabaseConfig,
    client: Client,
}

impl SupabaseSessionStore {
    /// Builds the blocking HTTP client; must not be called from inside an
    /// async runtime.
    pub fn new(config: SupabaseConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self { config, client })
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    /// Sends a PostgREST request asking for the affected rows back.
    fn rows(&self, request: RequestBuilder) -> Result<Vec<Value>, StoreError> {
        let response = self
            .authed(request)
            .header("Prefer", "return=representation")
            .send()?;
        let body: Value = checked(response)?.json()?;
        match body {
            Value::Array(rows) => Ok(rows),
            other => Err(StoreError::UnexpectedResponse(other.to_string())),
        }
    }
}

impl SessionStore for SupabaseSessionStore {
    fn create_session(&self, user_id: &str) -> Result<String, StoreError> {
        let rows = self.rows(self.client.post(self.config.table_url("sessions")).json(&json!({
            "user_id": user_id,
            "status": "active",
            "started_at": timestamp(Utc::now()),
        })))?;
        let id = rows
            .first()
            .and_then(|row| row.get("id"))
            .and_then(id_string)
            .ok_or_else(|| StoreError::UnexpectedResponse("created session has no id".into()))?;
        log::info!("Session created: {id}");
        Ok(id)
    }

    fn finish_session(&self, session_id: &str) -> Result<(), StoreError> {
        let rows = self.rows(
            self.client
                .patch(self.config.table_url("sessions"))
                .query(&[("id", format!("eq.{session_id}"))])
                .json(&json!({
                    "status": "finished",
                    "ended_at": timestamp(Utc::now()),
                })),
        )?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(session_id.to_string()));
        }
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
        let file_name = capture_file_name(direction, captured_at);
        let object_path = capture_object_path(user_id, session_id, &file_name);

        let response = self
            .authed(self.client.post(self.config.upload_url(&object_path)))
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(image.to_vec())
            .send()?;
        checked(response)?;
        let url = self.config.public_url(&object_path);
        log::debug!("Uploaded capture {file_name}");

        self.rows(
            self.client
                .post(self.config.table_url("session_screenshots"))
                .json(&json!({
                    "session_id": session_id,
                    "image_url": url,
                    "direction": direction,
                    "captured_at": timestamp(captured_at),
                })),
        )?;
        Ok(url)
    }

    fn set_preview_if_absent(&self, session_id: &str, url: &str) -> Result<(), StoreError> {
        let rows = self.rows(
            self.client
                .patch(self.config.table_url("sessions"))
                .query(&[
                    ("id", format!("eq.{session_id}")),
                    ("preview_image", "is.null".to_string()),
                ])
                .json(&json!({ "preview_image": url })),
        )?;
        if rows.is_empty() {
            log::debug!("Preview already set for session {session_id}");
        }
        Ok(())
    }

    fn session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        let response = self
            .authed(self.client.get(self.config.table_url("sessions")))
            .query(&[("id", format!("eq.{session_id}")), ("select", "*".into())])
            .send()?;
        let rows: Vec<Value> = checked(response)?.json()?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(decode_row(row, "id")?)),
            None => Ok(None),
        }
    }

    fn screenshots(&self, session_id: &str) -> Result<Vec<ScreenshotRecord>, StoreError> {
        let response = self
            .authed(self.client.get(self.config.table_url("session_screenshots")))
            .query(&[
                ("session_id", format!("eq.{session_id}")),
                ("select", "session_id,image_url,direction,captured_at".into()),
                ("order", "captured_at".into()),
            ])
            .send()?;
        let rows: Vec<Value> = checked(response)?.json()?;
        rows.into_iter()
            .map(|row| decode_row(row, "session_id"))
            .collect()
    }

    fn sessions_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<Session>, StoreError> {
        let response = self
            .authed(self.client.get(self.config.table_url("sessions")))
            .query(&[
                ("user_id", format!("eq.{user_id}")),
                ("select", "*".into()),
                ("order", "started_at.desc".into()),
                ("limit", limit.to_string()),
            ])
            .send()?;
        let rows: Vec<Value> = checked(response)?.json()?;
        rows.into_iter().map(|row| decode_row(row, "id")).collect()
    }

    fn delete_session(&self, session_id: &str) -> Result<(), StoreError> {
        if self.session(session_id)?.is_none() {
            return Err(StoreError::NotFound(session_id.to_string()));
        }

        let prefixes: Vec<String> = self
            .screenshots(session_id)?
            .iter()
            .filter_map(|shot| self.config.object_path(&shot.image_url))
            .collect();
        if !prefixes.is_empty() {
            let response = self
                .authed(self.client.delete(self.config.bucket_url()))
                .json(&json!({ "prefixes": prefixes }))
                .send()?;
            checked(response)?;
            log::debug!("Removed {} capture objects", prefixes.len());
        }

        self.rows(
            self.client
                .delete(self.config.table_url("session_screenshots"))
                .query(&[("session_id", format!("eq.{session_id}"))]),
        )?;
        let rows = self.rows(
            self.client
                .delete(self.config.table_url("sessions"))
                .query(&[("id", format!("eq.{session_id}"))]),
        )?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(session_id.to_string()));
        }
        log::info!("Session deleted: {session_id}");
        Ok(())
    }
}

fn checked(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(StoreError::Rejected {
        status: status.as_u16(),
        body,
    })
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Deserializes a PostgREST row, first turning an integer `id_field` into
/// the string form the domain types use.
fn decode_row<T: DeserializeOwned>(mut row: Value, id_field: &str) -> Result<T, StoreError> {
    if let Some(id) = row.get(id_field).and_then(id_string) {
        row[id_field] = Value::String(id);
    }
    Ok(serde_json::from_value(row)?)
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
