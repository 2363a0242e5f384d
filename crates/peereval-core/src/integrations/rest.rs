//! RestBackend: PostgREST-style HTTP backend.
//!
//! Reads `students` and `settings`, and replaces a student's lines in
//! `preferences` on submission. Every request carries the project key both as
//! `apikey` and as a bearer token.

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::allocation::Allocation;
use crate::error::{ConfigError, FetchError, SinkError};
use crate::providers::{RosterProvider, SubmissionSink, WindowProvider};
use crate::records::{preferences_from_allocation, Preference, StudentRecord};
use crate::roster::PeerRef;
use crate::window::EvaluationWindow;

/// Settings row as stored remotely. The timestamp column may or may not
/// carry an offset.
#[derive(Debug, Deserialize)]
struct SettingsRow {
    date: String,
    isopen: bool,
    #[serde(default)]
    islocked: Option<bool>,
}

impl SettingsRow {
    fn into_window(self) -> Result<EvaluationWindow, FetchError> {
        let closes_at = parse_timestamp(&self.date).ok_or_else(|| FetchError::Decode {
            resource: "settings".into(),
            message: format!("unrecognized date '{}'", self.date),
        })?;
        Ok(EvaluationWindow::new(
            closes_at,
            self.isopen,
            self.islocked.unwrap_or(false),
        ))
    }
}

/// RFC 3339, or a naive timestamp taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Client for a PostgREST-style evaluation backend.
pub struct RestBackend {
    base_url: Url,
    api_key: String,
    http_client: Client,
}

impl RestBackend {
    /// Create a backend rooted at `base_url` (e.g. `https://xyz.supabase.co`).
    ///
    /// # Errors
    /// Returns an error if `base_url` is not an absolute URL.
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let mut base_url = Url::parse(base_url).map_err(|e| ConfigError::InvalidValue {
            key: "backend.base_url".into(),
            message: e.to_string(),
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            api_key: api_key.into(),
            http_client: Client::new(),
        })
    }

    fn table_url(&self, table: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(&format!("rest/v1/{table}"))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, FetchError> {
        let transport = |message: String| FetchError::Transport {
            resource: table.to_string(),
            message,
        };

        let url = self.table_url(table).map_err(|e| transport(e.to_string()))?;
        tracing::debug!(%url, "fetching rows");
        let resp = self
            .authorize(self.http_client.get(url))
            .query(query)
            .send()
            .await
            .map_err(|e| transport(e.to_string()))?;

        let resp = check_fetch_status(table, resp).await?;
        let body = resp.text().await.map_err(|e| transport(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            resource: table.to_string(),
            message: e.to_string(),
        })
    }

    /// Full student records, for results and grouping.
    pub async fn students(&self) -> Result<Vec<StudentRecord>, FetchError> {
        self.get_rows(
            "students",
            &[("select", "id,full_name,mean,alt,present".to_string())],
        )
        .await
    }

    /// Every submitted preference line.
    pub async fn preferences(&self) -> Result<Vec<Preference>, FetchError> {
        self.get_rows(
            "preferences",
            &[("select", "student_id,preferred_id,points".to_string())],
        )
        .await
    }
}

async fn check_fetch_status(resource: &str, resp: Response) -> Result<Response, FetchError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::warn!(resource, status = status.as_u16(), "backend refused fetch");
    Err(FetchError::Status {
        resource: resource.to_string(),
        status: status.as_u16(),
        body,
    })
}

impl RosterProvider for RestBackend {
    async fn fetch_peers(&self, current_user_id: &str) -> Result<Vec<PeerRef>, FetchError> {
        self.get_rows(
            "students",
            &[
                ("select", "id,full_name".to_string()),
                ("id", format!("neq.{current_user_id}")),
            ],
        )
        .await
    }
}

impl WindowProvider for RestBackend {
    async fn fetch_window(&self) -> Result<EvaluationWindow, FetchError> {
        let rows: Vec<SettingsRow> = self
            .get_rows(
                "settings",
                &[
                    ("select", "date,isopen,islocked".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| FetchError::Missing("settings".into()))?
            .into_window()
    }
}

async fn check_sink_status(resp: Response) -> Result<(), SinkError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let message = resp.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), "backend refused submission");
    Err(SinkError::Rejected {
        status: status.as_u16(),
        message,
    })
}

impl SubmissionSink for RestBackend {
    /// Delete the student's earlier lines, then insert the new ones.
    ///
    /// The two requests are not atomic: a failed insert leaves the student
    /// without stored lines until the next successful submission.
    async fn submit_allocation(
        &self,
        current_user_id: &str,
        allocation: &Allocation,
    ) -> Result<(), SinkError> {
        let transport = |e: &dyn std::fmt::Display| SinkError::Transport(e.to_string());
        let url = self.table_url("preferences").map_err(|e| transport(&e))?;
        let rows = preferences_from_allocation(current_user_id, allocation);

        let resp = self
            .authorize(self.http_client.delete(url.clone()))
            .query(&[("student_id", format!("eq.{current_user_id}"))])
            .send()
            .await
            .map_err(|e| transport(&e))?;
        check_sink_status(resp).await?;

        let resp = self
            .authorize(self.http_client.post(url))
            .header("Prefer", "return=minimal")
            .json(&rows)
            .send()
            .await
            .map_err(|e| transport(&e))?;
        check_sink_status(resp).await
    }
}
