use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A `candidates` row as stored.
#[derive(Debug, Clone, FromRow)]
pub struct Candidate {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub area_of_interest: String,
    pub receives_alerts: bool,
    pub resume_path: Option<String>,
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// The externally visible shape of a candidate. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateView {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub area_of_interest: String,
    pub receives_alerts: bool,
    pub resume_path: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_admin: bool,
}

impl From<Candidate> for CandidateView {
    fn from(row: Candidate) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone.unwrap_or_default(),
            area_of_interest: row.area_of_interest,
            receives_alerts: row.receives_alerts,
            resume_path: row.resume_path,
            created_at: row.created_at,
            updated_at: row.updated_at,
            is_admin: row.is_admin,
        }
    }
}

/// A profile submission. Text fields are trimmed on use and a blank value is
/// treated exactly like an omitted one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub area_of_interest: Option<String>,
    #[serde(default)]
    pub receives_alerts: bool,
    pub password: Option<String>,
}

impl CandidateProfile {
    pub fn new(name: &str, email: &str, area_of_interest: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            area_of_interest: Some(area_of_interest.to_string()),
            ..Default::default()
        }
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_phone(mut self, phone: &str) -> Self {
        self.phone = Some(phone.to_string());
        self
    }

    pub fn with_alerts(mut self, receives_alerts: bool) -> Self {
        self.receives_alerts = receives_alerts;
        self
    }
}

/// An uploaded resume as handed over by the request layer.
#[derive(Debug, Clone, Default)]
pub struct ResumeUpload {
    pub filename: Option<String>,
    pub data: Option<Bytes>,
}

impl ResumeUpload {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: Some(filename.into()),
            data: Some(data.into()),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}
