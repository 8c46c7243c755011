use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplicationStatus {
    PendingReview,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 3] = [
        ApplicationStatus::PendingReview,
        ApplicationStatus::Accepted,
        ApplicationStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::PendingReview => "pending-review",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    /// Spelling written by the earlier generation of the site.
    pub fn legacy_str(&self) -> &'static str {
        match self {
            ApplicationStatus::PendingReview => "em_analise",
            ApplicationStatus::Accepted => "aceito",
            ApplicationStatus::Rejected => "recusado",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s || status.legacy_str() == s)
            .ok_or_else(|| {
                format!("invalid status '{}'; use pending-review, accepted or rejected", s)
            })
    }
}

/// An `applications` row joined with its candidate's display fields.
#[derive(Debug, Clone, FromRow)]
pub struct ApplicationRow {
    pub id: i64,
    pub candidate_email: String,
    pub job_id: String,
    pub job_title: Option<String>,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub candidate_name: Option<String>,
    pub candidate_area: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantSummary {
    pub email: String,
    pub name: String,
    pub area_of_interest: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    pub id: i64,
    pub job_id: String,
    pub job_title: String,
    pub status: ApplicationStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub candidate: ApplicantSummary,
}

impl TryFrom<ApplicationRow> for ApplicationView {
    type Error = String;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            job_id: row.job_id,
            job_title: row.job_title.unwrap_or_default(),
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            candidate: ApplicantSummary {
                email: row.candidate_email,
                name: row.candidate_name.unwrap_or_default(),
                area_of_interest: row.candidate_area.unwrap_or_default(),
            },
        })
    }
}
