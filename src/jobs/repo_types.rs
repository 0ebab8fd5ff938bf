use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Applied,
    Interview,
    Offer,
    Rejected,
    Accepted,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Applied => "Applied",
            JobStatus::Interview => "Interview",
            JobStatus::Offer => "Offer",
            JobStatus::Rejected => "Rejected",
            JobStatus::Accepted => "Accepted",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Applied" => Ok(JobStatus::Applied),
            "Interview" => Ok(JobStatus::Interview),
            "Offer" => Ok(JobStatus::Offer),
            "Rejected" => Ok(JobStatus::Rejected),
            "Accepted" => Ok(JobStatus::Accepted),
            other => anyhow::bail!("unknown job status {other:?}"),
        }
    }
}

/// Row as stored; `status` is TEXT in the database.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company: String,
    pub position: String,
    pub status: String,
    pub applied_date: Date,
    pub interview_date: Option<OffsetDateTime>,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobApplication {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub company: String,
    pub position: String,
    pub status: JobStatus,
    #[serde(with = "iso_date")]
    pub applied_date: Date,
    #[serde(with = "time::serde::rfc3339::option")]
    pub interview_date: Option<OffsetDateTime>,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl TryFrom<JobRow> for JobApplication {
    type Error = anyhow::Error;

    fn try_from(r: JobRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            company: r.company,
            position: r.position,
            status: r.status.parse()?,
            applied_date: r.applied_date,
            interview_date: r.interview_date,
            notes: r.notes,
            created_at: r.created_at,
        })
    }
}

/// Caller-editable part of a job application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFields {
    pub company: String,
    pub position: String,
    pub status: JobStatus,
    pub applied_date: Date,
    pub interview_date: Option<OffsetDateTime>,
    pub notes: Option<String>,
}
