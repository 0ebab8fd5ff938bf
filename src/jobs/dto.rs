use serde::Deserialize;
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
    PrimitiveDateTime, Time,
};

use crate::{error::ApiError, jobs::repo_types::{JobFields, JobStatus}};

/// Create/update body. Dates arrive as the strings date and time inputs produce.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub position: String,
    pub status: Option<String>,
    pub applied_date: Option<String>,
    pub interview_date: Option<String>,
    pub notes: Option<String>,
}

impl JobRequest {
    /// Validates the body; a missing applied date means `today`.
    pub fn into_fields(self, today: Date) -> Result<JobFields, ApiError> {
        let company = self.company.trim().to_string();
        let position = self.position.trim().to_string();
        if company.is_empty() || position.is_empty() {
            return Err(ApiError::Validation("Company and position are required."));
        }

        let status = match non_empty(self.status) {
            Some(s) => s
                .parse::<JobStatus>()
                .map_err(|_| ApiError::Validation("Invalid status."))?,
            None => JobStatus::Applied,
        };

        let applied_date = match non_empty(self.applied_date) {
            Some(s) => parse_date(&s).ok_or(ApiError::Validation("Invalid applied date."))?,
            None => today,
        };

        let interview_date = match non_empty(self.interview_date) {
            Some(s) => {
                Some(parse_datetime(&s).ok_or(ApiError::Validation("Invalid interview date."))?)
            }
            None => None,
        };

        Ok(JobFields {
            company,
            position,
            status,
            applied_date,
            interview_date,
            notes: non_empty(self.notes),
        })
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

fn parse_date(s: &str) -> Option<Date> {
    Date::parse(s, format_description!("[year]-[month]-[day]"))
        .ok()
        .or_else(|| OffsetDateTime::parse(s, &Rfc3339).ok().map(|dt| dt.date()))
}

/// RFC 3339, `YYYY-MM-DDTHH:MM` (taken as UTC), or a bare date (midnight UTC).
fn parse_datetime(s: &str) -> Option<OffsetDateTime> {
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(dt);
    }
    if let Ok(dt) = PrimitiveDateTime::parse(s, format_description!("[year]-[month]-[day]T[hour]:[minute]")) {
        return Some(dt.assume_utc());
    }
    Date::parse(s, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|d| PrimitiveDateTime::new(d, Time::MIDNIGHT).assume_utc())
}
