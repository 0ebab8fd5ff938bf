use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::jobs::repo_types::{JobApplication, JobFields, JobRow, JobStatus};

/// Job application records. Every per-record operation is scoped to `user_id`; a record
/// owned by someone else behaves exactly like a missing one.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<JobApplication>>;
    async fn get(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<JobApplication>>;
    async fn create(&self, user_id: Uuid, fields: JobFields) -> anyhow::Result<JobApplication>;
    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        fields: JobFields,
    ) -> anyhow::Result<Option<JobApplication>>;
    async fn delete(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool>;
    /// Applications in `Interview` status with `from <= interview_date < to`, any owner.
    async fn interviews_between(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> anyhow::Result<Vec<JobApplication>>;
}

const JOB_COLUMNS: &str =
    "id, user_id, company, position, status, applied_date, interview_date, notes, created_at";

#[derive(Clone)]
pub struct PgJobStore {
    db: PgPool,
}

impl PgJobStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn convert(rows: Vec<JobRow>) -> anyhow::Result<Vec<JobApplication>> {
    rows.into_iter().map(JobApplication::try_from).collect()
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<JobApplication>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM job_applications
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list job applications")?;
        convert(rows)
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<JobApplication>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"SELECT {JOB_COLUMNS} FROM job_applications WHERE id = $1 AND user_id = $2"#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("get job application")?;
        row.map(JobApplication::try_from).transpose()
    }

    async fn create(&self, user_id: Uuid, fields: JobFields) -> anyhow::Result<JobApplication> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            INSERT INTO job_applications
                (id, user_id, company, position, status, applied_date, interview_date, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&fields.company)
        .bind(&fields.position)
        .bind(fields.status.as_str())
        .bind(fields.applied_date)
        .bind(fields.interview_date)
        .bind(&fields.notes)
        .fetch_one(&self.db)
        .await
        .context("insert job application")?;
        row.try_into()
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        fields: JobFields,
    ) -> anyhow::Result<Option<JobApplication>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            UPDATE job_applications
               SET company = $3, position = $4, status = $5,
                   applied_date = $6, interview_date = $7, notes = $8
             WHERE id = $1 AND user_id = $2
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(&fields.company)
        .bind(&fields.position)
        .bind(fields.status.as_str())
        .bind(fields.applied_date)
        .bind(fields.interview_date)
        .bind(&fields.notes)
        .fetch_optional(&self.db)
        .await
        .context("update job application")?;
        row.map(JobApplication::try_from).transpose()
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let done = sqlx::query(r#"DELETE FROM job_applications WHERE id = $1 AND user_id = $2"#)
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("delete job application")?;
        Ok(done.rows_affected() > 0)
    }

    async fn interviews_between(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> anyhow::Result<Vec<JobApplication>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
              FROM job_applications
             WHERE status = $1
               AND interview_date >= $2
               AND interview_date < $3
             ORDER BY interview_date ASC
            "#
        ))
        .bind(JobStatus::Interview.as_str())
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await
        .context("select upcoming interviews")?;
        convert(rows)
    }
}

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, JobApplication>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply(job: &mut JobApplication, fields: JobFields) {
    job.company = fields.company;
    job.position = fields.position;
    job.status = fields.status;
    job.applied_date = fields.applied_date;
    job.interview_date = fields.interview_date;
    job.notes = fields.notes;
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<JobApplication>> {
        let mut out: Vec<_> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| j.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<JobApplication>> {
        Ok(self
            .jobs
            .read()
            .await
            .get(&id)
            .filter(|j| j.user_id == user_id)
            .cloned())
    }

    async fn create(&self, user_id: Uuid, fields: JobFields) -> anyhow::Result<JobApplication> {
        let job = JobApplication {
            id: Uuid::new_v4(),
            user_id,
            company: fields.company,
            position: fields.position,
            status: fields.status,
            applied_date: fields.applied_date,
            interview_date: fields.interview_date,
            notes: fields.notes,
            created_at: OffsetDateTime::now_utc(),
        };
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        fields: JobFields,
    ) -> anyhow::Result<Option<JobApplication>> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&id).filter(|j| j.user_id == user_id) {
            Some(job) => {
                apply(job, fields);
                Ok(Some(job.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut jobs = self.jobs.write().await;
        if jobs.get(&id).map(|j| j.user_id == user_id).unwrap_or(false) {
            jobs.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn interviews_between(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> anyhow::Result<Vec<JobApplication>> {
        let mut out: Vec<_> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| j.status == JobStatus::Interview)
            .filter(|j| matches!(j.interview_date, Some(d) if d >= from && d < to))
            .cloned()
            .collect();
        out.sort_by_key(|j| j.interview_date);
        Ok(out)
    }
}
