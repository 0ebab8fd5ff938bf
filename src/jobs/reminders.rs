//! Daily interview reminders for applications with an interview in the next 24 hours.
use std::time::Duration as StdDuration;

use time::{macros::format_description, Duration, OffsetDateTime};
use tracing::{error, info, warn};

use crate::{auth::repo::UserStore, jobs::repo::JobStore, notify::Notifier, state::AppState};

pub const REMINDER_WINDOW: Duration = Duration::hours(24);

/// Notifies the owner of every interview in `[now, now + 24h)`. Returns how many
/// reminders went out; a failure for one application does not stop the others.
pub async fn send_due_reminders(
    jobs: &dyn JobStore,
    users: &dyn UserStore,
    notifier: &dyn Notifier,
    now: OffsetDateTime,
) -> anyhow::Result<usize> {
    let due = jobs.interviews_between(now, now + REMINDER_WINDOW).await?;
    let mut sent = 0;

    for job in &due {
        let Some(when) = job.interview_date else { continue };
        let owner = match users.find_by_id(job.user_id).await {
            Ok(Some(u)) => u,
            Ok(None) => {
                warn!(job_id = %job.id, "interview owner missing");
                continue;
            }
            Err(e) => {
                error!(error = %e, job_id = %job.id, "owner lookup failed");
                continue;
            }
        };

        let date = when
            .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
            .unwrap_or_else(|_| when.date().to_string());
        match notifier
            .send_interview_reminder(&owner.email, &job.position, &job.company, &date)
            .await
        {
            Ok(()) => sent += 1,
            Err(e) => error!(error = %e, job_id = %job.id, "interview reminder failed"),
        }
    }

    info!(due = due.len(), sent, "interview reminder run finished");
    Ok(sent)
}

pub fn spawn_reminder_loop(state: AppState, every: StdDuration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        // first tick fires immediately; wait a full period so restarts do not resend
        tick.tick().await;
        loop {
            tick.tick().await;
            let now = state.clock.now();
            if let Err(e) = send_due_reminders(
                state.jobs.as_ref(),
                state.auth.users().as_ref(),
                state.notifier.as_ref(),
                now,
            )
            .await
            {
                error!(error = %e, "interview reminder run failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{repo::MemoryUserStore, repo_types::NewUser},
        jobs::{
            repo::MemoryJobStore,
            repo_types::{JobFields, JobStatus},
        },
        notify::{Notice, RecordingNotifier},
    };
    use time::macros::{date, datetime};
    use uuid::Uuid;

    fn interview(company: &str, at: OffsetDateTime) -> JobFields {
        JobFields {
            company: company.into(),
            position: "Engineer".into(),
            status: JobStatus::Interview,
            applied_date: date!(2024 - 05 - 01),
            interview_date: Some(at),
            notes: None,
        }
    }

    #[tokio::test]
    async fn reminds_owners_of_upcoming_interviews() {
        let users = MemoryUserStore::new();
        let jobs = MemoryJobStore::new();
        let notifier = RecordingNotifier::default();
        let now = datetime!(2024-06-15 07:00 UTC);

        let owner = users
            .create(NewUser {
                name: "A".into(),
                email: "a@x.com".into(),
                password_hash: "h".into(),
            })
            .await
            .unwrap();
        jobs.create(owner.id, interview("Acme", datetime!(2024-06-15 15:30 UTC)))
            .await
            .unwrap();
        jobs.create(owner.id, interview("Later Inc", datetime!(2024-06-17 09:00 UTC)))
            .await
            .unwrap();
        // orphaned record is skipped, not fatal
        jobs.create(Uuid::new_v4(), interview("Ghost", datetime!(2024-06-15 10:00 UTC)))
            .await
            .unwrap();

        let sent = send_due_reminders(&jobs, &users, &notifier, now).await.unwrap();
        assert_eq!(sent, 1);
        assert_eq!(
            notifier.sent(),
            vec![Notice::InterviewReminder {
                email: "a@x.com".into(),
                position: "Engineer".into(),
                company: "Acme".into(),
                date: "2024-06-15 15:30".into(),
            }]
        );
    }

    #[tokio::test]
    async fn delivery_failures_are_counted_out() {
        let users = MemoryUserStore::new();
        let jobs = MemoryJobStore::new();
        let notifier = RecordingNotifier::failing();
        let now = datetime!(2024-06-15 07:00 UTC);

        let owner = users
            .create(NewUser {
                name: "A".into(),
                email: "a@x.com".into(),
                password_hash: "h".into(),
            })
            .await
            .unwrap();
        jobs.create(owner.id, interview("Acme", now + Duration::hours(1)))
            .await
            .unwrap();

        let sent = send_due_reminders(&jobs, &users, &notifier, now).await.unwrap();
        assert_eq!(sent, 0);
        assert_eq!(notifier.sent().len(), 1);
    }
}
