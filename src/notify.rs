use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use tracing::info;

use crate::config::EmailConfig;

/// Outbound delivery of user-facing notices (reset links, interview reminders).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_reset_link(&self, email: &str, reset_url: &str) -> anyhow::Result<()>;
    async fn send_interview_reminder(
        &self,
        email: &str,
        position: &str,
        company: &str,
        date: &str,
    ) -> anyhow::Result<()>;
}

/// Delivers notices to the tracing log sink. Used when no mail transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_reset_link(&self, email: &str, reset_url: &str) -> anyhow::Result<()> {
        info!(%email, %reset_url, "password reset link");
        Ok(())
    }

    async fn send_interview_reminder(
        &self,
        email: &str,
        position: &str,
        company: &str,
        date: &str,
    ) -> anyhow::Result<()> {
        info!(
            %email,
            subject = %format!("Reminder: Interview for {position} at {company}"),
            %date,
            "interview reminder"
        );
        Ok(())
    }
}

/// Sends notices through an SMTP relay (STARTTLS).
#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: SmtpTransport,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(cfg: &EmailConfig) -> anyhow::Result<Self> {
        let mut from: Mailbox = cfg
            .from
            .parse()
            .with_context(|| format!("invalid sender address {}", cfg.from))?;
        if from.name.is_none() {
            from.name = Some("ApplyTrack".into());
        }
        let mailer = SmtpTransport::starttls_relay(&cfg.host)
            .with_context(|| format!("smtp relay {}", cfg.host))?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.user.clone(), cfg.pass.clone()))
            .timeout(Some(Duration::from_secs(10)))
            .build();
        Ok(Self { mailer, from })
    }

    // lettre's SmtpTransport is blocking
    async fn deliver(&self, message: Message) -> anyhow::Result<()> {
        let mailer = self.mailer.clone();
        tokio::task::spawn_blocking(move || mailer.send(&message))
            .await
            .context("mail task panicked")?
            .context("smtp send")?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_reset_link(&self, email: &str, reset_url: &str) -> anyhow::Result<()> {
        self.deliver(reset_link_message(&self.from, email, reset_url)?).await?;
        info!(%email, "password reset link mailed");
        Ok(())
    }

    async fn send_interview_reminder(
        &self,
        email: &str,
        position: &str,
        company: &str,
        date: &str,
    ) -> anyhow::Result<()> {
        let message = interview_reminder_message(&self.from, email, position, company, date)?;
        self.deliver(message).await?;
        info!(%email, %company, "interview reminder mailed");
        Ok(())
    }
}

fn plain_message(from: &Mailbox, to: &str, subject: &str, body: String) -> anyhow::Result<Message> {
    let to: Mailbox = to
        .parse()
        .with_context(|| format!("invalid recipient address {to}"))?;
    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body)
        .context("build email")
}

fn reset_link_message(from: &Mailbox, to: &str, reset_url: &str) -> anyhow::Result<Message> {
    let body = format!(
        "A password reset was requested for your account.\n\n\
        Open this link to choose a new password:\n{reset_url}\n\n\
        If you did not ask for this, ignore this email."
    );
    plain_message(from, to, "Reset your password", body)
}

fn interview_reminder_message(
    from: &Mailbox,
    to: &str,
    position: &str,
    company: &str,
    date: &str,
) -> anyhow::Result<Message> {
    let body = format!(
        "You have an interview scheduled!\n\n\
        Position: {position}\n\
        Company: {company}\n\
        Date: {date}\n\n\
        All the best!"
    );
    plain_message(
        from,
        to,
        &format!("Reminder: Interview for {position} at {company}"),
        body,
    )
}

#[cfg(test)]
mod mail_tests {
    use super::*;

    fn sender() -> Mailbox {
        "ApplyTrack <bot@x.com>".parse().unwrap()
    }

    fn rendered(message: &Message) -> String {
        String::from_utf8(message.formatted()).unwrap()
    }

    #[test]
    fn interview_reminder_carries_subject_and_details() {
        let msg = interview_reminder_message(&sender(), "a@x.com", "Engineer", "Acme", "2024-06-15 15:30")
            .unwrap();
        let text = rendered(&msg);
        assert!(text.contains("Subject: Reminder: Interview for Engineer at Acme"));
        assert!(text.contains("To: a@x.com"));
        assert!(text.contains("Date: 2024-06-15 15:30"));
    }

    #[test]
    fn reset_link_is_in_the_body() {
        let msg = reset_link_message(&sender(), "a@x.com", "http://app/reset-password/abc123").unwrap();
        let text = rendered(&msg);
        assert!(text.contains("Subject: Reset your password"));
        assert!(text.contains("http://app/reset-password/abc123"));
    }

    #[test]
    fn bad_addresses_are_errors() {
        assert!(interview_reminder_message(&sender(), "not-an-email", "E", "A", "d").is_err());

        let cfg = EmailConfig {
            host: "smtp.x.com".into(),
            port: 587,
            user: "bot@x.com".into(),
            pass: "pw".into(),
            from: "not an address".into(),
        };
        assert!(SmtpNotifier::new(&cfg).is_err());
    }
}

#[cfg(test)]
pub use recording::{Notice, RecordingNotifier};

#[cfg(test)]
mod recording {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::Notifier;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Notice {
        ResetLink { email: String, url: String },
        InterviewReminder { email: String, position: String, company: String, date: String },
    }

    /// Keeps every notice in memory; optionally fails every send.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<Notice>>,
        failing: bool,
    }

    impl RecordingNotifier {
        pub fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                failing: true,
            }
        }

        pub fn sent(&self) -> Vec<Notice> {
            self.sent.lock().unwrap().clone()
        }

        /// Token at the end of the most recent reset link sent to `email`.
        pub fn last_reset_token(&self, email: &str) -> Option<String> {
            self.sent.lock().unwrap().iter().rev().find_map(|n| match n {
                Notice::ResetLink { email: to, url } if to == email => {
                    url.rsplit('/').next().map(str::to_string)
                }
                _ => None,
            })
        }

        fn record(&self, notice: Notice) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(notice);
            if self.failing {
                anyhow::bail!("smtp unavailable");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_reset_link(&self, email: &str, reset_url: &str) -> anyhow::Result<()> {
            self.record(Notice::ResetLink {
                email: email.into(),
                url: reset_url.into(),
            })
        }

        async fn send_interview_reminder(
            &self,
            email: &str,
            position: &str,
            company: &str,
            date: &str,
        ) -> anyhow::Result<()> {
            self.record(Notice::InterviewReminder {
                email: email.into(),
                position: position.into(),
                company: company.into(),
                date: date.into(),
            })
        }
    }
}
