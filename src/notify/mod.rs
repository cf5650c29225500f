//! Notification pipeline
//!
//! For each new post the pipeline builds a threaded notification message,
//! enforces the per-run send cap and the per-source error-count circuit
//! breaker, and records send failures to the error journal. Failures are
//! never raised to the traversal; the outcome tells it whether the post's
//! freshness marker may be written.

mod body;
mod message;

pub use body::{build_email_body, format_body};
pub use message::build_message;

use chrono::Utc;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};
use thiserror::Error;

use crate::config::EmailConfig;
use crate::item::{ItemRef, PostDetails};
use crate::storage::{ScanStorage, StorageError};

/// Errors raised while building or transporting notifications
///
/// Send failures are journaled rather than raised; these errors cover the
/// configuration-level failures that abort the item instead.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid notification address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// What happened to one notification attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No destination address is configured for this forum
    Disabled,

    /// The source's error count reached the cap; skipped silently
    Suppressed,

    /// Dry-run mode: logged, not transmitted, not counted toward the cap
    DryRun,

    /// Transmitted; counted toward the per-run cap
    Sent,

    /// Send failed; journaled, and the post's marker must be withheld so the
    /// post retries next run
    Failed,
}

/// Sends notifications for one forum's scan
pub struct Notifier<'a> {
    email: Option<&'a EmailConfig>,
    mailer: Option<SmtpTransport>,
    dry_run: bool,
    sent: u32,
}

impl<'a> Notifier<'a> {
    /// Creates the notifier for one forum
    ///
    /// The SMTP transport is only built when notifications are both
    /// configured and actually going to be transmitted.
    pub fn new(email: Option<&'a EmailConfig>, dry_run: bool) -> Result<Self, NotifyError> {
        let mailer = match email {
            Some(config) if !dry_run => Some(build_mailer(config)?),
            _ => None,
        };

        Ok(Self {
            email,
            mailer,
            dry_run,
            sent: 0,
        })
    }

    /// Number of messages transmitted so far this run
    pub fn sent_count(&self) -> u32 {
        self.sent
    }

    /// True once the configured per-run send cap has been reached
    pub fn limit_reached(&self) -> bool {
        match self.email.and_then(|config| config.max_emails_per_run) {
            Some(cap) => self.sent >= cap,
            None => false,
        }
    }

    /// Runs one post through the pipeline
    pub fn notify(
        &mut self,
        storage: &mut ScanStorage,
        forum: &ItemRef,
        topic: &ItemRef,
        post: &ItemRef,
    ) -> Result<Outcome, NotifyError> {
        let Some(config) = self.email else {
            return Ok(Outcome::Disabled);
        };
        let Some(details) = post.post.as_ref() else {
            tracing::warn!("Notify called for {} without post payload", post.id);
            return Ok(Outcome::Disabled);
        };

        let source = source_description(details);
        let errors = storage.count_errors(&source)?;
        if errors >= config.max_errors {
            tracing::debug!(
                "Suppressing notification for '{}' after {} recorded errors",
                source,
                errors
            );
            return Ok(Outcome::Suppressed);
        }

        let message = build_message(config, forum, topic, post, details)?;
        tracing::info!("Email: {}", source);

        let Some(mailer) = &self.mailer else {
            return Ok(Outcome::DryRun);
        };

        match mailer.send(&message) {
            Ok(_) => {
                self.sent += 1;
                Ok(Outcome::Sent)
            }
            Err(error) => {
                tracing::warn!("Send failed for '{}': {}", source, error);
                storage.record_error(&source, Utc::now(), &error.to_string())?;
                Ok(Outcome::Failed)
            }
        }
    }
}

/// Renders the circuit breaker's source description for one post
///
/// The string embeds the displayed author and timestamp rather than the
/// stable post id, so a forum-side change to the displayed date format
/// resets the error count. Known fragility, kept for compatibility with
/// journals written by earlier deployments.
pub fn source_description(details: &PostDetails) -> String {
    format!(
        "Post #{} in {} ({}) by {} at {} on {}",
        details.index,
        details.topic_name,
        details.forum_name,
        details.author,
        details.date.format(body::TIME_FORMAT),
        details.date.format(body::DATE_FORMAT),
    )
}

fn build_mailer(config: &EmailConfig) -> Result<SmtpTransport, NotifyError> {
    let mut builder = SmtpTransport::relay(&config.smtp_server)?;

    if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
        builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
    }

    Ok(builder.build())
}
