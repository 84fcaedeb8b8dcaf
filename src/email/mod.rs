//! Marketing email dispatch.
//!
//! Backends:
//! - [`ConsoleMailer`] - prints emails to stdout (development)
//! - [`SmtpMailer`] - sends via SMTP using lettre
//!
//! [`CampaignSender`] fans a campaign out to a recipient list one message
//! at a time, so a bad address never blocks the rest of the batch.

mod campaign;
mod console;
mod smtp;

pub use campaign::{Campaign, CampaignReport, CampaignSender};
pub use console::ConsoleMailer;
pub use smtp::{SmtpConfig, SmtpMailer};

use async_trait::async_trait;

use crate::error::{GoalcastError, Result};

/// An email message to be sent.
#[derive(Debug, Clone)]
pub struct Email {
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body (optional if html is provided).
    pub text: Option<String>,
    /// HTML body (optional if text is provided).
    pub html: Option<String>,
}

impl Email {
    pub fn new(from: impl Into<String>, to: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            text: None,
            html: None,
        }
    }

    /// Set the plain text body.
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.text = Some(body.into());
        self
    }

    /// Set the HTML body.
    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.html = Some(body.into());
        self
    }

    /// Validate the email has required fields.
    pub fn validate(&self) -> Result<()> {
        if self.from.is_empty() {
            return Err(GoalcastError::bad_request("Email 'from' is required"));
        }
        if self.to.is_empty() {
            return Err(GoalcastError::bad_request("Email 'to' is required"));
        }
        if self.subject.is_empty() {
            return Err(GoalcastError::bad_request("Email 'subject' is required"));
        }
        if self.text.is_none() && self.html.is_none() {
            return Err(GoalcastError::bad_request(
                "Email must have either 'text' or 'html' body",
            ));
        }
        Ok(())
    }
}

/// Mailer trait for sending emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send an email.
    async fn send(&self, email: &Email) -> Result<()>;

    /// Check if the mailer backend is healthy/connected.
    fn is_healthy(&self) -> bool;
}

/// Mock mailer for tests.
pub mod test {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Records sent emails; optionally fails on addresses registered as bad.
    #[derive(Default)]
    pub struct MockMailer {
        sent: Mutex<Vec<Email>>,
        bad_addresses: Mutex<Vec<String>>,
        fail_all: AtomicBool,
    }

    impl MockMailer {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Make sends to this address fail.
        pub fn reject_address(&self, address: &str) {
            self.bad_addresses.lock().unwrap().push(address.to_string());
        }

        /// Make every send fail.
        pub fn fail_all(&self) {
            self.fail_all.store(true, Ordering::SeqCst);
        }

        /// All emails sent so far.
        pub fn sent(&self) -> Vec<Email> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for MockMailer {
        async fn send(&self, email: &Email) -> Result<()> {
            email.validate()?;

            if self.fail_all.load(Ordering::SeqCst)
                || self.bad_addresses.lock().unwrap().contains(&email.to)
            {
                return Err(GoalcastError::service_unavailable("mail relay rejected"));
            }

            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }

        fn is_healthy(&self) -> bool {
            true
        }
    }
}
