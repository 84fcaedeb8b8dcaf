//! Console mailer for development.
//!
//! Prints emails to stdout instead of sending them. Body content is
//! redacted by default; stdout is often captured by log collectors and
//! campaign bodies can contain tracking links.

use async_trait::async_trait;

use crate::error::Result;

use super::{Email, Mailer};

/// A mailer that prints emails to stdout instead of sending them.
#[derive(Debug, Clone)]
pub struct ConsoleMailer {
    prefix: String,
    show_full_content: bool,
}

impl ConsoleMailer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            prefix: "[EMAIL]".to_string(),
            show_full_content: false,
        }
    }

    /// Enable or disable full email content output.
    ///
    /// Default: `false` (body content is redacted).
    #[must_use]
    pub fn with_full_output(mut self, enabled: bool) -> Self {
        if enabled {
            tracing::warn!(
                "ConsoleMailer: full output enabled - email content will be visible in logs"
            );
        }
        self.show_full_content = enabled;
        self
    }
}

impl Default for ConsoleMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        email.validate()?;

        println!("{} ════════════════════════════════════════", self.prefix);
        println!("{} From:    {}", self.prefix, email.from);
        println!("{} To:      {}", self.prefix, email.to);
        println!("{} Subject: {}", self.prefix, email.subject);
        println!("{} ────────────────────────────────────────", self.prefix);

        if self.show_full_content {
            if let Some(ref text) = email.text {
                println!("{} [TEXT]", self.prefix);
                for line in text.lines() {
                    println!("{} {}", self.prefix, line);
                }
            }
            if let Some(ref html) = email.html {
                println!("{} [HTML]", self.prefix);
                for line in html.lines() {
                    println!("{} {}", self.prefix, line);
                }
            }
        } else {
            if let Some(ref text) = email.text {
                println!("{} [TEXT] {} bytes [REDACTED]", self.prefix, text.len());
            }
            if let Some(ref html) = email.html {
                println!("{} [HTML] {} bytes [REDACTED]", self.prefix, html.len());
            }
        }

        println!("{} ════════════════════════════════════════", self.prefix);

        Ok(())
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sends_without_error() {
        let mailer = ConsoleMailer::new();
        let email = Email::new("from@test.com", "to@test.com", "Test").text("Body");
        assert!(mailer.send(&email).await.is_ok());
    }

    #[tokio::test]
    async fn validates_before_printing() {
        let mailer = ConsoleMailer::new();
        let email = Email::new("from@test.com", "to@test.com", "Test");
        assert!(mailer.send(&email).await.is_err());
    }
}
