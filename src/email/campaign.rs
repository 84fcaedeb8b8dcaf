//! Campaign fan-out.
//!
//! One message per recipient so a rejected address never aborts the rest
//! of the batch. Failures are logged and counted, not propagated.

use std::sync::Arc;

use super::{Email, Mailer};

/// Summary of a campaign run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CampaignReport {
    /// Number of recipients the message was delivered to.
    pub sent: usize,
    /// Number of recipients that failed.
    pub failed: usize,
}

/// A marketing campaign to dispatch.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Campaign {
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub body: String,
    /// HTML body (optional).
    #[serde(default)]
    pub html_body: Option<String>,
    /// Recipient addresses.
    pub recipients: Vec<String>,
}

/// Sends a campaign to each recipient individually.
pub struct CampaignSender {
    mailer: Arc<dyn Mailer>,
    from_address: String,
}

impl CampaignSender {
    pub fn new(mailer: Arc<dyn Mailer>, from_address: impl Into<String>) -> Self {
        Self {
            mailer,
            from_address: from_address.into(),
        }
    }

    /// Send the campaign to every recipient.
    ///
    /// Each recipient gets their own message. Per-recipient failures are
    /// logged at warn level and tallied in the report.
    pub async fn send(&self, campaign: &Campaign) -> CampaignReport {
        let mut sent = 0;
        let mut failed = 0;

        for recipient in &campaign.recipients {
            let mut email = Email::new(&self.from_address, recipient, &campaign.subject)
                .text(&campaign.body);
            if let Some(ref html) = campaign.html_body {
                email = email.html(html);
            }

            match self.mailer.send(&email).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        target: "goalcast::email",
                        recipient = %recipient,
                        error = %e,
                        "Campaign send failed for recipient"
                    );
                }
            }
        }

        tracing::info!(
            target: "goalcast::email",
            subject = %campaign.subject,
            sent,
            failed,
            "Campaign dispatched"
        );

        CampaignReport { sent, failed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::test::MockMailer;

    fn campaign(recipients: &[&str]) -> Campaign {
        Campaign {
            subject: "This weekend's predictions".to_string(),
            body: "Derby day. Check the app.".to_string(),
            html_body: None,
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn sends_one_message_per_recipient() {
        let mailer = Arc::new(MockMailer::new());
        let sender = CampaignSender::new(mailer.clone(), "news@goalcast.example.com");

        let report = sender
            .send(&campaign(&["a@example.com", "b@example.com"]))
            .await;
        assert_eq!(report, CampaignReport { sent: 2, failed: 0 });

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "a@example.com");
        assert_eq!(sent[1].to, "b@example.com");
        assert_eq!(sent[0].from, "news@goalcast.example.com");
    }

    #[tokio::test]
    async fn bad_address_does_not_block_the_rest() {
        let mailer = Arc::new(MockMailer::new());
        mailer.reject_address("b@example.com");
        let sender = CampaignSender::new(mailer.clone(), "news@goalcast.example.com");

        let report = sender
            .send(&campaign(&["a@example.com", "b@example.com", "c@example.com"]))
            .await;
        assert_eq!(report, CampaignReport { sent: 2, failed: 1 });
        assert_eq!(mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn empty_recipient_list_is_a_noop() {
        let mailer = Arc::new(MockMailer::new());
        let sender = CampaignSender::new(mailer.clone(), "news@goalcast.example.com");

        let report = sender.send(&campaign(&[])).await;
        assert_eq!(report, CampaignReport { sent: 0, failed: 0 });
        assert!(mailer.sent().is_empty());
    }
}
