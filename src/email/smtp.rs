//! SMTP mailer using lettre.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::error::{GoalcastError, Result};

use super::{Email, Mailer};

/// SMTP configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port (default: 587 for STARTTLS).
    pub port: u16,
    /// Username for authentication.
    pub username: Option<String>,
    /// Password for authentication.
    pub password: Option<String>,
    /// Default "from" address.
    pub default_from: Option<String>,
    /// Use STARTTLS (default: true).
    pub starttls: bool,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 587,
            username: None,
            password: None,
            default_from: None,
            starttls: true,
        }
    }

    /// Set the port (default: 587).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set authentication credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the default "from" address.
    #[must_use]
    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.default_from = Some(address.into());
        self
    }

    /// Disable STARTTLS (use plain connection or implicit TLS).
    #[must_use]
    pub fn no_starttls(mut self) -> Self {
        self.starttls = false;
        self
    }

    /// Create config from environment variables.
    ///
    /// Reads `SMTP_HOST` (required), `SMTP_PORT`, `SMTP_USERNAME`,
    /// `SMTP_PASSWORD`, `SMTP_FROM`, and `SMTP_STARTTLS`.
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("SMTP_HOST")
            .map_err(|_| GoalcastError::internal("SMTP_HOST environment variable not set"))?;

        let port = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("SMTP_USERNAME").ok();
        let password = std::env::var("SMTP_PASSWORD").ok();
        let default_from = std::env::var("SMTP_FROM").ok();
        let starttls = std::env::var("SMTP_STARTTLS")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Ok(Self {
            host,
            port,
            username,
            password,
            default_from,
            starttls,
        })
    }
}

/// SMTP mailer using lettre.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

impl SmtpMailer {
    /// Create a new SMTP mailer with the given configuration.
    pub fn new(config: SmtpConfig) -> Result<Self> {
        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host).map_err(|e| {
                GoalcastError::internal(format!("Failed to create SMTP transport: {}", e))
            })?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host).map_err(|e| {
                GoalcastError::internal(format!("Failed to create SMTP transport: {}", e))
            })?
        };

        builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            config,
        })
    }

    /// Create a new SMTP mailer from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(SmtpConfig::from_env()?)
    }

    fn build_message(&self, email: &Email) -> Result<Message> {
        let from_str = if email.from.is_empty() {
            self.config.default_from.as_ref().ok_or_else(|| {
                GoalcastError::bad_request("No 'from' address specified and no default configured")
            })?
        } else {
            &email.from
        };

        let from: Mailbox = from_str
            .parse()
            .map_err(|e| GoalcastError::bad_request(format!("Invalid 'from' address: {}", e)))?;
        let to: Mailbox = email.to.parse().map_err(|e| {
            GoalcastError::bad_request(format!("Invalid 'to' address '{}': {}", email.to, e))
        })?;

        let builder = Message::builder().from(from).to(to).subject(&email.subject);

        let message = match (&email.text, &email.html) {
            (Some(text), Some(html)) => builder
                .multipart(
                    MultiPart::alternative()
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_PLAIN)
                                .body(text.clone()),
                        )
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_HTML)
                                .body(html.clone()),
                        ),
                )
                .map_err(|e| GoalcastError::internal(format!("Failed to build email: {}", e)))?,
            (Some(text), None) => builder
                .header(ContentType::TEXT_PLAIN)
                .body(text.clone())
                .map_err(|e| GoalcastError::internal(format!("Failed to build email: {}", e)))?,
            (None, Some(html)) => builder
                .header(ContentType::TEXT_HTML)
                .body(html.clone())
                .map_err(|e| GoalcastError::internal(format!("Failed to build email: {}", e)))?,
            (None, None) => {
                return Err(GoalcastError::bad_request(
                    "Email must have either text or HTML body",
                ));
            }
        };

        Ok(message)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        email.validate()?;

        let message = self.build_message(email)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| GoalcastError::internal(format!("Failed to send email: {}", e)))?;

        Ok(())
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

// AsyncSmtpTransport does not impl Debug.
impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .finish()
    }
}
