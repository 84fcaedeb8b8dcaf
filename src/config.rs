use secrecy::{ExposeSecret, SecretString};
use std::net::SocketAddr;
use url::Url;

use crate::error::{GoalcastError, Result};

/// Main configuration for the goalcast service.
///
/// Secrets are held in [`SecretString`] so they never show up in debug
/// output or logs.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub identity: IdentityConfig,
    pub payments: PaymentsConfig,
    pub tokens: TokenConfig,
    pub access: AccessConfig,
    pub plans: PlanPrices,
    pub mail: MailConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

/// Hosted identity provider (owns users, passwords and sessions).
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Base URL of the provider's admin API.
    pub base_url: String,
    /// Service-role API key for the admin API.
    pub api_key: SecretString,
    /// Shared secret the provider signs session JWTs with.
    pub session_secret: SecretString,
}

/// Payment provider credentials and checkout redirect targets.
#[derive(Debug, Clone)]
pub struct PaymentsConfig {
    pub api_key: SecretString,
    pub webhook_secret: SecretString,
    pub success_url: String,
    pub cancel_url: String,
}

/// Signing parameters for analytics-app access tokens.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: SecretString,
    pub issuer: String,
    pub ttl_days: u64,
}

#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// Days after account creation during which access is free.
    pub trial_days: u64,
}

/// Provider price IDs for the closed plan set.
#[derive(Debug, Clone)]
pub struct PlanPrices {
    pub monthly: String,
    pub quarterly: String,
    pub yearly: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Default sender for outgoing mail.
    pub from_address: String,
    /// Shared key protecting the marketing dispatch endpoint.
    pub admin_key: SecretString,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Builder for [`Config`] with environment variable support.
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    server: ServerConfig,
    logging: LoggingConfig,
    identity: Option<IdentityConfig>,
    payments: Option<PaymentsConfig>,
    tokens: Option<TokenConfig>,
    access: AccessConfig,
    plans: Option<PlanPrices>,
    mail: Option<MailConfig>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            identity: None,
            payments: None,
            tokens: None,
            access: AccessConfig { trial_days: 7 },
            plans: None,
            mail: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.logging.json = enabled;
        self
    }

    pub fn with_identity(mut self, identity: IdentityConfig) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_payments(mut self, payments: PaymentsConfig) -> Self {
        self.payments = Some(payments);
        self
    }

    pub fn with_tokens(mut self, tokens: TokenConfig) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn with_trial_days(mut self, days: u64) -> Self {
        self.access.trial_days = days;
        self
    }

    pub fn with_plan_prices(mut self, plans: PlanPrices) -> Self {
        self.plans = Some(plans);
        self
    }

    pub fn with_mail(mut self, mail: MailConfig) -> Self {
        self.mail = Some(mail);
        self
    }

    /// Load configuration from environment variables with the `GOALCAST_` prefix.
    ///
    /// Required variables: `GOALCAST_IDENTITY_URL`, `GOALCAST_IDENTITY_API_KEY`,
    /// `GOALCAST_SESSION_SECRET`, `GOALCAST_PAYMENTS_API_KEY`,
    /// `GOALCAST_WEBHOOK_SECRET`, `GOALCAST_TOKEN_SECRET`,
    /// `GOALCAST_PRICE_MONTHLY`, `GOALCAST_PRICE_QUARTERLY`,
    /// `GOALCAST_PRICE_YEARLY`, `GOALCAST_MAIL_FROM`, `GOALCAST_ADMIN_KEY`,
    /// `GOALCAST_SUCCESS_URL`, `GOALCAST_CANCEL_URL`.
    pub fn from_env(mut self) -> Self {
        if let Some(host) = env_var("HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_var("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(level) = env_var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = env_var("LOG_JSON") {
            self.logging.json = json.parse().unwrap_or(false);
        }

        if let (Some(base_url), Some(api_key), Some(session_secret)) = (
            env_var("IDENTITY_URL"),
            env_var("IDENTITY_API_KEY"),
            env_var("SESSION_SECRET"),
        ) {
            self.identity = Some(IdentityConfig {
                base_url,
                api_key: api_key.into(),
                session_secret: session_secret.into(),
            });
        }

        if let (Some(api_key), Some(webhook_secret)) =
            (env_var("PAYMENTS_API_KEY"), env_var("WEBHOOK_SECRET"))
        {
            self.payments = Some(PaymentsConfig {
                api_key: api_key.into(),
                webhook_secret: webhook_secret.into(),
                success_url: env_var("SUCCESS_URL").unwrap_or_default(),
                cancel_url: env_var("CANCEL_URL").unwrap_or_default(),
            });
        }

        if let Some(secret) = env_var("TOKEN_SECRET") {
            self.tokens = Some(TokenConfig {
                secret: secret.into(),
                issuer: env_var("TOKEN_ISSUER").unwrap_or_else(|| "goalcast".to_string()),
                ttl_days: env_var("TOKEN_TTL_DAYS")
                    .and_then(|d| d.parse().ok())
                    .unwrap_or(30),
            });
        }

        if let Some(days) = env_var("TRIAL_DAYS").and_then(|d| d.parse().ok()) {
            self.access.trial_days = days;
        }

        if let (Some(monthly), Some(quarterly), Some(yearly)) = (
            env_var("PRICE_MONTHLY"),
            env_var("PRICE_QUARTERLY"),
            env_var("PRICE_YEARLY"),
        ) {
            self.plans = Some(PlanPrices {
                monthly,
                quarterly,
                yearly,
            });
        }

        if let (Some(from_address), Some(admin_key)) = (env_var("MAIL_FROM"), env_var("ADMIN_KEY"))
        {
            self.mail = Some(MailConfig {
                from_address,
                admin_key: admin_key.into(),
            });
        }

        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns an error when required sections are missing, secrets are
    /// empty, the listen address is invalid, or a checkout redirect URL is
    /// not HTTPS.
    pub fn build(self) -> Result<Config> {
        self.server.addr().map_err(|e| {
            GoalcastError::bad_request(format!(
                "Invalid server address {}:{} - {}",
                self.server.host, self.server.port, e
            ))
        })?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(GoalcastError::bad_request(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        let identity = self
            .identity
            .ok_or_else(|| GoalcastError::bad_request("Identity provider config missing"))?;
        require_secret(&identity.api_key, "identity API key")?;
        require_secret(&identity.session_secret, "session secret")?;

        let payments = self
            .payments
            .ok_or_else(|| GoalcastError::bad_request("Payments config missing"))?;
        require_secret(&payments.api_key, "payments API key")?;
        require_secret(&payments.webhook_secret, "webhook secret")?;
        validate_redirect_url(&payments.success_url)?;
        validate_redirect_url(&payments.cancel_url)?;

        let tokens = self
            .tokens
            .ok_or_else(|| GoalcastError::bad_request("Token config missing"))?;
        require_secret(&tokens.secret, "token secret")?;
        if tokens.ttl_days == 0 {
            return Err(GoalcastError::bad_request(
                "Token TTL must be greater than 0 days",
            ));
        }

        if self.access.trial_days == 0 {
            return Err(GoalcastError::bad_request(
                "Trial window must be greater than 0 days",
            ));
        }

        let plans = self
            .plans
            .ok_or_else(|| GoalcastError::bad_request("Plan price IDs missing"))?;

        let mail = self
            .mail
            .ok_or_else(|| GoalcastError::bad_request("Mail config missing"))?;
        require_secret(&mail.admin_key, "admin key")?;

        Ok(Config {
            server: self.server,
            logging: self.logging,
            identity,
            payments,
            tokens,
            access: self.access,
            plans,
            mail,
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a checkout redirect URL.
///
/// Must parse and use HTTPS; the payment provider redirects browsers here
/// after checkout, so plain HTTP would leak the session ID.
fn validate_redirect_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url)
        .map_err(|e| GoalcastError::bad_request(format!("Invalid redirect URL: {}", e)))?;

    if parsed.scheme() != "https" {
        return Err(GoalcastError::bad_request(
            "Redirect URL must use HTTPS".to_string(),
        ));
    }

    Ok(())
}

fn require_secret(secret: &SecretString, what: &str) -> Result<()> {
    if secret.expose_secret().is_empty() {
        return Err(GoalcastError::bad_request(format!("{} must not be empty", what)));
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("GOALCAST_{}", name)).ok()
}
