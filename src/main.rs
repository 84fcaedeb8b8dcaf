use std::sync::Arc;

use anyhow::Context;

use goalcast::app::AppContext;
use goalcast::config::ConfigBuilder;
use goalcast::email::{ConsoleMailer, Mailer, SmtpMailer};
use goalcast::identity::HostedIdentityClient;
use goalcast::payments::LivePaymentClient;
use goalcast::subscription::store::memory::InMemorySubscriptionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigBuilder::new()
        .from_env()
        .build()
        .context("invalid configuration")?;

    goalcast::init_tracing(&config.logging.level, config.logging.json);

    let identity = Arc::new(HostedIdentityClient::new(&config.identity));
    let payments = Arc::new(
        LivePaymentClient::with_default_config(config.payments.api_key.clone())
            .context("invalid payments API key")?,
    );

    // SMTP when configured, console fallback for local runs.
    let mailer: Arc<dyn Mailer> = match SmtpMailer::from_env() {
        Ok(smtp) => Arc::new(smtp),
        Err(_) => {
            tracing::warn!("SMTP not configured, campaign emails go to stdout");
            Arc::new(ConsoleMailer::new())
        }
    };

    // TODO: swap for a database-backed SubscriptionStore before going
    // multi-instance; this one loses state on restart.
    let store = Arc::new(InMemorySubscriptionStore::new());
    tracing::warn!("Using in-memory subscription store; records do not survive restarts");

    let ctx = AppContext::builder()
        .store(store)
        .identity(identity)
        .payments(payments)
        .mailer(mailer)
        .config(config.clone())
        .build();

    let app = goalcast::http::router(ctx);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!(%addr, "goalcast listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
