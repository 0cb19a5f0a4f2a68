use async_trait::async_trait;

use crate::error::AppResult;

/// Outbound mail seam. Order confirmation goes through here; actual
/// templating/delivery is provided by the deployment.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()>;
}

/// Logs instead of sending. Used in development and tests.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        tracing::info!(to, subject, body, "outbound mail");
        Ok(())
    }
}
