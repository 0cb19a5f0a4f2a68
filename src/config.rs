use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Base URLs for the two marketplace feeds the ingestion job pulls from.
    pub keyhub_url: String,
    pub gamevault_url: String,
    /// Shared secret for verifying payment-gateway webhook signatures.
    pub webhook_secret: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let keyhub_url =
            env::var("KEYHUB_URL").unwrap_or_else(|_| "https://api.keyhub.example".to_string());
        let gamevault_url = env::var("GAMEVAULT_URL")
            .unwrap_or_else(|_| "https://feed.gamevault.example".to_string());
        let webhook_secret = env::var("WEBHOOK_SECRET")?;
        Ok(Self {
            database_url,
            host,
            port,
            keyhub_url,
            gamevault_url,
            webhook_secret,
        })
    }
}
