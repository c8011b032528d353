use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub max_body_size: usize,
    pub cache_ttl_secs: u64,
    pub index_ttl_secs: u64,
    pub blob_url: Option<String>,
    pub log_level: String,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;

        let host: IpAddr = env_or("MOCKWIRE_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid MOCKWIRE_HOST: {e}"))?;

        let port: u16 = env_or("MOCKWIRE_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid MOCKWIRE_PORT: {e}"))?;

        let max_body_size: usize = env_or("MOCKWIRE_MAX_BODY_SIZE", "10485760")
            .parse()
            .map_err(|e| format!("Invalid MOCKWIRE_MAX_BODY_SIZE: {e}"))?;

        let cache_ttl_secs: u64 = env_or("MOCKWIRE_CACHE_TTL_SECS", "300")
            .parse()
            .map_err(|e| format!("Invalid MOCKWIRE_CACHE_TTL_SECS: {e}"))?;

        let index_ttl_secs: u64 = env_or("MOCKWIRE_INDEX_TTL_SECS", "30")
            .parse()
            .map_err(|e| format!("Invalid MOCKWIRE_INDEX_TTL_SECS: {e}"))?;

        let blob_url = std::env::var("MOCKWIRE_BLOB_URL").ok().filter(|s| !s.is_empty());

        let log_level = env_or("MOCKWIRE_LOG_LEVEL", "info");

        let smtp = match (
            std::env::var("MOCKWIRE_SMTP_HOST").ok(),
            std::env::var("MOCKWIRE_SMTP_PORT").ok(),
            std::env::var("MOCKWIRE_SMTP_USER").ok(),
            std::env::var("MOCKWIRE_SMTP_PASS").ok(),
            std::env::var("MOCKWIRE_SMTP_FROM").ok(),
        ) {
            (Some(host), Some(port), Some(user), Some(pass), Some(from)) => Some(SmtpConfig {
                host,
                port: port
                    .parse()
                    .map_err(|e| format!("Invalid MOCKWIRE_SMTP_PORT: {e}"))?,
                user,
                pass,
                from,
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            host,
            port,
            max_body_size,
            cache_ttl_secs,
            index_ttl_secs,
            blob_url,
            log_level,
            smtp,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
