use std::{fmt, net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::{anyhow, bail, Context};
use jsonwebtoken::Algorithm;

/// One year; longer-lived tokens are refused at startup.
pub const MAX_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub ttl_minutes: i64,
}

// Secrets stay out of Debug output so the config can be logged.
impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("ttl_minutes", &self.ttl_minutes)
            .finish()
    }
}

/// Hosted database endpoint: either its REST table API (`https://…`) or a
/// direct Postgres connection string.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub key: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub project_name: String,
    pub version: String,
    pub api_prefix: String,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub google_cloud_credentials: PathBuf,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source. Required keys that are
    /// missing or malformed produce an error naming the variable.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> anyhow::Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("missing required environment variable {key}"))
        };
        let optional = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        let algorithm = parse_algorithm(&optional("ALGORITHM", "HS256"))?;
        let ttl_minutes = optional("ACCESS_TOKEN_EXPIRE_MINUTES", "30")
            .trim()
            .parse::<i64>()
            .context("ACCESS_TOKEN_EXPIRE_MINUTES must be an integer")?;
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&ttl_minutes) {
            bail!(
                "ACCESS_TOKEN_EXPIRE_MINUTES must be between 1 and {MAX_TOKEN_TTL_MINUTES}, got {ttl_minutes}"
            );
        }

        let host = optional("APP_HOST", "0.0.0.0");
        let port = optional("APP_PORT", "8080");
        let bind_addr: SocketAddr = format!("{}:{}", host.trim(), port.trim())
            .parse()
            .with_context(|| format!("APP_HOST/APP_PORT do not form a socket address: {host}:{port}"))?;

        Ok(Self {
            project_name: optional("PROJECT_NAME", "Meeting Transcriber API"),
            version: optional("VERSION", "1.0.0"),
            api_prefix: normalize_prefix(&optional("API_V1_STR", "/api/v1")),
            database: DatabaseConfig {
                url: required("SUPABASE_URL")?,
                key: required("SUPABASE_KEY")?,
            },
            jwt: JwtConfig {
                secret: required("SECRET_KEY")?,
                algorithm,
                ttl_minutes,
            },
            google_cloud_credentials: PathBuf::from(required("GOOGLE_CLOUD_CREDENTIALS")?),
            bind_addr,
        })
    }
}

fn parse_algorithm(name: &str) -> anyhow::Result<Algorithm> {
    let algorithm = Algorithm::from_str(name.trim())
        .map_err(|_| anyhow!("ALGORITHM {name:?} is not a known signing algorithm"))?;
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        other => bail!("ALGORITHM {other:?} is not supported; use HS256, HS384 or HS512"),
    }
}

// "/api/v1/" -> "/api/v1", "api" -> "/api", "/" -> ""
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
