use std::sync::Arc;

use tracing::warn;

use crate::{
    auth::jwt::JwtKeys,
    config::AppConfig,
    store::{self, UserStore},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub keys: JwtKeys,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        if !config.google_cloud_credentials.exists() {
            warn!(
                path = %config.google_cloud_credentials.display(),
                "GOOGLE_CLOUD_CREDENTIALS points to a missing file"
            );
        }

        let users = store::connect(&config.database).await?;
        Ok(Self::from_parts(config, users))
    }

    pub fn from_parts(config: Arc<AppConfig>, users: Arc<dyn UserStore>) -> Self {
        let keys = JwtKeys::new(&config.jwt);
        Self {
            config,
            users,
            keys,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{DatabaseConfig, JwtConfig};
        use crate::store::memory::MemoryUserStore;

        let config = Arc::new(AppConfig {
            project_name: "Meeting Transcriber API".into(),
            version: "1.0.0".into(),
            api_prefix: "/api/v1".into(),
            database: DatabaseConfig {
                url: "memory://".into(),
                key: "fake".into(),
            },
            jwt: JwtConfig {
                secret: "test".into(),
                algorithm: jsonwebtoken::Algorithm::HS256,
                ttl_minutes: 5,
            },
            google_cloud_credentials: "fake.json".into(),
            bind_addr: std::net::SocketAddr::from(([127, 0, 0, 1], 0)),
        });

        Self::from_parts(config, Arc::new(MemoryUserStore::default()))
    }
}
