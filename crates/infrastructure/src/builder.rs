use std::sync::Arc;

use application::{
    memory::{InMemoryMessageRepository, InMemoryUserRepository},
    MessageRepository, PasswordHasher, UserRepository,
};
use thiserror::Error;
use tracing::info;

use crate::{
    migrations::MIGRATOR,
    password::BcryptPasswordHasher,
    repository::{create_pg_pool, PgStorage},
};

#[derive(Debug, Clone)]
pub struct InfrastructureConfig {
    /// 为空时使用内存仓储
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub bcrypt_cost: Option<u32>,
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
            bcrypt_cost: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// 装配好的存储与密码哈希适配器
#[derive(Clone)]
pub struct Infrastructure {
    pub user_repository: Arc<dyn UserRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
}

impl Infrastructure {
    pub async fn connect(config: InfrastructureConfig) -> Result<Self, InfrastructureError> {
        let password_hasher = Arc::new(BcryptPasswordHasher::new(config.bcrypt_cost));

        let Some(database_url) = config.database_url.as_deref() else {
            info!("no database configured, using in-memory storage");
            return Ok(Self::in_memory_with(password_hasher));
        };

        let pool = create_pg_pool(database_url, config.max_connections).await?;
        MIGRATOR.run(&pool).await?;
        info!(max_connections = config.max_connections, "connected to postgres");

        let storage = PgStorage::new(pool);
        Ok(Self {
            user_repository: storage.user_repository,
            message_repository: storage.message_repository,
            password_hasher,
        })
    }

    pub fn in_memory(bcrypt_cost: Option<u32>) -> Self {
        Self::in_memory_with(Arc::new(BcryptPasswordHasher::new(bcrypt_cost)))
    }

    fn in_memory_with(password_hasher: Arc<BcryptPasswordHasher>) -> Self {
        Self {
            user_repository: Arc::new(InMemoryUserRepository::new()),
            message_repository: Arc::new(InMemoryMessageRepository::new()),
            password_hasher,
        }
    }
}
