//! 统一配置中心
//!
//! 提供应用的全局配置管理，包括：
//! - 服务监听地址
//! - 数据库连接（可选，缺省时使用内存存储）
//! - JWT认证
//! - 聊天室参数（在线窗口、广播容量）
//! - 创建者账号引导
//!
//! 加载顺序：内置默认值 → `chat-server.toml` → `CHAT_` 前缀环境变量（`__` 表示嵌套）。

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 配置文件名，相对于工作目录
pub const CONFIG_FILE: &str = "chat-server.toml";

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// 服务配置
    #[validate(nested)]
    pub server: ServerConfig,
    /// 数据库配置
    #[validate(nested)]
    pub database: DatabaseConfig,
    /// JWT认证配置
    #[validate(nested)]
    pub jwt: JwtConfig,
    /// 聊天室配置
    #[validate(nested)]
    pub chat: ChatConfig,
    /// 创建者账号
    #[validate(nested)]
    pub bootstrap: BootstrapConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    #[validate(range(min = 10, max = 14))]
    pub bcrypt_cost: Option<u32>,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[validate(range(min = 1))]
    pub max_connections: u32,
}

/// JWT配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JwtConfig {
    // 至少256位/32字节
    #[validate(length(min = 32))]
    pub secret: String,
    #[validate(range(min = 1))]
    pub expiration_hours: i64,
}

/// 聊天室配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChatConfig {
    #[validate(range(min = 1))]
    pub presence_window_minutes: i64,
    #[validate(range(min = 1))]
    pub broadcast_capacity: usize,
}

/// 创建者账号引导配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BootstrapConfig {
    #[validate(length(min = 1))]
    pub creator_username: String,
    #[validate(length(min = 8))]
    pub creator_password: String,
}

const DEV_JWT_SECRET: &str = "dev-secret-key-not-for-production-use-minimum-32-chars";

impl Default for AppConfig {
    /// 默认值不包含可用的密钥与创建者密码，必须由配置文件或环境变量提供
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                bcrypt_cost: None,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: DEV_JWT_SECRET.to_string(),
                expiration_hours: 24,
            },
            chat: ChatConfig {
                presence_window_minutes: 5,
                broadcast_capacity: 256,
            },
            bootstrap: BootstrapConfig {
                creator_username: "Resolving".to_string(),
                creator_password: String::new(),
            },
        }
    }
}

impl AppConfig {
    /// 组合所有配置来源
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("CHAT_").split("__"))
            // 兼容常见的 DATABASE_URL
            .merge(
                Env::raw()
                    .only(&["DATABASE_URL"])
                    .map(|_| "database.url".into()),
            )
    }

    /// 加载并验证配置
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract().map_err(Box::new)?;
        config.validate_all()?;
        Ok(config)
    }

    /// 字段级校验之外的安全检查
    pub fn validate_all(&self) -> Result<(), ConfigError> {
        self.validate()?;

        // 检查JWT密钥是否为明显的开发密钥
        if self.jwt.secret.contains("dev-secret")
            || self.jwt.secret.contains("not-for-production")
            || self.jwt.secret.contains("please-change")
        {
            return Err(ConfigError::InvalidJwtSecret(
                "Cannot use development JWT secret".to_string(),
            ));
        }

        if let Some(url) = &self.database.url {
            if url.trim().is_empty() {
                return Err(ConfigError::InvalidDatabaseUrl(
                    "Database URL cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("Invalid JWT secret: {0}")]
    InvalidJwtSecret(String),
    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    const SECRET: &str = "production-grade-secret-key-with-sufficient-length";

    fn valid() -> AppConfig {
        let mut config = AppConfig::default();
        config.jwt.secret = SECRET.to_string();
        config.bootstrap.creator_password = "creator-password".to_string();
        config
    }

    #[test]
    fn test_defaults_need_secrets() {
        let config = AppConfig::default();
        assert_eq!(config.bootstrap.creator_username, "Resolving");
        assert_eq!(config.chat.presence_window_minutes, 5);
        assert!(config.database.url.is_none());
        assert!(config.validate_all().is_err());
        assert!(valid().validate_all().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = valid();

        config.jwt.secret = "short".to_string();
        assert!(matches!(
            config.validate_all(),
            Err(ConfigError::Validation(_))
        ));

        config.jwt.secret = DEV_JWT_SECRET.to_string();
        let result = config.validate_all();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("development JWT secret"));

        let mut config = valid();
        config.chat.broadcast_capacity = 0;
        assert!(config.validate_all().is_err());

        let mut config = valid();
        config.database.url = Some("  ".to_string());
        assert!(matches!(
            config.validate_all(),
            Err(ConfigError::InvalidDatabaseUrl(_))
        ));
    }

    #[test]
    fn test_bcrypt_cost_validation() {
        let mut config = valid();
        config.server.bcrypt_cost = Some(12);
        assert!(config.validate_all().is_ok());
        config.server.bcrypt_cost = Some(8);
        assert!(config.validate_all().is_err());
        config.server.bcrypt_cost = Some(16);
        assert!(config.validate_all().is_err());
    }

    #[test]
    fn test_layered_loading() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                [server]
                port = 9000

                [chat]
                presence_window_minutes = 10
                "#,
            )?;
            jail.set_env("CHAT_JWT__SECRET", SECRET);
            jail.set_env("CHAT_BOOTSTRAP__CREATOR_PASSWORD", "creator-password");
            jail.set_env("CHAT_SERVER__PORT", "9100");
            jail.set_env("DATABASE_URL", "postgres://chat@db:5432/chat");

            let config = AppConfig::load().expect("config loads");
            assert_eq!(config.server.port, 9100);
            assert_eq!(config.chat.presence_window_minutes, 10);
            assert_eq!(config.chat.broadcast_capacity, 256);
            assert_eq!(
                config.database.url.as_deref(),
                Some("postgres://chat@db:5432/chat")
            );
            assert_eq!(config.bind_address(), "127.0.0.1:9100");
            Ok(())
        });
    }

    #[test]
    fn test_missing_secrets_fail_to_load() {
        Jail::expect_with(|_jail| {
            assert!(AppConfig::load().is_err());
            Ok(())
        });
    }
}
