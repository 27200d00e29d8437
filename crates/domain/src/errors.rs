//! 领域模型错误定义
//!
//! 定义了系统中所有可能的领域错误与仓储错误，提供清晰的错误上下文。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 参数校验失败
    #[error("invalid argument {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// 用户名已被占用
    #[error("user already exists")]
    UserAlreadyExists,

    /// 用户不存在
    #[error("user not found")]
    UserNotFound,

    /// 消息不存在
    #[error("message not found")]
    MessageNotFound,

    /// 角色等级不足
    #[error("insufficient permissions: {action}")]
    InsufficientPermissions { action: String },

    /// 发送者处于禁言状态
    #[error("user is muted")]
    UserMuted,

    /// 业务规则不允许该操作（例如禁言管理员、删除创建者）
    #[error("operation not allowed: {rule}")]
    OperationNotAllowed { rule: String },
}

impl DomainError {
    /// 创建参数校验错误
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// 创建权限不足错误
    pub fn insufficient_permissions(action: impl Into<String>) -> Self {
        Self::InsufficientPermissions {
            action: action.into(),
        }
    }

    /// 创建业务规则违反错误
    pub fn operation_not_allowed(rule: impl Into<String>) -> Self {
        Self::OperationNotAllowed { rule: rule.into() }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;

/// 仓储层错误
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("record conflicts with existing data")]
    Conflict,
    #[error("storage failure: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
