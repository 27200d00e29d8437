use domain::{DomainError, RepositoryError};
use thiserror::Error;

use crate::password::PasswordHasherError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(RepositoryError),
    #[error("password error: {0}")]
    Password(#[from] PasswordHasherError),
    #[error("authentication failed")]
    Authentication,
}

/// 对外暴露的错误分类，决定 HTTP 状态码与客户端提示。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthenticated,
    Forbidden,
    NotFound,
    InvalidArgument,
    Conflict,
    Unavailable,
}

impl ApplicationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApplicationError::Domain(err) => match err {
                DomainError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
                DomainError::UserAlreadyExists => ErrorKind::Conflict,
                DomainError::UserNotFound | DomainError::MessageNotFound => ErrorKind::NotFound,
                DomainError::InsufficientPermissions { .. }
                | DomainError::UserMuted
                | DomainError::OperationNotAllowed { .. } => ErrorKind::Forbidden,
            },
            ApplicationError::Repository(err) => match err {
                RepositoryError::NotFound => ErrorKind::NotFound,
                RepositoryError::Conflict => ErrorKind::Conflict,
                RepositoryError::Storage { .. } => ErrorKind::Unavailable,
            },
            ApplicationError::Password(_) => ErrorKind::Unavailable,
            ApplicationError::Authentication => ErrorKind::Unauthenticated,
        }
    }

    /// 返回给发起者的提示文本，存储细节不外泄。
    pub fn client_message(&self) -> String {
        match self {
            ApplicationError::Domain(err) => match err {
                DomainError::InvalidArgument { field, reason } => format!("{field} {reason}"),
                DomainError::UserAlreadyExists => "user already exists".to_owned(),
                DomainError::UserNotFound => "user not found".to_owned(),
                DomainError::MessageNotFound => "message not found".to_owned(),
                DomainError::InsufficientPermissions { .. } => "access denied".to_owned(),
                DomainError::UserMuted => "you are muted and cannot send messages".to_owned(),
                DomainError::OperationNotAllowed { rule } => rule.clone(),
            },
            ApplicationError::Repository(RepositoryError::NotFound) => "not found".to_owned(),
            ApplicationError::Repository(RepositoryError::Conflict) => "conflict".to_owned(),
            ApplicationError::Repository(RepositoryError::Storage { .. })
            | ApplicationError::Password(_) => "service temporarily unavailable".to_owned(),
            ApplicationError::Authentication => "invalid credentials".to_owned(),
        }
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Repository(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_error_taxonomy() {
        let muted = ApplicationError::from(DomainError::UserMuted);
        assert_eq!(muted.kind(), ErrorKind::Forbidden);
        assert_eq!(
            ApplicationError::from(DomainError::MessageNotFound).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ApplicationError::from(DomainError::invalid_argument("message", "cannot be empty"))
                .kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            ApplicationError::from(RepositoryError::storage("down")).kind(),
            ErrorKind::Unavailable
        );
        assert_eq!(ApplicationError::Authentication.kind(), ErrorKind::Unauthenticated);
    }

    #[test]
    fn storage_details_are_not_exposed() {
        let err = ApplicationError::from(RepositoryError::storage("connection refused on 10.0.0.5"));
        assert_eq!(err.client_message(), "service temporarily unavailable");
    }
}
