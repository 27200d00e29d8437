//! 用户角色与集中式权限检查

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// 三级角色，按权限从低到高排序：`User < Moderator < Creator`。
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Creator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Creator => "creator",
        }
    }

    pub fn at_least(&self, level: Role) -> bool {
        *self >= level
    }

    /// 所有操作在执行业务逻辑前统一调用的权限检查。
    pub fn require(&self, level: Role) -> Result<(), DomainError> {
        if self.at_least(level) {
            Ok(())
        } else {
            Err(DomainError::insufficient_permissions(format!(
                "requires {level} role"
            )))
        }
    }

    pub fn is_staff(&self) -> bool {
        self.at_least(Role::Moderator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" | "regular" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "creator" => Ok(Role::Creator),
            other => Err(DomainError::invalid_argument(
                "role",
                format!("unknown role `{other}`"),
            )),
        }
    }
}
