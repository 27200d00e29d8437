use serde::{Deserialize, Serialize};
use time::Duration;

use crate::errors::DomainError;
use crate::moderation::MuteStatus;
use crate::role::Role;
use crate::value_objects::{PasswordHash, Timestamp, UserId, Username};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    #[serde(skip_serializing)] // 密码字段不暴露给客户端
    pub password: PasswordHash,
    pub role: Role,
    pub is_muted: bool,
    /// 仅在 `is_muted` 为真时有意义
    pub mute_until: Option<Timestamp>,
    pub last_seen: Timestamp,
}

impl User {
    /// 观察当前禁言状态，不修改记录。
    pub fn mute_status(&self, now: Timestamp) -> MuteStatus {
        MuteStatus::evaluate(self.is_muted, self.mute_until, now)
    }

    pub fn mute(&mut self, until: Option<Timestamp>) {
        self.is_muted = true;
        self.mute_until = until;
    }

    pub fn unmute(&mut self) {
        self.is_muted = false;
        self.mute_until = None;
    }

    /// 观察并校正：过期时清除标志与到期时间。
    pub fn reconcile_mute(&mut self, now: Timestamp) -> MuteStatus {
        let status = self.mute_status(now);
        if status == MuteStatus::Expired {
            self.unmute();
        }
        status
    }

    pub fn touch(&mut self, now: Timestamp) {
        self.last_seen = now;
    }

    pub fn is_online(&self, now: Timestamp, window: Duration) -> bool {
        now - self.last_seen <= window
    }

    pub fn is_creator(&self) -> bool {
        self.role == Role::Creator
    }

    /// 只有普通用户可以被禁言。
    pub fn ensure_mutable(&self) -> Result<(), DomainError> {
        if self.role.is_staff() {
            return Err(DomainError::operation_not_allowed(
                "moderators and the creator cannot be muted",
            ));
        }
        Ok(())
    }
}

/// 尚未持久化的用户，id 由存储层分配。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: Username,
    pub password: PasswordHash,
    pub role: Role,
    pub created_at: Timestamp,
}

impl NewUser {
    pub fn new(username: Username, password: PasswordHash, role: Role, now: Timestamp) -> Self {
        Self {
            username,
            password,
            role,
            created_at: now,
        }
    }

    pub fn into_user(self, id: UserId) -> User {
        User {
            id,
            username: self.username,
            password: self.password,
            role: self.role,
            is_muted: false,
            mute_until: None,
            last_seen: self.created_at,
        }
    }
}
