use std::sync::Arc;

use domain::{DomainError, MuteDuration, MuteStatus, RepositoryError, Role, Timestamp, User, UserId};
use tracing::info;

use crate::{
    clock::Clock, error::ApplicationError, events::ServerEvent, repository::UserRepository,
};

/// 成功禁言后的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuteOutcome {
    pub target: UserId,
    pub username: String,
    pub moderator: String,
    pub duration: MuteDuration,
    pub until: Option<Timestamp>,
}

impl MuteOutcome {
    pub fn event(&self) -> ServerEvent {
        ServerEvent::UserMuted {
            username: self.username.clone(),
            moderator: self.moderator.clone(),
            duration: self.duration.label().to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmuteOutcome {
    pub target: UserId,
    pub username: String,
    pub moderator: String,
}

impl UnmuteOutcome {
    pub fn event(&self) -> ServerEvent {
        ServerEvent::UserUnmuted {
            username: self.username.clone(),
            moderator: self.moderator.clone(),
        }
    }
}

/// 每个用户的禁言标志与可选到期时间，过期在每次访问时惰性校正。
pub struct ModerationState {
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
}

impl ModerationState {
    pub fn new(users: Arc<dyn UserRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { users, clock }
    }

    /// 观察并校正禁言状态。过期的禁言在同一原子步骤内被清除。
    pub async fn is_muted(&self, user_id: UserId) -> Result<bool, ApplicationError> {
        let status = self
            .users
            .reconcile_mute(user_id, self.clock.now())
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound => ApplicationError::from(DomainError::UserNotFound),
                other => other.into(),
            })?;
        if status == MuteStatus::Expired {
            info!(user_id = %user_id, "mute expired and was cleared");
        }
        Ok(status.is_muted())
    }

    async fn authorize(
        &self,
        actor_id: UserId,
        target_id: UserId,
    ) -> Result<(User, User), ApplicationError> {
        let actor = self
            .users
            .find_by_id(actor_id)
            .await?
            .ok_or(ApplicationError::Authentication)?;
        actor.role.require(Role::Moderator)?;

        let target = self
            .users
            .find_by_id(target_id)
            .await?
            .ok_or(DomainError::UserNotFound)?;
        target.ensure_mutable()?;
        Ok((actor, target))
    }

    /// 禁言普通用户。校验顺序：操作者角色、目标存在、目标角色、时长。
    pub async fn mute(
        &self,
        actor_id: UserId,
        target_id: UserId,
        duration: &str,
        custom_minutes: Option<i64>,
    ) -> Result<MuteOutcome, ApplicationError> {
        let (actor, target) = self.authorize(actor_id, target_id).await?;
        let duration = MuteDuration::from_request(duration, custom_minutes)?;
        let until = duration.resolve(self.clock.now());

        self.users.set_mute(target.id, until).await?;
        info!(
            user_id = %target.id,
            moderator_id = %actor.id,
            duration = %duration,
            "user muted"
        );

        Ok(MuteOutcome {
            target: target.id,
            username: target.username.as_str().to_owned(),
            moderator: actor.username.as_str().to_owned(),
            duration,
            until,
        })
    }

    pub async fn unmute(
        &self,
        actor_id: UserId,
        target_id: UserId,
    ) -> Result<UnmuteOutcome, ApplicationError> {
        let (actor, target) = self.authorize(actor_id, target_id).await?;
        self.users.clear_mute(target.id).await?;
        info!(user_id = %target.id, moderator_id = %actor.id, "user unmuted");

        Ok(UnmuteOutcome {
            target: target.id,
            username: target.username.as_str().to_owned(),
            moderator: actor.username.as_str().to_owned(),
        })
    }
}
