use std::sync::Arc;

use domain::{DomainError, MessageId, NewUser, RepositoryError, Role, User, UserId, Username};
use tracing::info;

use crate::{
    clock::Clock, context::ChatContext, error::ApplicationError, events::ServerEvent,
    password::PasswordHasher, repository::UserRepository, session::Identity,
};

#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: Option<Role>,
}

pub struct UserServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
    pub chat: Arc<ChatContext>,
}

/// 身份认证、创建者引导与管理员用户管理。
pub struct UserService {
    deps: UserServiceDependencies,
}

impl UserService {
    pub fn new(deps: UserServiceDependencies) -> Self {
        Self { deps }
    }

    async fn load_actor(&self, actor_id: UserId) -> Result<User, ApplicationError> {
        self.deps
            .user_repository
            .find_by_id(actor_id)
            .await?
            .ok_or(ApplicationError::Authentication)
    }

    async fn load_target(&self, target_id: UserId) -> Result<User, ApplicationError> {
        Ok(self
            .deps
            .user_repository
            .find_by_id(target_id)
            .await?
            .ok_or(DomainError::UserNotFound)?)
    }

    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<User, ApplicationError> {
        let username = Username::parse(username).map_err(|_| ApplicationError::Authentication)?;
        let user = self
            .deps
            .user_repository
            .find_by_username(&username)
            .await?
            .ok_or(ApplicationError::Authentication)?;

        let password_ok = self
            .deps
            .password_hasher
            .verify(password, &user.password)
            .await?;
        if !password_ok {
            return Err(ApplicationError::Authentication);
        }
        Ok(user)
    }

    /// 启动时保证创建者账号存在。账号已存在时只校正其角色。
    pub async fn ensure_creator(
        &self,
        username: &str,
        password: &str,
    ) -> Result<User, ApplicationError> {
        let username = Username::parse(username)?;
        if let Some(mut existing) = self
            .deps
            .user_repository
            .find_by_username(&username)
            .await?
        {
            if existing.role != Role::Creator {
                self.deps
                    .user_repository
                    .set_role(existing.id, Role::Creator)
                    .await?;
                existing.role = Role::Creator;
                info!(user_id = %existing.id, "promoted bootstrap account to creator");
            }
            return Ok(existing);
        }

        let hash = self.deps.password_hasher.hash(password).await?;
        let creator = self
            .deps
            .user_repository
            .create(NewUser::new(username, hash, Role::Creator, self.deps.clock.now()))
            .await?;
        info!(user_id = %creator.id, username = %creator.username, "created creator account");
        Ok(creator)
    }

    pub async fn create_user(
        &self,
        actor_id: UserId,
        request: CreateUserRequest,
    ) -> Result<User, ApplicationError> {
        self.load_actor(actor_id).await?.role.require(Role::Creator)?;

        let role = request.role.unwrap_or_default();
        if role == Role::Creator {
            return Err(DomainError::operation_not_allowed("only one creator may exist").into());
        }
        let username = Username::parse(request.username)?;
        if request.password.is_empty() {
            return Err(DomainError::invalid_argument("password", "cannot be empty").into());
        }
        if self
            .deps
            .user_repository
            .find_by_username(&username)
            .await?
            .is_some()
        {
            return Err(DomainError::UserAlreadyExists.into());
        }

        let hash = self.deps.password_hasher.hash(&request.password).await?;
        let user = self
            .deps
            .user_repository
            .create(NewUser::new(username, hash, role, self.deps.clock.now()))
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict => ApplicationError::from(DomainError::UserAlreadyExists),
                other => other.into(),
            })?;
        info!(user_id = %user.id, role = %user.role, actor_id = %actor_id, "user created");
        Ok(user)
    }

    pub async fn change_role(
        &self,
        actor_id: UserId,
        target_id: UserId,
        role: Role,
    ) -> Result<User, ApplicationError> {
        self.load_actor(actor_id).await?.role.require(Role::Creator)?;
        if role == Role::Creator {
            return Err(DomainError::operation_not_allowed("only one creator may exist").into());
        }
        let mut target = self.load_target(target_id).await?;
        if target.is_creator() {
            return Err(DomainError::operation_not_allowed("the creator cannot be demoted").into());
        }

        self.deps.user_repository.set_role(target.id, role).await?;
        target.role = role;
        // 管理人员不可被禁言，晋升时清除残留的禁言状态
        if role.is_staff() && target.is_muted {
            self.deps.user_repository.clear_mute(target.id).await?;
            target.unmute();
            info!(user_id = %target.id, "mute cleared on promotion");
        }
        info!(user_id = %target.id, role = %role, actor_id = %actor_id, "role changed");
        Ok(target)
    }

    /// 删除用户：先逐条清除其消息（每条广播 `message_deleted`），再删除账号。
    pub async fn delete_user(
        &self,
        actor_id: UserId,
        target_id: UserId,
    ) -> Result<Vec<MessageId>, ApplicationError> {
        self.load_actor(actor_id).await?.role.require(Role::Creator)?;

        let chat = &self.deps.chat;
        chat.room()
            .commit(async {
                let target = self.load_target(target_id).await?;
                if target.is_creator() {
                    return Err(ApplicationError::from(DomainError::operation_not_allowed(
                        "the creator cannot be deleted",
                    )));
                }

                let removed = chat.messages().purge_author(target.id).await?;
                // 账号删除失败时，已清除的消息仍需让房间知道
                for message_id in &removed {
                    chat.room().publish(ServerEvent::MessageDeleted {
                        message_id: *message_id,
                    });
                }
                self.deps.user_repository.delete(target.id).await?;
                info!(
                    user_id = %target.id,
                    actor_id = %actor_id,
                    messages = removed.len(),
                    "user deleted"
                );
                Ok((removed, Vec::new()))
            })
            .await
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ApplicationError> {
        Ok(self.deps.user_repository.list().await?)
    }

    /// 供连接建立时确认身份；用户不存在时返回 `None`。
    pub async fn identity(&self, user_id: UserId) -> Result<Option<Identity>, ApplicationError> {
        Ok(self
            .deps
            .user_repository
            .find_by_id(user_id)
            .await?
            .map(|user| Identity {
                user_id: user.id,
                username: user.username.as_str().to_owned(),
                role: user.role,
            }))
    }
}
