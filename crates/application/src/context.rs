use std::sync::Arc;

use domain::{MessageId, MessageView, User, UserId};
use time::Duration;

use crate::{
    clock::Clock,
    error::ApplicationError,
    events::ServerEvent,
    message_store::MessageStore,
    moderation::{ModerationState, MuteOutcome, UnmuteOutcome},
    presence::PresenceTracker,
    repository::{MessageRepository, UserRepository},
    room::ChatRoom,
};

#[derive(Debug, Clone, Copy)]
pub struct ChatSettings {
    pub presence_window: Duration,
    pub broadcast_capacity: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            presence_window: Duration::minutes(5),
            broadcast_capacity: 256,
        }
    }
}

pub struct ChatDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub clock: Arc<dyn Clock>,
    pub settings: ChatSettings,
}

/// 显式的服务端上下文，持有在线状态、禁言状态、消息存储与房间，
/// 以句柄形式交给每个连接。所有会改变房间可见状态的操作都经由
/// `ChatRoom::commit` 提交。
pub struct ChatContext {
    room: ChatRoom,
    presence: PresenceTracker,
    moderation: Arc<ModerationState>,
    messages: MessageStore,
}

impl ChatContext {
    pub fn new(deps: ChatDependencies) -> Self {
        let ChatDependencies {
            user_repository,
            message_repository,
            clock,
            settings,
        } = deps;

        let moderation = Arc::new(ModerationState::new(user_repository.clone(), clock.clone()));
        Self {
            room: ChatRoom::new(settings.broadcast_capacity),
            presence: PresenceTracker::new(
                user_repository.clone(),
                clock.clone(),
                settings.presence_window,
            ),
            messages: MessageStore::new(
                user_repository,
                message_repository,
                moderation.clone(),
                clock,
            ),
            moderation,
        }
    }

    pub fn room(&self) -> &ChatRoom {
        &self.room
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn moderation(&self) -> &ModerationState {
        &self.moderation
    }

    pub fn messages(&self) -> &MessageStore {
        &self.messages
    }

    pub async fn send_message(
        &self,
        author: UserId,
        text: &str,
    ) -> Result<MessageView, ApplicationError> {
        self.room
            .commit(async {
                let view = self.messages.append(author, text).await?;
                Ok((view.clone(), vec![ServerEvent::NewMessage(view)]))
            })
            .await
    }

    pub async fn delete_message(
        &self,
        actor: UserId,
        message_id: MessageId,
    ) -> Result<MessageId, ApplicationError> {
        self.room
            .commit(async {
                let id = self.messages.delete(actor, message_id).await?;
                Ok((id, vec![ServerEvent::MessageDeleted { message_id: id }]))
            })
            .await
    }

    pub async fn mute(
        &self,
        actor: UserId,
        target: UserId,
        duration: &str,
        custom_minutes: Option<i64>,
    ) -> Result<MuteOutcome, ApplicationError> {
        self.room
            .commit(async {
                let outcome = self
                    .moderation
                    .mute(actor, target, duration, custom_minutes)
                    .await?;
                let event = outcome.event();
                Ok((outcome, vec![event]))
            })
            .await
    }

    pub async fn unmute(
        &self,
        actor: UserId,
        target: UserId,
    ) -> Result<UnmuteOutcome, ApplicationError> {
        self.room
            .commit(async {
                let outcome = self.moderation.unmute(actor, target).await?;
                let event = outcome.event();
                Ok((outcome, vec![event]))
            })
            .await
    }

    pub async fn touch(&self, user: UserId) {
        self.presence.touch(user).await;
    }

    pub async fn list_messages(&self) -> Result<Vec<MessageView>, ApplicationError> {
        self.messages.list().await
    }

    pub async fn online_users(&self) -> Result<Vec<User>, ApplicationError> {
        self.presence.online_users().await
    }
}
