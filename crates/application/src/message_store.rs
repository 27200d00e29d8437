use std::collections::HashMap;
use std::sync::Arc;

use domain::{DomainError, MessageId, MessageText, MessageView, NewMessage, Role, UserId};
use tracing::debug;

use crate::{
    clock::Clock,
    error::ApplicationError,
    moderation::ModerationState,
    repository::{MessageRepository, UserRepository},
};

/// 聊天消息的权威日志。禁言检查总是先于持久化。
pub struct MessageStore {
    users: Arc<dyn UserRepository>,
    messages: Arc<dyn MessageRepository>,
    moderation: Arc<ModerationState>,
    clock: Arc<dyn Clock>,
}

impl MessageStore {
    pub fn new(
        users: Arc<dyn UserRepository>,
        messages: Arc<dyn MessageRepository>,
        moderation: Arc<ModerationState>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            messages,
            moderation,
            clock,
        }
    }

    pub async fn append(
        &self,
        author_id: UserId,
        text: &str,
    ) -> Result<MessageView, ApplicationError> {
        let text = MessageText::new(text)?;
        let author = self
            .users
            .find_by_id(author_id)
            .await?
            .ok_or(DomainError::UserNotFound)?;

        if self.moderation.is_muted(author.id).await? {
            return Err(DomainError::UserMuted.into());
        }

        let message = self
            .messages
            .create(NewMessage::new(author.id, text, self.clock.now()))
            .await?;
        debug!(message_id = %message.id, user_id = %author.id, "message appended");
        Ok(message.render(&author))
    }

    /// 作者本人或版主以上角色可以删除消息。
    pub async fn delete(
        &self,
        actor_id: UserId,
        message_id: MessageId,
    ) -> Result<MessageId, ApplicationError> {
        let message = self
            .messages
            .find_by_id(message_id)
            .await?
            .ok_or(DomainError::MessageNotFound)?;
        let actor = self
            .users
            .find_by_id(actor_id)
            .await?
            .ok_or(ApplicationError::Authentication)?;

        if !message.is_authored_by(actor.id) {
            actor.role.require(Role::Moderator)?;
        }

        if !self.messages.delete(message.id).await? {
            return Err(DomainError::MessageNotFound.into());
        }
        debug!(message_id = %message.id, user_id = %actor.id, "message deleted");
        Ok(message.id)
    }

    /// 全部消息，按创建时间升序渲染。
    pub async fn list(&self) -> Result<Vec<MessageView>, ApplicationError> {
        let authors: HashMap<UserId, _> = self
            .users
            .list()
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        Ok(self
            .messages
            .list()
            .await?
            .into_iter()
            .filter_map(|message| {
                authors
                    .get(&message.author_id)
                    .map(|author| message.render(author))
            })
            .collect())
    }

    /// 删除某用户的全部消息，返回被删除的 id。
    pub async fn purge_author(&self, author_id: UserId) -> Result<Vec<MessageId>, ApplicationError> {
        let removed = self.messages.delete_by_author(author_id).await?;
        debug!(user_id = %author_id, count = removed.len(), "purged messages of user");
        Ok(removed)
    }
}
