//! 基于内存的仓储实现，用于测试与未配置数据库时的开发运行。
//!
//! 每个操作在一把写锁内完成，等价于数据库中的单条语句。

use std::collections::BTreeMap;

use async_trait::async_trait;
use domain::{
    Message, MessageId, MuteStatus, NewMessage, NewUser, RepositoryError, Role, Timestamp, User,
    UserId, Username,
};
use tokio::sync::RwLock;

use crate::repository::{MessageRepository, UserRepository};

#[derive(Default)]
struct UserTable {
    next_id: i64,
    rows: BTreeMap<UserId, User>,
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    table: RwLock<UserTable>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserTable {
    fn row_mut(&mut self, id: UserId) -> Result<&mut User, RepositoryError> {
        self.rows.get_mut(&id).ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut table = self.table.write().await;
        if table.rows.values().any(|row| row.username == user.username) {
            return Err(RepositoryError::Conflict);
        }
        table.next_id += 1;
        let stored = user.into_user(UserId(table.next_id));
        table.rows.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .find(|row| &row.username == username)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(self.table.read().await.rows.values().cloned().collect())
    }

    async fn list_seen_since(&self, since: Timestamp) -> Result<Vec<User>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|row| row.last_seen >= since)
            .cloned()
            .collect())
    }

    async fn touch(&self, id: UserId, at: Timestamp) -> Result<(), RepositoryError> {
        self.table.write().await.row_mut(id)?.touch(at);
        Ok(())
    }

    async fn set_mute(&self, id: UserId, until: Option<Timestamp>) -> Result<(), RepositoryError> {
        self.table.write().await.row_mut(id)?.mute(until);
        Ok(())
    }

    async fn clear_mute(&self, id: UserId) -> Result<(), RepositoryError> {
        self.table.write().await.row_mut(id)?.unmute();
        Ok(())
    }

    async fn reconcile_mute(
        &self,
        id: UserId,
        now: Timestamp,
    ) -> Result<MuteStatus, RepositoryError> {
        Ok(self.table.write().await.row_mut(id)?.reconcile_mute(now))
    }

    async fn set_role(&self, id: UserId, role: Role) -> Result<(), RepositoryError> {
        self.table.write().await.row_mut(id)?.role = role;
        Ok(())
    }

    async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        self.table
            .write()
            .await
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

#[derive(Default)]
struct MessageTable {
    next_id: i64,
    rows: BTreeMap<MessageId, Message>,
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    table: RwLock<MessageTable>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let mut table = self.table.write().await;
        table.next_id += 1;
        let stored = message.into_message(MessageId(table.next_id));
        table.rows.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn delete(&self, id: MessageId) -> Result<bool, RepositoryError> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }

    async fn list(&self) -> Result<Vec<Message>, RepositoryError> {
        let mut messages: Vec<Message> = self.table.read().await.rows.values().cloned().collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(messages)
    }

    async fn delete_by_author(&self, author: UserId) -> Result<Vec<MessageId>, RepositoryError> {
        let mut table = self.table.write().await;
        let ids: Vec<MessageId> = table
            .rows
            .values()
            .filter(|row| row.is_authored_by(author))
            .map(|row| row.id)
            .collect();
        for id in &ids {
            table.rows.remove(id);
        }
        Ok(ids)
    }
}
