use async_trait::async_trait;
use domain::{
    Message, MessageId, MuteStatus, NewMessage, NewUser, RepositoryError, Role, Timestamp, User,
    UserId, Username,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 用户名唯一，重复时返回 `RepositoryError::Conflict`
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_username(&self, username: &Username)
        -> Result<Option<User>, RepositoryError>;
    async fn list(&self) -> Result<Vec<User>, RepositoryError>;

    // 在线状态：last_seen ≥ since 的用户
    async fn list_seen_since(&self, since: Timestamp) -> Result<Vec<User>, RepositoryError>;
    async fn touch(&self, id: UserId, at: Timestamp) -> Result<(), RepositoryError>;

    async fn set_mute(&self, id: UserId, until: Option<Timestamp>)
        -> Result<(), RepositoryError>;
    async fn clear_mute(&self, id: UserId) -> Result<(), RepositoryError>;

    /// 原子的“观察并校正”：过期的禁言在同一步中被清除，并只报告一次 `Expired`。
    /// 用户不存在时返回 `RepositoryError::NotFound`。
    async fn reconcile_mute(&self, id: UserId, now: Timestamp)
        -> Result<MuteStatus, RepositoryError>;

    async fn set_role(&self, id: UserId, role: Role) -> Result<(), RepositoryError>;
    async fn delete(&self, id: UserId) -> Result<(), RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, message: NewMessage) -> Result<Message, RepositoryError>;
    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError>;

    /// 返回是否真的删除了一条记录
    async fn delete(&self, id: MessageId) -> Result<bool, RepositoryError>;

    // 按创建时间升序，时间相同按 id 升序
    async fn list(&self) -> Result<Vec<Message>, RepositoryError>;

    /// 删除某作者的全部消息，返回被删除的 id（升序）
    async fn delete_by_author(&self, author: UserId) -> Result<Vec<MessageId>, RepositoryError>;
}
