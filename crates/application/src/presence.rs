use std::sync::Arc;

use domain::{User, UserId};
use time::Duration;
use tracing::warn;

use crate::{clock::Clock, error::ApplicationError, repository::UserRepository};

/// 记录用户最后活跃时间，并按滑动窗口计算在线集合。
pub struct PresenceTracker {
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl PresenceTracker {
    pub fn new(users: Arc<dyn UserRepository>, clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            users,
            clock,
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// 记录当前时间为最后活跃时间。没有失败模式：存储错误只记录日志。
    pub async fn touch(&self, user_id: UserId) {
        let now = self.clock.now();
        if let Err(err) = self.users.touch(user_id, now).await {
            warn!(user_id = %user_id, error = %err, "failed to record presence");
        }
    }

    pub async fn is_online(
        &self,
        user_id: UserId,
        window: Duration,
    ) -> Result<bool, ApplicationError> {
        let now = self.clock.now();
        Ok(self
            .users
            .find_by_id(user_id)
            .await?
            .is_some_and(|user| user.is_online(now, window)))
    }

    pub async fn online_users(&self) -> Result<Vec<User>, ApplicationError> {
        let since = self.clock.now() - self.window;
        Ok(self.users.list_seen_since(since).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::memory::InMemoryUserRepository;
    use crate::repository::MockUserRepository;
    use domain::{NewUser, PasswordHash, RepositoryError, Role, Username};
    use time::macros::datetime;

    async fn setup() -> (PresenceTracker, Arc<ManualClock>, UserId) {
        let clock = Arc::new(ManualClock::new(datetime!(2024-05-01 12:00 UTC)));
        let users = Arc::new(InMemoryUserRepository::new());
        let user = users
            .create(NewUser::new(
                Username::parse("alice").unwrap(),
                PasswordHash::new("hash").unwrap(),
                Role::User,
                datetime!(2024-04-01 0:00 UTC),
            ))
            .await
            .unwrap();
        let tracker = PresenceTracker::new(users, clock.clone(), Duration::minutes(5));
        (tracker, clock, user.id)
    }

    #[tokio::test]
    async fn touched_user_is_online_within_window() {
        let (tracker, clock, id) = setup().await;
        assert!(tracker.online_users().await.unwrap().is_empty());

        tracker.touch(id).await;
        clock.advance(Duration::minutes(5));
        assert!(tracker.is_online(id, tracker.window()).await.unwrap());
        assert_eq!(tracker.online_users().await.unwrap().len(), 1);

        clock.advance(Duration::minutes(1));
        assert!(!tracker.is_online(id, tracker.window()).await.unwrap());
        assert!(tracker.online_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn touch_is_idempotent() {
        let (tracker, _clock, id) = setup().await;
        tracker.touch(id).await;
        tracker.touch(id).await;
        assert_eq!(tracker.online_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn touch_swallows_storage_errors() {
        let mut users = MockUserRepository::new();
        users
            .expect_touch()
            .times(1)
            .returning(|_, _| Err(RepositoryError::storage("database offline")));
        let tracker = PresenceTracker::new(
            Arc::new(users),
            Arc::new(ManualClock::new(datetime!(2024-05-01 12:00 UTC))),
            Duration::minutes(5),
        );
        tracker.touch(UserId(1)).await;
    }
}
