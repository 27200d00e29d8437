use std::sync::Arc;

use application::{MessageRepository, UserRepository};
use async_trait::async_trait;
use domain::{
    Message, MessageId, MessageText, MuteStatus, NewMessage, NewUser, PasswordHash,
    RepositoryError, Role, Timestamp, User, UserId, Username,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use time::OffsetDateTime;

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict;
        }
    }
    let message = err.to_string();
    RepositoryError::storage_with_source(message, err)
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

const USER_COLUMNS: &str = "id, username, password_hash, role, is_muted, mute_until, last_seen";

#[derive(Debug, FromRow)]
struct UserRecord {
    id: i64,
    username: String,
    password_hash: String,
    role: String,
    is_muted: bool,
    mute_until: Option<OffsetDateTime>,
    last_seen: OffsetDateTime,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let username = Username::parse(value.username).map_err(|err| invalid_data(err.to_string()))?;
        let password =
            PasswordHash::new(value.password_hash).map_err(|err| invalid_data(err.to_string()))?;
        let role = value
            .role
            .parse::<Role>()
            .map_err(|err| invalid_data(err.to_string()))?;

        Ok(User {
            id: UserId(value.id),
            username,
            password,
            role,
            is_muted: value.is_muted,
            mute_until: value.mute_until,
            last_seen: value.last_seen,
        })
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: i64,
    author_id: i64,
    text: String,
    created_at: OffsetDateTime,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let text = MessageText::new(&value.text).map_err(|err| invalid_data(err.to_string()))?;
        Ok(Message {
            id: MessageId(value.id),
            author_id: UserId(value.author_id),
            text,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ReconcileRecord {
    is_muted: bool,
    mute_until: Option<OffsetDateTime>,
    expired: bool,
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn expect_one(rows_affected: u64) -> Result<(), RepositoryError> {
        if rows_affected == 0 {
            Err(RepositoryError::NotFound)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            INSERT INTO users (username, password_hash, role, is_muted, mute_until, last_seen, created_at)
            VALUES ($1, $2, $3, FALSE, NULL, $4, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.username.as_str())
        .bind(user.password.as_str())
        .bind(user.role.as_str())
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        User::try_from(record)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(i64::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(User::try_from).collect()
    }

    async fn list_seen_since(&self, since: Timestamp) -> Result<Vec<User>, RepositoryError> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE last_seen >= $1 ORDER BY username"
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(User::try_from).collect()
    }

    async fn touch(&self, id: UserId, at: Timestamp) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET last_seen = $2 WHERE id = $1")
            .bind(i64::from(id))
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Self::expect_one(result.rows_affected())
    }

    async fn set_mute(&self, id: UserId, until: Option<Timestamp>) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE users SET is_muted = TRUE, mute_until = $2 WHERE id = $1")
                .bind(i64::from(id))
                .bind(until)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
        Self::expect_one(result.rows_affected())
    }

    async fn clear_mute(&self, id: UserId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE users SET is_muted = FALSE, mute_until = NULL WHERE id = $1")
                .bind(i64::from(id))
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
        Self::expect_one(result.rows_affected())
    }

    async fn reconcile_mute(
        &self,
        id: UserId,
        now: Timestamp,
    ) -> Result<MuteStatus, RepositoryError> {
        // 行锁保证并发校正中只有一次能清除过期禁言
        let record = sqlx::query_as::<_, ReconcileRecord>(
            r#"
            WITH snapshot AS (
                SELECT id, is_muted, mute_until FROM users WHERE id = $1 FOR UPDATE
            ), cleared AS (
                UPDATE users u
                SET is_muted = FALSE, mute_until = NULL
                FROM snapshot c
                WHERE u.id = c.id
                  AND c.is_muted
                  AND c.mute_until IS NOT NULL
                  AND c.mute_until < $2
                RETURNING u.id
            )
            SELECT c.is_muted, c.mute_until, EXISTS (SELECT 1 FROM cleared) AS expired
            FROM snapshot c
            "#,
        )
        .bind(i64::from(id))
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?
        .ok_or(RepositoryError::NotFound)?;

        Ok(if record.expired {
            MuteStatus::Expired
        } else if record.is_muted {
            MuteStatus::Active {
                until: record.mute_until,
            }
        } else {
            MuteStatus::NotMuted
        })
    }

    async fn set_role(&self, id: UserId, role: Role) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET role = $2 WHERE id = $1")
            .bind(i64::from(id))
            .bind(role.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Self::expect_one(result.rows_affected())
    }

    async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(i64::from(id))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Self::expect_one(result.rows_affected())
    }
}

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO messages (author_id, text, created_at)
            VALUES ($1, $2, $3)
            RETURNING id, author_id, text, created_at
            "#,
        )
        .bind(i64::from(message.author_id))
        .bind(message.text.as_str())
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Message::try_from(record)
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(
            "SELECT id, author_id, text, created_at FROM messages WHERE id = $1",
        )
        .bind(i64::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Message::try_from).transpose()
    }

    async fn delete(&self, id: MessageId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(i64::from(id))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<Message>, RepositoryError> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT id, author_id, text, created_at FROM messages ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Message::try_from).collect()
    }

    async fn delete_by_author(&self, author: UserId) -> Result<Vec<MessageId>, RepositoryError> {
        let mut ids: Vec<i64> =
            sqlx::query_scalar("DELETE FROM messages WHERE author_id = $1 RETURNING id")
                .bind(i64::from(author))
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
        ids.sort_unstable();
        Ok(ids.into_iter().map(MessageId).collect())
    }
}

#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
    pub user_repository: Arc<PgUserRepository>,
    pub message_repository: Arc<PgMessageRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_repository: Arc::new(PgUserRepository::new(pool.clone())),
            message_repository: Arc::new(PgMessageRepository::new(pool.clone())),
            pool,
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
