//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务：在线状态、禁言、消息存储、
//! 房间广播总线以及每个连接的会话状态机，并对外部适配器
//! （例如存储、密码哈希、时钟）进行抽象。

pub mod clock;
pub mod context;
pub mod error;
pub mod events;
pub mod memory;
pub mod message_store;
pub mod moderation;
pub mod password;
pub mod presence;
pub mod repository;
pub mod room;
pub mod services;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{ChatContext, ChatDependencies, ChatSettings};
pub use error::{ApplicationError, ErrorKind};
pub use events::{ClientEvent, ServerEvent};
pub use message_store::MessageStore;
pub use moderation::{ModerationState, MuteOutcome, UnmuteOutcome};
pub use password::{PasswordHasher, PasswordHasherError};
pub use presence::PresenceTracker;
pub use repository::{MessageRepository, UserRepository};
pub use room::{ChatRoom, RoomEnvelope, RoomMember, RoomSubscription};
pub use services::{CreateUserRequest, UserService, UserServiceDependencies};
pub use session::{ChatSession, Identity, SessionState};
