//! 聊天室核心领域模型
//!
//! 包含用户、角色、消息、禁言时长等核心实体与值对象，以及相关的业务规则。

pub mod errors;
pub mod message;
pub mod moderation;
pub mod role;
pub mod user;
pub mod value_objects;

// 重新导出常用类型
pub use errors::*;
pub use message::{Message, MessageView, NewMessage};
pub use moderation::{MuteDuration, MuteStatus};
pub use role::Role;
pub use user::{NewUser, User};
pub use value_objects::*;
