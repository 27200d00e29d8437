use serde::{Deserialize, Serialize};

use crate::role::Role;
use crate::user::User;
use crate::value_objects::{MessageId, MessageText, Timestamp, UserId};

/// 已持久化的聊天消息，创建后除删除外不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub author_id: UserId,
    pub text: MessageText,
    pub created_at: Timestamp,
}

impl Message {
    pub fn is_authored_by(&self, user_id: UserId) -> bool {
        self.author_id == user_id
    }

    /// 渲染为对外展示的视图，作者信息由调用方提供。
    pub fn render(&self, author: &User) -> MessageView {
        MessageView {
            id: self.id,
            username: author.username.as_str().to_owned(),
            user_id: author.id,
            role: author.role,
            text: self.text.as_str().to_owned(),
            timestamp: format_clock_time(self.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub author_id: UserId,
    pub text: MessageText,
    pub created_at: Timestamp,
}

impl NewMessage {
    pub fn new(author_id: UserId, text: MessageText, now: Timestamp) -> Self {
        Self {
            author_id,
            text,
            created_at: now,
        }
    }

    pub fn into_message(self, id: MessageId) -> Message {
        Message {
            id,
            author_id: self.author_id,
            text: self.text,
            created_at: self.created_at,
        }
    }
}

/// `new_message` 事件与消息列表使用的渲染结果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: MessageId,
    pub username: String,
    pub user_id: UserId,
    pub role: Role,
    pub text: String,
    /// UTC 时间的 `HH:MM`
    pub timestamp: String,
}

fn format_clock_time(at: Timestamp) -> String {
    let at = at.to_offset(time::UtcOffset::UTC);
    format!("{:02}:{:02}", at.hour(), at.minute())
}
