//! 连接上收发的事件帧。
//!
//! 每一帧都是 `{"event": "<name>", "data": {...}}` 形式的 JSON 文本。

use domain::{MessageId, MessageView, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// 客户端发往服务端的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    SendMessage { message: String },
    DeleteMessage { message_id: MessageId },
    Heartbeat,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown event `{0}`")]
    UnknownEvent(String),
}

#[derive(Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct SendMessageData {
    message: String,
}

#[derive(Deserialize)]
struct DeleteMessageData {
    message_id: MessageId,
}

impl ClientEvent {
    /// 解析一帧文本；`heartbeat` 的 `data` 可以缺省。
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let frame: RawFrame = serde_json::from_str(text)?;
        match frame.event.as_str() {
            "send_message" => {
                let data: SendMessageData = serde_json::from_value(frame.data)?;
                Ok(ClientEvent::SendMessage {
                    message: data.message,
                })
            }
            "delete_message" => {
                let data: DeleteMessageData = serde_json::from_value(frame.data)?;
                Ok(ClientEvent::DeleteMessage {
                    message_id: data.message_id,
                })
            }
            "heartbeat" => Ok(ClientEvent::Heartbeat),
            other => Err(FrameError::UnknownEvent(other.to_owned())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::SendMessage { .. } => "send_message",
            ClientEvent::DeleteMessage { .. } => "delete_message",
            ClientEvent::Heartbeat => "heartbeat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresencePayload {
    pub username: String,
    pub user_id: UserId,
}

/// 服务端推送的事件，除 `message_error` 外都面向整个房间
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    UserConnected(PresencePayload),
    UserDisconnected(PresencePayload),
    NewMessage(MessageView),
    MessageDeleted {
        message_id: MessageId,
    },
    /// 仅发送给触发错误的连接
    MessageError {
        message: String,
    },
    UserMuted {
        username: String,
        moderator: String,
        duration: String,
    },
    UserUnmuted {
        username: String,
        moderator: String,
    },
}

impl ServerEvent {
    pub fn message_error(message: impl Into<String>) -> Self {
        ServerEvent::MessageError {
            message: message.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::UserConnected(_) => "user_connected",
            ServerEvent::UserDisconnected(_) => "user_disconnected",
            ServerEvent::NewMessage(_) => "new_message",
            ServerEvent::MessageDeleted { .. } => "message_deleted",
            ServerEvent::MessageError { .. } => "message_error",
            ServerEvent::UserMuted { .. } => "user_muted",
            ServerEvent::UserUnmuted { .. } => "user_unmuted",
        }
    }

    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_inbound_frames() {
        assert_eq!(
            ClientEvent::parse(r#"{"event":"send_message","data":{"message":"hi"}}"#).unwrap(),
            ClientEvent::SendMessage {
                message: "hi".into()
            }
        );
        assert_eq!(
            ClientEvent::parse(r#"{"event":"delete_message","data":{"message_id":5}}"#).unwrap(),
            ClientEvent::DeleteMessage {
                message_id: MessageId(5)
            }
        );
        assert_eq!(
            ClientEvent::parse(r#"{"event":"heartbeat"}"#).unwrap(),
            ClientEvent::Heartbeat
        );
    }

    #[test]
    fn rejects_unknown_or_malformed_frames() {
        assert!(matches!(
            ClientEvent::parse(r#"{"event":"typing","data":{}}"#),
            Err(FrameError::UnknownEvent(_))
        ));
        assert!(matches!(
            ClientEvent::parse(r#"{"event":"delete_message","data":{"message_id":"x"}}"#),
            Err(FrameError::Malformed(_))
        ));
        assert!(ClientEvent::parse("not json").is_err());
    }

    #[test]
    fn outbound_frames_use_event_and_data() {
        let frame = ServerEvent::MessageDeleted {
            message_id: MessageId(9),
        }
        .to_frame()
        .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            value,
            json!({"event": "message_deleted", "data": {"message_id": 9}})
        );

        let connected = serde_json::to_value(ServerEvent::UserConnected(PresencePayload {
            username: "alice".into(),
            user_id: UserId(1),
        }))
        .unwrap();
        assert_eq!(
            connected,
            json!({"event": "user_connected", "data": {"username": "alice", "user_id": 1}})
        );
    }
}
