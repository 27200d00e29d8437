//! 单个连接的会话状态机：`Unauthenticated → Joined → Closed`。

use std::sync::Arc;

use domain::{ConnectionId, Role, UserId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    context::ChatContext,
    events::{ClientEvent, ServerEvent},
    room::{RoomMember, RoomSubscription},
};

/// 连接建立时由认证方提供的显式身份
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// 未认证：不加入房间，后续事件全部静默丢弃
    Unauthenticated,
    Joined(Identity),
    /// 终态，会话不可复用
    Closed,
}

pub struct ChatSession {
    context: Arc<ChatContext>,
    connection_id: ConnectionId,
    state: SessionState,
}

impl ChatSession {
    /// 打开会话。已认证时加入房间并记录在线，返回房间订阅。
    pub async fn open(
        context: Arc<ChatContext>,
        identity: Option<Identity>,
    ) -> (Self, Option<RoomSubscription>) {
        let connection_id = ConnectionId::generate();
        let Some(identity) = identity else {
            debug!(connection_id = %connection_id, "unauthenticated connection, not joining");
            let session = Self {
                context,
                connection_id,
                state: SessionState::Unauthenticated,
            };
            return (session, None);
        };

        let subscription = context.room().join(
            connection_id,
            RoomMember {
                user_id: identity.user_id,
                username: identity.username.clone(),
            },
        );
        let user_id = identity.user_id;
        let session = Self {
            context,
            connection_id,
            state: SessionState::Joined(identity),
        };
        session.context.touch(user_id).await;
        info!(connection_id = %connection_id, user_id = %user_id, "session joined");
        (session, subscription)
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            SessionState::Joined(identity) => Some(identity),
            _ => None,
        }
    }

    /// 处理一个入站事件，返回只发给本连接的回复（目前只有 `message_error`）。
    /// 房间事件通过订阅送达，不在返回值中。
    pub async fn handle(&mut self, event: ClientEvent) -> Option<ServerEvent> {
        let Some(user_id) = self.identity().map(|identity| identity.user_id) else {
            debug!(
                connection_id = %self.connection_id,
                event = event.name(),
                "dropping event from session that has not joined"
            );
            return None;
        };

        match event {
            ClientEvent::SendMessage { message } => {
                match self.context.send_message(user_id, &message).await {
                    Ok(_) => None,
                    Err(err) => {
                        debug!(user_id = %user_id, error = %err, "send_message rejected");
                        Some(ServerEvent::message_error(err.client_message()))
                    }
                }
            }
            ClientEvent::DeleteMessage { message_id } => {
                match self.context.delete_message(user_id, message_id).await {
                    Ok(_) => None,
                    Err(err) => {
                        debug!(user_id = %user_id, error = %err, "delete_message rejected");
                        Some(ServerEvent::message_error(err.client_message()))
                    }
                }
            }
            ClientEvent::Heartbeat => {
                self.context.touch(user_id).await;
                None
            }
        }
    }

    /// 关闭会话并离开房间，多次调用只离开一次。
    pub fn close(&mut self) {
        if let SessionState::Joined(identity) =
            std::mem::replace(&mut self.state, SessionState::Closed)
        {
            self.context.room().leave(self.connection_id);
            info!(
                connection_id = %self.connection_id,
                user_id = %identity.user_id,
                "session closed"
            );
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.close();
    }
}
