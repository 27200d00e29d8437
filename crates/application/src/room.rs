//! 单一聊天室的广播总线。
//!
//! 所有事件在同一把锁内分配序号并写入同一个 broadcast 通道，
//! 因而所有成员看到的是同一个全序。投递不等待确认，落后的接收端
//! 会跳过事件而不会阻塞发布者。

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use domain::{ConnectionId, UserId};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::events::{PresencePayload, ServerEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomEnvelope {
    pub sequence: u64,
    pub event: ServerEvent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMember {
    pub user_id: UserId,
    pub username: String,
}

impl RoomMember {
    fn presence(&self) -> PresencePayload {
        PresencePayload {
            username: self.username.clone(),
            user_id: self.user_id,
        }
    }
}

#[derive(Default)]
struct RoomState {
    members: HashMap<ConnectionId, RoomMember>,
    next_sequence: u64,
}

pub struct ChatRoom {
    sender: broadcast::Sender<RoomEnvelope>,
    state: Mutex<RoomState>,
    // 串行化“存储变更 + 事件发布”，使房间顺序等于存储接受顺序
    commit_gate: tokio::sync::Mutex<()>,
}

impl ChatRoom {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            state: Mutex::new(RoomState::default()),
            commit_gate: tokio::sync::Mutex::new(()),
        }
    }

    fn state(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn publish_locked(&self, state: &mut RoomState, event: ServerEvent) -> u64 {
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        let name = event.name();
        if self.sender.send(RoomEnvelope { sequence, event }).is_err() {
            debug!(sequence, event = name, "room has no subscribers");
        }
        sequence
    }

    /// 发布一条房间事件，返回其序号。
    pub fn publish(&self, event: ServerEvent) -> u64 {
        let mut state = self.state();
        self.publish_locked(&mut state, event)
    }

    /// 加入房间。先订阅再广播 `user_connected`，加入者自己也能收到。
    /// 重复加入不产生事件，返回 `None`。
    pub fn join(&self, connection: ConnectionId, member: RoomMember) -> Option<RoomSubscription> {
        let mut state = self.state();
        if state.members.contains_key(&connection) {
            return None;
        }
        let receiver = self.sender.subscribe();
        let event = ServerEvent::UserConnected(member.presence());
        debug!(connection_id = %connection, user_id = %member.user_id, "joined room");
        state.members.insert(connection, member);
        self.publish_locked(&mut state, event);
        Some(RoomSubscription { receiver })
    }

    /// 离开房间并广播 `user_disconnected`，重复调用为空操作。
    pub fn leave(&self, connection: ConnectionId) -> Option<RoomMember> {
        let mut state = self.state();
        let member = state.members.remove(&connection)?;
        debug!(connection_id = %connection, user_id = %member.user_id, "left room");
        self.publish_locked(&mut state, ServerEvent::UserDisconnected(member.presence()));
        Some(member)
    }

    /// 在提交闸门内执行存储变更，并在释放闸门前按顺序发布其产生的事件。
    /// 变更失败时不发布任何事件。
    pub async fn commit<T, E, F>(&self, operation: F) -> Result<T, E>
    where
        F: Future<Output = Result<(T, Vec<ServerEvent>), E>>,
    {
        let _gate = self.commit_gate.lock().await;
        let (value, events) = operation.await?;
        for event in events {
            self.publish(event);
        }
        Ok(value)
    }

    pub fn members(&self) -> Vec<RoomMember> {
        self.state().members.values().cloned().collect()
    }

    pub fn member_count(&self) -> usize {
        self.state().members.len()
    }

    pub fn is_member(&self, connection: ConnectionId) -> bool {
        self.state().members.contains_key(&connection)
    }
}

/// 单个连接对房间事件流的订阅
pub struct RoomSubscription {
    receiver: broadcast::Receiver<RoomEnvelope>,
}

impl RoomSubscription {
    /// 等待下一条事件；落后时跳过丢失的事件，房间关闭时返回 `None`。
    pub async fn recv(&mut self) -> Option<RoomEnvelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "room subscriber lagged behind, skipping events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
