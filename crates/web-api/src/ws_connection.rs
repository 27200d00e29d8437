use application::{ChatSession, ClientEvent, Identity, RoomEnvelope, RoomSubscription};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::state::AppState;

/// WebSocket 连接管理器
///
/// 把一个 socket 桥接到一个 `ChatSession`：
/// - 入站文本帧解析为 `ClientEvent` 交给会话处理，私有回复只回给本连接
/// - 房间广播按序号顺序转发
/// - 连接以任何方式结束时，会话只离开房间一次
pub struct WebSocketConnection {
    socket: WebSocket,
    state: AppState,
    identity: Option<Identity>,
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket, state: AppState, identity: Option<Identity>) -> Self {
        Self {
            socket,
            state,
            identity,
        }
    }

    /// 运行连接主循环，直到任一方向结束
    pub async fn run(self) {
        let (mut session, subscription) =
            ChatSession::open(self.state.chat.clone(), self.identity).await;
        let connection_id = session.connection_id();
        tracing::info!(
            connection_id = %connection_id,
            user_id = ?session.identity().map(|identity| identity.user_id),
            "WebSocket 连接已建立"
        );

        let (sender, mut incoming) = self.socket.split();

        // 创建 mpsc channel 来解耦对 sender 的访问
        let (cmd_tx, cmd_rx) = mpsc::channel::<WsCommand>(32);
        let mut send_task = tokio::spawn(send_loop(sender, cmd_rx, subscription));

        loop {
            tokio::select! {
                _ = &mut send_task => {
                    tracing::debug!(connection_id = %connection_id, "send task finished");
                    break;
                }
                frame = incoming.next() => {
                    let message = match frame {
                        Some(Ok(message)) => message,
                        Some(Err(err)) => {
                            tracing::debug!(error = %err, "WebSocket 接收错误");
                            break;
                        }
                        None => break,
                    };
                    if !handle_incoming(&mut session, &cmd_tx, message).await {
                        break;
                    }
                }
            }
        }

        session.close();
        drop(cmd_tx);
        send_task.abort();
        tracing::info!(connection_id = %connection_id, "WebSocket 连接已关闭");
    }
}

/// 发送任务：统一处理所有对 WebSocket sender 的写操作
async fn send_loop(
    mut sender: futures_util::stream::SplitSink<WebSocket, WsMessage>,
    mut cmd_rx: mpsc::Receiver<WsCommand>,
    mut subscription: Option<RoomSubscription>,
) {
    loop {
        let outgoing = tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(WsCommand::SendText(text)) => WsMessage::Text(text.into()),
                Some(WsCommand::SendPong(data)) => WsMessage::Pong(data.into()),
                None => break,
            },
            envelope = next_room_event(&mut subscription) => match envelope {
                Some(envelope) => match envelope.event.to_frame() {
                    Ok(frame) => WsMessage::Text(frame.into()),
                    Err(err) => {
                        tracing::error!(error = %err, sequence = envelope.sequence, "failed to encode room event");
                        continue;
                    }
                },
                None => break,
            },
        };

        if sender.send(outgoing).await.is_err() {
            tracing::debug!("Failed to send WebSocket frame");
            break;
        }
    }
}

/// 未认证的连接没有订阅，永远不会收到房间事件
async fn next_room_event(subscription: &mut Option<RoomSubscription>) -> Option<RoomEnvelope> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

/// 处理单个入站帧，返回 `false` 表示连接应结束
async fn handle_incoming(
    session: &mut ChatSession,
    cmd_tx: &mpsc::Sender<WsCommand>,
    message: WsMessage,
) -> bool {
    match message {
        WsMessage::Text(text) => {
            let event = match ClientEvent::parse(text.as_str()) {
                Ok(event) => event,
                Err(err) => {
                    tracing::debug!(error = %err, "ignoring malformed frame");
                    return true;
                }
            };

            let Some(reply) = session.handle(event).await else {
                return true;
            };
            match reply.to_frame() {
                Ok(frame) => cmd_tx.send(WsCommand::SendText(frame)).await.is_ok(),
                Err(err) => {
                    tracing::error!(error = %err, "failed to encode reply");
                    true
                }
            }
        }
        WsMessage::Ping(data) => cmd_tx
            .send(WsCommand::SendPong(data.to_vec()))
            .await
            .is_ok(),
        WsMessage::Close(_) => false,
        WsMessage::Pong(_) | WsMessage::Binary(_) => true,
    }
}

/// 写命令
#[derive(Debug)]
enum WsCommand {
    SendText(String),
    SendPong(Vec<u8>),
}
