#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use application::{
    ChatContext, ChatDependencies, ChatSettings, Clock, SystemClock, UserService,
    UserServiceDependencies,
};
use futures_util::{SinkExt, StreamExt};
use infrastructure::Infrastructure;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::oneshot,
    time::{sleep, timeout},
};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};
use web_api::{router, AppState, JwtConfig, JwtService};

pub const CREATOR: &str = "Resolving";
pub const CREATOR_PASSWORD: &str = "creator-password";
pub const USER_PASSWORD: &str = "user-password";

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 内存存储 + 低成本 bcrypt 装配的完整应用状态
pub async fn build_state() -> AppState {
    let infrastructure = Infrastructure::in_memory(Some(4));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let chat = Arc::new(ChatContext::new(ChatDependencies {
        user_repository: infrastructure.user_repository.clone(),
        message_repository: infrastructure.message_repository.clone(),
        clock: clock.clone(),
        settings: ChatSettings::default(),
    }));

    let user_service = UserService::new(UserServiceDependencies {
        user_repository: infrastructure.user_repository.clone(),
        password_hasher: infrastructure.password_hasher.clone(),
        clock,
        chat: chat.clone(),
    });
    user_service
        .ensure_creator(CREATOR, CREATOR_PASSWORD)
        .await
        .expect("bootstrap creator");

    let jwt_service = Arc::new(JwtService::new(JwtConfig {
        secret: "integration-test-secret-key-with-32-chars".to_string(),
        expiration_hours: 24,
    }));

    AppState::new(chat, Arc::new(user_service), jwt_service)
}

pub struct TestServer {
    pub base_http: String,
    pub base_ws: String,
    pub client: Client,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

pub async fn spawn_server() -> TestServer {
    let app = router(build_state().await);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    // allow server to start
    sleep(Duration::from_millis(100)).await;

    TestServer {
        base_http: format!("http://{addr}"),
        base_ws: format!("ws://{addr}"),
        client: Client::new(),
        shutdown: Some(shutdown_tx),
    }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_http, path)
    }

    /// 登录并返回 (token, user)
    pub async fn login(&self, username: &str, password: &str) -> (String, Value) {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("login request");
        assert_eq!(response.status(), StatusCode::OK, "login {username}");
        let body: Value = response.json().await.expect("login json");
        let token = body["token"].as_str().expect("token").to_string();
        (token, body["user"].clone())
    }

    pub async fn creator_token(&self) -> String {
        self.login(CREATOR, CREATOR_PASSWORD).await.0
    }

    /// 由创建者开户，返回新用户 id
    pub async fn create_user(&self, creator_token: &str, username: &str, role: &str) -> i64 {
        let response = self
            .client
            .post(self.url("/admin/users"))
            .bearer_auth(creator_token)
            .json(&json!({ "username": username, "password": USER_PASSWORD, "role": role }))
            .send()
            .await
            .expect("create user request");
        assert_eq!(response.status(), StatusCode::CREATED, "create {username}");
        let body: Value = response.json().await.expect("user json");
        body["id"].as_i64().expect("user id")
    }

    /// 开户并登录，返回 (id, token)
    pub async fn user_with_token(&self, creator_token: &str, username: &str, role: &str) -> (i64, String) {
        let id = self.create_user(creator_token, username, role).await;
        let (token, _) = self.login(username, USER_PASSWORD).await;
        (id, token)
    }

    pub async fn connect_ws(&self, token: Option<&str>) -> WsClient {
        let url = match token {
            Some(token) => format!("{}/api/v1/ws?token={token}", self.base_ws),
            None => format!("{}/api/v1/ws", self.base_ws),
        };
        let (socket, _) = connect_async(url).await.expect("websocket connect");
        socket
    }

    /// 连接并等待自己的 `user_connected`，确认已加入房间
    pub async fn join(&self, token: &str, username: &str) -> WsClient {
        let mut socket = self.connect_ws(Some(token)).await;
        let event = next_event_named(&mut socket, "user_connected").await;
        assert_eq!(event["data"]["username"], username);
        socket
    }
}

pub async fn send_event(socket: &mut WsClient, frame: Value) {
    socket
        .send(TungsteniteMessage::Text(frame.to_string().into()))
        .await
        .expect("send frame");
}

/// 读取下一条文本帧，2 秒未到达则失败
pub async fn next_event(socket: &mut WsClient) -> Value {
    loop {
        let message = timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("timed out waiting for event")
            .expect("socket closed")
            .expect("socket error");
        if let TungsteniteMessage::Text(text) = message {
            return serde_json::from_str(text.as_str()).expect("event json");
        }
    }
}

/// 跳过其他事件直到指定名称
pub async fn next_event_named(socket: &mut WsClient, name: &str) -> Value {
    loop {
        let event = next_event(socket).await;
        if event["event"] == name {
            return event;
        }
    }
}

/// 断言一段时间内没有任何文本帧
pub async fn assert_silent(socket: &mut WsClient, millis: u64) {
    let deadline = Duration::from_millis(millis);
    match timeout(deadline, socket.next()).await {
        Err(_) => {}
        Ok(Some(Ok(TungsteniteMessage::Text(text)))) => {
            panic!("unexpected event: {}", text.as_str())
        }
        Ok(_) => {}
    }
}
