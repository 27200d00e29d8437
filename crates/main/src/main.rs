//! 主应用程序入口
//!
//! 加载配置、装配存储与服务，启动 Axum Web API 服务。

use std::sync::Arc;

use anyhow::Context;
use application::{
    ChatContext, ChatDependencies, ChatSettings, Clock, SystemClock, UserService,
    UserServiceDependencies,
};
use config::AppConfig;
use infrastructure::{Infrastructure, InfrastructureConfig};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let infrastructure = Infrastructure::connect(InfrastructureConfig {
        database_url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        bcrypt_cost: config.server.bcrypt_cost,
    })
    .await
    .context("failed to initialise storage")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let chat = Arc::new(ChatContext::new(ChatDependencies {
        user_repository: infrastructure.user_repository.clone(),
        message_repository: infrastructure.message_repository.clone(),
        clock: clock.clone(),
        settings: ChatSettings {
            presence_window: time::Duration::minutes(config.chat.presence_window_minutes),
            broadcast_capacity: config.chat.broadcast_capacity,
        },
    }));

    let user_service = UserService::new(UserServiceDependencies {
        user_repository: infrastructure.user_repository.clone(),
        password_hasher: infrastructure.password_hasher.clone(),
        clock,
        chat: chat.clone(),
    });

    let creator = user_service
        .ensure_creator(
            &config.bootstrap.creator_username,
            &config.bootstrap.creator_password,
        )
        .await
        .context("failed to bootstrap creator account")?;
    tracing::info!(user_id = %creator.id, username = %creator.username, "creator account ready");

    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));
    let state = AppState::new(chat, Arc::new(user_service), jwt_service);

    // 启动 Web 服务器
    let app = router(state);
    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!("聊天室服务器启动在 http://{}", address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("服务器已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("收到关闭信号");
}
