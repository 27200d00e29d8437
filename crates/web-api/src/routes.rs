use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, warn};
use validator::Validate;

use application::{CreateUserRequest, Identity};
use domain::{MessageId, MessageView, Role, User, UserId};

use crate::{
    auth::{AuthUser, LoginResponse},
    error::ApiError,
    state::AppState,
    ws_connection::WebSocketConnection,
};

#[derive(Debug, Deserialize, Validate)]
struct LoginPayload {
    #[validate(length(min = 1))]
    username: String,
    #[validate(length(min = 1))]
    password: String,
}

#[derive(Debug, Deserialize, Validate)]
struct MutePayload {
    user_id: UserId,
    #[validate(length(min = 1))]
    duration: String,
    // 取值范围由 MuteDuration 在权限检查之后校验
    custom_minutes: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct UnmutePayload {
    user_id: UserId,
}

#[derive(Debug, Deserialize, Validate)]
struct CreateUserPayload {
    #[validate(length(min = 1, max = 80))]
    username: String,
    #[validate(length(min = 1))]
    password: String,
    role: Option<Role>,
}

#[derive(Debug, Deserialize)]
struct ChangeRolePayload {
    user_id: UserId,
    role: Role,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct ActionResponse {
    success: bool,
    message: String,
}

impl ActionResponse {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

#[derive(Debug, Serialize)]
struct DeleteUserResponse {
    success: bool,
    message: String,
    deleted_messages: Vec<MessageId>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login_user))
        .route("/messages", get(list_messages))
        .route("/users", get(list_users))
        .route("/users/online", get(online_users))
        .route("/moderation/mute", post(mute_user))
        .route("/moderation/unmute", post(unmute_user))
        .route("/admin/users", post(create_user))
        .route("/admin/users/role", post(change_role))
        .route("/admin/users/{user_id}", delete(delete_user))
        .route("/ws", get(websocket_upgrade))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn login_user(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<LoginResponse>, ApiError> {
    payload.validate()?;
    let user = state
        .user_service
        .authenticate(&payload.username, &payload.password)
        .await?;
    let token = state.jwt_service.generate_token(&user)?;
    Ok(Json(LoginResponse { user, token }))
}

async fn list_messages(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    Ok(Json(state.chat.list_messages().await?))
}

async fn list_users(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.user_service.list_users().await?))
}

async fn online_users(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.chat.online_users().await?))
}

async fn mute_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(payload): Json<MutePayload>,
) -> Result<Json<ActionResponse>, ApiError> {
    payload.validate()?;
    let outcome = state
        .chat
        .mute(
            actor.user_id,
            payload.user_id,
            &payload.duration,
            payload.custom_minutes,
        )
        .await?;
    Ok(ActionResponse::ok(format!(
        "User {} has been muted ({})",
        outcome.username, outcome.duration
    )))
}

async fn unmute_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(payload): Json<UnmutePayload>,
) -> Result<Json<ActionResponse>, ApiError> {
    let outcome = state.chat.unmute(actor.user_id, payload.user_id).await?;
    Ok(ActionResponse::ok(format!(
        "User {} has been unmuted",
        outcome.username
    )))
}

async fn create_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(payload): Json<CreateUserPayload>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    payload.validate()?;
    let user = state
        .user_service
        .create_user(
            actor.user_id,
            CreateUserRequest {
                username: payload.username,
                password: payload.password,
                role: payload.role,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn change_role(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(payload): Json<ChangeRolePayload>,
) -> Result<Json<ActionResponse>, ApiError> {
    let user = state
        .user_service
        .change_role(actor.user_id, payload.user_id, payload.role)
        .await?;
    Ok(ActionResponse::ok(format!(
        "User {} is now {}",
        user.username, user.role
    )))
}

async fn delete_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<DeleteUserResponse>, ApiError> {
    let deleted_messages = state
        .user_service
        .delete_user(actor.user_id, UserId(user_id))
        .await?;
    Ok(Json(DeleteUserResponse {
        success: true,
        message: format!("User {user_id} has been deleted"),
        deleted_messages,
    }))
}

async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = resolve_identity(&state, query.token.as_deref()).await;
    ws.on_upgrade(move |socket| WebSocketConnection::new(socket, state, identity).run())
}

/// 握手时的 token 是可选的；无效时仍接受连接，但会话保持未认证
async fn resolve_identity(state: &AppState, token: Option<&str>) -> Option<Identity> {
    let token = token?;
    let claims = match state.jwt_service.verify_token(token) {
        Ok(claims) => claims,
        Err(err) => {
            debug!(error = ?err, "websocket token rejected, continuing unauthenticated");
            return None;
        }
    };

    match state.user_service.identity(UserId(claims.sub)).await {
        Ok(identity) => identity,
        Err(err) => {
            warn!(error = %err, user_id = claims.sub, "failed to load websocket identity");
            None
        }
    }
}
