//! JWT 认证和授权模块
//!
//! 提供 JWT token 生成、验证，以及从请求头提取当前身份的 extractor。

use application::Identity;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use config::JwtConfig;
use domain::{User, UserId};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{error::ApiError, state::AppState};

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: i64, // 过期时间 (Unix timestamp)
}

/// JWT Token 服务
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_ref());
        let decoding_key = DecodingKey::from_secret(config.secret.as_ref());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// 生成 JWT token
    pub fn generate_token(&self, user: &User) -> Result<String, ApiError> {
        let exp = OffsetDateTime::now_utc() + Duration::hours(self.config.expiration_hours);
        let claims = Claims {
            sub: user.id.into(),
            username: user.username.as_str().to_owned(),
            exp: exp.unix_timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|err| {
            ApiError::internal_server_error(format!("Token generation failed: {err}"))
        })
    }

    /// 验证并解析 JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|token_data| token_data.claims)
            .map_err(|err| ApiError::unauthorized(format!("Invalid token: {err}")))
    }

    /// 从 headers 中提取和验证 token
    pub fn extract_user_from_headers(&self, headers: &HeaderMap) -> Result<UserId, ApiError> {
        let auth_header = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid authorization header format"))?;

        let claims = self.verify_token(token)?;
        Ok(UserId(claims.sub))
    }
}

/// 已认证的请求发起者，每次请求都从存储中重新加载，角色变化立即生效
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = state.jwt_service.extract_user_from_headers(&parts.headers)?;
        let identity = state
            .user_service
            .identity(user_id)
            .await?
            .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;
        Ok(AuthUser(identity))
    }
}

/// 登录响应结构
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::AUTHORIZATION, HeaderValue};
    use domain::{NewUser, PasswordHash, Role, Username};

    fn service(secret: &str) -> JwtService {
        JwtService::new(JwtConfig {
            secret: secret.to_string(),
            expiration_hours: 1,
        })
    }

    fn user() -> User {
        NewUser::new(
            Username::parse("alice").unwrap(),
            PasswordHash::new("hash").unwrap(),
            Role::User,
            OffsetDateTime::now_utc(),
        )
        .into_user(UserId(42))
    }

    #[test]
    fn token_round_trip_through_header() {
        let jwt = service("test-secret-key-with-at-least-32-chars!!");
        let token = jwt.generate_token(&user()).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        assert_eq!(jwt.extract_user_from_headers(&headers).unwrap(), UserId(42));
    }

    #[test]
    fn rejects_foreign_or_missing_tokens() {
        let issuer = service("issuer-secret-key-with-at-least-32-chars");
        let verifier = service("another-secret-key-with-at-least-32-chars");
        let token = issuer.generate_token(&user()).unwrap();
        assert!(verifier.verify_token(&token).is_err());

        let headers = HeaderMap::new();
        assert!(verifier.extract_user_from_headers(&headers).is_err());
    }
}
