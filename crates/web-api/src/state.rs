use std::sync::Arc;

use application::{ChatContext, UserService};

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatContext>,
    pub user_service: Arc<UserService>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    pub fn new(
        chat: Arc<ChatContext>,
        user_service: Arc<UserService>,
        jwt_service: Arc<JwtService>,
    ) -> Self {
        Self {
            chat,
            user_service,
            jwt_service,
        }
    }
}
