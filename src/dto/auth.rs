use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub is_admin: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user_id: Option<Uuid>,
    pub is_admin: bool,
}

impl MeResponse {
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            is_admin: false,
        }
    }
}
