//! Request Actor
//!
//! 会话签发/校验在上游网关完成；这里只消费网关注入的身份头，
//! 为处理器提供 [`CurrentUser`] 与所有权/角色判断。

mod extractor;

use serde::{Deserialize, Serialize};

/// Actor role as asserted by the upstream auth layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// The authenticated actor behind the current request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user_id: String,
    pub role: Role,
    /// Needed by the payment gateway initialize call
    pub email: Option<String>,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Ownership check against an order's / payment's user field
    pub fn owns(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}
