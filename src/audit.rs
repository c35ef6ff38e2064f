use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, ConnectionTrait, Set};
use serde_json::Value;
use uuid::Uuid;

use crate::{entity::audit_logs::ActiveModel as AuditActive, error::AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    UserRegister,
    UserLogin,
    CartAdd,
    CartRemove,
    CartClear,
    ProductCreate,
    ImageUpload,
    OrderCreate,
    OrderPay,
    ReviewCreate,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserRegister => "user_register",
            AuditAction::UserLogin => "user_login",
            AuditAction::CartAdd => "cart_add",
            AuditAction::CartRemove => "cart_remove",
            AuditAction::CartClear => "cart_clear",
            AuditAction::ProductCreate => "product_create",
            AuditAction::ImageUpload => "image_upload",
            AuditAction::OrderCreate => "order_create",
            AuditAction::OrderPay => "order_pay",
            AuditAction::ReviewCreate => "review_create",
        }
    }

    pub fn resource(&self) -> &'static str {
        match self {
            AuditAction::UserRegister | AuditAction::UserLogin => "users",
            AuditAction::CartAdd | AuditAction::CartRemove | AuditAction::CartClear => {
                "cart_items"
            }
            AuditAction::ProductCreate | AuditAction::ImageUpload => "products",
            AuditAction::OrderCreate | AuditAction::OrderPay => "orders",
            AuditAction::ReviewCreate => "reviews",
        }
    }
}

pub async fn log_audit<C: ConnectionTrait>(
    db: &C,
    user_id: Option<Uuid>,
    action: AuditAction,
    metadata: Value,
) -> AppResult<()> {
    AuditActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        action: Set(action.as_str().to_string()),
        resource: Set(Some(action.resource().to_string())),
        metadata: Set(Some(metadata)),
        created_at: NotSet,
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Audit rows are best-effort: a failed write is logged and swallowed.
pub async fn record<C: ConnectionTrait>(
    db: &C,
    user_id: Option<Uuid>,
    action: AuditAction,
    metadata: Value,
) {
    if let Err(err) = log_audit(db, user_id, action, metadata).await {
        tracing::warn!(error = %err, action = action.as_str(), "audit log failed");
    }
}
