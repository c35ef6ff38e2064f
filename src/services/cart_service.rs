use std::collections::HashMap;

use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    RuntimeErr, Set,
};
use uuid::Uuid;

use crate::{
    audit::{AuditAction, record},
    dto::cart::{AddToCartRequest, CartList},
    entity::{
        cart_items::{ActiveModel as CartActive, Column as CartCol, Entity as CartItems},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    models::CartLine,
    response::{ApiResponse, Meta},
    services::{product_service::product_from_entity, user_service::find_user},
    state::AppState,
};

pub async fn list_cart(state: &AppState, user_id: Uuid) -> AppResult<ApiResponse<CartList>> {
    find_user(&state.orm, user_id).await?;
    let items = load_cart(&state.orm, user_id).await?;
    Ok(ApiResponse::success("Cart", CartList { items }, None))
}

/// Adds `quantity` of a product, summing with any existing line for it.
pub async fn add_to_cart(
    state: &AppState,
    user_id: Uuid,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartList>> {
    if payload.quantity <= 0 {
        return Err(AppError::bad_request("quantity must be greater than 0"));
    }
    find_user(&state.orm, user_id).await?;

    let product = Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?;
    if product.is_none() {
        return Err(AppError::not_found("Product"));
    }

    // one statement, so concurrent adds for the same line cannot lose an increment
    let line = CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        product_id: Set(payload.product_id),
        quantity: Set(payload.quantity),
        created_at: NotSet,
    };
    CartItems::insert(line)
        .on_conflict(
            OnConflict::columns([CartCol::UserId, CartCol::ProductId])
                .value(
                    CartCol::Quantity,
                    Expr::cust("cart_items.quantity + excluded.quantity"),
                )
                .to_owned(),
        )
        .exec_without_returning(&state.orm)
        .await
        .map_err(|err| {
            if is_out_of_range(&err) {
                AppError::bad_request("quantity is too large")
            } else {
                AppError::from(err)
            }
        })?;

    record(
        &state.orm,
        Some(user_id),
        AuditAction::CartAdd,
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    let items = load_cart(&state.orm, user_id).await?;
    Ok(ApiResponse::success("Added to cart", CartList { items }, None))
}

/// Removing a product that is not in the cart is a no-op.
pub async fn remove_from_cart(
    state: &AppState,
    user_id: Uuid,
    product_id: Uuid,
) -> AppResult<ApiResponse<CartList>> {
    find_user(&state.orm, user_id).await?;

    let result = CartItems::delete_many()
        .filter(CartCol::UserId.eq(user_id))
        .filter(CartCol::ProductId.eq(product_id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected > 0 {
        record(
            &state.orm,
            Some(user_id),
            AuditAction::CartRemove,
            serde_json::json!({ "product_id": product_id }),
        )
        .await;
    }

    let items = load_cart(&state.orm, user_id).await?;
    Ok(ApiResponse::success("Removed from cart", CartList { items }, None))
}

pub async fn clear_cart(
    state: &AppState,
    user_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    find_user(&state.orm, user_id).await?;

    let result = CartItems::delete_many()
        .filter(CartCol::UserId.eq(user_id))
        .exec(&state.orm)
        .await?;

    record(
        &state.orm,
        Some(user_id),
        AuditAction::CartClear,
        serde_json::json!({ "removed": result.rows_affected }),
    )
    .await;

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// SQLSTATE 22003: the summed quantity no longer fits the column.
fn is_out_of_range(err: &DbErr) -> bool {
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(db)))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(db))) => {
            db.code().as_deref() == Some("22003")
        }
        _ => false,
    }
}

/// Cart lines in insertion order, each with its current product.
pub(crate) async fn load_cart<C: ConnectionTrait>(db: &C, user_id: Uuid) -> AppResult<Vec<CartLine>> {
    let lines = CartItems::find()
        .filter(CartCol::UserId.eq(user_id))
        .order_by_asc(CartCol::CreatedAt)
        .order_by_asc(CartCol::Id)
        .all(db)
        .await?;

    let ids: Vec<Uuid> = lines.iter().map(|line| line.product_id).collect();
    let mut products: HashMap<Uuid, _> = if ids.is_empty() {
        HashMap::new()
    } else {
        Products::find()
            .filter(ProdCol::Id.is_in(ids))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect()
    };

    Ok(lines
        .into_iter()
        .map(|line| CartLine {
            product_id: line.product_id,
            quantity: line.quantity,
            product: products.remove(&line.product_id).map(product_from_entity),
        })
        .collect())
}
