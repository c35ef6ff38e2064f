use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{AuditAction, record},
    dto::orders::{CreateOrderRequest, OrderDetail, OrderList, OrderWithItems},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    models::{BuyerSummary, Order, OrderLine, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::product_service::product_from_entity,
    state::AppState,
};

/// Converts the buyer's cart into a pending order and empties the cart.
///
/// Runs in one transaction: the order, its lines and the cart deletion commit
/// together or not at all. Prices are read inside the same transaction and
/// frozen onto the order lines.
pub async fn create_order(
    state: &AppState,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let buyer_id = payload.buyer_id;
    let txn = state.orm.begin().await?;

    // serializes checkouts and cart writes for this buyer until commit
    let buyer = Users::find_by_id(buyer_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    if buyer.is_none() {
        return Err(AppError::not_found("User"));
    }

    let cart = CartItems::find()
        .filter(CartCol::UserId.eq(buyer_id))
        .order_by_asc(CartCol::CreatedAt)
        .order_by_asc(CartCol::Id)
        .lock(LockType::Update)
        .all(&txn)
        .await?;

    if cart.is_empty() {
        return Err(AppError::bad_request("Cart is empty, cannot create order"));
    }

    let ids: Vec<Uuid> = cart.iter().map(|line| line.product_id).collect();
    let products: HashMap<Uuid, _> = Products::find()
        .filter(ProdCol::Id.is_in(ids))
        .all(&txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut priced = Vec::with_capacity(cart.len());
    for line in &cart {
        let product = products.get(&line.product_id).ok_or_else(|| {
            AppError::bad_request(format!("Product {} is no longer available", line.product_id))
        })?;
        priced.push((line.product_id, line.quantity, product.price));
    }

    let total_price = order_total(priced.iter().map(|(_, qty, price)| (*price, *qty)))
        .ok_or_else(|| AppError::bad_request("Order total is out of range"))?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        buyer_id: Set(buyer_id),
        total_price: Set(total_price),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        paid_at: Set(None),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(priced.len());
    for (position, (product_id, quantity, unit_price)) in priced.into_iter().enumerate() {
        OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            unit_price: Set(unit_price),
            position: Set(position as i32),
        }
        .insert(&txn)
        .await?;

        items.push(OrderLine {
            product_id,
            quantity,
            unit_price,
            product: products.get(&product_id).cloned().map(product_from_entity),
        });
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(buyer_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(order_id = %order.id, buyer_id = %buyer_id, total_price, "order created");
    record(
        &state.orm,
        Some(buyer_id),
        AuditAction::OrderCreate,
        serde_json::json!({ "order_id": order.id, "total_price": total_price }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created",
        OrderWithItems {
            order: order_from_entity(order)?,
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Sum of `unit_price * quantity`, or `None` on overflow or a negative quantity.
pub fn order_total(lines: impl IntoIterator<Item = (i64, i32)>) -> Option<i64> {
    lines.into_iter().try_fold(0i64, |acc, (price, quantity)| {
        if quantity < 0 {
            return None;
        }
        price
            .checked_mul(i64::from(quantity))
            .and_then(|line| acc.checked_add(line))
    })
}

pub async fn list_user_orders(
    state: &AppState,
    user_id: Uuid,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::BuyerId.eq(user_id));
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status: OrderStatus = status.parse().map_err(AppError::BadRequest)?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let finder = Orders::find()
        .filter(condition)
        .order_by_desc(OrderCol::CreatedAt)
        .order_by_desc(OrderCol::Id);

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = with_lines(&state.orm, orders).await?;
    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn get_order(state: &AppState, id: Uuid) -> AppResult<ApiResponse<OrderDetail>> {
    let found = Orders::find_by_id(id)
        .find_also_related(Users)
        .one(&state.orm)
        .await?;
    let (order, buyer) = match found {
        Some(pair) => pair,
        None => return Err(AppError::not_found("Order")),
    };

    let order = with_lines(&state.orm, vec![order])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("order {id} vanished")))?;

    let data = OrderDetail {
        order,
        buyer: buyer.map(|u| BuyerSummary {
            id: u.id,
            username: u.username,
            email: u.email,
        }),
    };
    Ok(ApiResponse::success("Order", data, Some(Meta::empty())))
}

/// Marks a pending order completed. Paying twice is rejected.
pub async fn pay_order(state: &AppState, id: Uuid) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::not_found("Order")),
    };

    let current: OrderStatus = order
        .status
        .parse()
        .map_err(|e: String| AppError::Internal(anyhow::anyhow!(e)))?;
    let next = current.pay().map_err(AppError::bad_request)?;

    let mut active: OrderActive = order.into();
    active.status = Set(next.as_str().to_string());
    active.paid_at = Set(Some(Utc::now().into()));
    let order = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(order_id = %order.id, "order paid");
    record(
        &state.orm,
        Some(order.buyer_id),
        AuditAction::OrderPay,
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    let data = with_lines(&state.orm, vec![order])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("order {id} vanished")))?;

    Ok(ApiResponse::success("Payment recorded", data, Some(Meta::empty())))
}

/// Attaches each order's lines, in cart order, with the current product details.
async fn with_lines<C: ConnectionTrait>(
    db: &C,
    orders: Vec<OrderModel>,
) -> AppResult<Vec<OrderWithItems>> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let lines = OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(order_ids))
        .order_by_asc(OrderItemCol::Position)
        .all(db)
        .await?;

    let mut product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    product_ids.sort_unstable();
    product_ids.dedup();
    let products: HashMap<Uuid, _> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut by_order: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
    for line in lines {
        by_order.entry(line.order_id).or_default().push(OrderLine {
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            product: products.get(&line.product_id).cloned().map(product_from_entity),
        });
    }

    orders
        .into_iter()
        .map(|order| {
            let items = by_order.remove(&order.id).unwrap_or_default();
            Ok(OrderWithItems {
                order: order_from_entity(order)?,
                items,
            })
        })
        .collect()
}

fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let status = model
        .status
        .parse::<OrderStatus>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    Ok(Order {
        id: model.id,
        buyer_id: model.buyer_id,
        total_price: model.total_price,
        status,
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
    })
}
