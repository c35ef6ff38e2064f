use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        cart::{AddToCartRequest, CartList},
        users::{LoginRequest, RegisterRequest},
    },
    error::AppResult,
    models::User,
    response::ApiResponse,
    routes::extract::{ApiJson, ApiPath},
    services::{cart_service, user_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/{id}", get(get_user))
        .route(
            "/{id}/cart",
            get(get_cart).post(add_to_cart).delete(clear_cart),
        )
        .route("/{id}/cart/{product_id}", delete(remove_from_cart))
}

#[utoipa::path(
    post,
    path = "/api/users/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = ApiResponse<User>),
        (status = 400, description = "Username taken or field missing")
    ),
    tag = "Users"
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    let resp = user_service::register_user(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = ApiResponse<User>),
        (status = 400, description = "Invalid credentials")
    ),
    tag = "Users"
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = user_service::login_user(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User profile", body = ApiResponse<User>),
        (status = 404, description = "User not found")
    ),
    tag = "Users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = user_service::get_user(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/cart",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Cart lines with product details", body = ApiResponse<CartList>),
        (status = 404, description = "User not found")
    ),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = cart_service::list_cart(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/users/{id}/cart",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Updated cart", body = ApiResponse<CartList>),
        (status = 400, description = "Invalid quantity"),
        (status = 404, description = "User or product not found")
    ),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = cart_service::add_to_cart(&state, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/users/{user_id}/cart/{product_id}",
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Updated cart", body = ApiResponse<CartList>),
        (status = 404, description = "User not found")
    ),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    ApiPath((user_id, product_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = cart_service::remove_from_cart(&state, user_id, product_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}/cart",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Cart cleared", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "User not found")
    ),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::clear_cart(&state, id).await?;
    Ok(Json(resp))
}
