use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::reviews::{CreateReviewRequest, ProductReviewList, UserReviewList},
    error::AppResult,
    models::Review,
    response::ApiResponse,
    routes::extract::{ApiJson, ApiPath},
    services::review_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_review))
        .route("/product/{product_id}", get(list_product_reviews))
        .route("/user/{user_id}", get(list_user_reviews))
}

#[utoipa::path(
    post,
    path = "/api/reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = ApiResponse<Review>),
        (status = 400, description = "Not purchased, already reviewed, or bad rating")
    ),
    tag = "Reviews"
)]
pub async fn create_review(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Review>>)> {
    let resp = review_service::create_review(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/reviews/product/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Reviews of a product, newest first", body = ApiResponse<ProductReviewList>)
    ),
    tag = "Reviews"
)]
pub async fn list_product_reviews(
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<ProductReviewList>>> {
    let resp = review_service::list_product_reviews(&state, product_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/reviews/user/{user_id}",
    params(("user_id" = Uuid, Path, description = "Reviewer ID")),
    responses(
        (status = 200, description = "Reviews written by a user, newest first", body = ApiResponse<UserReviewList>)
    ),
    tag = "Reviews"
)]
pub async fn list_user_reviews(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<UserReviewList>>> {
    let resp = review_service::list_user_reviews(&state, user_id).await?;
    Ok(Json(resp))
}
