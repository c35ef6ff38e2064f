use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{MethodRouter, get, post},
};
use tower_http::limit::RequestBodyLimitLayer;
use uuid::Uuid;

use crate::{
    dto::products::{CreateProductForm, ProductDetail, ProductList, ProductPage, UploadedImages},
    error::AppResult,
    models::Product,
    response::ApiResponse,
    routes::{
        extract::{ApiPath, ApiQuery},
        params::ProductQuery,
    },
    services::product_service,
    state::AppState,
    uploads::{self, MAX_REQUEST_BYTES},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", upload_limits(get(list_products).post(create_product)))
        .route("/upload", upload_limits(post(upload_images)))
        .route("/seller/{seller_id}", get(list_seller_products))
        .route("/{id}", get(get_product))
}

/// Multipart bodies carry up to five images, far past the default body limit.
fn upload_limits(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route
        .layer::<_, Infallible>(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(ProductQuery),
    responses(
        (status = 200, description = "Filtered page of products, newest first", body = ApiResponse<ProductPage>),
        (status = 400, description = "Malformed query")
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductPage>>> {
    let resp = product_service::list_products(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product with seller", body = ApiResponse<ProductDetail>),
        (status = 404, description = "Product not found")
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<ProductDetail>>> {
    let resp = product_service::get_product(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body(content = CreateProductForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Product listed", body = ApiResponse<Product>),
        (status = 400, description = "Missing or invalid field"),
        (status = 404, description = "Seller not found")
    ),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<Product>>)> {
    let form = uploads::read_form(&mut multipart, &state.upload_dir).await?;
    let resp = product_service::create_product_from_form(&state, form).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/products/seller/{seller_id}",
    params(("seller_id" = Uuid, Path, description = "Seller user ID")),
    responses(
        (status = 200, description = "Seller's listings, newest first", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn list_seller_products(
    State(state): State<AppState>,
    ApiPath(seller_id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_seller_products(&state, seller_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products/upload",
    request_body(content = CreateProductForm, content_type = "multipart/form-data", description = "Only the `images` parts are read"),
    responses(
        (status = 200, description = "Stored image filenames", body = ApiResponse<UploadedImages>),
        (status = 400, description = "No file uploaded")
    ),
    tag = "Products"
)]
pub async fn upload_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<UploadedImages>>> {
    let form = uploads::read_form(&mut multipart, &state.upload_dir).await?;
    let resp = product_service::record_upload(&state, form).await?;
    Ok(Json(resp))
}
