use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::{AuditAction, record},
    dto::products::{CreateProductRequest, ProductDetail, ProductList, ProductPage, UploadedImages},
    entity::{
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    models::{Product, UserSummary},
    response::{ApiResponse, Meta},
    routes::params::ProductQuery,
    services::user_service::find_user,
    state::AppState,
    uploads::{self, MultipartForm},
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductPage>> {
    let (page, limit, offset) = query.pagination().normalize();

    let finder = Products::find()
        .filter(product_filter(&query))
        .order_by_desc(Column::CreatedAt)
        .order_by_desc(Column::Id);

    let total = finder.clone().count(&state.orm).await? as i64;

    let products = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    let data = ProductPage {
        products,
        total,
        current_page: page,
        total_pages: meta.total_pages.unwrap_or_default(),
    };
    Ok(ApiResponse::success("Products", data, Some(meta)))
}

/// Every supplied criterion must hold; absent criteria are ignored.
pub fn product_filter(query: &ProductQuery) -> Condition {
    let mut condition = Condition::all();

    if let Some(brand) = query.brand.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        condition = condition.add(Column::Brand.eq(brand));
    }

    if let Some(min_size) = query.min_size {
        condition = condition.add(Column::Size.gte(min_size));
    }
    if let Some(max_size) = query.max_size {
        condition = condition.add(Column::Size.lte(max_size));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Brand).ilike(pattern)),
        );
    }

    condition
}

/// Escapes LIKE metacharacters so user input matches literally.
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductDetail>> {
    let found = Products::find_by_id(id)
        .find_also_related(Users)
        .one(&state.orm)
        .await?;
    let (product, seller) = match found {
        Some(pair) => pair,
        None => return Err(AppError::not_found("Product")),
    };

    let data = ProductDetail {
        product: product_from_entity(product),
        seller: seller.map(|u| UserSummary {
            id: u.id,
            username: u.username,
        }),
    };
    Ok(ApiResponse::success("Product", data, None))
}

pub async fn list_seller_products(
    state: &AppState,
    seller_id: Uuid,
) -> AppResult<ApiResponse<ProductList>> {
    let items = Products::find()
        .filter(Column::SellerId.eq(seller_id))
        .order_by_desc(Column::CreatedAt)
        .order_by_desc(Column::Id)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();
    Ok(ApiResponse::success(
        "Seller products",
        ProductList { items },
        Some(Meta::empty()),
    ))
}

/// Lists a product from an already-drained multipart form.
///
/// Images stored while reading the form are removed if the listing is rejected.
pub async fn create_product_from_form(
    state: &AppState,
    form: MultipartForm,
) -> AppResult<ApiResponse<Product>> {
    let images = form.images.clone();
    let result = match parse_create_request(form) {
        Ok(payload) => create_product(state, payload).await,
        Err(err) => Err(err),
    };
    if result.is_err() {
        uploads::discard(&state.upload_dir, &images).await;
    }
    result
}

pub async fn create_product(
    state: &AppState,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    if payload.name.trim().is_empty() || payload.brand.trim().is_empty() {
        return Err(AppError::bad_request("name and brand are required"));
    }
    if payload.price < 0 {
        return Err(AppError::bad_request("price must not be negative"));
    }
    if !payload.size.is_finite() || payload.size <= 0.0 {
        return Err(AppError::bad_request("size must be a positive number"));
    }
    find_user(&state.orm, payload.seller_id)
        .await
        .map_err(|err| match err {
            AppError::NotFound(_) => AppError::not_found("Seller"),
            other => other,
        })?;

    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        brand: Set(payload.brand.trim().to_string()),
        price: Set(payload.price),
        size: Set(payload.size),
        description: Set(payload.description),
        images: Set(serde_json::json!(payload.images)),
        seller_id: Set(payload.seller_id),
        verified: Set(payload.verified),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(product_id = %product.id, seller_id = %product.seller_id, "product listed");
    record(
        &state.orm,
        Some(product.seller_id),
        AuditAction::ProductCreate,
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn record_upload(
    state: &AppState,
    form: MultipartForm,
) -> AppResult<ApiResponse<UploadedImages>> {
    if form.images.is_empty() {
        return Err(AppError::bad_request("No files uploaded"));
    }

    record(
        &state.orm,
        None,
        AuditAction::ImageUpload,
        serde_json::json!({ "files": form.images }),
    )
    .await;

    Ok(ApiResponse::success(
        "Images uploaded",
        UploadedImages {
            image_urls: form.images,
        },
        None,
    ))
}

/// Validates the text fields of a listing form.
pub fn parse_create_request(form: MultipartForm) -> AppResult<CreateProductRequest> {
    let required = |name: &str| {
        form.text(name)
            .map(str::to_string)
            .ok_or_else(|| AppError::bad_request(format!("{name} is required")))
    };

    let name = required("name")?;
    let brand = required("brand")?;
    let price = required("price")?
        .parse::<i64>()
        .map_err(|_| AppError::bad_request("price must be an integer"))?;
    let size = required("size")?
        .parse::<f64>()
        .map_err(|_| AppError::bad_request("size must be a number"))?;
    let seller_id = form
        .text("seller_id")
        .or_else(|| form.text("sellerId"))
        .ok_or_else(|| AppError::bad_request("seller_id is required"))?;
    let seller_id = Uuid::parse_str(seller_id)
        .map_err(|_| AppError::bad_request("seller_id must be a UUID"))?;
    let verified = match form.text("verified") {
        None => false,
        Some(v) => v
            .parse::<bool>()
            .map_err(|_| AppError::bad_request("verified must be true or false"))?,
    };
    let description = form.text("description").unwrap_or_default().to_string();

    Ok(CreateProductRequest {
        name,
        brand,
        price,
        size,
        description,
        seller_id,
        verified,
        images: form.images,
    })
}

pub(crate) fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        brand: model.brand,
        price: model.price,
        size: model.size,
        description: model.description,
        images: image_list(model.id, model.images),
        seller_id: model.seller_id,
        verified: model.verified,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

/// Decodes the stored image filenames; a malformed column reads as no images.
pub(crate) fn image_list(product_id: Uuid, value: serde_json::Value) -> Vec<String> {
    match serde_json::from_value(value) {
        Ok(images) => images,
        Err(err) => {
            tracing::warn!(%product_id, error = %err, "malformed images column");
            Vec::new()
        }
    }
}
