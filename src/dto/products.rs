use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Product, UserSummary};

/// Fields of a new listing, collected from a multipart form.
#[derive(Debug, Clone)]
pub struct CreateProductRequest {
    pub name: String,
    pub brand: String,
    pub price: i64,
    pub size: f64,
    pub description: String,
    pub seller_id: Uuid,
    pub verified: bool,
    pub images: Vec<String>,
}

/// Schema of the multipart form accepted by `POST /api/products`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct CreateProductForm {
    pub name: String,
    pub brand: String,
    pub price: i64,
    pub size: f64,
    pub description: Option<String>,
    pub seller_id: Uuid,
    pub verified: Option<bool>,
    #[schema(value_type = Vec<String>)]
    pub images: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: i64,
    pub current_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub seller: Option<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadedImages {
    pub image_urls: Vec<String>,
}
