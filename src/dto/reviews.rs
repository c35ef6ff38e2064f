use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{ProductSummary, Review, UserSummary};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateReviewRequest {
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductReview {
    #[serde(flatten)]
    pub review: Review,
    pub user: Option<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserReview {
    #[serde(flatten)]
    pub review: Review,
    pub product: Option<ProductSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ProductReviewList {
    #[schema(value_type = Vec<ProductReview>)]
    pub items: Vec<ProductReview>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct UserReviewList {
    #[schema(value_type = Vec<UserReview>)]
    pub items: Vec<UserReview>,
}
