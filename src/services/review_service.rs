use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr,
};
use uuid::Uuid;

use crate::{
    audit::{AuditAction, record},
    dto::reviews::{CreateReviewRequest, ProductReview, ProductReviewList, UserReview, UserReviewList},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews, Model as ReviewModel},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    models::{OrderStatus, ProductSummary, Review, UserSummary},
    response::ApiResponse,
    services::product_service::image_list,
    state::AppState,
};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

const NOT_PURCHASED: &str = "Only purchased products can be reviewed";
const ALREADY_REVIEWED: &str = "You have already reviewed this product";

pub fn validate_rating(rating: i32) -> AppResult<i16> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(AppError::bad_request(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }
    Ok(rating as i16)
}

pub async fn create_review(
    state: &AppState,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    let rating = validate_rating(payload.rating)?;

    // a completed order of this buyer must contain the product
    let purchase = OrderItems::find()
        .inner_join(Orders)
        .filter(OrderItemCol::ProductId.eq(payload.product_id))
        .filter(OrderCol::BuyerId.eq(payload.user_id))
        .filter(OrderCol::Status.eq(OrderStatus::Completed.as_str()))
        .one(&state.orm)
        .await?;
    if purchase.is_none() {
        return Err(AppError::bad_request(NOT_PURCHASED));
    }

    let existing = Reviews::find()
        .filter(ReviewCol::ProductId.eq(payload.product_id))
        .filter(ReviewCol::UserId.eq(payload.user_id))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::bad_request(ALREADY_REVIEWED));
    }

    let review = ReviewActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(payload.product_id),
        user_id: Set(payload.user_id),
        rating: Set(rating),
        comment: Set(payload.comment.trim().to_string()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|err| match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::bad_request(ALREADY_REVIEWED),
        _ => AppError::from(err),
    })?;

    record(
        &state.orm,
        Some(review.user_id),
        AuditAction::ReviewCreate,
        serde_json::json!({ "review_id": review.id, "product_id": review.product_id }),
    )
    .await;

    Ok(ApiResponse::success("Review created", review_from_entity(review), None))
}

pub async fn list_product_reviews(
    state: &AppState,
    product_id: Uuid,
) -> AppResult<ApiResponse<ProductReviewList>> {
    let items = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product_id))
        .order_by_desc(ReviewCol::CreatedAt)
        .order_by_desc(ReviewCol::Id)
        .find_also_related(Users)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|(review, user)| ProductReview {
            review: review_from_entity(review),
            user: user.map(|u| UserSummary {
                id: u.id,
                username: u.username,
            }),
        })
        .collect();

    Ok(ApiResponse::success(
        "Product reviews",
        ProductReviewList { items },
        None,
    ))
}

pub async fn list_user_reviews(
    state: &AppState,
    user_id: Uuid,
) -> AppResult<ApiResponse<UserReviewList>> {
    let reviews = Reviews::find()
        .filter(ReviewCol::UserId.eq(user_id))
        .order_by_desc(ReviewCol::CreatedAt)
        .order_by_desc(ReviewCol::Id)
        .all(&state.orm)
        .await?;

    let product_ids: Vec<Uuid> = reviews.iter().map(|r| r.product_id).collect();
    let mut products: HashMap<Uuid, ProductSummary> = if product_ids.is_empty() {
        HashMap::new()
    } else {
        Products::find()
            .filter(ProdCol::Id.is_in(product_ids))
            .all(&state.orm)
            .await?
            .into_iter()
            .map(|p| {
                (
                    p.id,
                    ProductSummary {
                        id: p.id,
                        name: p.name,
                        brand: p.brand,
                        images: image_list(p.id, p.images),
                    },
                )
            })
            .collect()
    };

    // one review per (user, product), so each product is taken at most once
    let items = reviews
        .into_iter()
        .map(|review| UserReview {
            product: products.remove(&review.product_id),
            review: review_from_entity(review),
        })
        .collect();

    Ok(ApiResponse::success("User reviews", UserReviewList { items }, None))
}

fn review_from_entity(model: ReviewModel) -> Review {
    Review {
        id: model.id,
        product_id: model.product_id,
        user_id: model.user_id,
        rating: model.rating,
        comment: model.comment,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_must_be_one_to_five() {
        assert_eq!(validate_rating(1).expect("min"), 1);
        assert_eq!(validate_rating(5).expect("max"), 5);
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
        assert!(validate_rating(-3).is_err());
    }
}
