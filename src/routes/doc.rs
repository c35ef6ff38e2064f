use utoipa::{OpenApi, openapi::OpenApi as OpenApiSpec};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddToCartRequest, CartList},
        orders::{CreateOrderRequest, OrderDetail, OrderList, OrderWithItems},
        products::{CreateProductForm, ProductDetail, ProductList, ProductPage, UploadedImages},
        reviews::{CreateReviewRequest, ProductReview, ProductReviewList, UserReview, UserReviewList},
        users::{LoginRequest, RegisterRequest},
    },
    models::{
        BuyerSummary, CartLine, Order, OrderLine, OrderStatus, Product, ProductSummary, Review,
        User, UserSummary,
    },
    response::{ApiResponse, Meta},
    routes::{health, orders, params, products, reviews, users},
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shoetrade API",
        description = "Second-hand sneaker marketplace. Callers identify themselves by user id; no tokens are issued."
    ),
    paths(
        health::health_check,
        health::readiness,
        users::register,
        users::login,
        users::get_user,
        users::get_cart,
        users::add_to_cart,
        users::remove_from_cart,
        users::clear_cart,
        products::list_products,
        products::get_product,
        products::create_product,
        products::list_seller_products,
        products::upload_images,
        orders::create_order,
        orders::list_user_orders,
        orders::get_order,
        orders::pay_order,
        reviews::create_review,
        reviews::list_product_reviews,
        reviews::list_user_reviews
    ),
    components(
        schemas(
            User,
            UserSummary,
            BuyerSummary,
            Product,
            ProductSummary,
            CartLine,
            Order,
            OrderLine,
            OrderStatus,
            Review,
            RegisterRequest,
            LoginRequest,
            AddToCartRequest,
            CartList,
            CreateProductForm,
            ProductPage,
            ProductList,
            ProductDetail,
            UploadedImages,
            CreateOrderRequest,
            OrderWithItems,
            OrderDetail,
            OrderList,
            CreateReviewRequest,
            ProductReview,
            UserReview,
            ProductReviewList,
            UserReviewList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            health::HealthData,
            Meta,
            ApiResponse<User>,
            ApiResponse<Product>,
            ApiResponse<ProductPage>,
            ApiResponse<CartList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<Review>
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Users", description = "Registration, login and profiles"),
        (name = "Cart", description = "Per-user shopping cart"),
        (name = "Products", description = "Catalog listings and image uploads"),
        (name = "Orders", description = "Checkout and payment"),
        (name = "Reviews", description = "Purchase-gated product reviews"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_resource() {
        let spec = ApiDoc::openapi();
        for path in [
            "/api/users/register",
            "/api/users/{id}/cart",
            "/api/products",
            "/api/products/upload",
            "/api/orders",
            "/api/orders/{id}/pay",
            "/api/reviews",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
