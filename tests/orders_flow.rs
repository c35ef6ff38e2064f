use shoetrade_api::{
    db::{create_pool, run_migrations},
    dto::{
        cart::AddToCartRequest,
        orders::CreateOrderRequest,
        products::CreateProductRequest,
        reviews::CreateReviewRequest,
        users::{LoginRequest, RegisterRequest},
    },
    error::AppError,
    models::OrderStatus,
    routes::params::{OrderListQuery, ProductQuery},
    services::{cart_service, order_service, product_service, review_service, user_service},
    state::AppState,
};
use uuid::Uuid;

// Each test works on freshly registered users and uniquely named products, so
// the tests can share one database and run concurrently.
async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests.");
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;
    let upload_dir = std::env::temp_dir().join(format!("shoetrade-test-{}", Uuid::new_v4()));
    Ok(Some(AppState::new(pool, upload_dir)))
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", &Uuid::new_v4().simple().to_string()[..8])
}

async fn create_user(state: &AppState, prefix: &str) -> anyhow::Result<Uuid> {
    let username = unique(prefix);
    let resp = user_service::register_user(
        state,
        RegisterRequest {
            email: format!("{username}@example.com"),
            username,
            password: "hunter2".into(),
        },
    )
    .await?;
    Ok(resp.data.expect("user").id)
}

async fn create_product(
    state: &AppState,
    seller_id: Uuid,
    name: &str,
    brand: &str,
    price: i64,
    size: f64,
) -> anyhow::Result<Uuid> {
    let resp = product_service::create_product(
        state,
        CreateProductRequest {
            name: name.into(),
            brand: brand.into(),
            price,
            size,
            description: String::new(),
            seller_id,
            verified: false,
            images: Vec::new(),
        },
    )
    .await?;
    Ok(resp.data.expect("product").id)
}

async fn add(state: &AppState, user_id: Uuid, product_id: Uuid, quantity: i32) -> anyhow::Result<()> {
    cart_service::add_to_cart(state, user_id, AddToCartRequest { product_id, quantity }).await?;
    Ok(())
}

#[tokio::test]
async fn adding_the_same_product_sums_quantity() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let seller = create_user(&state, "seller").await?;
    let buyer = create_user(&state, "buyer").await?;
    let shoe = create_product(&state, seller, "Samba OG", "Adidas", 1500, 42.0).await?;

    add(&state, buyer, shoe, 1).await?;
    add(&state, buyer, shoe, 2).await?;

    let cart = cart_service::list_cart(&state, buyer).await?.data.expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 3);

    let err = cart_service::add_to_cart(
        &state,
        buyer,
        AddToCartRequest {
            product_id: shoe,
            quantity: 0,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // removing an absent line leaves the cart as is
    let cart = cart_service::remove_from_cart(&state, buyer, Uuid::new_v4())
        .await?
        .data
        .expect("cart");
    assert_eq!(cart.items.len(), 1);

    cart_service::clear_cart(&state, buyer).await?;
    let cart = cart_service::list_cart(&state, buyer).await?.data.expect("cart");
    assert!(cart.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn order_takes_cart_total_and_empties_cart() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let seller = create_user(&state, "seller").await?;
    let buyer = create_user(&state, "buyer").await?;
    let jordan = create_product(&state, seller, "Air Jordan 1", "Nike", 12000, 43.0).await?;
    let vans = create_product(&state, seller, "Old Skool", "Vans", 5500, 41.0).await?;

    add(&state, buyer, jordan, 2).await?;
    add(&state, buyer, vans, 1).await?;

    let created = order_service::create_order(&state, CreateOrderRequest { buyer_id: buyer })
        .await?
        .data
        .expect("order");
    assert_eq!(created.order.total_price, 29500);
    assert_eq!(created.order.status, OrderStatus::Pending);
    assert!(created.order.paid_at.is_none());
    let lines: Vec<(Uuid, i32, i64)> = created
        .items
        .iter()
        .map(|l| (l.product_id, l.quantity, l.unit_price))
        .collect();
    assert_eq!(lines, vec![(jordan, 2, 12000), (vans, 1, 5500)]);

    let cart = cart_service::list_cart(&state, buyer).await?.data.expect("cart");
    assert!(cart.items.is_empty());

    let detail = order_service::get_order(&state, created.order.id)
        .await?
        .data
        .expect("detail");
    assert_eq!(detail.buyer.expect("buyer").id, buyer);
    assert_eq!(detail.order.items.len(), 2);

    let listed = order_service::list_user_orders(&state, buyer, OrderListQuery::default()).await?;
    assert_eq!(listed.meta.expect("meta").total, Some(1));
    Ok(())
}

#[tokio::test]
async fn empty_cart_cannot_be_ordered() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let buyer = create_user(&state, "buyer").await?;

    let err = order_service::create_order(&state, CreateOrderRequest { buyer_id: buyer })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref m) if m == "Cart is empty, cannot create order"));

    let listed = order_service::list_user_orders(&state, buyer, OrderListQuery::default())
        .await?
        .data
        .expect("orders");
    assert!(listed.items.is_empty());

    let err = order_service::create_order(
        &state,
        CreateOrderRequest {
            buyer_id: Uuid::new_v4(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn order_can_be_paid_once() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let seller = create_user(&state, "seller").await?;
    let buyer = create_user(&state, "buyer").await?;
    let shoe = create_product(&state, seller, "990v5", "New Balance", 18000, 44.0).await?;
    add(&state, buyer, shoe, 1).await?;

    let order = order_service::create_order(&state, CreateOrderRequest { buyer_id: buyer })
        .await?
        .data
        .expect("order")
        .order;

    let paid = order_service::pay_order(&state, order.id)
        .await?
        .data
        .expect("paid");
    assert_eq!(paid.order.status, OrderStatus::Completed);
    assert!(paid.order.paid_at.is_some());

    let err = order_service::pay_order(&state, order.id).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref m) if m == "Order already paid"));

    let err = order_service::pay_order(&state, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let completed = order_service::list_user_orders(
        &state,
        buyer,
        OrderListQuery {
            status: Some("completed".into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("orders");
    assert_eq!(completed.items.len(), 1);
    Ok(())
}

#[tokio::test]
async fn only_buyers_of_completed_orders_review_once() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let seller = create_user(&state, "seller").await?;
    let buyer = create_user(&state, "buyer").await?;
    let shoe = create_product(&state, seller, "Gel-Kayano 14", "Asics", 16000, 42.5).await?;

    let review = |rating: i32| CreateReviewRequest {
        product_id: shoe,
        user_id: buyer,
        rating,
        comment: "Fits true to size".into(),
    };

    let err = review_service::create_review(&state, review(5)).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    add(&state, buyer, shoe, 1).await?;
    let order = order_service::create_order(&state, CreateOrderRequest { buyer_id: buyer })
        .await?
        .data
        .expect("order")
        .order;

    // a pending order does not count as a purchase
    let err = review_service::create_review(&state, review(5)).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    order_service::pay_order(&state, order.id).await?;

    let err = review_service::create_review(&state, review(6)).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let created = review_service::create_review(&state, review(4))
        .await?
        .data
        .expect("review");
    assert_eq!(created.rating, 4);

    let err = review_service::create_review(&state, review(5)).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref m) if m == "You have already reviewed this product"));

    let for_product = review_service::list_product_reviews(&state, shoe)
        .await?
        .data
        .expect("reviews");
    assert_eq!(for_product.items.len(), 1);
    assert_eq!(for_product.items[0].user.as_ref().expect("user").id, buyer);

    let for_user = review_service::list_user_reviews(&state, buyer)
        .await?
        .data
        .expect("reviews");
    assert_eq!(for_user.items[0].product.as_ref().expect("product").id, shoe);
    Ok(())
}

#[tokio::test]
async fn catalog_filters_and_searches() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let seller = create_user(&state, "seller").await?;
    let brand = unique("Brand");
    let token = unique("zoom");
    create_product(&state, seller, &format!("Pegasus {token}"), &brand, 9000, 40.0).await?;
    create_product(&state, seller, &format!("Vomero {token}"), &brand, 14000, 44.0).await?;
    create_product(&state, seller, "Unrelated", &brand, 20000, 46.0).await?;

    let page = product_service::list_products(
        &state,
        ProductQuery {
            brand: Some(brand.clone()),
            min_size: Some(41.0),
            max_price: Some(15000),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("page");
    assert_eq!(page.total, 1);
    assert!(page.products[0].name.starts_with("Vomero"));

    let page = product_service::list_products(
        &state,
        ProductQuery {
            search: Some(token.to_uppercase()),
            limit: Some(1),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("page");
    assert_eq!(page.total, 2);
    assert_eq!(page.products.len(), 1);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.current_page, 1);

    let listed = product_service::list_seller_products(&state, seller)
        .await?
        .data
        .expect("products");
    assert_eq!(listed.items.len(), 3);
    Ok(())
}

#[tokio::test]
async fn login_checks_password_hash() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let username = unique("ferris");
    user_service::register_user(
        &state,
        RegisterRequest {
            username: username.clone(),
            password: "crab-rave".into(),
            email: "ferris@example.com".into(),
        },
    )
    .await?;

    let err = user_service::register_user(
        &state,
        RegisterRequest {
            username: username.clone(),
            password: "other".into(),
            email: "other@example.com".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref m) if m == "Username already exists"));

    let user = user_service::login_user(
        &state,
        LoginRequest {
            username: username.clone(),
            password: "crab-rave".into(),
        },
    )
    .await?
    .data
    .expect("user");
    assert_eq!(user.username, username);

    let err = user_service::login_user(
        &state,
        LoginRequest {
            username,
            password: "wrong".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    Ok(())
}

#[tokio::test]
async fn cart_quantity_overflow_is_bad_request() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let seller = create_user(&state, "seller").await?;
    let buyer = create_user(&state, "buyer").await?;
    let shoe = create_product(&state, seller, "Chuck 70", "Converse", 800, 39.0).await?;

    add(&state, buyer, shoe, i32::MAX).await?;
    let err = cart_service::add_to_cart(
        &state,
        buyer,
        AddToCartRequest {
            product_id: shoe,
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)), "{err:?}");

    let cart = cart_service::list_cart(&state, buyer).await?.data.expect("cart");
    assert_eq!(cart.items[0].quantity, i32::MAX);
    Ok(())
}

#[tokio::test]
async fn order_lines_keep_price_at_creation() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let seller = create_user(&state, "seller").await?;
    let buyer = create_user(&state, "buyer").await?;
    let shoe = create_product(&state, seller, "Gazelle", "Adidas", 100, 42.0).await?;
    add(&state, buyer, shoe, 2).await?;

    let order = order_service::create_order(&state, CreateOrderRequest { buyer_id: buyer })
        .await?
        .data
        .expect("order")
        .order;

    sqlx::query("UPDATE products SET price = 999 WHERE id = $1")
        .bind(shoe)
        .execute(&state.pool)
        .await?;

    let detail = order_service::get_order(&state, order.id)
        .await?
        .data
        .expect("detail");
    assert_eq!(detail.order.order.total_price, 200);
    let line = &detail.order.items[0];
    assert_eq!(line.unit_price, 100);
    assert_eq!(line.product.as_ref().expect("product").price, 999);
    Ok(())
}
