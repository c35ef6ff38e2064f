use shoetrade_api::{
    config::AppConfig,
    db::{DbPool, create_pool, run_migrations},
    services::user_service::hash_password,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let seller_id = ensure_user(&pool, "sneakerhead", "seller@example.com", "seller123").await?;
    let buyer_id = ensure_user(&pool, "buyer", "buyer@example.com", "buyer123").await?;
    seed_products(&pool, seller_id).await?;

    println!("Seed completed. Seller ID: {seller_id}, Buyer ID: {buyer_id}");
    Ok(())
}

async fn ensure_user(
    pool: &DbPool,
    username: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, username, email, password_hash)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (username) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .fetch_optional(pool)
    .await?;

    // already seeded
    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE username = $1")
                .bind(username)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    Ok(user_id)
}

async fn seed_products(pool: &DbPool, seller_id: Uuid) -> anyhow::Result<()> {
    let (listed,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE seller_id = $1")
        .bind(seller_id)
        .fetch_one(pool)
        .await?;
    if listed > 0 {
        println!("Products already seeded");
        return Ok(());
    }

    let products = vec![
        ("Air Jordan 1 Retro High", "Nike", 2_450_000_i64, 42.0_f64, "Chicago colorway, worn twice", true),
        ("Samba OG", "Adidas", 1_350_000, 41.0, "Cloud white, box included", false),
        ("990v5", "New Balance", 1_800_000, 43.5, "Grey suede, light creasing", true),
        ("Old Skool", "Vans", 650_000, 40.0, "Black canvas, new laces", false),
        ("Gel-Kayano 14", "Asics", 1_600_000, 44.0, "Silver cream, deadstock", true),
    ];

    for (name, brand, price, size, description, verified) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, brand, price, size, description, images, seller_id, verified)
            VALUES ($1, $2, $3, $4, $5, $6, '[]'::jsonb, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(brand)
        .bind(price)
        .bind(size)
        .bind(description)
        .bind(seller_id)
        .bind(verified)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
