use axum_shop_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool},
    dto::cart::AddToCartRequest,
    error::AppError,
    middleware::auth::AuthUser,
    services::cart_service,
    state::AppState,
};
use uuid::Uuid;

// Cart reservation properties: stock decrement and line upsert move together,
// the conditional guard rejects over-reservation, and removal is idempotent.

#[tokio::test]
async fn add_decrements_stock_and_increments_line() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = seed_auth_user(&state).await?;
    let product_id = seed_product(&state, 890, 10).await?;

    let line = cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 2,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(line.quantity, 2);
    assert_eq!(line.price, 890);
    assert_eq!(stock_of(&state, product_id).await?, 8);

    // Second add for the same product increments the existing line.
    let line = cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 3,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(line.quantity, 5);
    assert_eq!(stock_of(&state, product_id).await?, 5);

    Ok(())
}

#[tokio::test]
async fn add_with_insufficient_stock_changes_nothing() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = seed_auth_user(&state).await?;
    let product_id = seed_product(&state, 500, 2).await?;

    let err = cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 5,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock));

    assert_eq!(stock_of(&state, product_id).await?, 2);
    assert!(cart_line_quantity(&state, &user, product_id).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn add_unknown_product_is_not_found() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = seed_auth_user(&state).await?;
    let err = cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id: Uuid::new_v4(),
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

#[tokio::test]
async fn remove_missing_line_is_a_noop() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = seed_auth_user(&state).await?;
    let resp = cart_service::remove_from_cart(&state, &user, Uuid::new_v4()).await?;
    assert_eq!(resp.message, "Removed from cart");

    Ok(())
}

#[tokio::test]
async fn remove_then_add_restores_stock_roundtrip() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = seed_auth_user(&state).await?;
    let product_id = seed_product(&state, 750, 10).await?;

    cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 4,
        },
    )
    .await?;
    assert_eq!(stock_of(&state, product_id).await?, 6);

    cart_service::remove_from_cart(&state, &user, product_id).await?;
    assert_eq!(stock_of(&state, product_id).await?, 10);
    assert!(cart_line_quantity(&state, &user, product_id).await?.is_none());

    cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 4,
        },
    )
    .await?;
    assert_eq!(stock_of(&state, product_id).await?, 6);
    assert_eq!(
        cart_line_quantity(&state, &user, product_id).await?,
        Some(4)
    );

    Ok(())
}

#[tokio::test]
async fn concurrent_adds_apply_each_decrement_exactly_once() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = seed_auth_user(&state).await?;
    let product_id = seed_product(&state, 300, 10).await?;

    let state_a = state.clone();
    let state_b = state.clone();
    let user_a = user.clone();
    let user_b = user.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move {
            cart_service::add_to_cart(
                &state_a,
                &user_a,
                AddToCartRequest {
                    product_id,
                    quantity: 3,
                },
            )
            .await
        }),
        tokio::spawn(async move {
            cart_service::add_to_cart(
                &state_b,
                &user_b,
                AddToCartRequest {
                    product_id,
                    quantity: 4,
                },
            )
            .await
        }),
    );
    a?.expect("first concurrent add");
    b?.expect("second concurrent add");

    assert_eq!(stock_of(&state, product_id).await?, 3);
    assert_eq!(
        cart_line_quantity(&state, &user, product_id).await?,
        Some(7)
    );

    Ok(())
}

// Allow skipping when no DB is configured in the environment.
async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    let orm = create_orm_conn(&database_url).await?;
    let config = AppConfig {
        database_url: database_url.clone(),
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_email: None,
        admin_password: None,
        cookie_secure: false,
    };
    Ok(Some(AppState { pool, orm, config }))
}

async fn seed_auth_user(state: &AppState) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    let tag = id.simple().to_string();
    sqlx::query("INSERT INTO users (id, username, email, password_hash) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(format!("cart-user-{tag}"))
        .bind(format!("cart-{tag}@example.com"))
        .bind("test-hash")
        .execute(&state.pool)
        .await?;
    Ok(AuthUser {
        user_id: id,
        is_admin: false,
    })
}

async fn seed_product(state: &AppState, price: i64, stock: i32) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO products (id, title, price, stock) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(format!("Test Widget {}", id.simple()))
        .bind(price)
        .bind(stock)
        .execute(&state.pool)
        .await?;
    Ok(id)
}

async fn stock_of(state: &AppState, product_id: Uuid) -> anyhow::Result<i32> {
    let row: (i32,) = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(row.0)
}

async fn cart_line_quantity(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> anyhow::Result<Option<i32>> {
    let row: Option<(i32,)> =
        sqlx::query_as("SELECT quantity FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user.user_id)
            .bind(product_id)
            .fetch_optional(&state.pool)
            .await?;
    Ok(row.map(|r| r.0))
}
