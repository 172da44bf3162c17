use axum_shop_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool},
    dto::{cart::AddToCartRequest, products::UpdateProductRequest, users::RegisterRequest},
    entity::cart_items,
    error::AppError,
    middleware::auth::{AdminUser, AuthUser},
    services::{admin_service, cart_service, order_service, product_service, user_service},
    state::AppState,
};
use uuid::Uuid;

// Checkout engine properties: the cart-to-order transition, the snapshot
// pricing policy, and the registration/identity invariants around it.

#[test]
fn total_is_quantity_times_snapshot_price() {
    let lines = vec![
        cart_line(2, 500),
        cart_line(1, 1000),
    ];
    assert_eq!(order_service::compute_total(&lines), 2000);
}

#[tokio::test]
async fn checkout_on_empty_cart_creates_no_order() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = seed_auth_user(&state).await?;
    let err = order_service::checkout(&state, &user).await.unwrap_err();
    assert!(matches!(err, AppError::EmptyCart));

    let orders: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(orders.0, 0);

    Ok(())
}

#[tokio::test]
async fn checkout_writes_order_and_clears_cart() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = seed_auth_user(&state).await?;
    let first = seed_product(&state, 500, 10).await?;
    let second = seed_product(&state, 1000, 10).await?;

    cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id: first,
            quantity: 2,
        },
    )
    .await?;
    cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id: second,
            quantity: 1,
        },
    )
    .await?;

    let receipt = order_service::checkout(&state, &user).await?.data.unwrap();
    assert_eq!(receipt.total, 2000);

    let lines: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(lines.0, 0, "cart must be empty after checkout");

    let detail = order_service::get_order(&state, &user, receipt.order_id)
        .await?
        .data
        .unwrap();
    assert_eq!(detail.order.total, 2000);
    assert_eq!(detail.items.len(), 2);
    // Items keep the cart's insertion order.
    assert_eq!(detail.items[0].product_id, first);
    assert_eq!(detail.items[1].product_id, second);

    Ok(())
}

#[tokio::test]
async fn checkout_honors_price_captured_at_add_time() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = seed_auth_user(&state).await?;
    let product_id = seed_product(&state, 500, 5).await?;

    cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 1,
        },
    )
    .await?;

    // Catalog price changes after the line was added.
    let admin = AdminUser { user_id: None };
    product_service::update_product(
        &state,
        &admin,
        product_id,
        UpdateProductRequest {
            price: Some(999),
            ..Default::default()
        },
    )
    .await?;

    let receipt = order_service::checkout(&state, &user).await?.data.unwrap();
    assert_eq!(receipt.total, 500);

    Ok(())
}

#[tokio::test]
async fn partial_product_update_keeps_omitted_fields() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let product_id = seed_product(&state, 800, 7).await?;
    let admin = AdminUser { user_id: None };
    let updated = product_service::update_product(
        &state,
        &admin,
        product_id,
        UpdateProductRequest {
            price: Some(650),
            ..Default::default()
        },
    )
    .await?
    .data
    .unwrap();

    assert_eq!(updated.price, 650);
    assert_eq!(updated.stock, 7);
    assert!(updated.title.starts_with("Test Widget"));

    Ok(())
}

#[tokio::test]
async fn duplicate_email_registration_conflicts() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let tag = Uuid::new_v4().simple().to_string();
    let email = format!("dup-{tag}@example.com");

    user_service::register(
        &state,
        RegisterRequest {
            username: format!("dup-a-{tag}"),
            email: email.clone(),
            password: "secret1".to_string(),
        },
    )
    .await?;

    let err = user_service::register(
        &state,
        RegisterRequest {
            username: format!("dup-b-{tag}"),
            email,
            password: "secret2".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

#[tokio::test]
async fn deleted_user_fails_the_existence_gate() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = seed_auth_user(&state).await?;
    assert!(user_service::user_exists(&state.pool, user.user_id).await?);

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    // The per-request existence lookup is what invalidates a live session.
    assert!(!user_service::user_exists(&state.pool, user.user_id).await?);

    Ok(())
}

#[tokio::test]
async fn admin_listing_falls_back_to_user_id_for_deleted_owner() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = seed_auth_user(&state).await?;
    let product_id = seed_product(&state, 400, 3).await?;
    cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 1,
        },
    )
    .await?;
    let receipt = order_service::checkout(&state, &user).await?.data.unwrap();

    let page = axum_shop_api::routes::params::Pagination {
        page: Some(1),
        per_page: Some(100),
    };
    let listed = admin_service::list_all_orders(&state, page).await?.data.unwrap();
    let row = listed
        .items
        .iter()
        .find(|o| o.id == receipt.order_id)
        .expect("fresh order on first page");
    assert!(row.username.starts_with("order-user-"));

    // Owner disappears; the order survives and the display name degrades to
    // the raw user id.
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    let page = axum_shop_api::routes::params::Pagination {
        page: Some(1),
        per_page: Some(100),
    };
    let listed = admin_service::list_all_orders(&state, page).await?.data.unwrap();
    let row = listed
        .items
        .iter()
        .find(|o| o.id == receipt.order_id)
        .expect("order survives owner deletion");
    assert_eq!(row.username, user.user_id.to_string());

    Ok(())
}

fn cart_line(quantity: i32, price: i64) -> cart_items::Model {
    cart_items::Model {
        user_id: Uuid::new_v4(),
        product_id: Uuid::new_v4(),
        quantity,
        title: "line".to_string(),
        price,
        added_at: chrono::Utc::now().fixed_offset(),
    }
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
        .bind(format!("order-user-{tag}"))
        .bind(format!("order-{tag}@example.com"))
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
