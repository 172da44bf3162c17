use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{ApiKey, ApiKeyValue, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, MeResponse},
        cart::{AddToCartRequest, CartList},
        orders::{AdminOrder, AdminOrderList, CheckoutResponse, OrderList, OrderWithItems},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        users::{RegisterRequest, UpdateUserRequest, UserList, UserPublic},
    },
    middleware::session::SESSION_COOKIE_NAME,
    models::{CartLine, Order, OrderItem, Product},
    response::{ApiResponse, Meta},
    routes::{auth, cart, health, orders, params, products, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "cookie_auth",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(SESSION_COOKIE_NAME))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::logout,
        auth::me,
        users::list_users,
        users::register,
        users::update_user,
        users::delete_user,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        orders::list_orders,
        orders::get_order,
        orders::checkout
    ),
    components(
        schemas(
            Product,
            CartLine,
            Order,
            OrderItem,
            LoginRequest,
            LoginResponse,
            MeResponse,
            RegisterRequest,
            UpdateUserRequest,
            UserPublic,
            UserList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            AddToCartRequest,
            CartList,
            CheckoutResponse,
            OrderList,
            OrderWithItems,
            AdminOrder,
            AdminOrderList,
            params::Pagination,
            params::ProductQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartList>,
            ApiResponse<OrderList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<CheckoutResponse>
        )
    ),
    security(
        ("cookie_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Session authentication"),
        (name = "Users", description = "User accounts"),
        (name = "Products", description = "Product catalog"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Checkout and orders"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
