use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddToCartRequest, CartEntry, CartItemDto, CartList, UpdateQuantityRequest},
        orders::{CheckoutRequest, OrderList, OrderWithItems},
        products,
        sales::SaleList,
        wishlist::{AddWishlistRequest, WishlistProductList},
    },
    models::{Order, OrderItem, OrderKind, Product, RegionalPrice, SaleProduct, User},
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, cart, health, orders, params, products as product_routes, sales, webhook,
        wishlist,
    },
    services::payment_service::WebhookPayload,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_quantity,
        cart::remove_from_cart,
        wishlist::list_wishlist,
        wishlist::add_to_wishlist,
        wishlist::remove_from_wishlist,
        product_routes::list_products,
        product_routes::create_product,
        product_routes::get_product,
        product_routes::update_product,
        product_routes::delete_product,
        sales::list_sales,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        orders::delete_order,
        admin::list_all_orders,
        admin::update_order_status,
        admin::set_rate,
        admin::list_rates,
        webhook::payment_webhook
    ),
    components(
        schemas(
            User,
            Product,
            Order,
            OrderItem,
            OrderKind,
            RegionalPrice,
            SaleProduct,
            AddToCartRequest,
            UpdateQuantityRequest,
            CartEntry,
            CartItemDto,
            CartList,
            AddWishlistRequest,
            WishlistProductList,
            CheckoutRequest,
            OrderList,
            OrderWithItems,
            SaleList,
            WebhookPayload,
            admin::UpdateOrderStatusRequest,
            admin::SetRateRequest,
            admin::RateEntry,
            admin::RateList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::SaleQuery,
            products::ProductList,
            Meta,
            ApiResponse<Product>,
            ApiResponse<products::ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<SaleList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Store product endpoints"),
        (name = "Sales", description = "Ingested sales catalog"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Wishlist", description = "Wishlist endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Admin", description = "Admin endpoints"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Webhooks", description = "Payment gateway callbacks"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
