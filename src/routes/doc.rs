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
        auth::{
            RequestResetRequest, ResetPasswordRequest, SessionResponse, SigninRequest,
            SignupRequest,
        },
        cart::{AddToCartRequest, CartView},
        items::{CreateItemRequest, ItemList, UpdateItemRequest},
        orders::{ChargeList, CheckoutRequest, OrderList},
        users::{UpdatePermissionsRequest, UserList},
    },
    models::{
        CartItem, CartLine, ChargeRecord, ChargeStatus, Item, Order, OrderItem, OrderWithItems,
        Permission, User,
    },
    response::{ApiResponse, MessageData, Meta},
    routes::{admin, auth, cart, health, items, orders, params, users},
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
        auth::signup,
        auth::signin,
        auth::signout,
        auth::request_reset,
        auth::reset_password,
        auth::me,
        items::list_items,
        items::get_item,
        items::create_item,
        items::update_item,
        items::delete_item,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        users::list_users,
        users::update_permissions,
        admin::pending_charges
    ),
    components(
        schemas(
            User,
            Permission,
            Item,
            CartItem,
            CartLine,
            Order,
            OrderItem,
            OrderWithItems,
            ChargeRecord,
            ChargeStatus,
            SignupRequest,
            SigninRequest,
            SessionResponse,
            RequestResetRequest,
            ResetPasswordRequest,
            CreateItemRequest,
            UpdateItemRequest,
            ItemList,
            AddToCartRequest,
            CartView,
            CheckoutRequest,
            OrderList,
            ChargeList,
            UpdatePermissionsRequest,
            UserList,
            MessageData,
            params::Pagination,
            params::ItemQuery,
            Meta,
            ApiResponse<Item>,
            ApiResponse<ItemList>,
            ApiResponse<CartView>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<SessionResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Sessions, sign up and password reset"),
        (name = "Items", description = "Catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Checkout and order history"),
        (name = "Users", description = "User and permission management"),
        (name = "Admin", description = "Charge reconciliation"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
