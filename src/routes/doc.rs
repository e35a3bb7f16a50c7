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
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddItemRequest, UpdateItemRequest},
        categories::{CategoryList, CreateCategoryRequest},
        orders::{CheckoutRequest, OrderDetail, OrderList},
        payments::{PaymentHistory, ProcessPaymentRequest, RefundRequest, RefundSummary},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        reviews::{
            AverageRating, CreateReviewRequest, ProductReviews, ReviewList, UpdateReviewRequest,
        },
        stores::{CreateStoreRequest, StoreList, UpdateStoreRequest},
    },
    models::{
        Cart, CartItem, Category, Order, OrderItem, Payment, PaymentRecord, Product, Review,
        Store, User,
    },
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, cart, categories, health, orders, params, payments,
        products as product_routes, reviews, stores,
    },
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
        auth::register,
        auth::login,
        auth::me,
        product_routes::list_products,
        product_routes::search_products,
        product_routes::recent_products,
        product_routes::get_product,
        product_routes::create_product,
        product_routes::update_product,
        product_routes::delete_product,
        categories::list_categories,
        categories::get_category,
        categories::category_products,
        categories::create_category,
        stores::list_stores,
        stores::get_store,
        stores::store_products,
        stores::stores_by_owner,
        stores::create_store,
        stores::update_store,
        stores::deactivate_store,
        cart::get_cart,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        cart::clear_cart,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        payments::process_payment,
        payments::payment_history,
        payments::get_payment_info,
        payments::process_refund,
        reviews::create_review,
        reviews::update_review,
        reviews::delete_review,
        reviews::list_by_product,
        reviews::average_rating,
        reviews::list_by_user
    ),
    components(
        schemas(
            User,
            Store,
            Category,
            Product,
            Cart,
            CartItem,
            Order,
            OrderItem,
            Payment,
            PaymentRecord,
            Review,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateStoreRequest,
            UpdateStoreRequest,
            StoreList,
            CreateCategoryRequest,
            CategoryList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            AddItemRequest,
            UpdateItemRequest,
            CheckoutRequest,
            OrderDetail,
            OrderList,
            ProcessPaymentRequest,
            RefundRequest,
            PaymentHistory,
            RefundSummary,
            CreateReviewRequest,
            UpdateReviewRequest,
            ReviewList,
            ProductReviews,
            AverageRating,
            admin::ProductList,
            admin::UpdateOrderStatusRequest,
            admin::InventoryAdjustRequest,
            params::Pagination,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Cart>,
            ApiResponse<OrderDetail>,
            ApiResponse<OrderList>,
            ApiResponse<PaymentHistory>,
            ApiResponse<ProductReviews>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Product catalog endpoints"),
        (name = "Categories", description = "Category endpoints"),
        (name = "Stores", description = "Store endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Payments", description = "Payment endpoints"),
        (name = "Reviews", description = "Review endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
