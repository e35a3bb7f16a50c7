use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use marketplace_api::{
    cache::CatalogCache,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        cart::{AddItemRequest, UpdateItemRequest},
        orders::CheckoutRequest,
        payments::{ProcessPaymentRequest, RefundRequest},
        reviews::CreateReviewRequest,
    },
    entity::{
        products::ActiveModel as ProductActive, stores::ActiveModel as StoreActive,
        users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    routes::admin::UpdateOrderStatusRequest,
    routes::params::Pagination,
    services::{admin_service, cart_service, order_service, payment_service, review_service},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, Statement};
use uuid::Uuid;

// End-to-end: cart arithmetic, checkout snapshot, payment and refund state
// machines, payment history, review rules.
#[tokio::test]
async fn cart_checkout_payment_refund_and_review_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(());
            }
        };

    let _guard = db_guard();
    let state = setup_state(&database_url).await?;

    let user_id = create_user(&state, "user", "user@example.com").await?;
    let seller_id = create_user(&state, "user", "seller@example.com").await?;
    let admin_id = create_user(&state, "admin", "admin@example.com").await?;

    let store_id = create_store(&state, seller_id, "Flow Test Store").await?;
    // 10.00 in minor units
    let product_id = create_product(&state, store_id, "Test Widget", 1000, 10).await?;

    let auth_user = AuthUser {
        user_id,
        role: "user".into(),
    };
    let auth_admin = AuthUser {
        user_id: admin_id,
        role: "admin".into(),
    };

    // Empty cart: nothing exists yet.
    assert!(matches!(
        cart_service::get_cart(&state, &auth_user).await,
        Err(AppError::NotFound)
    ));

    // Add 2 of the product; the cart is created lazily.
    let cart = cart_service::add_item(
        &state,
        &auth_user,
        AddItemRequest {
            product_id,
            quantity: 2,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.total, 2000);

    // Adding the same product again raises the quantity on the same line.
    let cart = cart_service::add_item(
        &state,
        &auth_user,
        AddItemRequest {
            product_id,
            quantity: 3,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 5);
    assert_eq!(cart.total, 5000);

    // Overwriting the quantity recomputes the total.
    let cart = cart_service::update_item_quantity(
        &state,
        &auth_user,
        product_id,
        UpdateItemRequest { quantity: 2 },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.total, 2000);

    // Non-positive quantities are rejected.
    assert!(matches!(
        cart_service::update_item_quantity(
            &state,
            &auth_user,
            product_id,
            UpdateItemRequest { quantity: 0 },
        )
        .await,
        Err(AppError::BadRequest(_))
    ));

    // Removing the line empties the cart; removing again is a no-op.
    let cart = cart_service::remove_item(&state, &auth_user, product_id)
        .await?
        .data
        .unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.total, 0);
    let cart = cart_service::remove_item(&state, &auth_user, product_id)
        .await?
        .data
        .unwrap();
    assert_eq!(cart.total, 0);

    // Clear yields zero regardless of prior state.
    cart_service::add_item(
        &state,
        &auth_user,
        AddItemRequest {
            product_id,
            quantity: 4,
        },
    )
    .await?;
    let cart = cart_service::clear(&state, &auth_user).await?.data.unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.total, 0);

    // Checkout an actual order.
    cart_service::add_item(
        &state,
        &auth_user,
        AddItemRequest {
            product_id,
            quantity: 2,
        },
    )
    .await?;
    let checkout = order_service::checkout(
        &state,
        &auth_user,
        CheckoutRequest {
            shipping_address: "Somewhere 1".into(),
            contact_phone: Some("555-0100".into()),
        },
    )
    .await?
    .data
    .unwrap();
    let order = checkout.order;
    assert_eq!(order.status, "pending");
    assert_eq!(order.total, 2000);
    assert_eq!(checkout.items.len(), 1);
    assert_eq!(checkout.items[0].unit_price, 1000);
    assert_eq!(checkout.items[0].subtotal, 2000);

    // Stock was decremented and the cart emptied in the same transaction.
    let product = marketplace_api::entity::Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(product.stock, 8);
    let cart = cart_service::get_cart(&state, &auth_user).await?.data.unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.total, 0);

    // Card payments need complete card data.
    assert!(matches!(
        payment_service::process_payment(
            &state,
            &auth_user,
            ProcessPaymentRequest {
                order_id: order.id,
                method: "credit_card".into(),
                payment_data: HashMap::from([(
                    "card_number".to_string(),
                    "4111111111111111".to_string()
                )]),
            },
        )
        .await,
        Err(AppError::BadRequest(_))
    ));

    // Unknown methods are rejected before any lookup.
    assert!(matches!(
        payment_service::process_payment(
            &state,
            &auth_user,
            ProcessPaymentRequest {
                order_id: order.id,
                method: "bitcoin".into(),
                payment_data: HashMap::new(),
            },
        )
        .await,
        Err(AppError::BadRequest(_))
    ));

    // Someone else's order cannot be paid.
    let auth_seller = AuthUser {
        user_id: seller_id,
        role: "user".into(),
    };
    assert!(matches!(
        payment_service::process_payment(
            &state,
            &auth_seller,
            ProcessPaymentRequest {
                order_id: order.id,
                method: "cash".into(),
                payment_data: HashMap::new(),
            },
        )
        .await,
        Err(AppError::BadRequest(_))
    ));

    // A proper card payment settles the order.
    let paid = payment_service::process_payment(
        &state,
        &auth_user,
        ProcessPaymentRequest {
            order_id: order.id,
            method: "credit_card".into(),
            payment_data: HashMap::from([
                ("card_number".to_string(), "4111111111111111".to_string()),
                ("cvv".to_string(), "123".to_string()),
            ]),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(paid.order.status, "paid");
    let payment = paid.payment.expect("payment attached to order");
    assert_eq!(payment.amount, 2000);
    assert_eq!(payment.status, "completed");
    let suffix = payment
        .reference
        .strip_prefix("CARD-REF-")
        .expect("card reference prefix");
    assert!(suffix.chars().all(|c| c.is_ascii_digit()));

    // Paying the same order twice fails.
    assert!(matches!(
        payment_service::process_payment(
            &state,
            &auth_user,
            ProcessPaymentRequest {
                order_id: order.id,
                method: "cash".into(),
                payment_data: HashMap::new(),
            },
        )
        .await,
        Err(AppError::BadRequest(_))
    ));

    // History lists exactly the settled payment, with both states.
    let history = payment_service::payment_history(&state, &auth_user)
        .await?
        .data
        .unwrap();
    assert_eq!(history.total_payments, 1);
    assert_eq!(history.payments[0].order_id, order.id);
    assert_eq!(history.payments[0].order_status, "paid");
    assert_eq!(history.payments[0].status, "completed");

    let info = payment_service::get_payment_info(&state, &auth_user, payment.id)
        .await?
        .data
        .unwrap();
    assert_eq!(info.amount, 2000);
    assert_eq!(info.order_id, order.id);

    // Refund: payment refunded, order cancelled; a second refund fails.
    let refund = payment_service::process_refund(
        &state,
        &auth_user,
        payment.id,
        RefundRequest { reason: None },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(refund.status, "refunded");
    assert_eq!(refund.order_status, "cancelled");
    assert!(refund.message.contains("customer-requested refund"));

    assert!(matches!(
        payment_service::process_refund(
            &state,
            &auth_user,
            payment.id,
            RefundRequest {
                reason: Some("changed my mind".into())
            },
        )
        .await,
        Err(AppError::BadRequest(_))
    ));

    // A cancelled order cannot enter fulfillment.
    assert!(matches!(
        admin_service::update_order_status(
            &state,
            &auth_admin,
            order.id,
            UpdateOrderStatusRequest {
                status: "processing".into()
            },
        )
        .await,
        Err(AppError::BadRequest(_))
    ));

    // Reviews: rating bounds, uniqueness, aggregate.
    assert!(matches!(
        review_service::create_review(
            &state,
            &auth_user,
            CreateReviewRequest {
                product_id,
                rating: 6,
                comment: None,
            },
        )
        .await,
        Err(AppError::BadRequest(_))
    ));

    let review = review_service::create_review(
        &state,
        &auth_user,
        CreateReviewRequest {
            product_id,
            rating: 4,
            comment: Some("solid widget".into()),
        },
    )
    .await?
    .data
    .unwrap();

    assert!(matches!(
        review_service::create_review(
            &state,
            &auth_user,
            CreateReviewRequest {
                product_id,
                rating: 5,
                comment: None,
            },
        )
        .await,
        Err(AppError::BadRequest(_))
    ));

    let page = review_service::list_by_product(
        &state,
        product_id,
        Pagination {
            page: Some(1),
            per_page: Some(20),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.average_rating, 4.0);

    // A second reviewer moves the average.
    let auth_other = AuthUser {
        user_id: seller_id,
        role: "user".into(),
    };
    review_service::create_review(
        &state,
        &auth_other,
        CreateReviewRequest {
            product_id,
            rating: 2,
            comment: None,
        },
    )
    .await?;
    let average = review_service::get_average_rating(&state, product_id)
        .await?
        .data
        .unwrap();
    assert_eq!(average.average_rating, Some(3.0));

    review_service::delete_review(&state, &auth_user, review.id).await?;

    Ok(())
}

#[tokio::test]
async fn fulfillment_steps_forward_only() -> anyhow::Result<()> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(());
            }
        };

    let _guard = db_guard();
    let state = setup_state(&database_url).await?;

    let user_id = create_user(&state, "user", "buyer@example.com").await?;
    let seller_id = create_user(&state, "user", "owner@example.com").await?;
    let admin_id = create_user(&state, "admin", "root@example.com").await?;
    let store_id = create_store(&state, seller_id, "Fulfillment Store").await?;
    let product_id = create_product(&state, store_id, "Shippable", 500, 5).await?;

    let auth_user = AuthUser {
        user_id,
        role: "user".into(),
    };
    let auth_admin = AuthUser {
        user_id: admin_id,
        role: "admin".into(),
    };

    cart_service::add_item(
        &state,
        &auth_user,
        AddItemRequest {
            product_id,
            quantity: 1,
        },
    )
    .await?;
    let order = order_service::checkout(
        &state,
        &auth_user,
        CheckoutRequest {
            shipping_address: "Elsewhere 2".into(),
            contact_phone: None,
        },
    )
    .await?
    .data
    .unwrap()
    .order;

    // Fulfillment cannot start before payment.
    assert!(matches!(
        admin_service::update_order_status(
            &state,
            &auth_admin,
            order.id,
            UpdateOrderStatusRequest {
                status: "processing".into()
            },
        )
        .await,
        Err(AppError::BadRequest(_))
    ));

    payment_service::process_payment(
        &state,
        &auth_user,
        ProcessPaymentRequest {
            order_id: order.id,
            method: "cash".into(),
            payment_data: HashMap::new(),
        },
    )
    .await?;

    // Admins cannot set payment or cancellation states directly.
    for status in ["paid", "cancelled", "pending"] {
        assert!(matches!(
            admin_service::update_order_status(
                &state,
                &auth_admin,
                order.id,
                UpdateOrderStatusRequest {
                    status: status.into()
                },
            )
            .await,
            Err(AppError::BadRequest(_))
        ));
    }

    for (next, expected) in [
        ("processing", "processing"),
        ("shipped", "shipped"),
        ("delivered", "delivered"),
    ] {
        let updated = admin_service::update_order_status(
            &state,
            &auth_admin,
            order.id,
            UpdateOrderStatusRequest {
                status: next.into(),
            },
        )
        .await?
        .data
        .unwrap();
        assert_eq!(updated.status, expected);
    }

    // No skipping and no going back.
    assert!(matches!(
        admin_service::update_order_status(
            &state,
            &auth_admin,
            order.id,
            UpdateOrderStatusRequest {
                status: "shipped".into()
            },
        )
        .await,
        Err(AppError::BadRequest(_))
    ));

    // Delivered orders still show up in the payment history.
    let history = payment_service::payment_history(&state, &auth_user)
        .await?
        .data
        .unwrap();
    assert_eq!(history.total_payments, 1);
    assert_eq!(history.payments[0].order_status, "delivered");

    Ok(())
}

// Both tests truncate the same database; run them one at a time.
fn db_guard() -> MutexGuard<'static, ()> {
    static DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    DB_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE payments, order_items, orders, cart_items, carts, reviews, products, categories, stores, audit_logs, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState {
        pool,
        orm,
        cache: CatalogCache::new(100, Duration::from_secs(60)),
    })
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        first_name: Set("Test".into()),
        last_name: Set("User".into()),
        role: Set(role.into()),
        active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn create_store(state: &AppState, owner_id: Uuid, name: &str) -> anyhow::Result<Uuid> {
    let store = StoreActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(None),
        logo_url: Set(None),
        owner_id: Set(owner_id),
        active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(store.id)
}

async fn create_product(
    state: &AppState,
    store_id: Uuid,
    name: &str,
    price: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        store_id: Set(store_id),
        category_id: Set(None),
        name: Set(name.to_string()),
        description: Set(Some("A product for testing".into())),
        image_url: Set(None),
        price: Set(price),
        stock: Set(stock),
        active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(product.id)
}
