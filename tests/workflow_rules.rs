use std::collections::HashMap;
use std::time::Duration;

use marketplace_api::cache::{self, CatalogCache, scope};
use marketplace_api::models::{OrderStatus, PaymentMethod, PaymentStatus};
use marketplace_api::routes::params::Pagination;
use marketplace_api::services::payment_service::{build_payment_reference, validate_payment_data};

#[test]
fn payment_references_carry_the_method_prefix() {
    assert_eq!(
        build_payment_reference(PaymentMethod::CreditCard, 1700000000000),
        "CARD-REF-1700000000000"
    );
    assert_eq!(
        build_payment_reference(PaymentMethod::DebitCard, 1),
        "CARD-REF-1"
    );
    assert_eq!(
        build_payment_reference(PaymentMethod::Transfer, 2),
        "TRANS-REF-2"
    );
    assert_eq!(build_payment_reference(PaymentMethod::Paypal, 3), "PP-REF-3");
    assert_eq!(build_payment_reference(PaymentMethod::Cash, 4), "CASH-REF-4");
}

#[test]
fn card_references_end_in_digits() {
    let reference = build_payment_reference(PaymentMethod::CreditCard, 1700000000000);
    let suffix = reference.strip_prefix("CARD-REF-").expect("prefix");
    assert!(!suffix.is_empty());
    assert!(suffix.chars().all(|c| c.is_ascii_digit()));
}

#[test]
fn card_payments_require_card_number_and_cvv() {
    let mut data = HashMap::new();
    assert!(validate_payment_data(PaymentMethod::CreditCard, &data).is_err());

    data.insert("card_number".to_string(), "4111111111111111".to_string());
    assert!(validate_payment_data(PaymentMethod::CreditCard, &data).is_err());
    assert!(validate_payment_data(PaymentMethod::DebitCard, &data).is_err());

    data.insert("cvv".to_string(), "123".to_string());
    assert!(validate_payment_data(PaymentMethod::CreditCard, &data).is_ok());
    assert!(validate_payment_data(PaymentMethod::DebitCard, &data).is_ok());
}

#[test]
fn non_card_payments_take_any_data() {
    let empty = HashMap::new();
    assert!(validate_payment_data(PaymentMethod::Transfer, &empty).is_ok());
    assert!(validate_payment_data(PaymentMethod::Paypal, &empty).is_ok());
    assert!(validate_payment_data(PaymentMethod::Cash, &empty).is_ok());
}

#[test]
fn unknown_payment_methods_do_not_parse() {
    assert_eq!(PaymentMethod::parse("credit_card"), Some(PaymentMethod::CreditCard));
    assert_eq!(PaymentMethod::parse("cash"), Some(PaymentMethod::Cash));
    assert_eq!(PaymentMethod::parse("bitcoin"), None);
    assert_eq!(PaymentMethod::parse(""), None);
}

#[test]
fn order_status_round_trips_through_strings() {
    for status in [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ] {
        assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(OrderStatus::parse("unknown"), None);
}

#[test]
fn order_status_only_moves_forward() {
    use OrderStatus::*;

    assert!(Pending.can_transition_to(Paid));
    assert!(Paid.can_transition_to(Processing));
    assert!(Processing.can_transition_to(Shipped));
    assert!(Shipped.can_transition_to(Delivered));

    // Cancellation is only reachable before fulfillment starts.
    assert!(Pending.can_transition_to(Cancelled));
    assert!(Paid.can_transition_to(Cancelled));
    assert!(!Processing.can_transition_to(Cancelled));
    assert!(!Delivered.can_transition_to(Cancelled));

    assert!(!Pending.can_transition_to(Processing));
    assert!(!Pending.can_transition_to(Shipped));
    assert!(!Paid.can_transition_to(Pending));
    assert!(!Delivered.can_transition_to(Shipped));
    assert!(!Cancelled.can_transition_to(Paid));
}

#[test]
fn payment_status_parses_known_states_only() {
    assert_eq!(PaymentStatus::parse("pending"), Some(PaymentStatus::Pending));
    assert_eq!(
        PaymentStatus::parse("completed"),
        Some(PaymentStatus::Completed)
    );
    assert_eq!(
        PaymentStatus::parse("refunded"),
        Some(PaymentStatus::Refunded)
    );
    assert_eq!(PaymentStatus::parse("failed"), None);
}

#[test]
fn pagination_normalizes_bounds() {
    let default = Pagination {
        page: None,
        per_page: None,
    };
    assert_eq!(default.normalize(), (1, 20, 0));

    let second_page = Pagination {
        page: Some(2),
        per_page: Some(10),
    };
    assert_eq!(second_page.normalize(), (2, 10, 10));

    let out_of_range = Pagination {
        page: Some(0),
        per_page: Some(1000),
    };
    assert_eq!(out_of_range.normalize(), (1, 100, 0));

    let negative = Pagination {
        page: Some(-3),
        per_page: Some(0),
    };
    assert_eq!(negative.normalize(), (1, 1, 0));
}

#[test]
fn cache_returns_what_was_put() {
    let cache = CatalogCache::new(10, Duration::from_secs(60));
    cache.put("product:1", &"widget".to_string());

    assert_eq!(
        cache.get::<String>("product:1"),
        Some("widget".to_string())
    );
    assert_eq!(cache.get::<String>("product:2"), None);

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.entries, 1);
}

#[test]
fn cache_entries_expire() {
    let cache = CatalogCache::new(10, Duration::from_millis(0));
    cache.put("recent_products", &vec![1, 2, 3]);
    std::thread::sleep(Duration::from_millis(5));

    assert_eq!(cache.get::<Vec<i32>>("recent_products"), None);
    assert_eq!(cache.stats().entries, 0);
}

#[test]
fn cache_scope_invalidation_is_prefix_bounded() {
    let cache = CatalogCache::new(10, Duration::from_secs(60));
    cache.put(cache::key(scope::PRODUCTS, "1_20"), &1);
    cache.put(cache::key(scope::PRODUCTS, "2_20"), &2);
    cache.put(cache::key(scope::STORE_PRODUCTS, "abc:1_20"), &3);
    cache.put(scope::RECENT_PRODUCTS, &4);

    cache.invalidate_scope(scope::PRODUCTS);

    assert_eq!(cache.get::<i32>(&cache::key(scope::PRODUCTS, "1_20")), None);
    assert_eq!(cache.get::<i32>(&cache::key(scope::PRODUCTS, "2_20")), None);
    // Other scopes are untouched.
    assert_eq!(
        cache.get::<i32>(&cache::key(scope::STORE_PRODUCTS, "abc:1_20")),
        Some(3)
    );
    assert_eq!(cache.get::<i32>(scope::RECENT_PRODUCTS), Some(4));
}

#[test]
fn cache_invalidates_a_single_store_scope() {
    let cache = CatalogCache::new(10, Duration::from_secs(60));
    cache.put(cache::key(scope::STORE_PRODUCTS, "a:1_20"), &1);
    cache.put(cache::key(scope::STORE_PRODUCTS, "b:1_20"), &2);

    cache.invalidate_scope(&cache::key(scope::STORE_PRODUCTS, "a"));

    assert_eq!(
        cache.get::<i32>(&cache::key(scope::STORE_PRODUCTS, "a:1_20")),
        None
    );
    assert_eq!(
        cache.get::<i32>(&cache::key(scope::STORE_PRODUCTS, "b:1_20")),
        Some(2)
    );
}

#[test]
fn cache_capacity_evicts_oldest() {
    let cache = CatalogCache::new(2, Duration::from_secs(60));
    cache.put("product:1", &1);
    std::thread::sleep(Duration::from_millis(2));
    cache.put("product:2", &2);
    std::thread::sleep(Duration::from_millis(2));
    cache.put("product:3", &3);

    let stats = cache.stats();
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.evictions, 1);
    assert_eq!(cache.get::<i32>("product:1"), None);
    assert_eq!(cache.get::<i32>("product:3"), Some(3));
}

#[test]
fn cache_overwrite_does_not_evict() {
    let cache = CatalogCache::new(2, Duration::from_secs(60));
    cache.put("product:1", &1);
    cache.put("product:2", &2);
    cache.put("product:2", &20);

    let stats = cache.stats();
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.evictions, 0);
    assert_eq!(cache.get::<i32>("product:2"), Some(20));
}
