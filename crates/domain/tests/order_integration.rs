//! Integration tests for the order lifecycle.
//!
//! These tests drive the services against the in-memory backend and use its
//! failure injection to check rollback and compensation behavior.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use common::{Money, NewProduct, OrderStatus, Product, ProductId, ProductStatus, ProductUpdate};
use domain::{
    Actor, CustomerInfo, DomainError, LineItem, OrderService, PlaceOrder, UpdateOrderStatus,
    ValidationError,
};
use store::{CatalogGateway, CustomerDirectory, InMemoryStore, OrderStore};

fn tomorrow() -> NaiveDate {
    Utc::now().date_naive() + Days::new(1)
}

fn customer() -> CustomerInfo {
    CustomerInfo::new("Camille", "camille@example.com", "555-0142")
}

async fn seed(store: &InMemoryStore, name: &str, cents: i64, stock: u32) -> Product {
    store
        .create_product(NewProduct {
            name: name.to_string(),
            description: None,
            price: Money::from_cents(cents),
            stock,
        })
        .await
        .unwrap()
}

async fn stock_of(store: &InMemoryStore, id: ProductId) -> u32 {
    store.get_product(id).await.unwrap().unwrap().stock
}

fn setup() -> (InMemoryStore, OrderService<InMemoryStore>) {
    let store = InMemoryStore::new();
    let service = OrderService::new(store.clone());
    (store, service)
}

mod creation {
    use super::*;

    #[tokio::test]
    async fn total_is_computed_from_catalog_prices() {
        let (store, service) = setup();
        let baguette = seed(&store, "Baguette", 250, 10).await;
        let croissant = seed(&store, "Croissant", 180, 10).await;

        let order_id = service
            .create_order(
                PlaceOrder::new(
                    customer(),
                    tomorrow(),
                    vec![
                        LineItem::new(baguette.id, 3),
                        LineItem::new(croissant.id, 2),
                    ],
                )
                .with_note("ring twice"),
            )
            .await
            .unwrap();

        let details = service.get_order(order_id).await.unwrap();
        assert_eq!(details.order.status, OrderStatus::Pending);
        assert_eq!(details.order.total_price, Money::from_cents(3 * 250 + 2 * 180));
        assert_eq!(details.order.note, "ring twice");
        assert!(!details.order.paid);
        assert_eq!(details.items.len(), 2);
        assert_eq!(details.items[0].unit_price, Money::from_cents(250));

        assert_eq!(stock_of(&store, baguette.id).await, 7);
        assert_eq!(stock_of(&store, croissant.id).await, 8);
    }

    #[tokio::test]
    async fn catalog_price_changes_do_not_touch_existing_orders() {
        let (store, service) = setup();
        let tart = seed(&store, "Lemon tart", 400, 5).await;

        let order_id = service
            .create_order(PlaceOrder::new(
                customer(),
                tomorrow(),
                vec![LineItem::new(tart.id, 1)],
            ))
            .await
            .unwrap();
        store
            .update_product(
                tart.id,
                ProductUpdate {
                    price: Some(Money::from_cents(900)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let details = service.get_order(order_id).await.unwrap();
        assert_eq!(details.order.total_price, Money::from_cents(400));
    }

    #[tokio::test]
    async fn insufficient_stock_persists_nothing() {
        let (store, service) = setup();
        let bun = seed(&store, "Bun", 100, 5).await;
        let cake = seed(&store, "Cake", 2500, 1).await;

        let result = service
            .create_order(PlaceOrder::new(
                customer(),
                tomorrow(),
                vec![LineItem::new(bun.id, 2), LineItem::new(cake.id, 2)],
            ))
            .await;

        assert!(matches!(
            result,
            Err(DomainError::InsufficientStock { product_id, requested: 2 }) if product_id == cake.id
        ));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.item_count().await, 0);
        assert_eq!(stock_of(&store, bun.id).await, 5);
        assert_eq!(stock_of(&store, cake.id).await, 1);
    }

    #[tokio::test]
    async fn repeated_lines_are_checked_against_combined_quantity() {
        let (store, service) = setup();
        let bun = seed(&store, "Bun", 100, 4).await;

        let result = service
            .create_order(PlaceOrder::new(
                customer(),
                tomorrow(),
                vec![LineItem::new(bun.id, 3), LineItem::new(bun.id, 2)],
            ))
            .await;

        assert!(matches!(
            result,
            Err(DomainError::InsufficientStock { requested: 5, .. })
        ));
        assert_eq!(stock_of(&store, bun.id).await, 4);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found_and_persists_nothing() {
        let (store, service) = setup();
        let bun = seed(&store, "Bun", 100, 5).await;
        let ghost = ProductId::new();

        let result = service
            .create_order(PlaceOrder::new(
                customer(),
                tomorrow(),
                vec![LineItem::new(bun.id, 1), LineItem::new(ghost, 1)],
            ))
            .await;

        assert!(matches!(result, Err(DomainError::ProductNotFound(id)) if id == ghost));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(stock_of(&store, bun.id).await, 5);
    }

    #[tokio::test]
    async fn inactive_product_cannot_be_ordered() {
        let (store, service) = setup();
        let bun = seed(&store, "Bun", 100, 5).await;
        store
            .update_product(
                bun.id,
                ProductUpdate {
                    status: Some(ProductStatus::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let result = service
            .create_order(PlaceOrder::new(
                customer(),
                tomorrow(),
                vec![LineItem::new(bun.id, 1)],
            ))
            .await;

        assert!(matches!(result, Err(DomainError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn validation_errors_have_no_side_effects() {
        let (store, service) = setup();
        let bun = seed(&store, "Bun", 100, 5).await;

        let mut bad_email = customer();
        bad_email.email = "camille.example.com".to_string();
        let cases = [
            PlaceOrder::new(bad_email, tomorrow(), vec![LineItem::new(bun.id, 1)]),
            PlaceOrder::new(customer(), tomorrow(), vec![]),
            PlaceOrder::new(customer(), tomorrow(), vec![LineItem::new(bun.id, 0)]),
            PlaceOrder::new(
                customer(),
                Utc::now().date_naive(),
                vec![LineItem::new(bun.id, 1)],
            ),
        ];

        for cmd in cases {
            let result = service.create_order(cmd).await;
            assert!(matches!(result, Err(DomainError::Validation(_))));
        }
        assert_eq!(store.user_count().await, 0);
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn failed_item_insert_rolls_back_reservation() {
        let (store, service) = setup();
        let bun = seed(&store, "Bun", 100, 5).await;
        store.set_fail_on_item_insert(true);

        let result = service
            .create_order(PlaceOrder::new(
                customer(),
                tomorrow(),
                vec![LineItem::new(bun.id, 2)],
            ))
            .await;

        assert!(matches!(result, Err(DomainError::Persistence(_))));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.item_count().await, 0);
        assert_eq!(stock_of(&store, bun.id).await, 5);
    }

    #[tokio::test]
    async fn customer_lookup_failure_fails_creation() {
        let (store, service) = setup();
        let bun = seed(&store, "Bun", 100, 5).await;
        store.set_fail_on_email_lookup(true);

        let result = service
            .create_order(PlaceOrder::new(
                customer(),
                tomorrow(),
                vec![LineItem::new(bun.id, 1)],
            ))
            .await;

        assert!(matches!(result, Err(DomainError::Persistence(_))));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn repeat_customer_is_not_duplicated() {
        let (store, service) = setup();
        let bun = seed(&store, "Bun", 100, 5).await;

        for _ in 0..2 {
            service
                .create_order(PlaceOrder::new(
                    customer(),
                    tomorrow(),
                    vec![LineItem::new(bun.id, 1)],
                ))
                .await
                .unwrap();
        }

        assert_eq!(store.user_count().await, 1);
        let camille = store
            .get_by_email("camille@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(service.list_orders(Some(camille.id)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn history_failure_does_not_fail_creation() {
        let (store, service) = setup();
        let bun = seed(&store, "Bun", 100, 5).await;
        store.set_fail_on_history(true);

        let order_id = service
            .create_order(PlaceOrder::new(
                customer(),
                tomorrow(),
                vec![LineItem::new(bun.id, 1)],
            ))
            .await
            .unwrap();

        assert!(store.get_by_id(order_id).await.unwrap().is_some());
        assert_eq!(store.history_count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_orders_never_oversell() {
        let (store, service) = setup();
        let service = Arc::new(service);
        let cake = seed(&store, "Birthday cake", 3000, 3).await;

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    service
                        .create_order(PlaceOrder::new(
                            customer(),
                            tomorrow(),
                            vec![LineItem::new(cake.id, 1)],
                        ))
                        .await
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 3);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, DomainError::InsufficientStock { .. }))
        );
        assert_eq!(stock_of(&store, cake.id).await, 0);
        assert_eq!(store.order_count().await, 3);
    }
}

mod status {
    use super::*;

    async fn placed_order(
        store: &InMemoryStore,
        service: &OrderService<InMemoryStore>,
    ) -> (common::OrderId, Product, Product) {
        let a = seed(store, "Pain au chocolat", 210, 10).await;
        let b = seed(store, "Brioche", 520, 10).await;
        let order_id = service
            .create_order(PlaceOrder::new(
                customer(),
                tomorrow(),
                vec![LineItem::new(a.id, 3), LineItem::new(b.id, 2)],
            ))
            .await
            .unwrap();
        (order_id, a, b)
    }

    fn admin() -> Actor {
        Actor::admin(common::UserId::new())
    }

    #[tokio::test]
    async fn full_lifecycle_records_history() {
        let (store, service) = setup();
        let (order_id, _, _) = placed_order(&store, &service).await;
        let actor = admin();

        for status in [
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Delivered,
        ] {
            service
                .update_status(UpdateOrderStatus::new(order_id, status, actor))
                .await
                .unwrap();
        }

        let details = service.get_order(order_id).await.unwrap();
        assert_eq!(details.order.status, OrderStatus::Delivered);

        let history = service.order_history(order_id).await.unwrap();
        let statuses: Vec<_> = history.iter().map(|h| h.status).collect();
        assert_eq!(
            statuses,
            vec![
                OrderStatus::Pending,
                OrderStatus::Preparing,
                OrderStatus::Ready,
                OrderStatus::Delivered
            ]
        );
        assert_eq!(history[1].actor_id, actor.user_id);

        let result = service
            .update_status(UpdateOrderStatus::new(
                order_id,
                OrderStatus::Cancelled,
                actor,
            ))
            .await;
        assert!(matches!(result, Err(DomainError::AlreadyDelivered)));
    }

    #[tokio::test]
    async fn admin_cancellation_reverts_each_line() {
        let (store, service) = setup();
        let (order_id, a, b) = placed_order(&store, &service).await;

        service
            .update_status(UpdateOrderStatus::new(
                order_id,
                OrderStatus::Cancelled,
                admin(),
            ))
            .await
            .unwrap();

        assert_eq!(store.revert_calls(), vec![(a.id, 3), (b.id, 2)]);
        assert_eq!(stock_of(&store, a.id).await, 10);
        assert_eq!(stock_of(&store, b.id).await, 10);

        let history = service.order_history(order_id).await.unwrap();
        assert_eq!(
            history.last().unwrap().action,
            common::HistoryAction::Delete
        );
    }

    #[tokio::test]
    async fn client_cancellation_does_not_revert() {
        let (store, service) = setup();
        let (order_id, a, _) = placed_order(&store, &service).await;

        service
            .update_status(UpdateOrderStatus::new(
                order_id,
                OrderStatus::Cancelled,
                Actor::client(common::UserId::new()),
            ))
            .await
            .unwrap();

        assert!(store.revert_calls().is_empty());
        assert_eq!(stock_of(&store, a.id).await, 7);
        let order = store.get_by_id(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn reversion_failure_reports_error_but_status_stays_cancelled() {
        let (store, service) = setup();
        let (order_id, a, b) = placed_order(&store, &service).await;
        store.fail_revert_for(a.id);

        let result = service
            .update_status(UpdateOrderStatus::new(
                order_id,
                OrderStatus::Cancelled,
                admin(),
            ))
            .await;

        assert!(matches!(
            result,
            Err(DomainError::CompensationFailed { product_id, .. }) if product_id == Some(a.id)
        ));
        let order = store.get_by_id(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(store.revert_calls(), vec![(a.id, 3)]);
        assert_eq!(stock_of(&store, b.id).await, 8);
    }

    #[tokio::test]
    async fn item_load_failure_is_a_compensation_failure() {
        let (store, service) = setup();
        let (order_id, a, _) = placed_order(&store, &service).await;
        store.set_fail_on_item_load(true);

        let result = service
            .update_status(UpdateOrderStatus::new(
                order_id,
                OrderStatus::Cancelled,
                admin(),
            ))
            .await;

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            DomainError::CompensationFailed { order_id: id, product_id: None, .. } if id == order_id
        ));
        assert_eq!(err.kind(), domain::ErrorKind::Internal);
        let order = store.get_by_id(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(store.revert_calls().is_empty());
        assert_eq!(stock_of(&store, a.id).await, 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_leave_status_once() {
        let store = InMemoryStore::new();
        let service = Arc::new(OrderService::new(store.clone()));
        let (order_id, a, b) = placed_order(&store, &service).await;
        for status in [OrderStatus::Preparing, OrderStatus::Ready] {
            service
                .update_status(UpdateOrderStatus::new(order_id, status, admin()))
                .await
                .unwrap();
        }

        let handles: Vec<_> = [
            OrderStatus::Cancelled,
            OrderStatus::Cancelled,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ]
        .into_iter()
        .map(|target| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .update_status(UpdateOrderStatus::new(order_id, target, admin()))
                    .await
            })
        })
        .collect();

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => succeeded += 1,
                Err(e) => assert!(matches!(
                    e,
                    DomainError::AlreadyCancelled | DomainError::AlreadyDelivered
                )),
            }
        }
        assert_eq!(succeeded, 1);

        let order = store.get_by_id(order_id).await.unwrap().unwrap();
        if order.status == OrderStatus::Cancelled {
            assert_eq!(store.revert_calls(), vec![(a.id, 3), (b.id, 2)]);
        } else {
            assert_eq!(order.status, OrderStatus::Delivered);
            assert!(store.revert_calls().is_empty());
        }
    }

    #[tokio::test]
    async fn status_write_failure_is_reported() {
        let (store, service) = setup();
        let (order_id, _, _) = placed_order(&store, &service).await;
        store.set_fail_on_status_update(true);

        let result = service
            .update_status(UpdateOrderStatus::new(
                order_id,
                OrderStatus::Cancelled,
                admin(),
            ))
            .await;

        assert!(matches!(result, Err(DomainError::StatusUpdateFailed(_))));
        assert!(store.revert_calls().is_empty());
    }

    #[tokio::test]
    async fn history_failure_does_not_fail_update() {
        let (store, service) = setup();
        let (order_id, _, _) = placed_order(&store, &service).await;
        store.set_fail_on_history(true);

        service
            .update_status(UpdateOrderStatus::new(
                order_id,
                OrderStatus::Preparing,
                admin(),
            ))
            .await
            .unwrap();

        let order = store.get_by_id(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Preparing);
        assert_eq!(store.history_count().await, 1);
    }

    #[tokio::test]
    async fn invalid_transitions_leave_order_untouched() {
        let (store, service) = setup();
        let (order_id, _, _) = placed_order(&store, &service).await;

        for target in [OrderStatus::Pending, OrderStatus::Ready, OrderStatus::Delivered] {
            let result = service
                .update_status(UpdateOrderStatus::new(order_id, target, admin()))
                .await;
            assert!(matches!(
                result,
                Err(DomainError::InvalidTransition { from: OrderStatus::Pending, to }) if to == target
            ));
        }

        let order = store.get_by_id(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(store.history_count().await, 1);
    }

    #[tokio::test]
    async fn cancelled_order_reports_already_cancelled() {
        let (store, service) = setup();
        let (order_id, _, _) = placed_order(&store, &service).await;
        service
            .update_status(UpdateOrderStatus::new(
                order_id,
                OrderStatus::Cancelled,
                admin(),
            ))
            .await
            .unwrap();

        let result = service
            .update_status(UpdateOrderStatus::new(
                order_id,
                OrderStatus::Preparing,
                admin(),
            ))
            .await;

        assert!(matches!(result, Err(DomainError::AlreadyCancelled)));
        assert_eq!(store.revert_calls().len(), 2);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let (_, service) = setup();
        let missing = common::OrderId::new();

        let result = service
            .update_status(UpdateOrderStatus::new(
                missing,
                OrderStatus::Preparing,
                admin(),
            ))
            .await;
        assert!(matches!(result, Err(DomainError::OrderNotFound(id)) if id == missing));

        assert!(matches!(
            service.get_order(missing).await,
            Err(DomainError::OrderNotFound(_))
        ));
        assert!(matches!(
            service.order_history(missing).await,
            Err(DomainError::OrderNotFound(_))
        ));
    }
}

#[test]
fn validation_error_is_exposed() {
    let err = DomainError::from(ValidationError::NoItems);
    assert_eq!(err.to_string(), "Validation failed: Order has no items");
}
