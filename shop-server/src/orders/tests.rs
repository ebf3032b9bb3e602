use super::*;
use crate::auth::Role;
use crate::db::DbService;
use crate::db::models::{ProductCreate, ProductUpdate, VariantInput};
use crate::db::repository::ProductRepository;
use crate::inventory::InventoryReconciler;

fn user(id: &str) -> CurrentUser {
    CurrentUser {
        user_id: id.to_string(),
        role: Role::User,
        email: None,
    }
}

fn admin() -> CurrentUser {
    CurrentUser {
        user_id: "staff".to_string(),
        role: Role::Admin,
        email: None,
    }
}

fn shipping() -> Shipping {
    Shipping {
        country: "GH".into(),
        city: "Accra".into(),
        region: "Greater Accra".into(),
        phone: "+233200000000".into(),
    }
}

/// 夹具：商品（两个变体，库存 5 / 3），返回 db、商品 id、变体 id（按 SKU 序）
async fn setup() -> (DbService, String, Vec<String>) {
    let svc = DbService::memory().await.unwrap();
    let repo = ProductRepository::new(svc.db.clone());
    let product = repo
        .create(ProductCreate {
            name: "Canvas Tote".into(),
            description: "Everyday canvas tote bag".into(),
            category: "bags".into(),
            tags: None,
            variants: vec![
                VariantInput {
                    sku: "TOTE-BLK".into(),
                    color: Some("black".into()),
                    size: None,
                    stock: 5,
                    price: 10.0,
                },
                VariantInput {
                    sku: "TOTE-RED".into(),
                    color: Some("red".into()),
                    size: None,
                    stock: 3,
                    price: 12.5,
                },
            ],
            featured: None,
            main_image: None,
        })
        .await
        .unwrap();
    let product_id = product.id.unwrap().id.to_raw();
    let variant_ids = repo
        .find_variants(&product_id)
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.id.unwrap().id.to_raw())
        .collect();
    (svc, product_id, variant_ids)
}

/// Reserve stock and place an order for the given lines
async fn place_order(
    svc: &DbService,
    user_id: &str,
    lines: &[crate::inventory::LineItemInput],
) -> Order {
    let reservation = InventoryReconciler::new(svc.db.clone())
        .reserve(lines)
        .await
        .unwrap();
    OrderLedger::new(svc.db.clone())
        .create(
            user_id,
            &reservation.lines,
            shipping(),
            PaymentMethod::CashOnDelivery,
            None,
        )
        .await
        .unwrap()
}

fn line(product_id: &str, variant_id: &str, quantity: i64) -> crate::inventory::LineItemInput {
    crate::inventory::LineItemInput {
        product_id: product_id.to_string(),
        variant_id: variant_id.to_string(),
        quantity,
    }
}

fn order_key(order: &Order) -> String {
    order.id.as_ref().unwrap().id.to_raw()
}

async fn total_stock(svc: &DbService, product_id: &str) -> i64 {
    ProductRepository::new(svc.db.clone())
        .find_by_id(product_id)
        .await
        .unwrap()
        .unwrap()
        .total_stock
}

#[test]
fn state_machine_transitions() {
    use OrderStatus::*;
    assert!(Pending.can_transition_to(Processing));
    assert!(Pending.can_transition_to(Cancelled));
    assert!(Processing.can_transition_to(Shipped));
    assert!(Processing.can_transition_to(Cancelled));
    assert!(Shipped.can_transition_to(Delivered));

    assert!(!Pending.can_transition_to(Shipped));
    assert!(!Pending.can_transition_to(Delivered));
    assert!(!Shipped.can_transition_to(Cancelled));
    assert!(!Delivered.can_transition_to(Cancelled));
    assert!(!Cancelled.can_transition_to(Pending));
    assert!(!Processing.can_transition_to(Pending));

    assert!(Delivered.is_terminal());
    assert!(Cancelled.is_terminal());
    assert!(!Shipped.is_terminal());
}

#[tokio::test]
async fn create_snapshots_prices_and_computes_total_once() {
    let (svc, pid, vids) = setup().await;
    let order = place_order(
        &svc,
        "alice",
        &[line(&pid, &vids[0], 2), line(&pid, &vids[1], 1)],
    )
    .await;

    assert_eq!(order.total_amount, 32.5);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.items.len(), 2);

    // 变体改价不影响已有订单的快照与总额
    ProductRepository::new(svc.db.clone())
        .update(
            &pid,
            ProductUpdate {
                name: None,
                description: None,
                category: None,
                tags: None,
                variants: Some(vec![VariantInput {
                    sku: "TOTE-BLK".into(),
                    color: Some("black".into()),
                    size: None,
                    stock: 3,
                    price: 99.0,
                }]),
                featured: None,
                main_image: None,
                is_active: None,
            },
        )
        .await
        .unwrap();

    let reread = OrderLedger::new(svc.db.clone())
        .find_by_id(&order_key(&order))
        .await
        .unwrap();
    assert_eq!(reread.total_amount, 32.5);
    assert_eq!(reread.items[0].unit_price, 10.0);
}

#[tokio::test]
async fn owner_cancel_restores_stock() {
    let (svc, pid, vids) = setup().await;
    let order = place_order(&svc, "alice", &[line(&pid, &vids[0], 2)]).await;
    assert_eq!(total_stock(&svc, &pid).await, 6);

    let ledger = OrderLedger::new(svc.db.clone());
    let cancelled = ledger.cancel(&order_key(&order), &user("alice")).await.unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(total_stock(&svc, &pid).await, 8);
}

#[tokio::test]
async fn cancel_twice_does_not_restore_twice() {
    let (svc, pid, vids) = setup().await;
    let order = place_order(&svc, "alice", &[line(&pid, &vids[0], 2)]).await;
    let ledger = OrderLedger::new(svc.db.clone());
    let key = order_key(&order);

    ledger.cancel(&key, &user("alice")).await.unwrap();
    let second = ledger.cancel(&key, &user("alice")).await;

    assert!(matches!(second, Err(OrderError::InvalidTransition(_))));
    assert_eq!(total_stock(&svc, &pid).await, 8);
}

#[tokio::test]
async fn user_cancel_limited_to_pending() {
    let (svc, pid, vids) = setup().await;
    let order = place_order(&svc, "alice", &[line(&pid, &vids[0], 1)]).await;
    let ledger = OrderLedger::new(svc.db.clone());
    let key = order_key(&order);

    ledger
        .transition(&key, OrderStatus::Processing, &admin())
        .await
        .unwrap();

    let result = ledger.cancel(&key, &user("alice")).await;
    assert!(matches!(result, Err(OrderError::InvalidTransition(_))));

    // 管理员可以取消 Processing 的订单，并回补库存
    let cancelled = ledger.cancel(&key, &admin()).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(total_stock(&svc, &pid).await, 8);
}

#[tokio::test]
async fn delivered_orders_cannot_be_cancelled() {
    let (svc, pid, vids) = setup().await;
    let order = place_order(&svc, "alice", &[line(&pid, &vids[0], 1)]).await;
    let ledger = OrderLedger::new(svc.db.clone());
    let key = order_key(&order);
    let staff = admin();

    ledger.transition(&key, OrderStatus::Processing, &staff).await.unwrap();
    ledger.transition(&key, OrderStatus::Shipped, &staff).await.unwrap();
    ledger.transition(&key, OrderStatus::Delivered, &staff).await.unwrap();

    let result = ledger.cancel(&key, &staff).await;
    assert!(matches!(result, Err(OrderError::InvalidTransition(_))));
    assert_eq!(total_stock(&svc, &pid).await, 7);
}

#[tokio::test]
async fn illegal_transitions_are_rejected() {
    let (svc, pid, vids) = setup().await;
    let order = place_order(&svc, "alice", &[line(&pid, &vids[0], 1)]).await;
    let ledger = OrderLedger::new(svc.db.clone());
    let key = order_key(&order);

    let skip_ahead = ledger.transition(&key, OrderStatus::Shipped, &admin()).await;
    assert!(matches!(skip_ahead, Err(OrderError::InvalidTransition(_))));

    let reread = ledger.find_by_id(&key).await.unwrap();
    assert_eq!(reread.status, OrderStatus::Pending);
}

#[tokio::test]
async fn ownership_gates_viewing_and_cancelling() {
    let (svc, pid, vids) = setup().await;
    let order = place_order(&svc, "alice", &[line(&pid, &vids[0], 1)]).await;
    let ledger = OrderLedger::new(svc.db.clone());
    let key = order_key(&order);

    let view = ledger.find_for_actor(&key, &user("mallory")).await;
    assert!(matches!(view, Err(OrderError::Forbidden(_))));

    let cancel = ledger.cancel(&key, &user("mallory")).await;
    assert!(matches!(cancel, Err(OrderError::Forbidden(_))));

    // 管理员不受所有权限制
    assert!(ledger.find_for_actor(&key, &admin()).await.is_ok());
}

#[tokio::test]
async fn oversell_then_cancel_round_trip() {
    let (svc, pid, vids) = setup().await;
    let reconciler = InventoryReconciler::new(svc.db.clone());

    // 库存 5，单价 10：第一单 3 件成功
    let order = place_order(&svc, "alice", &[line(&pid, &vids[0], 3)]).await;
    assert_eq!(order.total_amount, 30.0);
    let repo = crate::db::repository::ProductRepository::new(svc.db.clone());
    assert_eq!(repo.find_variant(&vids[0]).await.unwrap().unwrap().stock, 2);

    // 第二单再要 3 件：失败，库存保持 2
    let second = reconciler.reserve(&[line(&pid, &vids[0], 3)]).await;
    assert!(matches!(
        second,
        Err(crate::inventory::InventoryError::InsufficientStock(_))
    ));
    assert_eq!(repo.find_variant(&vids[0]).await.unwrap().unwrap().stock, 2);

    // 取消第一单回到 5
    OrderLedger::new(svc.db.clone())
        .cancel(&order_key(&order), &user("alice"))
        .await
        .unwrap();
    assert_eq!(repo.find_variant(&vids[0]).await.unwrap().unwrap().stock, 5);
}

#[tokio::test]
async fn listing_respects_actor_scope() {
    let (svc, pid, vids) = setup().await;
    place_order(&svc, "alice", &[line(&pid, &vids[0], 1)]).await;
    place_order(&svc, "bob", &[line(&pid, &vids[1], 1)]).await;

    let ledger = OrderLedger::new(svc.db.clone());
    let alice_orders = ledger.list_for_actor(&user("alice")).await.unwrap();
    assert_eq!(alice_orders.len(), 1);
    assert_eq!(alice_orders[0].user, "alice");

    let all = ledger.list_for_actor(&admin()).await.unwrap();
    assert_eq!(all.len(), 2);
}
