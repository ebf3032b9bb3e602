use super::*;
use crate::db::DbService;
use crate::db::models::{ProductCreate, VariantInput};
use crate::db::repository::ProductRepository;

/// 测试夹具：一个商品（两个变体，库存 5 / 3），返回商品 id 与变体 id（按 SKU 序）
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

async fn variant_stock(svc: &DbService, variant_id: &str) -> i64 {
    ProductRepository::new(svc.db.clone())
        .find_variant(variant_id)
        .await
        .unwrap()
        .unwrap()
        .stock
}

async fn total_stock(svc: &DbService, product_id: &str) -> i64 {
    ProductRepository::new(svc.db.clone())
        .find_by_id(product_id)
        .await
        .unwrap()
        .unwrap()
        .total_stock
}

fn line(product_id: &str, variant_id: &str, quantity: i64) -> LineItemInput {
    LineItemInput {
        product_id: product_id.to_string(),
        variant_id: variant_id.to_string(),
        quantity,
    }
}

#[tokio::test]
async fn reserve_decrements_stock_and_recomputes_total() {
    let (svc, pid, vids) = setup().await;
    let reconciler = InventoryReconciler::new(svc.db.clone());

    let reservation = reconciler.reserve(&[line(&pid, &vids[0], 2)]).await.unwrap();

    assert_eq!(reservation.lines.len(), 1);
    assert_eq!(reservation.lines[0].sku, "TOTE-BLK");
    assert_eq!(reservation.lines[0].unit_price, 10.0);
    assert_eq!(reservation.total_amount, 20.0);
    assert_eq!(variant_stock(&svc, &vids[0]).await, 3);
    assert_eq!(variant_stock(&svc, &vids[1]).await, 3);
    assert_eq!(total_stock(&svc, &pid).await, 6);
}

#[tokio::test]
async fn reserve_insufficient_leaves_everything_unchanged() {
    let (svc, pid, vids) = setup().await;
    let reconciler = InventoryReconciler::new(svc.db.clone());

    // 第二行超库存，第一行也不能被扣
    let result = reconciler
        .reserve(&[line(&pid, &vids[0], 2), line(&pid, &vids[1], 5)])
        .await;

    assert!(matches!(result, Err(InventoryError::InsufficientStock(_))));
    assert_eq!(variant_stock(&svc, &vids[0]).await, 5);
    assert_eq!(variant_stock(&svc, &vids[1]).await, 3);
    assert_eq!(total_stock(&svc, &pid).await, 8);
}

#[tokio::test]
async fn reserve_then_restore_round_trip() {
    let (svc, pid, vids) = setup().await;
    let reconciler = InventoryReconciler::new(svc.db.clone());
    let lines = [line(&pid, &vids[0], 3), line(&pid, &vids[1], 1)];

    reconciler.reserve(&lines).await.unwrap();
    assert_eq!(total_stock(&svc, &pid).await, 4);

    reconciler.restore(&lines).await.unwrap();
    assert_eq!(variant_stock(&svc, &vids[0]).await, 5);
    assert_eq!(variant_stock(&svc, &vids[1]).await, 3);
    assert_eq!(total_stock(&svc, &pid).await, 8);
}

#[tokio::test]
async fn duplicate_lines_are_merged_before_reserving() {
    let (svc, pid, vids) = setup().await;
    let reconciler = InventoryReconciler::new(svc.db.clone());

    let reservation = reconciler
        .reserve(&[line(&pid, &vids[0], 2), line(&pid, &vids[0], 3)])
        .await
        .unwrap();

    assert_eq!(reservation.lines.len(), 1);
    assert_eq!(reservation.lines[0].quantity, 5);
    assert_eq!(variant_stock(&svc, &vids[0]).await, 0);
}

#[tokio::test]
async fn merged_duplicates_exceeding_stock_fail() {
    let (svc, pid, vids) = setup().await;
    let reconciler = InventoryReconciler::new(svc.db.clone());

    // 3 + 3 合并为 6 > 5
    let result = reconciler
        .reserve(&[line(&pid, &vids[0], 3), line(&pid, &vids[0], 3)])
        .await;

    assert!(matches!(result, Err(InventoryError::InsufficientStock(_))));
    assert_eq!(variant_stock(&svc, &vids[0]).await, 5);
}

#[tokio::test]
async fn reserve_rejects_non_positive_quantities() {
    let (svc, pid, vids) = setup().await;
    let reconciler = InventoryReconciler::new(svc.db.clone());

    let zero = reconciler.reserve(&[line(&pid, &vids[0], 0)]).await;
    assert!(matches!(zero, Err(InventoryError::Validation(_))));

    let negative = reconciler.reserve(&[line(&pid, &vids[0], -1)]).await;
    assert!(matches!(negative, Err(InventoryError::Validation(_))));

    let empty = reconciler.reserve(&[]).await;
    assert!(matches!(empty, Err(InventoryError::Validation(_))));
}

#[tokio::test]
async fn reserve_rejects_unknown_references() {
    let (svc, pid, vids) = setup().await;
    let reconciler = InventoryReconciler::new(svc.db.clone());

    let missing_product = reconciler.reserve(&[line("nope", &vids[0], 1)]).await;
    assert!(matches!(missing_product, Err(InventoryError::NotFound(_))));

    let missing_variant = reconciler.reserve(&[line(&pid, "nope", 1)]).await;
    assert!(matches!(missing_variant, Err(InventoryError::NotFound(_))));
}

#[tokio::test]
async fn variant_must_belong_to_the_named_product() {
    let (svc, pid, vids) = setup().await;
    let repo = ProductRepository::new(svc.db.clone());
    let other = repo
        .create(ProductCreate {
            name: "Mug".into(),
            description: "Ceramic mug".into(),
            category: "kitchen".into(),
            tags: None,
            variants: vec![VariantInput {
                sku: "MUG-01".into(),
                color: None,
                size: None,
                stock: 10,
                price: 4.0,
            }],
            featured: None,
            main_image: None,
        })
        .await
        .unwrap();
    let other_id = other.id.unwrap().id.to_raw();

    let reconciler = InventoryReconciler::new(svc.db.clone());
    let result = reconciler.reserve(&[line(&other_id, &vids[0], 1)]).await;
    assert!(matches!(result, Err(InventoryError::NotFound(_))));

    // 库存没动
    assert_eq!(variant_stock(&svc, &vids[0]).await, 5);
    assert_eq!(total_stock(&svc, &pid).await, 8);
}

#[tokio::test]
async fn admin_adjustments_move_stock_and_total_together() {
    let (svc, pid, vids) = setup().await;
    let reconciler = InventoryReconciler::new(svc.db.clone());

    let after_add = reconciler.add_stock(&pid, &vids[0], 4).await.unwrap();
    assert_eq!(after_add.stock, 9);
    assert_eq!(total_stock(&svc, &pid).await, 12);

    let after_reduce = reconciler.reduce_stock(&pid, &vids[0], 6).await.unwrap();
    assert_eq!(after_reduce.stock, 3);
    assert_eq!(total_stock(&svc, &pid).await, 6);
}

#[tokio::test]
async fn reduce_below_zero_fails_without_applying() {
    let (svc, pid, vids) = setup().await;
    let reconciler = InventoryReconciler::new(svc.db.clone());

    let result = reconciler.reduce_stock(&pid, &vids[1], 4).await;
    assert!(matches!(result, Err(InventoryError::InsufficientStock(_))));
    assert_eq!(variant_stock(&svc, &vids[1]).await, 3);
    assert_eq!(total_stock(&svc, &pid).await, 8);
}

#[tokio::test]
async fn adjustments_reject_non_positive_quantities() {
    let (svc, pid, vids) = setup().await;
    let reconciler = InventoryReconciler::new(svc.db.clone());

    assert!(matches!(
        reconciler.add_stock(&pid, &vids[0], 0).await,
        Err(InventoryError::Validation(_))
    ));
    assert!(matches!(
        reconciler.reduce_stock(&pid, &vids[0], -2).await,
        Err(InventoryError::Validation(_))
    ));
}
