use super::*;
use crate::auth::{CurrentUser, Role};
use crate::db::DbService;
use crate::db::models::{PaymentMethod, ProductCreate, Shipping, VariantInput};
use crate::inventory::{InventoryReconciler, LineItemInput};
use crate::orders::OrderLedger;

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

/// 夹具：单变体商品（库存 20，单价 10），返回 db、商品 id、变体 id
async fn setup() -> (DbService, String, String) {
    let svc = DbService::memory().await.unwrap();
    let product = crate::db::repository::ProductRepository::new(svc.db.clone())
        .create(ProductCreate {
            name: "Canvas Tote".into(),
            description: "Everyday canvas tote bag".into(),
            category: "bags".into(),
            tags: None,
            variants: vec![VariantInput {
                sku: "TOTE-BLK".into(),
                color: None,
                size: None,
                stock: 20,
                price: 10.0,
            }],
            featured: None,
            main_image: None,
        })
        .await
        .unwrap();
    let pid = product.id.unwrap().id.to_raw();
    let vid = crate::db::repository::ProductRepository::new(svc.db.clone())
        .find_variants(&pid)
        .await
        .unwrap()[0]
        .id
        .clone()
        .unwrap()
        .id
        .to_raw();
    (svc, pid, vid)
}

async fn place_order(svc: &DbService, pid: &str, vid: &str, quantity: i64) -> String {
    let reservation = InventoryReconciler::new(svc.db.clone())
        .reserve(&[LineItemInput {
            product_id: pid.to_string(),
            variant_id: vid.to_string(),
            quantity,
        }])
        .await
        .unwrap();
    let order = OrderLedger::new(svc.db.clone())
        .create(
            "alice",
            &reservation.lines,
            shipping(),
            PaymentMethod::CashOnDelivery,
            None,
        )
        .await
        .unwrap();
    order.id.unwrap().id.to_raw()
}

#[tokio::test]
async fn report_excludes_cancelled_orders_entirely() {
    let (svc, pid, vid) = setup().await;
    place_order(&svc, &pid, &vid, 2).await; // 20.00
    place_order(&svc, &pid, &vid, 3).await; // 30.00
    let cancelled = place_order(&svc, &pid, &vid, 4).await; // 不计入营收

    OrderLedger::new(svc.db.clone())
        .cancel(&cancelled, &admin())
        .await
        .unwrap();

    let report = StatsAggregator::new(svc.db.clone())
        .report(StatsRange::default())
        .await
        .unwrap();

    assert_eq!(report.total_orders, 2);
    assert_eq!(report.total_revenue, 50.0);
    assert_eq!(report.total_items_sold, 5);

    let count_for = |status: &str| {
        report
            .status_counts
            .iter()
            .find(|c| c.status == status)
            .map(|c| c.count)
            .unwrap_or(0)
    };
    assert_eq!(count_for("Pending"), 2);
    assert_eq!(count_for("Cancelled"), 0);

    assert_eq!(report.product_sales.len(), 1);
    assert_eq!(report.product_sales[0].name, "Canvas Tote");
    assert_eq!(report.product_sales[0].quantity_sold, 5);
}

#[tokio::test]
async fn monthly_buckets_sum_to_totals() {
    let (svc, pid, vid) = setup().await;
    place_order(&svc, &pid, &vid, 1).await;
    place_order(&svc, &pid, &vid, 2).await;

    let report = StatsAggregator::new(svc.db.clone())
        .report(StatsRange::default())
        .await
        .unwrap();

    assert_eq!(report.monthly.len(), 12);
    assert_eq!(report.monthly[0].month, "Jan");

    let orders: u64 = report.monthly.iter().map(|m| m.orders).sum();
    let revenue: f64 = report.monthly.iter().map(|m| m.revenue).sum();
    assert_eq!(orders, report.total_orders);
    assert_eq!(revenue, report.total_revenue);
}

#[tokio::test]
async fn range_filters_by_created_at() {
    let (svc, pid, vid) = setup().await;
    place_order(&svc, &pid, &vid, 2).await;

    let aggregator = StatsAggregator::new(svc.db.clone());

    // 只看过去：什么都不算
    let past = aggregator
        .report(StatsRange {
            start: None,
            end: Some(0),
        })
        .await
        .unwrap();
    assert_eq!(past.total_orders, 0);
    assert_eq!(past.total_revenue, 0.0);

    // 覆盖当前时刻的窗口能看到订单
    let now = crate::utils::time::now_millis();
    let around_now = aggregator
        .report(StatsRange {
            start: Some(now - 60_000),
            end: Some(now + 60_000),
        })
        .await
        .unwrap();
    assert_eq!(around_now.total_orders, 1);
    assert_eq!(around_now.total_revenue, 20.0);
}
