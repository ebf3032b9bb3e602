//! Payment Repository
//!
//! 支付尝试的持久化。`settle_if_pending` 是确认幂等的序列化点：
//! 只有把 pending 翻成 completed 的那一次调用会拿到返回行，
//! 重复投递的 webhook 拿到空结果后按无操作处理。支付翻转和订单
//! 打款标记在同一个事务里，不存在只改了一半的中间态。

use super::{BaseRepository, RepoError, RepoResult, make_thing, strip_table_prefix};
use crate::db::models::{Payment, PaymentState, PaymentStatus};
use crate::utils::time;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

const PAYMENT_TABLE: &str = "payment";
const NOT_PENDING_MARKER: &str = "payment_not_pending";

#[derive(Clone)]
pub struct PaymentRepository {
    base: BaseRepository,
}

impl PaymentRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Persist a new payment attempt
    pub async fn create(&self, payment: Payment) -> RepoResult<Payment> {
        let created: Option<Payment> =
            self.base.db().create(PAYMENT_TABLE).content(payment).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create payment".to_string()))
    }

    /// Find payment by id
    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Payment>> {
        let pure_id = strip_table_prefix(PAYMENT_TABLE, id);
        let payment: Option<Payment> = self.base.db().select((PAYMENT_TABLE, pure_id)).await?;
        Ok(payment)
    }

    /// Find payment by gateway reference
    pub async fn find_by_transaction(&self, reference: &str) -> RepoResult<Option<Payment>> {
        let payments: Vec<Payment> = self
            .base
            .db()
            .query("SELECT * FROM payment WHERE transaction_id = $ref LIMIT 1")
            .bind(("ref", reference.to_string()))
            .await?
            .take(0)?;
        Ok(payments.into_iter().next())
    }

    /// Payments of a user, newest first
    pub async fn find_by_user(&self, user_id: &str) -> RepoResult<Vec<Payment>> {
        let payments: Vec<Payment> = self
            .base
            .db()
            .query("SELECT * FROM payment WHERE user = $user ORDER BY created_at DESC")
            .bind(("user", user_id.to_string()))
            .await?
            .take(0)?;
        Ok(payments)
    }

    /// All payments, newest first (admin)
    pub async fn find_all(&self) -> RepoResult<Vec<Payment>> {
        let payments: Vec<Payment> = self
            .base
            .db()
            .query("SELECT * FROM payment ORDER BY created_at DESC")
            .await?
            .take(0)?;
        Ok(payments)
    }

    /// Flip the payment referenced by `reference` to `completed` and mark the
    /// linked order as paid, in one transaction, but only if the payment is
    /// still `pending`. Returns the settled row on the first (winning) call
    /// and `None` for every later one; a loser never touches the order.
    pub async fn settle_if_pending(&self, reference: &str) -> RepoResult<Option<Payment>> {
        let sql = format!(
            "BEGIN TRANSACTION;\n\
             LET $p = (UPDATE payment SET status = $completed, updated_at = $now \
             WHERE transaction_id = $ref AND status = $pending RETURN AFTER);\n\
             IF count($p) < 1 {{ THROW '{NOT_PENDING_MARKER}' }};\n\
             UPDATE $p[0].order SET payment_status = $paid, \
             payment_method = $p[0].method, updated_at = $now;\n\
             COMMIT TRANSACTION;"
        );
        let outcome = self
            .base
            .db()
            .query(sql)
            .bind(("ref", reference.to_string()))
            .bind(("completed", PaymentState::Completed))
            .bind(("pending", PaymentState::Pending))
            .bind(("paid", PaymentStatus::Paid))
            .bind(("now", time::now_millis()))
            .await
            .and_then(|r| r.check());
        match outcome {
            Ok(_) => self.find_by_transaction(reference).await,
            Err(e) if e.to_string().contains(NOT_PENDING_MARKER) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Flip to `failed` while still pending; no-op when already settled
    pub async fn fail_if_pending(&self, reference: &str) -> RepoResult<Option<Payment>> {
        let mut result = self
            .base
            .db()
            .query(
                "UPDATE payment SET status = $failed, updated_at = $now \
                 WHERE transaction_id = $ref AND status = $pending RETURN AFTER",
            )
            .bind(("ref", reference.to_string()))
            .bind(("failed", PaymentState::Failed))
            .bind(("pending", PaymentState::Pending))
            .bind(("now", time::now_millis()))
            .await?;
        let payments: Vec<Payment> = result.take(0)?;
        Ok(payments.into_iter().next())
    }

    /// Record that the gateway-confirmed amount disagreed with the order total
    pub async fn flag_amount_mismatch(&self, id: &str) -> RepoResult<()> {
        let thing = make_thing(PAYMENT_TABLE, id);
        self.base
            .db()
            .query("UPDATE $thing SET amount_mismatch = true, updated_at = $now")
            .bind(("thing", thing))
            .bind(("now", time::now_millis()))
            .await?
            .check()?;
        Ok(())
    }

    /// Manual settlement for cash-on-delivery payments (admin action on
    /// delivery confirmation); keyed on the payment id instead of a gateway
    /// reference, same pending-only rule and same single transaction.
    pub async fn settle_cod_if_pending(&self, id: &str) -> RepoResult<Option<Payment>> {
        let thing = make_thing(PAYMENT_TABLE, id);
        let sql = format!(
            "BEGIN TRANSACTION;\n\
             LET $p = (UPDATE $thing SET status = $completed, updated_at = $now \
             WHERE status = $pending RETURN AFTER);\n\
             IF count($p) < 1 {{ THROW '{NOT_PENDING_MARKER}' }};\n\
             UPDATE $p[0].order SET payment_status = $paid, \
             payment_method = $p[0].method, updated_at = $now;\n\
             COMMIT TRANSACTION;"
        );
        let outcome = self
            .base
            .db()
            .query(sql)
            .bind(("thing", thing))
            .bind(("completed", PaymentState::Completed))
            .bind(("pending", PaymentState::Pending))
            .bind(("paid", PaymentStatus::Paid))
            .bind(("now", time::now_millis()))
            .await
            .and_then(|r| r.check());
        match outcome {
            Ok(_) => self.find_by_id(id).await,
            Err(e) if e.to_string().contains(NOT_PENDING_MARKER) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
