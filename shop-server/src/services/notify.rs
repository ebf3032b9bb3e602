//! Customer Notifications
//!
//! 支付成功后的提醒走这里。发送失败只记日志，绝不影响已落库的支付状态。

use async_trait::async_trait;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: &str, title: &str, message: &str) -> anyhow::Result<()>;
}

/// Default notifier: writes the notification to the log stream
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: &str, title: &str, message: &str) -> anyhow::Result<()> {
        tracing::info!(target: "notify", user_id, title, message, "notification dispatched");
        Ok(())
    }
}
