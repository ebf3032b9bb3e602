use shop_server::{Config, Server, ServerState, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境准备 (dotenv, 日志)
    setup_environment()?;

    tracing::info!("Shop server starting...");

    // 2. 加载配置
    let config = Config::from_env();

    // 3. 初始化状态（数据库、支付网关）
    let state = ServerState::initialize(&config)
        .await
        .map_err(|e| anyhow::anyhow!("initialization failed: {e}"))?;

    // 4. 启动 HTTP 服务器
    let server = Server::with_state(config, state);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}
