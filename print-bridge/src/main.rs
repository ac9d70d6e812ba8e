use print_bridge::{AppState, Config, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境变量 (.env 可选)
    dotenv::dotenv().ok();

    // 2. 加载配置与日志
    let config = Config::from_env();
    setup_environment(&config)?;

    tracing::info!(
        work_dir = %config.work_dir,
        station_id = %config.station_id,
        "Print bridge starting..."
    );

    // 3. 初始化并运行直到 Ctrl+C
    let state = AppState::initialize(&config).await?;
    state.run().await?;

    tracing::info!("Print bridge stopped");
    Ok(())
}
