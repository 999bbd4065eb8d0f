//! 驱动运行时：加载配置，启动遥测发送端与控制通道分发器。

mod bootstrap;
mod passthrough;

use dsdk_config::RuntimeConfig;
use dsdk_control::{CommandDispatcher, DriverContext};
use dsdk_normalize::HandlerChain;
use dsdk_registry::MetadataRegistry;
use dsdk_telemetry::{init_tracing, metrics};
use passthrough::PassthroughDriver;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = RuntimeConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // 遥测发送端先于控制通道就绪
    let sender = bootstrap::build_sender(&config);
    sender.start().await?;

    // 注册表在收到 start 命令后才有内容
    let registry = Arc::new(MetadataRegistry::new());
    let ctx = DriverContext::new(registry, Arc::clone(&sender), Arc::new(HandlerChain::standard()));

    let dispatcher = CommandDispatcher::new(
        bootstrap::build_transport(&config),
        Arc::new(PassthroughDriver::default()),
        ctx,
        bootstrap::dispatcher_options(&config),
    );
    dispatcher.spawn();
    info!(
        target: "dsdk.runtime",
        project_id = %config.project_id,
        instance_id = %config.instance_id,
        sender = ?config.sender,
        "runtime_started"
    );

    tokio::signal::ctrl_c().await?;
    info!(target: "dsdk.runtime", "runtime_shutdown_requested");

    if let Err(err) = dispatcher.shutdown().await {
        warn!(target: "dsdk.runtime", error = %err, "driver_stop_failed");
    }
    sender.stop().await?;

    let snapshot = metrics().snapshot();
    info!(
        target: "dsdk.runtime",
        points_written = snapshot.points_written,
        point_write_failures = snapshot.point_write_failures,
        commands_received = snapshot.commands_received,
        commands_failed = snapshot.commands_failed,
        "runtime_stopped"
    );
    Ok(())
}
