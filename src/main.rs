use anyhow::Result;
use test_catalog::{logger, App, Config};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    if config.verbose_logging {
        logger::init_verbose();
    } else {
        logger::init();
    }

    let stats = App::initialize(config).await?.run().await?;
    if stats.failed > 0 {
        info!("⚠️ {} 个蓝图未完成，详见运行日志", stats.failed);
    }

    Ok(())
}
