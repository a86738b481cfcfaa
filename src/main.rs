use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};

use deep2d_pipeline::utils::logging;
use deep2d_pipeline::{App, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    // 加载配置
    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init(verbose);
            error!("❌ {}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    let app = match App::initialize(config) {
        Ok(app) => app,
        Err(e) => {
            error!("❌ 初始化失败: {}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    let cancel = app.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ 收到中断信号，正在停止...");
            cancel.cancel();
        }
    });

    match app.run().await {
        Ok(summary) => {
            info!(
                "🏁 运行结束: 模式 {} | 分类作业 {} | 类别数 {}",
                summary.mode, summary.classification, summary.class_count
            );
            ExitCode::from(summary.exit_code())
        }
        Err(e) => {
            error!("❌ 运行失败: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
