//! Quint 终端宿主
//!
//! 入口：加载配置、日志写入文件、创建 LLM 客户端与宿主会话，载入演示块并运行 TUI 主循环。
//! 用法：quint [配置文件路径]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use quint::{
    config::load_config,
    demos,
    llm::{create_llm_from_config, LlmClient, MockLlmClient},
    observability,
    ui::{run_app, Session},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;

    // 全屏界面下日志不能写终端
    observability::init_to_file(&cfg.ui.log_file)
        .with_context(|| format!("Failed to open log file {}", cfg.ui.log_file.display()))?;

    // 缺少 API Key 时仍可离线体验演示：退回 Mock 并在状态栏提示
    let (llm, status): (Arc<dyn LlmClient>, Option<String>) = match create_llm_from_config(&cfg.llm) {
        Ok(llm) => (llm, None),
        Err(e) => {
            tracing::warn!("{}; falling back to mock replies", e);
            (
                Arc::new(MockLlmClient::default()),
                Some(format!("{}; using mock replies", e)),
            )
        }
    };
    tracing::info!("Quint TUI starting with model {}", llm.model());

    let (mut session, events) = Session::new(
        llm,
        cfg.relay.clone(),
        cfg.llm.timeouts.clone(),
        cfg.ui.max_context_turns,
    );
    session.status = status;
    for block in demos::demo_blocks(&cfg.ui.demo) {
        session.add_block(block);
    }

    run_app(session, events).await.context("App run failed")?;

    Ok(())
}
