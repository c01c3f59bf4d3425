//! Quint 转发代理
//!
//! POST /api/chat 把前端消息规范化、注入 Quint 系统提示后转给 LLM，并把 Token 以纯文本流写回。
//!
//! 环境变量:
//! - OPENROUTER_API_KEY（或 [llm].api_key_env 指定的变量）: LLM API Key
//! - QUINT__SERVER__PORT 等: 覆盖配置项
//!
//! 启动: cargo run --bin quint-proxy --features server [-- 配置文件路径]

#[cfg(feature = "server")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use std::path::PathBuf;
    use std::sync::Arc;

    use anyhow::Context;
    use quint::config::load_config;
    use quint::observability;
    use quint::server::{create_router, ProxyState};

    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;

    let state = Arc::new(ProxyState::from_config(&cfg));
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Quint proxy listening on http://{}", addr);
    tracing::info!("Provider: {}, model: {}", cfg.llm.provider, cfg.llm.model);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}

#[cfg(not(feature = "server"))]
fn main() {
    eprintln!("请使用 --features server 编译: cargo run --bin quint-proxy --features server");
    std::process::exit(1);
}
