//! HTTP 转发代理：POST /api/chat 把前端消息转给 LLM，并把 Token 流式写回
//!
//! - 响应体是纯文本 Token 流（text/plain），前端拼接后再跑定界符协议
//! - 客户端断开导致的写失败被静默吸收：生产任务发现接收端已关闭即停止
//! - 所有响应带宽松 CORS 头，OPTIONS 预检直接 200

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::{AppConfig, LlmTimeoutsSection, RelaySection};
use crate::core::RelayError;
use crate::llm::{create_llm_from_config, LlmClient, TokenStream};
use crate::relay;

/// 代理服务状态
pub struct ProxyState {
    /// 未配置 API Key 时为 None，请求返回 500
    pub llm: Option<Arc<dyn LlmClient>>,
    /// LLM 不可用时报告给客户端的原因
    pub unavailable: Option<RelayError>,
    pub relay: RelaySection,
    pub timeouts: LlmTimeoutsSection,
}

impl ProxyState {
    /// 从配置构建；缺少 API Key 不阻止启动，只在请求时报错
    pub fn from_config(cfg: &AppConfig) -> Self {
        let (llm, unavailable) = match create_llm_from_config(&cfg.llm) {
            Ok(llm) => (Some(llm), None),
            Err(e) => {
                tracing::warn!("LLM unavailable, /api/chat will return errors: {}", e);
                (None, Some(e))
            }
        };
        Self {
            llm,
            unavailable,
            relay: cfg.relay.clone(),
            timeouts: cfg.llm.timeouts.clone(),
        }
    }

    pub fn with_llm(llm: Arc<dyn LlmClient>, relay: RelaySection) -> Self {
        Self {
            llm: Some(llm),
            unavailable: None,
            relay,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

/// 创建代理路由
pub fn create_router(state: Arc<ProxyState>) -> Router {
    Router::new()
        .route("/api/chat", post(api_chat).options(api_chat_preflight))
        .route("/api/health", get(|| async { "OK" }))
        .layer(middleware::map_response(add_cors_headers))
        .with_state(state)
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            RelayError::InvalidMessages => StatusCode::BAD_REQUEST,
            RelayError::MissingApiKey(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Upstream(_) | RelayError::Stream(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// POST /api/chat：`{ "messages": [...] }` → 流式纯文本
async fn api_chat(
    State(state): State<Arc<ProxyState>>,
    Json(body): Json<Value>,
) -> Result<Response, RelayError> {
    let Some(llm) = state.llm.clone() else {
        return Err(state
            .unavailable
            .clone()
            .unwrap_or_else(|| RelayError::Upstream("LLM not configured".to_string())));
    };

    let raw = body.get("messages").unwrap_or(&Value::Null);
    tracing::info!(
        "Received messages count: {}",
        raw.as_array().map(Vec::len).unwrap_or(0)
    );
    let messages = relay::prepare_messages(raw, &state.relay)?;
    tracing::debug!("Converted messages count: {}", messages.len());

    let tokens = relay::open_stream(llm.as_ref(), &messages, &state.timeouts).await?;

    let (tx, rx) = mpsc::channel::<Bytes>(32);
    tokio::spawn(pump_tokens(tokens, tx, state.timeouts.stream));

    type BoxErr = Box<dyn std::error::Error + Send + Sync>;
    let body_stream = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok::<Bytes, BoxErr>(chunk), rx))
    });

    let mut res = Response::new(Body::from_stream(body_stream));
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    Ok(res)
}

/// 把 Token 流搬进响应通道；接收端关闭（客户端断开）即静默停止
async fn pump_tokens(mut tokens: TokenStream, tx: mpsc::Sender<Bytes>, stream_timeout: u64) {
    let pump = async {
        while let Some(token) = tokens.next().await {
            match token {
                Ok(text) => {
                    if tx.send(Bytes::from(text)).await.is_err() {
                        tracing::debug!("Client disconnected, stopping relay stream");
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!("Upstream stream error: {}", e);
                    return;
                }
            }
        }
    };

    if tokio::time::timeout(Duration::from_secs(stream_timeout), pump)
        .await
        .is_err()
    {
        tracing::warn!("Relay stream exceeded {}s, closing", stream_timeout);
    }
}

/// OPTIONS /api/chat：CORS 预检
async fn api_chat_preflight() -> StatusCode {
    StatusCode::OK
}

async fn add_cors_headers(mut res: Response) -> Response {
    let headers = res.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    res
}
