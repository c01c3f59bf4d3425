//! 错误类型
//!
//! RenderState 本身没有失败路径（找不到目标一律返回 None）；这里的错误只出现在核心外围：
//! 定界符协议解析、转发代理、配置加载。

use thiserror::Error;

/// 定界符协议解析失败：一律视为「没有可用载荷」，原文照常显示
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("No Quint delimiters found")]
    NoMarkers,

    #[error("End delimiter appears before start delimiter")]
    MarkersOutOfOrder,

    #[error("Payload is not a JSON object")]
    NotAnObject,

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload has an empty blockId")]
    MissingBlockId,
}

/// 转发代理错误（映射为 HTTP 状态码见 server 模块）
#[derive(Error, Debug, Clone)]
pub enum RelayError {
    #[error("Messages must be an array")]
    InvalidMessages,

    #[error("{0} not set")]
    MissingApiKey(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Stream error: {0}")]
    Stream(String),
}

/// 顶层错误
#[derive(Error, Debug)]
pub enum QuintError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
