//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / OpenRouter / Mock）实现 LlmClient：complete（非流式）、complete_stream（流式 Token）。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use thiserror::Error;

use super::Message;

/// LLM 调用错误
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Timeout after {0}s")]
    Timeout(u64),
}

/// 流式 Token
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// LLM 客户端 trait：非流式完成与流式完成（返回 Token 流）
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成；默认把流拼接起来
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let mut stream = self.complete_stream(messages).await?;
        let mut out = String::new();
        while let Some(token) = stream.next().await {
            out.push_str(&token?);
        }
        Ok(out)
    }

    /// 流式完成，返回 Token 流
    async fn complete_stream(&self, messages: &[Message]) -> Result<TokenStream, LlmError>;

    /// 模型名（日志用）
    fn model(&self) -> &str;
}
