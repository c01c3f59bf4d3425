//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 默认回显最后一条 User 消息；with_reply 可固定回复（例如带 Quint 载荷的文本）。
//! 流式输出按词切块，模拟逐词推送。

use async_trait::async_trait;
use futures_util::stream;

use super::{LlmClient, LlmError, Message, Role, TokenStream};

/// Mock 客户端
#[derive(Debug, Default, Clone)]
pub struct MockLlmClient {
    reply: Option<String>,
}

impl MockLlmClient {
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
        }
    }

    fn reply_for(&self, messages: &[Message]) -> String {
        if let Some(reply) = &self.reply {
            return reply.clone();
        }
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        format!("Echo from Mock: {}", last_user)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        Ok(self.reply_for(messages))
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TokenStream, LlmError> {
        let content = self.reply_for(messages);
        let tokens: Vec<Result<String, LlmError>> = content
            .split_inclusive(' ')
            .map(|word| Ok(word.to_string()))
            .collect();
        Ok(Box::pin(stream::iter(tokens)))
    }

    fn model(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    #[tokio::test]
    async fn test_echo_streams_word_by_word() {
        let client = MockLlmClient::default();
        let messages = vec![Message::system("sys"), Message::user("hello there")];
        let tokens: Vec<String> = client
            .complete_stream(&messages)
            .await
            .unwrap()
            .map(|t| t.unwrap())
            .collect()
            .await;
        assert_eq!(tokens.concat(), "Echo from Mock: hello there");
        assert!(tokens.len() > 1);
    }

    #[tokio::test]
    async fn test_fixed_reply() {
        let client = MockLlmClient::with_reply("fixed");
        assert_eq!(client.complete(&[]).await.unwrap(), "fixed");
    }
}
