//! 转发层：规范化前端消息、注入 Quint 系统提示、向 LLM 发起流式请求
//!
//! 与具体传输（HTTP / 终端）无关；server 模块与终端宿主都经由这里访问 LLM。

pub mod normalize;
pub mod prompt;

use std::time::Duration;

use serde_json::Value;

use crate::config::{LlmTimeoutsSection, RelaySection};
use crate::core::RelayError;
use crate::llm::{LlmClient, LlmError, Message, TokenStream};

pub use normalize::{flatten_content, inject_system_prompt, normalize_messages, BLANK_CONTENT};
pub use prompt::DEFAULT_SYSTEM_PROMPT;

/// 生效的系统提示：配置覆盖优先，否则内置协议说明
pub fn system_prompt(cfg: &RelaySection) -> &str {
    cfg.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
}

/// 把原始 `messages` 值整理成发往 LLM 的消息列表
pub fn prepare_messages(raw: &Value, cfg: &RelaySection) -> Result<Vec<Message>, RelayError> {
    let messages = normalize_messages(raw, cfg.drop_assistant_messages)?;
    Ok(inject_system_prompt(messages, system_prompt(cfg)))
}

/// 发起流式请求；建立流超过 timeouts.request 秒视为上游错误
pub async fn open_stream(
    llm: &dyn LlmClient,
    messages: &[Message],
    timeouts: &LlmTimeoutsSection,
) -> Result<TokenStream, RelayError> {
    tracing::debug!("Relaying {} messages to {}", messages.len(), llm.model());
    match tokio::time::timeout(
        Duration::from_secs(timeouts.request),
        llm.complete_stream(messages),
    )
    .await
    {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(RelayError::Upstream(e.to_string())),
        Err(_) => Err(RelayError::Upstream(
            LlmError::Timeout(timeouts.request).to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use serde_json::json;

    use super::*;
    use crate::llm::{MockLlmClient, Role};

    #[test]
    fn test_prepare_uses_override_prompt() {
        let cfg = RelaySection {
            system_prompt: Some("custom".into()),
            drop_assistant_messages: false,
        };
        let msgs = prepare_messages(&json!([{"role":"user","content":"hi"}]), &cfg).unwrap();
        assert_eq!(msgs[0], Message::system("custom"));

        let default_cfg = RelaySection::default();
        let msgs = prepare_messages(&json!([{"role":"user","content":"hi"}]), &default_cfg).unwrap();
        assert_eq!(msgs[0].role, Role::System);
        assert!(msgs[0].content.contains("⟪QUINT⟫"));
    }

    #[test]
    fn test_existing_system_message_is_kept() {
        let msgs = prepare_messages(
            &json!([{"role":"system","content":"mine"},{"role":"user","content":"hi"}]),
            &RelaySection::default(),
        )
        .unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].content, "mine");
    }

    #[tokio::test]
    async fn test_open_stream_with_mock() {
        let llm = MockLlmClient::with_reply("a b c");
        let stream = open_stream(&llm, &[Message::user("x")], &LlmTimeoutsSection::default())
            .await
            .unwrap();
        let text: String = stream.map(|t| t.unwrap()).collect::<Vec<_>>().await.concat();
        assert_eq!(text, "a b c");
    }
}
