//! 后端选择：OpenRouter / OpenAI / Mock
//!
//! OpenRouter 提供与 OpenAI 兼容的 API 接口。
//! - Base URL: https://openrouter.ai/api/v1
//! - API Key 默认从 `OPENROUTER_API_KEY` 读取（可由 llm.api_key_env 指定其他变量）

use std::sync::Arc;

use super::{LlmClient, MockLlmClient, OpenAiClient};
use crate::config::LlmSection;
use crate::core::RelayError;

/// OpenRouter API 常量
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// 根据配置创建 LLM 客户端
///
/// - provider = mock：无需 Key
/// - 其他：从 api_key_env 指定的环境变量读取 Key，缺失时返回 MissingApiKey
/// - base_url 未配置时，openrouter 使用 OPENROUTER_BASE_URL，openai 使用 async_openai 默认端点
pub fn create_llm_from_config(cfg: &LlmSection) -> Result<Arc<dyn LlmClient>, RelayError> {
    let provider = cfg.provider.to_lowercase();
    if provider == "mock" {
        tracing::info!("Using Mock LLM");
        return Ok(Arc::new(MockLlmClient::default()));
    }

    let api_key = std::env::var(&cfg.api_key_env)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| RelayError::MissingApiKey(cfg.api_key_env.clone()))?;

    let base_url = cfg.base_url.as_deref().or(match provider.as_str() {
        "openrouter" => Some(OPENROUTER_BASE_URL),
        _ => None,
    });

    tracing::info!("Using {} LLM ({})", provider, cfg.model);
    Ok(Arc::new(OpenAiClient::new(
        base_url,
        &cfg.model,
        &api_key,
        cfg.max_tokens,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_provider_needs_no_key() {
        let cfg = LlmSection {
            provider: "Mock".into(),
            ..LlmSection::default()
        };
        let client = create_llm_from_config(&cfg).unwrap();
        assert_eq!(client.model(), "mock");
    }

    #[test]
    fn test_missing_key_is_reported() {
        let cfg = LlmSection {
            api_key_env: "QUINT_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..LlmSection::default()
        };
        match create_llm_from_config(&cfg) {
            Err(RelayError::MissingApiKey(name)) => {
                assert_eq!(name, "QUINT_TEST_KEY_THAT_IS_NEVER_SET")
            }
            other => panic!("expected MissingApiKey, got {:?}", other.map(|c| c.model().to_string())),
        }
    }
}
