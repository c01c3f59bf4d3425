//! 消息规范化：把前端各种内容表示压平成每条消息一个字符串
//!
//! 支持的形态：
//! - `content` 为字符串
//! - `content` 为数组（字符串或 `{type:"text", text}` / `{text}` / `{content}` 片段）
//! - `parts` 数组（流式 UI 消息格式）
//! - `content` 为对象（取 `text` 或 `content`）
//!
//! 空白内容替换为单个空格，下游永远不会收到空字符串。

use serde_json::Value;

use crate::core::RelayError;
use crate::llm::{Message, Role};

/// 空白内容的替代
pub const BLANK_CONTENT: &str = " ";

/// 规范化消息数组；非数组返回 InvalidMessages，未知角色跳过
pub fn normalize_messages(raw: &Value, drop_assistant: bool) -> Result<Vec<Message>, RelayError> {
    let items = raw.as_array().ok_or(RelayError::InvalidMessages)?;

    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let role = match item.get("role").and_then(Value::as_str) {
            Some("user") => Role::User,
            Some("assistant") => Role::Assistant,
            Some("system") => Role::System,
            other => {
                tracing::warn!("Skipping message {} with unsupported role {:?}", i, other);
                continue;
            }
        };
        if drop_assistant && role == Role::Assistant {
            continue;
        }

        let mut content = flatten_content(item);
        if content.trim().is_empty() {
            tracing::warn!("Empty content for {} message {}, using space fallback", role.as_str(), i);
            content = BLANK_CONTENT.to_string();
        }
        out.push(Message { role, content });
    }
    Ok(out)
}

/// 无 system 消息时在开头注入系统提示
pub fn inject_system_prompt(mut messages: Vec<Message>, prompt: &str) -> Vec<Message> {
    if !messages.iter().any(|m| m.role == Role::System) {
        messages.insert(0, Message::system(prompt));
    }
    messages
}

/// 取出单条消息的纯文本
pub fn flatten_content(message: &Value) -> String {
    match message.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => join_parts(items, &["text", "content"]),
        _ => match (message.get("parts"), message.get("content")) {
            (Some(Value::Array(parts)), _) => join_parts(parts, &["content", "text"]),
            (_, Some(Value::Object(obj))) => ["text", "content"]
                .iter()
                .find_map(|k| obj.get(*k).filter(|v| truthy(v)))
                .map(text_of)
                .unwrap_or_default(),
            _ => String::new(),
        },
    }
}

/// 拼接片段：`type:"text"` 的 text 优先，否则按 fallback 顺序取字段
fn join_parts(parts: &[Value], fallback: &[&str]) -> String {
    parts
        .iter()
        .map(|part| match part {
            Value::String(s) => s.clone(),
            Value::Object(obj) => {
                let typed_text = (obj.get("type").and_then(Value::as_str) == Some("text"))
                    .then(|| obj.get("text"))
                    .flatten()
                    .filter(|v| truthy(v));
                typed_text
                    .or_else(|| fallback.iter().find_map(|k| obj.get(*k).filter(|v| truthy(v))))
                    .map(text_of)
                    .unwrap_or_default()
            }
            _ => String::new(),
        })
        .collect()
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_flatten_shapes() {
        assert_eq!(flatten_content(&json!({"role":"user","content":"plain"})), "plain");
        assert_eq!(
            flatten_content(&json!({"role":"user","content":["a", {"type":"text","text":"b"}, {"content":"c"}, 7]})),
            "abc"
        );
        assert_eq!(
            flatten_content(&json!({"role":"user","parts":[{"type":"text","text":"x"}, {"type":"reasoning","content":"y"}, "z"]})),
            "xyz"
        );
        assert_eq!(
            flatten_content(&json!({"role":"user","content":{"text":"nested"}})),
            "nested"
        );
        assert_eq!(
            flatten_content(&json!({"role":"user","content":{"content":"inner"}})),
            "inner"
        );
        assert_eq!(flatten_content(&json!({"role":"user"})), "");
    }

    #[test]
    fn test_blank_content_becomes_space() {
        let raw = json!([
            {"role":"user","content":"   "},
            {"role":"assistant","content":[]},
        ]);
        let msgs = normalize_messages(&raw, false).unwrap();
        assert_eq!(msgs.len(), 2);
        assert!(msgs.iter().all(|m| m.content == BLANK_CONTENT));
    }

    #[test]
    fn test_non_array_is_rejected() {
        assert!(matches!(
            normalize_messages(&json!({"role":"user"}), false),
            Err(RelayError::InvalidMessages)
        ));
        assert!(matches!(
            normalize_messages(&Value::Null, false),
            Err(RelayError::InvalidMessages)
        ));
    }

    #[test]
    fn test_drop_assistant_and_unknown_roles() {
        let raw = json!([
            {"role":"user","content":"q"},
            {"role":"assistant","content":"a"},
            {"role":"tool","content":"t"},
        ]);
        let kept = normalize_messages(&raw, false).unwrap();
        assert_eq!(kept.len(), 2);
        let dropped = normalize_messages(&raw, true).unwrap();
        assert_eq!(dropped, vec![Message::user("q")]);
    }

    #[test]
    fn test_system_prompt_injected_once() {
        let msgs = inject_system_prompt(vec![Message::user("hi")], "SYS");
        assert_eq!(msgs[0], Message::system("SYS"));
        assert_eq!(msgs.len(), 2);

        let again = inject_system_prompt(msgs, "OTHER");
        assert_eq!(again.len(), 2);
        assert_eq!(again[0].content, "SYS");
    }
}
