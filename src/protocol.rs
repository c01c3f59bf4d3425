//! 定界符协议：从 LLM 文本中取出唯一的 Quint JSON 载荷
//!
//! 约定（与 relay 注入的系统提示一致）：
//! - 起始标记 `⟪QUINT⟫`，结束标记 `⟫QUINT⟫`，每条消息至多一个载荷
//! - 标记之间是单个 JSON 对象（无代码围栏），必须等结束标记出现后才解析，禁止流式半截解析
//! - 缺少任一标记、或结束标记在起始标记之前：视为「没有载荷」，不是错误
//! - 反序列化失败或 blockId / choices 缺失：同样视为没有可用载荷，原文照常显示

use crate::core::{Block, ProtocolError};

/// 起始标记
pub const QUINT_START: &str = "⟪QUINT⟫";
/// 结束标记
pub const QUINT_END: &str = "⟫QUINT⟫";

/// 按显示需要拆分后的消息：载荷前的文字、载荷原文、载荷后的文字
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayParts<'a> {
    pub before: &'a str,
    pub payload: Option<&'a str>,
    pub after: &'a str,
}

/// 一次扫描的结果：显示拆分 + 可用的 Block（若有）
#[derive(Clone, Debug)]
pub struct Scan<'a> {
    pub parts: DisplayParts<'a>,
    pub block: Option<Block>,
}

/// 取出两个标记之间、trim 后的 JSON 候选文本
///
/// 使用第一个起始标记与最后一个结束标记；候选必须以 `{` 开头、以 `}` 结尾。
pub fn extract_payload(text: &str) -> Result<&str, ProtocolError> {
    let start = text.find(QUINT_START).ok_or(ProtocolError::NoMarkers)?;
    let end = text.rfind(QUINT_END).ok_or(ProtocolError::NoMarkers)?;
    let body_start = start + QUINT_START.len();
    if end < body_start {
        return Err(ProtocolError::MarkersOutOfOrder);
    }

    let candidate = text[body_start..end].trim();
    if !candidate.starts_with('{') || !candidate.ends_with('}') {
        return Err(ProtocolError::NotAnObject);
    }
    Ok(candidate)
}

/// 提取并反序列化载荷，做最小形状检查（blockId 非空、choices 为数组）
pub fn parse_block(text: &str) -> Result<Block, ProtocolError> {
    let json = extract_payload(text)?;
    let block: Block = serde_json::from_str(json)?;
    if block.block_id.trim().is_empty() {
        return Err(ProtocolError::MissingBlockId);
    }
    Ok(block)
}

/// 显示拆分：before 去掉尾部空白，after 去掉头部空白；没有成对标记时整段原文作为 before
pub fn split_display(text: &str) -> DisplayParts<'_> {
    let verbatim = DisplayParts {
        before: text,
        payload: None,
        after: "",
    };

    let Some(start) = text.find(QUINT_START) else {
        return verbatim;
    };
    let body_start = start + QUINT_START.len();
    let Some(offset) = text[body_start..].find(QUINT_END) else {
        return verbatim;
    };
    let end = body_start + offset;

    DisplayParts {
        before: text[..start].trim_end(),
        payload: Some(&text[body_start..end]),
        after: text[end + QUINT_END.len()..].trim_start(),
    }
}

/// 扫描一条已完成的消息：得到显示拆分与可用 Block；协议问题只记日志
pub fn scan(text: &str) -> Scan<'_> {
    let parts = split_display(text);
    let block = match parse_block(text) {
        Ok(block) => {
            tracing::debug!(
                "Quint payload found: {} with {} choices",
                block.block_id,
                block.choices.len()
            );
            Some(block)
        }
        Err(ProtocolError::NoMarkers) | Err(ProtocolError::MarkersOutOfOrder) => {
            tracing::debug!("Delimiters not found or malformed; skipping Quint parsing");
            None
        }
        Err(e) => {
            tracing::warn!("Unusable Quint payload: {}", e);
            None
        }
    };
    Scan { parts, block }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Hello! ⟪QUINT⟫{\"blockId\":\"q1\",\"choices\":[{\"choiceId\":\"a\",\"label\":\"A\",\"directionality\":\"out\",\"reveal\":true,\"hiddenContent\":\"ok\"}]}⟫QUINT⟫ Bye.";

    #[test]
    fn test_end_to_end_extraction() {
        let scan = scan(SAMPLE);
        let block = scan.block.expect("payload");
        assert_eq!(block.block_id, "q1");
        assert_eq!(block.choices.len(), 1);
        assert_eq!(block.choices[0].choice_id, "a");
        assert_eq!(block.choices[0].hidden_content.as_deref(), Some("ok"));
        assert_eq!(scan.parts.before, "Hello!");
        assert_eq!(scan.parts.after, "Bye.");
    }

    #[test]
    fn test_missing_end_marker_is_no_payload() {
        let text = "Hello ⟪QUINT⟫{\"blockId\":\"q1\",\"choices\":[]}";
        assert!(matches!(parse_block(text), Err(ProtocolError::NoMarkers)));
        let scan = scan(text);
        assert!(scan.block.is_none());
        assert_eq!(scan.parts.before, text);
        assert!(scan.parts.payload.is_none());
        assert_eq!(scan.parts.after, "");
    }

    #[test]
    fn test_missing_start_marker_is_no_payload() {
        let text = "{\"blockId\":\"q1\",\"choices\":[]}⟫QUINT⟫";
        assert!(matches!(extract_payload(text), Err(ProtocolError::NoMarkers)));
    }

    #[test]
    fn test_end_before_start_is_no_payload() {
        let text = "⟫QUINT⟫ {} ⟪QUINT⟫";
        assert!(matches!(
            extract_payload(text),
            Err(ProtocolError::MarkersOutOfOrder)
        ));
        assert_eq!(split_display(text).before, text);
    }

    #[test]
    fn test_overlapping_markers_do_not_panic() {
        let text = "⟪QUINT⟫QUINT⟫";
        assert!(extract_payload(text).is_err());
    }

    #[test]
    fn test_candidate_is_trimmed_and_must_be_object() {
        let text = "⟪QUINT⟫\n  {\"blockId\":\"b\",\"choices\":[]}\n⟫QUINT⟫";
        assert_eq!(
            extract_payload(text).unwrap(),
            "{\"blockId\":\"b\",\"choices\":[]}"
        );

        let fenced = "⟪QUINT⟫```json\n{\"blockId\":\"b\",\"choices\":[]}\n```⟫QUINT⟫";
        assert!(matches!(
            extract_payload(fenced),
            Err(ProtocolError::NotAnObject)
        ));
    }

    #[test]
    fn test_malformed_payloads_are_rejected() {
        let bad_json = "⟪QUINT⟫{\"blockId\":\"b\",}⟫QUINT⟫";
        assert!(matches!(parse_block(bad_json), Err(ProtocolError::Json(_))));

        let no_choices = "⟪QUINT⟫{\"blockId\":\"b\"}⟫QUINT⟫";
        assert!(matches!(parse_block(no_choices), Err(ProtocolError::Json(_))));

        let empty_id = "⟪QUINT⟫{\"blockId\":\"  \",\"choices\":[]}⟫QUINT⟫";
        assert!(matches!(
            parse_block(empty_id),
            Err(ProtocolError::MissingBlockId)
        ));

        let bad_dir = "⟪QUINT⟫{\"blockId\":\"b\",\"choices\":[{\"choiceId\":\"a\",\"label\":\"A\",\"directionality\":\"up\",\"reveal\":true}]}⟫QUINT⟫";
        assert!(scan(bad_dir).block.is_none());
    }

    #[test]
    fn test_plain_text_passes_through() {
        let text = "Just a normal reply.";
        let scan = scan(text);
        assert!(scan.block.is_none());
        assert_eq!(scan.parts.before, text);
    }
}
