//! 数据模型：Block（内容块）、Choice（选项按钮）、Reveal（内联揭示面板）、RenderItem（渲染日志条目）
//!
//! 线格式与前端/LLM 输出一致：字段名 camelCase，directionality 为 "out" / "in" / "in-n-out"。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// 内容块 ID（调用方提供，单个 RenderState 内应唯一）
pub type BlockId = String;

/// 选项 ID（所属 Block 内唯一）
pub type ChoiceId = String;

/// 自由格式的 JSON 对象（inputData / metadata）
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// 方向性：激活选项时是否与 LLM 交互
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Directionality {
    /// 只展示预置内容，不请求 LLM
    #[serde(rename = "out")]
    Out,
    /// 将 inputData 发送给 LLM，回复出现在主对话流
    #[serde(rename = "in")]
    In,
    /// 既展示预置内容，又请求 LLM，回复写回同一个 Reveal
    #[serde(rename = "in-n-out")]
    InNOut,
}

impl Directionality {
    /// 是否需要向外部生成服务发请求
    pub fn requests_generation(self) -> bool {
        matches!(self, Directionality::In | Directionality::InNOut)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Directionality::Out => "out",
            Directionality::In => "in",
            Directionality::InNOut => "in-n-out",
        }
    }
}

impl fmt::Display for Directionality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 选项按钮，归属于某个 Block，添加后不可变
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub choice_id: ChoiceId,
    pub label: String,
    pub directionality: Directionality,
    /// true：内容内联显示在按钮下方（由 RenderState 管理）；false：由宿主放进主对话流
    pub reveal: bool,
    /// 揭示时立即展示的预置内容（out 必备，in-n-out 可选）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_content: Option<String>,
    /// 激活时交给 LLM 集成回调的数据（in / in-n-out）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_data: Option<JsonObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonObject>,
}

impl Choice {
    pub fn new(
        choice_id: impl Into<ChoiceId>,
        label: impl Into<String>,
        directionality: Directionality,
        reveal: bool,
    ) -> Self {
        Self {
            choice_id: choice_id.into(),
            label: label.into(),
            directionality,
            reveal,
            hidden_content: None,
            input_data: None,
            metadata: None,
        }
    }

    pub fn with_hidden_content(mut self, content: impl Into<String>) -> Self {
        self.hidden_content = Some(content.into());
        self
    }

    pub fn with_input_data(mut self, data: JsonObject) -> Self {
        self.input_data = Some(data);
        self
    }

    /// 激活时传给 RenderState 的快照
    pub fn snapshot(&self) -> ChoiceSnapshot {
        ChoiceSnapshot {
            directionality: self.directionality,
            reveal: self.reveal,
            hidden_content: self.hidden_content.clone(),
        }
    }
}

/// 内容块（问题、提示、叙事片段），添加后不可变
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub block_id: BlockId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonObject>,
}

impl Block {
    pub fn new(block_id: impl Into<BlockId>) -> Self {
        Self {
            block_id: block_id.into(),
            content: None,
            choices: Vec::new(),
            metadata: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_choice(mut self, choice: Choice) -> Self {
        self.choices.push(choice);
        self
    }
}

/// activate_choice 的输入：调用方透传选项自身的字段（RenderState 只确认其在日志中存在）
#[derive(Clone, Debug, PartialEq)]
pub struct ChoiceSnapshot {
    pub directionality: Directionality,
    pub reveal: bool,
    pub hidden_content: Option<String>,
}

/// Reveal 的组合键：(block_id, choice_id)
///
/// 以二元组作为 map 键，id 自身含冒号也不会冲突；Display / 序列化仍为 `blockId:choiceId`。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RevealId {
    pub block_id: BlockId,
    pub choice_id: ChoiceId,
}

impl RevealId {
    pub fn new(block_id: impl Into<BlockId>, choice_id: impl Into<ChoiceId>) -> Self {
        Self {
            block_id: block_id.into(),
            choice_id: choice_id.into(),
        }
    }
}

impl fmt::Display for RevealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_id, self.choice_id)
    }
}

impl Serialize for RevealId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 内联揭示面板：选项第一次以 reveal=true 激活时创建，归 RenderState 的 reveal 表所有
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reveal {
    pub reveal_id: RevealId,
    pub block_id: BlockId,
    pub choice_id: ChoiceId,
    pub expanded: bool,
    /// 创建时从 hiddenContent 复制
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_content: Option<String>,
    /// 异步回填的 LLM 内容，显示优先级高于 static_content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested_blocks: Option<Vec<Block>>,
    pub created_at: DateTime<Utc>,
}

impl Reveal {
    /// 实际显示的内容：generated 优先，其次 static
    pub fn display_content(&self) -> Option<&str> {
        self.generated_content
            .as_deref()
            .or(self.static_content.as_deref())
    }
}

/// 渲染日志条目：Block 或 Choice（Reveal 不进日志，按 RevealId 另查）
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderItem {
    Block {
        data: Block,
    },
    Choice {
        data: Choice,
        #[serde(rename = "blockId")]
        block_id: BlockId,
    },
}

impl RenderItem {
    /// 若为 Choice，返回 (block_id, choice)
    pub fn as_choice(&self) -> Option<(&str, &Choice)> {
        match self {
            RenderItem::Choice { data, block_id } => Some((block_id.as_str(), data)),
            RenderItem::Block { .. } => None,
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            RenderItem::Block { data } => Some(data),
            RenderItem::Choice { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directionality_wire_names() {
        let json = serde_json::to_string(&Directionality::InNOut).unwrap();
        assert_eq!(json, "\"in-n-out\"");
        let d: Directionality = serde_json::from_str("\"out\"").unwrap();
        assert_eq!(d, Directionality::Out);
        assert!(serde_json::from_str::<Directionality>("\"sideways\"").is_err());
    }

    #[test]
    fn test_block_deserializes_camel_case() {
        let block: Block = serde_json::from_str(
            r#"{"blockId":"q1","content":"Pick","choices":[
                {"choiceId":"a","label":"A","directionality":"in","reveal":false,
                 "inputData":{"type":"explain","context":"x"}}]}"#,
        )
        .unwrap();
        assert_eq!(block.block_id, "q1");
        assert_eq!(block.choices[0].directionality, Directionality::In);
        assert_eq!(
            block.choices[0].input_data.as_ref().unwrap()["type"],
            serde_json::json!("explain")
        );
        assert!(block.choices[0].hidden_content.is_none());
    }

    #[test]
    fn test_reveal_id_display_and_colon_ids() {
        let a = RevealId::new("a:b", "c");
        let b = RevealId::new("a", "b:c");
        assert_eq!(a.to_string(), "a:b:c");
        assert_eq!(b.to_string(), "a:b:c");
        // 组合键不因字符串形式相同而冲突
        assert_ne!(a, b);
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"a:b:c\"");
    }

    #[test]
    fn test_render_item_tagged_serialization() {
        let item = RenderItem::Choice {
            data: Choice::new("a", "A", Directionality::Out, true),
            block_id: "q1".into(),
        };
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v["type"], "choice");
        assert_eq!(v["blockId"], "q1");
        assert_eq!(v["data"]["choiceId"], "a");
    }
}
