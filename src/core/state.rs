//! 渲染状态：只追加的渲染日志 + Reveal 表
//!
//! 日志（RenderItem 序列）决定显示顺序，追加后从不重排；Reveal 单独存放在以 (blockId, choiceId)
//! 为键的表中，内容变化时不改写日志，UI 可安全地按日志位置/ID 作为 key。
//!
//! 单线程、同步使用：所有变更在调用方线程上一次完成，状态不是响应式的，调用方每次变更后需重新读取。
//! 找不到目标（未知 choice / reveal）一律静默忽略并返回 None，不视为错误。

use std::collections::HashMap;

use chrono::Utc;

use super::types::{Block, Choice, ChoiceSnapshot, RenderItem, Reveal, RevealId};

/// Quint 渲染状态
#[derive(Clone, Debug, Default)]
pub struct RenderState {
    items: Vec<RenderItem>,
    reveals: HashMap<RevealId, Reveal>,
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个 Block，随后按声明顺序追加其全部 Choice
    ///
    /// 不检查 blockId 唯一性：重复 id 会在日志里出现两次，去重是调用方的责任。
    pub fn add_block(&mut self, block: Block) {
        let block_id = block.block_id.clone();
        let choices = block.choices.clone();
        self.items.push(RenderItem::Block { data: block });
        self.items.extend(choices.into_iter().map(|choice| RenderItem::Choice {
            data: choice,
            block_id: block_id.clone(),
        }));
    }

    /// 激活选项：确认选项在日志中存在，reveal=true 时创建或重置对应的 Reveal 并返回其 ID
    ///
    /// - 日志中找不到 (block_id, choice_id)：返回 None，不创建 Reveal
    /// - snapshot.reveal 为 false：返回 None，与 directionality 无关
    /// - 已有 Reveal 时整体覆盖：generated_content / nested_blocks 被丢弃，expanded 重置为 true
    pub fn activate_choice(
        &mut self,
        block_id: &str,
        choice_id: &str,
        snapshot: &ChoiceSnapshot,
    ) -> Option<RevealId> {
        self.find_choice(block_id, choice_id)?;

        if !snapshot.reveal {
            return None;
        }

        let reveal_id = RevealId::new(block_id, choice_id);
        let reveal = Reveal {
            reveal_id: reveal_id.clone(),
            block_id: block_id.to_string(),
            choice_id: choice_id.to_string(),
            expanded: true,
            static_content: snapshot.hidden_content.clone(),
            generated_content: None,
            nested_blocks: None,
            created_at: Utc::now(),
        };
        self.reveals.insert(reveal_id.clone(), reveal);
        Some(reveal_id)
    }

    /// 写入 LLM 生成内容；expanded 与 static_content 不变
    pub fn update_reveal_content(&mut self, reveal_id: &RevealId, text: impl Into<String>) {
        if let Some(reveal) = self.reveals.get_mut(reveal_id) {
            reveal.generated_content = Some(text.into());
        }
    }

    /// 切换展开/收起
    pub fn toggle_reveal(&mut self, reveal_id: &RevealId) {
        if let Some(reveal) = self.reveals.get_mut(reveal_id) {
            reveal.expanded = !reveal.expanded;
        }
    }

    /// 整体替换 Reveal 内的嵌套 Block（非合并）
    pub fn add_nested_blocks(&mut self, reveal_id: &RevealId, blocks: Vec<Block>) {
        if let Some(reveal) = self.reveals.get_mut(reveal_id) {
            reveal.nested_blocks = Some(blocks);
        }
    }

    /// 当前日志的拷贝（按插入顺序）；修改返回值不影响内部状态
    pub fn items(&self) -> Vec<RenderItem> {
        self.items.clone()
    }

    pub fn reveal(&self, reveal_id: &RevealId) -> Option<&Reveal> {
        self.reveals.get(reveal_id)
    }

    /// 清空日志与 Reveal 表
    pub fn clear(&mut self) {
        self.items.clear();
        self.reveals.clear();
    }

    /// 在日志中按 (block_id, choice_id) 查找选项
    pub fn find_choice(&self, block_id: &str, choice_id: &str) -> Option<&Choice> {
        self.items.iter().find_map(|item| match item.as_choice() {
            Some((bid, choice)) if bid == block_id && choice.choice_id == choice_id => {
                Some(choice)
            }
            _ => None,
        })
    }

    pub fn contains_block(&self, block_id: &str) -> bool {
        self.items
            .iter()
            .any(|item| item.as_block().is_some_and(|b| b.block_id == block_id))
    }

    /// 日志条目数（Block + Choice）
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn reveal_count(&self) -> usize {
        self.reveals.len()
    }
}
