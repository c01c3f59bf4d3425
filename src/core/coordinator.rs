//! 激活协调器：宿主侧的「选项激活契约」
//!
//! RenderState 只管状态；协调器把一次点击翻译成完整的行动计划：
//! - out：不发请求，Reveal 的 static_content 即最终内容
//! - in：发送 inputData，回复进主对话流（同时 reveal=true 是合法但低价值的组合，记 warn）
//! - in-n-out：发送 inputData，先显示 static_content，回复到达后写回同一个 Reveal
//!
//! 核心不做请求代际隔离，这里补上：同一 Reveal 每次激活递增代号，只有最新一代的回复会被写入，
//! 旧回复（在重新激活之后才到达）直接丢弃。

use std::collections::{HashMap, HashSet};

use super::state::RenderState;
use super::types::{Block, BlockId, ChoiceId, Directionality, JsonObject, RevealId};
use crate::protocol;

/// 外部回复该写到哪里
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseRoute {
    /// 不请求外部服务（out）
    None,
    /// 回复进入主对话流
    Conversation,
    /// 回复写回该 Reveal（update_reveal_content）
    Reveal(RevealId),
}

/// 一次外部请求的代际凭证；complete 时据此判断回复是否过期
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationToken {
    pub reveal_id: RevealId,
    pub generation: u64,
}

/// 激活选项后宿主需要执行的计划
#[derive(Clone, Debug)]
pub struct ActivationPlan {
    pub block_id: BlockId,
    pub choice_id: ChoiceId,
    pub directionality: Directionality,
    pub reveal_id: Option<RevealId>,
    pub input_data: Option<JsonObject>,
    pub route: ResponseRoute,
    pub token: Option<GenerationToken>,
}

impl ActivationPlan {
    /// 是否需要向外部生成服务发请求
    pub fn needs_request(&self) -> bool {
        self.route != ResponseRoute::None
    }

    /// 发送给 LLM 的用户消息
    pub fn prompt(&self) -> String {
        activation_prompt(&self.block_id, &self.choice_id, self.input_data.as_ref())
    }
}

#[derive(Clone, Copy, Debug)]
struct Generation {
    current: u64,
    pending: bool,
}

type ToggleObserver = Box<dyn Fn(&RevealId, bool) + Send + Sync>;

/// 协调器：独占一个 RenderState，实现激活契约、回复代际隔离与载荷摄入
#[derive(Default)]
pub struct Coordinator {
    state: RenderState,
    generations: HashMap<RevealId, Generation>,
    next_generation: u64,
    ingested_messages: HashSet<String>,
    on_reveal_toggle: Option<ToggleObserver>,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册 Reveal 展开/收起回调（推模式的可选替代；默认由调用方重新读取状态）
    pub fn with_toggle_observer(
        mut self,
        observer: impl Fn(&RevealId, bool) + Send + Sync + 'static,
    ) -> Self {
        self.on_reveal_toggle = Some(Box::new(observer));
        self
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn add_block(&mut self, block: Block) {
        self.state.add_block(block);
    }

    /// 激活选项：从日志取出选项本身的字段作为快照，调用 RenderState，并给出行动计划
    ///
    /// 选项不存在时返回 None。
    pub fn activate(&mut self, block_id: &str, choice_id: &str) -> Option<ActivationPlan> {
        let choice = self.state.find_choice(block_id, choice_id)?.clone();
        let reveal_id = self
            .state
            .activate_choice(block_id, choice_id, &choice.snapshot());

        if choice.directionality == Directionality::In && choice.reveal {
            tracing::warn!(
                "Choice {}:{} is directionality=in with reveal=true; its reveal only shows static content",
                block_id,
                choice_id
            );
        }

        let route = match (choice.directionality, &reveal_id) {
            (Directionality::Out, _) => ResponseRoute::None,
            (Directionality::InNOut, Some(id)) => ResponseRoute::Reveal(id.clone()),
            (Directionality::In, _) | (Directionality::InNOut, None) => ResponseRoute::Conversation,
        };

        let token = match &route {
            ResponseRoute::Reveal(id) => Some(self.begin_generation(id.clone())),
            _ => {
                // 重新激活但不再写回 Reveal 时，旧的在途回复也应作废
                if let Some(id) = &reveal_id {
                    self.supersede(id);
                }
                None
            }
        };

        tracing::debug!(
            "Activated {}:{} ({}), route {:?}",
            block_id,
            choice_id,
            choice.directionality,
            route
        );

        Some(ActivationPlan {
            block_id: block_id.to_string(),
            choice_id: choice_id.to_string(),
            directionality: choice.directionality,
            reveal_id,
            input_data: choice.input_data,
            route,
            token,
        })
    }

    /// 外部回复到达：仅当凭证仍是该 Reveal 的最新一代时写入，返回是否已写入
    pub fn complete(&mut self, token: &GenerationToken, text: impl Into<String>) -> bool {
        match self.generations.get_mut(&token.reveal_id) {
            Some(g) if g.current == token.generation => {
                g.pending = false;
                self.state.update_reveal_content(&token.reveal_id, text);
                true
            }
            _ => {
                tracing::debug!(
                    "Discarding stale response for {} (generation {})",
                    token.reveal_id,
                    token.generation
                );
                false
            }
        }
    }

    /// 外部请求失败：若仍是最新一代，清除 pending 标记
    pub fn fail(&mut self, token: &GenerationToken) {
        if let Some(g) = self.generations.get_mut(&token.reveal_id) {
            if g.current == token.generation {
                g.pending = false;
            }
        }
    }

    /// 放弃全部在途请求（例如用户取消）：之后到达的回复都会被丢弃
    pub fn abandon_all(&mut self) {
        let ids: Vec<RevealId> = self.generations.keys().cloned().collect();
        for id in ids {
            self.supersede(&id);
        }
    }

    /// 该 Reveal 是否有尚未返回的最新请求
    pub fn is_pending(&self, reveal_id: &RevealId) -> bool {
        self.generations
            .get(reveal_id)
            .is_some_and(|g| g.pending)
    }

    /// 切换 Reveal，返回新的 expanded；Reveal 不存在时返回 None
    pub fn toggle(&mut self, reveal_id: &RevealId) -> Option<bool> {
        self.state.toggle_reveal(reveal_id);
        let expanded = self.state.reveal(reveal_id)?.expanded;
        if let Some(observer) = &self.on_reveal_toggle {
            observer(reveal_id, expanded);
        }
        Some(expanded)
    }

    pub fn add_nested_blocks(&mut self, reveal_id: &RevealId, blocks: Vec<Block>) {
        self.state.add_nested_blocks(reveal_id, blocks);
    }

    /// 摄入一条已完成的助手消息：过定界符协议，跳过已处理的消息与已存在的 blockId
    ///
    /// 返回新加入的 blockId。调用方必须保证消息已完整（流式中途不得调用）。
    pub fn ingest_assistant_message(&mut self, message_id: &str, text: &str) -> Option<BlockId> {
        if !self.ingested_messages.insert(message_id.to_string()) {
            tracing::debug!("Message {} already processed", message_id);
            return None;
        }
        if text.trim().is_empty() {
            return None;
        }

        let block = protocol::scan(text).block?;
        if self.state.contains_block(&block.block_id) {
            tracing::info!("Block {} already exists, skipping add", block.block_id);
            return None;
        }

        let block_id = block.block_id.clone();
        tracing::info!(
            "Adding block {} with {} choices from message {}",
            block_id,
            block.choices.len(),
            message_id
        );
        self.state.add_block(block);
        Some(block_id)
    }

    /// 清空渲染状态与全部代际记录
    pub fn clear(&mut self) {
        self.state.clear();
        self.generations.clear();
        self.ingested_messages.clear();
    }

    fn begin_generation(&mut self, reveal_id: RevealId) -> GenerationToken {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.generations.insert(
            reveal_id.clone(),
            Generation {
                current: generation,
                pending: true,
            },
        );
        GenerationToken {
            reveal_id,
            generation,
        }
    }

    fn supersede(&mut self, reveal_id: &RevealId) {
        self.next_generation += 1;
        let generation = self.next_generation;
        if let Some(g) = self.generations.get_mut(reveal_id) {
            g.current = generation;
            g.pending = false;
        }
    }
}

/// 构造 in / in-n-out 选项发给 LLM 的用户消息
///
/// inputData.type 为 continue / explain 时使用对应模板，否则描述所选选项并附上 JSON 数据。
pub fn activation_prompt(block_id: &str, choice_id: &str, input_data: Option<&JsonObject>) -> String {
    let context = input_data
        .and_then(|d| d.get("context"))
        .map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default();

    match input_data.and_then(|d| d.get("type")).and_then(|t| t.as_str()) {
        Some("continue") => format!("Continue our conversation. Previous context: {}", context),
        Some("explain") => format!("Explain more about: {}", context),
        _ => {
            let mut message = format!("User selected: {} from block {}", choice_id, block_id);
            if let Some(data) = input_data {
                let json = serde_json::Value::Object(data.clone());
                message.push_str(&format!("\nData: {}", json));
            }
            message
        }
    }
}
