//! 对话消息与短期对话历史
//!
//! Message 是 LLM 客户端与转发代理共用的扁平消息（角色 + 纯文本）；
//! Conversation 保留最近 N 轮，并为每条消息分配 ID，供宿主判断某条助手消息是否已摄入过 Quint 载荷。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 带 ID 的对话条目
#[derive(Clone, Debug)]
pub struct Entry {
    pub id: String,
    pub message: Message,
    /// 助手消息是否仍在流式输出
    pub streaming: bool,
}

/// 短期对话历史：最近 N 轮（每轮含 user + assistant，故实际保留约 max_turns*2 条消息）
#[derive(Clone, Debug)]
pub struct Conversation {
    entries: Vec<Entry>,
    max_turns: usize,
    next_id: u64,
}

impl Conversation {
    pub fn new(max_turns: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_turns,
            next_id: 0,
        }
    }

    /// 追加一条完整消息，返回其 ID
    pub fn push(&mut self, message: Message) -> String {
        self.push_entry(message, false)
    }

    /// 开始一条流式助手消息（内容为空），返回其 ID
    pub fn begin_assistant(&mut self) -> String {
        self.push_entry(Message::assistant(String::new()), true)
    }

    /// 向流式消息追加 token；消息已被剪枝时忽略
    pub fn append(&mut self, id: &str, token: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            entry.message.content.push_str(token);
        }
    }

    /// 结束流式输出，返回完整文本
    pub fn finish(&mut self, id: &str) -> Option<&str> {
        let entry = self.entries.iter_mut().find(|e| e.id == id)?;
        entry.streaming = false;
        Some(entry.message.content.as_str())
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// 发给 LLM 的消息（不含仍在流式输出的条目）
    pub fn messages(&self) -> Vec<Message> {
        self.entries
            .iter()
            .filter(|e| !e.streaming)
            .map(|e| e.message.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push_entry(&mut self, message: Message, streaming: bool) -> String {
        self.next_id += 1;
        let id = format!("msg-{}", self.next_id);
        self.entries.push(Entry {
            id: id.clone(),
            message,
            streaming,
        });
        self.prune();
        id
    }

    /// 超出 max_turns*2 时丢弃最旧的已完成消息；至少保留一轮，流式中的条目永不丢弃
    fn prune(&mut self) {
        let keep = self.max_turns.max(1) * 2;
        while self.entries.len() > keep {
            match self.entries.iter().position(|e| !e.streaming) {
                Some(oldest) => {
                    self.entries.remove(oldest);
                }
                None => break,
            }
        }
    }
}
