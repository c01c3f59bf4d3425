//! 终端宿主会话：协调器 + 对话历史 + 后台 LLM 任务
//!
//! 与终端无关，便于测试。LLM 请求在 spawn 出的任务中执行，结果经 mpsc 发回，
//! 主循环调用 handle 应用到状态上；取消时作废当前 CancellationToken 并放弃全部在途 Reveal 请求。

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{LlmTimeoutsSection, RelaySection};
use crate::core::{Block, Coordinator, GenerationToken, ResponseRoute, RevealId};
use crate::llm::{Conversation, LlmClient, Message};
use crate::relay;

/// 后台任务发回主循环的事件
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// 主对话流的一个 token
    Token { entry_id: String, token: String },
    /// 主对话流结束
    Done { entry_id: String },
    /// in-n-out 回复完成，按凭证写回 Reveal
    RevealReady { token: GenerationToken, text: String },
    /// 请求失败
    Failed {
        entry_id: Option<String>,
        token: Option<GenerationToken>,
        error: String,
    },
}

/// 宿主会话
pub struct Session {
    coordinator: Coordinator,
    conversation: Conversation,
    llm: Arc<dyn LlmClient>,
    relay: RelaySection,
    timeouts: LlmTimeoutsSection,
    events: mpsc::UnboundedSender<HostEvent>,
    cancel: CancellationToken,
    /// 当前主对话流的子 token；新消息只打断上一条流，不影响在途 Reveal 请求
    stream_cancel: CancellationToken,
    /// 每个 Reveal 最新一次请求的子 token；重新激活时取消旧请求
    reveal_cancels: HashMap<RevealId, CancellationToken>,
    selected: usize,
    /// 最近一条状态/错误提示
    pub status: Option<String>,
    /// 正在流式输出的助手消息
    streaming: Option<String>,
}

impl Session {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        relay: RelaySection,
        timeouts: LlmTimeoutsSection,
        max_turns: usize,
    ) -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let session = Self {
            coordinator: Coordinator::new(),
            conversation: Conversation::new(max_turns),
            llm,
            relay,
            timeouts,
            events,
            stream_cancel: cancel.child_token(),
            reveal_cancels: HashMap::new(),
            cancel,
            selected: 0,
            status: None,
            streaming: None,
        };
        (session, rx)
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn add_block(&mut self, block: Block) {
        self.coordinator.add_block(block);
    }

    /// 是否有主对话流正在输出
    pub fn is_streaming(&self) -> bool {
        self.streaming.is_some()
    }

    /// 可选中的选项（按日志顺序）
    pub fn selectable(&self) -> Vec<RevealId> {
        self.coordinator
            .state()
            .items()
            .iter()
            .filter_map(|item| item.as_choice())
            .map(|(block_id, choice)| RevealId::new(block_id, choice.choice_id.as_str()))
            .collect()
    }

    pub fn selected(&self) -> Option<RevealId> {
        self.selectable().into_iter().nth(self.selected)
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_next(&mut self) {
        let count = self.selectable().len();
        self.selected = (self.selected + 1).min(count.saturating_sub(1));
    }

    /// 激活当前选中的选项，按计划决定是否发请求、回复写到哪里
    pub fn activate_selected(&mut self) {
        let Some(target) = self.selected() else {
            return;
        };
        let Some(plan) = self
            .coordinator
            .activate(&target.block_id, &target.choice_id)
        else {
            return;
        };

        // 旧回复已被协调器作废，对应的请求不必再跑完
        if let Some(previous) = plan
            .reveal_id
            .as_ref()
            .and_then(|id| self.reveal_cancels.remove(id))
        {
            previous.cancel();
        }

        match &plan.route {
            ResponseRoute::None => {}
            ResponseRoute::Conversation => self.send_user_message(plan.prompt()),
            ResponseRoute::Reveal(_) => {
                let Some(token) = plan.token.clone() else {
                    return;
                };
                let mut messages = self.conversation.messages();
                messages.push(Message::user(plan.prompt()));
                self.spawn_reveal_request(token, messages);
            }
        }
    }

    /// 切换当前选中选项的 Reveal；尚未激活过则无效果
    pub fn toggle_selected(&mut self) {
        if let Some(target) = self.selected() {
            self.coordinator.toggle(&target);
        }
    }

    /// 用户输入一条普通消息
    pub fn submit(&mut self, input: &str) {
        let input = input.trim();
        if input.is_empty() {
            return;
        }
        self.send_user_message(input.to_string());
    }

    /// 取消全部在途请求：流式消息按已收到的内容结束，之后到达的回复一律丢弃
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.stream_cancel = self.cancel.child_token();
        self.reveal_cancels.clear();
        self.coordinator.abandon_all();
        if let Some(entry_id) = self.streaming.take() {
            self.conversation.finish(&entry_id);
        }
        self.status = Some("Cancelled".to_string());
        tracing::info!("In-flight requests cancelled");
    }

    /// 清空渲染状态与对话
    pub fn clear(&mut self) {
        self.cancel();
        self.coordinator.clear();
        self.conversation.clear();
        self.selected = 0;
        self.status = None;
    }

    /// 应用一个后台事件
    pub fn handle(&mut self, event: HostEvent) {
        match event {
            HostEvent::Token { entry_id, token } => {
                if self.streaming.as_deref() == Some(entry_id.as_str()) {
                    self.conversation.append(&entry_id, &token);
                }
            }
            HostEvent::Done { entry_id } => {
                if self.streaming.as_deref() != Some(entry_id.as_str()) {
                    return;
                }
                self.streaming = None;
                let Some(text) = self.conversation.finish(&entry_id).map(str::to_string) else {
                    tracing::warn!("Reply {} was pruned before it finished", entry_id);
                    return;
                };
                // 只在消息完整后才跑定界符协议
                self.coordinator.ingest_assistant_message(&entry_id, &text);
            }
            HostEvent::RevealReady { token, text } => {
                if self.coordinator.complete(&token, text) {
                    self.reveal_cancels.remove(&token.reveal_id);
                }
            }
            HostEvent::Failed {
                entry_id,
                token,
                error,
            } => {
                tracing::warn!("LLM request failed: {}", error);
                if let Some(token) = token {
                    self.coordinator.fail(&token);
                    if !self.coordinator.is_pending(&token.reveal_id) {
                        self.reveal_cancels.remove(&token.reveal_id);
                    }
                }
                if let Some(entry_id) = entry_id {
                    if self.streaming.as_deref() == Some(entry_id.as_str()) {
                        self.streaming = None;
                        self.conversation.finish(&entry_id);
                    }
                }
                self.status = Some(error);
            }
        }
    }

    fn send_user_message(&mut self, content: String) {
        if let Some(previous) = self.streaming.take() {
            // 新请求开始前结束上一条流，避免两条流交错写入
            self.stream_cancel.cancel();
            self.conversation.finish(&previous);
        }
        self.stream_cancel = self.cancel.child_token();
        self.status = None;
        self.conversation.push(Message::user(content));
        let messages = self.conversation.messages();
        let entry_id = self.conversation.begin_assistant();
        self.streaming = Some(entry_id.clone());

        let llm = Arc::clone(&self.llm);
        let prompt = relay::system_prompt(&self.relay).to_string();
        let timeouts = self.timeouts.clone();
        let events = self.events.clone();
        let cancel = self.stream_cancel.clone();
        tokio::spawn(async move {
            let messages = relay::inject_system_prompt(messages, &prompt);
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Conversation stream {} cancelled", entry_id);
                }
                _ = stream_conversation(llm, messages, timeouts, entry_id.clone(), events) => {}
            }
        });
    }

    fn spawn_reveal_request(&mut self, token: GenerationToken, messages: Vec<Message>) {
        let llm = Arc::clone(&self.llm);
        let prompt = relay::system_prompt(&self.relay).to_string();
        let timeouts = self.timeouts.clone();
        let events = self.events.clone();
        let cancel = self.cancel.child_token();
        self.reveal_cancels
            .insert(token.reveal_id.clone(), cancel.clone());
        tokio::spawn(async move {
            let messages = relay::inject_system_prompt(messages, &prompt);
            let request = async {
                let mut stream = relay::open_stream(llm.as_ref(), &messages, &timeouts).await?;
                let mut text = String::new();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(|e| crate::core::RelayError::Stream(e.to_string()))?;
                    text.push_str(&chunk);
                }
                Ok::<_, crate::core::RelayError>(text)
            };
            let event = tokio::select! {
                _ = cancel.cancelled() => return,
                result = request => match result {
                    // 生成内容可能带协议载荷，Reveal 里只显示载荷前后的文字
                    Ok(text) => HostEvent::RevealReady { token, text: visible_text(&text) },
                    Err(e) => HostEvent::Failed { entry_id: None, token: Some(token), error: e.to_string() },
                },
            };
            let _ = events.send(event);
        });
    }
}

async fn stream_conversation(
    llm: Arc<dyn LlmClient>,
    messages: Vec<Message>,
    timeouts: LlmTimeoutsSection,
    entry_id: String,
    events: mpsc::UnboundedSender<HostEvent>,
) {
    let fail = |error: String| HostEvent::Failed {
        entry_id: Some(entry_id.clone()),
        token: None,
        error,
    };

    let mut stream = match relay::open_stream(llm.as_ref(), &messages, &timeouts).await {
        Ok(stream) => stream,
        Err(e) => {
            let _ = events.send(fail(e.to_string()));
            return;
        }
    };

    while let Some(token) = stream.next().await {
        match token {
            Ok(token) => {
                let event = HostEvent::Token {
                    entry_id: entry_id.clone(),
                    token,
                };
                if events.send(event).is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = events.send(fail(e.to_string()));
                return;
            }
        }
    }
    let _ = events.send(HostEvent::Done { entry_id });
}

/// 去掉协议载荷后的可见文字
pub fn visible_text(text: &str) -> String {
    let parts = crate::protocol::split_display(text);
    match parts.payload {
        None => text.trim().to_string(),
        Some(_) => [parts.before, parts.after]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demos;
    use crate::llm::{LlmError, MockLlmClient, Role, TokenStream};

    /// 建流即失败的后端
    struct FailingLlm;

    #[async_trait::async_trait]
    impl LlmClient for FailingLlm {
        async fn complete_stream(&self, _messages: &[Message]) -> Result<TokenStream, LlmError> {
            Err(LlmError::Request("upstream down".to_string()))
        }

        fn model(&self) -> &str {
            "failing"
        }
    }

    /// 永不产出 token 的后端
    struct StalledLlm;

    #[async_trait::async_trait]
    impl LlmClient for StalledLlm {
        async fn complete_stream(&self, _messages: &[Message]) -> Result<TokenStream, LlmError> {
            Ok(Box::pin(futures_util::stream::pending::<Result<String, LlmError>>()))
        }

        fn model(&self) -> &str {
            "stalled"
        }
    }

    fn session_with(
        llm: Arc<dyn LlmClient>,
        max_turns: usize,
    ) -> (Session, mpsc::UnboundedReceiver<HostEvent>) {
        Session::new(
            llm,
            RelaySection::default(),
            LlmTimeoutsSection::default(),
            max_turns,
        )
    }

    fn session(llm: MockLlmClient) -> (Session, mpsc::UnboundedReceiver<HostEvent>) {
        session_with(Arc::new(llm), 20)
    }

    async fn drain_until_done(session: &mut Session, rx: &mut mpsc::UnboundedReceiver<HostEvent>) {
        while let Some(event) = rx.recv().await {
            let last = matches!(
                event,
                HostEvent::Done { .. } | HostEvent::RevealReady { .. } | HostEvent::Failed { .. }
            );
            session.handle(event);
            if last {
                break;
            }
        }
    }

    fn select(session: &mut Session, choice_id: &str) {
        while session.selected().map(|id| id.choice_id) != Some(choice_id.to_string()) {
            session.select_next();
        }
    }

    #[tokio::test]
    async fn test_out_choice_reveals_without_request() {
        let (mut s, mut rx) = session(MockLlmClient::default());
        s.add_block(demos::capital_quiz());
        select(&mut s, "c");
        s.activate_selected();

        let id = RevealId::new("q1", "c");
        let reveal = s.coordinator().state().reveal(&id).unwrap();
        assert_eq!(
            reveal.display_content(),
            Some("Correct! Paris is the capital of France.")
        );
        assert!(rx.try_recv().is_err());
        assert!(s.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_in_n_out_fills_reveal() {
        let (mut s, mut rx) = session(MockLlmClient::with_reply("Isolate x first."));
        s.add_block(demos::equation_tutor());
        select(&mut s, "hint");
        s.activate_selected();

        let id = RevealId::new("math1", "hint");
        assert!(s.coordinator().is_pending(&id));
        drain_until_done(&mut s, &mut rx).await;

        let reveal = s.coordinator().state().reveal(&id).unwrap();
        assert_eq!(reveal.display_content(), Some("Isolate x first."));
        assert!(!s.coordinator().is_pending(&id));
        // in-n-out 的回复不进主对话
        assert!(s.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_conversation_reply_adds_block() {
        let reply = "Here you go ⟪QUINT⟫{\"blockId\":\"next\",\"content\":\"Pick\",\"choices\":[{\"choiceId\":\"x\",\"label\":\"X\",\"directionality\":\"out\",\"reveal\":true,\"hiddenContent\":\"Done\"}]}⟫QUINT⟫";
        let (mut s, mut rx) = session(MockLlmClient::with_reply(reply));
        s.submit("Quiz me");
        assert!(s.is_streaming());
        drain_until_done(&mut s, &mut rx).await;

        assert!(!s.is_streaming());
        assert!(s.coordinator().state().contains_block("next"));
        let entries = s.conversation().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].message.role, Role::Assistant);
        assert_eq!(entries[1].message.content, reply);
    }

    #[tokio::test]
    async fn test_in_choice_sends_prompt_to_conversation() {
        let (mut s, mut rx) = session(MockLlmClient::default());
        s.add_block(demos::temple_scene());
        select(&mut s, "enter");
        s.activate_selected();
        drain_until_done(&mut s, &mut rx).await;

        let entries = s.conversation().entries();
        assert!(entries[0]
            .message
            .content
            .starts_with("User selected: enter from block scene1"));
        assert!(entries[1].message.content.starts_with("Echo from Mock: User selected"));
        assert!(s
            .coordinator()
            .state()
            .reveal(&RevealId::new("scene1", "enter"))
            .is_none());
    }

    #[tokio::test]
    async fn test_cancel_drops_late_reveal() {
        let (mut s, mut rx) = session(MockLlmClient::with_reply("late"));
        s.add_block(demos::equation_tutor());
        select(&mut s, "hint");
        s.activate_selected();
        s.cancel();

        // 任务可能在取消前已完成；无论如何凭证已作废，回复不会写入
        if let Ok(Some(event)) =
            tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv()).await
        {
            s.handle(event);
        }
        let reveal = s
            .coordinator()
            .state()
            .reveal(&RevealId::new("math1", "hint"))
            .unwrap();
        assert!(reveal.generated_content.is_none());
        assert_eq!(s.status.as_deref(), Some("Cancelled"));
    }

    #[tokio::test]
    async fn test_failed_reveal_request_clears_pending() {
        let (mut s, mut rx) = session_with(Arc::new(FailingLlm), 20);
        s.add_block(demos::equation_tutor());
        select(&mut s, "hint");
        s.activate_selected();
        drain_until_done(&mut s, &mut rx).await;

        let id = RevealId::new("math1", "hint");
        assert!(!s.coordinator().is_pending(&id));
        assert!(s.coordinator().state().reveal(&id).unwrap().generated_content.is_none());
        assert!(s.reveal_cancels.is_empty());
        assert!(s.status.as_deref().unwrap().contains("upstream down"));
    }

    #[tokio::test]
    async fn test_failed_conversation_stream_finishes_entry() {
        let (mut s, mut rx) = session_with(Arc::new(FailingLlm), 20);
        s.submit("hello");
        drain_until_done(&mut s, &mut rx).await;

        assert!(!s.is_streaming());
        let entries = s.conversation().entries();
        assert_eq!(entries.len(), 2);
        assert!(!entries[1].streaming);
        assert!(s.status.as_deref().unwrap().contains("upstream down"));
    }

    #[tokio::test]
    async fn test_zero_turn_history_still_ingests_reply() {
        let reply = "Hi ⟪QUINT⟫{\"blockId\":\"next\",\"choices\":[]}⟫QUINT⟫";
        let (mut s, mut rx) = session_with(Arc::new(MockLlmClient::with_reply(reply)), 0);
        s.submit("Quiz me");
        drain_until_done(&mut s, &mut rx).await;

        let entries = s.conversation().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].message.content, reply);
        assert!(s.coordinator().state().contains_block("next"));
    }

    #[tokio::test]
    async fn test_reactivation_cancels_previous_reveal_request() {
        let (mut s, _rx) = session_with(Arc::new(StalledLlm), 20);
        s.add_block(demos::equation_tutor());
        select(&mut s, "hint");
        let id = RevealId::new("math1", "hint");

        s.activate_selected();
        let first = s.reveal_cancels[&id].clone();
        s.activate_selected();

        assert!(first.is_cancelled());
        assert!(!s.reveal_cancels[&id].is_cancelled());
        assert!(s.coordinator().is_pending(&id));

        s.cancel();
        assert!(s.reveal_cancels.is_empty());
    }

    #[test]
    fn test_visible_text_hides_payload() {
        assert_eq!(
            visible_text("Hello! ⟪QUINT⟫{\"blockId\":\"b\",\"choices\":[]}⟫QUINT⟫ Bye."),
            "Hello!\nBye."
        );
        assert_eq!(visible_text("  plain  "), "plain");
    }

    #[test]
    fn test_selection_is_clamped() {
        let (mut s, _rx) = session(MockLlmClient::default());
        s.select_next();
        assert!(s.selected().is_none());
        s.add_block(demos::capital_quiz());
        for _ in 0..10 {
            s.select_next();
        }
        assert_eq!(s.selected().unwrap().choice_id, "d");
        s.select_prev();
        assert_eq!(s.selected().unwrap().choice_id, "c");
    }
}
