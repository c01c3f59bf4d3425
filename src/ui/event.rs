//! 事件处理
//!
//! 轮询 crossterm 键盘事件，将 Ctrl+C/Esc/Ctrl+L/Ctrl+Q 转为 Command（Cancel/Clear/Quit），
//! 其余按键交给 run_app 处理选项导航与输入。

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// 快捷键命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// 取消在途请求
    Cancel,
    /// 清空渲染状态与对话
    Clear,
    Quit,
}

/// 应用事件：来自快捷键的 Command 或原始 KeyEvent
#[derive(Debug, Clone)]
pub enum AppEvent {
    Command(Command),
    Key(KeyEvent),
}

/// 事件处理器
#[derive(Debug, Default)]
pub struct EventHandler;

impl EventHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn poll(&self) -> anyhow::Result<Option<AppEvent>> {
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(Some(map_key(key)));
                }
            }
        }
        Ok(None)
    }
}

fn map_key(key: KeyEvent) -> AppEvent {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => AppEvent::Command(Command::Cancel),
        KeyCode::Char('l') if ctrl => AppEvent::Command(Command::Clear),
        KeyCode::Char('q') if ctrl => AppEvent::Command(Command::Quit),
        KeyCode::Esc => AppEvent::Command(Command::Cancel),
        _ => AppEvent::Key(key),
    }
}
