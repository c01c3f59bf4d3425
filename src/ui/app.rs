//! TUI 应用主循环
//!
//! 进入全屏/原始模式，每帧先把后台 LLM 事件应用到会话，再轮询键盘：
//! ↑↓ 选择选项，Enter 发送输入（输入为空时激活选中项），Tab/空格（输入为空时）切换 Reveal。

use std::io::{self, Stdout};

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;

use super::event::{AppEvent, Command, EventHandler};
use super::render::draw;
use super::session::{HostEvent, Session};

/// 运行 TUI：启用原始模式与全屏，循环处理事件 + 渲染，退出时恢复终端
pub async fn run_app(
    mut session: Session,
    mut events: mpsc::UnboundedReceiver<HostEvent>,
) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut session, &mut events).await;

    session.cancel();
    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    session: &mut Session,
    events: &mut mpsc::UnboundedReceiver<HostEvent>,
) -> anyhow::Result<()> {
    let event_handler = EventHandler::new();
    let mut input_buffer = String::new();

    loop {
        while let Ok(event) = events.try_recv() {
            session.handle(event);
        }

        terminal.draw(|f| draw(f, &*session, &input_buffer))?;

        match event_handler.poll()? {
            Some(AppEvent::Command(Command::Quit)) => break,
            Some(AppEvent::Command(Command::Cancel)) => session.cancel(),
            Some(AppEvent::Command(Command::Clear)) => {
                session.clear();
                input_buffer.clear();
            }
            Some(AppEvent::Key(key)) => match key.code {
                KeyCode::Up => session.select_prev(),
                KeyCode::Down => session.select_next(),
                KeyCode::Tab => session.toggle_selected(),
                KeyCode::Char(' ') if input_buffer.is_empty() => session.toggle_selected(),
                KeyCode::Enter => {
                    let input = input_buffer.trim().to_string();
                    input_buffer.clear();
                    if input.is_empty() {
                        session.activate_selected();
                    } else if matches!(input.to_lowercase().as_str(), "/exit" | "/quit") {
                        break;
                    } else {
                        session.submit(&input);
                    }
                }
                KeyCode::Backspace => {
                    input_buffer.pop();
                }
                KeyCode::Char(c) => input_buffer.push(c),
                _ => {}
            },
            None => {}
        }

        tokio::task::yield_now().await;
    }
    Ok(())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}
