//! 界面渲染
//!
//! 上方为渲染日志：Block 内容、其下的选项（选中高亮）、选项已激活时内联显示 Reveal；
//! 中部为对话（助手消息中的协议载荷替换为占位行）；底部为输入框与快捷键提示。

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Frame,
};

use crate::core::{Directionality, RenderItem, Reveal, RevealId};
use crate::llm::Role;
use crate::protocol;

use super::session::Session;

/// 将内容按宽度换行，支持 UTF-8（按字符数，避免在 UTF-8 中间截断）
fn wrap_text(s: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![s.to_string()];
    }
    let mut lines = Vec::new();
    for para in s.split('\n') {
        let mut line = String::new();
        for ch in para.chars() {
            if line.chars().count() >= width {
                lines.push(std::mem::take(&mut line));
            }
            line.push(ch);
        }
        lines.push(line);
    }
    lines
}

fn push_wrapped<'a>(
    lines: &mut Vec<Line<'a>>,
    text: &str,
    width: usize,
    first_prefix: Span<'a>,
    indent: &'a str,
    style: Style,
) {
    for (i, line) in wrap_text(text, width).into_iter().enumerate() {
        let prefix = if i == 0 {
            first_prefix.clone()
        } else {
            Span::raw(indent)
        };
        lines.push(Line::from(vec![prefix, Span::styled(line, style)]));
    }
}

fn direction_tag(d: Directionality) -> &'static str {
    match d {
        Directionality::Out => "",
        Directionality::In => " →",
        Directionality::InNOut => " ⇄",
    }
}

/// 渲染日志转为行；返回 (行, 选中选项所在行号)
fn render_log_lines(session: &Session, width: usize) -> (Vec<Line<'static>>, Option<usize>) {
    let state = session.coordinator().state();
    let selected = session.selected();
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut selected_line = None;

    for item in state.items() {
        match item {
            RenderItem::Block { data } => {
                if !lines.is_empty() {
                    lines.push(Line::from(""));
                }
                if let Some(content) = &data.content {
                    push_wrapped(
                        &mut lines,
                        content,
                        width,
                        Span::raw(""),
                        "",
                        Style::default().add_modifier(Modifier::BOLD),
                    );
                }
            }
            RenderItem::Choice { data, block_id } => {
                let id = RevealId::new(block_id.as_str(), data.choice_id.as_str());
                let is_selected = selected.as_ref() == Some(&id);
                if is_selected {
                    selected_line = Some(lines.len());
                }
                let marker = if is_selected { "▶ " } else { "  " };
                let style = if is_selected {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Cyan)
                };
                lines.push(Line::from(vec![
                    Span::styled(marker, style),
                    Span::styled(data.label.clone(), style),
                    Span::styled(
                        direction_tag(data.directionality),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]));

                if let Some(reveal) = state.reveal(&id) {
                    render_reveal(&mut lines, session, reveal, width);
                }
            }
        }
    }

    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "No blocks yet. Type a message to start.",
            Style::default().fg(Color::DarkGray),
        )));
    }
    (lines, selected_line)
}

fn render_reveal(lines: &mut Vec<Line<'static>>, session: &Session, reveal: &Reveal, width: usize) {
    let dim = Style::default().fg(Color::DarkGray);
    if !reveal.expanded {
        lines.push(Line::from(Span::styled("    ▸ (collapsed)", dim)));
        return;
    }

    let body_width = width.saturating_sub(6).max(20);
    let content = reveal.display_content().unwrap_or("");
    if !content.is_empty() {
        push_wrapped(
            lines,
            content,
            body_width,
            Span::styled("    ▾ ", dim),
            "      ",
            Style::default().fg(Color::Green),
        );
    }
    if session.coordinator().is_pending(&reveal.reveal_id) {
        lines.push(Line::from(Span::styled("      generating…", dim)));
    }
    for nested in reveal.nested_blocks.iter().flatten() {
        if let Some(content) = &nested.content {
            push_wrapped(lines, content, body_width, Span::raw("      "), "      ", Style::default());
        }
        for choice in &nested.choices {
            lines.push(Line::from(Span::styled(format!("        · {}", choice.label), dim)));
        }
    }
}

fn conversation_lines(session: &Session, width: usize) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    for (idx, entry) in session.conversation().entries().iter().enumerate() {
        if idx > 0 {
            lines.push(Line::from(""));
        }
        let (prefix, color) = match entry.message.role {
            Role::User => ("You ", Color::Cyan),
            Role::Assistant => ("AI  ", Color::Green),
            Role::System => ("Sys ", Color::Gray),
        };
        let prefix = Span::styled(prefix, Style::default().fg(color).add_modifier(Modifier::BOLD));

        let text = &entry.message.content;
        if entry.message.role != Role::Assistant {
            push_wrapped(&mut lines, text, width, prefix, "    ", Style::default());
            continue;
        }

        // 流式中途载荷可能只有一半，只显示起始标记之前的文字
        let parts = protocol::split_display(text);
        let before = if entry.streaming {
            text.split(protocol::QUINT_START).next().unwrap_or("")
        } else {
            parts.before
        };
        push_wrapped(&mut lines, before, width, prefix, "    ", Style::default());
        if parts.payload.is_some() && !entry.streaming {
            lines.push(Line::from(Span::styled(
                "    [interactive block]",
                Style::default().fg(Color::Magenta),
            )));
            if !parts.after.is_empty() {
                push_wrapped(&mut lines, parts.after, width, Span::raw("    "), "    ", Style::default());
            }
        }
        if entry.streaming {
            lines.push(Line::from(Span::styled("    …", Style::default().fg(Color::DarkGray))));
        }
    }
    lines
}

fn render_scrolled(f: &mut Frame, area: Rect, block: Block<'_>, lines: Vec<Line<'_>>, scroll: usize) {
    let content_height = area.height.saturating_sub(2) as usize;
    let total_lines = lines.len();
    let scroll_offset = scroll.min(total_lines.saturating_sub(content_height));

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll_offset as u16, 0));
    f.render_widget(paragraph, area);

    if total_lines > content_height {
        let mut scrollbar_state = ScrollbarState::new(total_lines)
            .position(scroll_offset)
            .viewport_content_length(content_height);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .thumb_symbol("█")
            .track_symbol(Some("░"));
        f.render_stateful_widget(scrollbar, area, &mut scrollbar_state);
    }
}

/// 绘制一帧：渲染日志（跟随选中项滚动）、对话（停在底部）、输入框
pub fn draw(f: &mut Frame, session: &Session, input_buffer: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(55),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(f.area());

    let log_area = chunks[0];
    let log_width = log_area.width.saturating_sub(3) as usize; // 边框 + 滚动条
    let (log_lines, selected_line) = render_log_lines(session, log_width.max(20));
    let log_height = log_area.height.saturating_sub(2) as usize;
    let log_scroll = selected_line
        .map(|line| line.saturating_sub(log_height / 2))
        .unwrap_or(0);
    let state = session.coordinator().state();
    let log_block = Block::default()
        .title(format!(
            " Quint │ {} items │ {} reveals ",
            state.len(),
            state.reveal_count()
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    render_scrolled(f, log_area, log_block, log_lines, log_scroll);

    let conv_area = chunks[1];
    let conv_width = conv_area.width.saturating_sub(3) as usize;
    let conv_lines = conversation_lines(session, conv_width.max(20));
    let conv_title = if session.is_streaming() {
        " Conversation │ streaming… "
    } else {
        " Conversation "
    };
    let conv_block = Block::default()
        .title(conv_title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));
    render_scrolled(f, conv_area, conv_block, conv_lines, usize::MAX);

    let (input_title, border_color) = match &session.status {
        Some(status) => (
            format!(" {} ", status.chars().take(48).collect::<String>()),
            Color::Red,
        ),
        None => (" Input ".to_string(), Color::Blue),
    };
    let hint = " ↑↓ select │ Enter activate/send │ Tab toggle │ Ctrl+C cancel │ Ctrl+L clear │ Ctrl+Q quit ";
    let input_block = Block::default()
        .title(input_title)
        .title_bottom(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));
    let input = Paragraph::new(input_buffer).block(input_block);
    f.render_widget(input, chunks[2]);
}
