//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::cpu::{FetchState, Registers, RAM_SIZE};
use crate::cpu::registers::REGISTER_COUNT;
use super::app::DebuggerApp;

/// Bytes per row in the RAM view.
const RAM_ROW: usize = 8;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55),
            Constraint::Percentage(45),
        ])
        .split(frame.area());

    // Left side: program and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_program(frame, left_chunks[0], app);
    draw_status(frame, left_chunks[1], app);

    // Right side: registers, memory and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(REGISTER_COUNT as u16 / 2 + 4),
            Constraint::Min(6),
            Constraint::Length(4),
        ])
        .split(chunks[1]);

    draw_registers(frame, right_chunks[0], app);
    draw_memory(frame, right_chunks[1], app);
    draw_help(frame, right_chunks[2]);
}

/// Draw the program store around the pointer.
fn draw_program(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let view = app.program_view((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = view
        .iter()
        .map(|line| {
            let prefix = if line.is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(&line.addr) { "●" } else { " " };
            let text = format!("{} {}{:04X}: {:02X}  {}", bp, prefix, line.addr, line.byte, line.text);

            let style = if line.is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(&line.addr) {
                Style::default().fg(Color::Red)
            } else if line.text.is_empty() {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };

            ListItem::new(text).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Program ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw the register file, two registers per line.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let values = app.cpu.regs.dump();

    let mut content: Vec<Line> = (0..REGISTER_COUNT / 2)
        .map(|row| {
            let mut spans = Vec::new();
            for index in [row, row + REGISTER_COUNT / 2] {
                let label = Registers::role(index as u8).unwrap_or("");
                spans.push(Span::raw(format!("r{:<2} {:>6} ", index, label)));
                spans.push(Span::styled(
                    format!("{:02X}", values[index]),
                    value_style(values[index]),
                ));
                spans.push(Span::raw("   "));
            }
            Line::from(spans)
        })
        .collect();

    let fetch = match app.cpu.fetch_state() {
        FetchState::Opcode => "opcode".to_string(),
        FetchState::Immediate { sel } => format!("data -> r{}", sel),
    };

    content.push(Line::from(vec![
        Span::raw("Ptr: "),
        Span::styled(format!("{:04X}", app.cpu.pointer()), Style::default().fg(Color::Yellow)),
        Span::raw("   Next: "),
        Span::styled(fetch, Style::default().fg(Color::Cyan)),
    ]));
    content.push(Line::from(vec![
        Span::raw("Cycles: "),
        Span::styled(format!("{}", app.cpu.cycles), Style::default().fg(Color::Cyan)),
        Span::raw("   State: "),
        Span::styled(format!("{:?}", app.cpu.state),
            if app.cpu.is_running() {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Red)
            }),
    ]));

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw working memory as a hex dump.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let start = app.ram_scroll * RAM_ROW;
    let end = (start + visible_rows * RAM_ROW).min(RAM_SIZE);
    let addr_reg = app.cpu.regs.read(crate::cpu::registers::RAM_ADDRESS) as usize;

    let items: Vec<ListItem> = app.cpu.ram.dump(start, end.saturating_sub(start))
        .chunks(RAM_ROW)
        .map(|row| {
            let base = row[0].0;
            let mut spans = vec![Span::raw(format!("{:02X}: ", base))];
            for (addr, value) in row {
                let style = if *addr == addr_reg {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    value_style(*value)
                };
                spans.push(Span::styled(format!("{:02X} ", value), style));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" RAM ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  r: Run  p: Pause  b: Breakpoint"),
        Line::from("x: Reset  ↑↓: Scroll RAM  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}

/// Zero bytes are dimmed.
fn value_style(value: u8) -> Style {
    if value == 0 {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::White)
    }
}
