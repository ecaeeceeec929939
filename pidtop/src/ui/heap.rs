//! Heap panel: in-use sparkline plus alloc/idle/inuse readouts.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Sparkline},
};

use crate::history::Series;
use crate::ui::util::human;

pub struct HeapNow {
    pub alloc: u64,
    pub idle: u64,
    pub inuse: u64,
}

pub fn draw_heap(f: &mut ratatui::Frame<'_>, area: Rect, hist: &Series, now: Option<&HeapNow>) {
    let block = Block::default().borders(Borders::ALL).title("Heap");
    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.height == 0 {
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(inner);

    let legend = match now {
        Some(h) => Line::from(vec![
            Span::styled(format!("alloc {}", human(h.alloc)), Style::default().fg(Color::Magenta)),
            Span::raw("  "),
            Span::styled(format!("idle {}", human(h.idle)), Style::default().fg(Color::Green)),
            Span::raw("  "),
            Span::styled(format!("inuse {}", human(h.inuse)), Style::default().fg(Color::Yellow)),
        ]),
        None => Line::from("waiting for samples..."),
    };
    f.render_widget(Paragraph::new(legend), rows[0]);

    let data = hist.window(rows[1].width as usize);
    let spark = Sparkline::default()
        .data(&data)
        .max(hist.peak.max(1))
        .style(Style::default().fg(Color::Yellow));
    f.render_widget(spark, rows[1]);
}
