//! Concurrency-load sparkline: live thread count of the target.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, Sparkline},
};

use crate::history::Series;

pub fn draw_threads(f: &mut ratatui::Frame<'_>, area: Rect, hist: &Series) {
    let title = match hist.last() {
        Some(v) => format!("Threads (now: {v})"),
        None => "Threads".into(),
    };
    let data = hist.window(area.width.saturating_sub(2) as usize);
    let spark = Sparkline::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .data(&data)
        .max(hist.peak.max(1))
        .style(Style::default().fg(Color::Green));
    f.render_widget(spark, area);
}
