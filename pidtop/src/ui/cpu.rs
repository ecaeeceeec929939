//! CPU usage sparkline.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, Sparkline},
};

use crate::history::Series;

pub fn draw_cpu(f: &mut ratatui::Frame<'_>, area: Rect, hist: &Series) {
    let title = match hist.last() {
        Some(v) => format!("CPU (now: {:>5.1}%)", v as f64 / 10.0),
        None => "CPU".into(),
    };
    let data = hist.window(area.width.saturating_sub(2) as usize);
    // Stored in tenths of a percent; scale against the peak so multi-core
    // loads above 100% still chart sensibly.
    let spark = Sparkline::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .data(&data)
        .max(hist.peak.max(1000))
        .style(Style::default().fg(Color::Cyan));
    f.render_widget(spark, area);
}
