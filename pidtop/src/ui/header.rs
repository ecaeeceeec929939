//! Top header line with the target's identity snapshot.

use pidtop_agent::protocol::Meta;
use ratatui::{
    layout::Rect,
    widgets::{Block, Borders},
};

pub fn draw_header(f: &mut ratatui::Frame<'_>, area: Rect, meta: &Meta, interval_secs: u64) {
    let title = format!(
        "pidtop — user: {} | cmd: {} | maxprocs: {}/{} cpus | every {}s  (press 'q' to quit)",
        meta.username, meta.command, meta.max_procs, meta.num_cpu, interval_secs
    );
    f.render_widget(Block::default().title(title).borders(Borders::BOTTOM), area);
}
