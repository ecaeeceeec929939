//! App state and main loop: input handling, draining the sample stream,
//! updating history, and drawing.
//!
//! Redraw cadence is the App's own; samples arrive whenever the collector
//! publishes them and are drained without blocking. A missed sample is
//! simply absent from the series.

use std::{io, time::Duration};

use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use pidtop_agent::protocol::{Meta, Stats};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Terminal,
};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::history::Series;
use crate::ui::{
    cpu::draw_cpu,
    header::draw_header,
    heap::{draw_heap, HeapNow},
    threads::draw_threads,
};

const HISTORY_CAP: usize = 600;

pub struct App {
    meta: Meta,
    interval_secs: u64,

    // CPU is stored in tenths of a percent so sparklines keep one decimal.
    cpu_hist: Series,
    thread_hist: Series,
    heap_hist: Series,
    last: Option<Stats>,

    should_quit: bool,
}

impl App {
    pub fn new(meta: Meta, interval_secs: u64) -> Self {
        Self {
            meta,
            interval_secs,
            cpu_hist: Series::new(HISTORY_CAP),
            thread_hist: Series::new(HISTORY_CAP),
            heap_hist: Series::new(HISTORY_CAP),
            last: None,
            should_quit: false,
        }
    }

    /// Run the TUI until the operator quits or the sample stream closes.
    /// Quitting fires `cancel`, which is what stops the collector.
    pub async fn run(
        &mut self,
        rx: mpsc::Receiver<Stats>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        // Terminal setup
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let res = self.event_loop(&mut terminal, rx, &cancel).await;

        // Teardown, even on error.
        cancel.cancel();
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        res
    }

    async fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        mut rx: mpsc::Receiver<Stats>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        loop {
            // Input (non-blocking)
            while event::poll(Duration::from_millis(10))? {
                if let Event::Key(k) = event::read()? {
                    if matches!(k.code, KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc) {
                        self.should_quit = true;
                    }
                }
            }
            if self.should_quit {
                cancel.cancel();
                return Ok(());
            }

            // Drain whatever samples arrived since the last frame.
            loop {
                match rx.try_recv() {
                    Ok(stats) => self.ingest(stats),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        // Collector is gone; nothing more will arrive.
                        return Ok(());
                    }
                }
            }

            terminal.draw(|f| {
                let rows = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Length(2),
                        Constraint::Ratio(1, 3),
                        Constraint::Ratio(1, 3),
                        Constraint::Min(4),
                    ])
                    .split(f.area());

                draw_header(f, rows[0], &self.meta, self.interval_secs);
                draw_threads(f, rows[1], &self.thread_hist);
                draw_cpu(f, rows[2], &self.cpu_hist);
                let now = self.last.as_ref().map(|s| HeapNow {
                    alloc: s.heap_alloc,
                    idle: s.heap_idle,
                    inuse: s.heap_inuse,
                });
                draw_heap(f, rows[3], &self.heap_hist, now.as_ref());
            })?;

            sleep(Duration::from_millis(100)).await;
        }
    }

    fn ingest(&mut self, stats: Stats) {
        self.thread_hist.push(stats.threads);
        self.cpu_hist
            .push((stats.cpu_usage.max(0.0) * 10.0).round() as u64);
        self.heap_hist.push(stats.heap_inuse);
        self.last = Some(stats);
    }
}
