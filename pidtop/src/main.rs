//! Entry point for the pidtop diagnoser. Parses args, resolves the target
//! agent, and runs the App over the collector's sample stream.

mod app;
mod collector;
mod history;
mod resolve;
mod ui;

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use pidtop_agent::registry;
use tokio_util::sync::CancellationToken;

use app::App;
use collector::collect;

const DEFAULT_INTERVAL_SECS: u64 = 1;

struct ParsedArgs {
    debug: bool,
    list: bool,
    interval_secs: u64,
    target: Option<String>,
}

enum Invocation {
    Run(ParsedArgs),
    Help,
    Version,
}

fn usage(prog: &str) -> String {
    format!(
        "Usage:
  {prog} [flags] [pid|host:port]

Flags:
  -h, --help            Print this help.
  -v, --version         Print the current version.
      --debug           Write trace logs to debug.log in the config dir.
  -l, --list            List processes where a pidtop agent runs.
  -i, --interval SECS   Seconds between samples (default {DEFAULT_INTERVAL_SECS}, minimum 1).

Examples:
  {prog} 8000
  {prog} host.xz:8080
"
    )
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Invocation, String> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "pidtop".into());
    let mut parsed = ParsedArgs {
        debug: false,
        list: false,
        interval_secs: DEFAULT_INTERVAL_SECS,
        target: None,
    };

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Invocation::Help),
            "-v" | "--version" => return Ok(Invocation::Version),
            "--debug" => parsed.debug = true,
            "-l" | "--list" => parsed.list = true,
            "-i" | "--interval" => {
                let v = it.next().ok_or("--interval needs a value")?;
                parsed.interval_secs = v
                    .parse()
                    .map_err(|_| format!("invalid --interval value {v:?}"))?;
            }
            _ if arg.starts_with("--interval=") => {
                let v = arg.split_once('=').map(|(_, v)| v).unwrap_or_default();
                parsed.interval_secs = v
                    .parse()
                    .map_err(|_| format!("invalid --interval value {v:?}"))?;
            }
            _ if arg.starts_with('-') => {
                return Err(format!("unknown flag {arg:?}\n{}", usage(&prog)));
            }
            _ => {
                if parsed.target.is_some() {
                    return Err(format!("unexpected argument {arg:?}\n{}", usage(&prog)));
                }
                parsed.target = Some(arg);
            }
        }
    }
    Ok(Invocation::Run(parsed))
}

#[tokio::main]
async fn main() -> ExitCode {
    let prog = std::env::args().next().unwrap_or_else(|| "pidtop".into());
    let parsed = match parse_args(std::env::args()) {
        Ok(Invocation::Help) => {
            print!("{}", usage(&prog));
            return ExitCode::SUCCESS;
        }
        Ok(Invocation::Version) => {
            println!("pidtop {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        Ok(Invocation::Run(parsed)) => parsed,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::from(1);
        }
    };

    match run(parsed).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pidtop: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(parsed: ParsedArgs) -> anyhow::Result<()> {
    if parsed.interval_secs < 1 {
        bail!("--interval must be >= 1");
    }

    let registry_dir = registry::config_dir().context("couldn't locate the config dir")?;
    setup_logging(parsed.debug, &registry_dir)?;

    if parsed.list {
        return list_agents(&registry_dir);
    }

    let endpoint = match parsed.target.as_deref() {
        Some(target) => resolve::target_to_addr(target, &registry_dir)?,
        None => resolve::autodiscover(&registry_dir)?,
    };

    let cancel = CancellationToken::new();
    let (meta, rx) = collect(
        endpoint,
        Duration::from_secs(parsed.interval_secs),
        cancel.clone(),
    )
    .await
    .context("failed to start collecting")?;

    App::new(meta, parsed.interval_secs).run(rx, cancel).await
}

/// Debug mode routes trace logs to a file in the config dir; the TUI owns
/// the terminal, so without it logging is discarded entirely.
fn setup_logging(debug: bool, dir: &Path) -> anyhow::Result<()> {
    if !debug {
        return Ok(());
    }
    std::fs::create_dir_all(dir)?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("debug.log"))?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("trace"))
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn list_agents(registry_dir: &Path) -> anyhow::Result<()> {
    let live = resolve::live_records(registry_dir)?;
    if live.is_empty() {
        println!("no running agents found");
        return Ok(());
    }
    let pid_w = live
        .iter()
        .map(|(pid, _)| pid.to_string().len())
        .max()
        .unwrap_or(3)
        .max(3);
    println!("{:>pid_w$}  {:>5}  COMMAND", "PID", "PORT");
    for (pid, port) in live {
        println!("{pid:>pid_w$}  {port:>5}  {}", resolve::command_of(pid));
    }
    Ok(())
}
