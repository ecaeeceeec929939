//! The in-process sampling agent: a loopback TCP listener serving one-shot
//! META/STATS requests, plus the registry record that makes it discoverable.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::protocol::{self, write_frame};
use crate::registry::{self, RegistryError};
use crate::sampler::Sampler;

fn default_addr() -> SocketAddr {
    // OS-assigned ephemeral port, loopback only.
    SocketAddr::from(([127, 0, 0, 1], 0))
}

// One live agent per process: listener + registry record are process-wide
// singletons. `start` claims this slot, `stop` releases it.
static ACTIVE: AtomicBool = AtomicBool::new(false);

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("an agent is already active in this process")]
    AlreadyActive,
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("unknown signal received: {0:#04x}")]
    UnknownSignal(u8),
    #[error("process is no longer visible to the sampler")]
    ProcessNotVisible,
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Optional settings for [`Agent::start`].
#[derive(Debug, Default, Clone)]
pub struct Options {
    /// Listen address. Defaults to an OS-assigned ephemeral loopback port.
    pub addr: Option<SocketAddr>,
    /// Registry directory override. Defaults to [`registry::config_dir`].
    pub registry_dir: Option<PathBuf>,
}

/// Handle to a running agent. Serving continues until [`Agent::stop`], drop,
/// or process exit; an interrupt/termination signal also cleans up the
/// registry record before the process dies.
pub struct Agent {
    hook: Arc<ShutdownHook>,
    local_addr: SocketAddr,
}

impl Agent {
    /// Start the agent: bind the listener, publish this process's port in
    /// the registry, install the signal-driven cleanup hook, and serve in
    /// the background. Non-blocking; fails fast if an agent is already
    /// active in this process.
    pub async fn start(opts: Options) -> Result<Agent, AgentError> {
        if ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(AgentError::AlreadyActive);
        }
        match Self::bind(opts, true).await {
            Ok(agent) => {
                spawn_signal_hook(agent.hook.clone());
                Ok(agent)
            }
            Err(e) => {
                ACTIVE.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Start without claiming the process-wide slot or installing signal
    /// handling. Lets tests run several independent agents in one process.
    #[doc(hidden)]
    pub async fn start_detached(opts: Options) -> Result<Agent, AgentError> {
        Self::bind(opts, false).await
    }

    async fn bind(opts: Options, owns_slot: bool) -> Result<Agent, AgentError> {
        let dir = match opts.registry_dir {
            Some(d) => d,
            None => registry::config_dir()?,
        };
        std::fs::create_dir_all(&dir).map_err(RegistryError::Io)?;

        let addr = opts.addr.unwrap_or_else(default_addr);
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let pid = std::process::id();
        registry::publish(&dir, pid, local_addr.port())?;
        debug!(pid, port = local_addr.port(), "agent registered");

        let (tx, rx) = watch::channel(false);
        let hook = Arc::new(ShutdownHook {
            dir,
            pid,
            shutdown: tx,
            done: AtomicBool::new(false),
            owns_slot,
        });
        tokio::spawn(serve(listener, Sampler::new(), rx));
        Ok(Agent { hook, local_addr })
    }

    /// The address the agent is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the agent: remove the registry record and end the serving loop.
    /// Idempotent; stopping an already-stopped agent is a no-op.
    pub fn stop(&self) {
        self.hook.run();
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Cleanup shared by graceful `stop`, drop, and external termination
/// signals. Runs at most once.
struct ShutdownHook {
    dir: PathBuf,
    pid: u32,
    shutdown: watch::Sender<bool>,
    done: AtomicBool,
    owns_slot: bool,
}

impl ShutdownHook {
    fn run(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = registry::remove(&self.dir, self.pid) {
            warn!("failed to remove registry record: {e}");
        }
        let _ = self.shutdown.send(true);
        if self.owns_slot {
            ACTIVE.store(false, Ordering::SeqCst);
        }
    }
}

fn spawn_signal_hook(hook: Arc<ShutdownHook>) {
    tokio::spawn(async move {
        let code = wait_for_termination().await;
        hook.run();
        std::process::exit(code);
    });
}

#[cfg(unix)]
async fn wait_for_termination() -> i32 {
    use tokio::signal::unix::{signal, SignalKind};
    let (mut int, mut term, mut quit) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    ) {
        (Ok(i), Ok(t), Ok(q)) => (i, t, q),
        _ => {
            warn!("failed to install signal handlers; registry cleanup on kill disabled");
            return std::future::pending().await;
        }
    };
    tokio::select! {
        _ = int.recv() => 1,
        _ = term.recv() => 0,
        _ = quit.recv() => 1,
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() -> i32 {
    let _ = tokio::signal::ctrl_c().await;
    1
}

/// Serving loop. Connections are accepted sequentially: the one-shot
/// protocol keeps each exchange short, and serving one request at a time
/// bounds resource use on what is a local-trust diagnostic channel.
async fn serve(listener: TcpListener, sampler: Sampler, mut shutdown: watch::Receiver<bool>) {
    loop {
        let conn = tokio::select! {
            // A fired shutdown (or a dropped sender) is permanent.
            _ = shutdown.changed() => break,
            res = listener.accept() => res,
        };
        match conn {
            Ok((stream, peer)) => {
                if let Err(e) = handle_conn(stream, &sampler).await {
                    warn!(%peer, "request failed: {e}");
                }
            }
            Err(e) => warn!("accept failed: {e}"),
        }
    }
    debug!("agent serving loop ended");
}

/// One request/response exchange. An unknown signal closes the connection
/// without writing a payload; that close is the only error the wire carries.
async fn handle_conn(mut stream: TcpStream, sampler: &Sampler) -> Result<(), AgentError> {
    let mut signal = [0u8; 1];
    stream.read_exact(&mut signal).await?;
    let payload = match signal[0] {
        protocol::SIGNAL_META => serde_json::to_vec(&sampler.meta().await?)?,
        protocol::SIGNAL_STATS => serde_json::to_vec(&sampler.stats().await?)?,
        other => return Err(AgentError::UnknownSignal(other)),
    };
    write_frame(&mut stream, &payload).await?;
    Ok(())
}
