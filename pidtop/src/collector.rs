//! Collector: one identity handshake, then periodic STATS polling into a
//! channel the TUI drains at its own pace.

use std::net::SocketAddr;
use std::time::Duration;

use pidtop_agent::protocol::{self, Meta, Stats};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Small buffer: samples arrive at the poll interval and the renderer
/// drains every frame, so depth only papers over a momentarily busy UI.
const STREAM_DEPTH: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// The agent was unreachable at startup. No retry: this means a wrong
    /// target or a stale registry record, not transient load.
    #[error("failed to dial {addr}: {source}")]
    Dial {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("identity handshake failed: {0}")]
    Handshake(std::io::Error),
    #[error("failed to decode identity snapshot: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Dial the agent, fetch the identity snapshot synchronously, then spawn the
/// polling task. Samples appear on the returned stream in tick order until
/// `cancel` fires, which closes the stream within one tick.
pub async fn collect(
    endpoint: SocketAddr,
    interval: Duration,
    cancel: CancellationToken,
) -> Result<(Meta, mpsc::Receiver<Stats>), CollectError> {
    let meta = fetch_meta(endpoint).await?;

    let (tx, rx) = mpsc::channel(STREAM_DEPTH);
    tokio::spawn(poll(endpoint, interval, tx, cancel));
    Ok((meta, rx))
}

async fn fetch_meta(endpoint: SocketAddr) -> Result<Meta, CollectError> {
    let mut stream = TcpStream::connect(endpoint)
        .await
        .map_err(|source| CollectError::Dial {
            addr: endpoint,
            source,
        })?;
    let reply = exchange(&mut stream, protocol::SIGNAL_META)
        .await
        .map_err(CollectError::Handshake)?;
    Ok(serde_json::from_slice(&reply)?)
}

/// Polling loop. Each tick opens a fresh connection, so a dropped socket or
/// an agent restart never carries state into the next tick. Failed ticks are
/// logged and skipped; the interval itself throttles the retry rate, so
/// there is no backoff and no giving-up point.
async fn poll(
    endpoint: SocketAddr,
    interval: Duration,
    tx: mpsc::Sender<Stats>,
    cancel: CancellationToken,
) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tick.tick() => {}
        }
        match sample_once(endpoint).await {
            Ok(stats) => {
                // Consumer gone means the session is over.
                if tx.send(stats).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("sample tick failed: {e}"),
        }
    }
    debug!("polling stopped");
    // Dropping `tx` closes the stream to the consumer.
}

async fn sample_once(endpoint: SocketAddr) -> Result<Stats, SampleError> {
    let mut stream = TcpStream::connect(endpoint).await?;
    let reply = exchange(&mut stream, protocol::SIGNAL_STATS).await?;
    if reply.is_empty() {
        // The agent's only wire-level error signal: close without payload.
        return Err(SampleError::Rejected);
    }
    Ok(serde_json::from_slice(&reply)?)
}

#[derive(Debug, thiserror::Error)]
enum SampleError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("agent rejected the request (closed without payload)")]
    Rejected,
    #[error("undecodable sample: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One request/response exchange: write the signal byte, read to EOF. The
/// connection close is the message delimiter, per the v1 protocol.
async fn exchange(stream: &mut TcpStream, signal: u8) -> std::io::Result<Vec<u8>> {
    stream.write_all(&[signal]).await?;
    protocol::read_frame(stream).await
}
