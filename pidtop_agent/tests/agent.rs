//! Integration tests: a real agent on an ephemeral loopback port, a real
//! TCP client, and a temp registry directory per test.

use std::net::SocketAddr;

use pidtop_agent::protocol::{self, Meta, Stats};
use pidtop_agent::{registry, Agent, AgentError, Options};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

fn opts(dir: &tempfile::TempDir) -> Options {
    Options {
        addr: None,
        registry_dir: Some(dir.path().to_path_buf()),
    }
}

async fn request(addr: SocketAddr, signal: u8) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.expect("connect to agent");
    stream.write_all(&[signal]).await.expect("send signal");
    protocol::read_frame(&mut stream).await.expect("read reply")
}

#[tokio::test]
async fn meta_signal_returns_identity_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let agent = Agent::start_detached(opts(&dir)).await.unwrap();

    let reply = request(agent.local_addr(), protocol::SIGNAL_META).await;
    let meta: Meta = serde_json::from_slice(&reply).expect("decodable meta");
    assert!(meta.num_cpu >= 1);
    assert!(meta.max_procs >= 1);
}

#[tokio::test]
async fn stats_signal_returns_fresh_sample() {
    let dir = tempfile::tempdir().unwrap();
    let agent = Agent::start_detached(opts(&dir)).await.unwrap();

    let reply = request(agent.local_addr(), protocol::SIGNAL_STATS).await;
    let stats: Stats = serde_json::from_slice(&reply).expect("decodable stats");
    assert!(stats.threads >= 1);
    assert!(stats.heap_inuse > 0);
}

#[tokio::test]
async fn unknown_signal_closes_without_payload() {
    let dir = tempfile::tempdir().unwrap();
    let agent = Agent::start_detached(opts(&dir)).await.unwrap();

    let reply = request(agent.local_addr(), 0xab).await;
    assert!(reply.is_empty(), "unexpected payload: {reply:?}");

    // The loop survives the bad request and keeps serving.
    let reply = request(agent.local_addr(), protocol::SIGNAL_STATS).await;
    assert!(!reply.is_empty());
}

#[tokio::test]
async fn bad_request_does_not_stall_later_clients() {
    let dir = tempfile::tempdir().unwrap();
    let agent = Agent::start_detached(opts(&dir)).await.unwrap();

    // Client that connects and walks away without sending anything.
    let dead = TcpStream::connect(agent.local_addr()).await.unwrap();
    drop(dead);

    let reply = request(agent.local_addr(), protocol::SIGNAL_META).await;
    assert!(!reply.is_empty());
}

#[tokio::test]
async fn publishes_record_then_removes_it_on_stop() {
    let dir = tempfile::tempdir().unwrap();
    let agent = Agent::start_detached(opts(&dir)).await.unwrap();
    let pid = std::process::id();

    let port = registry::lookup(dir.path(), pid).expect("record published");
    assert_eq!(port, agent.local_addr().port());

    agent.stop();
    assert!(matches!(
        registry::lookup(dir.path(), pid),
        Err(registry::RegistryError::NotFound(_))
    ));

    // Double stop is a no-op.
    agent.stop();
}

#[tokio::test]
async fn second_start_fails_without_disturbing_the_first() {
    // Uses the public `start` path, which claims the process-wide slot; all
    // assertions about that slot live in this one test so parallel test
    // threads never race on it.
    let dir = tempfile::tempdir().unwrap();
    let first = Agent::start(opts(&dir)).await.unwrap();

    let second = Agent::start(opts(&dir)).await;
    assert!(matches!(second, Err(AgentError::AlreadyActive)));

    // First agent still serves and its record is intact.
    let reply = request(first.local_addr(), protocol::SIGNAL_META).await;
    assert!(!reply.is_empty());
    assert_eq!(
        registry::lookup(dir.path(), std::process::id()).unwrap(),
        first.local_addr().port()
    );

    // Releasing the slot allows a fresh start.
    first.stop();
    let third = Agent::start(opts(&dir)).await.unwrap();
    third.stop();
}
