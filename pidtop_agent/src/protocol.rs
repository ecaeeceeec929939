//! Wire contract between the agent and the diagnoser.
//! Keep this module minimal and stable — it defines the v1 wire format.
//!
//! A connection carries exactly one exchange: the client writes a single
//! command byte, the agent writes one JSON document and closes. End of
//! message is the connection close itself, so readers must consume to EOF.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Command byte requesting the identity snapshot.
pub const SIGNAL_META: u8 = 0x01;
/// Command byte requesting a point-in-time sample.
pub const SIGNAL_STATS: u8 = 0x02;

/// Process identity, captured once at handshake. Does not change for the
/// life of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Command")]
    pub command: String,
    /// Parallelism the process is configured to use (affinity/cgroup aware).
    #[serde(rename = "MaxProcs")]
    pub max_procs: usize,
    #[serde(rename = "NumCPU")]
    pub num_cpu: usize,
}

/// One point-in-time measurement. Created fresh per request, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Live concurrency units of the process (OS threads). The wire name
    /// is historical and frozen by the v1 protocol.
    #[serde(rename = "Goroutines")]
    pub threads: u64,
    /// CPU time share in percent; can exceed 100 on multi-core hosts.
    #[serde(rename = "CPUUsage")]
    pub cpu_usage: f64,
    #[serde(rename = "HeapAlloc")]
    pub heap_alloc: u64,
    #[serde(rename = "HeapIdle")]
    pub heap_idle: u64,
    #[serde(rename = "HeapInuse")]
    pub heap_inuse: u64,
}

/// Write one response payload and mark end-of-message by shutting the
/// write side down. The only framing the v1 protocol has.
pub async fn write_frame<W>(w: &mut W, payload: &[u8]) -> std::io::Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    w.write_all(payload).await?;
    w.shutdown().await
}

/// Read one response payload: everything up to EOF.
pub async fn read_frame<R>(r: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncReadExt + Unpin,
{
    let mut buf = Vec::with_capacity(256);
    r.read_to_end(&mut buf).await?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_round_trip() {
        let s = Stats {
            threads: 12,
            cpu_usage: 37.25,
            heap_alloc: 8 * 1024 * 1024,
            heap_idle: 2 * 1024 * 1024,
            heap_inuse: 8 * 1024 * 1024,
        };
        let js = serde_json::to_vec(&s).unwrap();
        let back: Stats = serde_json::from_slice(&js).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn meta_round_trip() {
        let m = Meta {
            username: "jwitty".into(),
            command: "demo --port 9555".into(),
            max_procs: 8,
            num_cpu: 16,
        };
        let js = serde_json::to_string(&m).unwrap();
        let back: Meta = serde_json::from_str(&js).unwrap();
        assert_eq!(m, back);
    }

    #[test]
    fn stats_decodes_v1_field_names() {
        let js = r#"{"Goroutines":5,"CPUUsage":1.5,"HeapAlloc":100,"HeapIdle":200,"HeapInuse":300}"#;
        let s: Stats = serde_json::from_str(js).unwrap();
        assert_eq!(s.threads, 5);
        assert_eq!(s.cpu_usage, 1.5);
        assert_eq!(s.heap_alloc, 100);
        assert_eq!(s.heap_idle, 200);
        assert_eq!(s.heap_inuse, 300);
    }

    #[tokio::test]
    async fn frame_is_close_terminated() {
        let (mut client, mut server) = tokio::io::duplex(64);
        write_frame(&mut server, b"{\"a\":1}").await.unwrap();
        let got = read_frame(&mut client).await.unwrap();
        assert_eq!(got, b"{\"a\":1}");
    }
}
