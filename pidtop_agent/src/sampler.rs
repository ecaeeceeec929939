//! Per-request capture of the host process's identity and stats.
//!
//! The `System` handle is persistent (CPU usage is a delta between two
//! refreshes), but every request still refreshes this process's entry, so a
//! response always reflects the instant it was served.

use std::ffi::OsString;

use sysinfo::{
    CpuRefreshKind, MemoryRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind,
    System, UpdateKind, Users,
};
use tokio::sync::Mutex;

use crate::agent::AgentError;
use crate::protocol::{Meta, Stats};

pub struct Sampler {
    pid: Pid,
    sys: Mutex<System>,
}

impl Sampler {
    pub fn new() -> Self {
        let pid = Pid::from_u32(std::process::id());
        let mut sys = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );
        // Seed the CPU baseline so the first STATS response is a real delta.
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            false,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );
        Self {
            pid,
            sys: Mutex::new(sys),
        }
    }

    /// Identity snapshot. Fetched once per session by the diagnoser.
    pub async fn meta(&self) -> Result<Meta, AgentError> {
        let mut sys = self.sys.lock().await;
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            false,
            ProcessRefreshKind::nothing()
                .with_cmd(UpdateKind::OnlyIfNotSet)
                .with_user(UpdateKind::OnlyIfNotSet),
        );
        let proc = sys.process(self.pid).ok_or(AgentError::ProcessNotVisible)?;

        let users = Users::new_with_refreshed_list();
        let username = proc
            .user_id()
            .and_then(|uid| users.get_user_by_id(uid))
            .map(|u| u.name().to_string())
            .unwrap_or_else(|| "unknown".into());
        let command = join_cmdline(proc.cmd());

        Ok(Meta {
            username,
            command,
            max_procs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            num_cpu: sys.cpus().len(),
        })
    }

    /// Point-in-time sample, fresh on every call.
    pub async fn stats(&self) -> Result<Stats, AgentError> {
        let mut sys = self.sys.lock().await;
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            false,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );
        let proc = sys.process(self.pid).ok_or(AgentError::ProcessNotVisible)?;

        let resident = proc.memory();
        let virt = proc.virtual_memory();
        Ok(Stats {
            threads: thread_count(self.pid.as_u32()),
            cpu_usage: proc.cpu_usage() as f64,
            heap_alloc: resident,
            heap_idle: virt.saturating_sub(resident),
            heap_inuse: resident,
        })
    }
}

fn join_cmdline(cmd: &[OsString]) -> String {
    cmd.iter()
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Live OS threads of the process. `/proc` has the exact number on Linux;
/// elsewhere report 1 rather than guessing.
#[cfg(target_os = "linux")]
fn thread_count(pid: u32) -> u64 {
    std::fs::read_to_string(format!("/proc/{pid}/status"))
        .ok()
        .and_then(|status| {
            status
                .lines()
                .find_map(|l| l.strip_prefix("Threads:"))
                .and_then(|v| v.trim().parse().ok())
        })
        .unwrap_or(1)
}

#[cfg(not(target_os = "linux"))]
fn thread_count(_pid: u32) -> u64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn meta_reflects_this_process() {
        let sampler = Sampler::new();
        let meta = sampler.meta().await.unwrap();
        assert!(meta.num_cpu >= 1);
        assert!(meta.max_procs >= 1);
        assert!(!meta.command.is_empty());
    }

    #[tokio::test]
    async fn stats_are_plausible() {
        let sampler = Sampler::new();
        let stats = sampler.stats().await.unwrap();
        assert!(stats.threads >= 1);
        assert!(stats.heap_inuse > 0);
        assert!(stats.cpu_usage >= 0.0);
    }
}
