//! Turning the operator's target argument into an endpoint to dial.
//!
//! Three shapes: `host:port` is an explicit remote endpoint, a bare integer
//! is a pid to resolve through the port registry, and no argument at all
//! means "find the one local agent yourself".

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use pidtop_agent::registry;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

/// Resolve an explicit target string.
pub fn target_to_addr(target: &str, registry_dir: &Path) -> anyhow::Result<SocketAddr> {
    if target.contains(':') {
        return target
            .to_socket_addrs()
            .with_context(|| format!("couldn't parse target address {target:?}"))?
            .next()
            .ok_or_else(|| anyhow!("target {target:?} resolved to no addresses"));
    }

    let pid: u32 = target
        .parse()
        .with_context(|| format!("target {target:?} is neither host:port nor a pid"))?;
    let port = registry::lookup(registry_dir, pid)
        .with_context(|| format!("couldn't find an agent for pid {pid}"))?;
    Ok(loopback(port))
}

/// No target given: scan the registry for records of live processes. Exactly
/// one live agent is unambiguous; anything else needs the operator.
pub fn autodiscover(registry_dir: &Path) -> anyhow::Result<SocketAddr> {
    let live = live_records(registry_dir)?;
    match live.as_slice() {
        [] => bail!("no running agents found; pass a pid or host:port"),
        [(_, port)] => Ok(loopback(*port)),
        many => bail!(
            "multiple agents found (pids {}); pass the pid to attach to",
            many.iter()
                .map(|(pid, _)| pid.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Registry records whose pid belongs to a live process. Records left behind
/// by an unclean kill are skipped, not trusted.
pub fn live_records(registry_dir: &Path) -> anyhow::Result<Vec<(u32, u16)>> {
    let pids = registry::list(registry_dir).context("couldn't read the agent registry")?;
    if pids.is_empty() {
        return Ok(Vec::new());
    }
    let sys = System::new_with_specifics(
        RefreshKind::nothing().with_processes(ProcessRefreshKind::nothing()),
    );
    let mut live = Vec::new();
    for pid in pids {
        if sys.process(Pid::from_u32(pid)).is_none() {
            continue;
        }
        if let Ok(port) = registry::lookup(registry_dir, pid) {
            live.push((pid, port));
        }
    }
    Ok(live)
}

/// Command line of a live process, for the `--list` table.
pub fn command_of(pid: u32) -> String {
    let mut sys = System::new();
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[Pid::from_u32(pid)]),
        false,
        ProcessRefreshKind::nothing().with_cmd(sysinfo::UpdateKind::Always),
    );
    sys.process(Pid::from_u32(pid))
        .map(|p| {
            p.cmd()
                .iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_port_is_an_explicit_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let addr = target_to_addr("127.0.0.1:8080", dir.path()).unwrap();
        assert_eq!(addr, "127.0.0.1:8080".parse().unwrap());
    }

    #[test]
    fn bare_pid_resolves_through_the_registry() {
        let dir = tempfile::tempdir().unwrap();
        registry::publish(dir.path(), 4242, 39000).unwrap();
        let addr = target_to_addr("4242", dir.path()).unwrap();
        assert_eq!(addr, loopback(39000));
    }

    #[test]
    fn unknown_pid_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(target_to_addr("4242", dir.path()).is_err());
    }

    #[test]
    fn garbage_target_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(target_to_addr("not-a-target", dir.path()).is_err());
    }

    #[test]
    fn autodiscover_prefers_the_single_live_agent() {
        let dir = tempfile::tempdir().unwrap();
        // Our own pid is certainly alive; a nonsense pid certainly is not.
        registry::publish(dir.path(), std::process::id(), 39001).unwrap();
        registry::publish(dir.path(), u32::MAX - 1, 39002).unwrap();
        let addr = autodiscover(dir.path()).unwrap();
        assert_eq!(addr, loopback(39001));
    }

    #[test]
    fn autodiscover_with_no_records_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(autodiscover(dir.path()).is_err());
    }
}
