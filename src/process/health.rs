//! Process liveness and readiness checks.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant, MissedTickBehavior};

/// Checks if a process with the given PID is currently running.
///
/// Uses sysinfo to query the process table. Zombies (exited but not yet
/// reaped by their parent) count as not running.
pub fn is_running(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

    system
        .process(pid)
        .is_some_and(|p| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
}

/// Poll `port` on the loopback interface until it accepts a TCP connection.
///
/// Returns `false` if nothing accepted within `limit`.
pub async fn wait_for_port(port: u16, limit: Duration, every: Duration) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let deadline = Instant::now() + limit;
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => {
                tracing::debug!(port = port, "Port accepting connections");
                return true;
            },
            Ok(Err(e)) => {
                tracing::trace!(port = port, error = %e, "Port not ready");
            },
            Err(_) => {},
        }

        if Instant::now() >= deadline {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materialize::ports::free_port;

    #[test]
    fn test_current_process_is_running() {
        assert!(is_running(std::process::id()));
    }

    #[test]
    fn test_unknown_pid_is_not_running() {
        assert!(!is_running(u32::MAX - 1));
    }

    #[tokio::test]
    async fn test_wait_for_listening_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(wait_for_port(port, Duration::from_secs(2), Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn test_wait_for_closed_port_times_out() {
        let port = free_port().unwrap();
        let started = std::time::Instant::now();

        assert!(!wait_for_port(port, Duration::from_millis(200), Duration::from_millis(20)).await);
        assert!(started.elapsed() >= Duration::from_millis(200));
    }
}
