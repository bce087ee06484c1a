//! Encoder shutdown with SIGTERM → SIGKILL escalation

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Ask the child to exit, killing it if it is still alive after `grace`.
///
/// Always reaps the child before returning.
pub async fn shutdown_child(mut child: Child, grace: Duration) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        let Some(pid) = child.id() else {
            // already reaped
            return child.wait().await;
        };
        match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => {}
            Err(nix::errno::Errno::ESRCH) => return child.wait().await,
            Err(e) => return Err(io::Error::other(e)),
        }
        if let Ok(result) = tokio::time::timeout(grace, child.wait()).await {
            return result;
        }
        tracing::warn!(pid, "encoder ignored SIGTERM, killing");
    }

    #[cfg(not(unix))]
    let _ = grace;

    child.kill().await?;
    child.wait().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Command;

    #[tokio::test]
    #[cfg(unix)]
    async fn sigterm_is_enough_for_a_cooperative_child() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let status = shutdown_child(child, Duration::from_secs(5)).await.unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn escalates_when_sigterm_is_ignored() {
        let child = Command::new("sh")
            .args(["-c", "trap '' TERM; sleep 30"])
            .spawn()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = std::time::Instant::now();
        shutdown_child(child, Duration::from_millis(200)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn already_exited_child_is_reaped() {
        let child = Command::new("true").spawn().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(shutdown_child(child, Duration::from_secs(1)).await.is_ok());
    }
}
