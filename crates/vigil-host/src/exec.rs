//! External command execution
//!
//! The auditor never touches the OS directly; it goes through this
//! collaborator. The system implementation enforces a hard timeout and
//! kills the child process when it expires. Spawn failures and non-zero
//! exits surface as `None`, never as errors.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Run an executable, capture stdout, enforce a timeout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Option<String>;
}

/// Runner backed by `tokio::process`
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Option<String> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout must terminate the child.
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!("spawn {program}: {e}");
                return None;
            }
        };

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!("wait {program}: {e}");
                return None;
            }
            Err(_) => {
                tracing::warn!("{program} timed out after {}s", timeout.as_secs());
                return None;
            }
        };

        if output.status.success() {
            Some(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            tracing::debug!("{program} exited with {}", output.status);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout() {
        let runner = SystemRunner;
        let out = runner
            .run("echo", &["hello"], Duration::from_secs(5))
            .await
            .expect("echo should succeed");
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_none() {
        let runner = SystemRunner;
        let out = runner
            .run("definitely-not-a-real-binary", &[], Duration::from_secs(1))
            .await;
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn test_timeout_is_none() {
        let runner = SystemRunner;
        let started = std::time::Instant::now();
        let out = runner
            .run("sleep", &["30"], Duration::from_millis(200))
            .await;
        assert!(out.is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
