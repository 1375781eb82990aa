//! Process supervisor: spawn the daemon control binary with a fixed argument
//! vector, a wall-clock timeout, and captured output.
//!
//! No shell is involved anywhere; arguments are discrete tokens. The basedir
//! is always argv[1] and never comes from caller input. Callers always get a
//! `RunOutcome` back: spawn failures, timeouts, and signals are results, not
//! errors.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Environment variable the daemon treats as a basedir override. It must not
/// reach the child: when set, the daemon ignores the positional basedir and
/// every following argument shifts by one.
pub const BASEDIR_ENV_OVERRIDE: &str = "FEDD_BASEDIR";

/// Exit code reported when the executable could not be spawned at all.
pub const SPAWN_FAILURE_CODE: i32 = 127;

/// Outcome of one supervised invocation.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Exit code; None when the process was terminated by a signal.
    pub code: Option<i32>,
    /// Signal name when terminated by a signal (e.g. "SIGKILL").
    pub signal: Option<String>,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutcome {
    /// Success iff the process exited normally with code 0.
    pub fn ok(&self) -> bool {
        self.code == Some(0)
    }

    fn spawn_failure(stderr: String) -> Self {
        Self {
            code: Some(SPAWN_FAILURE_CODE),
            signal: None,
            stdout: String::new(),
            stderr,
        }
    }
}

/// Run `<executable> <command> <basedir> <args...>` under a wall-clock
/// timeout, capturing stdout and stderr into independent buffers. On timeout
/// the child is killed (SIGKILL) and a diagnostic note is appended to the
/// captured stderr.
pub async fn run(
    executable: &Path,
    command: &str,
    basedir: &Path,
    args: &[String],
    timeout: Duration,
) -> RunOutcome {
    let spawned = Command::new(executable)
        .arg(command)
        .arg(basedir)
        .args(args)
        .env_remove(BASEDIR_ENV_OVERRIDE)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(c) => c,
        Err(e) => {
            return RunOutcome::spawn_failure(format!("spawn {}: {}", executable.display(), e))
        }
    };

    // Drain both pipes concurrently while waiting, so a chatty child cannot
    // block on a full pipe buffer.
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(ref mut pipe) = stdout_pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(ref mut pipe) = stderr_pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });

    let mut timed_out = false;
    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(res) => res,
        Err(_) => {
            timed_out = true;
            let _ = child.start_kill();
            child.wait().await
        }
    };

    let stdout = String::from_utf8_lossy(&stdout_task.await.unwrap_or_default()).into_owned();
    let mut stderr = String::from_utf8_lossy(&stderr_task.await.unwrap_or_default()).into_owned();
    if timed_out {
        stderr.push_str(&format!(
            "\n[fedadmin] timeout after {}ms; process killed\n",
            timeout.as_millis()
        ));
    }

    match status {
        Ok(status) => RunOutcome {
            code: status.code(),
            signal: exit_signal(&status),
            stdout,
            stderr,
        },
        Err(e) => {
            stderr.push_str(&format!("\nwait: {}", e));
            RunOutcome {
                code: Some(SPAWN_FAILURE_CODE),
                signal: None,
                stdout,
                stderr,
            }
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(signal_name)
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<String> {
    None
}

#[cfg(unix)]
fn signal_name(sig: i32) -> String {
    match sig {
        1 => "SIGHUP".to_string(),
        2 => "SIGINT".to_string(),
        6 => "SIGABRT".to_string(),
        9 => "SIGKILL".to_string(),
        13 => "SIGPIPE".to_string(),
        15 => "SIGTERM".to_string(),
        n => format!("SIG{}", n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Instant;

    #[cfg(unix)]
    fn write_script(body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = std::env::temp_dir().join(format!("fedadmin-exec-test-{}", uuid::Uuid::new_v4()));
        std::fs::write(&path, body).expect("write script");
        let mut perms = std::fs::metadata(&path).expect("stat").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod");
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn argv_reaches_child_in_order() {
        let script = write_script("#!/bin/sh\necho \"$@\"\n");
        let outcome = run(
            &script,
            "state",
            Path::new("/srv/fedd/data"),
            &["walter".to_string()],
            Duration::from_secs(5),
        )
        .await;
        assert!(outcome.ok(), "stderr: {}", outcome.stderr);
        assert_eq!(outcome.stdout, "state /srv/fedd/data walter\n");
        assert_eq!(outcome.signal, None);
        let _ = std::fs::remove_file(&script);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_and_stderr_are_captured_separately() {
        let script = write_script("#!/bin/sh\necho out\necho err 1>&2\nexit 3\n");
        let outcome = run(
            &script,
            "state",
            Path::new("/tmp"),
            &[],
            Duration::from_secs(5),
        )
        .await;
        assert!(!outcome.ok());
        assert_eq!(outcome.code, Some(3));
        assert_eq!(outcome.stdout, "out\n");
        assert_eq!(outcome.stderr, "err\n");
        let _ = std::fs::remove_file(&script);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_the_child() {
        let script = write_script("#!/bin/sh\nexec sleep 5\n");
        let started = Instant::now();
        let outcome = run(
            &script,
            "state",
            Path::new("/tmp"),
            &[],
            Duration::from_millis(200),
        )
        .await;
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(!outcome.ok());
        assert_eq!(outcome.signal.as_deref(), Some("SIGKILL"));
        assert!(outcome.stderr.contains("timeout after 200ms"));
        let _ = std::fs::remove_file(&script);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn basedir_override_is_stripped_from_child_env() {
        let script = write_script("#!/bin/sh\necho \"${FEDD_BASEDIR:-unset}\"\n");
        std::env::set_var(BASEDIR_ENV_OVERRIDE, "/evil/override");
        let outcome = run(
            &script,
            "state",
            Path::new("/tmp"),
            &[],
            Duration::from_secs(5),
        )
        .await;
        std::env::remove_var(BASEDIR_ENV_OVERRIDE);
        assert!(outcome.ok(), "stderr: {}", outcome.stderr);
        assert_eq!(outcome.stdout, "unset\n");
        let _ = std::fs::remove_file(&script);
    }

    #[tokio::test]
    async fn spawn_failure_is_a_result_not_an_error() {
        let outcome = run(
            Path::new("/nonexistent/fedadmin-no-such-binary"),
            "state",
            Path::new("/tmp"),
            &[],
            Duration::from_secs(1),
        )
        .await;
        assert!(!outcome.ok());
        assert_eq!(outcome.code, Some(SPAWN_FAILURE_CODE));
        assert!(!outcome.stderr.is_empty());
    }
}
