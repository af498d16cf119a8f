//! Rotation hook execution.
//!
//! A rotation hook is a user-supplied shell command expected to refresh
//! the upstream credential out-of-band. Hooks run through `sh -c` under a
//! hard deadline; at most one hook executes at a time, process-wide.

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing::warn;
use wait_timeout::ChildExt;

use crate::core::audit::{AuditEntry, AuditLogger};
use crate::core::store::Store;
use crate::core::types::{AuditAction, RotationResult, SecretRef};
use crate::error::{Result, RotationError};

/// Supervised rotation hook executor.
pub struct RotationExecutor {
    // Serializes rotations process-wide; concurrent callers queue here.
    gate: Mutex<()>,
    store: Arc<Store>,
    audit: Arc<AuditLogger>,
    timeout: Duration,
}

impl RotationExecutor {
    pub fn new(store: Arc<Store>, audit: Arc<AuditLogger>, timeout: Duration) -> Self {
        Self {
            gate: Mutex::new(()),
            store,
            audit,
            timeout,
        }
    }

    /// Execute the rotation hook for one secret.
    ///
    /// Every hook that actually ran yields `Ok` with a structured
    /// [`RotationResult`] — including failures and timeouts, which carry
    /// the captured output and an error message. `Err` is reserved for
    /// hooks that never ran: unknown secret, no hook configured, or a
    /// spawn failure.
    pub fn rotate(&self, r: &SecretRef) -> Result<RotationResult> {
        let _serialized = self.gate.lock().expect("rotation gate poisoned");

        let secret = self.store.metadata(r)?;
        let command = secret
            .rotate_via
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| RotationError::NoHook(r.to_string()))?;

        let mut result = RotationResult {
            secret_name: r.to_string(),
            success: false,
            output: String::new(),
            error: None,
            timed_out: false,
            executed_at: Utc::now(),
        };

        let mut child = Command::new("sh")
            .args(["-c", &command])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain the pipes from their own threads so a chatty hook cannot
        // fill the pipe buffer and wedge against the deadline wait.
        let stdout_reader = spawn_pipe_reader(child.stdout.take());
        let stderr_reader = spawn_pipe_reader(child.stderr.take());

        let status = match child.wait_timeout(self.timeout)? {
            Some(status) => Some(status),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                None
            }
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();
        result.output = combine_output(&stdout, &stderr);

        match status {
            None => {
                result.timed_out = true;
                result.error = Some(RotationError::Timeout(r.to_string()).to_string());
                self.log_rotation(r, false, &result.output, result.error.as_deref());
            }
            Some(status) if !status.success() => {
                result.error = Some(format!("command exited with {status}"));
                self.log_rotation(r, false, &result.output, result.error.as_deref());
            }
            Some(_) => {
                result.success = true;
                if let Err(e) = self.store.mark_rotated(r) {
                    result.success = false;
                    result.error =
                        Some(format!("rotation succeeded but failed to update store: {e}"));
                    self.log_rotation(r, false, &result.output, result.error.as_deref());
                    return Ok(result);
                }
                self.log_rotation(r, true, &result.output, None);
            }
        }

        Ok(result)
    }

    /// Run every configured rotation hook, collecting per-secret results.
    /// One failing hook never aborts the sweep.
    pub fn rotate_all(&self) -> Result<Vec<RotationResult>> {
        let secrets = self.store.list()?;

        let mut results = Vec::new();
        for secret in secrets {
            if !secret.has_rotation_hook() {
                continue;
            }
            match self.rotate(&secret.secret_ref()) {
                Ok(result) => results.push(result),
                // A secret deleted mid-sweep; skip it and keep going.
                Err(e) => warn!(secret = %secret.secret_ref(), error = %e, "rotation skipped"),
            }
        }

        Ok(results)
    }

    /// True when the secret exists and carries a non-empty hook.
    pub fn can_rotate(&self, r: &SecretRef) -> bool {
        self.store
            .metadata(r)
            .map(|s| s.has_rotation_hook())
            .unwrap_or(false)
    }

    fn log_rotation(&self, r: &SecretRef, success: bool, output: &str, error: Option<&str>) {
        let details = match error {
            Some(error) => format!("error: {error}\noutput: {output}"),
            None => output.to_string(),
        };
        let entry = AuditEntry::new(AuditAction::SecretRotate, success)
            .namespace(r.namespace.clone())
            .secret(r.name.clone())
            .details(details);
        if let Err(e) = self.audit.log(&entry) {
            warn!(error = %e, "failed to write rotation audit entry");
        }
    }
}

fn spawn_pipe_reader<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let mut bytes = Vec::new();
            let _ = pipe.read_to_end(&mut bytes);
            buf = String::from_utf8_lossy(&bytes).into_owned();
        }
        buf
    })
}

/// Stdout, then a separating newline, then stderr — either may be empty.
fn combine_output(stdout: &str, stderr: &str) -> String {
    match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{}\n{}", stdout.trim_end_matches('\n'), stderr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audit::QueryFilter;
    use crate::core::config::Config;
    use tempfile::tempdir;

    fn executor_with(
        dir: &std::path::Path,
        timeout: Duration,
    ) -> (Arc<Store>, Arc<AuditLogger>, RotationExecutor) {
        let config = Config::in_directory(dir);
        let store = Arc::new(Store::new(&config));
        store.init().unwrap();
        let audit = Arc::new(AuditLogger::open(&config.audit_path).unwrap());
        let executor = RotationExecutor::new(Arc::clone(&store), Arc::clone(&audit), timeout);
        (store, audit, executor)
    }

    #[test]
    fn test_rotate_success_marks_and_audits() {
        let dir = tempdir().unwrap();
        let (store, audit, executor) = executor_with(dir.path(), Duration::from_secs(5));

        let r = SecretRef::parse("github");
        store.add(&r, "tok", Some("echo NEW".to_string())).unwrap();

        let before = Utc::now();
        let result = executor.rotate(&r).unwrap();
        assert!(result.success);
        assert!(result.output.contains("NEW"));
        assert!(result.error.is_none());
        assert!(!result.timed_out);

        let rotated = store.metadata(&r).unwrap().last_rotated.unwrap();
        assert!(rotated >= before);

        let entries = audit
            .query(&QueryFilter {
                action: Some(AuditAction::SecretRotate),
                ..QueryFilter::default()
            })
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].success);
        assert!(entries[0].details.as_deref().unwrap().contains("NEW"));
    }

    #[test]
    fn test_rotate_captures_stderr() {
        let dir = tempdir().unwrap();
        let (store, _audit, executor) = executor_with(dir.path(), Duration::from_secs(5));

        let r = SecretRef::parse("noisy");
        store
            .add(&r, "v", Some("echo out; echo err >&2".to_string()))
            .unwrap();

        let result = executor.rotate(&r).unwrap();
        assert!(result.success);
        assert!(result.output.contains("out"));
        assert!(result.output.contains("err"));
    }

    #[test]
    fn test_rotate_nonzero_exit_reports_failure() {
        let dir = tempdir().unwrap();
        let (store, audit, executor) = executor_with(dir.path(), Duration::from_secs(5));

        let r = SecretRef::parse("broken");
        store
            .add(&r, "v", Some("echo nope; exit 3".to_string()))
            .unwrap();

        let result = executor.rotate(&r).unwrap();
        assert!(!result.success);
        assert!(!result.timed_out);
        assert!(result.output.contains("nope"));
        assert!(result.error.as_deref().unwrap().contains("exited"));
        assert!(store.metadata(&r).unwrap().last_rotated.is_none());

        let entries = audit
            .query(&QueryFilter {
                action: Some(AuditAction::SecretRotate),
                ..QueryFilter::default()
            })
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].success);
        let details = entries[0].details.as_deref().unwrap();
        assert!(details.starts_with("error: "));
        assert!(details.contains("output: nope"));
    }

    #[test]
    fn test_rotate_timeout_kills_subprocess() {
        let dir = tempdir().unwrap();
        let (store, _audit, executor) = executor_with(dir.path(), Duration::from_millis(100));

        let r = SecretRef::parse("slow");
        store.add(&r, "v", Some("sleep 10".to_string())).unwrap();

        let started = std::time::Instant::now();
        let result = executor.rotate(&r).unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!result.success);
        assert!(result.timed_out);
        assert!(result.error.as_deref().unwrap().contains("timed out"));
    }

    #[test]
    fn test_rotate_missing_secret_and_missing_hook() {
        let dir = tempdir().unwrap();
        let (store, _audit, executor) = executor_with(dir.path(), Duration::from_secs(5));

        let err = executor.rotate(&SecretRef::parse("ghost")).unwrap_err();
        assert!(err.to_string().contains("secret not found"));

        let r = SecretRef::parse("plain");
        store.add(&r, "v", None).unwrap();
        let err = executor.rotate(&r).unwrap_err();
        assert!(err.to_string().contains("no rotation hook"));
    }

    #[test]
    fn test_rotate_all_continues_past_failures() {
        let dir = tempdir().unwrap();
        let (store, _audit, executor) = executor_with(dir.path(), Duration::from_secs(5));

        store
            .add(&SecretRef::parse("a"), "1", Some("echo ok".to_string()))
            .unwrap();
        store
            .add(&SecretRef::parse("b"), "2", Some("exit 1".to_string()))
            .unwrap();
        store
            .add(&SecretRef::parse("c"), "3", Some("echo fine".to_string()))
            .unwrap();
        store.add(&SecretRef::parse("nohook"), "4", None).unwrap();

        let results = executor.rotate_all().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results.iter().filter(|r| r.success).count(), 2);
        assert_eq!(results.iter().filter(|r| !r.success).count(), 1);
    }

    #[test]
    fn test_can_rotate() {
        let dir = tempdir().unwrap();
        let (store, _audit, executor) = executor_with(dir.path(), Duration::from_secs(5));

        store
            .add(&SecretRef::parse("hooked"), "v", Some("echo x".to_string()))
            .unwrap();
        store.add(&SecretRef::parse("bare"), "v", None).unwrap();

        assert!(executor.can_rotate(&SecretRef::parse("hooked")));
        assert!(!executor.can_rotate(&SecretRef::parse("bare")));
        assert!(!executor.can_rotate(&SecretRef::parse("ghost")));
    }

    #[test]
    fn test_combine_output() {
        assert_eq!(combine_output("a\n", ""), "a\n");
        assert_eq!(combine_output("", "b\n"), "b\n");
        assert_eq!(combine_output("a\n", "b\n"), "a\nb\n");
    }
}
