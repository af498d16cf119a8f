//! Heartbeat watchdog.
//!
//! Polls a remote URL on a fixed interval; only an HTTP 2xx counts as
//! healthy. On the first failure the watchdog audits `heartbeat_fail`,
//! fires the killswitch with the configured bundle, and stops — it is
//! deliberately one-shot, with no retry: a remote watchdog fails closed
//! on the first ambiguity.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{info, warn};

use crate::core::audit::{AuditEntry, AuditLogger};
use crate::core::killswitch::Killswitch;
use crate::core::types::{AuditAction, HeartbeatConfig};
use crate::error::{Error, Result};

struct Worker {
    stop_tx: Sender<()>,
    join: JoinHandle<()>,
}

/// Background heartbeat monitor.
pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    killswitch: Arc<Killswitch>,
    audit: Arc<AuditLogger>,
    worker: Mutex<Option<Worker>>,
}

impl HeartbeatMonitor {
    pub fn new(
        config: HeartbeatConfig,
        killswitch: Arc<Killswitch>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            config,
            killswitch,
            audit,
            worker: Mutex::new(None),
        }
    }

    /// Start monitoring in a background thread. Idempotent.
    pub fn start(self: &Arc<Self>) {
        let mut guard = self.worker.lock().expect("heartbeat worker lock poisoned");
        if guard.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let monitor = Arc::clone(self);
        let interval = self.config.interval;
        let join = std::thread::Builder::new()
            .name("heartbeat".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Err(e) = monitor.check() {
                            monitor.on_failure(&e);
                            return;
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                }
            })
            .expect("failed to spawn heartbeat monitor");

        info!(url = %self.config.url, interval = ?self.config.interval, "heartbeat watchdog started");
        *guard = Some(Worker { stop_tx, join });
    }

    /// Stop the monitor. Idempotent, and safe after the watchdog has
    /// already fired and terminated itself.
    pub fn stop(&self) {
        let worker = self.worker.lock().expect("heartbeat worker lock poisoned").take();
        if let Some(worker) = worker {
            let _ = worker.stop_tx.send(());
            let _ = worker.join.join();
        }
    }

    /// Whether the monitor thread is live.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .expect("heartbeat worker lock poisoned")
            .as_ref()
            .is_some_and(|w| !w.join.is_finished())
    }

    /// One probe of the configured URL. 2xx is healthy; anything else —
    /// transport error, timeout, non-2xx status — is a failure.
    fn check(&self) -> Result<()> {
        let agent = ureq::AgentBuilder::new()
            .timeout(self.config.timeout)
            .build();

        match agent.get(&self.config.url).call() {
            Ok(resp) if (200..300).contains(&resp.status()) => Ok(()),
            Ok(resp) => Err(Error::Heartbeat(format!("HTTP {}", resp.status()))),
            Err(ureq::Error::Status(code, _)) => Err(Error::Heartbeat(format!("HTTP {code}"))),
            Err(e) => Err(Error::Heartbeat(e.to_string())),
        }
    }

    fn on_failure(&self, error: &Error) {
        warn!(error = %error, "heartbeat failed, firing killswitch");

        let entry =
            AuditEntry::new(AuditAction::HeartbeatFail, false).details(error.to_string());
        if let Err(e) = self.audit.log(&entry) {
            warn!(error = %e, "failed to write heartbeat audit entry");
        }

        // The killswitch writes its own activation record; only its
        // failure earns an extra one here.
        if let Err(e) = self.killswitch.activate(self.config.fail_action) {
            let entry = AuditEntry::new(AuditAction::Killswitch, false)
                .details(format!("triggered by heartbeat failure: {e}"));
            if let Err(e) = self.audit.log(&entry) {
                warn!(error = %e, "failed to write killswitch audit entry");
            }
        }
    }
}
