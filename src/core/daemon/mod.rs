//! The keyward daemon: a JSON-RPC dispatcher over a Unix socket.
//!
//! One OS thread accepts connections; each connection gets its own worker
//! thread reading newline-delimited requests and writing one response per
//! request. Subsystems provide their own mutual exclusion — the daemon
//! imposes no global lock.

pub mod handlers;
pub mod protocol;

use std::io::{BufRead, BufReader, Write};
use std::net::Shutdown;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::audit::{AuditEntry, AuditLogger};
use crate::core::config::Config;
use crate::core::heartbeat::HeartbeatMonitor;
use crate::core::killswitch::Killswitch;
use crate::core::lease::{LeaseManager, DEFAULT_REAP_INTERVAL};
use crate::core::rotation::RotationExecutor;
use crate::core::store::Store;
use crate::core::types::{AuditAction, DaemonStatus};
use crate::error::{DaemonError, Result};

use handlers::Handler;
use protocol::{RpcError, RpcRequest, RpcResponse, RPC_PARSE_ERROR};

/// The daemon, wiring every subsystem behind the socket.
pub struct Daemon {
    config: Config,
    store: Arc<Store>,
    leases: Arc<LeaseManager>,
    killswitch: Arc<Killswitch>,
    audit: Arc<AuditLogger>,
    heartbeat: Option<Arc<HeartbeatMonitor>>,
    handler: Arc<Handler>,

    running: AtomicBool,
    started_at: Arc<Mutex<DateTime<Utc>>>,
    shutdown: Arc<AtomicBool>,
    accept_thread: Mutex<Option<JoinHandle<()>>>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    connections: Arc<Mutex<Vec<UnixStream>>>,
}

impl Daemon {
    /// Build a daemon: validate config, then bring subsystems up in
    /// dependency order (audit → store → leases → rotation → killswitch
    /// → heartbeat). The dispatcher starts accepting in [`Daemon::start`].
    pub fn new(config: Config) -> Result<Self> {
        Self::with_options(config, false)
    }

    /// As [`Daemon::new`], optionally skipping the permission check.
    pub fn with_options(config: Config, skip_permission_check: bool) -> Result<Self> {
        config.validate()?;
        config.ensure_directories()?;

        let audit = Arc::new(AuditLogger::open(&config.audit_path)?);

        let store = Arc::new(Store::with_options(&config, skip_permission_check));
        match store.load() {
            Ok(()) => {}
            // First run: no identity yet. Anything else (bad permissions,
            // undecryptable ciphertext) must refuse to start.
            Err(crate::error::Error::Crypto(crate::error::CryptoError::IdentityNotFound(_))) => {
                store.init()?;
            }
            Err(e) => return Err(e),
        }

        let leases = Arc::new(LeaseManager::new(&config, Arc::clone(&audit))?);

        let rotation = Arc::new(RotationExecutor::new(
            Arc::clone(&store),
            Arc::clone(&audit),
            config.rotation_timeout,
        ));

        let killswitch = Arc::new(Killswitch::new(
            Arc::clone(&leases),
            Arc::clone(&rotation),
            Arc::clone(&store),
            Arc::clone(&audit),
        ));

        let heartbeat = config
            .heartbeat
            .as_ref()
            .filter(|hb| hb.enabled)
            .map(|hb| {
                Arc::new(HeartbeatMonitor::new(
                    hb.clone(),
                    Arc::clone(&killswitch),
                    Arc::clone(&audit),
                ))
            });

        let started_at = Arc::new(Mutex::new(Utc::now()));
        let handler = Arc::new(Handler::new(
            Arc::clone(&store),
            Arc::clone(&leases),
            rotation,
            Arc::clone(&killswitch),
            Arc::clone(&audit),
            config.clone(),
            Arc::clone(&started_at),
        ));

        Ok(Self {
            config,
            store,
            leases,
            killswitch,
            audit,
            heartbeat,
            handler,
            running: AtomicBool::new(false),
            started_at,
            shutdown: Arc::new(AtomicBool::new(false)),
            accept_thread: Mutex::new(None),
            workers: Arc::new(Mutex::new(Vec::new())),
            connections: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Bind the socket (0600, recreated) and begin accepting connections.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(DaemonError::AlreadyRunning.into());
        }

        if let Err(e) = remove_stale_socket(&self.config.socket_path) {
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let listener = match UnixListener::bind(&self.config.socket_path) {
            Ok(listener) => listener,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(
                &self.config.socket_path,
                std::fs::Permissions::from_mode(crate::core::fsio::SECURE_FILE_MODE),
            )?;
        }

        *self.started_at.lock().expect("status clock poisoned") = Utc::now();
        self.shutdown.store(false, Ordering::SeqCst);

        let entry = AuditEntry::new(AuditAction::DaemonStart, true)
            .details(format!("listening on {}", self.config.socket_path.display()));
        if let Err(e) = self.audit.log(&entry) {
            warn!(error = %e, "failed to write daemon_start audit entry");
        }

        self.leases.start_reaper(DEFAULT_REAP_INTERVAL);
        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.start();
        }

        let daemon = Arc::clone(self);
        let accept = std::thread::Builder::new()
            .name("keyward-accept".to_string())
            .spawn(move || daemon.accept_loop(listener))
            .expect("failed to spawn accept thread");
        *self.accept_thread.lock().expect("accept handle poisoned") = Some(accept);

        info!(socket = %self.config.socket_path.display(), "daemon started");
        Ok(())
    }

    /// Graceful shutdown: stop accepting, let in-flight requests finish,
    /// stop the watchdog and reaper, persist leases, flush audit.
    pub fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(DaemonError::NotRunning.into());
        }

        self.shutdown.store(true, Ordering::SeqCst);
        // Wake the blocking accept with a throwaway connection.
        let _ = UnixStream::connect(&self.config.socket_path);
        if let Some(accept) = self.accept_thread.lock().expect("accept handle poisoned").take() {
            let _ = accept.join();
        }

        // Unblock readers; current requests still get their response.
        for conn in self.connections.lock().expect("connection registry poisoned").drain(..) {
            let _ = conn.shutdown(Shutdown::Read);
        }
        let workers: Vec<JoinHandle<()>> =
            self.workers.lock().expect("worker registry poisoned").drain(..).collect();
        for worker in workers {
            let _ = worker.join();
        }

        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.stop();
        }
        self.leases.stop_reaper();

        if let Err(e) = self.leases.save() {
            let entry = AuditEntry::new(AuditAction::DaemonStop, false)
                .details(format!("failed to save leases: {e}"));
            let _ = self.audit.log(&entry);
        }

        let entry =
            AuditEntry::new(AuditAction::DaemonStop, true).details("daemon stopped gracefully");
        if let Err(e) = self.audit.log(&entry) {
            warn!(error = %e, "failed to write daemon_stop audit entry");
        }

        let _ = std::fs::remove_file(&self.config.socket_path);
        info!("daemon stopped");
        Ok(())
    }

    /// Whether the dispatcher is accepting connections.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current status snapshot.
    pub fn status(&self) -> DaemonStatus {
        DaemonStatus {
            running: self.is_running(),
            pid: std::process::id(),
            started_at: *self.started_at.lock().expect("status clock poisoned"),
            secrets_count: self.store.count().unwrap_or(0),
            active_leases: self.leases.active_count(),
            heartbeat: self.config.heartbeat.clone(),
        }
    }

    /// Fire the killswitch directly (used by the CLI path and tests).
    pub fn killswitch(&self) -> &Arc<Killswitch> {
        &self.killswitch
    }

    fn accept_loop(self: Arc<Self>, listener: UnixListener) {
        for stream in listener.incoming() {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };

            if let Ok(clone) = stream.try_clone() {
                self.connections
                    .lock()
                    .expect("connection registry poisoned")
                    .push(clone);
            }

            let daemon = Arc::clone(&self);
            let worker = std::thread::Builder::new()
                .name("keyward-conn".to_string())
                .spawn(move || daemon.handle_connection(stream))
                .expect("failed to spawn connection worker");
            self.workers
                .lock()
                .expect("worker registry poisoned")
                .push(worker);
        }
    }

    fn handle_connection(&self, stream: UnixStream) {
        let mut writer = match stream.try_clone() {
            Ok(writer) => writer,
            Err(e) => {
                warn!(error = %e, "failed to clone connection stream");
                return;
            }
        };
        let reader = BufReader::new(stream);

        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                // Client hung up or we shut the read side down.
                Err(_) => return,
            };
            if line.trim().is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<RpcRequest>(&line) {
                Ok(request) => {
                    debug!(method = %request.method, "dispatching request");
                    self.handler.handle(&request)
                }
                Err(e) => RpcResponse::failure(
                    Value::Null,
                    RpcError::new(RPC_PARSE_ERROR, format!("parse error: {e}")),
                ),
            };

            let mut encoded = match serde_json::to_vec(&response) {
                Ok(encoded) => encoded,
                Err(e) => {
                    warn!(error = %e, "failed to encode response");
                    return;
                }
            };
            encoded.push(b'\n');
            if writer.write_all(&encoded).and_then(|()| writer.flush()).is_err() {
                return;
            }

            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
        }
    }
}

fn remove_stale_socket(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
