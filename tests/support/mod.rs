//! Test support utilities for keyward integration tests.
//!
//! Every test gets its own temp directory holding the full daemon state
//! (identity, secrets, leases, audit log, socket), so tests run in
//! parallel without touching the real home directory.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use keyward::core::audit::AuditLogger;
use keyward::core::config::Config;
use keyward::core::killswitch::Killswitch;
use keyward::core::lease::LeaseManager;
use keyward::core::rotation::RotationExecutor;
use keyward::core::store::Store;

/// Isolated test environment rooted in a temp directory.
pub struct Test {
    pub dir: TempDir,
    pub config: Config,
}

/// The core subsystem stack, wired the way the daemon wires it.
pub struct Stack {
    pub store: Arc<Store>,
    pub audit: Arc<AuditLogger>,
    pub leases: Arc<LeaseManager>,
    pub rotation: Arc<RotationExecutor>,
    pub killswitch: Arc<Killswitch>,
}

impl Test {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let config = Config::in_directory(dir.path());
        Self { dir, config }
    }

    /// Build the full subsystem stack over this environment's paths.
    pub fn stack(&self) -> Stack {
        let store = Arc::new(Store::new(&self.config));
        store.init().expect("store init failed");
        let audit =
            Arc::new(AuditLogger::open(&self.config.audit_path).expect("audit open failed"));
        let leases = Arc::new(
            LeaseManager::new(&self.config, Arc::clone(&audit)).expect("lease manager failed"),
        );
        let rotation = Arc::new(RotationExecutor::new(
            Arc::clone(&store),
            Arc::clone(&audit),
            self.config.rotation_timeout,
        ));
        let killswitch = Arc::new(Killswitch::new(
            Arc::clone(&leases),
            Arc::clone(&rotation),
            Arc::clone(&store),
            Arc::clone(&audit),
        ));
        Stack {
            store,
            audit,
            leases,
            rotation,
            killswitch,
        }
    }
}

/// One JSON-RPC call over a fresh connection to `socket`.
pub fn rpc(socket: &Path, method: &str, params: serde_json::Value) -> serde_json::Value {
    let mut stream = UnixStream::connect(socket).expect("connect failed");
    stream
        .set_read_timeout(Some(Duration::from_secs(30)))
        .unwrap();
    send_line(
        &mut stream,
        &serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        })
        .to_string(),
    )
}

/// Write one raw line on an existing connection and read one response.
pub fn send_line(stream: &mut UnixStream, line: &str) -> serde_json::Value {
    stream.write_all(line.as_bytes()).unwrap();
    stream.write_all(b"\n").unwrap();
    stream.flush().unwrap();

    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut response = String::new();
    reader.read_line(&mut response).unwrap();
    serde_json::from_str(&response).expect("daemon wrote malformed JSON")
}

/// Minimal HTTP responder answering every request with `status` until the
/// returned sender is dropped or signalled.
pub fn spawn_http_server(status: u16) -> (String, Sender<()>) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || loop {
        match stop_rx.try_recv() {
            Ok(()) | Err(mpsc::TryRecvError::Disconnected) => return,
            Err(mpsc::TryRecvError::Empty) => {}
        }
        match listener.accept() {
            Ok((mut stream, _)) => {
                stream.set_nonblocking(false).unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                let _ = reader.read_line(&mut line);
                let response = format!(
                    "HTTP/1.1 {status} X\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                );
                let _ = stream.write_all(response.as_bytes());
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(_) => return,
        }
    });

    (format!("http://{addr}/healthz"), stop_tx)
}
