//! Socket client for the CLI.
//!
//! Connects to the daemon's Unix socket, sends one JSON-RPC request per
//! line, and reads one response line back. All I/O is bounded by the
//! `--timeout` flag so a wedged daemon cannot hang the CLI.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::core::config::Config;
use crate::core::daemon::protocol::{RpcError, RpcRequest, RpcResponse};
use crate::error::{DaemonError, Error, Result};

/// One-shot JSON-RPC client over the daemon socket.
pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl DaemonClient {
    /// Resolve the socket path from the `--socket` override or config.
    pub fn new(
        socket: Option<PathBuf>,
        config_path: Option<PathBuf>,
        timeout: Duration,
    ) -> Result<Self> {
        let socket_path = match socket {
            Some(path) => path,
            None => {
                let config = match config_path {
                    Some(path) => Config::load_from(&path)?,
                    None => Config::load()?,
                };
                config.socket_path
            }
        };
        Ok(Self {
            socket_path,
            timeout,
        })
    }

    /// Call `method` and decode the result into `R`.
    pub fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<&P>,
    ) -> Result<R> {
        let response = self.call_raw(method, params)?;

        if let Some(error) = response.error {
            return Err(rpc_failure(error));
        }

        let result = response
            .result
            .ok_or_else(|| Error::Other("daemon response carried no result".to_string()))?;
        serde_json::from_value(result)
            .map_err(|e| Error::Other(format!("failed to parse daemon response: {e}")))
    }

    /// Call `method` and return the raw response envelope.
    pub fn call_raw<P: Serialize>(
        &self,
        method: &str,
        params: Option<&P>,
    ) -> Result<RpcResponse> {
        let params = match params {
            Some(p) => Some(
                serde_json::to_value(p)
                    .map_err(|e| Error::Other(format!("encode params: {e}")))?,
            ),
            None => None,
        };
        let request = RpcRequest::new(method, params, 1);

        let stream = UnixStream::connect(&self.socket_path)
            .map_err(|e| DaemonError::ConnectionFailed(e.to_string()))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .map_err(|e| DaemonError::ConnectionFailed(e.to_string()))?;
        stream
            .set_write_timeout(Some(self.timeout))
            .map_err(|e| DaemonError::ConnectionFailed(e.to_string()))?;

        let mut writer = stream
            .try_clone()
            .map_err(|e| DaemonError::ConnectionFailed(e.to_string()))?;
        let mut line = serde_json::to_vec(&request)
            .map_err(|e| Error::Other(format!("encode request: {e}")))?;
        line.push(b'\n');
        writer
            .write_all(&line)
            .and_then(|()| writer.flush())
            .map_err(|e| daemon_io_error(e, self.timeout))?;

        let mut reader = BufReader::new(stream);
        let mut response_line = String::new();
        let read = reader
            .read_line(&mut response_line)
            .map_err(|e| daemon_io_error(e, self.timeout))?;
        if read == 0 {
            return Err(DaemonError::ConnectionFailed(
                "daemon closed the connection".to_string(),
            )
            .into());
        }

        serde_json::from_str(&response_line)
            .map_err(|e| Error::Other(format!("malformed daemon response: {e}")))
    }
}

/// Preserve the wire error message (and any structured data) exactly.
fn rpc_failure(error: RpcError) -> Error {
    match error.data {
        Some(Value::Null) | None => Error::Other(error.message),
        Some(data) => Error::Other(format!("{}\n{}", error.message, data)),
    }
}

fn daemon_io_error(e: std::io::Error, timeout: Duration) -> Error {
    if matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    ) {
        DaemonError::ConnectionFailed(format!("timed out after {timeout:?}")).into()
    } else {
        DaemonError::ConnectionFailed(e.to_string()).into()
    }
}
