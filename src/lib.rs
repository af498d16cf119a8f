//! A local credential broker for machine agents
//!
//! Keyward keeps API keys and tokens encrypted at rest (age, x25519),
//! mediates every access through a time-bounded lease, records an
//! immutable audit trail, and supports an emergency killswitch that
//! revokes, rotates, and/or wipes on demand. It runs as a single-host
//! daemon on a local Unix socket; the `keyward` CLI drives it.
//!
//! # Architecture
//!
//! The crate is organized into two main modules:
//!
//! - **`core`**: the daemon subsystems — encrypted [`Store`], lease
//!   manager, rotation executor, killswitch + heartbeat watchdog, audit
//!   logger, and the JSON-RPC dispatcher ([`Daemon`]).
//! - **`cli`**: the command-line interface, a thin consumer of the wire
//!   protocol.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use keyward::core::config::Config;
//! use keyward::core::daemon::Daemon;
//!
//! let config = Config::load()?;
//! let daemon = Arc::new(Daemon::new(config)?);
//! daemon.start()?;
//! # Ok::<(), keyward::error::Error>(())
//! ```
//!
//! Secrets are addressed as `namespace::name`; a bare `name` lives in the
//! reserved `default` namespace. The daemon refuses raw `get` requests —
//! a value only leaves the store inside a freshly minted lease:
//!
//! ```sh
//! keyward add default::api_key --value s3cr3t
//! keyward lease api_key --ttl 1h --client-id agent-1
//! keyward revoke --all
//! ```

pub mod cli;
pub mod core;
pub mod error;

// Re-export the public API
pub use crate::core::config::Config;
pub use crate::core::daemon::Daemon;
pub use crate::core::store::Store;
pub use crate::core::types::*;
pub use crate::error::{Error, Result};
