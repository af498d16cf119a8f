//! Serve command.
//!
//! Runs the daemon in the foreground until SIGINT or SIGTERM, then shuts
//! it down gracefully: in-flight requests complete, active leases are
//! persisted, the audit log gets its daemon_stop record.

use std::sync::Arc;

use crate::cli::{output, Ctx};
use crate::core::config::Config;
use crate::core::daemon::Daemon;
use crate::error::{Error, Result};

pub fn execute(ctx: &Ctx) -> Result<()> {
    init_tracing(ctx.verbose);

    let config = match &ctx.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Block the shutdown signals before any worker threads exist so they
    // inherit the mask and delivery lands in wait_for_shutdown_signal.
    let signals = block_shutdown_signals()?;

    let daemon = Arc::new(Daemon::with_options(config.clone(), ctx.skip_permission_check)?);
    daemon.start()?;

    output::success("daemon running");
    output::kv("socket", config.socket_path.display());
    output::kv("pid", std::process::id());
    output::hint("stop with Ctrl-C");

    wait_for_shutdown_signal(signals)?;

    println!();
    output::warn("shutting down...");
    daemon.stop()?;
    output::success("daemon stopped");
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "keyward=debug" } else { "keyward=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(unix)]
fn block_shutdown_signals() -> Result<nix::sys::signal::SigSet> {
    use nix::sys::signal::{SigSet, Signal};

    let mut mask = SigSet::empty();
    mask.add(Signal::SIGINT);
    mask.add(Signal::SIGTERM);
    mask.thread_block()
        .map_err(|e| Error::Other(format!("failed to block signals: {e}")))?;
    Ok(mask)
}

#[cfg(unix)]
fn wait_for_shutdown_signal(mask: nix::sys::signal::SigSet) -> Result<()> {
    mask.wait()
        .map_err(|e| Error::Other(format!("failed to wait for signal: {e}")))?;
    Ok(())
}

#[cfg(not(unix))]
fn block_shutdown_signals() -> Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown_signal(_mask: ()) -> Result<()> {
    // No signal plumbing off-Unix; park until the process is killed.
    loop {
        std::thread::park();
    }
}
