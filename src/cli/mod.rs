//! Command-line interface.

pub mod add;
pub mod audit;
pub mod client;
pub mod completions;
pub mod health;
pub mod init;
pub mod killswitch;
pub mod lease;
pub mod list;
pub mod output;
pub mod revoke;
pub mod rm;
pub mod rotate;
pub mod serve;
pub mod status;
pub mod update;

use std::path::PathBuf;
use std::time::Duration;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Parser, Subcommand};

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default())
    .valid(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .invalid(AnsiColor::Red.on_default().effects(Effects::BOLD))
    .error(AnsiColor::Red.on_default().effects(Effects::BOLD));

/// Keyward - credential broker for machine agents.
#[derive(Parser)]
#[command(
    name = "keyward",
    about = "Leased, audited, encrypted credentials for machine agents",
    version,
    styles = STYLES
)]
pub struct Cli {
    /// Enable verbose logging output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Override the daemon socket path
    #[arg(long, global = true, env = "KEYWARD_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Override the config file path
    #[arg(long, global = true, env = "KEYWARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Timeout in seconds for daemon socket operations
    #[arg(long, global = true, default_value_t = 5)]
    pub timeout: u64,

    /// Skip file permission validation (for edge cases)
    #[arg(long, global = true)]
    pub skip_permission_check: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Shared flags handed to every command.
pub struct Ctx {
    pub socket: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub timeout: Duration,
    pub skip_permission_check: bool,
    pub verbose: bool,
}

impl Ctx {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            socket: cli.socket.clone(),
            config: cli.config.clone(),
            timeout: Duration::from_secs(cli.timeout),
            skip_permission_check: cli.skip_permission_check,
            verbose: cli.verbose,
        }
    }

    /// Connect a client using the resolved socket path.
    pub fn client(&self) -> crate::error::Result<client::DaemonClient> {
        client::DaemonClient::new(self.socket.clone(), self.config.clone(), self.timeout)
    }
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Initialize the encrypted credential store
    Init,

    /// Add a secret (prompts for the value if not given)
    Add {
        /// Secret reference, e.g. api_key or prod::github_token
        name: String,
        /// Secret value (omit to be prompted with hidden input)
        #[arg(long)]
        value: Option<String>,
        /// Shell command that refreshes this credential upstream
        #[arg(long, value_name = "COMMAND")]
        rotate_via: Option<String>,
    },

    /// Update a secret's value and optionally its rotation hook
    Update {
        /// Secret reference
        name: String,
        /// New secret value (omit to be prompted with hidden input)
        #[arg(long)]
        value: Option<String>,
        /// Replace the rotation hook (empty string clears it)
        #[arg(long, value_name = "COMMAND")]
        rotate_via: Option<String>,
    },

    /// Remove a secret (revokes its leases first)
    Rm {
        /// Secret reference
        name: String,
    },

    /// List secret metadata (never values)
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Acquire a time-bounded lease on a secret
    Lease {
        /// Secret reference, e.g. api_key or prod::github_token
        name: String,
        /// Time-to-live (e.g. 1h, 30m, 2h30m)
        #[arg(long, default_value = "1h")]
        ttl: String,
        /// Client identifier (defaults to the hostname)
        #[arg(long)]
        client_id: Option<String>,
        /// Print only the secret value (for shell capture)
        #[arg(long)]
        raw: bool,
    },

    /// Revoke a lease, a secret's leases, a namespace, or everything
    Revoke {
        /// Lease id to revoke
        lease_id: Option<String>,
        /// Revoke every active lease
        #[arg(long, conflicts_with_all = ["lease_id", "secret", "namespace"])]
        all: bool,
        /// Revoke all leases for a secret reference
        #[arg(long, conflicts_with_all = ["lease_id", "namespace"])]
        secret: Option<String>,
        /// Revoke all leases in a namespace
        #[arg(long, conflicts_with = "lease_id")]
        namespace: Option<String>,
    },

    /// Run a secret's rotation hook
    Rotate {
        /// Secret reference
        name: String,
    },

    /// Show recent audit log entries
    Audit {
        /// Number of entries to show
        #[arg(long, default_value_t = 20)]
        tail: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show daemon status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a secrets health report
    Health {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Trigger the emergency killswitch
    Killswitch {
        /// Revoke every active lease
        #[arg(long)]
        revoke_all: bool,
        /// Run every rotation hook
        #[arg(long)]
        rotate_all: bool,
        /// Wipe the secret store
        #[arg(long)]
        wipe_store: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Run the daemon in the foreground
    Serve,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Execute a parsed command line.
pub fn execute(cli: Cli) -> crate::error::Result<()> {
    let ctx = Ctx::from_cli(&cli);

    match cli.command {
        Command::Init => init::execute(&ctx),
        Command::Add {
            name,
            value,
            rotate_via,
        } => add::execute(&ctx, &name, value, rotate_via),
        Command::Update {
            name,
            value,
            rotate_via,
        } => update::execute(&ctx, &name, value, rotate_via),
        Command::Rm { name } => rm::execute(&ctx, &name),
        Command::List { json } => list::execute(&ctx, json),
        Command::Lease {
            name,
            ttl,
            client_id,
            raw,
        } => lease::execute(&ctx, &name, &ttl, client_id, raw),
        Command::Revoke {
            lease_id,
            all,
            secret,
            namespace,
        } => revoke::execute(&ctx, lease_id, all, secret, namespace),
        Command::Rotate { name } => rotate::execute(&ctx, &name),
        Command::Audit { tail, json } => audit::execute(&ctx, tail, json),
        Command::Status { json } => status::execute(&ctx, json),
        Command::Health { json } => health::execute(&ctx, json),
        Command::Killswitch {
            revoke_all,
            rotate_all,
            wipe_store,
            yes,
        } => killswitch::execute(&ctx, revoke_all, rotate_all, wipe_store, yes),
        Command::Serve => serve::execute(&ctx),
        Command::Completions { shell } => completions::execute(shell),
    }
}
