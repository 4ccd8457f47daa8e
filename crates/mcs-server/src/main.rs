//! MCP Capability Server binary
//!
//! Exposes a dynamic catalog of tools, prompts, and resources to MCP
//! clients over stdio and HTTP, plus an admin HTTP surface for the
//! management portal.
//!
//! ## Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Normal shutdown |
//! | 2 | Configuration invalid |
//! | 3 | Required dependency unreachable at boot |
//! | 130 | Interrupted |

use clap::Parser;

use mcs_infrastructure::config::TransportMode;

/// Command line interface for the MCP Capability Server
#[derive(Parser, Debug)]
#[command(name = "mcs")]
#[command(about = "MCP Capability Server - dynamic tool, prompt, and resource catalog")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<std::path::PathBuf>,

    /// Transport override: stdio, http, or hybrid
    ///
    /// Without this flag the transport comes from the configuration file
    /// (stdio by default).
    #[arg(long, value_enum)]
    pub transport: Option<TransportArg>,
}

/// CLI transport selection
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum TransportArg {
    /// MCP over stdin/stdout
    Stdio,
    /// HTTP listener only
    Http,
    /// Both stdio and HTTP
    Hybrid,
}

impl From<TransportArg> for TransportMode {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Stdio => TransportMode::Stdio,
            TransportArg::Http => TransportMode::Http,
            TransportArg::Hybrid => TransportMode::Hybrid,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let status = mcs_server::run(cli.config.as_deref(), cli.transport.map(Into::into)).await;
    std::process::exit(status.code());
}
