use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ws-observer",
    about = "Watch a WebSocket connection's lifecycle, or run the echo peer it talks to",
    version,
    after_help = "RUST_LOG takes precedence over --verbose/--quiet."
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, help = "Suppress non-error output")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect to an endpoint and log every lifecycle event until it closes
    Observe {
        /// JSON observer config; flags below override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Endpoint to connect to, e.g. ws://localhost:8888
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Text sent once the connection opens
        #[arg(short, long, conflicts_with = "no_greeting")]
        greeting: Option<String>,

        /// Do not send anything on open
        #[arg(long)]
        no_greeting: bool,

        /// Origin header for the upgrade request
        #[arg(long)]
        origin: Option<String>,

        /// Subprotocol to offer (repeatable)
        #[arg(long = "protocol")]
        protocols: Vec<String>,
    },

    /// Run the echo peer
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:8888")]
        addr: String,

        /// Messages to echo per client before closing
        #[arg(long, default_value_t = 1, conflicts_with = "unlimited")]
        echoes: usize,

        /// Echo until the client closes
        #[arg(long)]
        unlimited: bool,

        /// Text pushed to each client right after the handshake
        #[arg(long)]
        greeting: Option<String>,
    },
}
