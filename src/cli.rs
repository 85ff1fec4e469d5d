use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "portwho")]
#[command(version, about = "Which process owns which socket, on Linux, Windows and macOS/BSD")]
pub struct Cli {
    /// Port number or process name to query
    pub query: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Show sockets in every state, not only listening ones
    #[arg(short, long, global = true)]
    pub all: bool,

    /// Sort results by field
    #[arg(short, long, value_enum, global = true)]
    pub sort: Option<SortField>,

    /// Filter by protocol
    #[arg(short, long, value_enum, global = true)]
    pub protocol: Option<ProtocolFilter>,

    /// Platform family to decode for (linux, windows, darwin, freebsd)
    #[arg(long, env = "PORTWHO_PLATFORM", global = true)]
    pub platform: Option<String>,

    /// Read host files (e.g. /proc) below this directory instead of /
    #[arg(long, env = "PORTWHO_ROOT", global = true)]
    pub root: Option<PathBuf>,

    /// Don't resolve owning processes while listing
    #[arg(long, global = true)]
    pub no_processes: bool,

    /// Config file (default: <config dir>/portwho/config.toml)
    #[arg(long, env = "PORTWHO_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level for diagnostics on stderr (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SortField {
    Port,
    Pid,
    Name,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ProtocolFilter {
    Tcp,
    Udp,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List every socket
    List,
    /// List listening sockets
    Listening,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
