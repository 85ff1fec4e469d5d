pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod memo;
pub mod output;
pub mod platform;
pub mod ports;
pub mod registry;
pub mod session;
pub mod types;
pub mod users;

pub use cli::Cli;
pub use error::{Result, ScanError};
pub use platform::PlatformFamily;
pub use ports::{Ports, ScanOptions};
pub use session::Session;
pub use types::{ProcessDescriptor, Protocol, SocketRecord, SocketState, UserDescriptor};

use std::io;
use std::sync::Arc;

use clap::CommandFactory;

use config::Config;

pub fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cli::Commands::Completions { shell }) = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "portwho", &mut io::stdout());
        return Ok(());
    }

    let config = Config::load(&cli)?;
    logging::init_logging(&config.log_level);

    let session = Arc::new(Session::local(config.platform, config.root));
    let ports = Ports::with_options(
        session,
        ScanOptions {
            resolve_processes: config.resolve_processes,
        },
    );

    let view = commands::ViewOptions {
        json: cli.json,
        all: cli.all,
        sort: cli.sort,
        protocol: cli.protocol,
    };

    match &cli.command {
        Some(cli::Commands::List) => commands::list::execute(&ports, &view.with_all(true)),
        Some(cli::Commands::Listening) => commands::list::execute(&ports, &view.with_all(false)),
        Some(cli::Commands::Completions { .. }) => Ok(()),
        None => match &cli.query {
            Some(query) => commands::query::execute(&ports, query, &view),
            None => commands::list::execute(&ports, &view),
        },
    }
}
