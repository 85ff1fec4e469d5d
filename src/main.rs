use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = portwho::Cli::parse();
    portwho::run(cli)
}
