use anyhow::{Context, Result};
use clap::crate_version;
use env_logger::Builder;
use log::LevelFilter;

use flowtsp::flowtsp_framework::flowtsp_command::FLOWTSP_COMMANDS;

pub fn main() -> Result<()> {
    //info by default, RUST_LOG overrides
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let command = FLOWTSP_COMMANDS.build_cli();
    let command = command.version(crate_version!());
    let cli_matches = command.get_matches();

    log::info!("Flowtsp starting");

    FLOWTSP_COMMANDS.execute(&cli_matches).context("Executing flowtsp")
}
