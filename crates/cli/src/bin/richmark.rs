use std::io::{self, Write};

use anyhow::Context;
use clap::Parser;
use richmark_cli::cli::Cli;
use richmark_cli::{commands, log};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    log::init();

    let output = commands::run(&cli)?;
    io::stdout()
        .write_all(output.as_bytes())
        .context("failed to write output")?;
    Ok(())
}
