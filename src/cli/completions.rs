use clap::CommandFactory;
use clap_complete::{generate, Shell};

use super::Cli;
use crate::error::Result;

pub fn run(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "bankreader", &mut std::io::stdout());
    Ok(())
}
