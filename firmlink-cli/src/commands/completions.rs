//! Shell completion generation.

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io;

use crate::{Cli, CliError};

/// Write completions for `shell`, or for the shell named by `$SHELL`.
pub(crate) fn cmd_completions(shell: Option<Shell>) -> Result<()> {
    let shell = shell
        .or_else(Shell::from_env)
        .ok_or_else(|| {
            CliError::Usage(
                "Could not detect your shell; name it explicitly, e.g. `firmlink completions bash`"
                    .to_string(),
            )
        })?;
    let mut cmd = Cli::command();
    let name = cmd
        .get_name()
        .to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}
