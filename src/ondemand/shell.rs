// Purpose: Run external tools (git, erb) synchronously.

use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::debug;
use subprocess::{Popen, PopenConfig, Redirection};

fn command_line(argv: &[&str]) -> String {
    argv.join(" ")
}

fn wait(mut p: Popen, argv: &[&str]) -> Result<()> {
    let status = p.wait()?;
    if !status.success() {
        return Err(anyhow!(
            "Command `{}` failed: {:?}",
            command_line(argv),
            status
        ));
    }
    Ok(())
}

// Runs the command with inherited stdio. Non-zero exit is an error.
pub fn exec(argv: &[&str]) -> Result<()> {
    debug!("Running command: {}", command_line(argv));
    let p = Popen::create(argv, PopenConfig::default())
        .with_context(|| format!("Failed to start `{}`", command_line(argv)))?;
    wait(p, argv)
}

// Runs the command with stdout redirected into `output`, which is truncated first.
pub fn exec_to_file(argv: &[&str], output: &Path) -> Result<()> {
    debug!(
        "Running command: {} > {}",
        command_line(argv),
        output.display()
    );
    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let p = Popen::create(
        argv,
        PopenConfig {
            stdout: Redirection::File(file),
            ..Default::default()
        },
    )
    .with_context(|| format!("Failed to start `{}`", command_line(argv)))?;
    wait(p, argv)
}
