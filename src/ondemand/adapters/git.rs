// This adapter fetches the base template from a git repository.

use super::fetcher::Fetcher;
use crate::ondemand::shell;
use anyhow::{anyhow, Result};
use log::debug;
use std::path::{Path, PathBuf};

pub struct GitFetcher {
    git_bin: String,
}

impl GitFetcher {
    pub fn new(git_bin: String) -> Self {
        Self { git_bin }
    }
}

impl Fetcher for GitFetcher {
    fn fetch(&self, url: &str, branch: &str, dest: &Path) -> Result<PathBuf> {
        // Neither the branch nor the contents of an existing clone are verified.
        if dest.exists() {
            debug!("Clone already exists: {:?}", dest);
            return Ok(dest.to_path_buf());
        }
        clone_branch(&self.git_bin, url, branch, dest)?;
        Ok(dest.to_path_buf())
    }
}

fn clone_branch(git_bin: &str, url: &str, branch: &str, dest: &Path) -> Result<()> {
    debug!("Cloning {} ({}) into {:?}", url, branch, dest);
    match dest.parent() {
        Some(dir) => {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }
        None => {
            return Err(anyhow!("Failed to get parent directory of {:?}", dest));
        }
    }

    let dest_str = dest
        .to_str()
        .ok_or_else(|| anyhow!("Clone path contains invalid UTF-8: {:?}", dest))?;
    shell::exec(&[
        git_bin,
        "clone",
        "--single-branch",
        "--branch",
        branch,
        url,
        dest_str,
    ])
    .map_err(|e| anyhow!("Failed to clone git repository {}: {}", url, e))
}
