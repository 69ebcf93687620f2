use anyhow::Result;
use std::path::{Path, PathBuf};

// Fetcher abstracts over the ways to obtain a local snapshot of the base template.
pub trait Fetcher {
    // Ensures `dest` holds `branch` of `url`. An existing `dest` is reused as-is.
    fn fetch(&self, url: &str, branch: &str, dest: &Path) -> Result<PathBuf>;
}
