use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use walkdir::WalkDir;

use super::adapters::fetcher::Fetcher;
use super::config::{App, Base, Config};
use super::container::ContainerFile;
use super::render::{Renderer, TemplateVars};
use super::state::{Ledger, Status};

// Copied from the base clone into every app directory.
pub const ARTIFACTS: [&str; 5] = [
    "form.yml.erb",
    "manifest.yml.erb",
    "submit.yml.erb",
    "view.html.erb",
    "template",
];

// The subset of ARTIFACTS filled in with per-app values.
pub const RENDERED: [&str; 2] = ["form.yml.erb", "manifest.yml.erb"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Skipped,
    Incomplete,
}

impl Outcome {
    pub fn report(&self, app_name: &str) -> String {
        match self {
            Outcome::Created => format!("Created {}", app_name),
            Outcome::Skipped => format!("Skipped {} -- already created", app_name),
            Outcome::Incomplete => format!(
                "Skipped {} -- incomplete, rerun with --rebuild-incomplete",
                app_name
            ),
        }
    }

    pub fn plan(&self, app_name: &str) -> String {
        match self {
            Outcome::Created => format!("Would create {}", app_name),
            Outcome::Skipped => format!("Would skip {} -- already created", app_name),
            Outcome::Incomplete => format!("Would skip {} -- incomplete", app_name),
        }
    }
}

pub struct Generator {
    root: PathBuf,
    apps_dir: PathBuf,
    fetcher: Box<dyn Fetcher>,
    renderer: Box<dyn Renderer>,
    ledger: Ledger,
    rebuild_incomplete: bool,
}

impl Generator {
    pub fn new(
        root: PathBuf,
        apps_dir: PathBuf,
        fetcher: Box<dyn Fetcher>,
        renderer: Box<dyn Renderer>,
    ) -> Result<Self> {
        let ledger = Ledger::load(&apps_dir)?;
        Ok(Self {
            root,
            apps_dir,
            fetcher,
            renderer,
            ledger,
            rebuild_incomplete: false,
        })
    }

    pub fn rebuild_incomplete(mut self, rebuild: bool) -> Self {
        self.rebuild_incomplete = rebuild;
        self
    }

    pub fn app_dir(&self, app: &App) -> PathBuf {
        self.apps_dir.join(&app.app_name)
    }

    pub fn existing(&self, app: &App) -> Outcome {
        existing(&self.apps_dir, &self.ledger, app)
    }

    pub fn create_app(&mut self, base: &Base, app: &App) -> Result<Outcome> {
        let dest = self.app_dir(app);
        match self.existing(app) {
            Outcome::Skipped => return Ok(Outcome::Skipped),
            Outcome::Incomplete if !self.rebuild_incomplete => {
                warn!(
                    "{} was left incomplete by an earlier run: {}",
                    app.app_name,
                    dest.display()
                );
                return Ok(Outcome::Incomplete);
            }
            Outcome::Incomplete => {
                info!("Removing incomplete {}", dest.display());
                std::fs::remove_dir_all(&dest)?;
            }
            Outcome::Created => {}
        }

        std::fs::create_dir_all(&self.apps_dir)?;
        self.ledger.mark(&app.app_name, Status::InProgress)?;
        std::fs::create_dir(&dest)
            .with_context(|| format!("Failed to create {}", dest.display()))?;

        let base_dir = self
            .fetcher
            .fetch(&base.git_url, &base.git_branch, &self.root.join(&base.git_dir))?;
        for artifact in ARTIFACTS {
            copy_artifact(&base_dir.join(artifact), &dest.join(artifact))?;
        }

        let vars = TemplateVars::for_app(base, app);
        self.renderer.render(&vars, &dest, &RENDERED)?;

        if let Some(file) = ContainerFile::for_app(base, app) {
            file.write_if_needed(&dest)?;
        }

        self.ledger.mark(&app.app_name, Status::Complete)?;
        Ok(Outcome::Created)
    }

    // Processes apps in declaration order. The first error stops the run.
    pub fn run(&mut self, config: &Config) -> Result<Vec<Outcome>> {
        let mut outcomes = Vec::with_capacity(config.apps.len());
        for app in &config.apps {
            let outcome = self
                .create_app(&config.base, app)
                .with_context(|| format!("Failed to create {}", app.app_name))?;
            println!("{}", outcome.report(&app.app_name));
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

// What would happen to the app if it were generated now, ignoring --rebuild-incomplete.
pub fn existing(apps_dir: &Path, ledger: &Ledger, app: &App) -> Outcome {
    if !apps_dir.join(&app.app_name).exists() {
        return Outcome::Created;
    }
    match ledger.status(&app.app_name) {
        Some(Status::InProgress) => Outcome::Incomplete,
        _ => Outcome::Skipped,
    }
}

// Recursive copy, like `cp -R src dst`. Symlinks below `src` are recreated, not followed.
fn copy_artifact(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.with_context(|| format!("Failed to copy {}", src.display()))?;
        let rel = entry.path().strip_prefix(src)?;
        let target = if rel.as_os_str().is_empty() {
            dst.to_path_buf()
        } else {
            dst.join(rel)
        };
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_symlink() {
            let link = std::fs::read_link(entry.path())?;
            std::os::unix::fs::symlink(&link, &target).with_context(|| {
                format!("Failed to link {} to {}", target.display(), link.display())
            })?;
        } else {
            std::fs::copy(entry.path(), &target).with_context(|| {
                format!("Failed to copy {} to {}", entry.path().display(), target.display())
            })?;
        }
    }
    debug!("Copied {} to {}", src.display(), dst.display());
    Ok(())
}
