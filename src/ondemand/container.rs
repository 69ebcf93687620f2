use std::path::Path;

use anyhow::Result;
use handlebars::Handlebars;
use log::debug;
use serde::Serialize;

use super::config::{App, Base, PackageSources};
use super::templates::{CONTAINERFILE_NAME, STEP_SEPARATOR, TEMPLATE_CONTAINERFILE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Cran,
    Github,
    Bioconductor,
    Pip,
    CondaChannel,
    Conda,
}

impl PackageManager {
    // Channel registration configures conda but installs nothing by itself.
    pub fn installs_packages(&self) -> bool {
        !matches!(self, PackageManager::CondaChannel)
    }
}

// R character vector literal: c("a","b")
fn charvector(packages: &[String]) -> String {
    let quoted: Vec<String> = packages.iter().map(|p| format!("\"{}\"", p)).collect();
    format!("c({})", quoted.join(","))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub manager: PackageManager,
    pub packages: Vec<String>,
}

impl Instruction {
    pub fn command(&self) -> String {
        match self.manager {
            PackageManager::Cran => format!(
                "Rscript -e 'install.packages({})'",
                charvector(&self.packages)
            ),
            PackageManager::Github => format!(
                "Rscript -e 'remotes::install_github({}, build_vignettes=TRUE)'",
                charvector(&self.packages)
            ),
            PackageManager::Bioconductor => format!(
                "Rscript -e 'BiocManager::install({}, ask=FALSE)'",
                charvector(&self.packages)
            ),
            PackageManager::Pip => {
                format!("pip install --no-cache-dir {}", self.packages.join(" "))
            }
            PackageManager::CondaChannel => {
                format!("conda config --append channels {}", self.packages.join(" "))
            }
            PackageManager::Conda => {
                format!("conda install --quiet --yes {}", self.packages.join(" "))
            }
        }
    }
}

// ContainerFile accumulates RUN steps layered on a base image. Each step holds one or
// more instructions that run chained in a single layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerFile {
    pub base_image: String,
    pub steps: Vec<Vec<Instruction>>,
}

impl ContainerFile {
    pub fn new(base_image: &str) -> Self {
        Self {
            base_image: base_image.to_string(),
            steps: vec![],
        }
    }

    // Adds one step from the non-empty package lists; nothing is added if all are empty.
    pub fn step(mut self, lists: &[(PackageManager, &Vec<String>)]) -> Self {
        let instructions: Vec<Instruction> = lists
            .iter()
            .filter(|(_, packages)| !packages.is_empty())
            .map(|(manager, packages)| Instruction {
                manager: *manager,
                packages: packages.to_vec(),
            })
            .collect();
        if !instructions.is_empty() {
            self.steps.push(instructions);
        }
        self
    }

    // Builds the file for an app, or None when the base app type has no package support.
    pub fn for_app(base: &Base, app: &App) -> Option<Self> {
        let file = ContainerFile::new(&base.docker_image);
        match &app.packages {
            PackageSources::R { cran, github, bioc } => Some(file.step(&[
                (PackageManager::Cran, cran),
                (PackageManager::Github, github),
                (PackageManager::Bioconductor, bioc),
            ])),
            PackageSources::Python {
                pip,
                conda,
                channels,
            } => Some(
                file.step(&[(PackageManager::Pip, pip)])
                    .step(&[(PackageManager::CondaChannel, channels)])
                    .step(&[(PackageManager::Conda, conda)]),
            ),
            PackageSources::Unsupported => None,
        }
    }

    pub fn installs_packages(&self) -> bool {
        self.steps
            .iter()
            .flatten()
            .any(|i| i.manager.installs_packages())
    }

    pub fn render(&self) -> Result<String> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.register_template_string("Containerfile", TEMPLATE_CONTAINERFILE)?;

        #[derive(Serialize)]
        struct Data<'a> {
            base_image: &'a str,
            steps: Vec<String>,
        }

        let d = Data {
            base_image: &self.base_image,
            steps: self
                .steps
                .iter()
                .map(|step| {
                    step.iter()
                        .map(Instruction::command)
                        .collect::<Vec<String>>()
                        .join(STEP_SEPARATOR)
                })
                .collect(),
        };

        Ok(handlebars.render("Containerfile", &d)?)
    }

    // Writes the Dockerfile only when at least one package gets installed.
    pub fn write_if_needed(&self, app_dir: &Path) -> Result<bool> {
        if !self.installs_packages() {
            debug!("No packages requested, running {} unmodified", self.base_image);
            return Ok(false);
        }
        let path = app_dir.join(CONTAINERFILE_NAME);
        std::fs::write(&path, self.render()?)?;
        debug!("Wrote {}", path.display());
        Ok(true)
    }
}
