use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{Number, Value};

use super::state::LEDGER_FILE;

const BASE_REQUIRED: [&str; 5] = ["app_type", "git_url", "git_dir", "git_branch", "docker_image"];
const APP_REQUIRED: [&str; 4] = ["app_name", "title", "cpu", "memory"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum AppType {
    Rstudio,
    Jupyter,
    Other(String),
}

impl From<String> for AppType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "rstudio" => AppType::Rstudio,
            "jupyter" => AppType::Jupyter,
            _ => AppType::Other(tag),
        }
    }
}

impl AppType {
    pub fn as_str(&self) -> &str {
        match self {
            AppType::Rstudio => "rstudio",
            AppType::Jupyter => "jupyter",
            AppType::Other(tag) => tag,
        }
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Base holds the template repository every app is derived from.
#[derive(Debug, Clone, Deserialize)]
pub struct Base {
    pub app_type: AppType,
    pub git_url: String,
    pub git_dir: String,
    pub git_branch: String,
    pub docker_image: String,
}

// A CPU or memory request. Selectable requests are exposed to users as a range.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Fixed(Number),
    Selectable { value: Number, min: Number, max: Number },
}

impl Resource {
    pub fn value(&self) -> &Number {
        match self {
            Resource::Fixed(value) => value,
            Resource::Selectable { value, .. } => value,
        }
    }
}

// Package lists grouped by the package managers the base image understands.
#[derive(Debug, Clone, PartialEq)]
pub enum PackageSources {
    R {
        cran: Vec<String>,
        github: Vec<String>,
        bioc: Vec<String>,
    },
    Python {
        pip: Vec<String>,
        conda: Vec<String>,
        channels: Vec<String>,
    },
    Unsupported,
}

#[derive(Debug, Clone)]
pub struct App {
    pub app_name: String,
    pub title: String,
    pub cpu: Resource,
    pub memory: Resource,
    pub docker_image: Option<String>,
    pub packages: PackageSources,
}

impl App {
    // The image the app runs, falling back to the base image.
    pub fn image<'a>(&'a self, base: &'a Base) -> &'a str {
        self.docker_image.as_deref().unwrap_or(&base.docker_image)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub base: Base,
    pub apps: Vec<App>,
}

#[derive(Debug, Deserialize)]
struct RawResource {
    value: Number,
    #[serde(default)]
    select: bool,
    min: Option<Number>,
    max: Option<Number>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPackages {
    #[serde(default)]
    cran: Vec<String>,
    #[serde(default)]
    github: Vec<String>,
    #[serde(default)]
    bioc: Vec<String>,
    #[serde(default)]
    pip: Vec<String>,
    #[serde(default)]
    conda: Vec<String>,
    #[serde(default)]
    channels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawApp {
    app_name: String,
    title: String,
    cpu: RawResource,
    memory: RawResource,
    docker_image: Option<String>,
    packages: Option<RawPackages>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    base: Base,
    apps: Vec<RawApp>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::parse(&data)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        debug!(
            "Loaded {} apps of type {} from {}",
            config.apps.len(),
            config.base.app_type,
            path.display()
        );
        Ok(config)
    }

    pub fn parse(data: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(data)?;
        check_required(&value)?;
        let raw: RawConfig = serde_json::from_value(value)?;

        let mut names = HashSet::new();
        let mut apps = Vec::with_capacity(raw.apps.len());
        for (i, app) in raw.apps.into_iter().enumerate() {
            let app = validate_app(&raw.base.app_type, app)
                .with_context(|| format!("App {} is invalid", i))?;
            if !names.insert(app.app_name.clone()) {
                bail!("Duplicate app_name: {}", app.app_name);
            }
            apps.push(app);
        }
        Ok(Config {
            base: raw.base,
            apps,
        })
    }
}

// Key presence is checked before typed parsing so a missing key names its entry.
fn check_required(value: &Value) -> Result<()> {
    let base = value
        .get("base")
        .ok_or_else(|| anyhow!("Config missing required attribute: base"))?;
    for key in BASE_REQUIRED {
        if base.get(key).is_none() {
            bail!("Base missing required attribute: {}", key);
        }
    }
    let apps = value
        .get("apps")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("Config missing required attribute: apps"))?;
    for (i, app) in apps.iter().enumerate() {
        for key in APP_REQUIRED {
            if app.get(key).is_none() {
                bail!("App {} is missing required attribute: {} {}", i, key, app);
            }
        }
    }
    Ok(())
}

fn validate_app(app_type: &AppType, raw: RawApp) -> Result<App> {
    validate_name(&raw.app_name)?;
    let cpu = validate_resource("cpu", raw.cpu)?;
    let memory = validate_resource("memory", raw.memory)?;
    let packages = package_sources(app_type, &raw.app_name, raw.packages.unwrap_or_default());
    Ok(App {
        app_name: raw.app_name,
        title: raw.title,
        cpu,
        memory,
        docker_image: raw.docker_image,
        packages,
    })
}

// The name becomes a directory under the apps dir, so it has to be a single path component.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name == LEDGER_FILE {
        bail!("app_name must be a directory name, got {:?}", name);
    }
    if name.contains(['/', '\\']) {
        bail!("app_name must not contain path separators: {}", name);
    }
    Ok(())
}

fn positive(field: &str, n: &Number) -> Result<f64> {
    match n.as_f64() {
        Some(v) if v > 0.0 => Ok(v),
        _ => Err(anyhow!("{} must be a positive number, got {}", field, n)),
    }
}

fn validate_resource(field: &str, raw: RawResource) -> Result<Resource> {
    let value = positive(&format!("{}.value", field), &raw.value)?;
    if !raw.select {
        return Ok(Resource::Fixed(raw.value));
    }
    let min = raw
        .min
        .ok_or_else(|| anyhow!("{}.min is required when {}.select is true", field, field))?;
    let max = raw
        .max
        .ok_or_else(|| anyhow!("{}.max is required when {}.select is true", field, field))?;
    let lo = positive(&format!("{}.min", field), &min)?;
    let hi = positive(&format!("{}.max", field), &max)?;
    if !(lo <= value && value <= hi) {
        bail!(
            "{} range must satisfy min <= value <= max, got {} <= {} <= {}",
            field,
            min,
            raw.value,
            max
        );
    }
    Ok(Resource::Selectable {
        value: raw.value,
        min,
        max,
    })
}

fn package_sources(app_type: &AppType, app_name: &str, raw: RawPackages) -> PackageSources {
    let r_keys = !(raw.cran.is_empty() && raw.github.is_empty() && raw.bioc.is_empty());
    let py_keys = !(raw.pip.is_empty() && raw.conda.is_empty() && raw.channels.is_empty());
    match app_type {
        AppType::Rstudio => {
            if py_keys {
                warn!("{}: pip/conda/channels packages are ignored for rstudio apps", app_name);
            }
            PackageSources::R {
                cran: raw.cran,
                github: raw.github,
                bioc: raw.bioc,
            }
        }
        AppType::Jupyter => {
            if r_keys {
                warn!("{}: cran/github/bioc packages are ignored for jupyter apps", app_name);
            }
            PackageSources::Python {
                pip: raw.pip,
                conda: raw.conda,
                channels: raw.channels,
            }
        }
        AppType::Other(tag) => {
            if r_keys || py_keys {
                warn!("{}: packages are ignored for app type {}", app_name, tag);
            }
            PackageSources::Unsupported
        }
    }
}
