// Template variables for form.yml.erb and manifest.yml.erb, and the renderers that apply them.

use std::fmt;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::debug;
use serde_json::Number;

use super::config::{App, Base, Resource};
use super::shell;

pub const VARS_FILE: &str = "vars.rb";
pub const TEMPLATE_EXT: &str = ".erb";

#[derive(Debug, Clone, PartialEq)]
pub enum ErbValue {
    Str(String),
    Num(Number),
    Bool(bool),
}

impl fmt::Display for ErbValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErbValue::Str(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            ErbValue::Num(n) => write!(f, "{}", n),
            ErbValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub value: ErbValue,
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{} = {}", self.name, self.value)
    }
}

// Ordered instance-variable assignments handed to erb.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateVars {
    pub assignments: Vec<Assignment>,
}

impl TemplateVars {
    pub fn for_app(base: &Base, app: &App) -> Self {
        let mut vars = TemplateVars::default();
        vars.set("title", ErbValue::Str(app.title.clone()));
        vars.set(
            &format!("{}_version", base.app_type),
            ErbValue::Str(sif_name(app.image(base))),
        );
        vars.set_resource("custom_memory_per_node", &app.memory);
        vars.set_resource("custom_num_cores", &app.cpu);
        vars
    }

    fn set(&mut self, name: &str, value: ErbValue) {
        self.assignments.push(Assignment {
            name: name.to_string(),
            value,
        });
    }

    fn set_resource(&mut self, prefix: &str, resource: &Resource) {
        if let Resource::Selectable { min, max, .. } = resource {
            self.set(&format!("{}_select", prefix), ErbValue::Bool(true));
            self.set(&format!("{}_min", prefix), ErbValue::Num(min.clone()));
            self.set(&format!("{}_max", prefix), ErbValue::Num(max.clone()));
        }
        self.set(prefix, ErbValue::Num(resource.value().clone()));
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&ErbValue> {
        self.assignments
            .iter()
            .rev()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }

    pub fn to_erb(&self) -> String {
        self.assignments
            .iter()
            .map(|a| format!("{}\n", a))
            .collect()
    }
}

// The cluster runs containers through Singularity, so images end up as SIF files
// named after the registry reference.
pub fn sif_name(image: &str) -> String {
    format!("{}.sif", image.replace(['/', ':'], "_"))
}

// Renderer fills the templates in an app directory. Each `<name>.erb` becomes `<name>`
// and the original template is removed.
pub trait Renderer {
    fn render(&self, vars: &TemplateVars, app_dir: &Path, templates: &[&str]) -> Result<()>;
}

pub struct ErbRenderer {
    erb_bin: String,
}

impl ErbRenderer {
    pub fn new(erb_bin: String) -> Self {
        Self { erb_bin }
    }
}

fn output_name(template: &str) -> Result<&str> {
    template
        .strip_suffix(TEMPLATE_EXT)
        .ok_or_else(|| anyhow!("Template {} has no {} extension", template, TEMPLATE_EXT))
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow!("Path contains invalid UTF-8: {:?}", path))
}

impl Renderer for ErbRenderer {
    fn render(&self, vars: &TemplateVars, app_dir: &Path, templates: &[&str]) -> Result<()> {
        let vars_file = app_dir.join(VARS_FILE);
        std::fs::write(&vars_file, vars.to_erb())
            .with_context(|| format!("Failed to write {}", vars_file.display()))?;
        debug!("Wrote {} template variables to {}", vars.assignments.len(), vars_file.display());

        for template in templates {
            let input = app_dir.join(template);
            let output = app_dir.join(output_name(template)?);
            shell::exec_to_file(
                &[self.erb_bin.as_str(), "-r", path_str(&vars_file)?, path_str(&input)?],
                &output,
            )?;
        }

        for template in templates {
            std::fs::remove_file(app_dir.join(template))?;
        }
        std::fs::remove_file(&vars_file)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ondemand::config::{AppType, PackageSources};
    use std::fs;
    use tempfile::TempDir;

    fn base(app_type: AppType) -> Base {
        Base {
            app_type,
            git_url: "https://github.com/example/ood-base.git".to_string(),
            git_dir: "ood-base".to_string(),
            git_branch: "main".to_string(),
            docker_image: "rocker/rstudio:4.3".to_string(),
        }
    }

    fn app(memory: Resource) -> App {
        App {
            app_name: "r-demo".to_string(),
            title: "R Demo".to_string(),
            cpu: Resource::Fixed(Number::from(2)),
            memory,
            docker_image: None,
            packages: PackageSources::Unsupported,
        }
    }

    fn names(vars: &TemplateVars, needle: &str) -> Vec<String> {
        vars.assignments
            .iter()
            .filter(|a| a.name.contains(needle))
            .map(|a| a.name.clone())
            .collect()
    }

    #[test]
    fn test_sif_name() {
        assert_eq!(sif_name("org/image:tag"), "org_image_tag.sif");
        assert_eq!(sif_name("plain"), "plain.sif");
        assert_eq!(
            sif_name("ghcr.io/org/sub/image:1.2"),
            "ghcr.io_org_sub_image_1.2.sif"
        );
    }

    #[test]
    fn test_fixed_memory_single_assignment() {
        let vars = TemplateVars::for_app(&base(AppType::Rstudio), &app(Resource::Fixed(Number::from(4))));

        assert_eq!(names(&vars, "memory"), vec!["custom_memory_per_node"]);
        assert_eq!(
            vars.get("custom_memory_per_node"),
            Some(&ErbValue::Num(Number::from(4)))
        );
    }

    #[test]
    fn test_selectable_memory_four_assignments() {
        let memory = Resource::Selectable {
            value: Number::from(4),
            min: Number::from(1),
            max: Number::from(8),
        };
        let vars = TemplateVars::for_app(&base(AppType::Rstudio), &app(memory));

        assert_eq!(names(&vars, "memory").len(), 4);
        assert_eq!(vars.get("custom_memory_per_node_select"), Some(&ErbValue::Bool(true)));
        assert_eq!(vars.get("custom_memory_per_node_min"), Some(&ErbValue::Num(Number::from(1))));
        assert_eq!(vars.get("custom_memory_per_node_max"), Some(&ErbValue::Num(Number::from(8))));
        assert_eq!(vars.get("custom_memory_per_node"), Some(&ErbValue::Num(Number::from(4))));
    }

    #[test]
    fn test_to_erb_order() {
        let mut a = app(Resource::Fixed(Number::from(8)));
        a.cpu = Resource::Selectable {
            value: Number::from(2),
            min: Number::from(1),
            max: Number::from(4),
        };
        a.docker_image = Some("org/image:tag".to_string());
        let vars = TemplateVars::for_app(&base(AppType::Rstudio), &a);

        assert_eq!(
            vars.to_erb(),
            "@title = 'R Demo'\n\
             @rstudio_version = 'org_image_tag.sif'\n\
             @custom_memory_per_node = 8\n\
             @custom_num_cores_select = true\n\
             @custom_num_cores_min = 1\n\
             @custom_num_cores_max = 4\n\
             @custom_num_cores = 2\n"
        );
    }

    #[test]
    fn test_version_variable_follows_app_type() {
        let vars = TemplateVars::for_app(&base(AppType::Jupyter), &app(Resource::Fixed(Number::from(1))));
        assert_eq!(
            vars.get("jupyter_version"),
            Some(&ErbValue::Str("rocker_rstudio_4.3.sif".to_string()))
        );
    }

    #[test]
    fn test_title_quoting() {
        let value = ErbValue::Str("Bob's \\ Lab".to_string());
        assert_eq!(value.to_string(), r"'Bob\'s \\ Lab'");
    }

    #[test]
    fn test_output_name() {
        assert_eq!(output_name("form.yml.erb").unwrap(), "form.yml");
        assert!(output_name("form.yml").is_err());
    }

    #[test]
    fn test_erb_renderer_with_stand_in_binary() {
        // Stand-in erb that prints the vars file followed by the template.
        let temp_dir = TempDir::new().unwrap();
        let bin = temp_dir.path().join("fake-erb");
        fs::write(&bin, "#!/bin/sh\ncat \"$2\" \"$3\"\n").unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&bin, fs::Permissions::from_mode(0o755)).unwrap();
        }
        let app_dir = temp_dir.path().join("app");
        fs::create_dir(&app_dir).unwrap();
        fs::write(app_dir.join("form.yml.erb"), "form: <%= @title %>\n").unwrap();
        fs::write(app_dir.join("manifest.yml.erb"), "manifest\n").unwrap();

        let vars = TemplateVars::for_app(&base(AppType::Rstudio), &app(Resource::Fixed(Number::from(4))));
        let renderer = ErbRenderer::new(bin.to_str().unwrap().to_string());
        renderer
            .render(&vars, &app_dir, &["form.yml.erb", "manifest.yml.erb"])
            .unwrap();

        let form = fs::read_to_string(app_dir.join("form.yml")).unwrap();
        assert!(form.contains("@title = 'R Demo'"));
        assert!(form.ends_with("form: <%= @title %>\n"));
        assert!(app_dir.join("manifest.yml").exists());
        assert!(!app_dir.join("form.yml.erb").exists());
        assert!(!app_dir.join("manifest.yml.erb").exists());
        assert!(!app_dir.join(VARS_FILE).exists());
    }

    #[test]
    fn test_erb_renderer_failure_keeps_templates() {
        let temp_dir = TempDir::new().unwrap();
        let app_dir = temp_dir.path();
        fs::write(app_dir.join("form.yml.erb"), "form\n").unwrap();

        let vars = TemplateVars::for_app(&base(AppType::Rstudio), &app(Resource::Fixed(Number::from(4))));
        let renderer = ErbRenderer::new("false".to_string());
        let result = renderer.render(&vars, app_dir, &["form.yml.erb"]);

        assert!(result.is_err());
        assert!(app_dir.join("form.yml.erb").exists());
    }
}
