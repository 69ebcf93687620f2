mod ondemand;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::debug;
use simplelog::{ColorChoice, Config as LogConfig, LevelFilter, TermLogger, TerminalMode};
use std::path::{Path, PathBuf};

use ondemand::adapters::git::GitFetcher;
use ondemand::config::Config;
use ondemand::generator::{existing, Generator};
use ondemand::render::ErbRenderer;
use ondemand::state::Ledger;

#[derive(Debug, Args)]
struct GlobalOpts {
    // Directory holding apps.json, the base clone and the apps folder.
    #[arg(long, short, global = true, default_value_os_t = PathBuf::from("."))]
    root: PathBuf,

    #[arg(long, short, global = true, help = "Config file [default: <root>/apps.json]")]
    config: Option<PathBuf>,

    #[arg(long, short, global = true, help = "Output folder [default: <root>/apps]")]
    apps_dir: Option<PathBuf>,

    #[arg(long, short, global = true, help = "Enable debug logging")]
    verbose: bool,
}

#[derive(Debug, Args)]
struct GenerateOpts {
    #[arg(long, default_value = "git", help = "git executable used to clone the base")]
    git: String,

    #[arg(long, default_value = "erb", help = "erb executable used to render templates")]
    erb: String,

    #[arg(long, help = "Recreate apps left incomplete by an interrupted run")]
    rebuild_incomplete: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[clap(
        name = "generate",
        about = "Create the app folders declared in the config. Existing apps are skipped."
    )]
    Generate {
        #[clap(flatten)]
        args: GenerateOpts,
    },

    #[clap(
        name = "check",
        about = "Validate the config and show what generate would do."
    )]
    Check,
}

#[derive(Parser)]
#[command(name = "ondemand-gen")]
#[command(about = "Scaffold OnDemand interactive apps from a JSON config.", long_about = None)]
#[command(version)]
pub struct App {
    #[clap(flatten)]
    args: GlobalOpts,

    #[clap(subcommand)]
    command: Command,
}

fn resolve(root: &Path, path: Option<PathBuf>, default: &str) -> PathBuf {
    match path {
        Some(p) if p.is_absolute() => p,
        Some(p) => root.join(p),
        None => root.join(default),
    }
}

fn main() -> Result<()> {
    let app = App::parse();
    let args = app.args;

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(
        level,
        LogConfig::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;

    let root = std::fs::canonicalize(&args.root)?;
    let config_path = resolve(&root, args.config, "apps.json");
    let apps_dir = resolve(&root, args.apps_dir, "apps");
    debug!("Root: {:?}, apps: {:?}", root, apps_dir);

    // Validation finishes before anything touches the filesystem.
    let config = Config::load(&config_path)?;

    match app.command {
        Command::Generate { args } => {
            let mut generator = Generator::new(
                root,
                apps_dir,
                Box::new(GitFetcher::new(args.git)),
                Box::new(ErbRenderer::new(args.erb)),
            )?
            .rebuild_incomplete(args.rebuild_incomplete);
            generator.run(&config)?;
        }
        Command::Check => {
            let ledger = Ledger::load(&apps_dir)?;
            for app in &config.apps {
                println!("{}", existing(&apps_dir, &ledger, app).plan(&app.app_name));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_paths() {
        let root = Path::new("/srv/ood");
        assert_eq!(resolve(root, None, "apps.json"), PathBuf::from("/srv/ood/apps.json"));
        assert_eq!(
            resolve(root, Some(PathBuf::from("conf/r.json")), "apps.json"),
            PathBuf::from("/srv/ood/conf/r.json")
        );
        assert_eq!(
            resolve(root, Some(PathBuf::from("/etc/apps.json")), "apps.json"),
            PathBuf::from("/etc/apps.json")
        );
    }
}
