use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use rootfm_core::{Backend, ChangeNotifier, Config, FileFactory};
use rootfm_platform::{FsEntry, Permissions};

#[derive(Parser, Debug)]
#[command(name = "rootfm")]
#[command(about = "File browser core with native and privileged-shell backends")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(long, env = "ROOTFM_CONFIG_PATH", global = true)]
    config_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "ROOTFM_LOG_LEVEL", global = true)]
    log_level: String,

    /// Force the shell backend, overriding the config file
    #[arg(long, global = true)]
    shell: bool,

    /// Force the native backend, overriding the config file
    #[arg(long, global = true, conflicts_with = "shell")]
    native: bool,

    /// Include dotfiles in listings
    #[arg(long, global = true)]
    hidden: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List a directory
    Ls {
        path: PathBuf,
        /// Emit entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one entry's metadata
    Stat { path: PathBuf },
    /// Create an empty file
    Touch { path: PathBuf },
    /// Create a directory
    Mkdir {
        path: PathBuf,
        /// Create missing intermediate directories
        #[arg(short, long)]
        parents: bool,
    },
    /// Remove a file or a directory tree
    Rm { path: PathBuf },
    /// Recursive, attribute-preserving copy
    Cp { source: PathBuf, target: PathBuf },
    /// Move or rename
    Mv { source: PathBuf, target: PathBuf },
    /// Change the permission triple (3-digit octal, e.g. 640)
    Chmod { mode: String, path: PathBuf },
    /// Filesystem type of the mount holding the path (shell backend only)
    Fstype { path: PathBuf },
    /// Existence probe
    Exists { path: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let mut config = load_config(cli.config_path.as_deref())?;
    if cli.shell {
        config.use_shell_backend = true;
    }
    if cli.native {
        config.use_shell_backend = false;
    }
    if cli.hidden {
        config.show_hidden = true;
    }

    let factory = FileFactory::new(config);
    let notifier = ChangeNotifier::new();
    notifier.subscribe(|path| debug!("changed: {}", path.display()));

    if factory.backend() == Backend::Shell {
        info!(
            "using shell backend (privileged={})",
            factory.session().is_privileged()
        );
    }

    match cli.command {
        Commands::Ls { path, json } => run_ls(&factory, &path, json),
        Commands::Stat { path } => run_stat(&factory, &path),
        Commands::Touch { path } => {
            let mut entry = factory.open(&path);
            if !entry.create_new_file() {
                bail!("failed to create {}", path.display());
            }
            notifier.notify(&path);
            Ok(())
        }
        Commands::Mkdir { path, parents } => {
            let mut entry = factory.open(&path);
            let ok = if parents { entry.mkdirs() } else { entry.mkdir() };
            if !ok {
                bail!("failed to create directory {}", path.display());
            }
            notifier.notify(&path);
            Ok(())
        }
        Commands::Rm { path } => {
            let mut entry = factory.open(&path);
            if !entry.delete() {
                bail!("failed to remove {}", path.display());
            }
            notifier.notify(&path);
            Ok(())
        }
        Commands::Cp { source, target } => {
            let entry = factory.open(&source);
            if !entry.copy_to(&target) {
                bail!("failed to copy {} to {}", source.display(), target.display());
            }
            notifier.notify(&target);
            Ok(())
        }
        Commands::Mv { source, target } => {
            let mut entry = factory.open(&source);
            if !entry.move_to(&target) {
                bail!("failed to move {} to {}", source.display(), target.display());
            }
            notifier.notify(&source);
            notifier.notify(&target);
            Ok(())
        }
        Commands::Chmod { mode, path } => {
            let perms = parse_mode(&mode)?;
            let mut entry = factory.open(&path);
            if !entry.set_permissions(perms) {
                bail!("failed to chmod {} on {}", mode, path.display());
            }
            notifier.notify(&path);
            Ok(())
        }
        Commands::Fstype { path } => match factory.filesystem_type(&path) {
            Some(fstype) => {
                println!("{fstype}");
                Ok(())
            }
            None => bail!("filesystem type probe unavailable for {}", path.display()),
        },
        Commands::Exists { path } => {
            if factory.probe_exists(&path) {
                println!("exists");
                Ok(())
            } else {
                bail!("{} does not exist", path.display());
            }
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => {
            Config::load(path).with_context(|| format!("failed to load {}", path.display()))
        }
        None => {
            let path = Config::default_path();
            if path.exists() {
                Config::load(&path)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn parse_mode(mode: &str) -> Result<Permissions> {
    let bits = u32::from_str_radix(mode, 8)
        .with_context(|| format!("invalid octal mode `{mode}`"))?;
    if mode.len() != 3 || bits > 0o777 {
        bail!("mode must be three octal digits, e.g. 640");
    }
    Ok(Permissions::from_mode(bits))
}

fn run_ls(factory: &FileFactory, path: &Path, json: bool) -> Result<()> {
    let entry = factory.open(path);
    if !entry.exists() {
        bail!("{} does not exist", path.display());
    }
    let Some(children) = entry.list() else {
        bail!("listing unavailable for {}", path.display());
    };

    if json {
        let infos: Vec<_> = children.iter().map(|c| c.info()).collect();
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    for child in &children {
        let info = child.info();
        let type_flag = if info.is_symlink {
            'l'
        } else if info.is_dir {
            'd'
        } else {
            '-'
        };
        println!(
            "{}{} {:>5} {:>5} {:>10} {}{}",
            type_flag,
            info.permissions.as_deref().unwrap_or("---------"),
            info.owner,
            info.group,
            info.size,
            info.name,
            if info.is_dir { "/" } else { "" },
        );
    }
    Ok(())
}

fn run_stat(factory: &FileFactory, path: &Path) -> Result<()> {
    let entry = factory.open(path);
    let info = entry.info();
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
