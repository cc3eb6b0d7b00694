//! Docshift Migration Library
//!
//! The `docshift-migrate` binary runs with an empty registry, which is enough
//! for `init`, `new` and `status` of an empty directory. Applications that
//! compile their migrations in call [`run`] from their own binary with the
//! registry produced by [`build_script`]:
//!
//! ```rust,ignore
//! include!(concat!(env!("OUT_DIR"), "/migrations.rs"));
//!
//! fn main() -> std::process::ExitCode {
//!     match migration_registry::registry() {
//!         Ok(registry) => docshift_migrate::run(registry, Default::default()),
//!         Err(e) => {
//!             eprintln!("{e}");
//!             std::process::ExitCode::FAILURE
//!         }
//!     }
//! }
//! ```

pub mod build_script;
pub mod cli;
pub mod console;
pub mod scaffold;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use console::ConsoleReporter;
use docshift::config::{MigrateConfig, DEFAULT_CONFIG_PATH};
use docshift::migration::{
    run_down, run_status, run_up, DownMode, MigrationHooks, MigrationRegistry, MigrationReporter,
    UndoAllStrategy,
};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Parse the process arguments and run the command
pub fn run(registry: MigrationRegistry, hooks: MigrationHooks) -> ExitCode {
    run_from(std::env::args_os(), registry, hooks)
}

/// [`run`] with explicit arguments (first item is the program name)
pub fn run_from<I, T>(args: I, registry: MigrationRegistry, hooks: MigrationHooks) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    dotenv::dotenv().ok();

    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging(&cli);

    match execute(&cli, registry, &hooks) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "❌ Error:".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    // A host application may already have installed a logger
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init();
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Configuration file and environment, overridden by command-line flags
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded.
pub fn resolve_config(cli: &Cli) -> anyhow::Result<MigrateConfig> {
    let path = config_path(cli);
    if !path.is_file() {
        log::warn!(
            "No config found at {}; using defaults and environment. Run `init` to create one.",
            path.display()
        );
    }
    let mut config = MigrateConfig::load_from(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;

    if let Some(uri) = &cli.uri {
        config.uri.clone_from(uri);
    }
    if let Some(database) = &cli.database {
        config.database.clone_from(database);
    }
    if let Some(dir) = &cli.migrations_dir {
        config.migrations_dir.clone_from(dir);
    }
    Ok(config)
}

/// Run a parsed command
///
/// # Errors
///
/// Returns any configuration, scaffolding or migration error.
pub fn execute(cli: &Cli, registry: MigrationRegistry, hooks: &MigrationHooks) -> anyhow::Result<()> {
    let reporter: Arc<dyn MigrationReporter> = Arc::new(ConsoleReporter::new(cli.quiet));

    match &cli.command {
        Commands::Init => {
            let migrations_dir = cli
                .migrations_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from("migrations"));
            let config_path = config_path(cli);
            scaffold::init(&migrations_dir, &config_path)?;
            if !cli.quiet {
                println!("✅ Created {}", migrations_dir.display());
                println!("✅ Created {}", config_path.display());
            }
        }
        Commands::New {
            name,
            template_file,
        } => {
            let config = resolve_config(cli)?;
            let created = scaffold::create_migration(
                &config.migrations_dir,
                &scaffold::NewMigrationOptions {
                    name: name.as_deref(),
                    template_file: template_file.as_deref(),
                    extension: config.file_ext.as_deref(),
                },
                Utc::now(),
            )?;
            if !cli.quiet {
                println!(
                    "✅ Created migration {} ({})",
                    created.path.display(),
                    created.class_name
                );
            }
            hooks.run_after_new(&created.path, &created.name);
        }
        Commands::Up => {
            let config = resolve_config(cli)?;
            run_up(&config, Arc::new(registry), hooks, Some(reporter))?;
        }
        Commands::Down(args) => {
            let mut config = resolve_config(cli)?;
            if args.sequential {
                config.undo_all = UndoAllStrategy::ReverseSequential;
            }
            let mode = if args.last { DownMode::Last } else { DownMode::All };
            run_down(&config, Arc::new(registry), mode, hooks, Some(reporter))?;
        }
        Commands::Status => {
            let config = resolve_config(cli)?;
            let status = run_status(&config, Arc::new(registry))?;
            print!("{}", console::format_status(&status));
        }
    }

    Ok(())
}
