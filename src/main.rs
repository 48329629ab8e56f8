mod atomic_write;
mod config;
mod hooks_config;
mod install;
mod materialize;
mod settings_merge;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "vbw",
    version,
    about = "VBW framework installer",
    long_about = "Copies VBW commands, agents, utils and hooks into a Claude config directory and registers the VBW gate hooks in settings.json."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Install VBW templates and hooks
    Install {
        /// Install into ~/.claude instead of ./.claude
        #[arg(short, long, conflicts_with = "local")]
        global: bool,

        /// Install into ./.claude (default)
        #[arg(short, long)]
        local: bool,

        /// Package root holding the template collections
        #[arg(long)]
        source: Option<PathBuf>,

        /// Explicit config directory to install into (overrides --global/--local)
        #[arg(long)]
        target: Option<PathBuf>,

        /// Copy files only, leave settings.json untouched
        #[arg(long)]
        no_hooks: bool,
    },

    /// Show or create the installer configuration
    Config {
        /// Write the default config file
        #[arg(long)]
        create: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Install {
            global,
            local: _,
            source,
            target,
            no_hooks,
        } => {
            let config = config::Config::load()?;
            let opts = install::InstallOptions {
                global,
                source,
                target,
                skip_hooks: no_hooks,
            };
            install::run(&opts, &config, cli.verbose)?;
        }

        Commands::Config { create } => {
            if create {
                let path = config::Config::create_default()?;
                println!("Created {}", path.display());
            } else {
                config::show_config()?;
            }
        }
    }

    Ok(())
}
