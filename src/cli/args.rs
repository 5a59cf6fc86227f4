//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// CHTL development companion: watch, build, live reload and module index
#[derive(Parser, Debug, Clone)]
#[command(
    version,
    about,
    long_about = None,
    arg_required_else_help = true,
    disable_version_flag = true
)]
pub struct Cli {
    /// Print version
    #[arg(long, action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path, searched upward from the current directory
    #[arg(short = 'C', long, global = true, default_value = "chtl.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Watch sources, rebuild on change and live reload the preview
    #[command(visible_alias = "s")]
    Serve {
        /// Preview server port
        #[arg(short, long)]
        port: Option<u16>,

        /// Live reload WebSocket port
        #[arg(short, long)]
        live_port: Option<u16>,

        /// Build once and serve without watching for changes
        #[arg(long)]
        no_watch: bool,
    },

    /// Compile the given files, walking directories for sources
    #[command(visible_alias = "b")]
    Build {
        /// Files or directories (default: the watch root)
        #[arg(value_name = "PATH", value_hint = clap::ValueHint::AnyPath)]
        paths: Vec<PathBuf>,
    },

    /// Index module packages and query the registry
    #[command(visible_alias = "m")]
    Modules {
        #[command(flatten)]
        args: ModulesArgs,
    },
}

/// Modules command arguments.
#[derive(clap::Args, Debug, Clone)]
pub struct ModulesArgs {
    /// Ignore the snapshot and extract every module again
    #[arg(short, long)]
    pub rebuild: bool,

    /// Show one module by name
    #[arg(short, long, value_name = "NAME")]
    pub lookup: Option<String>,

    /// List modules exporting a component name
    #[arg(short, long, value_name = "COMPONENT")]
    pub find: Option<String>,

    /// Output JSON instead of text
    #[arg(short, long)]
    pub json: bool,
}

#[allow(unused)]
impl Cli {
    pub const fn is_serve(&self) -> bool {
        matches!(self.command, Commands::Serve { .. })
    }
    pub const fn is_build(&self) -> bool {
        matches!(self.command, Commands::Build { .. })
    }
    pub const fn is_modules(&self) -> bool {
        matches!(self.command, Commands::Modules { .. })
    }
}
