use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use clap_complete::Shell;

use courier_core::VERSION;

/// Courier - rate-limited bulk message delivery with envelope encryption
#[derive(Parser)]
#[command(name = "courier")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, env = "COURIER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Use ASCII symbols only
    #[arg(long, global = true)]
    pub ascii: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Directory holding targets.txt, messages.txt and session.json
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Key file location
    #[arg(long, value_name = "PATH")]
    pub key_file: Option<PathBuf>,

    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}

/// Arguments for `keys generate`
#[derive(Args)]
pub struct KeysGenerateArgs {
    /// Key password (otherwise read from the configured env var or prompted)
    #[arg(long)]
    pub password: Option<String>,

    /// Replace existing key material
    #[arg(long)]
    pub force: bool,

    /// Disable interactive prompts
    #[arg(long)]
    pub no_input: bool,
}

/// Arguments for `keys show`
#[derive(Args)]
pub struct KeysShowArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum KeysCommand {
    /// Derive and store new key material
    Generate(KeysGenerateArgs),

    /// Show the stored key's metadata (never the key)
    Show(KeysShowArgs),
}

/// Arguments for the `run` command
#[derive(Args)]
pub struct RunArgs {
    /// Minimum delay between messages, in seconds
    #[arg(long, value_name = "SECONDS")]
    pub min_delay: Option<f64>,

    /// Maximum delay, also used between targets
    #[arg(long, value_name = "SECONDS")]
    pub max_delay: Option<f64>,

    /// Send messages as written, without sealing
    #[arg(long)]
    pub no_envelope: bool,

    /// Keep going with tagged plaintext if no key is available
    #[arg(long)]
    pub allow_fallback: bool,

    /// Number of jobs to run side by side
    #[arg(long, default_value_t = 1, value_name = "N")]
    pub jobs: usize,

    /// Override the configured data directory
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Disable interactive prompts
    #[arg(long)]
    pub no_input: bool,

    /// Output final statuses as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `open` command
#[derive(Args)]
pub struct OpenArgs {
    /// Text as it was submitted, prefix included
    #[arg(value_name = "TEXT")]
    pub text: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `doctor` command
#[derive(Args)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `completions` command
#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_name = "SHELL")]
    pub shell: Shell,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a config file and create the data directory
    Init(InitArgs),

    /// Manage envelope key material
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },

    /// Deliver every message to every target
    Run(RunArgs),

    /// Open a sealed message with the stored key
    Open(OpenArgs),

    /// Check config, key material and job inputs
    Doctor(DoctorArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}
