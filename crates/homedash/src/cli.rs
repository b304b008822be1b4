//! Clap derive structures for the `homedash` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// homedash -- live home dashboard from the command line
#[derive(Debug, Parser)]
#[command(
    name = "homedash",
    version,
    about = "Watch and control your home from the command line",
    long_about = "A terminal client for the homedash state service.\n\n\
        Follows the live push channel for rooms, lights, zones and motion,\n\
        and sends light, room, zone and scene commands with instant feedback.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "HOMEDASH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Push channel URL, e.g. wss://home.local/ws (overrides profile)
    #[arg(long, short = 's', env = "HOMEDASH_SERVER", global = true)]
    pub server: Option<String>,

    /// Write endpoint base URL (derived from --server when omitted)
    #[arg(long, env = "HOMEDASH_API", global = true)]
    pub api: Option<String>,

    /// Session token
    #[arg(long, env = "HOMEDASH_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Connect in demo mode (no token needed)
    #[arg(long, env = "HOMEDASH_DEMO", global = true)]
    pub demo: bool,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HOMEDASH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "HOMEDASH_INSECURE", global = true)]
    pub insecure: bool,

    /// HTTP request timeout in seconds (overrides profile)
    #[arg(long, env = "HOMEDASH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Seconds to wait for the first state from the server
    #[arg(long, default_value = "10", global = true)]
    pub wait: u64,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Target power state for switch commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Power {
    On,
    Off,
}

impl Power {
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Follow the live dashboard until interrupted
    #[command(alias = "w")]
    Watch,

    /// List rooms and their lights
    #[command(alias = "r")]
    Rooms,

    /// Switch or dim a single light
    #[command(alias = "l")]
    Light(LightArgs),

    /// Switch every light in a room
    Room(GroupArgs),

    /// Switch every light in a zone
    #[command(alias = "z")]
    Zone(GroupArgs),

    /// Activate a scene
    Scene(SceneArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Write commands ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LightArgs {
    /// Light ID
    pub id: String,

    /// Switch on or off
    pub power: Power,

    /// Brightness (0-100)
    #[arg(long, short = 'b', value_parser = clap::value_parser!(u8).range(0..=100))]
    pub brightness: Option<u8>,

    /// Color temperature in kelvin
    #[arg(long, short = 't')]
    pub color_temp: Option<u16>,
}

#[derive(Debug, Args)]
pub struct GroupArgs {
    /// Room or zone ID
    pub id: String,

    /// Switch on or off
    pub power: Power,
}

#[derive(Debug, Args)]
pub struct SceneArgs {
    /// Scene ID
    pub id: String,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display current configuration (secrets redacted)
    Show,

    /// List configured profiles
    Profiles,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
