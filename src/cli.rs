//! Command-line interface.
//!
//! Host and port fall back to `MPD_HOST` and `MPD_PORT`; see [`crate::config`]
//! for how the raw values become a [`crate::config::Config`].

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::format::{DEFAULT_DESCRIPTION_FORMAT, DEFAULT_TITLE_FORMAT};

/// Notification backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    /// Pick from the platform: native on macOS, desktop bus elsewhere
    #[default]
    Auto,
    /// freedesktop.org notifications over D-Bus
    DesktopBus,
    /// macOS Notification Center (needs terminal-notifier)
    Native,
}

#[derive(Parser, Debug)]
#[command(name = "mpd-hiss")]
#[command(about = "Now Playing desktop notifications for MPD")]
#[command(version)]
#[command(after_help = "Format fields: {artist}, {title}, {album}, {duration}. Use {{ and }} for literal braces.")]
pub struct Cli {
    /// MPD host, optionally as password@host [default: $MPD_HOST or localhost]
    #[arg(long)]
    pub host: Option<String>,

    /// MPD port [default: $MPD_PORT or 6600]
    #[arg(long)]
    pub port: Option<u16>,

    /// MPD password
    #[arg(long)]
    pub password: Option<String>,

    /// Seconds to wait before reconnecting after a connection failure
    #[arg(long, default_value = "30")]
    pub reconnect_interval: f64,

    /// Notification title format
    #[arg(long, default_value = DEFAULT_TITLE_FORMAT)]
    pub title_format: String,

    /// Notification description format
    #[arg(long, default_value = DEFAULT_DESCRIPTION_FORMAT)]
    pub description_format: String,

    /// Default notification icon
    #[arg(long = "icon", default_value = "~/.mpd-hiss.png")]
    pub icon_path: PathBuf,

    /// MPD music directory, used to find album art for relative song paths
    #[arg(long)]
    pub music_directory: Option<PathBuf>,

    /// Decode and shrink icons before sending them
    #[arg(long)]
    pub scale_icons: bool,

    /// Notification backend
    #[arg(long, value_enum, default_value_t = BackendArg::Auto)]
    pub backend: BackendArg,

    /// How long notifications stay up, in milliseconds
    #[arg(long, default_value = "5000")]
    pub timeout: u64,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
