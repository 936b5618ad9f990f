//! Runtime configuration.
//!
//! Built once at startup from the command line and the environment, then
//! passed to the watcher by reference. Nothing here changes while running.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::cli::{BackendArg, Cli};
use crate::format::{DEFAULT_DESCRIPTION_FORMAT, DEFAULT_TITLE_FORMAT};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 6600;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub reconnect_interval: Duration,
    pub title_format: String,
    pub description_format: String,
    /// Default icon, already `~`-expanded
    pub icon_path: PathBuf,
    /// Where relative song paths from MPD are rooted
    pub art_root: Option<PathBuf>,
    pub scale_icons: bool,
    pub backend: BackendArg,
    pub notification_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            password: None,
            reconnect_interval: Duration::from_secs(30),
            title_format: DEFAULT_TITLE_FORMAT.to_string(),
            description_format: DEFAULT_DESCRIPTION_FORMAT.to_string(),
            icon_path: expand_home(Path::new("~/.mpd-hiss.png")),
            art_root: None,
            scale_icons: false,
            backend: BackendArg::Auto,
            notification_timeout: Duration::from_millis(5000),
        }
    }
}

/// The `MPD_*` variables that feed into defaults
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub host: Option<String>,
    pub port: Option<String>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self {
            host: std::env::var("MPD_HOST").ok().filter(|h| !h.is_empty()),
            port: std::env::var("MPD_PORT").ok().filter(|p| !p.is_empty()),
        }
    }
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        Self::resolve(cli, &Environment::from_process())
    }

    /// Combine flags with the environment. Flags win; a password given with
    /// `--password` wins over one embedded in the host.
    pub fn resolve(cli: Cli, env: &Environment) -> Result<Self> {
        let raw_host = cli
            .host
            .or_else(|| env.host.clone())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let (embedded_password, host) = split_password(&raw_host);

        let port = match (cli.port, &env.port) {
            (Some(port), _) => port,
            (None, Some(port)) => port
                .parse()
                .with_context(|| format!("Invalid MPD_PORT {:?}", port))?,
            (None, None) => DEFAULT_PORT,
        };

        let reconnect_interval = Duration::try_from_secs_f64(cli.reconnect_interval)
            .with_context(|| {
                format!("Invalid reconnect interval {} seconds", cli.reconnect_interval)
            })?;

        Ok(Self {
            host,
            port,
            password: cli.password.or(embedded_password),
            reconnect_interval,
            title_format: cli.title_format,
            description_format: cli.description_format,
            icon_path: expand_home(&cli.icon_path),
            art_root: cli.music_directory.map(|dir| expand_home(&dir)),
            scale_icons: cli.scale_icons,
            backend: cli.backend,
            notification_timeout: Duration::from_millis(cli.timeout),
        })
    }
}

/// Split MPD's `password@host` form
pub fn split_password(host: &str) -> (Option<String>, String) {
    match host.split_once('@') {
        Some((password, host)) => (Some(password.to_string()), host.to_string()),
        None => (None, host.to_string()),
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => {
            log::warn!("No home directory, leaving {:?} as is", path);
            path.to_path_buf()
        }
    }
}
