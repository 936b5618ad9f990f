use anyhow::{Context, Result};

use mpd_hiss::cli::Cli;
use mpd_hiss::config::Config;
use mpd_hiss::mpd::MpdClient;
use mpd_hiss::notifier;
use mpd_hiss::shutdown::Shutdown;
use mpd_hiss::watcher::PlaybackWatcher;

fn main() {
    let cli = Cli::parse_args();

    // Initialize logger; --debug only changes the default, RUST_LOG still wins
    let default_filter = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(cli) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::from_cli(cli)?;
    log::debug!("Configuration: {:?}", redacted(&config));

    let shutdown = Shutdown::new();

    // Setup signal handler for Ctrl+C (SIGINT) and SIGTERM
    let shutdown_for_signal = shutdown.clone();
    ctrlc::set_handler(move || {
        log::info!("Received interrupt signal, shutting down...");
        shutdown_for_signal.trigger();
    })
    .context("Failed to set signal handler")?;

    let transport = notifier::select(config.backend, config.notification_timeout);
    let daemon = MpdClient::new(shutdown.clone());

    let mut watcher = PlaybackWatcher::new(config, daemon, transport, shutdown)
        .context("Invalid notification format")?;
    watcher.run();

    Ok(())
}

fn redacted(config: &Config) -> Config {
    Config {
        password: config.password.as_ref().map(|_| "<redacted>".to_string()),
        ..config.clone()
    }
}
