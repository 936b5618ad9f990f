use crate::art::AlbumArtResolver;
use crate::config::Config;
use crate::differ::should_notify;
use crate::error::{DaemonError, FormatError};
use crate::format::NotificationFormatter;
use crate::mpd::MusicDaemon;
use crate::notifier::NotificationTransport;
use crate::shutdown::Shutdown;
use crate::types::{NotificationRequest, PlayerStatus};

/// The control loop: connect, wait for player events, notify, reconnect on failure
pub struct PlaybackWatcher<D, T> {
    config: Config,
    daemon: D,
    transport: T,
    formatter: NotificationFormatter,
    resolver: AlbumArtResolver,
    shutdown: Shutdown,
    /// Kept across reconnects so a dropped connection doesn't repeat the last notification
    last_status: PlayerStatus,
}

impl<D: MusicDaemon, T: NotificationTransport> PlaybackWatcher<D, T> {
    /// Fails if either format template is invalid
    pub fn new(
        config: Config,
        daemon: D,
        transport: T,
        shutdown: Shutdown,
    ) -> Result<Self, FormatError> {
        let formatter =
            NotificationFormatter::new(&config.title_format, &config.description_format)?;
        let default_icon = crate::art::default_icon(&config.icon_path, config.scale_icons);
        let resolver =
            AlbumArtResolver::new(config.art_root.clone(), config.scale_icons, default_icon);

        Ok(Self {
            config,
            daemon,
            transport,
            formatter,
            resolver,
            shutdown,
            last_status: PlayerStatus::default(),
        })
    }

    /// Run until shutdown is requested
    pub fn run(&mut self) {
        while !self.shutdown.is_requested() {
            let outcome = self.session();
            self.disconnect();

            match outcome {
                Ok(()) => break,
                Err(_) if self.shutdown.is_requested() => break,
                Err(e) => {
                    match &e {
                        DaemonError::Auth(_) => {
                            log::error!("{} (check the configured MPD password)", e)
                        }
                        _ => log::error!("Error: {}", e),
                    }
                    log::info!(
                        "Reconnecting in {:.1} seconds...",
                        self.config.reconnect_interval.as_secs_f64()
                    );
                    if self.shutdown.sleep(self.config.reconnect_interval) {
                        break;
                    }
                }
            }
        }
        log::info!("Stopped watching MPD");
    }

    /// One connection's worth of work. Only returns `Ok` on shutdown.
    fn session(&mut self) -> Result<(), DaemonError> {
        log::info!(
            "Connecting to MPD at {}:{}...",
            self.config.host,
            self.config.port
        );
        self.daemon.connect(&self.config.host, self.config.port)?;
        log::info!("Connected.");

        if let Some(password) = &self.config.password {
            log::info!("Authenticating...");
            self.daemon.authenticate(password)?;
            log::info!("Authenticated.");
        }

        // A stop can land while connecting, before any idle could be interrupted
        while !self.shutdown.is_requested() {
            self.daemon.wait_for_player_change()?;
            if self.shutdown.is_requested() {
                break;
            }
            self.process_event()?;
        }
        Ok(())
    }

    fn process_event(&mut self) -> Result<(), DaemonError> {
        let status = match self.daemon.status() {
            Ok(status) => status,
            Err(e) if !e.is_fatal_to_session() => {
                log::warn!("Skipping player event: {}", e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        log::debug!("Player status: {:?}", status);

        if should_notify(&self.last_status, &status) {
            self.notify()?;
        }
        self.last_status = status;
        Ok(())
    }

    fn notify(&mut self) -> Result<(), DaemonError> {
        let track = match self.daemon.current_song() {
            Ok(track) => track,
            Err(e) if !e.is_fatal_to_session() => {
                log::warn!("Skipping notification: {}", e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let icon = self.resolver.resolve(track.file.as_deref());
        let (title, description) = self.formatter.render(&track);

        log::info!(
            "Sending Now Playing notification for {} - [{}] {}",
            track.artist,
            track.album,
            track.title
        );
        let request = NotificationRequest {
            title,
            description,
            icon,
        };
        if let Err(e) = self.transport.send(&request) {
            log::warn!("Notification via {} failed: {:#}", self.transport.name(), e);
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Err(e) = self.daemon.disconnect() {
            log::debug!("Ignoring error while disconnecting: {}", e);
        }
    }
}
