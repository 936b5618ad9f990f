//! Notification transports.
//!
//! One transport is picked at startup and handed to the watcher. Sending is
//! fire and forget: the watcher logs a failed send and moves on.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::art::encode_png;
use crate::cli::BackendArg;
use crate::types::{Icon, NotificationRequest};

pub const APP_NAME: &str = "mpd-hiss";

pub trait NotificationTransport {
    fn name(&self) -> &'static str;

    fn send(&self, request: &NotificationRequest) -> Result<()>;
}

impl<T: NotificationTransport + ?Sized> NotificationTransport for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn send(&self, request: &NotificationRequest) -> Result<()> {
        (**self).send(request)
    }
}

/// Pick the transport for `backend`, resolving `Auto` from the platform
pub fn select(backend: BackendArg, timeout: Duration) -> Box<dyn NotificationTransport> {
    let backend = match backend {
        BackendArg::Auto if cfg!(target_os = "macos") => BackendArg::Native,
        BackendArg::Auto => BackendArg::DesktopBus,
        explicit => explicit,
    };

    let transport: Box<dyn NotificationTransport> = match backend {
        BackendArg::Native => Box::new(NativeCenter::new()),
        _ => Box::new(DesktopBus::new(timeout)),
    };
    log::info!("Using {} notifications", transport.name());
    transport
}

/// Escape the characters the freedesktop body markup gives meaning to
pub fn escape_markup(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// freedesktop.org notifications over the session bus
pub struct DesktopBus {
    timeout: Duration,
}

impl DesktopBus {
    /// Every notification reuses this id, so a new track replaces the old popup
    pub const REPLACES_ID: u32 = 1;

    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
impl NotificationTransport for DesktopBus {
    fn name(&self) -> &'static str {
        "desktop bus"
    }

    fn send(&self, request: &NotificationRequest) -> Result<()> {
        use notify_rust::{Hint, Notification, Timeout, Urgency};

        let timeout_ms = u32::try_from(self.timeout.as_millis()).unwrap_or(u32::MAX);
        let mut notification = Notification::new();
        notification
            .appname(APP_NAME)
            .id(Self::REPLACES_ID)
            .summary(&request.title)
            .body(&escape_markup(&request.description))
            .hint(Hint::SuppressSound(true))
            .hint(Hint::Urgency(Urgency::Low))
            .timeout(Timeout::Milliseconds(timeout_ms));

        match &request.icon {
            Some(Icon::Path(path)) => {
                notification.icon(&path.to_string_lossy());
            }
            Some(Icon::Raw(raw)) => {
                // Not every server honours image-data, some only look at the icon name
                let image = notify_rust::Image::from_rgba(raw.width, raw.height, raw.data.clone())
                    .map_err(|e| anyhow::anyhow!("Invalid icon data: {:?}", e))?;
                notification.image_data(image);
            }
            None => {}
        }

        notification
            .show()
            .map_err(|e| anyhow::anyhow!("Failed to show notification: {}", e))?;
        Ok(())
    }
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
impl NotificationTransport for DesktopBus {
    fn name(&self) -> &'static str {
        "desktop bus"
    }

    fn send(&self, _request: &NotificationRequest) -> Result<()> {
        let _ = self.timeout;
        anyhow::bail!("Desktop bus notifications are not available on this platform")
    }
}

/// macOS Notification Center through `terminal-notifier`
pub struct NativeCenter {
    program: PathBuf,
    icon_dir: PathBuf,
}

impl NativeCenter {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("terminal-notifier"),
            icon_dir: std::env::temp_dir(),
        }
    }

    /// Use another notifier binary and scratch directory for decoded icons
    pub fn with_program(program: impl Into<PathBuf>, icon_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            icon_dir: icon_dir.into(),
        }
    }

    /// The notifier only takes images by path, so decoded icons go through a PNG file
    fn icon_file(&self, icon: &Icon) -> Result<PathBuf> {
        match icon {
            Icon::Path(path) => Ok(path.clone()),
            Icon::Raw(raw) => {
                let path = self.icon_dir.join(format!("{}-icon.png", APP_NAME));
                let png = encode_png(raw)?;
                fs::write(&path, png)
                    .with_context(|| format!("Failed to write icon to {:?}", path))?;
                Ok(path)
            }
        }
    }

    fn arguments(request: &NotificationRequest, icon: Option<&Path>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-title".into(),
            request.title.clone().into(),
            "-message".into(),
            request.description.clone().into(),
            "-group".into(),
            APP_NAME.into(),
        ];
        if let Some(icon) = icon {
            args.push("-contentImage".into());
            args.push(icon.as_os_str().to_os_string());
        }
        args
    }
}

impl Default for NativeCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationTransport for NativeCenter {
    fn name(&self) -> &'static str {
        "native notification center"
    }

    fn send(&self, request: &NotificationRequest) -> Result<()> {
        let icon = match &request.icon {
            Some(icon) => match self.icon_file(icon) {
                Ok(path) => Some(path),
                Err(e) => {
                    log::warn!("Sending without icon: {:#}", e);
                    None
                }
            },
            None => None,
        };

        let output = Command::new(&self.program)
            .args(Self::arguments(request, icon.as_deref()))
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to run {:?}", self.program))?;

        if !output.status.success() {
            anyhow::bail!(
                "{:?} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawImage;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn request(icon: Option<Icon>) -> NotificationRequest {
        NotificationRequest {
            title: "T".to_string(),
            description: "Artist\nAlbum".to_string(),
            icon,
        }
    }

    fn raw_icon() -> Icon {
        Icon::Raw(Arc::new(RawImage {
            width: 1,
            height: 1,
            rowstride: 4,
            has_alpha: true,
            bits_per_sample: 8,
            channels: 4,
            data: vec![1, 2, 3, 255],
        }))
    }

    #[test]
    fn markup_is_escaped() {
        assert_eq!(escape_markup("Simon & <Garfunkel>"), "Simon &amp; &lt;Garfunkel&gt;");
        assert_eq!(escape_markup("plain\ntext"), "plain\ntext");
    }

    #[test]
    fn explicit_backend_is_respected() {
        let native = select(BackendArg::Native, Duration::from_secs(5));
        assert_eq!(native.name(), "native notification center");
        let bus = select(BackendArg::DesktopBus, Duration::from_secs(5));
        assert_eq!(bus.name(), "desktop bus");
    }

    #[test]
    fn auto_backend_follows_platform() {
        let transport = select(BackendArg::Auto, Duration::from_secs(5));
        if cfg!(target_os = "macos") {
            assert_eq!(transport.name(), "native notification center");
        } else {
            assert_eq!(transport.name(), "desktop bus");
        }
    }

    #[test]
    fn native_arguments() {
        let args = NativeCenter::arguments(&request(None), Some(Path::new("/tmp/cover.jpg")));
        let args: Vec<String> = args.into_iter().map(|a| a.into_string().unwrap()).collect();
        assert_eq!(
            args,
            vec![
                "-title",
                "T",
                "-message",
                "Artist\nAlbum",
                "-group",
                "mpd-hiss",
                "-contentImage",
                "/tmp/cover.jpg"
            ]
        );
        assert_eq!(NativeCenter::arguments(&request(None), None).len(), 6);
    }

    #[test]
    fn raw_icons_are_written_as_png() {
        let dir = TempDir::new().unwrap();
        let center = NativeCenter::with_program("terminal-notifier", dir.path());
        let path = center.icon_file(&raw_icon()).unwrap();
        assert!(path.starts_with(dir.path()));
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1, 1));

        let on_disk = Icon::Path(PathBuf::from("/music/a/cover.jpg"));
        assert_eq!(center.icon_file(&on_disk).unwrap(), PathBuf::from("/music/a/cover.jpg"));
    }

    #[cfg(unix)]
    #[test]
    fn native_send_reports_exit_status() {
        let dir = TempDir::new().unwrap();
        let ok = NativeCenter::with_program("true", dir.path());
        ok.send(&request(Some(raw_icon()))).unwrap();

        let failing = NativeCenter::with_program("false", dir.path());
        assert!(failing.send(&request(None)).is_err());

        let missing = NativeCenter::with_program(dir.path().join("no-such-notifier"), dir.path());
        assert!(missing.send(&request(None)).is_err());
    }
}
