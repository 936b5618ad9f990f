use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    Playing,
    Paused,
    #[default]
    Stopped,
}

/// One snapshot of the player, replaced wholesale on every event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayerStatus {
    pub state: PlaybackState,
    pub song_id: Option<String>,
}

impl PlayerStatus {
    pub fn new(state: PlaybackState, song_id: Option<&str>) -> Self {
        Self {
            state,
            song_id: song_id.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    pub artist: String,
    pub title: String,
    pub album: String,
    /// Length in whole seconds
    pub duration: u64,
    pub file: Option<String>,
}

impl TrackMetadata {
    pub const UNKNOWN_ARTIST: &'static str = "Unknown artist";
    pub const UNKNOWN_TRACK: &'static str = "Unknown track";

    /// Build metadata from possibly missing tags, applying the display fallbacks.
    ///
    /// The title falls back to the file's base name, then to "Unknown track".
    pub fn from_tags(
        artist: Option<String>,
        title: Option<String>,
        album: Option<String>,
        duration: Option<u64>,
        file: Option<String>,
    ) -> Self {
        let title = title
            .filter(|t| !t.is_empty())
            .or_else(|| file.as_deref().and_then(base_name))
            .unwrap_or_else(|| Self::UNKNOWN_TRACK.to_string());

        Self {
            artist: artist.unwrap_or_else(|| Self::UNKNOWN_ARTIST.to_string()),
            title,
            album: album.unwrap_or_default(),
            duration: duration.unwrap_or(0),
            file,
        }
    }
}

fn base_name(file: &str) -> Option<String> {
    // Stream URLs and paths both end in the part worth showing
    let name = file.trim_end_matches('/').rsplit('/').next()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Pixel buffer in the layout of the freedesktop `image-data` hint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: i32,
    pub height: i32,
    pub rowstride: i32,
    pub has_alpha: bool,
    pub bits_per_sample: i32,
    pub channels: i32,
    pub data: Vec<u8>,
}

/// Notification icon, either a file for the transport to load or pixels we decoded
#[derive(Debug, Clone, PartialEq)]
pub enum Icon {
    Path(PathBuf),
    Raw(Arc<RawImage>),
}

impl Icon {
    /// True when both icons are the same cached value (same file, or the same
    /// decoded buffer rather than an equal copy)
    pub fn same_as(&self, other: &Icon) -> bool {
        match (self, other) {
            (Icon::Path(a), Icon::Path(b)) => a == b,
            (Icon::Raw(a), Icon::Raw(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub title: String,
    pub description: String,
    pub icon: Option<Icon>,
}
