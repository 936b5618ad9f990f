use crate::types::{PlaybackState, PlayerStatus};

/// Decide whether moving from `previous` to `current` deserves a notification.
///
/// Fires when playback starts, or when a new song id shows up. A missing song
/// id on `current` never counts as a change.
pub fn should_notify(previous: &PlayerStatus, current: &PlayerStatus) -> bool {
    let started_playing =
        previous.state != PlaybackState::Playing && current.state == PlaybackState::Playing;

    let track_changed = match &current.song_id {
        Some(id) => previous.song_id.as_ref() != Some(id),
        None => false,
    };

    started_playing || track_changed
}
