//! mpd-hiss: "Now Playing" desktop notifications for MPD.
//!
//! The watcher waits on MPD's `idle player`, decides with
//! [`differ::should_notify`] whether the event is worth announcing, looks up
//! album art next to the track and hands the rendered text to a notification
//! transport.

pub mod art;
pub mod cli;
pub mod config;
pub mod differ;
pub mod error;
pub mod format;
pub mod mpd;
pub mod notifier;
pub mod shutdown;
pub mod types;
pub mod watcher;
