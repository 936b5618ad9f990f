//! Error taxonomy.
//!
//! Only [`DaemonError`] can end a session; everything else degrades to a
//! skipped notification or the default icon.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    /// Socket failure or the daemon hung up.
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),

    /// The daemon rejected our password.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The daemon answered a command with `ACK`.
    #[error("command `{command}` failed: {message}")]
    Command { command: String, message: String },

    /// Reply we could not make sense of.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl DaemonError {
    /// Whether the session has to be thrown away and rebuilt
    pub fn is_fatal_to_session(&self) -> bool {
        !matches!(self, DaemonError::Command { .. })
    }

    pub fn closed() -> Self {
        DaemonError::Connection(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed by daemon",
        ))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("unknown placeholder {{{name}}} (available: artist, title, album, duration)")]
    UnknownPlaceholder { name: String },

    #[error("unterminated placeholder starting at byte {position}")]
    Unterminated { position: usize },

    #[error("single '}}' at byte {position} (write '}}}}' for a literal brace)")]
    UnmatchedBrace { position: usize },
}

#[derive(Debug, Error)]
pub enum ArtError {
    #[error("cannot list {}: {source}", path.display())]
    Listing { path: PathBuf, source: io::Error },

    #[error("cannot decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("image {} has unusable size {width}x{height}", path.display())]
    Scale { path: PathBuf, width: u32, height: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_command_errors_keep_the_session() {
        assert!(!DaemonError::Command {
            command: "status".into(),
            message: "nope".into()
        }
        .is_fatal_to_session());
        assert!(DaemonError::Auth("incorrect password".into()).is_fatal_to_session());
        assert!(DaemonError::Protocol("garbage".into()).is_fatal_to_session());
        assert!(DaemonError::closed().is_fatal_to_session());
    }

    #[test]
    fn format_error_messages() {
        let err = FormatError::UnknownPlaceholder { name: "year".into() };
        assert!(err.to_string().contains("{year}"));

        let err = FormatError::UnmatchedBrace { position: 3 };
        assert!(err.to_string().contains("'}}'"));
    }
}
