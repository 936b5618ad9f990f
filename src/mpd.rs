use std::io::{self, Read, Write};
use std::net::{Shutdown as SocketShutdown, TcpStream};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use ::mpd::error::Error as MpdError;
use ::mpd::idle::{Idle, Subsystem};
use ::mpd::{Client, Song, State, Status};

use crate::error::DaemonError;
use crate::shutdown::Shutdown;
use crate::types::{PlaybackState, PlayerStatus, TrackMetadata};

/// The music daemon as the watcher sees it
pub trait MusicDaemon {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), DaemonError>;

    fn authenticate(&mut self, password: &str) -> Result<(), DaemonError>;

    /// Block until the player subsystem reports a change
    fn wait_for_player_change(&mut self) -> Result<(), DaemonError>;

    fn status(&mut self) -> Result<PlayerStatus, DaemonError>;

    fn current_song(&mut self) -> Result<TrackMetadata, DaemonError>;

    fn disconnect(&mut self) -> Result<(), DaemonError>;
}

/// TCP, or a local socket when the host is a path
enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    fn open(host: &str, port: u16) -> io::Result<Self> {
        #[cfg(unix)]
        {
            if host.starts_with('/') {
                return UnixStream::connect(host).map(Stream::Unix);
            }
        }
        TcpStream::connect((host, port)).map(Stream::Tcp)
    }

    fn try_clone(&self) -> io::Result<Self> {
        match self {
            Stream::Tcp(s) => s.try_clone().map(Stream::Tcp),
            #[cfg(unix)]
            Stream::Unix(s) => s.try_clone().map(Stream::Unix),
        }
    }

    fn shutdown(&self) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.shutdown(SocketShutdown::Both),
            #[cfg(unix)]
            Stream::Unix(s) => s.shutdown(SocketShutdown::Both),
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.flush(),
            #[cfg(unix)]
            Stream::Unix(s) => s.flush(),
        }
    }
}

struct Connection {
    client: Client<Stream>,
    socket: Stream,
}

/// [`MusicDaemon`] backed by the `mpd` crate's client
pub struct MpdClient {
    connection: Option<Connection>,
    shutdown: Shutdown,
}

impl MpdClient {
    /// `shutdown` gets an interrupt that closes the socket, so a pending
    /// greeting read or idle wait returns as soon as a stop is requested
    pub fn new(shutdown: Shutdown) -> Self {
        Self {
            connection: None,
            shutdown,
        }
    }

    fn client(&mut self) -> Result<&mut Client<Stream>, DaemonError> {
        self.connection
            .as_mut()
            .map(|connection| &mut connection.client)
            .ok_or_else(|| {
                DaemonError::Connection(io::Error::new(io::ErrorKind::NotConnected, "not connected"))
            })
    }
}

impl MusicDaemon for MpdClient {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), DaemonError> {
        if self.connection.is_some() {
            let _ = self.disconnect();
        }

        let stream = Stream::open(host, port)?;
        let socket = stream.try_clone()?;
        let interrupt_handle = stream.try_clone()?;

        // Armed before the greeting so a stop during the handshake is not lost
        self.shutdown.set_interrupt(move || {
            if let Err(e) = interrupt_handle.shutdown() {
                log::debug!("Socket shutdown on interrupt failed: {}", e);
            }
        });
        if self.shutdown.is_requested() {
            self.shutdown.clear_interrupt();
            return Err(DaemonError::closed());
        }

        let client = match Client::new(stream) {
            Ok(client) => client,
            Err(e) => {
                self.shutdown.clear_interrupt();
                return Err(daemon_error("connect", e));
            }
        };
        log::debug!("MPD protocol version {:?}", client.version);

        self.connection = Some(Connection { client, socket });
        Ok(())
    }

    fn authenticate(&mut self, password: &str) -> Result<(), DaemonError> {
        match self.client()?.login(password) {
            Err(MpdError::Server(e)) => Err(DaemonError::Auth(e.detail)),
            other => other.map_err(|e| daemon_error("password", e)),
        }
    }

    fn wait_for_player_change(&mut self) -> Result<(), DaemonError> {
        match self.client()?.wait(&[Subsystem::Player]) {
            Ok(changed) => {
                for subsystem in changed {
                    log::debug!("MPD subsystem changed: {:?}", subsystem);
                }
                Ok(())
            }
            // Retrying a rejected idle would spin, so treat it like a broken session
            Err(MpdError::Server(e)) => {
                Err(DaemonError::Protocol(format!("idle rejected: {}", e.detail)))
            }
            Err(e) => Err(daemon_error("idle", e)),
        }
    }

    fn status(&mut self) -> Result<PlayerStatus, DaemonError> {
        let status = self.client()?.status().map_err(|e| daemon_error("status", e))?;
        Ok(player_status(status))
    }

    fn current_song(&mut self) -> Result<TrackMetadata, DaemonError> {
        let song = self
            .client()?
            .currentsong()
            .map_err(|e| daemon_error("currentsong", e))?;
        Ok(track_metadata(song))
    }

    fn disconnect(&mut self) -> Result<(), DaemonError> {
        self.shutdown.clear_interrupt();
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };

        // The daemon hangs up without a reply, so a failed goodbye is only noise
        if let Err(e) = connection.client.close() {
            log::debug!("MPD close: {}", e);
        }
        match connection.socket.shutdown() {
            // Already closed from the other side
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other.map_err(DaemonError::from),
        }
    }
}

/// Sort a client error into the session-level taxonomy
fn daemon_error(command: &str, error: MpdError) -> DaemonError {
    match error {
        MpdError::Io(e) => DaemonError::Connection(e),
        MpdError::Server(e) => DaemonError::Command {
            command: command.to_string(),
            message: e.detail,
        },
        MpdError::Parse(e) => DaemonError::Protocol(format!("bad reply to `{}`: {}", command, e)),
        MpdError::Proto(e) => DaemonError::Protocol(format!("bad reply to `{}`: {}", command, e)),
    }
}

impl From<State> for PlaybackState {
    fn from(state: State) -> Self {
        match state {
            State::Play => PlaybackState::Playing,
            State::Pause => PlaybackState::Paused,
            State::Stop => PlaybackState::Stopped,
        }
    }
}

fn player_status(status: Status) -> PlayerStatus {
    PlayerStatus {
        state: status.state.into(),
        song_id: status.song.map(|place| place.id.0.to_string()),
    }
}

fn track_metadata(song: Option<Song>) -> TrackMetadata {
    let Some(song) = song else {
        return TrackMetadata::from_tags(None, None, None, None, None);
    };

    let album = song
        .tags
        .iter()
        .find(|(k, _)| k == "Album")
        .map(|(_, v)| v.clone());
    let file = Some(song.file).filter(|f| !f.is_empty());

    TrackMetadata::from_tags(
        song.artist,
        song.title,
        album,
        song.duration.map(|d| d.as_secs()),
        file,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;
    use std::time::{Duration, Instant};

    const GREETING: &[u8] = b"OK MPD 0.23.5\n";

    const STATUS_PLAYING: &str = "volume: 50\nrepeat: 0\nrandom: 0\nsingle: 0\nconsume: 0\n\
        playlist: 7\nplaylistlength: 12\nmixrampdb: 0.000000\nstate: play\nsong: 3\nsongid: 42\n\
        time: 12:185\nelapsed: 12.034\nbitrate: 320\nduration: 184.900\naudio: 44100:24:2\nOK\n";

    const STATUS_STOPPED: &str = "volume: 50\nrepeat: 0\nrandom: 0\nsingle: 0\nconsume: 0\n\
        playlist: 7\nplaylistlength: 0\nmixrampdb: 0.000000\nstate: stop\nOK\n";

    /// Fake daemon: answers each command that starts with the expected text
    /// with a canned reply, then keeps the socket open until the client goes away
    fn serve(script: Vec<(&'static str, &'static str)>) -> (u16, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            let mut reader = BufReader::new(stream);
            writer.write_all(GREETING).unwrap();

            let mut received = Vec::new();
            let mut script = script.into_iter();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    break;
                }
                let line = line.trim_end().to_string();
                received.push(line.clone());
                match script.next() {
                    Some((expected, reply)) => {
                        assert!(line.starts_with(expected), "{:?} is not {:?}", line, expected);
                        writer.write_all(reply.as_bytes()).unwrap();
                    }
                    None if line == "close" => break,
                    // Leave the client blocked
                    None => {}
                }
            }
            received
        });
        (port, handle)
    }

    #[test]
    fn status_and_song_round() {
        let (port, server) = serve(vec![
            ("password", "OK\n"),
            ("idle player", "changed: player\nOK\n"),
            ("status", STATUS_PLAYING),
            (
                "currentsong",
                "file: Artist/Album/01.flac\nArtist: Artist\nTitle: T\nAlbum: Album\nTime: 185\nduration: 185.000\nPos: 3\nId: 42\nOK\n",
            ),
        ]);

        let mut client = MpdClient::new(Shutdown::new());
        client.connect("127.0.0.1", port).unwrap();
        client.authenticate("s3cret").unwrap();
        client.wait_for_player_change().unwrap();
        assert_eq!(
            client.status().unwrap(),
            PlayerStatus::new(PlaybackState::Playing, Some("42"))
        );
        let song = client.current_song().unwrap();
        assert_eq!(song.artist, "Artist");
        assert_eq!(song.title, "T");
        assert_eq!(song.album, "Album");
        assert_eq!(song.duration, 185);
        assert_eq!(song.file.as_deref(), Some("Artist/Album/01.flac"));
        client.disconnect().unwrap();

        let received = server.join().unwrap();
        assert!(received[0].contains("s3cret"));
        assert_eq!(received.last().map(String::as_str), Some("close"));
    }

    #[test]
    fn rejected_password_is_auth_error() {
        let (port, server) = serve(vec![(
            "password",
            "ACK [3@0] {password} incorrect password\n",
        )]);

        let mut client = MpdClient::new(Shutdown::new());
        client.connect("127.0.0.1", port).unwrap();
        match client.authenticate("wrong") {
            Err(DaemonError::Auth(message)) => assert_eq!(message, "incorrect password"),
            other => panic!("expected auth error, got {:?}", other),
        }
        client.disconnect().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn command_ack_keeps_session() {
        let (port, server) = serve(vec![
            ("currentsong", "ACK [5@0] {currentsong} whatever\n"),
            ("status", STATUS_STOPPED),
        ]);

        let mut client = MpdClient::new(Shutdown::new());
        client.connect("127.0.0.1", port).unwrap();
        let err = client.current_song().unwrap_err();
        assert!(!err.is_fatal_to_session());
        assert_eq!(client.status().unwrap(), PlayerStatus::default());
        client.disconnect().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn nothing_queued_uses_fallbacks() {
        let (port, server) = serve(vec![("currentsong", "OK\n")]);

        let mut client = MpdClient::new(Shutdown::new());
        client.connect("127.0.0.1", port).unwrap();
        let song = client.current_song().unwrap();
        assert_eq!(song.title, TrackMetadata::UNKNOWN_TRACK);
        assert_eq!(song.artist, TrackMetadata::UNKNOWN_ARTIST);
        assert!(song.file.is_none());
        client.disconnect().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn untagged_file_is_titled_by_name() {
        let (port, server) = serve(vec![("currentsong", "file: x/y.mp3\nTime: 65\nduration: 65.700\nOK\n")]);

        let mut client = MpdClient::new(Shutdown::new());
        client.connect("127.0.0.1", port).unwrap();
        let song = client.current_song().unwrap();
        assert_eq!(song.title, "y.mp3");
        assert_eq!(song.album, "");
        assert_eq!(song.duration, 65);
        client.disconnect().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn hangup_ends_the_session() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(GREETING).unwrap();
        });

        let mut client = MpdClient::new(Shutdown::new());
        client.connect("127.0.0.1", port).unwrap();
        server.join().unwrap();
        let err = client.wait_for_player_change().unwrap_err();
        assert!(err.is_fatal_to_session(), "{:?}", err);
        let _ = client.disconnect();
    }

    #[test]
    fn bad_greeting_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"HTTP/1.1 400 Bad Request\n").unwrap();
        });

        let mut client = MpdClient::new(Shutdown::new());
        let err = client.connect("127.0.0.1", port).unwrap_err();
        assert!(err.is_fatal_to_session());
        server.join().unwrap();
    }

    #[test]
    fn shutdown_unblocks_idle() {
        let (port, server) = serve(vec![]);
        let shutdown = Shutdown::new();
        let mut client = MpdClient::new(shutdown.clone());
        client.connect("127.0.0.1", port).unwrap();

        let trigger = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            shutdown.trigger();
        });
        assert!(client.wait_for_player_change().is_err());
        trigger.join().unwrap();
        let _ = client.disconnect();
        server.join().unwrap();
    }

    #[test]
    fn shutdown_during_greeting_fails_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(500));
            // The client may already be gone
            let _ = stream.write_all(GREETING);
        });

        let shutdown = Shutdown::new();
        let mut client = MpdClient::new(shutdown.clone());
        let trigger = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            shutdown.trigger();
        });

        let started = Instant::now();
        assert!(client.connect("127.0.0.1", port).is_err());
        assert!(started.elapsed() < Duration::from_millis(450));
        trigger.join().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn connect_after_shutdown_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let _ = stream.write_all(GREETING);
        });
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let mut client = MpdClient::new(shutdown);
        assert!(client.connect("127.0.0.1", port).is_err());
        assert!(client.disconnect().is_ok());
        server.join().unwrap();
    }

    #[test]
    fn commands_need_a_connection() {
        let mut client = MpdClient::new(Shutdown::new());
        assert!(matches!(client.status(), Err(DaemonError::Connection(_))));
        assert!(client.disconnect().is_ok());
    }

    #[test]
    fn mpd_states_map_onto_playback_states() {
        assert_eq!(PlaybackState::from(State::Play), PlaybackState::Playing);
        assert_eq!(PlaybackState::from(State::Pause), PlaybackState::Paused);
        assert_eq!(PlaybackState::from(State::Stop), PlaybackState::Stopped);
    }
}
