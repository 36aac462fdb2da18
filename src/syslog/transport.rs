//! Socket transports for the syslog backend.

use std::{
    fmt, io,
    net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

#[cfg(unix)]
use std::os::unix::net::{UnixDatagram, UnixStream};

use crate::error::LogError;

/// Sockets probed, in order, for the local syslog daemon.
pub const LOCAL_SOCKETS: [&str; 3] = ["/dev/log", "/var/run/syslog", "/var/run/log"];

/// Where syslog messages are sent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SyslogNetwork {
    /// The local daemon, found by probing [`LOCAL_SOCKETS`].
    #[default]
    Local,
    /// Unix datagram socket at the given path.
    Unix(PathBuf),
    /// Unix stream socket at the given path.
    UnixStream(PathBuf),
    /// Remote daemon over UDP, `host:port`.
    Udp(String),
    /// Remote daemon over TCP, `host:port`.
    Tcp(String),
}

impl SyslogNetwork {
    /// Build a network from a `network` keyword and an address.
    ///
    /// An empty `network` selects the local daemon and ignores `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Config`] for an unknown keyword or a missing
    /// address.
    pub fn from_parts(network: &str, addr: &str) -> Result<Self, LogError> {
        let network = network.trim().to_ascii_lowercase();
        if network.is_empty() {
            return Ok(Self::Local);
        }
        let addr = addr.trim();
        if addr.is_empty() {
            return Err(LogError::Config(format!(
                "syslog network {network:?} needs an address"
            )));
        }
        match network.as_str() {
            "unix" | "unixgram" => Ok(Self::Unix(PathBuf::from(addr))),
            "unixstream" => Ok(Self::UnixStream(PathBuf::from(addr))),
            "udp" | "udp4" | "udp6" => Ok(Self::Udp(addr.to_owned())),
            "tcp" | "tcp4" | "tcp6" => Ok(Self::Tcp(addr.to_owned())),
            other => Err(LogError::Config(format!("unknown syslog network: {other:?}"))),
        }
    }

    /// Whether messages go to a daemon on this host (no hostname in the frame).
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local | Self::Unix(_) | Self::UnixStream(_))
    }
}

impl fmt::Display for SyslogNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local syslog"),
            Self::Unix(path) => write!(f, "unixgram:{}", path.display()),
            Self::UnixStream(path) => write!(f, "unix:{}", path.display()),
            Self::Udp(addr) => write!(f, "udp:{addr}"),
            Self::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

impl FromStr for SyslogNetwork {
    type Err = LogError;

    /// Parse `network:address`, or an empty string for the local daemon.
    fn from_str(s: &str) -> Result<Self, LogError> {
        match s.split_once(':') {
            Some((network, addr)) => Self::from_parts(network, addr),
            None if s.trim().is_empty() => Ok(Self::Local),
            None => Self::from_parts(s, ""),
        }
    }
}

/// Open syslog socket.
#[derive(Debug)]
pub enum SyslogConnection {
    #[cfg(unix)]
    UnixDatagram(UnixDatagram),
    #[cfg(unix)]
    UnixStream(UnixStream),
    Udp(UdpSocket),
    Tcp(TcpStream),
}

impl SyslogConnection {
    /// Send one framed message.
    pub fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        use io::Write;
        match self {
            #[cfg(unix)]
            Self::UnixDatagram(socket) => socket.send(frame).map(|_| ()),
            #[cfg(unix)]
            Self::UnixStream(stream) => stream.write_all(frame),
            Self::Udp(socket) => socket.send(frame).map(|_| ()),
            Self::Tcp(stream) => stream.write_all(frame),
        }
    }

    fn set_write_timeout(&self, timeout: Duration) -> io::Result<()> {
        match self {
            #[cfg(unix)]
            Self::UnixDatagram(socket) => socket.set_write_timeout(Some(timeout)),
            #[cfg(unix)]
            Self::UnixStream(stream) => stream.set_write_timeout(Some(timeout)),
            Self::Udp(socket) => socket.set_write_timeout(Some(timeout)),
            Self::Tcp(stream) => stream.set_write_timeout(Some(timeout)),
        }
    }
}

fn resolve(addr: &str) -> io::Result<Vec<SocketAddr>> {
    addr.to_socket_addrs().map(Iterator::collect)
}

fn connect_tcp(addr: &str, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for candidate in resolve(addr)? {
        match TcpStream::connect_timeout(&candidate, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{addr} resolved to no addresses"),
        )
    }))
}

fn connect_udp(addr: &str) -> io::Result<UdpSocket> {
    let target = resolve(addr)?.into_iter().next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{addr} resolved to no addresses"),
        )
    })?;
    let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(local)?;
    socket.connect(target)?;
    Ok(socket)
}

#[cfg(unix)]
fn connect_unix_datagram(path: &Path) -> io::Result<SyslogConnection> {
    let socket = UnixDatagram::unbound()?;
    socket.connect(path)?;
    Ok(SyslogConnection::UnixDatagram(socket))
}

#[cfg(unix)]
fn connect_unix_stream(path: &Path) -> io::Result<SyslogConnection> {
    UnixStream::connect(path).map(SyslogConnection::UnixStream)
}

#[cfg(unix)]
fn connect_local() -> io::Result<SyslogConnection> {
    for path in LOCAL_SOCKETS.iter().map(Path::new) {
        if let Ok(conn) = connect_unix_datagram(path).or_else(|_| connect_unix_stream(path)) {
            return Ok(conn);
        }
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        "unix syslog delivery error",
    ))
}

#[cfg(not(unix))]
fn unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "unix domain sockets are not supported on this platform",
    )
}

/// Connect to `network`, applying `write_timeout` to the socket.
pub fn connect(
    network: &SyslogNetwork,
    connect_timeout: Duration,
    write_timeout: Duration,
) -> io::Result<SyslogConnection> {
    let conn = match network {
        #[cfg(unix)]
        SyslogNetwork::Local => connect_local()?,
        #[cfg(unix)]
        SyslogNetwork::Unix(path) => connect_unix_datagram(path)?,
        #[cfg(unix)]
        SyslogNetwork::UnixStream(path) => connect_unix_stream(path)?,
        #[cfg(not(unix))]
        SyslogNetwork::Local | SyslogNetwork::Unix(_) | SyslogNetwork::UnixStream(_) => {
            return Err(unsupported());
        }
        SyslogNetwork::Udp(addr) => SyslogConnection::Udp(connect_udp(addr)?),
        SyslogNetwork::Tcp(addr) => SyslogConnection::Tcp(connect_tcp(addr, connect_timeout)?),
    };
    conn.set_write_timeout(write_timeout)?;
    Ok(conn)
}
