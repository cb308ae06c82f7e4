use std::net::IpAddr;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Swarm session error taxonomy.
///
/// Only `Socket`, `StrategyContract` and `AckSlotBusy` are fatal to a
/// running session; everything a single drone does wrong degrades that
/// drone alone.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Socket-level transport failure (bind, send or receive).
    #[error("Socket error: {0}")]
    Socket(String),

    /// An exchange was started while another one was still in flight for
    /// the same unit.
    #[error("Ack slot already bound for unit {0}")]
    AckSlotBusy(IpAddr),

    /// A strategy asked to continue without providing a command.
    #[error("Strategy '{0}' continued without a command")]
    StrategyContract(&'static str),

    /// The session ended without fulfilling its completion signal.
    #[error("Session aborted before completing")]
    SessionAborted,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Socket(err.to_string())
    }
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
