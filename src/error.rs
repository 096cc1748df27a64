use std::fmt;
use std::io;

use thiserror::Error;

/// Which way the bytes were flowing when a measurement failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Download,
    Upload,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Download => write!(f, "download"),
            Direction::Upload => write!(f, "upload"),
        }
    }
}

/// Failure reported by a network probe. The cause is always human readable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// No usable endpoint, or the discovery call itself failed.
    #[error("server discovery failed: {0}")]
    Discovery(String),
    /// A download or upload probe failed after an endpoint was selected.
    #[error("{direction} test failed: {cause}")]
    Measurement { direction: Direction, cause: String },
}

impl ProbeError {
    pub fn discovery(err: anyhow::Error) -> Self {
        ProbeError::Discovery(format!("{err:#}"))
    }

    pub fn measurement(direction: Direction, err: anyhow::Error) -> Self {
        ProbeError::Measurement {
            direction,
            cause: format!("{err:#}"),
        }
    }
}

/// Errors that stop the program before or outside the test session.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to start terminal interface")]
    InterfaceStart(#[source] io::Error),
    #[error("terminal i/o failed")]
    Terminal(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn measurement_error_names_direction() {
        let err = ProbeError::Measurement {
            direction: Direction::Upload,
            cause: "connection reset".into(),
        };
        assert_eq!(err.to_string(), "upload test failed: connection reset");
    }

    #[test]
    fn anyhow_chain_is_kept_in_cause() {
        let inner: anyhow::Result<()> = Err(anyhow::anyhow!("dns lookup failed"));
        let err = inner.context("fetching trace").unwrap_err();
        let probe = ProbeError::discovery(err);
        assert_eq!(
            probe,
            ProbeError::Discovery("fetching trace: dns lookup failed".into())
        );
    }

    #[test]
    fn interface_error_names_cause_once() {
        let err = AppError::InterfaceStart(io::Error::new(io::ErrorKind::Other, "not a terminal"));
        let report = format!("{:#}", anyhow::Error::from(err));
        assert_eq!(report, "failed to start terminal interface: not a terminal");

        let err = AppError::from(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        let report = format!("{:#}", anyhow::Error::from(err));
        assert_eq!(report, "terminal i/o failed: pipe closed");
    }
}
