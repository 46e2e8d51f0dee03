//! Listen endpoints for the HTTP daemon.

use std::fmt;
use std::fs::DirBuilder;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Where the daemon accepts HTTP connections.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum ListenEndpoint {
    /// Unix domain socket, typically fronted by a reverse proxy.
    Unix {
        /// Socket file path.
        path: Utf8PathBuf,
    },
    /// TCP socket.
    Tcp {
        /// Host name or address to bind.
        host: String,
        /// Port to bind.
        port: u16,
    },
}

impl ListenEndpoint {
    /// Builds a Unix domain socket endpoint.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Builds a TCP endpoint.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Returns the socket path when the endpoint uses the Unix transport.
    #[must_use]
    pub fn unix_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Unix { path } => Some(path.as_ref()),
            Self::Tcp { .. } => None,
        }
    }

    /// Ensures a Unix socket's parent directory exists.
    ///
    /// TCP endpoints need no preparation.
    ///
    /// # Errors
    ///
    /// Returns [`ListenPreparationError`] when the socket path has no parent
    /// or the parent cannot be created.
    pub fn prepare_filesystem(&self) -> Result<(), ListenPreparationError> {
        let Some(path) = self.unix_path() else {
            return Ok(());
        };
        let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) else {
            return Err(ListenPreparationError::MissingParent {
                path: path.to_path_buf(),
            });
        };

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            // A reverse proxy running as another user must reach the socket.
            builder.mode(0o755);
        }

        if let Err(source) = builder.create(parent.as_std_path())
            && source.kind() != std::io::ErrorKind::AlreadyExists
        {
            return Err(ListenPreparationError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            });
        }

        Ok(())
    }
}

impl fmt::Display for ListenEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { path } => write!(formatter, "unix://{path}"),
            Self::Tcp { host, port } => write!(formatter, "tcp://{host}:{port}"),
        }
    }
}

impl FromStr for ListenEndpoint {
    type Err = ListenParseError;

    /// Accepts `tcp://host:port`, `unix:///path` and the short `unix:/path`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input)?;
        match url.scheme() {
            "unix" => {
                let path = url.path();
                if path.is_empty() {
                    return Err(ListenParseError::MissingUnixPath(input.to_owned()));
                }
                Ok(Self::unix(path))
            }
            "tcp" => {
                let host = url
                    .host_str()
                    .ok_or_else(|| ListenParseError::MissingHost(input.to_owned()))?;
                let port = url
                    .port()
                    .ok_or_else(|| ListenParseError::MissingPort(input.to_owned()))?;
                Ok(Self::tcp(host, port))
            }
            other => Err(ListenParseError::UnsupportedScheme(other.to_owned())),
        }
    }
}

/// Errors encountered while parsing a [`ListenEndpoint`] from text.
#[derive(Debug, Error)]
pub enum ListenParseError {
    /// Scheme was neither `tcp` nor `unix`.
    #[error("unsupported listen scheme '{0}'")]
    UnsupportedScheme(String),
    /// TCP host name was missing.
    #[error("missing TCP host in '{0}'")]
    MissingHost(String),
    /// TCP port was missing from the address.
    #[error("missing TCP port in '{0}'")]
    MissingPort(String),
    /// Unix socket path was absent.
    #[error("missing Unix socket path in '{0}'")]
    MissingUnixPath(String),
    /// The text was not a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Errors raised when preparing a Unix socket's directory.
#[derive(Debug, Error)]
pub enum ListenPreparationError {
    /// The socket path has no parent directory.
    #[error("socket path '{path}' has no parent directory")]
    MissingParent {
        /// Configured socket path.
        path: Utf8PathBuf,
    },
    /// Creating the parent directory failed.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}
