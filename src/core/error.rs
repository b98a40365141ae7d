//! Engine error types

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use super::transport::TransportError;

#[derive(Error, Debug, Clone)]
pub enum ConnectError {
    #[error("No port selected")]
    InvalidPort,

    #[error("Invalid baud rate: {0}")]
    InvalidBaud(u32),

    #[error("Already connected to {0}")]
    AlreadyConnected(String),

    #[error("Failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: TransportError,
    },
}

#[derive(Error, Debug, Clone)]
pub enum LogError {
    #[error("Failed to write log file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },
}

/// Everything the session reports to the shell
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Read failed: {0}")]
    Read(#[source] TransportError),

    #[error("Error sending data: {0}")]
    Write(#[source] TransportError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error("Not connected")]
    NotConnected,
}
