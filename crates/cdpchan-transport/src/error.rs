/// Errors that can occur at the transport boundary.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred while writing to or closing the connection.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport has been closed.
    #[error("transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
