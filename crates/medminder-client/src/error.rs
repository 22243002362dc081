use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error status.
    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("not signed in")]
    NotAuthenticated,

    #[error("local storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("local storage encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}
