use chronikbench::{LookupError, NodeError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Server returned status {0}")]
    Status(u16),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl From<ClientError> for NodeError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(e) if e.is_decode() => NodeError::Decode(e.to_string()),
            ClientError::Http(e) => match e.status() {
                Some(status) => NodeError::Status(status.as_u16()),
                None => NodeError::Connection(e.to_string()),
            },
            ClientError::Url(e) => NodeError::InvalidEndpoint(e.to_string()),
            ClientError::Status(code) => NodeError::Status(code),
            ClientError::NotFound(path) => NodeError::Unsupported(path),
            ClientError::InvalidResponse(msg) => NodeError::Decode(msg),
        }
    }
}

impl From<ClientError> for LookupError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(e) if e.is_decode() => LookupError::Decode(e.to_string()),
            ClientError::Http(e) => match e.status() {
                Some(status) => LookupError::Status(status.as_u16()),
                None => LookupError::Request(e.to_string()),
            },
            ClientError::Url(e) => LookupError::Request(e.to_string()),
            ClientError::Status(code) => LookupError::Status(code),
            ClientError::NotFound(_) => LookupError::Status(404),
            ClientError::InvalidResponse(msg) => LookupError::Decode(msg),
        }
    }
}
