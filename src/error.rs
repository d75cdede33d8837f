use std::fmt;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Auth { status: u16 },
    TokenNotFound,
    EmptyResponse,
    MalformedResponse(String),
    Status(u16),
    InvalidTemperature(f64),
    InvalidMode(String),
    Config(String),
    Io(std::io::Error),
}

impl Error {
    /// True for failures that mean the session token is no longer usable.
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth { .. } | Error::TokenNotFound)
    }

    /// True for caller mistakes that were rejected before any request.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::InvalidTemperature(_) | Error::InvalidMode(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Auth { status } => write!(f, "authentication failed (HTTP {status})"),
            Error::TokenNotFound => write!(f, "session token not found in control page"),
            Error::EmptyResponse => write!(f, "empty response body"),
            Error::MalformedResponse(msg) => write!(f, "malformed response: {msg}"),
            Error::Status(status) => write!(f, "unexpected HTTP status {status}"),
            Error::InvalidTemperature(t) => write!(f, "temperature out of range: {t}"),
            Error::InvalidMode(mode) => write!(f, "invalid mode: {mode}"),
            Error::Config(msg) => write!(f, "config error: {msg}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::MalformedResponse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
