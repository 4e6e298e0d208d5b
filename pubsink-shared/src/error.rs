use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Open Error - {0}")]
    Open(String),

    #[error("Connecting to {server} - {error}")]
    Connection { server: String, error: String },

    #[error("Send Error - {0}")]
    Send(String),

    #[error("Shutdown Error - {0}")]
    Shutdown(String),

    #[error("Close Error - {0}")]
    Close(String),

    #[error("{0} is closed")]
    Closed(String),

    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_error_conversion() {
        let err: Error = "custom error message".to_string().into();
        assert!(matches!(err, Error::Other(_)));
        assert_eq!(err.to_string(), "custom error message");
    }

    #[test]
    fn test_connection_error_display() {
        let err = Error::Connection {
            server: "localhost:8085".to_string(),
            error: "refused".to_string(),
        };
        assert_eq!(err.to_string(), "Connecting to localhost:8085 - refused");
    }
}
