use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed sink URL: unparsable, unknown schema, wrong path shape or bad duration.
    #[error("Configuration Error - {0}")]
    Configuration(String),

    /// Duplicate or invalid schema, or a second initialization of the global registry.
    #[error("Registration Error - {0}")]
    Registration(String),

    /// Opening the topic, dialing the endpoint or creating the client failed.
    #[error("Transport Open Error - {0}")]
    TransportOpen(String),

    /// A publish failed or missed its deadline. Only ever logged, writers never see it.
    #[error("Delivery Error - {0}")]
    Delivery(String),

    /// Releasing one of the sink's resources failed.
    #[error("Close Error - {0}")]
    Close(String),

    #[error("Sink is closed")]
    Closed,
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Configuration(format!("invalid sink url: {err}"))
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Closed => std::io::Error::new(std::io::ErrorKind::BrokenPipe, err),
            _ => std::io::Error::other(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_error_is_configuration_error() {
        let err: Error = url::Url::parse("no scheme here").unwrap_err().into();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().starts_with("Configuration Error - invalid sink url"));
    }

    #[test]
    fn test_closed_maps_to_broken_pipe() {
        let err: std::io::Error = Error::Closed.into();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);

        let err: std::io::Error = Error::Delivery("x".to_string()).into();
        assert_eq!(err.kind(), std::io::ErrorKind::Other);
    }
}
