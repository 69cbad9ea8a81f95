use std::io;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    Io(io::ErrorKind),
    ConnectionClosed,
    InvalidAddress(String),
    InvalidState(&'static str),
    Parse(String),
    UnexpectedData(String),
    NoSerializer { name: String, namespace: String },
    Transform(String),
    NoChildLayer,
}

impl ::std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match self {
            ErrorKind::Io(kind) => write!(f, "IO error: {:?}", kind),
            ErrorKind::ConnectionClosed => write!(f, "Connection Closed"),
            ErrorKind::InvalidAddress(v) => write!(f, "Invalid address: '{}'", v),
            ErrorKind::InvalidState(v) => write!(f, "Invalid state: {}", v),
            ErrorKind::Parse(v) => write!(f, "XML parse error: {}", v),
            ErrorKind::UnexpectedData(v) => write!(f, "Unexpected stream data: {}", v),
            ErrorKind::NoSerializer { name, namespace } => write!(
                f,
                "No serializer registered for element '{}' in namespace '{}'",
                name, namespace
            ),
            ErrorKind::Transform(v) => write!(f, "Layer transform failed: {}", v),
            ErrorKind::NoChildLayer => write!(f, "Layer has no child layer to write to"),
        }
    }
}

/// Error type of this crate: an [`ErrorKind`] plus the underlying cause, if any.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    kind: ErrorKind,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Error { kind, source: None }
    }

    pub fn with_source<E>(kind: ErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Error {
            kind,
            source: Some(source.into()),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::UnexpectedEof => Error::with_source(ErrorKind::ConnectionClosed, e),
            kind => Error::with_source(ErrorKind::Io(kind), e),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::with_source(ErrorKind::Parse(e.to_string()), e)
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(e: std::str::Utf8Error) -> Self {
        Error::with_source(ErrorKind::Parse("input is not valid UTF-8".into()), e)
    }
}

pub type Result<T> = ::std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mapping() {
        let e: Error = io::Error::from(io::ErrorKind::ConnectionReset).into();
        assert_eq!(*e.kind(), ErrorKind::ConnectionClosed);

        let e: Error = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert_eq!(*e.kind(), ErrorKind::Io(io::ErrorKind::PermissionDenied));
        assert!(std::error::Error::source(&e).is_some());
    }

    #[test]
    fn test_display() {
        let e = Error::new(ErrorKind::NoSerializer {
            name: "iq".into(),
            namespace: "jabber:client".into(),
        });
        assert_eq!(
            e.to_string(),
            "No serializer registered for element 'iq' in namespace 'jabber:client'"
        );
    }
}
