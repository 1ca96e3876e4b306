use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Display};

use research_chat_model::ErrorKind as ProviderErrorKind;

use crate::model_client::ClientError;

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The credential pool is empty.
    NoCredentials,
    /// Every credential kept failing with transient errors until the retry
    /// ceiling was reached.
    PoolExhausted,
    /// Required configuration is missing or invalid.
    Configuration,
    /// The model provider failed with a non-transient error.
    Model,
    /// The model answered, but the answer is unusable.
    InvalidResponse,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NoCredentials => write!(f, "No credentials available"),
            ErrorKind::PoolExhausted => write!(f, "Credential pool exhausted"),
            ErrorKind::Configuration => write!(f, "Configuration error"),
            ErrorKind::Model => write!(f, "Model error"),
            ErrorKind::InvalidResponse => write!(f, "Invalid model response"),
        }
    }
}

/// Describes why a research session failed.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
    source: Option<ClientError>,
}

impl Error {
    #[inline]
    fn with_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            reason: None,
            source: None,
        }
    }

    /// Creates a new error with the `NoCredentials` kind.
    #[inline]
    pub fn no_credentials() -> Self {
        Self::with_kind(ErrorKind::NoCredentials)
    }

    /// Creates a new error with the `PoolExhausted` kind, carrying the last
    /// transient error seen.
    #[inline]
    pub fn pool_exhausted(last_error: Option<ClientError>) -> Self {
        Self {
            source: last_error,
            ..Self::with_kind(ErrorKind::PoolExhausted)
        }
    }

    /// Creates a new error with the `Configuration` kind.
    #[inline]
    pub fn configuration() -> Self {
        Self::with_kind(ErrorKind::Configuration)
    }

    /// Creates a new error with the `Model` kind from a provider error.
    #[inline]
    pub fn model(err: ClientError) -> Self {
        Self {
            source: Some(err),
            ..Self::with_kind(ErrorKind::Model)
        }
    }

    /// Creates a new error with the `InvalidResponse` kind.
    #[inline]
    pub fn invalid_response() -> Self {
        Self::with_kind(ErrorKind::InvalidResponse)
    }

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(self, reason: S) -> Self {
        Self {
            reason: Some(reason.into()),
            ..self
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the kind reported by the underlying provider error, if any.
    #[inline]
    pub fn provider_kind(&self) -> Option<ProviderErrorKind> {
        self.source.as_ref().map(|err| err.kind())
    }

    /// Returns the reason for the error.
    ///
    /// Falls back to the underlying provider error, then to the kind.
    pub fn reason(&self) -> Cow<'_, str> {
        match (&self.reason, &self.source) {
            (Some(reason), _) => Cow::Borrowed(reason),
            (None, Some(source)) => Cow::Owned(source.to_string()),
            (None, None) => Cow::Owned(format!("{}", self.kind)),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.reason, &self.source) {
            (Some(reason), _) => write!(f, "{}: {reason}", self.kind),
            (None, Some(source)) => write!(f, "{}: {source}", self.kind),
            (None, None) => write!(f, "{}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|err| err as &(dyn StdError + 'static))
    }
}
