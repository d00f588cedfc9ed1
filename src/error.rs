//! Error type shared by every remote call and configuration step.
//!
//! An [`Error`] pairs an [`ErrorKind`] with the underlying cause. Kinds
//! borrow their names from gRPC status codes, which map cleanly onto the
//! HTTP statuses that Spotify and Mattermost answer with; see
//! [`Error::from_status`].
//!
//! Remote calls never panic and never abort the process: every failure is
//! returned as an [`Error`] and the caller decides whether the current cycle
//! continues in degraded form or ends early.
//!
//! ```rust
//! use spotimost::error::{Error, ErrorKind, Result};
//!
//! fn lookup(found: bool) -> Result<()> {
//!     if !found {
//!         return Err(Error::not_found("emoji does not exist"));
//!     }
//!     Ok(())
//! }
//!
//! assert_eq!(lookup(false).unwrap_err().kind, ErrorKind::NotFound);
//! ```

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

type Cause = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub error: Cause,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Classification of an [`Error`].
///
/// The `Display` text is prefixed to every error message.
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Copy, Debug, Eq, Error, Hash, PartialEq)]
pub enum ErrorKind {
    /// Interrupted locally, e.g. by a signal.
    #[error("cancelled")]
    Cancelled,

    #[error("unknown error")]
    Unknown,

    /// Rejected input: configuration values, malformed requests (400).
    #[error("invalid argument")]
    InvalidArgument,

    /// Timed out (408, 504).
    #[error("timed out")]
    DeadlineExceeded,

    /// 404; an emoji lookup treats this as "no emoji" instead.
    #[error("not found")]
    NotFound,

    /// 409, e.g. creating an emoji whose name is still taken.
    #[error("already exists")]
    AlreadyExists,

    /// 403: the chat user may not change its status or manage emoji.
    #[error("permission denied")]
    PermissionDenied,

    /// 401, or a refresh token or authorization code the accounts service
    /// rejects as `invalid_grant`.
    #[error("unauthenticated")]
    Unauthenticated,

    /// 429, or artwork too large for an emoji.
    #[error("resource exhausted")]
    ResourceExhausted,

    /// Cannot run in the current state, like exchanging tokens without a
    /// refresh token.
    #[error("failed precondition")]
    FailedPrecondition,

    /// The connection dropped mid-request.
    #[error("aborted")]
    Aborted,

    #[error("internal error")]
    Internal,

    /// 5xx or unreachable service.
    #[error("service unavailable")]
    Unavailable,

    /// A response was truncated or lacked required data.
    #[error("data loss")]
    DataLoss,
}

macro_rules! constructors {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            #[doc = concat!("Creates an error of kind [`ErrorKind::", stringify!($kind), "`].")]
            pub fn $name<E>(error: E) -> Self
            where
                E: Into<Cause>,
            {
                Self::new(ErrorKind::$kind, error)
            }
        )*
    };
}

impl Error {
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Cause>,
    {
        Self {
            kind,
            error: error.into(),
        }
    }

    /// Creates an error from an unsuccessful HTTP response status.
    ///
    /// `operation` names the remote call so that the log line that
    /// eventually reports this error is enough to diagnose it.
    ///
    /// ```rust
    /// let err = Error::from_status("emoji lookup", StatusCode::FORBIDDEN);
    /// assert_eq!(err.kind, ErrorKind::PermissionDenied);
    /// ```
    pub fn from_status(operation: &str, status: StatusCode) -> Self {
        let message = format!("{operation} failed with HTTP {status}");
        let kind = match status {
            StatusCode::BAD_REQUEST => ErrorKind::InvalidArgument,
            StatusCode::UNAUTHORIZED => ErrorKind::Unauthenticated,
            StatusCode::FORBIDDEN => ErrorKind::PermissionDenied,
            StatusCode::NOT_FOUND => ErrorKind::NotFound,
            StatusCode::CONFLICT => ErrorKind::AlreadyExists,
            StatusCode::TOO_MANY_REQUESTS => ErrorKind::ResourceExhausted,
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                ErrorKind::DeadlineExceeded
            }
            status if status.is_server_error() => ErrorKind::Unavailable,
            _ => ErrorKind::Unknown,
        };

        Self::new(kind, message)
    }

    constructors! {
        aborted => Aborted,
        already_exists => AlreadyExists,
        cancelled => Cancelled,
        data_loss => DataLoss,
        deadline_exceeded => DeadlineExceeded,
        failed_precondition => FailedPrecondition,
        internal => Internal,
        invalid_argument => InvalidArgument,
        not_found => NotFound,
        permission_denied => PermissionDenied,
        resource_exhausted => ResourceExhausted,
        unauthenticated => Unauthenticated,
        unavailable => Unavailable,
        unknown => Unknown,
    }

    /// Attempts to downcast the cause to a concrete type.
    #[must_use]
    pub fn downcast<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.error.downcast_ref::<E>()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

/// Format: `{kind}: {cause}`
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.error)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;

        let kind = match err.kind() {
            Io::NotFound => ErrorKind::NotFound,
            Io::PermissionDenied => ErrorKind::PermissionDenied,
            Io::AddrInUse | Io::AlreadyExists => ErrorKind::AlreadyExists,
            Io::AddrNotAvailable | Io::ConnectionRefused | Io::NotConnected => {
                ErrorKind::Unavailable
            }
            Io::BrokenPipe | Io::ConnectionReset | Io::ConnectionAborted => ErrorKind::Aborted,
            Io::Interrupted => ErrorKind::Cancelled,
            Io::UnexpectedEof => ErrorKind::DataLoss,
            Io::TimedOut => ErrorKind::DeadlineExceeded,
            Io::InvalidInput | Io::InvalidData => ErrorKind::InvalidArgument,
            _ => ErrorKind::Unknown,
        };

        Self::new(kind, err)
    }
}

/// Statuses map as in [`Error::from_status`]; transport failures by their
/// nature.
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if let Some(status) = err.status() {
            Self::from_status("request", status).kind
        } else if err.is_timeout() {
            ErrorKind::DeadlineExceeded
        } else if err.is_body() {
            ErrorKind::DataLoss
        } else if err.is_decode() {
            ErrorKind::InvalidArgument
        } else if err.is_builder() {
            ErrorKind::Internal
        } else if err.is_connect() || err.is_redirect() {
            ErrorKind::Unavailable
        } else {
            ErrorKind::Unknown
        };

        Self::new(kind, err)
    }
}

/// Undecodable response bodies end up here.
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        let kind = if err.is_eof() {
            ErrorKind::DataLoss
        } else {
            ErrorKind::InvalidArgument
        };

        Self::new(kind, err)
    }
}

/// Header values are built from user-supplied credentials, so a credential
/// with control characters ends up here.
impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::invalid_argument(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::invalid_argument(err)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Self::deadline_exceeded(err)
    }
}
