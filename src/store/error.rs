use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreErrorCode {
    DuplicateIdentity,
    RemoteTransport,
    RemoteOperation,
    NotFound,
    InvalidArgument,
    Internal,
}

impl StoreErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreErrorCode::DuplicateIdentity => "store/duplicate-identity",
            StoreErrorCode::RemoteTransport => "store/remote-transport",
            StoreErrorCode::RemoteOperation => "store/remote-operation",
            StoreErrorCode::NotFound => "store/not-found",
            StoreErrorCode::InvalidArgument => "store/invalid-argument",
            StoreErrorCode::Internal => "store/internal",
        }
    }
}

#[derive(Clone, Debug)]
pub struct StoreError {
    pub code: StoreErrorCode,
    message: String,
}

impl StoreError {
    pub fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    /// The human-readable message, verbatim as reported by the failing layer.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the failure came from the remote side (transport or endpoint).
    pub fn is_remote(&self) -> bool {
        matches!(
            self.code,
            StoreErrorCode::RemoteTransport | StoreErrorCode::RemoteOperation
        )
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

pub fn duplicate_identity(message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::DuplicateIdentity, message)
}

pub fn remote_transport(message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::RemoteTransport, message)
}

pub fn remote_operation(message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::RemoteOperation, message)
}

pub fn not_found(message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::NotFound, message)
}

pub fn invalid_argument(message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::InvalidArgument, message)
}

pub fn internal_error(message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::Internal, message)
}
