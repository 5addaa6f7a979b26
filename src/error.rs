//! Error taxonomy for IPAM operations
//!
//! Every public operation returns `Result<T, IpamError>`. At the outer edge the
//! result is folded into an [`Outcome`] envelope so callers always receive a
//! tagged value instead of a raw error.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable, serializable tag for an [`IpamError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidAddress,
    InvalidCidr,
    InvalidSite,
    InvalidInput,
    NotFound,
    Conflict,
    ExternalFailure,
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidAddress => "InvalidAddress",
            ErrorKind::InvalidCidr => "InvalidCidr",
            ErrorKind::InvalidSite => "InvalidSite",
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::ExternalFailure => "ExternalFailure",
            ErrorKind::Storage => "Storage",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IpamError {
    #[error("invalid IPv4 address '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("invalid CIDR '{input}': {reason}")]
    InvalidCidr { input: String, reason: String },

    #[error("site {0} does not exist")]
    InvalidSite(i64),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    #[error("{0}")]
    Conflict(String),

    #[error("external call failed: {0}")]
    ExternalFailure(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl IpamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IpamError::InvalidAddress { .. } => ErrorKind::InvalidAddress,
            IpamError::InvalidCidr { .. } => ErrorKind::InvalidCidr,
            IpamError::InvalidSite(_) => ErrorKind::InvalidSite,
            IpamError::InvalidInput(_) => ErrorKind::InvalidInput,
            IpamError::NotFound { .. } => ErrorKind::NotFound,
            IpamError::Conflict(_) => ErrorKind::Conflict,
            IpamError::ExternalFailure(_) => ErrorKind::ExternalFailure,
            IpamError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn invalid_address(input: &str, reason: impl Into<String>) -> Self {
        IpamError::InvalidAddress {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_cidr(input: &str, reason: impl Into<String>) -> Self {
        IpamError::InvalidCidr {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, key: impl fmt::Display) -> Self {
        IpamError::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

impl From<rusqlite::Error> for IpamError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ffi_err, message) = &err {
            if ffi_err.code == rusqlite::ErrorCode::ConstraintViolation {
                let detail = message.clone().unwrap_or_default();
                if detail.contains("FOREIGN KEY") {
                    return IpamError::NotFound {
                        entity: "referenced record",
                        key: detail,
                    };
                }
                if detail.contains("subnets.company_id, subnets.name") {
                    return IpamError::Conflict(
                        "a subnet with this name already exists for the company".to_string(),
                    );
                }
                return IpamError::Conflict(format!("constraint violated: {}", detail));
            }
        }
        IpamError::Storage(err.to_string())
    }
}

pub type IpamResult<T> = Result<T, IpamError>;

/// Boundary envelope: `{"ok":true,"data":...}` or `{"ok":false,"error":...,"kind":...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Outcome<T> {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl<T> Outcome<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            kind: None,
        }
    }

    pub fn failure(err: &IpamError) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(err.to_string()),
            kind: Some(err.kind()),
        }
    }
}

impl<T> From<IpamResult<T>> for Outcome<T> {
    fn from(result: IpamResult<T>) -> Self {
        match result {
            Ok(data) => Outcome::success(data),
            Err(err) => Outcome::failure(&err),
        }
    }
}
